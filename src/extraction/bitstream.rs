//! Packed bit buffer for collected output bits.

/// Bits packed MSB-first into bytes.
///
/// Used to collect a stretch of the output stream for statistics and hex
/// display. The last byte is zero-padded when the bit count is not a
/// multiple of eight.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BitBlock {
    data: Vec<u8>,
    len: usize,
}

impl BitBlock {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a block from whole bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() * 8;
        Self { data, len }
    }

    /// Appends one bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Returns bit `index`.
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.data[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    /// Iterates the bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.data[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Packed bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counts the number of set bits.
    pub fn popcount(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Bit bias as deviation from 0.5, in `[-0.5, 0.5]`.
    pub fn bit_bias(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.popcount() as f64 / self.len as f64) - 0.5
    }

    /// Lowercase hex of the packed bytes.
    pub fn to_hex(&self) -> String {
        self.data.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl FromIterator<bool> for BitBlock {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut block = BitBlock::new();
        iter.into_iter().for_each(|b| block.push(b));
        block
    }
}

impl std::fmt::Debug for BitBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitBlock")
            .field("bits", &self.len)
            .field("bit_bias", &format!("{:.4}", self.bit_bias()))
            .finish()
    }
}
