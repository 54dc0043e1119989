//! Closed-loop exposure control.
//!
//! Keeps the mean brightness of the calibration pixels inside a target
//! band. One adjustment is applied per qualifying tick at most, and the
//! controller is silent for a cooldown after each adjustment.

use super::config::{ControlPath, ExposureConfig};
use crate::capture::{ExposureBounds, ExposureParam, ExposureState};
use std::time::{Duration, Instant};

/// Direction of a requested change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Too dark: more sensitivity or longer exposure.
    Increase,
    /// Too bright.
    Decrease,
}

/// An applied step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureAdjustment {
    /// Parameter changed.
    pub param: ExposureParam,
    /// Direction of the change.
    pub direction: Direction,
    /// Previous value.
    pub from: f64,
    /// New value, always within the hardware range.
    pub to: f64,
}

/// Exposure feedback controller.
#[derive(Debug)]
pub struct ExposureController {
    config: ExposureConfig,
    bounds: ExposureBounds,
    last_adjustment: Option<Instant>,
    adjustments: u64,
}

impl ExposureController {
    /// Creates a controller for a sensor with `bounds`.
    pub fn new(config: ExposureConfig, bounds: ExposureBounds) -> Self {
        Self {
            config,
            bounds,
            last_adjustment: None,
            adjustments: 0,
        }
    }

    /// Hardware ranges in use.
    pub fn bounds(&self) -> &ExposureBounds {
        &self.bounds
    }

    /// Adjustments applied since creation.
    pub fn adjustments(&self) -> u64 {
        self.adjustments
    }

    /// Returns true while a previous adjustment is still cooling down.
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.last_adjustment
            .map(|t| now.saturating_duration_since(t) < self.cooldown())
            .unwrap_or(false)
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.cooldown_ms)
    }

    /// Forgets the cooldown timer.
    pub fn reset(&mut self) {
        self.last_adjustment = None;
    }

    /// Evaluates one tick's average brightness and adjusts `state` in place.
    ///
    /// Returns the applied step, or `None` when the brightness is in band,
    /// the controller is cooling down, or no parameter has headroom.
    pub fn evaluate(
        &mut self,
        average: f64,
        state: &mut ExposureState,
        now: Instant,
    ) -> Option<ExposureAdjustment> {
        if !self.config.enabled || self.in_cooldown(now) {
            return None;
        }

        let direction = if average < self.config.target_low {
            Direction::Increase
        } else if average > self.config.target_high {
            Direction::Decrease
        } else {
            return None;
        };

        let mut order = self.priority();
        if direction == Direction::Decrease {
            order.reverse();
        }

        let current = *state;
        let adjustment = order
            .into_iter()
            .find_map(|param| self.step(param, direction, &current))?;

        state.set(adjustment.param, adjustment.to);
        self.last_adjustment = Some(now);
        self.adjustments += 1;

        tracing::info!(
            param = %adjustment.param,
            from = adjustment.from,
            to = adjustment.to,
            average,
            "Exposure adjusted"
        );
        Some(adjustment)
    }

    /// Controlled parameters in increase-priority order.
    ///
    /// The manual path ends with compensation, used once gain and exposure
    /// time have no headroom left.
    fn priority(&self) -> Vec<ExposureParam> {
        let order: &[ExposureParam] = match self.config.path {
            ControlPath::Manual if self.bounds.has_manual_control() => &[
                ExposureParam::Gain,
                ExposureParam::ExposureTime,
                ExposureParam::Compensation,
            ],
            _ => &[ExposureParam::Compensation],
        };
        order
            .iter()
            .copied()
            .filter(|&p| self.bounds.range(p).is_some())
            .collect()
    }

    fn step(
        &self,
        param: ExposureParam,
        direction: Direction,
        state: &ExposureState,
    ) -> Option<ExposureAdjustment> {
        let range = self.bounds.range(param)?;
        let from = state.get(param);

        let target = match (param, direction) {
            (ExposureParam::Compensation, Direction::Increase) => {
                from + self.config.compensation_step
            }
            (ExposureParam::Compensation, Direction::Decrease) => {
                from - self.config.compensation_step
            }
            (_, Direction::Increase) => from * 2.0,
            (_, Direction::Decrease) => from / 2.0,
        };
        let to = range.clamp(target);

        (to != from).then_some(ExposureAdjustment {
            param,
            direction,
            from,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ParamRange;

    fn bounds() -> ExposureBounds {
        ExposureBounds {
            gain: Some(ParamRange::new(1.0, 16.0)),
            exposure_us: Some(ParamRange::new(100.0, 20_000.0)),
            compensation: Some(ParamRange::new(-2.0, 2.0)),
        }
    }

    #[test]
    fn test_dark_raises_gain_before_exposure_time() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 8.0,
            exposure_us: 20_000.0,
            compensation: 0.0,
        };
        let now = Instant::now();

        let adj = controller.evaluate(0.1, &mut state, now).unwrap();
        assert_eq!(adj.param, ExposureParam::Gain);
        assert_eq!(state.gain, 16.0);
        assert_eq!(state.exposure_us, 20_000.0);
    }

    #[test]
    fn test_gain_doubling_clamped_to_upper_bound() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 10.0,
            exposure_us: 20_000.0,
            compensation: 0.0,
        };

        controller.evaluate(0.1, &mut state, Instant::now()).unwrap();
        assert_eq!(state.gain, 16.0);
    }

    #[test]
    fn test_repeat_within_cooldown_is_noop() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 2.0,
            exposure_us: 1_000.0,
            compensation: 0.0,
        };
        let now = Instant::now();

        assert!(controller.evaluate(0.1, &mut state, now).is_some());
        let after_first = state;
        assert!(controller
            .evaluate(0.1, &mut state, now + Duration::from_millis(2_999))
            .is_none());
        assert_eq!(state, after_first);

        assert!(controller
            .evaluate(0.1, &mut state, now + Duration::from_millis(3_000))
            .is_some());
        assert_eq!(controller.adjustments(), 2);
    }

    #[test]
    fn test_falls_through_to_exposure_time_when_gain_saturated() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 16.0,
            exposure_us: 1_000.0,
            compensation: 0.0,
        };

        let adj = controller.evaluate(0.05, &mut state, Instant::now()).unwrap();
        assert_eq!(adj.param, ExposureParam::ExposureTime);
        assert_eq!(state.exposure_us, 2_000.0);
    }

    #[test]
    fn test_bright_lowers_exposure_time_before_gain() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 4.0,
            exposure_us: 150.0,
            compensation: -2.0,
        };

        let adj = controller.evaluate(0.9, &mut state, Instant::now()).unwrap();
        assert_eq!(adj.param, ExposureParam::ExposureTime);
        assert_eq!(adj.direction, Direction::Decrease);
        assert_eq!(state.exposure_us, 100.0);
    }

    #[test]
    fn test_in_band_does_nothing_and_keeps_timer() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState::default();
        let now = Instant::now();

        assert!(controller.evaluate(0.5, &mut state, now).is_none());
        assert!(!controller.in_cooldown(now));
    }

    #[test]
    fn test_manual_saturated_falls_through_to_compensation() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 16.0,
            exposure_us: 20_000.0,
            compensation: 0.0,
        };

        let adj = controller.evaluate(0.01, &mut state, Instant::now()).unwrap();
        assert_eq!(adj.param, ExposureParam::Compensation);
        assert_eq!(adj.direction, Direction::Increase);
        assert_eq!(state.compensation, 1.0);
        assert_eq!(state.gain, 16.0);
    }

    #[test]
    fn test_bright_undoes_compensation_first() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 16.0,
            exposure_us: 20_000.0,
            compensation: 2.0,
        };

        let adj = controller.evaluate(0.95, &mut state, Instant::now()).unwrap();
        assert_eq!(adj.param, ExposureParam::Compensation);
        assert_eq!(state.compensation, 1.0);
        assert_eq!(state.exposure_us, 20_000.0);
    }

    #[test]
    fn test_saturated_everywhere_returns_none() {
        let mut controller = ExposureController::new(ExposureConfig::default(), bounds());
        let mut state = ExposureState {
            gain: 16.0,
            exposure_us: 20_000.0,
            compensation: 2.0,
        };

        assert!(controller.evaluate(0.01, &mut state, Instant::now()).is_none());
        assert_eq!(controller.adjustments(), 0);
    }

    #[test]
    fn test_compensation_path() {
        let config = ExposureConfig {
            path: ControlPath::Compensation,
            ..Default::default()
        };
        let mut controller = ExposureController::new(config, bounds());
        let mut state = ExposureState::default();

        let adj = controller.evaluate(0.1, &mut state, Instant::now()).unwrap();
        assert_eq!(adj.param, ExposureParam::Compensation);
        assert_eq!(state.compensation, 1.0);
        assert_eq!(state.gain, ExposureState::default().gain);
    }

    #[test]
    fn test_compensation_fallback_without_manual_ranges() {
        let only_comp = ExposureBounds {
            gain: None,
            exposure_us: None,
            compensation: Some(ParamRange::new(-2.0, 2.0)),
        };
        let mut controller = ExposureController::new(ExposureConfig::default(), only_comp);
        let mut state = ExposureState::default();

        let adj = controller.evaluate(0.9, &mut state, Instant::now()).unwrap();
        assert_eq!(adj.param, ExposureParam::Compensation);
        assert_eq!(state.compensation, -1.0);
    }

    #[test]
    fn test_disabled_controller() {
        let config = ExposureConfig {
            enabled: false,
            ..Default::default()
        };
        let mut controller = ExposureController::new(config, bounds());
        let mut state = ExposureState::default();
        assert!(controller.evaluate(0.0, &mut state, Instant::now()).is_none());
    }
}
