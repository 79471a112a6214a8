//! Learning rate and loss weight schedules.
//!
//! Schedules are pure functions of the step counter and a [`ScheduleConfig`],
//! so they can be evaluated independently of any optimizer state. Both
//! kinds share a linear warmup from one third of the base rate.

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::{self, TrainError};

/// Decay applied after warmup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleKind {
    /// Multiply by `decay` once per milestone reached.
    StepLr,
    /// Cosine annealing from the base rate down to `base_lr * decay^3`.
    CosineLr,
}

/// Learning rate schedule configuration.
#[derive(Config, Debug, PartialEq)]
pub struct ScheduleConfig {
    #[config(default = "ScheduleKind::StepLr")]
    pub kind: ScheduleKind,
    /// Peak learning rate.
    #[config(default = "0.001")]
    pub base_lr: f64,
    /// Warmup length in steps.
    #[config(default = "500")]
    pub warmup: usize,
    /// Steps at which [`ScheduleKind::StepLr`] decays.
    #[config(default = "vec![10, 12, 14]")]
    pub milestones: Vec<usize>,
    /// Decay factor.
    #[config(default = "0.5")]
    pub decay: f64,
    /// Length of the cosine period in steps, warmup included.
    #[config(default = "16")]
    pub epochs: usize,
}

impl ScheduleConfig {
    /// Check that the schedule is well defined for every step.
    pub fn validate(&self) -> error::Result<()> {
        if !(self.base_lr > 0.0) {
            return Err(TrainError::invalid_schedule(format!(
                "base_lr must be positive, got {}",
                self.base_lr
            )));
        }
        if !(self.decay > 0.0) {
            return Err(TrainError::invalid_schedule(format!(
                "decay must be positive, got {}",
                self.decay
            )));
        }
        if self.kind == ScheduleKind::CosineLr && self.epochs <= self.warmup {
            tracing::warn!(
                "Cosine schedule has no annealing phase: epochs {} <= warmup {}",
                self.epochs,
                self.warmup
            );
            return Err(TrainError::invalid_schedule(format!(
                "cosine schedule needs epochs > warmup, got epochs={} warmup={}",
                self.epochs, self.warmup
            )));
        }
        Ok(())
    }

    /// Learning rate at `step`.
    pub fn learning_rate(&self, step: usize) -> f64 {
        self.base_lr * lr_multiplier(step, self)
    }
}

/// Factor applied to the base learning rate at `step`.
///
/// During warmup (`step < warmup`) the factor rises linearly from `1/3` to
/// `1`. Afterwards it follows the configured decay. The cosine phase spans at
/// least one step and stays at its floor once `epochs` is reached, so
/// configurations that fail [`ScheduleConfig::validate`] still yield a
/// finite factor.
pub fn lr_multiplier(step: usize, config: &ScheduleConfig) -> f64 {
    if step < config.warmup {
        let progress = step as f64 / config.warmup as f64;
        return 1.0 / 3.0 * (1.0 - progress) + progress;
    }

    match config.kind {
        ScheduleKind::StepLr => {
            let passed = config.milestones.iter().filter(|&&m| m <= step).count();
            config.decay.powi(passed as i32)
        }
        ScheduleKind::CosineLr => {
            let max_lr = config.base_lr;
            let min_lr = max_lr * config.decay.powi(3);
            let span = config.epochs.saturating_sub(config.warmup).max(1);
            let progress = ((step - config.warmup) as f64 / span as f64).min(1.0);
            let cosine = 1.0 + (progress * std::f64::consts::PI).cos();
            (min_lr + 0.5 * (max_lr - min_lr) * cosine) / max_lr
        }
    }
}

/// Epochs at which the consistency loss weight doubles.
const CONSISTENCY_DOUBLING_EPOCHS: [usize; 5] = [1, 3, 5, 7, 9];

/// Weight of the consistency loss at `epoch`.
///
/// Starting from `initial`, the weight doubles at epochs 1, 3, 5, 7 and 9
/// and never exceeds `max`.
pub fn consistency_weight(epoch: usize, initial: f64, max: f64) -> f64 {
    let doublings = CONSISTENCY_DOUBLING_EPOCHS.iter().filter(|&&e| epoch >= e).count();
    (initial * 2f64.powi(doublings as i32)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_config() -> ScheduleConfig {
        ScheduleConfig::new()
            .with_base_lr(0.1)
            .with_warmup(10)
            .with_milestones(vec![20, 30])
            .with_decay(0.5)
    }

    #[test]
    fn test_warmup_ramp() {
        let config = step_config();
        assert!((lr_multiplier(0, &config) - 1.0 / 3.0).abs() < 1e-12);
        assert!((lr_multiplier(5, &config) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(lr_multiplier(10, &config), 1.0);
    }

    #[test]
    fn test_step_decay() {
        let config = step_config();
        assert_eq!(lr_multiplier(19, &config), 1.0);
        assert_eq!(lr_multiplier(20, &config), 0.5);
        assert_eq!(lr_multiplier(31, &config), 0.25);
        assert!((config.learning_rate(31) - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_endpoints() {
        let config = ScheduleConfig::new()
            .with_kind(ScheduleKind::CosineLr)
            .with_base_lr(0.1)
            .with_warmup(2)
            .with_decay(0.5)
            .with_epochs(12);
        config.validate().unwrap();

        assert!((lr_multiplier(2, &config) - 1.0).abs() < 1e-12);
        // min_lr / max_lr = decay^3.
        assert!((lr_multiplier(12, &config) - 0.125).abs() < 1e-12);
        let mid = lr_multiplier(7, &config);
        assert!((mid - (0.125 + 0.5 * 0.875)).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let cosine = ScheduleConfig::new()
            .with_kind(ScheduleKind::CosineLr)
            .with_warmup(16)
            .with_epochs(16);
        assert!(matches!(cosine.validate(), Err(TrainError::InvalidSchedule(_))));

        let decay = step_config().with_decay(0.0);
        assert!(matches!(decay.validate(), Err(TrainError::InvalidSchedule(_))));

        assert!(step_config().validate().is_ok());
    }

    #[test]
    fn test_consistency_weight() {
        assert_eq!(consistency_weight(0, 0.01, 1.0), 0.01);
        assert_eq!(consistency_weight(1, 0.01, 1.0), 0.02);
        assert_eq!(consistency_weight(4, 0.01, 1.0), 0.04);
        assert_eq!(consistency_weight(9, 0.01, 1.0), 0.32);
        assert_eq!(consistency_weight(9, 0.01, 0.1), 0.1);
    }

    #[test]
    fn test_cosine_without_annealing_phase_is_finite() {
        // Default epochs are shorter than the default warmup.
        let config = ScheduleConfig::new().with_kind(ScheduleKind::CosineLr);
        assert!(config.validate().is_err());
        assert!((lr_multiplier(500, &config) - 1.0).abs() < 1e-12);
        for step in [501, 502, 10_000] {
            let m = lr_multiplier(step, &config);
            assert!((m - 0.125).abs() < 1e-12, "step {} gave {}", step, m);
        }

        let equal = config.with_warmup(16);
        assert!((lr_multiplier(16, &equal) - 1.0).abs() < 1e-12);
        assert!((lr_multiplier(17, &equal) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_holds_floor_after_period() {
        let config = ScheduleConfig::new()
            .with_kind(ScheduleKind::CosineLr)
            .with_warmup(0)
            .with_epochs(10);
        assert!((lr_multiplier(10, &config) - 0.125).abs() < 1e-12);
        assert!((lr_multiplier(15, &config) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_config_reloads_from_json() {
        let config = step_config().with_kind(ScheduleKind::CosineLr).with_epochs(40);
        let reloaded = ScheduleConfig::load_binary(config.to_string().as_bytes()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_config_display_is_json() {
        let config = step_config().with_kind(ScheduleKind::CosineLr);
        let json = config.to_string();
        assert!(json.contains("CosineLr"));
        assert!(json.contains("milestones"));
    }
}
