use dlka_train::{consistency_weight, lr_multiplier, ScheduleConfig, ScheduleKind};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_warmup_is_increasing(warmup in 2usize..1000, offset in 0usize..1000) {
        let step = offset % (warmup - 1);
        let config = ScheduleConfig::new().with_warmup(warmup);
        let a = lr_multiplier(step, &config);
        let b = lr_multiplier(step + 1, &config);
        prop_assert!(a < b);
        prop_assert!(a >= 1.0 / 3.0 - 1e-12 && b <= 1.0);
    }

    #[test]
    fn test_cosine_is_bounded(
        warmup in 0usize..50,
        extra in 1usize..500,
        offset in 0usize..600,
        decay in 0.05f64..1.0
    ) {
        let config = ScheduleConfig::new()
            .with_kind(ScheduleKind::CosineLr)
            .with_warmup(warmup)
            .with_epochs(warmup + extra)
            .with_decay(decay);
        prop_assert!(config.validate().is_ok());
        let step = warmup + offset % (extra + 1);

        let m = lr_multiplier(step, &config);
        prop_assert!(m <= 1.0 + 1e-12);
        prop_assert!(m >= decay.powi(3) - 1e-12);
    }

    #[test]
    fn test_step_decay_never_increases(
        milestones in proptest::collection::vec(0usize..100, 0..5),
        step in 0usize..100
    ) {
        let config = ScheduleConfig::new().with_warmup(0).with_milestones(milestones);
        prop_assert!(lr_multiplier(step + 1, &config) <= lr_multiplier(step, &config));
    }

    #[test]
    fn test_consistency_weight_monotone_and_capped(
        epoch in 0usize..20,
        initial in 0.001f64..0.1,
        max in 0.01f64..2.0
    ) {
        let w = consistency_weight(epoch, initial, max);
        prop_assert!(w <= max);
        prop_assert!(consistency_weight(epoch + 1, initial, max) >= w);
    }
}

#[test]
fn test_consistency_weight_saturates_after_epoch_nine() {
    assert_eq!(consistency_weight(9, 0.01, 10.0), consistency_weight(50, 0.01, 10.0));
}
