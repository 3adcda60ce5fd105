//! Property-based tests for walk construction and detection statistics.

use proptest::prelude::*;
use utbe::circuits::verify_causal_order;
use utbe::{
    Circuit, CrystalOrientation, DetectionMode, ModeAssignment, OutcomePattern, Simulator,
    WalkConfig,
};

fn arb_orientation() -> impl Strategy<Value = CrystalOrientation> {
    prop_oneof![Just(CrystalOrientation::ZeroDeg), Just(CrystalOrientation::FortyFiveDeg)]
}

/// Small noisy threshold walks: 1-3 steps, moderate squeezing and seed.
fn arb_threshold_config() -> impl Strategy<Value = WalkConfig> {
    (1_usize..=3, 0.0..0.6_f64, 0.0..0.4_f64, 0.0..1.0_f64, 0.0..0.3_f64, arb_orientation()).prop_map(
        |(steps, r, alpha, loss, mismatch, first)| {
            WalkConfig::new(steps)
                .with_squeezing(r)
                .with_coherent(alpha, 0.3)
                .with_loss(loss)
                .with_mode_mismatch(mismatch)
                .with_first_orientation(first)
                .with_detection(DetectionMode::Threshold)
        },
    )
}

proptest! {
    #[test]
    fn prop_mode_assignment_is_bijective(steps in 1_usize..40, noise in 0_usize..20) {
        let modes = ModeAssignment::new(steps, noise, 128).unwrap();
        prop_assert_eq!(modes.total_modes(), steps + 2 + noise);
        for (index, key) in modes.keys().enumerate() {
            prop_assert_eq!(modes.mode(key).unwrap(), index);
            prop_assert_eq!(modes.key_of(index).unwrap(), key);
        }
    }

    #[test]
    fn prop_built_walks_are_causal(steps in 1_usize..12, first in arb_orientation(), phase in -3.0..3.0_f64) {
        let config = WalkConfig::new(steps).with_first_orientation(first).with_group_delay_phase(phase);
        let circuit = Circuit::from_config(&config).unwrap();
        prop_assert!(verify_causal_order(circuit.operations()).is_ok());
        let swaps = circuit.operations().iter().filter(|op| op.is_swap()).count();
        prop_assert_eq!(swaps, steps * (steps + 1) / 2);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_threshold_patterns_form_a_distribution(config in arb_threshold_config()) {
        let result = Simulator::new().simulate(&config).unwrap();
        let table = result.threshold_table().unwrap();
        for (_, p) in table.iter() {
            prop_assert!((0.0..=1.0).contains(&p));
        }
        let herald = result.herald_probability().unwrap();
        prop_assert!((table.total() - herald).abs() < 1e-8);
    }

    #[test]
    fn prop_loss_never_raises_all_click_rate(config in arb_threshold_config(), extra in 0.0..1.0_f64) {
        let bins: Vec<usize> = (1..=config.steps).collect();
        let pattern = OutcomePattern::threshold(vec![true; bins.len()]);
        let base = Simulator::new().simulate(&config).unwrap().with_monitored_time_bins(&bins).unwrap();
        let lossier_config = config.clone().with_loss(config.loss + (1.0 - config.loss) * extra);
        let lossier = Simulator::new().simulate(&lossier_config).unwrap().with_monitored_time_bins(&bins).unwrap();
        prop_assert!(lossier.probability(&pattern).unwrap() <= base.probability(&pattern).unwrap() + 1e-9);
    }

    #[test]
    fn prop_fock_probabilities_in_unit_interval(steps in 1_usize..=2, r in 0.0..0.5_f64, alpha in 0.0..0.5_f64) {
        let config = WalkConfig::new(steps).with_squeezing(r).with_coherent(alpha, 0.0);
        let result = Simulator::new().simulate(&config).unwrap();
        let table = result.fock_table(2).unwrap();
        for (_, p) in table.iter() {
            prop_assert!((0.0..=1.0).contains(&p));
        }
        prop_assert!(table.total() <= result.herald_probability().unwrap() + 1e-9);
    }
}
