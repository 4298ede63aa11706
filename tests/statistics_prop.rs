//! Property-based checks over the statistics engine.

use proptest::prelude::*;

use patter::services::statistics::{mean, median, std_dev};
use patter::services::StatisticsService;

proptest! {
    /// The Wilson interval stays inside [0, 1] and brackets the observed
    /// proportion.
    #[test]
    fn wilson_interval_brackets_observed_rate(
        successes in 0u32..=200,
        failures in 0u32..=200,
    ) {
        let n = successes + failures;
        prop_assume!(n > 0);

        let service = StatisticsService::new();
        let (lower, upper) = service.proportion_ci(successes, n, 0.95);
        let observed = f64::from(successes) / f64::from(n);

        prop_assert!(lower >= 0.0);
        prop_assert!(upper <= 1.0);
        prop_assert!(lower <= upper);
        prop_assert!(lower <= observed + 1e-9);
        prop_assert!(upper >= observed - 1e-9);
    }

    /// Chi-square output is a valid test statistic and p-value.
    #[test]
    fn pass_rate_comparison_yields_valid_p_value(
        passes_a in 0u32..=60,
        fails_a in 0u32..=60,
        passes_b in 0u32..=60,
        fails_b in 0u32..=60,
    ) {
        let (n_a, n_b) = (passes_a + fails_a, passes_b + fails_b);
        prop_assume!(n_a > 0 && n_b > 0);

        let service = StatisticsService::new();
        let cmp = service.compare_pass_rates(passes_a, n_a, passes_b, n_b, 0.05);

        prop_assert!(cmp.chi_square >= 0.0);
        prop_assert!((0.0..=1.0).contains(&cmp.p_value));
        prop_assert_eq!(cmp.significant, cmp.p_value < 0.05);
    }

    /// Swapping the arms never changes the test outcome.
    #[test]
    fn pass_rate_comparison_is_symmetric(
        passes_a in 0u32..=60,
        fails_a in 0u32..=60,
        passes_b in 0u32..=60,
        fails_b in 0u32..=60,
    ) {
        let (n_a, n_b) = (passes_a + fails_a, passes_b + fails_b);
        prop_assume!(n_a > 0 && n_b > 0);

        let service = StatisticsService::new();
        let ab = service.compare_pass_rates(passes_a, n_a, passes_b, n_b, 0.05);
        let ba = service.compare_pass_rates(passes_b, n_b, passes_a, n_a, 0.05);

        prop_assert!((ab.chi_square - ba.chi_square).abs() < 1e-9);
        prop_assert!((ab.p_value - ba.p_value).abs() < 1e-9);
    }

    /// Descriptive aggregates stay inside the sample's range.
    #[test]
    fn aggregates_stay_within_sample_bounds(
        values in prop::collection::vec(-1e6f64..1e6, 1..50),
    ) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let m = mean(&values);
        let md = median(&values);
        prop_assert!(m >= lo - 1e-6 && m <= hi + 1e-6);
        prop_assert!(md >= lo - 1e-6 && md <= hi + 1e-6);
        prop_assert!(std_dev(&values) >= 0.0);
    }

    /// A larger minimum detectable effect never requires more samples.
    #[test]
    fn sample_size_shrinks_with_larger_effect(
        baseline in 0.1f64..0.8,
        effect in 0.05f64..0.15,
    ) {
        let service = StatisticsService::new();
        let small = service
            .required_sample_size(baseline, effect, 0.05, 0.8)
            .unwrap();
        let large = service
            .required_sample_size(baseline, effect + 0.05, 0.05, 0.8)
            .unwrap();
        prop_assert!(large <= small);
    }
}
