//! Statistical analysis over experiment outcome samples.
//!
//! Pure computation: pass-rate significance (two-proportion chi-square,
//! Yates-corrected for small expected counts), continuous-metric
//! significance (Welch's t-test with Satterthwaite degrees of freedom),
//! Wilson score and t/z confidence intervals, Cohen's d effect sizes,
//! closed-form two-proportion sample sizes, and conclusion
//! recommendations.
//!
//! Zero-sample comparisons return well-defined neutral results rather
//! than erroring; truly invalid inputs (bad alpha, zero effect) are
//! `StatsError`s.

use serde::Serialize;

use crate::domain::error::StatsError;
use crate::domain::models::ConclusionReason;

/// Default significance threshold when the caller supplies none.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Result of a two-proportion chi-square test.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PassRateComparison {
    pub chi_square: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Whether the Yates continuity correction was applied
    pub yates_corrected: bool,
}

impl PassRateComparison {
    /// Neutral result for degenerate inputs (an empty arm).
    fn neutral() -> Self {
        Self {
            chi_square: 0.0,
            p_value: 1.0,
            significant: false,
            yates_corrected: false,
        }
    }
}

/// Qualitative magnitude of a Cohen's d effect size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn from_cohens_d(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            Self::Negligible
        } else if d < 0.5 {
            Self::Small
        } else if d < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

/// Result of a Welch two-sample t-test.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeanComparison {
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Cohen's d (pooled standard deviation)
    pub effect_size: f64,
    pub effect_magnitude: EffectMagnitude,
}

impl MeanComparison {
    fn neutral() -> Self {
        Self {
            t_statistic: 0.0,
            degrees_of_freedom: 0.0,
            p_value: 1.0,
            significant: false,
            effect_size: 0.0,
            effect_magnitude: EffectMagnitude::Negligible,
        }
    }
}

/// Recommendation about whether an experiment has enough evidence.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConclusionRecommendation {
    pub reason: ConclusionReason,
    pub pass_rate_comparison: PassRateComparison,
}

/// Stateless statistics engine.
pub struct StatisticsService;

impl StatisticsService {
    pub fn new() -> Self {
        Self
    }

    /// Two-proportion chi-square test with one degree of freedom.
    ///
    /// The Yates continuity correction is applied whenever any expected
    /// cell count falls below 5.
    pub fn compare_pass_rates(
        &self,
        passes_a: u32,
        n_a: u32,
        passes_b: u32,
        n_b: u32,
        threshold: f64,
    ) -> PassRateComparison {
        if n_a == 0 || n_b == 0 {
            return PassRateComparison::neutral();
        }

        let (a, b) = (f64::from(passes_a), f64::from(n_a - passes_a));
        let (c, d) = (f64::from(passes_b), f64::from(n_b - passes_b));
        let n = a + b + c + d;

        let row1 = a + c; // total passes
        let row2 = b + d; // total failures
        let col1 = a + b; // arm A
        let col2 = c + d; // arm B

        if row1 == 0.0 || row2 == 0.0 {
            // All samples agree; no difference to test.
            return PassRateComparison::neutral();
        }

        let expected = [
            row1 * col1 / n,
            row2 * col1 / n,
            row1 * col2 / n,
            row2 * col2 / n,
        ];
        let yates = expected.iter().any(|&e| e < 5.0);

        let observed = [a, b, c, d];
        let chi_square: f64 = observed
            .iter()
            .zip(expected.iter())
            .map(|(&o, &e)| {
                let diff = (o - e).abs();
                let diff = if yates { (diff - 0.5).max(0.0) } else { diff };
                diff * diff / e
            })
            .sum();

        let p_value = chi_square_p_value_1df(chi_square);
        PassRateComparison {
            chi_square,
            p_value,
            significant: p_value < threshold,
            yates_corrected: yates,
        }
    }

    /// Welch's unequal-variance t-test with Satterthwaite-approximated
    /// degrees of freedom, plus Cohen's d.
    pub fn compare_means(&self, a: &[f64], b: &[f64], threshold: f64) -> MeanComparison {
        if a.len() < 2 || b.len() < 2 {
            return MeanComparison::neutral();
        }

        let (n_a, n_b) = (a.len() as f64, b.len() as f64);
        let (mean_a, mean_b) = (mean(a), mean(b));
        let (var_a, var_b) = (variance(a), variance(b));

        let se_sq = var_a / n_a + var_b / n_b;
        if se_sq <= 0.0 {
            return MeanComparison::neutral();
        }

        let t_statistic = (mean_a - mean_b) / se_sq.sqrt();

        // Satterthwaite approximation.
        let df = se_sq * se_sq
            / ((var_a / n_a).powi(2) / (n_a - 1.0) + (var_b / n_b).powi(2) / (n_b - 1.0));

        let p_value = 2.0 * (1.0 - t_cdf(t_statistic.abs(), df));

        let pooled_sd =
            (((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0)).sqrt();
        let effect_size = if pooled_sd > 0.0 {
            (mean_a - mean_b) / pooled_sd
        } else {
            0.0
        };

        MeanComparison {
            t_statistic,
            degrees_of_freedom: df,
            p_value,
            significant: p_value < threshold,
            effect_size,
            effect_magnitude: EffectMagnitude::from_cohens_d(effect_size),
        }
    }

    /// Wilson score interval for a proportion. Robust at small n, unlike
    /// the normal approximation.
    pub fn proportion_ci(&self, successes: u32, n: u32, confidence: f64) -> (f64, f64) {
        if n == 0 {
            return (0.0, 0.0);
        }
        let n_f = f64::from(n);
        let p = f64::from(successes) / n_f;
        let z = normal_quantile(1.0 - (1.0 - confidence) / 2.0);
        let z2 = z * z;

        let denom = 1.0 + z2 / n_f;
        let center = (p + z2 / (2.0 * n_f)) / denom;
        let margin = (z / denom) * (p * (1.0 - p) / n_f + z2 / (4.0 * n_f * n_f)).sqrt();

        ((center - margin).max(0.0), (center + margin).min(1.0))
    }

    /// Confidence interval for a mean: Student's t for small samples, the
    /// normal approximation once n is large.
    pub fn mean_ci(&self, values: &[f64], confidence: f64) -> (f64, f64) {
        if values.is_empty() {
            return (0.0, 0.0);
        }
        if values.len() == 1 {
            return (values[0], values[0]);
        }
        let n = values.len() as f64;
        let m = mean(values);
        let se = (variance(values) / n).sqrt();
        let tail = 1.0 - (1.0 - confidence) / 2.0;
        let critical = if values.len() >= 30 {
            normal_quantile(tail)
        } else {
            t_quantile(tail, n - 1.0)
        };
        (m - critical * se, m + critical * se)
    }

    /// Closed-form per-arm sample size for detecting a shift from
    /// `baseline_rate` to `baseline_rate + minimum_detectable_effect` at
    /// significance `alpha` with the given power. Rounded up.
    pub fn required_sample_size(
        &self,
        baseline_rate: f64,
        minimum_detectable_effect: f64,
        alpha: f64,
        power: f64,
    ) -> Result<u64, StatsError> {
        if !(0.0..=1.0).contains(&baseline_rate) {
            return Err(StatsError::InvalidProportion(baseline_rate));
        }
        if !(0.0..1.0).contains(&alpha) || alpha == 0.0 {
            return Err(StatsError::InvalidAlpha(alpha));
        }
        if !(0.0..1.0).contains(&power) || power == 0.0 {
            return Err(StatsError::InvalidPower(power));
        }
        if minimum_detectable_effect == 0.0 {
            return Err(StatsError::ZeroEffect);
        }

        let p1 = baseline_rate;
        let p2 = (baseline_rate + minimum_detectable_effect).clamp(0.0, 1.0);
        if (p2 - p1).abs() < f64::EPSILON {
            return Err(StatsError::ZeroEffect);
        }
        let p_bar = (p1 + p2) / 2.0;

        let z_alpha = normal_quantile(1.0 - alpha / 2.0);
        let z_beta = normal_quantile(power);

        let numerator = z_alpha * (2.0 * p_bar * (1.0 - p_bar)).sqrt()
            + z_beta * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt();
        let n = (numerator * numerator) / ((p2 - p1) * (p2 - p1));

        Ok(n.ceil() as u64)
    }

    /// Decide whether an experiment has enough evidence to conclude.
    ///
    /// Reasons, checked in order and reported distinctly:
    /// 1. either arm reached max sample size;
    /// 2. both arms reached min sample size and the pass-rate test is
    ///    significant;
    /// 3. both arms accrued `grace_samples` beyond minimum and the
    ///    observed pass-rate delta is below `practical_delta`.
    #[allow(clippy::too_many_arguments)]
    pub fn recommend_conclusion(
        &self,
        passes_control: u32,
        n_control: u32,
        passes_treatment: u32,
        n_treatment: u32,
        min_sample_size: u32,
        max_sample_size: u32,
        significance_threshold: f64,
        practical_delta: f64,
        grace_samples: u32,
    ) -> ConclusionRecommendation {
        let comparison = self.compare_pass_rates(
            passes_control,
            n_control,
            passes_treatment,
            n_treatment,
            significance_threshold,
        );

        let smaller_arm = n_control.min(n_treatment);
        let larger_arm = n_control.max(n_treatment);

        let reason = if larger_arm >= max_sample_size {
            ConclusionReason::MaxSampleReached
        } else if smaller_arm >= min_sample_size && comparison.significant {
            ConclusionReason::SignificanceAchieved
        } else if smaller_arm >= min_sample_size + grace_samples
            && observed_delta(passes_control, n_control, passes_treatment, n_treatment)
                < practical_delta
        {
            ConclusionReason::NoMeaningfulDifference
        } else {
            ConclusionReason::ContinueCollecting
        };

        ConclusionRecommendation {
            reason,
            pass_rate_comparison: comparison,
        }
    }
}

impl Default for StatisticsService {
    fn default() -> Self {
        Self::new()
    }
}

fn observed_delta(passes_a: u32, n_a: u32, passes_b: u32, n_b: u32) -> f64 {
    if n_a == 0 || n_b == 0 {
        return 0.0;
    }
    (f64::from(passes_a) / f64::from(n_a) - f64::from(passes_b) / f64::from(n_b)).abs()
}

// ---------------------------------------------------------------------------
// Numerical helpers
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() as f64 - 1.0)
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Standard normal CDF.
fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Standard normal quantile, Acklam's rational approximation
/// (|relative error| < 1.15e-9 on (0, 1)).
fn normal_quantile(p: f64) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0);

    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_690e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Chi-square upper tail probability for one degree of freedom.
///
/// With 1 df, X ~ chi2(1) is Z^2, so P(X > x) = 2 * (1 - Phi(sqrt(x))).
fn chi_square_p_value_1df(chi_square: f64) -> f64 {
    if chi_square <= 0.0 {
        return 1.0;
    }
    (2.0 * (1.0 - normal_cdf(chi_square.sqrt()))).clamp(0.0, 1.0)
}

/// Lanczos approximation for ln Gamma.
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        1.208_650_973_866_179e-3,
        -5.395_239_384_953e-6,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for coeff in COEFFS {
        y += 1.0;
        ser += coeff / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized incomplete beta function via continued fraction
/// (Numerical Recipes `betacf`).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3.0e-12;
    const FPMIN: f64 = 1.0e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Student's t CDF.
fn t_cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 {
        return 0.5;
    }
    let x = df / (df + t * t);
    let tail = 0.5 * incomplete_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Student's t quantile by bisection over `t_cdf`.
fn t_quantile(p: f64, df: f64) -> f64 {
    debug_assert!(p > 0.5 && p < 1.0);
    let mut lo = 0.0_f64;
    let mut hi = 150.0_f64;
    for _ in 0..200 {
        let mid = (lo + hi) / 2.0;
        if t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-10 {
            break;
        }
    }
    (lo + hi) / 2.0
}
