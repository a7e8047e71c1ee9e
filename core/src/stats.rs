/// Streaming first/second moments over per-block counts.
/// Sum, count and sum-of-squares are all commutative, so partials computed by
/// parallel workers merge without locks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMoments {
    pub count: u64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl RunningMoments {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    #[inline(always)]
    pub fn merge(&mut self, other: &RunningMoments) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Population variance (biased, divides by n): the slot range is treated
    /// as the full population, not a sample from a larger one.
    pub fn population_variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }

    pub fn population_std_dev(&self) -> f64 {
        self.population_variance().sqrt()
    }
}

/// Inverse CDF of the standard normal distribution (Acklam's rational
/// approximation, |relative error| < 1.15e-9 across the open unit interval).
pub fn normal_quantile(p: f64) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0, "quantile probability out of range: {}", p);

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        // Lower tail
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        // Central region
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        // Upper tail, by symmetry
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -((((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0))
    }
}

/// Two-sided z value for a confidence level, e.g. 0.9999 -> ~3.8906.
pub fn z_for_confidence(level: f64) -> f64 {
    normal_quantile(1.0 - (1.0 - level) / 2.0)
}

/// Wilson score interval for a binomial proportion.
/// Chosen over the Wald interval for sane behavior at extreme confidence
/// levels and small N. `successes` may be fractional (smeared credit).
/// Returns `None` when there are no trials.
pub fn wilson_interval(successes: f64, trials: f64, z: f64) -> Option<(f64, f64)> {
    if trials <= 0.0 {
        return None;
    }
    let n = trials;
    let p_hat = (successes / n).clamp(0.0, 1.0);
    let z_sq = z * z;

    let denom = 1.0 + z_sq / n;
    let center = (p_hat + z_sq / (2.0 * n)) / denom;
    let half = (z / denom) * (p_hat * (1.0 - p_hat) / n + z_sq / (4.0 * n * n)).sqrt();

    Some(((center - half).max(0.0), (center + half).min(1.0)))
}

/// Interval for the total sandwich count an N-slot validator would show if it
/// behaved like the cluster average: N*mu +/- z*sigma*sqrt(N).
/// Returns `None` when there are no observed slots.
pub fn expected_count_interval(n: f64, mean: f64, std_dev: f64, z: f64) -> Option<(f64, f64)> {
    if n <= 0.0 {
        return None;
    }
    let center = n * mean;
    let half = z * std_dev * n.sqrt();
    Some(((center - half).max(0.0), center + half))
}
