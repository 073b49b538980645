//! Three-parameter Weibull calibration of null score distributions
//!
//! The tail of the score distribution is fit by rank regression on Y:
//! for a Weibull survival function `S(x) = exp(-((x + shift) / eta)^beta)`,
//! `ln(-ln S)` is linear in `ln(x + shift)` with slope `beta`. Empirical
//! survival values are Bernard's median ranks. The shift is chosen by a grid
//! search maximizing the correlation of the linearized data.
//!
//! http://www.chinarel.com/onlincebook/LifeDataWeb/rank_regression_on_y.htm

use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct WeibullFit {
    pub eta: f64,
    pub beta: f64,
    pub shift: f64,
    pub correlation: f64,
}

/// Fit `eta` and `beta` for a fixed `shift`.
///
/// `data` must be sorted in descending order. Only the first `fit_points`
/// values are used, but ranks are relative to `total_points`.
pub fn fit_two_parameter(
    data: &[f32],
    fit_points: usize,
    total_points: usize,
    shift: f64,
) -> Option<WeibullFit> {
    let n = total_points as f64;
    let mut xs = Vec::with_capacity(fit_points);
    let mut ys = Vec::with_capacity(fit_points);

    for (idx, score) in data.iter().take(fit_points).enumerate() {
        let x = *score as f64 + shift;
        // Sorted descending: nothing further down can be positive either
        if x <= 0.0 {
            break;
        }
        let survival = (idx as f64 + 1.0 - 0.3) / (n + 0.4);
        xs.push(x.ln());
        ys.push((-survival.ln()).ln());
    }

    if xs.len() < 2 {
        return None;
    }

    let len = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / len;
    let y_mean = ys.iter().sum::<f64>() / len;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let (dx, dy) = (x - x_mean, y - y_mean);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let beta = sxy / sxx;
    let intercept = y_mean - beta * x_mean;
    let correlation = sxy / (sxx * syy).sqrt();
    if !(beta > 0.0) || !correlation.is_finite() {
        return None;
    }

    Some(WeibullFit {
        eta: (-intercept / beta).exp(),
        beta,
        shift,
        correlation,
    })
}

/// Grid search over `shift` from `max_shift` down to `min_shift`, keeping
/// the fit with the highest correlation. Returns `None` if no fit reaches
/// `corr_threshold`.
pub fn fit_three_parameter(
    data: &[f32],
    fit_points: usize,
    total_points: usize,
    min_shift: f64,
    max_shift: f64,
    step: f64,
    corr_threshold: f64,
) -> Option<WeibullFit> {
    assert!(step > 0.0, "Weibull shift step must be positive");
    let steps = ((max_shift - min_shift) / step).round() as usize;

    let mut best: Option<WeibullFit> = None;
    for i in 0..=steps {
        let shift = max_shift - i as f64 * step;
        if let Some(fit) = fit_two_parameter(data, fit_points, total_points, shift) {
            if best.map_or(true, |b| fit.correlation > b.correlation) {
                best = Some(fit);
            }
        }
    }

    log::trace!("best Weibull fit: {:?}", best);
    best.filter(|fit| fit.correlation >= corr_threshold)
}

/// Probability of a null score at least as large as `score`
pub fn pvalue(score: f64, eta: f64, beta: f64, shift: f64) -> f64 {
    (-neg_log_pvalue(score, eta, beta, shift)).exp()
}

/// `-ln` of [`pvalue`], computed without leaving log space so that scores
/// far out in the tail stay finite
pub fn neg_log_pvalue(score: f64, eta: f64, beta: f64, shift: f64) -> f64 {
    let x = score + shift;
    if x <= 0.0 {
        return 0.0;
    }
    (x / eta).powf(beta)
}

/// Family-wise p-value over `trials` independent candidates,
/// `1 - (1 - p)^trials`. Approximately `p * trials` when that is small.
pub fn bonferroni(p: f64, trials: usize) -> f64 {
    if p >= 1.0 {
        return 1.0;
    }
    -(trials.max(1) as f64 * (-p).ln_1p()).exp_m1()
}

/// `-ln` of [`bonferroni`], taking and returning `-ln p`. Once `p`
/// underflows, the correction is `p * trials`.
pub fn neg_log_bonferroni(neg_log_p: f64, trials: usize) -> f64 {
    let corrected = bonferroni((-neg_log_p).exp(), trials);
    match corrected > 0.0 {
        true => (-corrected.ln()).max(0.0),
        false => neg_log_p - (trials.max(1) as f64).ln(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Exact median-rank quantiles of a Weibull distribution, descending
    fn quantiles(n: usize, eta: f64, beta: f64, shift: f64) -> Vec<f32> {
        (0..n)
            .map(|idx| {
                let survival = (idx as f64 + 0.7) / (n as f64 + 0.4);
                (eta * (-survival.ln()).powf(1.0 / beta) - shift) as f32
            })
            .collect()
    }

    #[test]
    fn recover_two_parameters() {
        let data = quantiles(200, 1.5, 3.0, 0.0);
        let fit = fit_two_parameter(&data, 200, 200, 0.0).unwrap();
        assert!((fit.eta - 1.5).abs() < 1e-3, "{:?}", fit);
        assert!((fit.beta - 3.0).abs() < 1e-2, "{:?}", fit);
        assert!(fit.correlation > 0.9999);
    }

    #[test]
    fn recover_shift() {
        let data = quantiles(500, 2.0, 4.0, 1.0);
        let fit = fit_three_parameter(&data, 500, 500, -5.0, 5.0, 0.05, 0.0).unwrap();
        assert!((fit.shift - 1.0).abs() < 0.11, "{:?}", fit);
        assert!((fit.beta - 4.0).abs() < 0.4, "{:?}", fit);
        assert!((fit.eta - 2.0).abs() < 0.2, "{:?}", fit);
    }

    #[test]
    fn tail_fit_uses_global_ranks() {
        // Fitting only the top of the distribution still recovers the
        // parameters, because ranks are relative to the whole pool
        let data = quantiles(400, 1.2, 2.5, 0.0);
        let fit = fit_two_parameter(&data, 100, 400, 0.0).unwrap();
        assert!((fit.eta - 1.2).abs() < 1e-2, "{:?}", fit);
        assert!((fit.beta - 2.5).abs() < 5e-2, "{:?}", fit);
    }

    #[test]
    fn degenerate_data() {
        assert!(fit_two_parameter(&[1.0], 1, 1, 0.0).is_none());
        // All points shifted below zero
        assert!(fit_two_parameter(&[1.0, 0.5, 0.2], 3, 3, -2.0).is_none());
        // Constant scores have no correlation
        assert!(fit_three_parameter(&[1.0; 50], 50, 50, -0.5, 0.5, 0.1, 0.0).is_none());
    }

    #[test]
    fn correlation_threshold() {
        let data = quantiles(100, 1.5, 3.0, 0.0);
        assert!(fit_three_parameter(&data, 100, 100, -1.0, 1.0, 0.05, 0.999).is_some());
        assert!(fit_three_parameter(&data, 100, 100, -1.0, 1.0, 0.05, 1.5).is_none());
    }

    #[test]
    fn pvalues() {
        assert_eq!(pvalue(-3.0, 1.0, 2.0, 1.0), 1.0);
        let p = pvalue(2.0, 1.0, 2.0, 0.0);
        assert!((p - (-4.0f64).exp()).abs() < 1e-12);
        // Larger scores are less likely under the null
        assert!(pvalue(3.0, 1.0, 2.0, 0.0) < p);
    }

    #[test]
    fn bonferroni_correction() {
        let p = 1e-8;
        assert!((bonferroni(p, 1000) - 1e-5).abs() < 1e-9);
        assert_eq!(bonferroni(1.0, 10), 1.0);
        assert!((bonferroni(0.5, 2) - 0.75).abs() < 1e-12);
        assert!(bonferroni(0.3, 10_000) <= 1.0);
    }

    #[test]
    fn extreme_tail() {
        // exp(-(12 / 1.5)^4) underflows, but its logarithm does not
        assert_eq!(pvalue(12.0, 1.5, 4.0, 0.0), 0.0);
        let mut last = 0.0;
        for score in [6.0, 12.0, 20.0, 50.0] {
            let neg_log_p = neg_log_pvalue(score, 1.5, 4.0, 0.0);
            let corrected = neg_log_bonferroni(neg_log_p, 1000);
            assert!(neg_log_p.is_finite() && corrected.is_finite(), "{}", score);
            assert!(corrected > last, "{} {}", corrected, last);
            assert!(corrected <= neg_log_p);
            last = corrected;
        }
        assert!((neg_log_pvalue(12.0, 1.5, 4.0, 0.0) - 4096.0).abs() < 1e-9);
        assert!((neg_log_bonferroni(4096.0, 1000) - (4096.0 - 1000f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn log_bonferroni_limits() {
        // Corrected p-values saturate at 1
        assert_eq!(neg_log_bonferroni(0.0, 50), 0.0);
        assert!(neg_log_bonferroni(0.1, 10_000) < 1e-12);
        // And agree with the linear form where it is representable
        let neg_log_p = -(1e-8f64).ln();
        let expected = -bonferroni(1e-8, 1000).ln();
        assert!((neg_log_bonferroni(neg_log_p, 1000) - expected).abs() < 1e-6);
    }
}
