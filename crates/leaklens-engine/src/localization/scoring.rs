//! Candidate scoring.
//!
//! A candidate's predicted sensor-change vector is compared against the
//! observed one over the sensors where either is non-zero:
//!
//! - `rss_score = 1 / (1 + mean squared residual)`, in (0, 1]
//! - Pearson correlation `rho`, only when both vectors have positive
//!   variance
//! - combined `score = 0.5 * rss_score + 0.25 * (rho + 1)`; without a
//!   usable correlation the score is `rss_score` alone
//!
//! All sums accumulate in `f64`; a non-finite residual scores zero rather
//! than propagating NaN into the ranking.

use ndarray::Array1;

/// Pearson correlation of two equal-length vectors with means removed.
///
/// Returns `None` when either variance is zero (a constant vector carries
/// no correlation information).
#[must_use]
pub fn pearson(a: &Array1<f64>, b: &Array1<f64>) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a > 0.0 && var_b > 0.0 {
        Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Scores one candidate against the observed change vector.
///
/// Returns `(score, n)` where `n` is the number of sensors with a non-zero
/// observed or predicted change. A candidate with `n == 0` scores zero.
#[must_use]
pub fn candidate_score(observed: &Array1<f64>, predicted: &Array1<f64>) -> (f64, usize) {
    debug_assert_eq!(observed.len(), predicted.len());

    let mask: Vec<usize> = (0..observed.len())
        .filter(|&i| observed[i] != 0.0 || predicted[i] != 0.0)
        .collect();
    let n = mask.len();
    if n == 0 {
        return (0.0, 0);
    }

    let o = Array1::from_iter(mask.iter().map(|&i| observed[i]));
    let p = Array1::from_iter(mask.iter().map(|&i| predicted[i]));

    let rss = (&o - &p).mapv(|d| d * d).sum() / n as f64;
    if !rss.is_finite() {
        return (0.0, n);
    }
    let rss_score = 1.0 / (1.0 + rss);

    let score = match pearson(&o, &p) {
        Some(rho) => 0.5 * rss_score + 0.25 * (rho + 1.0),
        None => rss_score,
    };
    (score, n)
}
