//! Operator library.
//!
//! Pure functions over `f64` slices. `NaN` marks an undefined value.
//!
//! Cross-sectional functions receive every instrument's value at one time
//! point. Statistics are computed over the defined values only and undefined
//! inputs stay undefined in the output. A cross-section with no defined value
//! yields an all-undefined result rather than an error.
//!
//! Time-series functions receive one instrument's history in time order.
//! A trailing window of size `w` ends at the current point (inclusive); the
//! first `w - 1` points are undefined, as is any window containing an
//! undefined value. `ts_delta` and `ts_returns` look exactly `w` steps back,
//! so their first `w` points are undefined.
//!
//! Standard deviation and covariance use the sample estimator (n - 1).

use std::cmp::Ordering;

use crate::domain::error::FactorError;

fn defined(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    sample_cov(values, values).sqrt()
}

fn sample_cov(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let mx = mean(x);
    let my = mean(y);
    let sum: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    sum / (n - 1) as f64
}

/// Average ranks (1-based) of `values`, highest value first when `descending`.
///
/// Undefined entries keep `NaN`. Ties share the mean of their positions.
fn average_ranks(values: &[f64], descending: bool) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    order.sort_by(|&a, &b| {
        let ord = values[a].total_cmp(&values[b]);
        if descending { ord.reverse() } else { ord }
    });

    let mut ranks = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start+1 ..= end share their mean
        let avg = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = avg;
        }
        start = end;
    }
    ranks
}

// ---------------------------------------------------------------------------
// Cross-sectional
// ---------------------------------------------------------------------------

/// Descending fractional rank: the highest value receives 1, ties average.
pub fn rank(values: &[f64]) -> Vec<f64> {
    average_ranks(values, true)
}

/// `(s - mean(s)) / std(s)` over the cross-section.
pub fn zscore(values: &[f64]) -> Result<Vec<f64>, FactorError> {
    let present: Vec<f64> = defined(values).collect();
    if present.is_empty() {
        return Ok(vec![f64::NAN; values.len()]);
    }
    let mu = mean(&present);
    let sigma = sample_std(&present);
    if !(sigma > 0.0) {
        return Err(FactorError::degenerate(
            "zscore",
            "cross-section has zero or undefined standard deviation",
        ));
    }
    Ok(values.iter().map(|v| (v - mu) / sigma).collect())
}

/// Min-max scaling to `[0, 1]`.
pub fn scale(values: &[f64]) -> Result<Vec<f64>, FactorError> {
    let (min, max) = defined(values).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return Ok(vec![f64::NAN; values.len()]);
    }
    if max == min {
        return Err(FactorError::degenerate(
            "scale",
            format!("cross-section is constant ({min})"),
        ));
    }
    let range = max - min;
    Ok(values.iter().map(|v| (v - min) / range).collect())
}

/// Linear-interpolated quantile of sorted data.
fn interpolated_quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Ten equal-population buckets labeled 0-9 by ascending value.
///
/// Bucket edges are the 0%, 10%, ..., 100% quantiles. Duplicate edges are
/// merged, so heavily tied data produces fewer, wider buckets and a constant
/// cross-section lands entirely in bucket 0.
pub fn decile(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = defined(values).collect();
    if sorted.is_empty() {
        return vec![f64::NAN; values.len()];
    }
    sorted.sort_by(f64::total_cmp);

    let mut edges: Vec<f64> = Vec::with_capacity(11);
    for k in 0..=10 {
        let edge = interpolated_quantile(&sorted, k as f64 / 10.0);
        if edges.last() != Some(&edge) {
            edges.push(edge);
        }
    }

    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return f64::NAN;
            }
            if edges.len() < 2 {
                return 0.0;
            }
            // first bucket is closed on the left, the rest are (lo, hi]
            let bucket = edges[1..]
                .iter()
                .position(|&upper| v <= upper)
                .unwrap_or(edges.len() - 2);
            bucket as f64
        })
        .collect()
}

/// 1.0 where the ascending percentile rank exceeds `q`, else 0.0.
pub fn quantile(values: &[f64], q: f64) -> Vec<f64> {
    let count = defined(values).count() as f64;
    average_ranks(values, false)
        .into_iter()
        .map(|r| {
            if r.is_nan() {
                f64::NAN
            } else if r / count > q {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// `x` minus its least-squares fit `a + b * y`.
pub fn residual(x: &[f64], y: &[f64]) -> Result<Vec<f64>, FactorError> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.is_empty() {
        return Ok(vec![f64::NAN; x.len()]);
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let syy: f64 = pairs.iter().map(|p| (p.1 - my).powi(2)).sum();
    if !(syy > 0.0) {
        return Err(FactorError::degenerate(
            "residual",
            "predictor has zero variance",
        ));
    }
    let sxy: f64 = pairs.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let slope = sxy / syy;
    let intercept = mx - slope * my;

    Ok(x
        .iter()
        .zip(y)
        .map(|(a, b)| a - (intercept + slope * b))
        .collect())
}

// ---------------------------------------------------------------------------
// Time-series
// ---------------------------------------------------------------------------

/// Apply `f` to every complete, fully defined trailing window.
fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let warmup = window.saturating_sub(1);
    (0..values.len())
        .map(|i| {
            if window == 0 || i < warmup {
                return f64::NAN;
            }
            let slice = &values[i + 1 - window..=i];
            if slice.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                f(slice)
            }
        })
        .collect()
}

fn rolling_pair(
    x: &[f64],
    y: &[f64],
    window: usize,
    f: impl Fn(&[f64], &[f64]) -> f64,
) -> Vec<f64> {
    let warmup = window.saturating_sub(1);
    (0..x.len())
        .map(|i| {
            if window == 0 || i < warmup {
                return f64::NAN;
            }
            let xs = &x[i + 1 - window..=i];
            let ys = &y[i + 1 - window..=i];
            if xs.iter().chain(ys).any(|v| v.is_nan()) {
                f64::NAN
            } else {
                f(xs, ys)
            }
        })
        .collect()
}

fn lagged(values: &[f64], lag: usize, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if lag == 0 || i < lag {
                f64::NAN
            } else {
                f(values[i], values[i - lag])
            }
        })
        .collect()
}

/// Descending rank of the last element within its window (ties average).
pub fn ts_rank(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        let last = w[w.len() - 1];
        let greater = w.iter().filter(|&&v| v > last).count() as f64;
        let equal = w.iter().filter(|&&v| v == last).count() as f64;
        greater + (equal + 1.0) / 2.0
    })
}

pub fn ts_zscore(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        let sigma = sample_std(w);
        if sigma > 0.0 {
            (w[w.len() - 1] - mean(w)) / sigma
        } else {
            f64::NAN
        }
    })
}

pub fn ts_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, mean)
}

pub fn ts_std_dev(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, sample_std)
}

pub fn ts_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn ts_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn ts_sum(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum())
}

/// `s[t] - s[t - w]`.
pub fn ts_delta(values: &[f64], window: usize) -> Vec<f64> {
    lagged(values, window, |cur, prev| cur - prev)
}

/// `(s[t] - s[t - w]) / s[t - w]`; undefined when the base is zero.
pub fn ts_returns(values: &[f64], window: usize) -> Vec<f64> {
    lagged(values, window, |cur, prev| {
        if prev == 0.0 {
            f64::NAN
        } else {
            (cur - prev) / prev
        }
    })
}

/// Trailing Pearson correlation; undefined when either side is flat.
pub fn correlation(x: &[f64], y: &[f64], window: usize) -> Vec<f64> {
    rolling_pair(x, y, window, |xs, ys| {
        let denom = sample_std(xs) * sample_std(ys);
        if denom > 0.0 {
            sample_cov(xs, ys) / denom
        } else {
            f64::NAN
        }
    })
}

pub fn covariance(x: &[f64], y: &[f64], window: usize) -> Vec<f64> {
    rolling_pair(x, y, window, sample_cov)
}

/// Total order used wherever operators need to compare possibly-undefined values.
pub fn compare_desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
