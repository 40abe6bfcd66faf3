//! Descriptive statistics over `f64` slices. `NaN` entries are skipped.

use crate::query::Stat;

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

pub fn count(values: &[f64]) -> usize {
    finite(values).count()
}

/// Zero for an empty input.
pub fn sum(values: &[f64]) -> f64 {
    finite(values).sum()
}

pub fn mean(values: &[f64]) -> f64 {
    let n = count(values);
    if n == 0 {
        f64::NAN
    } else {
        sum(values) / n as f64
    }
}

pub fn max(values: &[f64]) -> f64 {
    finite(values).reduce(f64::max).unwrap_or(f64::NAN)
}

pub fn min(values: &[f64]) -> f64 {
    finite(values).reduce(f64::min).unwrap_or(f64::NAN)
}

/// Sample standard deviation (n - 1). `NaN` below two points.
pub fn std(values: &[f64]) -> f64 {
    let n = count(values);
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = finite(values).map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

pub fn compute(stat: Stat, values: &[f64]) -> f64 {
    match stat {
        Stat::Mean => mean(values),
        Stat::Max => max(values),
        Stat::Min => min(values),
        Stat::Std => std(values),
        Stat::Sum => sum(values),
        Stat::Count => count(values) as f64,
    }
}

/// Position of the first maximum, skipping `NaN`.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Pearson correlation over pairs where both values are present.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

/// Linear-interpolated quantile of `sorted` (ascending, no `NaN`).
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
