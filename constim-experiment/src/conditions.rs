use constim_core::Condition;

/// Upper bound on the number of contrast levels one range may produce.
pub const MAX_CONTRAST_LEVELS: usize = 10_000;

/// Number of levels `contrast_range` yields, or `None` when the inputs are
/// degenerate or the count exceeds [`MAX_CONTRAST_LEVELS`].
pub fn contrast_level_count(start: f64, stop: f64, step: f64) -> Option<usize> {
    if !(step > 0.0) || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
        return None;
    }
    if stop < start {
        return Some(0);
    }
    let intervals = ((stop - start) / step + 1e-9).floor();
    if !intervals.is_finite() || intervals >= MAX_CONTRAST_LEVELS as f64 {
        return None;
    }
    (intervals as usize)
        .checked_add(1)
        .filter(|&n| n <= MAX_CONTRAST_LEVELS)
}

/// Inclusive contrast sequence `start, start+step, ..., stop`.
///
/// Empty when `step` is not positive, `stop < start`, or the range would hold
/// more than [`MAX_CONTRAST_LEVELS`] values. Values are rounded to ten decimals
/// so accumulated float error does not leak into the results file.
pub fn contrast_range(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let Some(n) = contrast_level_count(start, stop, step) else {
        return Vec::new();
    };
    (0..n)
        .map(|i| round10(start + i as f64 * step))
        .collect()
}

fn round10(v: f64) -> f64 {
    (v * 1e10).round() / 1e10
}

/// Cross-product of contrast × frequency, contrast in the outer loop.
///
/// Repeated input levels are collapsed to their first occurrence so every
/// produced pair is distinct.
pub fn enumerate_conditions(contrasts: &[f64], frequencies: &[f64]) -> Vec<Condition> {
    let contrasts = distinct(contrasts);
    let frequencies = distinct(frequencies);

    let mut conditions = Vec::with_capacity(contrasts.len() * frequencies.len());
    for &contrast in &contrasts {
        for &frequency in &frequencies {
            conditions.push(Condition {
                index: conditions.len(),
                contrast,
                frequency,
            });
        }
    }
    conditions
}

fn distinct(levels: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(levels.len());
    for &v in levels {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
