//! Per-bucket extreme preservation

use crate::series::Columns;

/// Keep each bucket's minimum and maximum, then cut the emission to `target`.
///
/// The input is split by index into `ceil(target / 2)` near-equal buckets.
/// The minimum is the earliest minimal element and the maximum the latest
/// maximal element, so a flat bucket still yields two distinct points. The two
/// are emitted in timestamp order. Truncation can drop the second extreme of
/// the final bucket when `target` is odd.
pub fn minmax(input: &Columns, target: usize) -> Columns {
    profiling::scope!("minmax");

    if input.len() <= target {
        return input.clone();
    }

    let mut emitted = emit_extremes(input, target);
    emitted.truncate(target);
    emitted
}

/// Bucket extremes before truncation
fn emit_extremes(input: &Columns, target: usize) -> Columns {
    let n = input.len();
    let buckets = target.div_ceil(2).max(1);
    let mut emitted = Columns::with_capacity(buckets * 2);

    for b in 0..buckets {
        let start = b * n / buckets;
        let end = (b + 1) * n / buckets;
        if start == end {
            continue;
        }

        let (min_idx, max_idx) = extremes(&input.values[start..end]);
        let (min_idx, max_idx) = (start + min_idx, start + max_idx);

        if min_idx == max_idx {
            emitted.push_from(input, min_idx);
            continue;
        }

        let ts = &input.timestamps;
        let min_first = ts[min_idx] < ts[max_idx] || (ts[min_idx] == ts[max_idx] && min_idx < max_idx);
        let (first, second) = if min_first {
            (min_idx, max_idx)
        } else {
            (max_idx, min_idx)
        };
        emitted.push_from(input, first);
        emitted.push_from(input, second);
    }

    emitted
}

/// Index of the earliest minimum and the latest maximum
fn extremes(values: &[f64]) -> (usize, usize) {
    let mut min_idx = 0;
    let mut max_idx = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[min_idx] {
            min_idx = i;
        }
        if v >= values[max_idx] {
            max_idx = i;
        }
    }
    (min_idx, max_idx)
}
