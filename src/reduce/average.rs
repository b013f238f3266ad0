//! Fixed-size bucket averaging

use crate::series::Columns;

/// Split `input` into contiguous buckets of `ceil(n / target)` points and emit
/// one point per bucket: the mean value, stamped with the timestamp of the
/// bucket's middle element.
///
/// Output length is `ceil(n / bucket_size)`, which can fall a little short of
/// `target`.
pub fn average(input: &Columns, target: usize) -> Columns {
    profiling::scope!("average");

    let n = input.len();
    if n <= target {
        return input.clone();
    }

    let bucket_size = n.div_ceil(target.max(1));
    let mut reduced = Columns::with_capacity(n.div_ceil(bucket_size));

    for start in (0..n).step_by(bucket_size) {
        let end = (start + bucket_size).min(n);
        let len = end - start;
        let mean = input.values[start..end].iter().sum::<f64>() / len as f64;
        reduced.push(input.timestamps[start + len / 2], mean);
    }

    reduced
}
