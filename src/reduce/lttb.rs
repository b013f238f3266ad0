//! LTTB (Largest Triangle Three Buckets) downsampling

use crate::constants::sampling::MIN_LTTB_TARGET;
use crate::series::Columns;

/// Reduce `input` to exactly `target` points, keeping the first and last.
///
/// Interior points are split by index into `target - 2` buckets. From each
/// bucket the point forming the largest triangle with the previously selected
/// point and the average of the next bucket is kept. On equal areas the
/// earliest candidate wins.
///
/// Inputs no longer than `target` (or targets below 3) are returned as is.
pub fn lttb(input: &Columns, target: usize) -> Columns {
    profiling::scope!("lttb");

    let n = input.len();
    if n <= target || target < MIN_LTTB_TARGET {
        return input.clone();
    }

    let ts = &input.timestamps;
    let vs = &input.values;

    let every = (n - 2) as f64 / (target - 2) as f64;
    let mut sampled = Columns::with_capacity(target);

    // Always include first point
    sampled.push_from(input, 0);
    let mut a = 0usize;

    for i in 0..target - 2 {
        // Average of the next bucket
        let avg_start = ((i + 1) as f64 * every).floor() as usize + 1;
        let avg_end = (((i + 2) as f64 * every).floor() as usize + 1).min(n);
        let avg_len = avg_end.saturating_sub(avg_start).max(1) as f64;

        let mut avg_ts = 0.0;
        let mut avg_val = 0.0;
        for k in avg_start..avg_end {
            avg_ts += ts[k];
            avg_val += vs[k];
        }
        avg_ts /= avg_len;
        avg_val /= avg_len;

        // Current bucket
        let cur_start = (i as f64 * every).floor() as usize + 1;
        let cur_end = (((i + 1) as f64 * every).floor() as usize + 1).min(n);

        let (a_ts, a_val) = (ts[a], vs[a]);
        let mut max_area = -1.0f64;
        let mut max_idx = cur_start;

        for j in cur_start..cur_end {
            let area =
                ((a_ts - avg_ts) * (vs[j] - a_val) - (a_ts - ts[j]) * (avg_val - a_val)).abs() * 0.5;
            // strict comparison: first maximum wins
            if area > max_area {
                max_area = area;
                max_idx = j;
            }
        }

        sampled.push_from(input, max_idx);
        a = max_idx;
    }

    // Always include last point
    sampled.push_from(input, n - 1);
    sampled
}
