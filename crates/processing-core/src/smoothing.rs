//! Per-axis target path primitives.
//!
//! Each function maps one raw cumulative axis to the target path for one
//! [`AxisBehavior`](steadyframe_model::AxisBehavior).

/// Windowed moving average over the inclusive range `[t - window, t + window]`.
///
/// The range is clipped at both ends of the sequence and the denominator
/// shrinks with it, so the first and last values are averaged over fewer
/// samples instead of being padded. `window == 0` returns the input unchanged.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < 2 {
        return values.to_vec();
    }

    // prefix[i] = sum of values[..i]
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for &v in values {
        running += v;
        prefix.push(running);
    }

    let last = values.len() - 1;
    (0..values.len())
        .map(|t| {
            let start = t.saturating_sub(window);
            let end = (t + window).min(last);
            (prefix[end + 1] - prefix[start]) / (end - start + 1) as f64
        })
        .collect()
}

/// Straight line from the first to the last value, same length as the input.
///
/// One value maps to itself; an empty input stays empty.
pub fn distribute(values: &[f64]) -> Vec<f64> {
    match values {
        [] => Vec::new(),
        [only] => vec![*only],
        [first, .., last] => {
            let span = (values.len() - 1) as f64;
            let step = (last - first) / span;
            let mut out: Vec<f64> = (0..values.len())
                .map(|t| first + step * t as f64)
                .collect();
            // pin the far endpoint exactly
            if let Some(end) = out.last_mut() {
                *end = *last;
            }
            out
        }
    }
}

/// All-zero target of the given length.
pub fn zeros(len: usize) -> Vec<f64> {
    vec![0.0; len]
}

/// Element-wise `target - raw`.
pub fn delta(target: &[f64], raw: &[f64]) -> Vec<f64> {
    target.iter().zip(raw).map(|(t, r)| t - r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_moving_average_shrinks_at_edges() {
        let smoothed = moving_average(&[0.0, 3.0, 6.0, 9.0], 1);
        assert_eq!(smoothed, vec![1.5, 3.0, 6.0, 7.5]);
    }

    #[test]
    fn test_moving_average_wide_window_is_global_mean() {
        let values = [1.0, 2.0, 3.0, 6.0];
        let smoothed = moving_average(&values, 100);
        for v in smoothed {
            assert!((v - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_moving_average_empty() {
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn test_distribute_two_points_is_unchanged() {
        assert_eq!(distribute(&[-2.5, 7.0]), vec![-2.5, 7.0]);
    }

    #[test]
    fn test_distribute_linear() {
        let line = distribute(&[0.0, 100.0, -3.0, 10.0, 8.0]);
        assert_eq!(line, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_distribute_degenerate() {
        assert!(distribute(&[]).is_empty());
        assert_eq!(distribute(&[4.0]), vec![4.0]);
    }

    #[test]
    fn test_delta() {
        assert_eq!(delta(&[1.0, 1.0], &[0.5, 2.0]), vec![0.5, -1.0]);
    }

    proptest! {
        #[test]
        fn prop_window_zero_is_identity(values in prop::collection::vec(-1e6f64..1e6, 0..64)) {
            prop_assert_eq!(moving_average(&values, 0), values);
        }

        #[test]
        fn prop_moving_average_stays_within_range(
            values in prop::collection::vec(-1e3f64..1e3, 1..64),
            window in 0usize..20,
        ) {
            let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            for v in moving_average(&values, window) {
                prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
            }
        }

        #[test]
        fn prop_distribute_keeps_endpoints(values in prop::collection::vec(-1e3f64..1e3, 1..64)) {
            let line = distribute(&values);
            prop_assert_eq!(line.len(), values.len());
            prop_assert_eq!(line[0], values[0]);
            prop_assert_eq!(line[line.len() - 1], values[values.len() - 1]);
        }
    }
}
