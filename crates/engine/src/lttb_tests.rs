// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn line(n: usize) -> Vec<(f64, f64)> {
    (0..n).map(|i| (i as f64, i as f64 * 0.5)).collect()
}

#[test]
fn short_input_is_returned_whole() {
    let points = line(5);
    assert_eq!(lttb_indices(&points, 10), vec![0, 1, 2, 3, 4]);
    assert_eq!(lttb_indices(&points, 5), vec![0, 1, 2, 3, 4]);
}

#[test]
fn downsamples_to_exact_threshold() {
    let points = line(10_000);
    let kept = lttb_indices(&points, 1000);
    assert_eq!(kept.len(), 1000);
    assert_eq!(kept[0], 0);
    assert_eq!(*kept.last().unwrap(), 9999);
}

#[test]
fn keeps_spike_points() {
    // Flat line with one spike: LTTB must keep the spike
    let mut points = line(1000);
    for p in points.iter_mut() {
        p.1 = 1.0;
    }
    points[500].1 = 100.0;

    let kept = lttb_indices(&points, 50);
    assert!(kept.contains(&500), "spike at index 500 was dropped: {:?}", kept);
}

#[test]
fn degenerate_thresholds() {
    let points = line(100);
    assert_eq!(lttb_indices(&points, 0), Vec::<usize>::new());
    assert_eq!(lttb_indices(&points, 1), vec![0]);
    assert_eq!(lttb_indices(&points, 2), vec![0, 99]);
}

#[test]
fn deterministic_output() {
    let points = line(5000);
    assert_eq!(lttb_indices(&points, 100), lttb_indices(&points, 100));
}

proptest! {
    #[test]
    fn always_within_threshold_and_endpoints_kept(
        n in 3usize..2000,
        threshold in 3usize..500,
        seed in any::<u64>(),
    ) {
        // Deterministic pseudo-random ys from the seed
        let mut state = seed | 1;
        let points: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (i as f64, (state >> 33) as f64 / 1e9)
            })
            .collect();

        let kept = lttb_indices(&points, threshold);
        prop_assert!(kept.len() <= threshold.max(2));
        prop_assert_eq!(kept[0], 0);
        prop_assert_eq!(*kept.last().unwrap(), n - 1);
        // Strictly ascending, no duplicates
        prop_assert!(kept.windows(2).all(|w| w[0] < w[1]));
    }
}
