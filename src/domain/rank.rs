//! Cross-sectional ranking and quantile binning.
//!
//! `percentile_rank` assigns each value the fraction of the cross-section at
//! or below it, with tied values sharing their average rank. `quantile_bins`
//! cuts a cross-section into equal-frequency groups.

use std::cmp::Ordering;

/// Percentile rank of every value in `values`, in input order.
///
/// rank[i] = average 1-based position of values[i] in ascending order / n.
/// Results lie in (0, 1]; the largest value always maps to 1.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]].total_cmp(&values[order[start]]) == Ordering::Equal {
            end += 1;
        }
        // Positions start+1 ..= end share their mean.
        let avg = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg / n as f64;
        }
        start = end;
    }
    ranks
}

/// Linearly interpolated quantile of already-sorted values.
fn interpolated_quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Assign each value to one of `bins` equal-frequency groups, 0 = lowest.
///
/// Edges are the interpolated quantiles at 0, 1/bins, .., 1. Bins are closed on
/// the right and the lowest edge is inclusive, so every value falls in exactly
/// one group. With tied edges a value goes to the first bin whose upper edge
/// is at or above it.
pub fn quantile_bins(values: &[f64], bins: usize) -> Vec<usize> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let edges: Vec<f64> = (0..=bins)
        .map(|i| interpolated_quantile(&sorted, i as f64 / bins as f64))
        .collect();

    values
        .iter()
        .map(|&v| {
            (0..bins)
                .find(|&b| v <= edges[b + 1])
                .unwrap_or(bins - 1)
        })
        .collect()
}

/// Pearson correlation of two equal-length columns.
///
/// `None` when fewer than two observations exist or either column is constant.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let rho = cov / (var_x * var_y).sqrt();
    rho.is_finite().then(|| rho.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn rank_distinct_values() {
        let ranks = percentile_rank(&[30.0, 10.0, 20.0, 40.0]);
        assert_eq!(ranks, vec![0.75, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn rank_ties_share_average() {
        // positions 2 and 3 tie -> 2.5 / 4
        let ranks = percentile_rank(&[1.0, 5.0, 5.0, 9.0]);
        assert_relative_eq!(ranks[0], 0.25);
        assert_relative_eq!(ranks[1], 0.625);
        assert_relative_eq!(ranks[2], 0.625);
        assert_relative_eq!(ranks[3], 1.0);
    }

    #[test]
    fn rank_all_equal() {
        let ranks = percentile_rank(&[2.0, 2.0, 2.0]);
        for r in ranks {
            assert_relative_eq!(r, 2.0 / 3.0);
        }
    }

    #[test]
    fn rank_empty() {
        assert!(percentile_rank(&[]).is_empty());
    }

    #[test]
    fn bins_ten_values_two_per_group() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let bins = quantile_bins(&values, 5);
        assert_eq!(bins, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn bins_follow_value_not_position() {
        let bins = quantile_bins(&[9.0, 1.0, 5.0, 3.0, 7.0], 5);
        assert_eq!(bins, vec![4, 0, 2, 1, 3]);
    }

    #[test]
    fn bins_constant_values_do_not_panic() {
        let bins = quantile_bins(&[1.0, 1.0, 1.0], 5);
        assert_eq!(bins, vec![0, 0, 0]);
    }

    #[test]
    fn bins_empty_input() {
        assert!(quantile_bins(&[], 5).is_empty());
    }

    #[test]
    fn correlation_perfect_and_inverse() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(pearson_correlation(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0);
        assert_relative_eq!(pearson_correlation(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0);
    }

    #[test]
    fn correlation_undefined_cases() {
        assert!(pearson_correlation(&[1.0], &[2.0]).is_none());
        assert!(pearson_correlation(&[1.0, 1.0], &[2.0, 3.0]).is_none());
        assert!(pearson_correlation(&[1.0, 2.0], &[2.0]).is_none());
    }

    proptest! {
        #[test]
        fn equal_frequency_groups(raw in prop::collection::hash_set(-1_000_000i64..1_000_000, 1..40usize)) {
            let mut distinct: Vec<f64> = raw.into_iter().map(|v| v as f64 / 1000.0).collect();
            let groups = distinct.len() / 5;
            prop_assume!(groups > 0);
            distinct.truncate(groups * 5);

            let bins = quantile_bins(&distinct, 5);
            for b in 0..5 {
                prop_assert_eq!(bins.iter().filter(|&&x| x == b).count(), groups);
            }
            // ascending value never moves to a lower bin
            for i in 0..distinct.len() {
                for j in 0..distinct.len() {
                    if distinct[i] < distinct[j] {
                        prop_assert!(bins[i] <= bins[j]);
                    }
                }
            }
        }

        #[test]
        fn ranks_within_unit_interval(values in prop::collection::vec(-1e6f64..1e6, 1..50)) {
            for r in percentile_rank(&values) {
                prop_assert!(r > 0.0 && r <= 1.0);
            }
        }
    }
}
