//! Largest-remainder apportionment of a group into option quotas.
//!
//! `allocate_counts` turns a probability vector and a group size into exact
//! integer counts; `allocate` expands those counts into option indices and
//! shuffles them with a seeded ChaCha8 stream.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Largest group size whose quota rounding noise stays below 2^-8.
pub const MAX_GROUP_SIZE: u64 = 1 << 40;

/// Quotas this many ulps of the group size away from an integer are that integer.
const SNAP_ULPS: f64 = 16.0;

/// Upper bound on the snapping tolerance; a genuine half never snaps.
const MAX_SNAP: f64 = 1.0 / 256.0;

/// Numeric precondition failures of the quota computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),
    #[error("quota overflow: {0}")]
    QuotaOverflow(String),
}

/// Turns a probability vector into an ordered assignment of option indices.
pub trait QuotaAllocator: Send + Sync {
    fn allocate(
        &self,
        probabilities: &[f64],
        group_size: usize,
        seed: u64,
    ) -> Result<Vec<usize>, QuotaError>;
}

/// The default allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestRemainder;

impl QuotaAllocator for LargestRemainder {
    fn allocate(
        &self,
        probabilities: &[f64],
        group_size: usize,
        seed: u64,
    ) -> Result<Vec<usize>, QuotaError> {
        allocate(probabilities, group_size, seed)
    }
}

impl<T: QuotaAllocator + ?Sized> QuotaAllocator for &T {
    fn allocate(
        &self,
        probabilities: &[f64],
        group_size: usize,
        seed: u64,
    ) -> Result<Vec<usize>, QuotaError> {
        (**self).allocate(probabilities, group_size, seed)
    }
}

/// Allocate `group_size` option indices and shuffle them with `seed`.
pub fn allocate(
    probabilities: &[f64],
    group_size: usize,
    seed: u64,
) -> Result<Vec<usize>, QuotaError> {
    let counts = allocate_counts(probabilities, group_size)?;

    let mut labels = Vec::with_capacity(group_size);
    for (option, count) in counts.into_iter().enumerate() {
        labels.extend(std::iter::repeat_n(option, count));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    labels.shuffle(&mut rng);
    Ok(labels)
}

/// Exact per-option counts summing to `group_size`.
///
/// Weights are normalized first. Each option receives `floor(n * p_i)`, and
/// the remaining units go to the largest fractional parts, ties going to
/// the lower option index.
pub fn allocate_counts(probabilities: &[f64], group_size: usize) -> Result<Vec<usize>, QuotaError> {
    if probabilities.is_empty() {
        return Err(QuotaError::InvalidDistribution(
            "probability vector is empty".to_string(),
        ));
    }
    if let Some(weight) = probabilities
        .iter()
        .find(|weight| !weight.is_finite() || **weight < 0.0)
    {
        return Err(QuotaError::InvalidDistribution(format!(
            "weight {weight} is negative or not finite"
        )));
    }
    if group_size == 0 {
        return Ok(vec![0; probabilities.len()]);
    }
    let total: f64 = probabilities.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(QuotaError::InvalidDistribution(format!(
            "weights sum to {total}"
        )));
    }
    if group_size as u64 > MAX_GROUP_SIZE {
        return Err(QuotaError::QuotaOverflow(format!(
            "group size {group_size} exceeds {MAX_GROUP_SIZE}"
        )));
    }

    let n = group_size as f64;
    let tolerance = snap_tolerance(n, probabilities.len());
    let mut counts = Vec::with_capacity(probabilities.len());
    let mut fractions = Vec::with_capacity(probabilities.len());
    for weight in probabilities {
        let quota = snap(n * weight / total, tolerance);
        let base = quota.floor();
        counts.push(base as usize);
        fractions.push(quota - base);
    }

    let assigned: usize = counts.iter().sum();
    if assigned > group_size {
        return Err(QuotaError::QuotaOverflow(format!(
            "base allocation {assigned} exceeds group size {group_size}"
        )));
    }
    let remainder = group_size - assigned;
    if remainder >= probabilities.len() && remainder > 0 {
        return Err(QuotaError::QuotaOverflow(format!(
            "remainder {remainder} is not below option count {}",
            probabilities.len()
        )));
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|a, b| {
        fractions[*b]
            .total_cmp(&fractions[*a])
            .then_with(|| a.cmp(b))
    });
    for option in order.into_iter().take(remainder) {
        counts[option] += 1;
    }

    Ok(counts)
}

/// Total snapping across all options stays below one unit.
fn snap_tolerance(n: f64, options: usize) -> f64 {
    (SNAP_ULPS * f64::EPSILON * n.max(1.0))
        .min(MAX_SNAP)
        .min(0.5 / options as f64)
}

/// Absorb rounding noise so that exact quotas floor to themselves.
fn snap(quota: f64, tolerance: f64) -> f64 {
    let nearest = quota.round();
    if (quota - nearest).abs() <= tolerance {
        nearest
    } else {
        quota
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn tally(labels: &[usize], options: usize) -> Vec<usize> {
        let mut counts = vec![0; options];
        for label in labels {
            counts[*label] += 1;
        }
        counts
    }

    /// Exact apportionment over integer weights: floors and remainders in
    /// integer arithmetic, leftovers handed out one by one.
    fn reference_counts(weights: &[u64], group_size: u64) -> Vec<usize> {
        let total: u64 = weights.iter().sum();
        let mut counts: Vec<u64> = weights.iter().map(|w| group_size * w / total).collect();
        let remainders: Vec<u64> = weights.iter().map(|w| group_size * w % total).collect();
        let mut taken = vec![false; weights.len()];
        while counts.iter().sum::<u64>() < group_size {
            let mut best: Option<usize> = None;
            for index in 0..weights.len() {
                if taken[index] {
                    continue;
                }
                match best {
                    Some(current) if remainders[current] >= remainders[index] => {}
                    _ => best = Some(index),
                }
            }
            let index = best.expect("remainder below option count");
            taken[index] = true;
            counts[index] += 1;
        }
        counts.into_iter().map(|count| count as usize).collect()
    }

    #[test]
    fn exact_quotas_need_no_remainder() {
        assert_eq!(allocate_counts(&[0.6, 0.4], 5), Ok(vec![3, 2]));
    }

    #[test]
    fn remainder_goes_to_largest_fraction() {
        assert_eq!(allocate_counts(&[0.33, 0.33, 0.34], 10), Ok(vec![3, 3, 4]));
    }

    #[test]
    fn ties_go_to_lower_option_index() {
        assert_eq!(allocate_counts(&[0.5, 0.5], 1), Ok(vec![1, 0]));
        let third = 1.0 / 3.0;
        assert_eq!(allocate_counts(&[third, third, third], 2), Ok(vec![1, 1, 0]));
    }

    #[test]
    fn degenerate_groups() {
        assert_eq!(allocate_counts(&[0.2, 0.8], 0), Ok(vec![0, 0]));
        assert_eq!(allocate(&[0.2, 0.8], 0, 7), Ok(Vec::new()));
        assert_eq!(allocate_counts(&[1.0], 17), Ok(vec![17]));
        assert_eq!(allocate_counts(&[0.0, 1.0, 0.0], 4), Ok(vec![0, 4, 0]));
    }

    #[test]
    fn rounding_noise_does_not_leak_into_remainder() {
        let probabilities = [0.2, 0.3, 0.3, 0.2];
        assert_eq!(allocate_counts(&probabilities, 250), Ok(vec![50, 75, 75, 50]));
        let tenth = [0.1; 10];
        assert_eq!(allocate_counts(&tenth, 1000), Ok(vec![100; 10]));
    }

    #[test]
    fn unnormalized_weights_are_scaled() {
        assert_eq!(allocate_counts(&[6.0, 4.0], 5), Ok(vec![3, 2]));
    }

    #[test]
    fn counts_match_exact_integer_apportionment() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..500 {
            let options = rng.random_range(1..8);
            let weights: Vec<u64> = (0..options).map(|_| rng.random_range(0..20)).collect();
            if weights.iter().all(|weight| *weight == 0) {
                continue;
            }
            let group_size: u64 = rng.random_range(0..1000);

            let probabilities: Vec<f64> = weights.iter().map(|weight| *weight as f64).collect();
            let counts =
                allocate_counts(&probabilities, group_size as usize).expect("valid distribution");
            assert_eq!(counts.iter().sum::<usize>(), group_size as usize);
            assert_eq!(counts, reference_counts(&weights, group_size));
        }
    }

    #[test]
    fn counts_stay_within_one_unit_of_quota() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let options = rng.random_range(1..8);
            let probabilities: Vec<f64> = (0..options).map(|_| rng.random_range(0.0..1.0)).collect();
            let group_size = rng.random_range(1..1000);
            let total: f64 = probabilities.iter().sum();
            if total <= 0.0 {
                continue;
            }

            let counts = allocate_counts(&probabilities, group_size).expect("valid distribution");
            assert_eq!(counts.iter().sum::<usize>(), group_size);
            for (count, weight) in counts.iter().zip(&probabilities) {
                let quota = group_size as f64 * weight / total;
                let count = *count as f64;
                assert!(count == quota.floor() || count == quota.ceil());
            }
        }
    }

    #[test]
    fn allocate_returns_shuffled_quota() {
        let labels = allocate(&[0.25, 0.5, 0.25], 100, 11).expect("allocate");
        assert_eq!(labels.len(), 100);
        assert_eq!(tally(&labels, 3), vec![25, 50, 25]);

        let sorted = {
            let mut sorted = labels.clone();
            sorted.sort_unstable();
            sorted
        };
        assert_ne!(labels, sorted);
    }

    #[test]
    fn allocate_is_reproducible_per_seed() {
        let first = allocate(&[0.3, 0.7], 200, 99).expect("allocate");
        let second = allocate(&[0.3, 0.7], 200, 99).expect("allocate");
        let other = allocate(&[0.3, 0.7], 200, 100).expect("allocate");
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn rejects_invalid_distributions() {
        assert!(matches!(
            allocate_counts(&[], 3),
            Err(QuotaError::InvalidDistribution(_))
        ));
        assert!(matches!(
            allocate_counts(&[0.0, 0.0], 3),
            Err(QuotaError::InvalidDistribution(_))
        ));
        assert!(matches!(
            allocate_counts(&[0.5, -0.5, 1.0], 3),
            Err(QuotaError::InvalidDistribution(_))
        ));
        assert!(matches!(
            allocate_counts(&[f64::NAN, 1.0], 3),
            Err(QuotaError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn large_groups_keep_genuine_halves() {
        let group_size = (MAX_GROUP_SIZE - 1) as usize;
        let half = (MAX_GROUP_SIZE / 2) as usize;
        assert_eq!(
            allocate_counts(&[0.5, 0.5], group_size),
            Ok(vec![half, half - 1])
        );
        assert_eq!(
            allocate_counts(&[0.5, 0.5], MAX_GROUP_SIZE as usize),
            Ok(vec![half, half])
        );
        assert_eq!(
            allocate_counts(&[0.2, 0.3, 0.3, 0.2], 1_000_000_000_000),
            Ok(vec![
                200_000_000_000,
                300_000_000_000,
                300_000_000_000,
                200_000_000_000
            ])
        );
    }

    #[test]
    fn empty_group_skips_weight_checks() {
        assert_eq!(allocate_counts(&[0.0, 0.0], 0), Ok(vec![0, 0]));
        assert_eq!(allocate(&[0.0, 0.0], 0, 3), Ok(Vec::new()));
    }

    #[test]
    fn rejects_group_beyond_exact_range() {
        assert!(matches!(
            allocate_counts(&[0.5, 0.5], (MAX_GROUP_SIZE + 1) as usize),
            Err(QuotaError::QuotaOverflow(_))
        ));
    }
}
