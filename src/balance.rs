//! Class balancing by seeded subsampling.
//!
//! Matches `np.random.choice(idx, size=counts.min(), replace=False)` per
//! class: every class is downsampled to the smallest class count, and the
//! kept trials are stacked class by class in draw order.  All randomness
//! comes from the caller's RNG, so a fixed seed reproduces the exact same
//! trial selection.
use ndarray::Axis;
use rand::seq::index::sample;
use rand::Rng;

use crate::dataset::SubjectData;

/// Downsample every class to the smallest class count.
///
/// Returns a new [`SubjectData`] whose trials are ordered class-major
/// (all kept class-0 trials, then class-1, …), shuffled within each class
/// by the draw.  The input is balanced already when all counts are equal,
/// but still passes through the sampler, so trial order may change.
pub fn balance_classes<R: Rng>(data: &SubjectData, rng: &mut R) -> SubjectData {
    let counts = data.class_counts();
    let min_count = counts.iter().map(|&(_, n)| n).min().unwrap_or(0);

    let mut keep: Vec<usize> = Vec::with_capacity(min_count * counts.len());
    for &(label, _) in &counts {
        let idx: Vec<usize> = data
            .y
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == label)
            .map(|(i, _)| i)
            .collect();
        for pick in sample(rng, idx.len(), min_count) {
            keep.push(idx[pick]);
        }
    }

    SubjectData {
        subject: data.subject.clone(),
        x: data.x.select(Axis(0), &keep),
        y: keep.iter().map(|&i| data.y[i]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn subject(y: Vec<i64>) -> SubjectData {
        let n = y.len();
        SubjectData {
            subject: "0110".into(),
            x: Array3::from_shape_fn((n, 2, 3), |(t, _, _)| t as f64),
            y: Array1::from_vec(y),
        }
    }

    #[test]
    fn classes_equal_after_balancing() {
        let data = subject(vec![0, 0, 0, 0, 0, 1, 1]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = balance_classes(&data, &mut rng);
        assert_eq!(out.class_counts(), vec![(0, 2), (1, 2)]);
        assert_eq!(out.n_trials(), 4);
    }

    #[test]
    fn kept_trials_carry_their_data() {
        let data = subject(vec![0, 1, 0, 1, 0]);
        let mut rng = StdRng::seed_from_u64(3);
        let out = balance_classes(&data, &mut rng);
        // Every kept trial's x slab still equals its original trial index,
        // and that index has the label the y row claims.
        for (row, &label) in out.y.iter().enumerate() {
            let orig = out.x[[row, 0, 0]] as usize;
            assert_eq!(data.y[orig], label);
        }
    }

    #[test]
    fn same_seed_same_selection() {
        let data = subject(vec![0, 0, 0, 1, 1, 1, 1, 1]);
        let a = balance_classes(&data, &mut StdRng::seed_from_u64(9));
        let b = balance_classes(&data, &mut StdRng::seed_from_u64(9));
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn different_seed_can_differ() {
        let data = subject(vec![0, 0, 0, 0, 0, 0, 1, 1]);
        let a = balance_classes(&data, &mut StdRng::seed_from_u64(1));
        let b = balance_classes(&data, &mut StdRng::seed_from_u64(2));
        // Same counts either way.
        assert_eq!(a.class_counts(), b.class_counts());
    }
}
