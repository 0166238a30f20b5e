//! Trial-count equalization across subjects.
//!
//! Leave-one-subject-out training concatenates trials from all remaining
//! subjects; unequal trial counts would weight subjects unevenly.  Every
//! subject is trimmed to the global minimum by removing an equal number of
//! trials from each class (classes are balanced before this step), keeping
//! the surviving trials in their original order — the analogue of
//! `np.delete` on randomly chosen indices.
use anyhow::{bail, Result};
use ndarray::Axis;
use rand::seq::index::sample;
use rand::Rng;

use crate::dataset::SubjectData;

/// Remove trials until exactly `n` remain, half from each class.
///
/// Requires balanced classes and an even difference `len(y) − n`; both hold
/// after [`crate::balance::balance_classes`] when `n` is another balanced
/// subject's count.
pub fn subsample_trials<R: Rng>(data: &SubjectData, n: usize, rng: &mut R) -> Result<SubjectData> {
    let total = data.n_trials();
    if n > total {
        bail!(
            "subject {}: cannot keep {n} of {total} trials",
            data.subject
        );
    }
    let n_remove = (total - n) / 2;
    if total - 2 * n_remove != n {
        bail!(
            "subject {}: removing {} trials per class cannot reach {n} from {total}",
            data.subject,
            n_remove
        );
    }
    if n_remove == 0 {
        return Ok(data.clone());
    }

    let mut remove = vec![false; total];
    for class in [0i64, 1] {
        let idx: Vec<usize> = data
            .y
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == class)
            .map(|(i, _)| i)
            .collect();
        if idx.len() < n_remove {
            bail!(
                "subject {}: class {class} has {} trials, cannot remove {n_remove}",
                data.subject,
                idx.len()
            );
        }
        for pick in sample(rng, idx.len(), n_remove) {
            remove[idx[pick]] = true;
        }
    }

    let keep: Vec<usize> = (0..total).filter(|&i| !remove[i]).collect();
    Ok(SubjectData {
        subject: data.subject.clone(),
        x: data.x.select(Axis(0), &keep),
        y: keep.iter().map(|&i| data.y[i]).collect(),
    })
}

/// Trim every subject to the global minimum trial count.
pub fn equalize_trials<R: Rng>(subjects: &[SubjectData], rng: &mut R) -> Result<Vec<SubjectData>> {
    let Some(min_trials) = subjects.iter().map(SubjectData::n_trials).min() else {
        bail!("no subjects to equalize");
    };
    subjects
        .iter()
        .map(|s| subsample_trials(s, min_trials, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn balanced_subject(id: &str, n_per_class: usize) -> SubjectData {
        let n = 2 * n_per_class;
        SubjectData {
            subject: id.into(),
            x: Array3::from_shape_fn((n, 2, 3), |(t, _, _)| t as f64),
            y: (0..n).map(|i| (i % 2) as i64).collect(),
        }
    }

    #[test]
    fn trims_to_global_minimum() {
        let subjects = vec![
            balanced_subject("0108", 10),
            balanced_subject("0109", 7),
            balanced_subject("0110", 9),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        let out = equalize_trials(&subjects, &mut rng).unwrap();
        for s in &out {
            assert_eq!(s.n_trials(), 14);
            assert_eq!(s.class_counts(), vec![(0, 7), (1, 7)]);
        }
    }

    #[test]
    fn kept_trials_stay_in_original_order() {
        let data = balanced_subject("0111", 8);
        let mut rng = StdRng::seed_from_u64(11);
        let out = subsample_trials(&data, 10, &mut rng).unwrap();
        // The x slab of each trial encodes its original index.
        let indices: Vec<f64> = (0..out.n_trials()).map(|t| out.x[[t, 0, 0]]).collect();
        let mut sorted = indices.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(indices, sorted);
    }

    #[test]
    fn already_minimal_subject_untouched() {
        let data = balanced_subject("0112", 5);
        let mut rng = StdRng::seed_from_u64(2);
        let out = subsample_trials(&data, 10, &mut rng).unwrap();
        assert_eq!(out.x, data.x);
        assert_eq!(out.y, data.y);
    }

    #[test]
    fn odd_difference_rejected() {
        let data = balanced_subject("0113", 5);
        let mut rng = StdRng::seed_from_u64(2);
        assert!(subsample_trials(&data, 9, &mut rng).is_err());
    }
}
