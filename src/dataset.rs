//! Per-subject dataset loading and trigger recoding.
//!
//! Each subject directory holds one `X_<label>.npy` per cortical label
//! (shape `[trials, sources, times]`, written after inverse modeling and
//! morphing to fsaverage) and a single `y.npy` of trigger codes.  Arrays
//! from multiple labels are concatenated along the source axis, matching
//! `np.concatenate(Xs, axis=1)` upstream.
use anyhow::{bail, Context, Result};
use ndarray::{concatenate, Array1, Array3, Axis};
use std::path::Path;

use crate::config::Contrast;
use crate::io::{read_npy_1d, read_npy_3d};

/// Trials, trigger codes, and binary class labels for one subject.
#[derive(Debug, Clone)]
pub struct SubjectData {
    /// Subject identifier (directory name, e.g. `"0108"`).
    pub subject: String,
    /// Source-space trial data, shape `[trials, sources, times]`.
    pub x: Array3<f64>,
    /// Class label per trial (0 or 1 after [`keep_triggers`]).
    pub y: Array1<i64>,
}

impl SubjectData {
    pub fn n_trials(&self) -> usize {
        self.x.shape()[0]
    }

    pub fn n_sources(&self) -> usize {
        self.x.shape()[1]
    }

    pub fn n_times(&self) -> usize {
        self.x.shape()[2]
    }

    /// Trial counts per class, indexed by label value.
    pub fn class_counts(&self) -> Vec<(i64, usize)> {
        let mut counts: Vec<(i64, usize)> = Vec::new();
        for &label in self.y.iter() {
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }
        counts.sort_by_key(|&(l, _)| l);
        counts
    }
}

/// Read one subject's data, concatenating label files along the source axis.
///
/// `labels` are the cortical parcellation labels that make up the region of
/// interest (e.g. `["parsopercularis-lh", "parsorbitalis-lh"]`).  Every
/// `X_<label>.npy` must agree on trial and time counts.
pub fn read_subject(data_dir: &Path, subject: &str, labels: &[String]) -> Result<SubjectData> {
    if labels.is_empty() {
        bail!("no cortical labels given for subject {subject}");
    }
    let subject_dir = data_dir.join(subject);

    let mut parts: Vec<Array3<f64>> = Vec::with_capacity(labels.len());
    for label in labels {
        let path = subject_dir.join(format!("X_{label}.npy"));
        let x = read_npy_3d(&path)
            .with_context(|| format!("loading subject {subject}, label {label}"))?;
        if let Some(first) = parts.first() {
            if x.shape()[0] != first.shape()[0] || x.shape()[2] != first.shape()[2] {
                bail!(
                    "subject {subject}: label {label} has shape {:?}, expected [{}, _, {}]",
                    x.shape(),
                    first.shape()[0],
                    first.shape()[2]
                );
            }
        }
        parts.push(x);
    }
    let views: Vec<_> = parts.iter().map(|a| a.view()).collect();
    let x = concatenate(Axis(1), &views)?;

    let y_f = read_npy_1d(&subject_dir.join("y.npy"))
        .with_context(|| format!("loading subject {subject} labels"))?;
    let y: Array1<i64> = y_f.mapv(|v| v as i64);

    if y.len() != x.shape()[0] {
        bail!(
            "subject {subject}: {} trials in X but {} labels in y",
            x.shape()[0],
            y.len()
        );
    }

    Ok(SubjectData { subject: subject.to_string(), x, y })
}

/// Keep only trials whose trigger code belongs to the contrast, and recode
/// the labels to 0/1.
///
/// Trial order is preserved.  Errors if either class ends up empty — a
/// contrast with no trials cannot be balanced or decoded.
pub fn keep_triggers(data: &SubjectData, contrast: &Contrast) -> Result<SubjectData> {
    let keep: Vec<usize> = data
        .y
        .iter()
        .enumerate()
        .filter(|&(_, t)| contrast.zero.contains(t) || contrast.one.contains(t))
        .map(|(i, _)| i)
        .collect();

    let y: Array1<i64> = keep
        .iter()
        .map(|&i| if contrast.zero.contains(&data.y[i]) { 0 } else { 1 })
        .collect();

    let n0 = y.iter().filter(|&&v| v == 0).count();
    let n1 = y.len() - n0;
    if n0 == 0 || n1 == 0 {
        bail!(
            "subject {}: contrast '{}' leaves {} class-0 and {} class-1 trials",
            data.subject,
            contrast.label,
            n0,
            n1
        );
    }

    Ok(SubjectData {
        subject: data.subject.clone(),
        x: data.x.select(Axis(0), &keep),
        y,
    })
}

/// Check that every subject agrees on source and time dimensions.
///
/// Decoding trains on concatenated trials from all-but-one subject, so a
/// single subject with a divergent source count would silently misalign
/// features; this is rejected up front.
pub fn check_shapes(subjects: &[SubjectData]) -> Result<()> {
    let Some(first) = subjects.first() else {
        bail!("no subjects loaded");
    };
    for s in subjects {
        if s.n_sources() != first.n_sources() || s.n_times() != first.n_times() {
            bail!(
                "subject {} has {} sources × {} times, subject {} has {} × {}",
                s.subject,
                s.n_sources(),
                s.n_times(),
                first.subject,
                first.n_sources(),
                first.n_times()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn subject(y: Vec<i64>) -> SubjectData {
        let n = y.len();
        SubjectData {
            subject: "0108".into(),
            x: Array3::from_shape_fn((n, 3, 4), |(t, s, i)| (t * 100 + s * 10 + i) as f64),
            y: Array1::from_vec(y),
        }
    }

    #[test]
    fn keep_triggers_recodes_binary() {
        let data = subject(vec![11, 12, 202, 21, 22, 202]);
        let contrast = Contrast::new("pos_neg", &[11, 21], &[12, 22]);
        let out = keep_triggers(&data, &contrast).unwrap();
        assert_eq!(out.y.to_vec(), vec![0, 1, 0, 1]);
        assert_eq!(out.n_trials(), 4);
        // Trial 3 (trigger 21) keeps its original data.
        assert_eq!(out.x[[2, 1, 2]], 312.0);
    }

    #[test]
    fn keep_triggers_rejects_empty_class() {
        let data = subject(vec![11, 11, 202]);
        let contrast = Contrast::new("pos_neg", &[11, 21], &[12, 22]);
        assert!(keep_triggers(&data, &contrast).is_err());
    }

    #[test]
    fn shape_mismatch_detected() {
        let a = subject(vec![11, 12]);
        let mut b = subject(vec![11, 12]);
        b.subject = "0109".into();
        b.x = Array3::zeros((2, 5, 4));
        assert!(check_shapes(&[a, b]).is_err());
    }

    #[test]
    fn class_counts_sorted_by_label() {
        let data = subject(vec![22, 11, 22, 11, 22]);
        assert_eq!(data.class_counts(), vec![(11, 2), (22, 3)]);
    }
}
