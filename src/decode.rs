//! Leave-one-subject-out decoding across timepoints.
//!
//! For every held-out subject the decoder is trained on the concatenated
//! trials of all remaining subjects and scored on the held-out trials,
//! independently at each timepoint.  The result is a
//! `(n_subjects × n_timepoints)` accuracy matrix whose time course shows
//! when the contrast carries decodable information.
//!
//! Per-timepoint fits share nothing, so they run on the rayon pool; the
//! output is identical to the serial loop because every fit is
//! deterministic.
use anyhow::{bail, Context, Result};
use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::DecodingConfig;
use crate::dataset::{check_shapes, SubjectData};
use crate::scale::Scaler;
use crate::select::{select_k_best, take_features};
use crate::svm::{Svm, SvmParams};

/// The per-timepoint classification pipeline:
/// standardize → optional ANOVA-F selection → C-SVM.
#[derive(Debug, Clone)]
pub struct Decoder {
    pub k_features: Option<usize>,
    pub svm: SvmParams,
}

impl Decoder {
    pub fn from_config(cfg: &DecodingConfig) -> Self {
        Self { k_features: cfg.k_features, svm: cfg.svm_params() }
    }

    /// Fit on the training trials and return accuracy on the test trials.
    ///
    /// Everything fitted — scaler statistics, selected features, the SVM —
    /// is derived from the training fold only.
    pub fn fit_score(
        &self,
        train_x: ArrayView2<'_, f64>,
        train_y: &[i64],
        test_x: ArrayView2<'_, f64>,
        test_y: &[i64],
    ) -> Result<f64> {
        let scaler = Scaler::fit(train_x);
        let train = scaler.transform(train_x);
        let test = scaler.transform(test_x);

        let (train, test) = match self.k_features {
            Some(k) => {
                let keep = select_k_best(train.view(), train_y, k);
                (
                    take_features(train.view(), &keep),
                    take_features(test.view(), &keep),
                )
            }
            None => (train, test),
        };

        let svm = Svm::fit(&self.svm, train.view(), train_y)?;
        Ok(svm.score(test.view(), test_y))
    }
}

/// Run the full leave-one-subject-out × timepoint evaluation.
///
/// `subjects` must already be prepared (trigger-filtered, balanced,
/// sign-aligned, trial-equalized — see [`crate::prepare_subjects`]); shape
/// agreement is re-checked here.  Row `i` of the returned matrix holds the
/// held-out accuracy of subject `i` at every timepoint.
pub fn across_subject(cfg: &DecodingConfig, subjects: &[SubjectData]) -> Result<Array2<f64>> {
    check_shapes(subjects)?;
    if subjects.len() < 2 {
        bail!("leave-one-subject-out needs at least 2 subjects, got {}", subjects.len());
    }
    let decoder = Decoder::from_config(cfg);
    let n_times = subjects[0].n_times();

    let mut results = Array2::<f64>::zeros((subjects.len(), n_times));
    for (i, test) in subjects.iter().enumerate() {
        info!(subject = %test.subject, fold = i, "leaving out subject for testing");

        let train_views: Vec<_> = subjects
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, s)| s.x.view())
            .collect();
        let train_x: Array3<f64> = concatenate(Axis(0), &train_views)?;
        let train_y: Vec<i64> = subjects
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .flat_map(|(_, s)| s.y.iter().copied())
            .collect();
        let test_y: Vec<i64> = test.y.to_vec();

        let accs: Vec<f64> = (0..n_times)
            .into_par_iter()
            .map(|t| {
                decoder
                    .fit_score(
                        train_x.slice(s![.., .., t]),
                        &train_y,
                        test.x.slice(s![.., .., t]),
                        &test_y,
                    )
                    .with_context(|| format!("subject {} timepoint {t}", test.subject))
            })
            .collect::<Result<Vec<f64>>>()?;

        results.row_mut(i).assign(&Array1::from_vec(accs));
        debug!(
            subject = %test.subject,
            mean_accuracy = results.row(i).sum() / n_times as f64,
            "fold finished"
        );
    }
    Ok(results)
}

/// Mean accuracy over subjects at each timepoint (the grand-average curve).
pub fn grand_average(results: &Array2<f64>) -> Array1<f64> {
    results.mean_axis(Axis(0)).unwrap()
}
