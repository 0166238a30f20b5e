//! # megdecode — leave-one-subject-out MEG decoding in pure Rust
//!
//! `megdecode` decodes binary cognitive states (stimulus valence, self vs
//! other attribution) from time-resolved, source-localized MEG trials and
//! statistically validates the result.  It consumes the `.npy` arrays
//! written by the source-localization stage (one `X_<label>.npy` per
//! cortical label plus `y.npy` per subject) and produces a reproducible
//! `(subjects × timepoints)` accuracy matrix.
//!
//! ## Pipeline overview
//!
//! ```text
//! data/<subject>/X_<label>.npy, y.npy
//!   │
//!   ├─ dataset::read_subject()     concat labels along the source axis
//!   ├─ dataset::keep_triggers()    contrast triggers → classes 0/1
//!   ├─ balance::balance_classes()  seeded downsample to smallest class
//!   ├─ align::align_sign_inplace() flip sources anticorrelated with
//!   │                              the first subject
//!   ├─ equalize::equalize_trials() trim all subjects to global minimum
//!   └─ decode::across_subject()    LOSO × timepoint: scale → (k-best) → SVM
//!        │
//!        └─→ [n_subjects, n_times] accuracy matrix  (io::write_npy_arr2)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use megdecode::{decode_contrast, io::write_npy_arr2, Contrast, DecodingConfig};
//!
//! let subjects: Vec<String> =
//!     ["0108", "0109", "0110", "0111"].iter().map(|s| s.to_string()).collect();
//! let labels = vec!["parsopercularis-lh".to_string()];
//! let contrast = Contrast::builtin_by_label("pos_neg").unwrap();
//!
//! let cfg = DecodingConfig { k_features: Some(150), ..DecodingConfig::default() };
//! let results = decode_contrast(
//!     Path::new("data"), &subjects, &labels, &contrast, &cfg,
//! ).unwrap();
//!
//! write_npy_arr2(Path::new("results/across_subjects_pos_neg.npy"), &results).unwrap();
//! ```
//!
//! Every randomized step draws from a single `StdRng` seeded by
//! [`DecodingConfig::seed`], so runs are reproducible end to end.

pub mod align;
pub mod balance;
pub mod config;
pub mod dataset;
pub mod decode;
pub mod equalize;
pub mod io;
pub mod scale;
pub mod select;
pub mod stats;
pub mod svm;

use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing::info;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `megdecode::Foo` without having to know the internal module layout.

// config
pub use config::{load_contrasts, Contrast, DecodingConfig};

// dataset
pub use dataset::{check_shapes, keep_triggers, read_subject, SubjectData};

// balance / align / equalize
pub use align::align_sign_inplace;
pub use balance::balance_classes;
pub use equalize::{equalize_trials, subsample_trials};

// decode
pub use decode::{across_subject, grand_average, Decoder};

// scale / select / svm
pub use scale::Scaler;
pub use select::{f_classif, select_k_best};
pub use svm::{Gamma, Kernel, Svm, SvmParams};

// stats
pub use stats::{compare_windows, paired_ttest, window_mean, TTest, WindowComparison};

/// Load and prepare every subject for across-subject decoding.
///
/// Steps, in order:
/// 1. Read each subject's label files and trigger vector.
/// 2. Keep only the contrast's triggers, recoded to classes 0/1.
/// 3. Balance classes by seeded downsampling.
/// 4. Flip the sign of sources anticorrelated with the first subject
///    (the first subject is the polarity reference and is never flipped).
/// 5. Trim every subject to the global minimum trial count.
///
/// Postconditions: all subjects have identical trial counts, identical
/// source/time dimensions, and exactly balanced classes.
pub fn prepare_subjects(
    data_dir: &Path,
    subjects: &[String],
    labels: &[String],
    contrast: &Contrast,
    cfg: &DecodingConfig,
) -> Result<Vec<SubjectData>> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let mut prepared: Vec<SubjectData> = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let raw = read_subject(data_dir, subject, labels)?;
        info!(
            subject = %subject,
            trials = raw.n_trials(),
            sources = raw.n_sources(),
            times = raw.n_times(),
            "loaded subject"
        );

        let filtered = keep_triggers(&raw, contrast)?;
        let mut balanced = balance_classes(&filtered, &mut rng);

        if let Some(reference) = prepared.first() {
            let flipped = align_sign_inplace(&reference.x, &mut balanced.x)?;
            info!(subject = %subject, flipped = flipped.len(), "sign-aligned to reference");
        }
        prepared.push(balanced);
    }

    check_shapes(&prepared)?;
    let equalized = equalize_trials(&prepared, &mut rng)?;
    info!(
        trials = equalized[0].n_trials(),
        "equalized trial counts across {} subjects",
        equalized.len()
    );
    Ok(equalized)
}

/// Prepare all subjects and run the full LOSO × timepoint evaluation.
///
/// See [`prepare_subjects`] and [`decode::across_subject`].
pub fn decode_contrast(
    data_dir: &Path,
    subjects: &[String],
    labels: &[String],
    contrast: &Contrast,
    cfg: &DecodingConfig,
) -> Result<Array2<f64>> {
    let prepared = prepare_subjects(data_dir, subjects, labels, contrast, cfg)?;
    across_subject(cfg, &prepared)
}
