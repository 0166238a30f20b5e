//! Run configuration.
//!
//! [`DecodingConfig`] holds every tunable parameter for a decoding run.
//! All fields have defaults that match the values used in the published
//! analysis.  [`Contrast`] names the two trigger-code sets a binary decoder
//! discriminates; contrasts can be loaded from a JSON file alongside the
//! built-in ones.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::svm::{Gamma, Kernel, SvmParams};

/// Configuration for a leave-one-subject-out decoding run.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use megdecode::DecodingConfig;
///
/// let cfg = DecodingConfig {
///     k_features: Some(150),   // ANOVA-F feature selection
///     seed: 7,
///     ..DecodingConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DecodingConfig {
    /// Seed for every randomized step (class balancing, trial equalization).
    ///
    /// Two runs with the same seed, inputs, and configuration produce
    /// byte-identical accuracy matrices.
    ///
    /// Default: `42`.
    pub seed: u64,

    /// SVM kernel.
    ///
    /// Default: [`Kernel::Rbf`].
    pub kernel: Kernel,

    /// SVM regularization parameter `C`.
    ///
    /// Default: `1.0`.
    pub c: f64,

    /// RBF kernel width.
    ///
    /// [`Gamma::Scale`] computes `1 / (n_features · var(X_train))` per fit,
    /// from training data only.
    ///
    /// Default: [`Gamma::Scale`].
    pub gamma: Gamma,

    /// Number of features kept by ANOVA-F univariate selection, per
    /// timepoint, fitted on training folds only.  `None` disables selection
    /// (all sources are fed to the SVM).
    ///
    /// Default: `None`.
    pub k_features: Option<usize>,

    /// Sampling rate of the epoched data in Hz.  Only used to convert
    /// time windows in seconds to sample indices.
    ///
    /// Default: `250.0` Hz.
    pub sfreq: f64,

    /// Epoch start relative to stimulus onset, in seconds.
    ///
    /// Default: `-0.2` s.
    pub tmin: f64,
}

impl Default for DecodingConfig {
    /// Returns the published analysis configuration:
    /// RBF SVM, C = 1, gamma scale, no feature selection, 250 Hz, −0.2 s.
    fn default() -> Self {
        Self {
            seed: 42,
            kernel: Kernel::Rbf,
            c: 1.0,
            gamma: Gamma::Scale,
            k_features: None,
            sfreq: 250.0,
            tmin: -0.2,
        }
    }
}

impl DecodingConfig {
    /// Sample index of a latency given in seconds relative to stimulus onset.
    ///
    /// At the defaults, onset (0.0 s) falls on sample 50.
    ///
    /// # Examples
    ///
    /// ```
    /// use megdecode::DecodingConfig;
    /// let cfg = DecodingConfig::default();
    /// assert_eq!(cfg.sample_at(0.0), 50);
    /// assert_eq!(cfg.sample_at(0.52), 180);
    /// ```
    pub fn sample_at(&self, seconds: f64) -> usize {
        ((seconds - self.tmin) * self.sfreq).round() as usize
    }

    /// SVM parameters derived from this configuration.
    pub fn svm_params(&self) -> SvmParams {
        SvmParams {
            kernel: self.kernel,
            c: self.c,
            gamma: self.gamma,
            ..SvmParams::default()
        }
    }
}

// ── Contrasts ─────────────────────────────────────────────────────────────────

/// A binary decoding contrast: trigger codes mapped to class 0 and class 1.
///
/// The experiment's trigger scheme:
/// 11 img/self/positive, 12 img/self/negative, 21 img/assigned/positive,
/// 22 img/assigned/negative, 202 button press.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contrast {
    /// Name used in output filenames (e.g. `pos_neg`).
    pub label: String,
    /// Trigger codes recoded to class 0.
    pub zero: Vec<i64>,
    /// Trigger codes recoded to class 1.
    pub one: Vec<i64>,
}

impl Contrast {
    pub fn new(label: &str, zero: &[i64], one: &[i64]) -> Self {
        Self { label: label.to_string(), zero: zero.to_vec(), one: one.to_vec() }
    }

    /// The three contrasts of the published analysis.
    pub fn builtin() -> Vec<Contrast> {
        vec![
            Contrast::new("pos_neg", &[11, 21], &[12, 22]),
            Contrast::new("self_assigned", &[11, 12], &[21, 22]),
            Contrast::new("innerspeech_buttonpress", &[11, 21, 12, 22], &[202]),
        ]
    }

    /// Look up a built-in contrast by label.
    pub fn builtin_by_label(label: &str) -> Option<Contrast> {
        Self::builtin().into_iter().find(|c| c.label == label)
    }
}

/// Load contrast definitions from a JSON file.
///
/// Format: a list of `{"label": …, "zero": […], "one": […]}` objects,
/// mirroring the session-info JSON the preprocessing stage consumes.
pub fn load_contrasts(path: &Path) -> Result<Vec<Contrast>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let contrasts: Vec<Contrast> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    for c in &contrasts {
        if c.zero.is_empty() || c.one.is_empty() {
            bail!("contrast '{}' has an empty trigger set", c.label);
        }
        if c.zero.iter().any(|t| c.one.contains(t)) {
            bail!("contrast '{}' assigns a trigger to both classes", c.label);
        }
    }
    Ok(contrasts)
}
