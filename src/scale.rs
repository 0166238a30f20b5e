//! Per-feature standardization with train-fold statistics.
//!
//! Matches `sklearn.preprocessing.StandardScaler`:
//!   μ_f = mean over training trials,  σ_f = std (ddof=0)
//!   v → (v − μ_f) / σ_f,   with σ_f = 0 features only centered.
//!
//! Unlike the global z-score used on continuous recordings, this is fitted
//! per decoding fold and timepoint — the held-out subject's trials must be
//! transformed with training statistics only.
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Fitted per-feature mean and standard deviation.
#[derive(Debug, Clone)]
pub struct Scaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl Scaler {
    /// Fit on training trials, shape `[trials, features]`.
    pub fn fit(train: ArrayView2<'_, f64>) -> Self {
        let n = train.nrows() as f64;
        let mean = train.mean_axis(Axis(0)).unwrap();
        let mut std = Array1::<f64>::zeros(train.ncols());
        for (f, s) in std.iter_mut().enumerate() {
            let m = mean[f];
            let var: f64 = train
                .column(f)
                .iter()
                .map(|&x| {
                    let d = x - m;
                    d * d
                })
                .sum::<f64>()
                / n;
            *s = var.sqrt();
        }
        Self { mean, std }
    }

    /// Standardize `data` ([trials, features]) with the fitted statistics.
    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            for (f, v) in row.iter_mut().enumerate() {
                *v -= self.mean[f];
                if self.std[f] > 0.0 {
                    *v /= self.std[f];
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn train_features_zero_mean_unit_std() {
        let train = array![[1.0, 10.0], [3.0, 30.0], [5.0, 20.0], [7.0, 40.0]];
        let scaler = Scaler::fit(train.view());
        let out = scaler.transform(train.view());

        for f in 0..2 {
            let col = out.column(f);
            let mean: f64 = col.sum() / col.len() as f64;
            let var: f64 = col.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            approx::assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
            approx::assert_abs_diff_eq!(var.sqrt(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fold_uses_train_statistics() {
        let train = array![[0.0], [2.0]]; // mean 1, std 1
        let test = array![[4.0]];
        let scaler = Scaler::fit(train.view());
        let out = scaler.transform(test.view());
        approx::assert_abs_diff_eq!(out[[0, 0]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_feature_only_centered() {
        let train = array![[5.0, 1.0], [5.0, 3.0]];
        let scaler = Scaler::fit(train.view());
        let out = scaler.transform(train.view());
        approx::assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(out[[1, 0]], 0.0, epsilon = 1e-12);
    }
}
