//! C-support-vector classification.
//!
//! A small, deterministic SMO solver for the binary soft-margin dual
//! problem, covering what `sklearn.svm.SVC` is used for here: linear and
//! RBF kernels, `C` regularization, `gamma='scale'`.  The second working
//! variable is chosen by the maximum-|E₁ − E₂| heuristic instead of at
//! random, so a fit is reproducible from the data alone.
//!
//! Kernel values for the training set are precomputed; decoding folds are a
//! few hundred trials per timepoint, so the Gram matrix stays small.
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Kernel function of the decision rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Linear,
    Rbf,
}

/// RBF kernel width policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features · var(X_train))`, variance over all entries.
    Scale,
    Fixed(f64),
}

/// Hyperparameters of the solver.
#[derive(Debug, Clone)]
pub struct SvmParams {
    pub kernel: Kernel,
    /// Soft-margin penalty.
    pub c: f64,
    pub gamma: Gamma,
    /// KKT violation tolerance.
    pub tol: f64,
    /// Consecutive full sweeps without an update before declaring
    /// convergence.
    pub max_passes: usize,
    /// Hard cap on full sweeps.
    pub max_iter: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            kernel: Kernel::Rbf,
            c: 1.0,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_passes: 5,
            max_iter: 1_000,
        }
    }
}

enum Model {
    /// Training fold contained a single class; predict it everywhere.
    Constant(i64),
    Smo {
        /// Class predicted for negative/positive decision values.
        classes: (i64, i64),
        support: Array2<f64>,
        /// `αᵢ·tᵢ` per support vector.
        coef: Vec<f64>,
        bias: f64,
        gamma: f64,
    },
}

/// A fitted classifier.
pub struct Svm {
    kernel: Kernel,
    model: Model,
}

impl Svm {
    /// Train on `x` (`[trials, features]`) with integer class labels.
    ///
    /// Exactly two distinct labels are expected; a single-class fold
    /// degenerates to a constant predictor (it can happen when a subject
    /// contributes very few trials), more than two is an error.
    pub fn fit(params: &SvmParams, x: ArrayView2<'_, f64>, y: &[i64]) -> Result<Svm> {
        if x.nrows() != y.len() {
            bail!("{} trials but {} labels", x.nrows(), y.len());
        }
        if x.nrows() == 0 {
            bail!("cannot fit on zero trials");
        }

        let mut classes: Vec<i64> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        match classes.len() {
            1 => {
                return Ok(Svm { kernel: params.kernel, model: Model::Constant(classes[0]) });
            }
            2 => {}
            n => bail!("expected a binary problem, got {n} classes"),
        }
        let (neg, pos) = (classes[0], classes[1]);
        let t: Vec<f64> = y.iter().map(|&v| if v == neg { -1.0 } else { 1.0 }).collect();

        let gamma = resolve_gamma(params, x);
        let (alpha, bias) = smo(params, x, &t, gamma);

        // Keep only the support vectors.
        let sv_idx: Vec<usize> = (0..alpha.len()).filter(|&i| alpha[i] > 1e-12).collect();
        let mut support = Array2::<f64>::zeros((sv_idx.len(), x.ncols()));
        let mut coef = Vec::with_capacity(sv_idx.len());
        for (row, &i) in sv_idx.iter().enumerate() {
            support.row_mut(row).assign(&x.row(i));
            coef.push(alpha[i] * t[i]);
        }

        Ok(Svm {
            kernel: params.kernel,
            model: Model::Smo { classes: (neg, pos), support, coef, bias, gamma },
        })
    }

    /// Signed distance from the separating surface, one value per trial.
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        match &self.model {
            Model::Constant(_) => vec![0.0; x.nrows()],
            Model::Smo { support, coef, bias, gamma, .. } => x
                .rows()
                .into_iter()
                .map(|row| {
                    let mut f = *bias;
                    for (sv, &a) in support.rows().into_iter().zip(coef.iter()) {
                        f += a * kernel_eval(self.kernel, *gamma, sv, row);
                    }
                    f
                })
                .collect(),
        }
    }

    /// Predicted class label per trial.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<i64> {
        match &self.model {
            Model::Constant(class) => vec![*class; x.nrows()],
            Model::Smo { classes, .. } => self
                .decision_function(x)
                .into_iter()
                .map(|f| if f >= 0.0 { classes.1 } else { classes.0 })
                .collect(),
        }
    }

    /// Mean accuracy on `(x, y)`.
    pub fn score(&self, x: ArrayView2<'_, f64>, y: &[i64]) -> f64 {
        let pred = self.predict(x);
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        correct as f64 / y.len() as f64
    }

    /// Number of support vectors (0 for a constant model).
    pub fn n_support(&self) -> usize {
        match &self.model {
            Model::Constant(_) => 0,
            Model::Smo { coef, .. } => coef.len(),
        }
    }
}

fn resolve_gamma(params: &SvmParams, x: ArrayView2<'_, f64>) -> f64 {
    match params.gamma {
        Gamma::Fixed(g) => g,
        Gamma::Scale => {
            let n = x.len() as f64;
            let mean = x.sum() / n;
            let var = x.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
            if var > 0.0 {
                1.0 / (x.ncols() as f64 * var)
            } else {
                1.0
            }
        }
    }
}

fn kernel_eval(kernel: Kernel, gamma: f64, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    match kernel {
        Kernel::Linear => a.dot(&b),
        Kernel::Rbf => {
            let sq: f64 = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| {
                    let d = x - y;
                    d * d
                })
                .sum();
            (-gamma * sq).exp()
        }
    }
}

/// Simplified SMO over the precomputed Gram matrix.
///
/// Returns the dual coefficients α and the bias term.
fn smo(params: &SvmParams, x: ArrayView2<'_, f64>, t: &[f64], gamma: f64) -> (Vec<f64>, f64) {
    let n = t.len();
    let c = params.c;

    // Gram matrix.
    let mut k = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let v = kernel_eval(params.kernel, gamma, x.row(i), x.row(j));
            k[[i, j]] = v;
            k[[j, i]] = v;
        }
    }

    let mut alpha = vec![0.0_f64; n];
    let mut b = 0.0_f64;
    // With α = 0 the decision value is 0, so Eᵢ = −tᵢ.
    let mut e: Vec<f64> = t.iter().map(|&ti| -ti).collect();

    let mut passes = 0usize;
    let mut iter = 0usize;
    while passes < params.max_passes && iter < params.max_iter {
        let mut changed = 0usize;
        for i in 0..n {
            let r = e[i] * t[i];
            let violates = (r < -params.tol && alpha[i] < c) || (r > params.tol && alpha[i] > 0.0);
            if !violates {
                continue;
            }

            // Second variable: maximize |Eᵢ − Eⱼ|.
            let mut j = usize::MAX;
            let mut best = -1.0;
            for (cand, &ej) in e.iter().enumerate() {
                if cand == i {
                    continue;
                }
                let gap = (e[i] - ej).abs();
                if gap > best {
                    best = gap;
                    j = cand;
                }
            }
            if j == usize::MAX {
                continue;
            }

            let (ai_old, aj_old) = (alpha[i], alpha[j]);
            let (lo, hi) = if (t[i] - t[j]).abs() > f64::EPSILON {
                ((aj_old - ai_old).max(0.0), (c + aj_old - ai_old).min(c))
            } else {
                ((ai_old + aj_old - c).max(0.0), (ai_old + aj_old).min(c))
            };
            if hi - lo < 1e-12 {
                continue;
            }

            let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
            if eta >= 0.0 {
                continue;
            }

            let mut aj_new = aj_old - t[j] * (e[i] - e[j]) / eta;
            aj_new = aj_new.clamp(lo, hi);
            if (aj_new - aj_old).abs() < 1e-5 {
                continue;
            }
            let ai_new = ai_old + t[i] * t[j] * (aj_old - aj_new);

            let da_i = ai_new - ai_old;
            let da_j = aj_new - aj_old;

            let b1 = b - e[i] - t[i] * da_i * k[[i, i]] - t[j] * da_j * k[[i, j]];
            let b2 = b - e[j] - t[i] * da_i * k[[i, j]] - t[j] * da_j * k[[j, j]];
            let b_new = if ai_new > 0.0 && ai_new < c {
                b1
            } else if aj_new > 0.0 && aj_new < c {
                b2
            } else {
                (b1 + b2) / 2.0
            };
            let db = b_new - b;

            alpha[i] = ai_new;
            alpha[j] = aj_new;
            b = b_new;
            for kk in 0..n {
                e[kk] += t[i] * da_i * k[[i, kk]] + t[j] * da_j * k[[j, kk]] + db;
            }
            changed += 1;
        }
        if changed == 0 {
            passes += 1;
        } else {
            passes = 0;
        }
        iter += 1;
    }

    (alpha, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn linear_params() -> SvmParams {
        SvmParams { kernel: Kernel::Linear, ..SvmParams::default() }
    }

    #[test]
    fn separates_linearly_separable_classes() {
        let x = array![
            [-2.0, -1.5],
            [-1.5, -2.2],
            [-2.5, -1.0],
            [2.0, 1.5],
            [1.5, 2.2],
            [2.5, 1.0],
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let svm = Svm::fit(&linear_params(), x.view(), &y).unwrap();
        assert_eq!(svm.predict(x.view()), y.to_vec());
        assert_eq!(svm.score(x.view(), &y), 1.0);
        assert!(svm.n_support() >= 2);
    }

    #[test]
    fn generalizes_to_unseen_points() {
        let x = array![
            [-1.0, 0.0],
            [-1.2, 0.4],
            [-0.8, -0.3],
            [1.0, 0.0],
            [1.2, -0.4],
            [0.8, 0.3],
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let svm = Svm::fit(&linear_params(), x.view(), &y).unwrap();
        let test = array![[-2.0, 0.1], [2.0, -0.1]];
        assert_eq!(svm.predict(test.view()), vec![0, 1]);
    }

    #[test]
    fn rbf_solves_xor() {
        // XOR is not linearly separable; the RBF kernel handles it.
        let x = array![
            [0.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [1.0, 0.0],
        ];
        let y = [0, 0, 1, 1];
        let params = SvmParams { c: 10.0, ..SvmParams::default() };
        let svm = Svm::fit(&params, x.view(), &y).unwrap();
        assert_eq!(svm.predict(x.view()), y.to_vec());
    }

    #[test]
    fn single_class_fold_predicts_constant() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = [1, 1];
        let svm = Svm::fit(&linear_params(), x.view(), &y).unwrap();
        let test = array![[100.0, -7.0]];
        assert_eq!(svm.predict(test.view()), vec![1]);
        assert_eq!(svm.n_support(), 0);
    }

    #[test]
    fn three_classes_rejected() {
        let x = Array2::zeros((3, 2));
        let y = [0, 1, 2];
        assert!(Svm::fit(&linear_params(), x.view(), &y).is_err());
    }

    #[test]
    fn fit_is_deterministic() {
        let x = Array2::from_shape_fn((20, 4), |(i, j)| ((i * 7 + j * 3) % 11) as f64 - 5.0);
        let y: Vec<i64> = (0..20).map(|i| (i % 2) as i64).collect();
        let a = Svm::fit(&SvmParams::default(), x.view(), &y).unwrap();
        let b = Svm::fit(&SvmParams::default(), x.view(), &y).unwrap();
        assert_eq!(a.decision_function(x.view()), b.decision_function(x.view()));
    }

    #[test]
    fn scale_gamma_uses_feature_count_and_variance() {
        let x = array![[0.0, 0.0], [2.0, 2.0]]; // var = 1, d = 2
        let params = SvmParams::default();
        approx::assert_abs_diff_eq!(resolve_gamma(&params, x.view()), 0.5, epsilon = 1e-12);
    }
}
