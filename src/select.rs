//! Univariate ANOVA-F feature selection.
//!
//! Matches `sklearn.feature_selection.SelectKBest(f_classif, k)`: a one-way
//! ANOVA F statistic is computed per feature across the classes present in
//! the training labels, and the `k` highest-scoring features are kept.
//! Scores are computed on training folds only; the same column subset is
//! then applied to the held-out data.
use ndarray::{Array2, ArrayView2};

/// Indices of the `k` features with the largest F statistic, ascending.
///
/// `k` is clamped to the feature count.  Ties and non-finite scores are
/// broken by preferring the lower feature index; NaN (a feature constant
/// within every class) ranks last.
pub fn select_k_best(x: ArrayView2<'_, f64>, y: &[i64], k: usize) -> Vec<usize> {
    let scores = f_classif(x, y);
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = if scores[a].is_nan() { f64::NEG_INFINITY } else { scores[a] };
        let fb = if scores[b].is_nan() { f64::NEG_INFINITY } else { scores[b] };
        fb.partial_cmp(&fa).unwrap().then(a.cmp(&b))
    });
    let mut keep: Vec<usize> = order.into_iter().take(k.min(scores.len())).collect();
    keep.sort_unstable();
    keep
}

/// Restrict `data` ([trials, features]) to the given feature columns.
pub fn take_features(data: ArrayView2<'_, f64>, features: &[usize]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((data.nrows(), features.len()));
    for (j, &f) in features.iter().enumerate() {
        out.column_mut(j).assign(&data.column(f));
    }
    out
}

/// One-way ANOVA F statistic per feature.
///
/// F = (SS_between / (k − 1)) / (SS_within / (n − k)).  A feature with zero
/// within-class variance scores `inf` when the class means differ (perfect
/// separator) and `NaN` when they do not (constant feature).
pub fn f_classif(x: ArrayView2<'_, f64>, y: &[i64]) -> Vec<f64> {
    assert_eq!(x.nrows(), y.len(), "feature rows and labels disagree");

    let mut classes: Vec<i64> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let k = classes.len();
    let n = y.len();

    let mut scores = Vec::with_capacity(x.ncols());
    for f in 0..x.ncols() {
        let col = x.column(f);
        let grand_mean: f64 = col.sum() / n as f64;

        let mut ss_between = 0.0;
        let mut ss_within = 0.0;
        for &class in &classes {
            let vals: Vec<f64> = col
                .iter()
                .zip(y.iter())
                .filter(|(_, &lbl)| lbl == class)
                .map(|(&v, _)| v)
                .collect();
            let m: f64 = vals.iter().sum::<f64>() / vals.len() as f64;
            ss_between += vals.len() as f64 * (m - grand_mean).powi(2);
            ss_within += vals.iter().map(|&v| (v - m).powi(2)).sum::<f64>();
        }

        let df_between = (k - 1) as f64;
        let df_within = (n - k) as f64;
        let num = ss_between / df_between;
        let den = ss_within / df_within;
        scores.push(num / den); // den == 0 → inf or NaN, handled by the sort
    }
    scores
}
