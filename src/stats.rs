//! Statistical validation of decoding results.
//!
//! Accuracy matrices from two decoding runs are averaged over a latency
//! window per subject and compared with a two-sided paired t-test, the
//! same comparison `scipy.stats.ttest_rel` performs.  The p-value comes
//! from the Student-t CDF expressed through the regularized incomplete
//! beta function.
use anyhow::{bail, Result};
use ndarray::{s, Array1, Array2};

use crate::config::DecodingConfig;

/// Per-subject mean accuracy over a latency window.
///
/// `window` is `[start, stop)` in seconds relative to stimulus onset; the
/// epoch itself starts at `cfg.tmin` (−0.2 s by default), so 0.52 s maps to
/// sample 180 at 250 Hz.
pub fn window_mean(
    acc: &Array2<f64>,
    window: (f64, f64),
    cfg: &DecodingConfig,
) -> Result<Array1<f64>> {
    let start = cfg.sample_at(window.0);
    let stop = cfg.sample_at(window.1);
    let n_times = acc.ncols();
    if start >= stop {
        bail!("empty time window {:?}", window);
    }
    if stop > n_times {
        bail!(
            "window {:?} ends at sample {stop}, but the epoch has {n_times} samples",
            window
        );
    }
    Ok(acc
        .slice(s![.., start..stop])
        .mean_axis(ndarray::Axis(1))
        .unwrap())
}

/// Result of a paired t-test.
#[derive(Debug, Clone, Copy)]
pub struct TTest {
    pub t: f64,
    /// Two-sided p-value.
    pub p: f64,
    pub df: usize,
}

/// Two-sided paired t-test over matched samples.
///
/// Degenerate inputs follow the usual conventions: identical samples give
/// `t = NaN`; a nonzero mean difference with zero variance gives
/// `t = ±inf`, `p = 0`.
pub fn paired_ttest(a: &Array1<f64>, b: &Array1<f64>) -> Result<TTest> {
    if a.len() != b.len() {
        bail!("paired t-test needs equal sample counts, got {} and {}", a.len(), b.len());
    }
    let n = a.len();
    if n < 2 {
        bail!("paired t-test needs at least 2 pairs, got {n}");
    }

    let diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(&x, &y)| x - y).collect();
    let mean = diffs.iter().sum::<f64>() / n as f64;
    let var = diffs.iter().map(|&d| (d - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let df = n - 1;

    if var == 0.0 {
        let t = if mean == 0.0 {
            f64::NAN
        } else if mean > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };
        let p = if t.is_nan() { f64::NAN } else { 0.0 };
        return Ok(TTest { t, p, df });
    }

    let t = mean / (var / n as f64).sqrt();
    let p = student_t_two_sided(t, df as f64);
    Ok(TTest { t, p, df })
}

/// Mean and standard deviation (ddof = 0) of a sample.
pub fn mean_std(a: &Array1<f64>) -> (f64, f64) {
    let n = a.len() as f64;
    let mean = a.sum() / n;
    let var = a.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Two accuracy matrices compared over one latency window.
#[derive(Debug, Clone)]
pub struct WindowComparison {
    pub window: (f64, f64),
    pub label_a: String,
    pub label_b: String,
    pub mean_a: f64,
    pub std_a: f64,
    pub mean_b: f64,
    pub std_b: f64,
    pub test: TTest,
}

/// Window-average both matrices and run the paired test.
pub fn compare_windows(
    acc_a: &Array2<f64>,
    acc_b: &Array2<f64>,
    label_a: &str,
    label_b: &str,
    window: (f64, f64),
    cfg: &DecodingConfig,
) -> Result<WindowComparison> {
    if acc_a.nrows() != acc_b.nrows() {
        bail!(
            "subject counts differ: {} vs {} — the test pairs subjects",
            acc_a.nrows(),
            acc_b.nrows()
        );
    }
    let wa = window_mean(acc_a, window, cfg)?;
    let wb = window_mean(acc_b, window, cfg)?;
    let (mean_a, std_a) = mean_std(&wa);
    let (mean_b, std_b) = mean_std(&wb);
    let test = paired_ttest(&wa, &wb)?;
    Ok(WindowComparison {
        window,
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        mean_a,
        std_a,
        mean_b,
        std_b,
        test,
    })
}

impl WindowComparison {
    /// Plain-text block in the historical report format.
    pub fn report(&self) -> String {
        format!(
            "Time window: ({:.3}, {:.3})\n\
             Decoding type 1: {}\n\
             Decoding type 2: {}\n\
             Mean accuracy decoding type 1: {:.4}, standard deviation: {:.4}\n\
             Mean accuracy decoding type 2: {:.4}, standard deviation: {:.4}\n\
             t = {:.4}, p = {:.4}\n\n",
            self.window.0,
            self.window.1,
            self.label_a,
            self.label_b,
            self.mean_a,
            self.std_a,
            self.mean_b,
            self.std_b,
            self.test.t,
            self.test.p,
        )
    }
}

// ── Student-t tail probability ───────────────────────────────────────────────
//
// P(|T| > t) = I_{ν/(ν+t²)}(ν/2, 1/2) for ν degrees of freedom, evaluated
// through the regularized incomplete beta function (continued-fraction
// form, which converges quickly for these arguments).

fn student_t_two_sided(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    betai(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Regularized incomplete beta function I_x(a, b).
fn betai(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * betacf(a, b, x) / a
    } else {
        1.0 - front * betacf(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta (modified Lentz's method).
fn betacf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Natural log of the gamma function (Lanczos, g = 7, 9 coefficients).
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // Reflection formula.
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = COEF[0];
    for (i, &c) in COEF.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}
