//! Cross-subject sign alignment of source-localized signals.
//!
//! The sign of a source estimate is arbitrary up to the orientation of the
//! dipole normal, so the same evoked response can appear polarity-flipped
//! between subjects.  For each source, the trial-mean time course is
//! correlated with the reference subject's; a negative Pearson correlation
//! flips the sign of that source's data for every trial and timepoint.
//!
//! Magnitudes are never changed, and the reference subject is never mutated.
use anyhow::{bail, Result};
use ndarray::{s, Array1, Array3, Axis};

/// Flip the sign of sources in `x` that anticorrelate with `reference`.
///
/// Both arrays are `[trials, sources, times]`; trial counts may differ,
/// source and time counts must match.  Returns the indices of the flipped
/// sources.
///
/// A source whose mean time course has zero variance in either array has an
/// undefined correlation and is left untouched.
pub fn align_sign_inplace(reference: &Array3<f64>, x: &mut Array3<f64>) -> Result<Vec<usize>> {
    if reference.shape()[2] != x.shape()[2] {
        bail!(
            "time dimension mismatch: reference has {}, subject has {}",
            reference.shape()[2],
            x.shape()[2]
        );
    }
    if reference.shape()[1] != x.shape()[1] {
        bail!(
            "source dimension mismatch: reference has {}, subject has {}",
            reference.shape()[1],
            x.shape()[1]
        );
    }

    let n_sources = x.shape()[1];
    let mut flipped = Vec::new();
    for p in 0..n_sources {
        // Mean over trials, per timepoint.
        let mean_ref: Array1<f64> = reference.slice(s![.., p, ..]).mean_axis(Axis(0)).unwrap();
        let mean_x: Array1<f64> = x.slice(s![.., p, ..]).mean_axis(Axis(0)).unwrap();

        if pearson(&mean_ref, &mean_x) < 0.0 {
            x.slice_mut(s![.., p, ..]).mapv_inplace(|v| -v);
            flipped.push(p);
        }
    }
    Ok(flipped)
}

/// Pearson correlation of two equal-length series; 0.0 when either side has
/// zero variance.
fn pearson(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let n = a.len() as f64;
    let ma = a.sum() / n;
    let mb = b.sum() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    if va == 0.0 || vb == 0.0 {
        return 0.0;
    }
    cov / (va.sqrt() * vb.sqrt())
}
