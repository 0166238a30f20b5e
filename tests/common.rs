/// Shared helpers for building synthetic subject datasets on disk.
use megdecode::io::write_npy;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Trigger codes of the experiment.
#[allow(unused)]
pub const SELF_POS: i64 = 11;
#[allow(unused)]
pub const SELF_NEG: i64 = 12;
#[allow(unused)]
pub const ASSIGNED_POS: i64 = 21;
#[allow(unused)]
pub const ASSIGNED_NEG: i64 = 22;

/// Build one subject's trials.  From `onset` onward every source carries a
/// class-independent evoked response (+1.5, what sign alignment latches
/// onto) and a valence signal of magnitude 1 (positive triggers +1,
/// negative −1); uniform noise everywhere.  `polarity` simulates the
/// arbitrary source-orientation sign: −1.0 produces a subject whose entire
/// recording is flipped.
#[allow(unused)]
pub fn synthetic_subject(
    triggers: &[i64],
    n_sources: usize,
    n_times: usize,
    onset: usize,
    polarity: f64,
    seed: u64,
) -> (Array3<f64>, Vec<i64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array3::from_shape_fn((triggers.len(), n_sources, n_times), |(tr, _, t)| {
        let noise: f64 = rng.gen_range(-0.2..0.2);
        let signal = if t >= onset {
            let valence = match triggers[tr] {
                SELF_POS | ASSIGNED_POS => 1.0,
                SELF_NEG | ASSIGNED_NEG => -1.0,
                _ => 0.0,
            };
            1.5 + valence
        } else {
            0.0
        };
        polarity * (signal + noise)
    });
    (x, triggers.to_vec())
}

/// Write a subject directory the way the source-localization stage does:
/// one `X_<label>.npy` per label (the same data split across labels is fine
/// for tests) plus `y.npy`.
#[allow(unused)]
pub fn write_subject(
    data_dir: &Path,
    subject: &str,
    labels: &[&str],
    x: &Array3<f64>,
    y: &[i64],
) {
    let dir = data_dir.join(subject);
    std::fs::create_dir_all(&dir).unwrap();
    for label in labels {
        let flat: Vec<f64> = x.iter().copied().collect();
        write_npy(
            &dir.join(format!("X_{label}.npy")),
            &flat,
            &[x.shape()[0], x.shape()[1], x.shape()[2]],
        )
        .unwrap();
    }
    let y_f: Vec<f64> = y.iter().map(|&v| v as f64).collect();
    write_npy(&dir.join("y.npy"), &y_f, &[y.len()]).unwrap();
}

/// A block-design trigger sequence: `reps` repetitions of the four image
/// triggers plus `extra_pos` additional positives to unbalance the classes.
#[allow(unused)]
pub fn block_triggers(reps: usize, extra_pos: usize) -> Vec<i64> {
    let mut triggers = Vec::new();
    for _ in 0..reps {
        triggers.extend_from_slice(&[SELF_POS, SELF_NEG, ASSIGNED_POS, ASSIGNED_NEG]);
    }
    triggers.extend(std::iter::repeat(SELF_POS).take(extra_pos));
    triggers
}
