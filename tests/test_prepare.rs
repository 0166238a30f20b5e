mod common;
use common::{block_triggers, synthetic_subject, write_subject};
use megdecode::{prepare_subjects, Contrast, DecodingConfig};

fn prepared_fixture(
    seed: u64,
) -> (tempfile::TempDir, Vec<String>, Vec<String>, Contrast, DecodingConfig) {
    let dir = tempfile::tempdir().unwrap();
    // Four subjects with uneven trial counts and classes; subjects 1 and 3
    // recorded with flipped polarity.
    let specs = [
        ("0108", 6, 0, 1.0),
        ("0109", 5, 2, -1.0),
        ("0110", 7, 1, 1.0),
        ("0111", 6, 3, -1.0),
    ];
    for (i, (subject, reps, extra, polarity)) in specs.iter().enumerate() {
        let triggers = block_triggers(*reps, *extra);
        let (x, y) = synthetic_subject(&triggers, 3, 8, 4, *polarity, 100 + i as u64);
        write_subject(dir.path(), subject, &["parsopercularis-lh"], &x, &y);
    }
    let subjects = specs.iter().map(|(s, ..)| s.to_string()).collect();
    let labels = vec!["parsopercularis-lh".to_string()];
    let contrast = Contrast::builtin_by_label("pos_neg").unwrap();
    let cfg = DecodingConfig { seed, ..DecodingConfig::default() };
    (dir, subjects, labels, contrast, cfg)
}

#[test]
fn all_subjects_balanced_and_equalized() {
    let (dir, subjects, labels, contrast, cfg) = prepared_fixture(42);
    let prepared = prepare_subjects(dir.path(), &subjects, &labels, &contrast, &cfg).unwrap();

    assert_eq!(prepared.len(), 4);
    // Smallest subject: 5 reps → 10 per class after balancing → 20 trials.
    let n = prepared[0].n_trials();
    for s in &prepared {
        assert_eq!(s.n_trials(), n, "subject {} trial count", s.subject);
        let counts = s.class_counts();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].1, counts[1].1, "subject {} unbalanced", s.subject);
        assert_eq!(s.n_sources(), 3);
        assert_eq!(s.n_times(), 8);
    }
    assert_eq!(n, 20);
}

#[test]
fn same_seed_reproduces_selection() {
    let (dir, subjects, labels, contrast, cfg) = prepared_fixture(7);
    let a = prepare_subjects(dir.path(), &subjects, &labels, &contrast, &cfg).unwrap();
    let b = prepare_subjects(dir.path(), &subjects, &labels, &contrast, &cfg).unwrap();
    for (sa, sb) in a.iter().zip(b.iter()) {
        assert_eq!(sa.x, sb.x);
        assert_eq!(sa.y, sb.y);
    }
}

#[test]
fn flipped_subjects_are_realigned() {
    let (dir, subjects, labels, contrast, cfg) = prepared_fixture(42);
    let prepared = prepare_subjects(dir.path(), &subjects, &labels, &contrast, &cfg).unwrap();

    // After alignment, every subject's class-1 (negative valence) mean in
    // the signal window must have the same sign as the reference subject's.
    let signal_mean = |s: &megdecode::SubjectData| {
        let mut sum = 0.0;
        let mut count = 0.0;
        for (tr, &label) in s.y.iter().enumerate() {
            if label == 1 {
                for p in 0..s.n_sources() {
                    for t in 4..s.n_times() {
                        sum += s.x[[tr, p, t]];
                        count += 1.0;
                    }
                }
            }
        }
        sum / count
    };
    let reference = signal_mean(&prepared[0]);
    for s in &prepared[1..] {
        assert!(
            signal_mean(s) * reference > 0.0,
            "subject {} polarity disagrees with reference",
            s.subject
        );
    }
}

#[test]
fn missing_subject_directory_is_an_error() {
    let (dir, mut subjects, labels, contrast, cfg) = prepared_fixture(42);
    subjects.push("9999".to_string());
    assert!(prepare_subjects(dir.path(), &subjects, &labels, &contrast, &cfg).is_err());
}

#[test]
fn multiple_labels_concatenate_sources() {
    let dir = tempfile::tempdir().unwrap();
    let triggers = block_triggers(5, 0);
    for (i, subject) in ["0108", "0109"].iter().enumerate() {
        let (x, y) = synthetic_subject(&triggers, 3, 8, 4, 1.0, i as u64);
        write_subject(
            dir.path(),
            subject,
            &["parsopercularis-lh", "parsorbitalis-lh"],
            &x,
            &y,
        );
    }
    let subjects = vec!["0108".to_string(), "0109".to_string()];
    let labels = vec!["parsopercularis-lh".to_string(), "parsorbitalis-lh".to_string()];
    let contrast = Contrast::builtin_by_label("pos_neg").unwrap();
    let cfg = DecodingConfig::default();
    let prepared = prepare_subjects(dir.path(), &subjects, &labels, &contrast, &cfg).unwrap();
    assert_eq!(prepared[0].n_sources(), 6);
}
