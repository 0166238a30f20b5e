use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use megdecode::{
    decode_contrast, grand_average,
    io::write_npy_arr2,
    Contrast, DecodingConfig, Gamma, Kernel,
};

#[derive(Parser)]
#[command(name = "decode", about = "Across-subject MEG decoding (LOSO × timepoint)")]
struct Args {
    /// Directory holding one folder per subject with X_<label>.npy / y.npy
    #[arg(long)]
    data_dir: PathBuf,

    /// Output directory for across_subjects_<contrast>.npy
    #[arg(long)]
    out_dir: PathBuf,

    /// Subject IDs (comma-separated)
    #[arg(long, default_value = "0108,0109,0110,0111,0112,0113,0114,0115")]
    subjects: String,

    /// Cortical labels of the region of interest (comma-separated)
    #[arg(long, default_value = "parsopercularis-lh")]
    labels: String,

    /// Contrast name: a built-in (pos_neg, self_assigned,
    /// innerspeech_buttonpress) or one defined in --contrasts-file
    #[arg(long, default_value = "pos_neg")]
    contrast: String,

    /// JSON file with extra contrast definitions
    #[arg(long)]
    contrasts_file: Option<PathBuf>,

    /// SVM kernel: "linear" or "rbf"
    #[arg(long, default_value = "rbf")]
    kernel: String,

    /// SVM regularization parameter C
    #[arg(long, default_value_t = 1.0)]
    c: f64,

    /// Fixed RBF gamma (default: 'scale')
    #[arg(long)]
    gamma: Option<f64>,

    /// Number of features kept by ANOVA-F selection (0 disables)
    #[arg(long, default_value_t = 0)]
    k_features: usize,

    /// Seed for class balancing and trial equalization
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let subjects: Vec<String> = args.subjects.split(',').map(str::to_string).collect();
    let labels: Vec<String> = args.labels.split(',').map(str::to_string).collect();

    let contrast = resolve_contrast(&args)?;
    info!(
        contrast = %contrast.label,
        zero = ?contrast.zero,
        one = ?contrast.one,
        "decoding contrast"
    );

    let kernel = match args.kernel.as_str() {
        "linear" => Kernel::Linear,
        "rbf" => Kernel::Rbf,
        other => bail!("unknown kernel '{other}' (expected linear or rbf)"),
    };

    let cfg = DecodingConfig {
        seed: args.seed,
        kernel,
        c: args.c,
        gamma: args.gamma.map(Gamma::Fixed).unwrap_or(Gamma::Scale),
        k_features: (args.k_features > 0).then_some(args.k_features),
        ..DecodingConfig::default()
    };

    let results = decode_contrast(&args.data_dir, &subjects, &labels, &contrast, &cfg)?;

    for (subject, row) in subjects.iter().zip(results.rows()) {
        info!(
            subject = %subject,
            mean_accuracy = %format!("{:.3}", row.sum() / row.len() as f64),
            "held-out accuracy"
        );
    }
    let grand = grand_average(&results);
    info!(
        peak = %format!("{:.3}", grand.iter().cloned().fold(f64::MIN, f64::max)),
        "grand-average peak accuracy"
    );

    std::fs::create_dir_all(&args.out_dir)?;
    let out = args.out_dir.join(format!("across_subjects_{}.npy", contrast.label));
    write_npy_arr2(&out, &results)?;
    info!("written → {}", out.display());

    Ok(())
}

fn resolve_contrast(args: &Args) -> Result<Contrast> {
    if let Some(path) = &args.contrasts_file {
        let extra = megdecode::load_contrasts(path)?;
        if let Some(c) = extra.into_iter().find(|c| c.label == args.contrast) {
            return Ok(c);
        }
    }
    match Contrast::builtin_by_label(&args.contrast) {
        Some(c) => Ok(c),
        None => bail!("unknown contrast '{}'", args.contrast),
    }
}
