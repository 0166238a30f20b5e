use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use megdecode::{compare_windows, io::read_npy_2d, DecodingConfig};

#[derive(Parser)]
#[command(
    name = "ttest",
    about = "Paired t-test between two decoding results over a latency window"
)]
struct Args {
    /// First accuracy matrix (across_subjects_<contrast>.npy)
    #[arg(long)]
    results_a: PathBuf,

    /// Second accuracy matrix, paired by subject row
    #[arg(long)]
    results_b: PathBuf,

    /// Window start in seconds after stimulus onset
    #[arg(long, default_value_t = 0.52)]
    start: f64,

    /// Window end in seconds after stimulus onset
    #[arg(long, default_value_t = 0.67)]
    stop: f64,

    /// Sampling rate of the epochs in Hz
    #[arg(long, default_value_t = 250.0)]
    sfreq: f64,

    /// Epoch start relative to stimulus onset in seconds
    #[arg(long, default_value_t = -0.2, allow_hyphen_values = true)]
    tmin: f64,

    /// Report file; appended to when it exists, printed to stdout if omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let acc_a = read_npy_2d(&args.results_a)?;
    let acc_b = read_npy_2d(&args.results_b)?;

    let label_a = stem(&args.results_a);
    let label_b = stem(&args.results_b);

    let cfg = DecodingConfig { sfreq: args.sfreq, tmin: args.tmin, ..DecodingConfig::default() };
    let cmp = compare_windows(&acc_a, &acc_b, &label_a, &label_b, (args.start, args.stop), &cfg)?;

    info!(
        t = %format!("{:.4}", cmp.test.t),
        p = %format!("{:.4}", cmp.test.p),
        df = cmp.test.df,
        "paired t-test"
    );

    match &args.output {
        Some(path) => {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            f.write_all(cmp.report().as_bytes())?;
            info!("written → {}", path.display());
        }
        None => print!("{}", cmp.report()),
    }

    Ok(())
}

fn stem(path: &PathBuf) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
