use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use rpeak_lib::{
    detectors::run_detection,
    evaluate::{evaluate_corpus, score_entries},
    io::{record, report, text},
    signal::{Signal, DEFAULT_SAMPLING_RATE_HZ},
    RpeakConfig,
};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "rpeak",
    version,
    about = "ECG R-peak detection and CPSC-style scoring"
)]
struct Cli {
    /// TOML configuration; defaults apply to anything it leaves out
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect R-peaks from samples read from stdin, --input text or a --record JSON file
    Detect {
        #[arg(long, default_value_t = DEFAULT_SAMPLING_RATE_HZ)]
        fs: f64,
        #[arg(long, conflicts_with = "record")]
        input: Option<PathBuf>,
        /// Record file with an `ecg` array (and optional `fs`)
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Score stored detections against reference annotations
    Score {
        /// Directory of `R_<id>.json` reference files
        #[arg(long)]
        references: PathBuf,
        /// Directory of `data_<id>.json` detection files
        #[arg(long)]
        detections: PathBuf,
        /// Record length used when a reference does not carry one
        #[arg(long, default_value_t = 5000)]
        sample_count: usize,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Run the detector over a corpus and score it
    Evaluate {
        /// Directory of `data_<id>.json` signal files
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        references: PathBuf,
        #[arg(long)]
        report: Option<PathBuf>,
        /// Worker threads; 0 lets rayon decide
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();
    let cfg = match cli.config.as_deref() {
        Some(path) => RpeakConfig::load(path)?,
        None => RpeakConfig::default(),
    };
    match cli.command {
        Commands::Detect { fs, input, record } => {
            cmd_detect(&cfg, fs, input.as_deref(), record.as_deref())?
        }
        Commands::Score {
            references,
            detections,
            sample_count,
            report,
        } => cmd_score(&cfg, &references, &detections, sample_count, report.as_deref())?,
        Commands::Evaluate {
            data,
            references,
            report,
            threads,
        } => cmd_evaluate(&cfg, &data, &references, report.as_deref(), threads)?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text::read_samples(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text::parse_samples(&buf)
        }
    }
}

fn cmd_detect(
    cfg: &RpeakConfig,
    fs: f64,
    input: Option<&Path>,
    record_path: Option<&Path>,
) -> Result<()> {
    let signal = match record_path {
        Some(path) => record::load_signal(path, fs)?,
        None => Signal::new(fs, read_samples(input)?)?,
    };
    let detection = run_detection(&signal, &cfg.detector)?;
    info!(
        "detected {} peaks in {:.1} s",
        detection.r_peaks.len(),
        signal.duration()
    );
    println!("{}", serde_json::to_string(&detection)?);
    Ok(())
}

fn cmd_score(
    cfg: &RpeakConfig,
    references: &Path,
    detections: &Path,
    sample_count: usize,
    report_path: Option<&Path>,
) -> Result<()> {
    let entries = record::load_scored_records(detections, references, sample_count, cfg)?;
    if entries.is_empty() {
        bail!("no reference files found in {}", references.display());
    }
    let summary = score_entries(&entries, &cfg.scoring)?;
    if let Some(path) = report_path {
        report::write_report_file(&summary, path)?;
    }
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_evaluate(
    cfg: &RpeakConfig,
    data: &Path,
    references: &Path,
    report_path: Option<&Path>,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }
    let entries = record::load_corpus(data, references, cfg)?;
    if entries.is_empty() {
        bail!("no reference files found in {}", references.display());
    }
    let summary = evaluate_corpus(&entries, cfg)?;
    if let Some(path) = report_path {
        report::write_report_file(&summary, path)?;
    }
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
