//! abf-sim: Adaptive Bloom filter simulator
//!
//! Runs store-then-probe experiments against an adaptive Bloom filter,
//! either on generated random keys or on key traces read from files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use abf_core::{
    DataError, DigestFamily, ExperimentApi, ExperimentConfig, ExperimentRunner,
    ExperimentSummary, FileSink, LineKeySource, ReportSink, TracingSink,
};

/// abf-sim: Adaptive Bloom filter simulator
#[derive(Parser, Debug)]
#[command(name = "abf-sim")]
#[command(about = "Measure false positive rates of an adaptive Bloom filter")]
struct Args {
    /// JSON experiment configuration; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of words in the filter
    #[arg(short = 'b', long, global = true)]
    words: Option<usize>,

    /// Bit width of each word
    #[arg(short = 'w', long, global = true)]
    width: Option<usize>,

    /// Hash functions per group
    #[arg(short = 'k', long, global = true)]
    hashes: Option<usize>,

    /// Number of hash function groups
    #[arg(short = 'g', long, global = true)]
    groups: Option<usize>,

    /// Stored keys per word
    #[arg(short = 'f', long, global = true)]
    factor: Option<usize>,

    /// Digest family (md5, sha512)
    #[arg(short = 'a', long = "hash", global = true)]
    hash: Option<DigestFamily>,

    /// Swap on every n-th false positive
    #[arg(short = 's', long, global = true)]
    swap: Option<usize>,

    /// Trials per run
    #[arg(long, global = true)]
    trials: Option<usize>,

    /// Base RNG seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Also write report lines to this file
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Random positives and disjoint random negatives
    Synthetic {
        /// Negatives per stored key; one run per value
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7,8,9,10")]
        multipliers: Vec<usize>,

        /// Probes drawn per negative
        #[arg(long)]
        probes_per_negative: Option<usize>,
    },
    /// Replay a probe trace against per-trial positive files
    Trace {
        /// Probe trace, one key per line, relative to --dir
        #[arg(short = 't', long)]
        traces: PathBuf,

        /// Directory holding the trace and positive files
        #[arg(short = 'd', long, default_value = ".")]
        dir: PathBuf,

        /// Positive file name; {factor}, {words} and {trial} are substituted
        #[arg(long, default_value = "shuf{factor}N_{words}B_{trial}.txt")]
        positives: String,
    },
}

/// Sends every line to several sinks
struct TeeSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl ReportSink for TeeSink {
    fn report(&mut self, line: &str) -> std::result::Result<(), DataError> {
        for sink in &mut self.sinks {
            sink.report(line)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), DataError> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ExperimentConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ExperimentConfig::default(),
    };

    let filter = &mut config.filter;
    if let Some(words) = args.words {
        filter.words = words;
    }
    if let Some(width) = args.width {
        filter.bits_per_word = width;
    }
    if let Some(k) = args.hashes {
        filter.hashes_per_group = k;
    }
    if let Some(groups) = args.groups {
        filter.groups = groups;
    }
    if let Some(family) = args.hash {
        filter.digest_family = family;
    }
    if let Some(factor) = args.factor {
        config.load_factor = factor;
    }
    if let Some(swap) = args.swap {
        config.swap_threshold = swap;
    }
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    Ok(config)
}

fn open_sink(output: Option<&Path>) -> Result<TeeSink> {
    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(TracingSink)];
    if let Some(path) = output {
        let file = FileSink::create(path)
            .with_context(|| format!("creating report file {}", path.display()))?;
        sinks.push(Box::new(file));
    }
    Ok(TeeSink { sinks })
}

fn run_synthetic(
    config: ExperimentConfig,
    multipliers: &[usize],
    probes_per_negative: Option<usize>,
    sink: &mut TeeSink,
) -> Result<()> {
    for &multiplier in multipliers {
        let mut run = config.clone().with_probe_multiplier(multiplier);
        if let Some(probes) = probes_per_negative {
            run.probes_per_negative = probes;
        }
        let runner = ExperimentRunner::new(run).context("invalid experiment configuration")?;

        sink.report(&format!(
            "Starting execution of A={}*{}*{}",
            config.load_factor, config.filter.words, multiplier
        ))?;
        let summary = runner.run_synthetic(sink)?;
        info!(
            multiplier,
            mean_fpr = summary.mean_fpr,
            pooled_fpr = summary.pooled_fpr,
            "Synthetic run complete"
        );
    }
    Ok(())
}

fn run_trace(
    config: ExperimentConfig,
    traces: &Path,
    dir: &Path,
    positives: &str,
    sink: &mut TeeSink,
) -> Result<()> {
    let runner =
        ExperimentRunner::new(config.clone()).context("invalid experiment configuration")?;
    let trace_path = dir.join(traces);
    sink.report(&format!("Traces file={}", trace_path.display()))?;
    sink.report(&runner.parameters_line())?;

    let mut results = Vec::with_capacity(config.trials);
    for trial in 1..=config.trials {
        let positives_path = dir.join(
            positives
                .replace("{factor}", &config.load_factor.to_string())
                .replace("{words}", &config.filter.words.to_string())
                .replace("{trial}", &trial.to_string()),
        );
        sink.report(&positives_path.display().to_string())?;

        let mut positive_source = LineKeySource::open(&positives_path)
            .with_context(|| format!("opening positives {}", positives_path.display()))?;
        let mut probe_source = LineKeySource::open(&trace_path)
            .with_context(|| format!("opening trace {}", trace_path.display()))?;

        results.push(runner.run_trace(trial, &mut positive_source, &mut probe_source, sink)?);
    }

    let summary = ExperimentSummary::from_trials(&results);
    for line in summary.report_lines() {
        sink.report(&line)?;
    }
    sink.flush()?;
    info!(summary = %serde_json::to_string(&summary)?, "Trace replay complete");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args)?;
    let mut sink = open_sink(args.output.as_deref())?;

    match &args.command {
        Command::Synthetic {
            multipliers,
            probes_per_negative,
        } => run_synthetic(config, multipliers, *probes_per_negative, &mut sink),
        Command::Trace {
            traces,
            dir,
            positives,
        } => run_trace(config, traces, dir, positives, &mut sink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "abf-sim", "-b", "256", "-w", "32", "-k", "2", "-g", "4", "-f", "4", "-a", "sha512",
            "-s", "2", "--trials", "3", "--seed", "7", "synthetic",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.filter.words, 256);
        assert_eq!(config.filter.bits_per_word, 32);
        assert_eq!(config.filter.hashes_per_group, 2);
        assert_eq!(config.filter.groups, 4);
        assert_eq!(config.filter.digest_family, DigestFamily::Sha512);
        assert_eq!(config.load_factor, 4);
        assert_eq!(config.swap_threshold, 2);
        assert_eq!(config.trials, 3);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_default_multipliers() {
        let args = Args::parse_from(["abf-sim", "synthetic"]);
        match args.command {
            Command::Synthetic { multipliers, .. } => {
                assert_eq!(multipliers, (1..=10).collect::<Vec<_>>())
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_hash_rejected() {
        assert!(Args::try_parse_from(["abf-sim", "-a", "crc32", "synthetic"]).is_err());
    }
}
