//! Experiment Runner
//!
//! Drives an [`AdaptiveBloomFilter`] through store-then-probe trials and
//! classifies every hit against an exact oracle. Two data sources are
//! supported: freshly generated random keys (synthetic validation) and
//! externally supplied key streams (trace replay).

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapters::{HashSetOracle, RandomKeyGenerator};
use crate::domain::{AdaptiveBloomFilter, AdaptiveFilterConfig};
use crate::error::{DataError, ExperimentError};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{ExperimentApi, KeySource, MembershipOracle, ReportSink};

/// Parameters of an experiment run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Filter under test
    pub filter: AdaptiveFilterConfig,
    /// Stored keys per word (`stored = load_factor * words`)
    pub load_factor: usize,
    /// Independent trials, each with a fresh filter
    pub trials: usize,
    /// Swap on every `swap_threshold`-th false positive
    pub swap_threshold: usize,
    /// Distinct negatives per stored key (synthetic mode)
    pub probe_multiplier: usize,
    /// Probes drawn per distinct negative (synthetic mode)
    pub probes_per_negative: usize,
    pub min_key_len: usize,
    pub max_key_len: usize,
    /// Base seed; trial `t` uses `seed + t`. Entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            filter: AdaptiveFilterConfig::default(),
            load_factor: 8,
            trials: 10,
            swap_threshold: 1,
            probe_multiplier: 1,
            probes_per_negative: 100,
            min_key_len: 3,
            max_key_len: 50,
            seed: None,
        }
    }
}

impl ExperimentConfig {
    pub fn new(filter: AdaptiveFilterConfig) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_load_factor(mut self, factor: usize) -> Self {
        self.load_factor = factor;
        self
    }

    pub fn with_swap_threshold(mut self, threshold: usize) -> Self {
        self.swap_threshold = threshold;
        self
    }

    pub fn with_probe_multiplier(mut self, multiplier: usize) -> Self {
        self.probe_multiplier = multiplier;
        self
    }

    pub fn with_probes_per_negative(mut self, probes: usize) -> Self {
        self.probes_per_negative = probes;
        self
    }

    pub fn with_key_len(mut self, min: usize, max: usize) -> Self {
        self.min_key_len = min;
        self.max_key_len = max;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse and validate a JSON configuration; absent fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ExperimentError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DataError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ExperimentError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DataError::ParseError(e.to_string()).into())
    }

    /// Keys stored per trial
    pub fn stored_keys(&self) -> usize {
        self.load_factor.saturating_mul(self.filter.words)
    }

    /// Probes issued per synthetic trial
    pub fn total_probes(&self) -> usize {
        self.stored_keys()
            .saturating_mul(self.probe_multiplier)
            .saturating_mul(self.probes_per_negative)
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        self.filter.validate()?;

        for (name, value) in [
            ("load_factor", self.load_factor),
            ("trials", self.trials),
            ("swap_threshold", self.swap_threshold),
            ("probe_multiplier", self.probe_multiplier),
            ("probes_per_negative", self.probes_per_negative),
        ] {
            if value == 0 {
                return Err(ExperimentError::InvalidParameters(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        if self.min_key_len == 0 || self.min_key_len > self.max_key_len {
            return Err(ExperimentError::InvalidParameters(format!(
                "key length range {}..={} is invalid",
                self.min_key_len, self.max_key_len
            )));
        }

        Ok(())
    }
}

/// Classified outcome of one trial
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    /// Keys actually stored
    pub stored: usize,
    pub fp: u64,
    pub tp: u64,
    pub tn: u64,
    /// Swaps triggered by false positives
    pub swaps: u64,
}

impl TrialResult {
    fn new(trial: usize, stored: usize) -> Self {
        Self {
            trial,
            stored,
            ..Self::default()
        }
    }

    /// `fp / (fp + tn)`, zero when no negative was probed
    pub fn fpr(&self) -> f64 {
        let negatives = self.fp + self.tn;
        if negatives == 0 {
            0.0
        } else {
            self.fp as f64 / negatives as f64
        }
    }

    pub fn report_line(&self) -> String {
        format!(
            "Iteration {}. FP={}, TP={}, TN={}, FPR={:.6}.",
            self.trial,
            self.fp,
            self.tp,
            self.tn,
            self.fpr()
        )
    }
}

/// Aggregate over all trials of a run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub trials: usize,
    pub total_fp: u64,
    pub total_tp: u64,
    pub total_tn: u64,
    /// Average of per-trial FPRs
    pub mean_fpr: f64,
    /// `total_fp / (total_fp + total_tn)`
    pub pooled_fpr: f64,
}

impl ExperimentSummary {
    pub fn from_trials(results: &[TrialResult]) -> Self {
        let trials = results.len();
        let total_fp = results.iter().map(|r| r.fp).sum::<u64>();
        let total_tp = results.iter().map(|r| r.tp).sum::<u64>();
        let total_tn = results.iter().map(|r| r.tn).sum::<u64>();

        let mean_fpr = if trials == 0 {
            0.0
        } else {
            results.iter().map(TrialResult::fpr).sum::<f64>() / trials as f64
        };
        let negatives = total_fp + total_tn;
        let pooled_fpr = if negatives == 0 {
            0.0
        } else {
            total_fp as f64 / negatives as f64
        };

        Self {
            trials,
            total_fp,
            total_tp,
            total_tn,
            mean_fpr,
            pooled_fpr,
        }
    }

    pub fn report_lines(&self) -> Vec<String> {
        vec![
            format!(
                "Completed {}. TFP={}, TTP={}, TTN={}.",
                self.trials, self.total_fp, self.total_tp, self.total_tn
            ),
            format!("TFP/(TFP+TTN) = {:.6}", self.pooled_fpr),
            format!("Mean FPR = {:.6}", self.mean_fpr),
        ]
    }
}

/// Experiment runner implementing [`ExperimentApi`]
pub struct ExperimentRunner {
    config: ExperimentConfig,
    metrics: Arc<dyn MetricsRecorder>,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Arc::new(NoOpMetrics),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Header line describing the run parameters
    pub fn parameters_line(&self) -> String {
        let f = &self.config.filter;
        format!(
            "Initializing parameters blocks={}, width={}, k={}, groups={}, factor={}, hash_f={}, swap={}",
            f.words,
            f.bits_per_word,
            f.hashes_per_group,
            f.groups,
            self.config.load_factor,
            f.digest_family,
            self.config.swap_threshold
        )
    }

    fn trial_rng(&self, trial: usize) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(trial as u64)),
            None => StdRng::from_entropy(),
        }
    }

    fn store(&self, filter: &mut AdaptiveBloomFilter, oracle: &mut HashSetOracle, key: &[u8]) {
        filter.record(key);
        oracle.add(key);
        self.metrics.record_insert();
        if filter.is_adaptive() {
            self.metrics.record_shadow_insert();
        }
    }

    /// Test one key, classify the answer and swap on every
    /// `swap_threshold`-th false positive.
    fn probe(
        &self,
        filter: &mut AdaptiveBloomFilter,
        oracle: &dyn MembershipOracle,
        key: &[u8],
        result: &mut TrialResult,
    ) {
        let found = filter.contains(key);
        self.metrics.record_lookup(found);

        if !found {
            result.tn += 1;
            return;
        }
        if oracle.test(key) {
            result.tp += 1;
            return;
        }

        result.fp += 1;
        self.metrics.record_false_positive();
        if result.fp % self.config.swap_threshold as u64 == 0 {
            let outcome = filter.swap(key);
            self.metrics.record_swap(&outcome);
            result.swaps += 1;
        }
    }

    /// One synthetic trial: random positives, disjoint random negatives,
    /// uniform probing among the negatives.
    pub fn run_synthetic_trial(&self, trial: usize) -> Result<TrialResult, ExperimentError> {
        let mut rng = self.trial_rng(trial);
        let generator =
            RandomKeyGenerator::new(self.config.min_key_len, self.config.max_key_len)?;
        let mut filter = AdaptiveBloomFilter::new(self.config.filter.clone())?;

        let stored = self.config.stored_keys();
        let mut oracle = HashSetOracle::with_capacity(stored);
        for key in generator.unique_keys(&mut rng, stored, None)? {
            self.store(&mut filter, &mut oracle, &key);
        }

        let negative_count = stored.saturating_mul(self.config.probe_multiplier);
        let negatives = generator.unique_keys(
            &mut rng,
            negative_count,
            Some(&oracle as &dyn MembershipOracle),
        )?;
        let negative_set: HashSetOracle = negatives.iter().collect();
        if !oracle.is_disjoint(&negative_set) {
            return Err(DataError::OverlappingSets.into());
        }
        debug!(
            trial,
            stored,
            negatives = negatives.len(),
            "Synthetic key sets generated"
        );

        let mut result = TrialResult::new(trial, oracle.len());
        if negatives.is_empty() {
            return Ok(result);
        }
        for _ in 0..self.config.total_probes() {
            let key = &negatives[rng.gen_range(0..negatives.len())];
            self.probe(&mut filter, &oracle, key, &mut result);
        }

        info!(
            trial,
            fp = result.fp,
            tn = result.tn,
            swaps = result.swaps,
            fpr = result.fpr(),
            "Synthetic trial complete"
        );
        Ok(result)
    }
}

impl ExperimentApi for ExperimentRunner {
    fn run_synthetic(
        &self,
        sink: &mut dyn ReportSink,
    ) -> Result<ExperimentSummary, ExperimentError> {
        sink.report(&self.parameters_line())?;

        let mut results = Vec::with_capacity(self.config.trials);
        for trial in 0..self.config.trials {
            let result = self.run_synthetic_trial(trial)?;
            sink.report(&result.report_line())?;
            results.push(result);
        }

        let summary = ExperimentSummary::from_trials(&results);
        for line in summary.report_lines() {
            sink.report(&line)?;
        }
        sink.flush()?;
        Ok(summary)
    }

    fn run_trace(
        &self,
        trial: usize,
        positives: &mut dyn KeySource,
        probes: &mut dyn KeySource,
        sink: &mut dyn ReportSink,
    ) -> Result<TrialResult, ExperimentError> {
        let mut filter = AdaptiveBloomFilter::new(self.config.filter.clone())?;
        let wanted = self.config.stored_keys();

        let mut oracle = HashSetOracle::with_capacity(wanted);
        let keys = positives.take_keys(wanted)?;
        if keys.len() < wanted {
            warn!(
                trial,
                stored = keys.len(),
                wanted,
                "Positive source ended before the filter was loaded"
            );
        }
        for key in &keys {
            self.store(&mut filter, &mut oracle, key);
        }
        sink.report(&format!("length stored: {}", oracle.len()))?;

        let mut result = TrialResult::new(trial, keys.len());
        while let Some(key) = probes.next_key()? {
            self.probe(&mut filter, &oracle, &key, &mut result);
        }

        info!(
            trial,
            fp = result.fp,
            tp = result.tp,
            tn = result.tn,
            swaps = result.swaps,
            fpr = result.fpr(),
            "Trace trial complete"
        );
        sink.report(&result.report_line())?;
        sink.flush()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LineKeySource, MemorySink};
    use crate::domain::AdaptiveFilterConfigBuilder;
    use crate::metrics::Metrics;
    use std::io::Cursor;

    fn small_config() -> ExperimentConfig {
        let filter = AdaptiveFilterConfigBuilder::new()
            .words(64)
            .bits_per_word(64)
            .hashes_per_group(3)
            .groups(2)
            .build()
            .unwrap();
        ExperimentConfig::new(filter)
            .with_trials(2)
            .with_load_factor(4)
            .with_probes_per_negative(5)
            .with_seed(42)
    }

    fn source(lines: &[&str]) -> LineKeySource<Cursor<Vec<u8>>> {
        LineKeySource::new(Cursor::new(lines.join("\n").into_bytes()))
    }

    #[test]
    fn test_default_config_matches_drivers() {
        let config = ExperimentConfig::default();
        assert_eq!(config.load_factor, 8);
        assert_eq!(config.trials, 10);
        assert_eq!(config.swap_threshold, 1);
        assert_eq!(config.probes_per_negative, 100);
        assert_eq!((config.min_key_len, config.max_key_len), (3, 50));
        assert_eq!(config.stored_keys(), 8 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = small_config().with_swap_threshold(0);
        assert!(matches!(
            config.validate(),
            Err(ExperimentError::InvalidParameters(_))
        ));
        assert!(ExperimentRunner::new(config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_filter() {
        let mut config = small_config();
        config.filter.words = 100;
        assert!(matches!(config.validate(), Err(ExperimentError::Filter(_))));
    }

    #[test]
    fn test_config_json_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"trials": 3, "seed": 9}"#).unwrap();
        assert_eq!(config.trials, 3);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.load_factor, 8);
        assert_eq!(config.filter, AdaptiveFilterConfig::default());
    }

    #[test]
    fn test_from_json_validates() {
        let config = ExperimentConfig::from_json(r#"{"load_factor": 2, "seed": 5}"#).unwrap();
        assert_eq!(config.load_factor, 2);

        let round_trip = ExperimentConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, config);

        assert!(matches!(
            ExperimentConfig::from_json(r#"{"trials": 0}"#),
            Err(ExperimentError::InvalidParameters(_))
        ));
        assert!(matches!(
            ExperimentConfig::from_json("not json"),
            Err(ExperimentError::Data(DataError::ParseError(_)))
        ));
    }

    #[test]
    fn test_trial_result_fpr() {
        let result = TrialResult {
            fp: 3,
            tn: 97,
            ..TrialResult::default()
        };
        assert!((result.fpr() - 0.03).abs() < 1e-12);
        assert_eq!(TrialResult::default().fpr(), 0.0);
    }

    #[test]
    fn test_summary_mean_and_pooled() {
        let results = [
            TrialResult {
                fp: 1,
                tn: 9,
                ..TrialResult::default()
            },
            TrialResult {
                fp: 0,
                tn: 90,
                ..TrialResult::default()
            },
        ];
        let summary = ExperimentSummary::from_trials(&results);

        assert_eq!(summary.trials, 2);
        assert_eq!(summary.total_fp, 1);
        assert_eq!(summary.total_tn, 99);
        assert!((summary.mean_fpr - 0.05).abs() < 1e-12);
        assert!((summary.pooled_fpr - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_synthetic_is_reproducible_with_seed() {
        let runner = ExperimentRunner::new(small_config()).unwrap();
        let first = runner.run_synthetic_trial(0).unwrap();
        let second = runner.run_synthetic_trial(0).unwrap();

        assert_eq!(first, second, "Same seed and trial must replay exactly");
        assert_eq!(first.stored, 256);
        assert_eq!(first.tp, 0, "Negatives are never stored");
        assert_eq!(first.fp + first.tn, 256 * 5);
    }

    #[test]
    fn test_synthetic_reports_every_trial() {
        let runner = ExperimentRunner::new(small_config()).unwrap();
        let mut sink = MemorySink::new();
        let summary = runner.run_synthetic(&mut sink).unwrap();

        assert_eq!(summary.trials, 2);
        let lines = sink.lines();
        assert!(lines[0].starts_with("Initializing parameters blocks=64"));
        assert!(lines[1].starts_with("Iteration 0."));
        assert!(lines[2].starts_with("Iteration 1."));
        assert!(lines.iter().any(|l| l.starts_with("Mean FPR")));
    }

    #[test]
    fn test_swaps_follow_threshold() {
        let runner = ExperimentRunner::new(small_config().with_swap_threshold(3)).unwrap();
        let result = runner.run_synthetic_trial(1).unwrap();
        assert_eq!(result.swaps, result.fp / 3);
    }

    #[test]
    fn test_metrics_count_lookups() {
        let metrics = Arc::new(Metrics::new());
        let runner = ExperimentRunner::new(small_config())
            .unwrap()
            .with_metrics(metrics.clone());
        let result = runner.run_synthetic_trial(0).unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.elements_inserted, 256);
        assert_eq!(snapshot.lookups_performed, result.fp + result.tn);
        assert_eq!(snapshot.false_positives, result.fp);
    }

    #[test]
    fn test_trace_classifies_hits() {
        let runner = ExperimentRunner::new(small_config()).unwrap();
        let mut positives = source(&["alpha", "beta", "gamma"]);
        let mut probes = source(&["alpha", "beta", "gamma", "alpha"]);
        let mut sink = MemorySink::new();

        let result = runner
            .run_trace(1, &mut positives, &mut probes, &mut sink)
            .unwrap();

        assert_eq!(result.stored, 3);
        assert_eq!(result.tp, 4, "Stored keys are always found");
        assert_eq!(result.fp, 0);
        assert_eq!(result.tn, 0);
        assert_eq!(sink.lines()[0], "length stored: 3");
        assert!(sink.lines()[1].starts_with("Iteration 1. FP=0, TP=4, TN=0"));
    }

    #[test]
    fn test_trace_stops_at_stored_limit() {
        let mut config = small_config();
        config.filter.words = 1;
        config.load_factor = 2;
        let runner = ExperimentRunner::new(config).unwrap();

        let mut positives = source(&["a", "b", "c", "d"]);
        let mut probes = source(&[]);
        let result = runner
            .run_trace(0, &mut positives, &mut probes, &mut MemorySink::new())
            .unwrap();

        assert_eq!(result.stored, 2);
        assert_eq!(result.fp + result.tp + result.tn, 0);
    }
}
