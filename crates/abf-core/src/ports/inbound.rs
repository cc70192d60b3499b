//! Inbound Ports (Driving Ports)
//!
//! The API drivers (the CLI, tests) use to run filter experiments.

use crate::error::ExperimentError;
use crate::ports::outbound::{KeySource, ReportSink};
use crate::service::{ExperimentSummary, TrialResult};

/// Primary experiment API (Driving Port)
pub trait ExperimentApi {
    /// Run every configured trial on freshly generated random keys.
    ///
    /// Each trial stores `load_factor * words` unique positives, then
    /// probes uniformly among disjoint negatives, swapping on every
    /// `swap_every`-th false positive.
    fn run_synthetic(&self, sink: &mut dyn ReportSink)
        -> Result<ExperimentSummary, ExperimentError>;

    /// Run one trial over externally supplied keys.
    ///
    /// Up to `load_factor * words` keys are stored from `positives`, then
    /// every key of `probes` is tested and classified.
    fn run_trace(
        &self,
        trial: usize,
        positives: &mut dyn KeySource,
        probes: &mut dyn KeySource,
        sink: &mut dyn ReportSink,
    ) -> Result<TrialResult, ExperimentError>;
}
