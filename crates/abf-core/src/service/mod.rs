//! Service Layer
//!
//! Application services that orchestrate the filter domain and reach
//! collaborators through ports.

pub mod experiment;

pub use experiment::{ExperimentConfig, ExperimentRunner, ExperimentSummary, TrialResult};
