//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for experiment drivers
//! - Driven Ports (outbound) - Oracle, key sources and report sinks

pub mod inbound;
pub mod outbound;

pub use inbound::ExperimentApi;
pub use outbound::{KeySource, MembershipOracle, ReportSink};
