//! `qcdiff-validate` - independent-programming validation engine.
//!
//! Pure engine crate: receives two materialized result sets, returns an
//! immutable [`ComparisonRun`] of findings plus a derived verdict.
//! No CLI or IO dependencies.

pub mod classify;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod portfolio;

pub use config::{
    CompareOptions, Criticality, DateConfig, FieldKind, FieldSpec, FieldTolerance, SeverityPolicy, Tolerance,
    ValidationSpec,
};
pub use engine::compare;
pub use error::ConfigurationError;
pub use model::{
    ComparisonRun, Finding, FindingKind, Key, KeyPart, OverallStatus, Record, ResultSet,
    RunSummary, Severity, Value,
};
pub use portfolio::{summarize, summarize_labeled, PortfolioFinding, PortfolioSummary, RunOverview};
