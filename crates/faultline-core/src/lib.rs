//! # Faultline Core
//!
//! The analysis engine of the Faultline probabilistic risk analysis toolkit.
//! Consumes a frozen [`faultline_model::Model`] and produces, per analysis
//! target (a fault-tree top gate or an event-tree sequence):
//!
//! - minimal cut sets via MOCUS-style top-down expansion,
//! - top-event probability (rare-event, min-cut upper bound, or truncated
//!   inclusion-exclusion),
//! - per-event importance measures,
//! - Monte Carlo uncertainty distributions.
//!
//! The pipeline is: CCF expansion -> indexed Boolean graph -> preprocessing
//! (constant propagation, normalization, coalescing, Boolean optimization,
//! module detection) -> cut-set generation -> quantitative engines.
//! [`risk::RiskAnalysis`] drives the whole of it.

use thiserror::Error;

use faultline_model::ModelError;

pub mod analysis;
pub mod event_tree;
pub mod generator;
pub mod graph;
pub mod importance;
pub mod mocus;
pub mod preprocessor;
pub mod probability;
pub mod random;
pub mod risk;
pub mod settings;
pub mod uncertainty;

pub use analysis::{AnalysisHandle, AnalysisInfo};
pub use graph::{IndexedGraph, Literal};
pub use mocus::{CutSet, CutSetCollection};
pub use risk::{EventTreeResult, RiskAnalysis, RiskReport, TargetOutcome, TargetResult};
pub use settings::{Approximation, Settings};

/// Machine-readable classification of analysis failures, stable across
/// error message changes. Maps to the process exit codes of a driving CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Validation,
    Settings,
    Logic,
    Numeric,
    Resource,
    Cancelled,
}

/// Errors raised by the analysis engine.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ModelError),
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("internal logic error in `{target}`: {message}")]
    Logic { target: String, message: String },
    #[error("non-finite value while computing {metric} for `{target}`")]
    Numeric { target: String, metric: String },
    #[error("resource limit exceeded for `{target}`: {message}")]
    Resource { target: String, message: String },
    #[error("analysis of `{target}` cancelled")]
    Cancelled { target: String },
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Validation(_) => ErrorKind::Validation,
            AnalysisError::Settings(_) => ErrorKind::Settings,
            AnalysisError::Logic { .. } => ErrorKind::Logic,
            AnalysisError::Numeric { .. } => ErrorKind::Numeric,
            AnalysisError::Resource { .. } => ErrorKind::Resource,
            AnalysisError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Exit code for a CLI front-end: 1 input error, 2 analysis error,
    /// 3 resource exhaustion, 4 cancelled.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Settings => 1,
            ErrorKind::Logic | ErrorKind::Numeric => 2,
            ErrorKind::Resource => 3,
            ErrorKind::Cancelled => 4,
        }
    }
}

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
