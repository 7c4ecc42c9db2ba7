//! Shared analysis machinery: cancellation, deadlines, and run metadata.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, AnalysisResult};

/// Caller-side handle for cooperative cancellation of a running analysis.
///
/// Cloning is cheap; all clones share one flag. The engine checks the flag
/// at coarse boundaries: between preprocessor passes, between cut-set
/// expansion iterations, and between Monte Carlo trial chunks.
#[derive(Debug, Clone, Default)]
pub struct AnalysisHandle {
    cancelled: Arc<AtomicBool>,
}

impl AnalysisHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; running targets fail with a `Cancelled` error
    /// at their next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Per-target execution context threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    target: String,
    handle: AnalysisHandle,
    deadline: Option<Instant>,
}

impl AnalysisContext {
    pub fn new(target: impl Into<String>, handle: AnalysisHandle, time_limit: Option<Duration>) -> Self {
        Self {
            target: target.into(),
            handle,
            deadline: time_limit.map(|limit| Instant::now() + limit),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Fails with `Cancelled` when the handle fired or the deadline passed.
    pub fn checkpoint(&self) -> AnalysisResult<()> {
        if self.handle.is_cancelled() {
            return Err(AnalysisError::Cancelled {
                target: self.target.clone(),
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(AnalysisError::Cancelled {
                    target: self.target.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn logic_error(&self, message: impl Into<String>) -> AnalysisError {
        AnalysisError::Logic {
            target: self.target.clone(),
            message: message.into(),
        }
    }

    pub fn resource_error(&self, message: impl Into<String>) -> AnalysisError {
        AnalysisError::Resource {
            target: self.target.clone(),
            message: message.into(),
        }
    }
}

/// Metadata recorded for every finished analysis target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInfo {
    /// When the target's analysis started.
    pub started_at: DateTime<Utc>,
    /// Total wall-clock time spent on the target.
    pub duration: Duration,
    /// Non-fatal degradations, e.g. a metric reported as undefined.
    pub warnings: Vec<String>,
}

impl AnalysisInfo {
    pub fn start() -> AnalysisTimer {
        AnalysisTimer {
            started_at: Utc::now(),
            clock: Instant::now(),
            warnings: Vec::new(),
        }
    }
}

/// In-flight collector for [`AnalysisInfo`].
#[derive(Debug)]
pub struct AnalysisTimer {
    started_at: DateTime<Utc>,
    clock: Instant,
    warnings: Vec<String>,
}

impl AnalysisTimer {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn finish(self) -> AnalysisInfo {
        AnalysisInfo {
            started_at: self.started_at,
            duration: self.clock.elapsed(),
            warnings: self.warnings,
        }
    }
}
