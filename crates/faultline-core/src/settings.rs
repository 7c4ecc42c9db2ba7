//! Analysis settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, AnalysisResult};

/// Quantification method for the top-event probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Approximation {
    /// Truncated inclusion-exclusion over the cut sets.
    #[default]
    None,
    /// Sum of cut-set probabilities.
    RareEvent,
    /// Min-cut upper bound: `1 - prod(1 - P(cut))`.
    Mcub,
}

/// Options controlling one risk analysis run.
///
/// Built with `Settings::default()` plus `with_*` setters; validated once
/// before analysis starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum cut-set order.
    pub limit_order: u32,
    /// Probability floor for candidate pruning. Requires probability data
    /// when positive.
    pub cut_off: f64,
    /// Truncation depth of the inclusion-exclusion expansion.
    pub num_sums: u32,
    pub probability_analysis: bool,
    pub importance_analysis: bool,
    pub uncertainty_analysis: bool,
    pub ccf_analysis: bool,
    /// Monte Carlo trial count for uncertainty analysis.
    pub num_trials: u32,
    /// Master RNG seed; `None` derives one from the wall clock.
    pub seed: Option<u64>,
    pub approximation: Approximation,
    /// Mission time in hours, for failure-rate conversions.
    pub mission_time: f64,
    /// Worker threads for independent targets and Monte Carlo trials;
    /// `None` uses the machine's logical CPU count.
    pub num_workers: Option<usize>,
    /// Hard bound on the cut-set working set per target.
    pub candidate_limit: usize,
    /// Optional wall-clock limit per analysis target.
    pub time_limit: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_order: 20,
            cut_off: 0.0,
            num_sums: 7,
            probability_analysis: false,
            importance_analysis: false,
            uncertainty_analysis: false,
            ccf_analysis: false,
            num_trials: 1000,
            seed: None,
            approximation: Approximation::None,
            mission_time: 8760.0,
            num_workers: None,
            candidate_limit: 10_000_000,
            time_limit: None,
        }
    }
}

impl Settings {
    pub fn with_limit_order(mut self, limit_order: u32) -> Self {
        self.limit_order = limit_order;
        self
    }

    pub fn with_cut_off(mut self, cut_off: f64) -> Self {
        self.cut_off = cut_off;
        self
    }

    pub fn with_num_sums(mut self, num_sums: u32) -> Self {
        self.num_sums = num_sums;
        self
    }

    pub fn with_probability_analysis(mut self, on: bool) -> Self {
        self.probability_analysis = on;
        self
    }

    pub fn with_importance_analysis(mut self, on: bool) -> Self {
        self.importance_analysis = on;
        self
    }

    pub fn with_uncertainty_analysis(mut self, on: bool) -> Self {
        self.uncertainty_analysis = on;
        self
    }

    pub fn with_ccf_analysis(mut self, on: bool) -> Self {
        self.ccf_analysis = on;
        self
    }

    pub fn with_num_trials(mut self, num_trials: u32) -> Self {
        self.num_trials = num_trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn with_mission_time(mut self, mission_time: f64) -> Self {
        self.mission_time = mission_time;
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    /// Checks option consistency before any analysis begins.
    pub fn validate(&self) -> AnalysisResult<()> {
        let fail = |message: &str| Err(AnalysisError::Settings(message.into()));
        if self.limit_order < 1 {
            return fail("limit_order must be at least 1");
        }
        if !(0.0..1.0).contains(&self.cut_off) {
            return fail("cut_off must be in [0, 1)");
        }
        if self.cut_off > 0.0 && !self.probability_analysis {
            return fail("a positive cut_off requires probability analysis");
        }
        if self.importance_analysis && !self.probability_analysis {
            return fail("importance analysis requires probability analysis");
        }
        if self.uncertainty_analysis && !self.probability_analysis {
            return fail("uncertainty analysis requires probability analysis");
        }
        if self.num_sums < 1 {
            return fail("num_sums must be at least 1");
        }
        if self.num_trials < 1 {
            return fail("num_trials must be at least 1");
        }
        if !self.mission_time.is_finite() || self.mission_time < 0.0 {
            return fail("mission_time must be finite and non-negative");
        }
        if self.num_workers == Some(0) {
            return fail("num_workers must be at least 1");
        }
        if self.candidate_limit == 0 {
            return fail("candidate_limit must be at least 1");
        }
        Ok(())
    }

    /// Effective worker-thread count.
    pub fn workers(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_dependent_options() {
        let s = Settings::default().with_importance_analysis(true);
        assert!(s.validate().is_err());
        assert!(s.with_probability_analysis(true).validate().is_ok());

        let s = Settings::default().with_uncertainty_analysis(true);
        assert!(s.validate().is_err());

        let s = Settings::default().with_cut_off(1e-8);
        assert!(s.validate().is_err());
        assert!(s.with_probability_analysis(true).validate().is_ok());
    }

    #[test]
    fn test_range_checks() {
        assert!(Settings::default().with_cut_off(1.0).validate().is_err());
        assert!(Settings::default().with_limit_order(0).validate().is_err());
        assert!(Settings::default().with_num_trials(0).validate().is_err());
        assert!(Settings::default()
            .with_mission_time(f64::NAN)
            .validate()
            .is_err());
    }
}
