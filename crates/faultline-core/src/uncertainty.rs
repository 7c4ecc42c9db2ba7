//! Monte Carlo uncertainty analysis.
//!
//! Each trial resamples every parameter expression, recomputes the basic
//! event probabilities, and re-evaluates the probability engine over the
//! frozen cut sets. Trials run in parallel; every trial derives its own
//! generator from the master seed and the trial index, so the summary is
//! bit-stable for a fixed seed no matter how the scheduler interleaves
//! the work.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use faultline_model::{EvalContext, SampleContext};

use crate::analysis::AnalysisContext;
use crate::graph::IndexedGraph;
use crate::mocus::CutSetCollection;
use crate::probability::ProbabilityCalculator;
use crate::random::trial_rng;
use crate::settings::{Approximation, Settings};
use crate::AnalysisResult;

/// Number of bins in the reported empirical histogram.
const HISTOGRAM_BINS: usize = 20;

/// One bin of the empirical distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Summary statistics of the sampled top-event probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyResult {
    pub mean: f64,
    pub std_dev: f64,
    /// 5th percentile.
    pub p05: f64,
    pub median: f64,
    /// 95th percentile.
    pub p95: f64,
    pub histogram: Vec<HistogramBin>,
    pub num_trials: u32,
    /// The master seed actually used, for reproduction.
    pub seed: u64,
}

/// Runs the Monte Carlo loop over the frozen cut sets.
pub fn analyze_uncertainty(
    graph: &IndexedGraph,
    sets: &CutSetCollection,
    settings: &Settings,
    master_seed: u64,
    ctx: &AnalysisContext,
) -> AnalysisResult<UncertaintyResult> {
    let variables = sets.variables();
    let eval = EvalContext {
        mission_time: settings.mission_time,
    };

    let samples: Vec<f64> = (0..settings.num_trials as u64)
        .into_par_iter()
        .map(|trial| -> AnalysisResult<f64> {
            ctx.checkpoint()?;
            Ok(run_trial(
                graph,
                sets,
                &variables,
                eval,
                master_seed,
                trial,
                settings.approximation,
                settings.num_sums,
                ctx,
            ))
        })
        .collect::<AnalysisResult<Vec<f64>>>()?;

    debug!(trials = samples.len(), seed = master_seed, "uncertainty sampling done");
    Ok(summarize(&samples, settings.num_trials, master_seed))
}

#[allow(clippy::too_many_arguments)]
fn run_trial(
    graph: &IndexedGraph,
    sets: &CutSetCollection,
    variables: &[usize],
    eval: EvalContext,
    master_seed: u64,
    trial: u64,
    approximation: Approximation,
    num_sums: u32,
    ctx: &AnalysisContext,
) -> f64 {
    let mut rng = trial_rng(master_seed, trial);
    let mut sample_ctx = SampleContext::new(eval);
    let mut probabilities = vec![0.0; graph.num_variables() + 1];
    for &variable in variables {
        let expression = graph
            .event(variable)
            .expression()
            .expect("probability data checked before uncertainty analysis");
        probabilities[variable] = expression.sample(&mut sample_ctx, &mut rng).clamp(0.0, 1.0);
    }
    ProbabilityCalculator::new(&probabilities)
        .evaluate(sets, approximation, num_sums, ctx)
        .unwrap_or(f64::NAN)
}

fn summarize(samples: &[f64], num_trials: u32, seed: u64) -> UncertaintyResult {
    // NaN trials (degenerate numerics) are excluded from the summary.
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite samples"));
    let n = sorted.len();
    if n == 0 {
        return UncertaintyResult {
            mean: f64::NAN,
            std_dev: f64::NAN,
            p05: f64::NAN,
            median: f64::NAN,
            p95: f64::NAN,
            histogram: Vec::new(),
            num_trials,
            seed,
        };
    }

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let std_dev = if n > 1 {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    UncertaintyResult {
        mean,
        std_dev,
        p05: quantile(&sorted, 0.05),
        median: quantile(&sorted, 0.50),
        p95: quantile(&sorted, 0.95),
        histogram: histogram(&sorted),
        num_trials,
        seed,
    }
}

/// Nearest-rank quantile over an ascending sample.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let rank = (q * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

fn histogram(sorted: &[f64]) -> Vec<HistogramBin> {
    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    if min == max {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: sorted.len(),
        }];
    }
    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut bins: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
        .map(|i| HistogramBin {
            lower: min + i as f64 * width,
            upper: min + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for &value in sorted {
        let index = (((value - min) / width) as usize).min(HISTOGRAM_BINS - 1);
        bins[index].count += 1;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisHandle;
    use crate::mocus::MocusGenerator;
    use crate::preprocessor::Preprocessor;
    use faultline_model::{
        Arg, BasicEvent, CcfExpansion, Connective as MC, Expression, Formula,
    };
    use std::sync::Arc;

    fn ctx() -> AnalysisContext {
        AnalysisContext::new("test", AnalysisHandle::new(), None)
    }

    fn uniform_event(id: &str, lower: f64, upper: f64) -> Arc<BasicEvent> {
        Arc::new(BasicEvent::new(
            id,
            Arc::new(Expression::Uniform {
                lower: Expression::constant(lower),
                upper: Expression::constant(upper),
            }),
        ))
    }

    fn setup() -> (IndexedGraph, CutSetCollection) {
        let formula = Formula::new(
            MC::Or,
            vec![
                Arg::basic(&uniform_event("a", 0.05, 0.15)),
                Arg::basic(&uniform_event("b", 0.10, 0.30)),
            ],
        )
        .unwrap();
        let mut graph = IndexedGraph::new(&formula, &CcfExpansion::default());
        let context = ctx();
        Preprocessor::new(&context).run(&mut graph).unwrap();
        let sets = MocusGenerator::new(&graph, None, 20, 0.0, 1_000_000, &context)
            .generate()
            .unwrap();
        (graph, sets)
    }

    fn settings() -> Settings {
        Settings::default()
            .with_probability_analysis(true)
            .with_uncertainty_analysis(true)
            .with_num_trials(500)
    }

    #[test]
    fn test_fixed_seed_is_bit_stable() {
        let (graph, sets) = setup();
        let context = ctx();
        let first = analyze_uncertainty(&graph, &sets, &settings(), 42, &context).unwrap();
        let second = analyze_uncertainty(&graph, &sets, &settings(), 42, &context).unwrap();
        assert_eq!(first.mean.to_bits(), second.mean.to_bits());
        assert_eq!(first.std_dev.to_bits(), second.std_dev.to_bits());
        assert_eq!(first.p05.to_bits(), second.p05.to_bits());
        assert_eq!(first.p95.to_bits(), second.p95.to_bits());
    }

    #[test]
    fn test_summary_brackets_the_point_estimate() {
        let (graph, sets) = setup();
        let context = ctx();
        let result = analyze_uncertainty(&graph, &sets, &settings(), 7, &context).unwrap();
        // Point estimate: 1 - 0.9 * 0.8 = 0.28 at the distribution means.
        assert!(result.mean > 0.2 && result.mean < 0.36);
        assert!(result.p05 <= result.median && result.median <= result.p95);
        assert!((0.0..=1.0).contains(&result.p05));
        assert!((0.0..=1.0).contains(&result.p95));
        let total: usize = result.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn test_different_seeds_differ() {
        let (graph, sets) = setup();
        let context = ctx();
        let first = analyze_uncertainty(&graph, &sets, &settings(), 1, &context).unwrap();
        let second = analyze_uncertainty(&graph, &sets, &settings(), 2, &context).unwrap();
        assert_ne!(first.mean.to_bits(), second.mean.to_bits());
    }

    #[test]
    fn test_quantile_ranks() {
        let sorted: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        assert_eq!(quantile(&sorted, 0.05), 5.0);
        assert_eq!(quantile(&sorted, 0.50), 50.0);
        assert_eq!(quantile(&sorted, 0.95), 95.0);
    }
}
