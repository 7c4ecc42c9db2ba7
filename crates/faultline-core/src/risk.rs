//! The top-level risk analysis: target collection, per-target pipeline,
//! and result records.
//!
//! Analysis targets are the top gates of every fault tree plus the
//! sequences of every initiating event's tree. Targets are independent and
//! run in parallel, each owning its indexed graph and cut-set working set;
//! the model is shared read-only. A target that fails on a logic, resource,
//! or cancellation error is reported failed with its reason while the
//! remaining targets complete.

use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use faultline_model::{CcfExpansion, EvalContext, Formula, Model, ModelError};

use crate::analysis::{AnalysisContext, AnalysisHandle, AnalysisInfo};
use crate::event_tree::collect_sequences;
use crate::graph::IndexedGraph;
use crate::importance::ImportanceRecord;
use crate::mocus::{CutSetCollection, MocusGenerator};
use crate::preprocessor::Preprocessor;
use crate::probability::ProbabilityCalculator;
use crate::random::resolve_seed;
use crate::settings::Settings;
use crate::uncertainty::{analyze_uncertainty, UncertaintyResult};
use crate::{AnalysisError, AnalysisResult, ErrorKind};

/// One literal of a reported product, by event identifier.
#[derive(Debug, Clone, Serialize)]
pub struct ProductLiteral {
    pub event: String,
    pub complement: bool,
}

/// One minimal cut set in reporting form.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub literals: Vec<ProductLiteral>,
    pub order: usize,
    /// Product of literal probabilities, when probability data is present.
    pub probability: Option<f64>,
    /// Share of the sum of all product probabilities.
    pub contribution: Option<f64>,
}

/// The qualitative outcome of one target.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub products: Vec<Product>,
    /// Cut-set counts by order.
    pub order_histogram: IndexMap<usize, usize>,
    /// Order-1 products, the single points of failure.
    pub single_point_failures: Vec<String>,
}

/// Everything computed for one completed target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetAnalyses {
    pub products: ProductReport,
    pub probability: Option<f64>,
    pub importance: Option<IndexMap<String, ImportanceRecord>>,
    pub uncertainty: Option<UncertaintyResult>,
    pub info: AnalysisInfo,
}

/// Identity of an analysis target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TargetId {
    Gate {
        fault_tree: String,
        gate: String,
    },
    Sequence {
        initiating_event: String,
        sequence: String,
    },
}

impl TargetId {
    fn display(&self) -> String {
        match self {
            TargetId::Gate { fault_tree, gate } => format!("{fault_tree}.{gate}"),
            TargetId::Sequence {
                initiating_event,
                sequence,
            } => format!("{initiating_event}.{sequence}"),
        }
    }
}

/// Success or structured failure of one target.
#[derive(Debug, Clone, Serialize)]
pub enum TargetOutcome {
    Completed(Box<TargetAnalyses>),
    Failed { kind: ErrorKind, message: String },
}

/// Result record of one analysis target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub target: TargetId,
    pub outcome: TargetOutcome,
}

/// Sequence probabilities of one initiating event.
#[derive(Debug, Clone, Serialize)]
pub struct EventTreeResult {
    pub initiating_event: String,
    /// Sequence id -> probability; `None` when the target failed or
    /// probability analysis was off.
    pub sequences: IndexMap<String, Option<f64>>,
}

/// The full output of one risk analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub model: String,
    pub results: Vec<TargetResult>,
    pub event_tree_results: Vec<EventTreeResult>,
    /// The master seed used for uncertainty analysis.
    pub seed: u64,
}

/// Drives the whole pipeline over every analysis target of a model.
pub struct RiskAnalysis {
    model: Arc<Model>,
    settings: Settings,
}

struct Target {
    id: TargetId,
    formula: Formula,
}

impl RiskAnalysis {
    pub fn new(model: Arc<Model>, settings: Settings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analyzes every target with a fresh cancellation handle.
    pub fn analyze(&self) -> AnalysisResult<RiskReport> {
        self.analyze_with(AnalysisHandle::new())
    }

    /// Analyzes every target; the handle allows cancelling from another
    /// thread.
    pub fn analyze_with(&self, handle: AnalysisHandle) -> AnalysisResult<RiskReport> {
        self.settings.validate()?;
        let eval = EvalContext {
            mission_time: self.settings.mission_time,
        };
        self.model.validate(&eval)?;

        let ccf = if self.settings.ccf_analysis {
            self.model.expand_ccf_groups()
        } else {
            CcfExpansion::default()
        };

        let targets = self.collect_targets()?;
        let seed = resolve_seed(self.settings.seed);
        info!(
            model = self.model.name(),
            targets = targets.len(),
            "risk analysis started"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers())
            .build()
            .map_err(|e| AnalysisError::Resource {
                target: "worker pool".into(),
                message: e.to_string(),
            })?;
        let results: Vec<TargetResult> = pool.install(|| {
            targets
                .par_iter()
                .map(|target| self.analyze_target(target, &ccf, eval, seed, &handle))
                .collect()
        });

        let event_tree_results = assemble_event_tree_results(&results);
        info!(model = self.model.name(), "risk analysis finished");
        Ok(RiskReport {
            model: self.model.name().to_string(),
            results,
            event_tree_results,
            seed,
        })
    }

    /// Fault-tree top gates plus event-tree sequences, in model order.
    fn collect_targets(&self) -> AnalysisResult<Vec<Target>> {
        let mut targets = Vec::new();
        for tree in self.model.fault_trees() {
            for gate in tree.top_gates() {
                targets.push(Target {
                    id: TargetId::Gate {
                        fault_tree: tree.id().to_string(),
                        gate: gate.id().to_string(),
                    },
                    formula: gate.formula().clone(),
                });
            }
        }
        for initiating_event in self.model.initiating_events() {
            let tree = self.model.event_tree(initiating_event.event_tree()).ok_or_else(|| {
                ModelError::UndefinedEventTree {
                    initiating_event: initiating_event.id().to_string(),
                    tree: initiating_event.event_tree().to_string(),
                }
            })?;
            for (sequence, formula) in collect_sequences(tree)? {
                targets.push(Target {
                    id: TargetId::Sequence {
                        initiating_event: initiating_event.id().to_string(),
                        sequence,
                    },
                    formula,
                });
            }
        }
        Ok(targets)
    }

    fn analyze_target(
        &self,
        target: &Target,
        ccf: &CcfExpansion,
        eval: EvalContext,
        seed: u64,
        handle: &AnalysisHandle,
    ) -> TargetResult {
        let name = target.id.display();
        let ctx = AnalysisContext::new(name.clone(), handle.clone(), self.settings.time_limit);
        match self.run_pipeline(target, ccf, eval, seed, &ctx) {
            Ok(analyses) => TargetResult {
                target: target.id.clone(),
                outcome: TargetOutcome::Completed(Box::new(analyses)),
            },
            Err(error) => {
                debug!(target = name, error = %error, "target failed");
                TargetResult {
                    target: target.id.clone(),
                    outcome: TargetOutcome::Failed {
                        kind: error.kind(),
                        message: error.to_string(),
                    },
                }
            }
        }
    }

    fn run_pipeline(
        &self,
        target: &Target,
        ccf: &CcfExpansion,
        eval: EvalContext,
        seed: u64,
        ctx: &AnalysisContext,
    ) -> AnalysisResult<TargetAnalyses> {
        let mut timer = AnalysisInfo::start();
        let mut graph = IndexedGraph::new(&target.formula, ccf);
        let probabilities = if self.settings.probability_analysis {
            Some(graph.variable_probabilities(&eval)?)
        } else {
            None
        };

        Preprocessor::new(ctx).run(&mut graph)?;
        let products = MocusGenerator::new(
            &graph,
            probabilities.as_deref(),
            self.settings.limit_order,
            self.settings.cut_off,
            self.settings.candidate_limit,
            ctx,
        )
        .generate()?;
        debug!(
            target = ctx.target(),
            products = products.len(),
            "qualitative analysis done"
        );

        let mut probability = None;
        let mut importance = None;
        let mut uncertainty = None;
        if let Some(probabilities) = &probabilities {
            let calculator = ProbabilityCalculator::new(probabilities);
            match calculator.evaluate(
                &products,
                self.settings.approximation,
                self.settings.num_sums,
                ctx,
            ) {
                Ok(p) => probability = Some(p),
                Err(AnalysisError::Numeric { metric, .. }) => {
                    timer.warn(format!("{metric} is undefined"));
                }
                Err(error) => return Err(error),
            }

            if self.settings.importance_analysis {
                importance = Some(crate::importance::analyze_importance(
                    &graph,
                    &products,
                    probabilities,
                    self.settings.approximation,
                    self.settings.num_sums,
                    ctx,
                )?);
            }
            if self.settings.uncertainty_analysis {
                match analyze_uncertainty(&graph, &products, &self.settings, seed, ctx) {
                    Ok(result) => uncertainty = Some(result),
                    Err(AnalysisError::Numeric { metric, .. }) => {
                        timer.warn(format!("{metric} is undefined"));
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        let products = report_products(&graph, &products, probabilities.as_deref());
        Ok(TargetAnalyses {
            products,
            probability,
            importance,
            uncertainty,
            info: timer.finish(),
        })
    }
}

/// Maps cut sets from variable indices to event identifiers and attaches
/// per-product probabilities.
fn report_products(
    graph: &IndexedGraph,
    sets: &CutSetCollection,
    probabilities: Option<&[f64]>,
) -> ProductReport {
    let calculator = probabilities.map(ProbabilityCalculator::new);
    let set_probabilities: Vec<Option<f64>> = sets
        .cut_sets()
        .iter()
        .map(|cut_set| calculator.as_ref().map(|c| c.cut_set_probability(cut_set)))
        .collect();
    let total: f64 = set_probabilities.iter().flatten().sum();

    let mut single_point_failures = Vec::new();
    let products = sets
        .cut_sets()
        .iter()
        .zip(&set_probabilities)
        .map(|(cut_set, probability)| {
            let literals: Vec<ProductLiteral> = cut_set
                .literals()
                .iter()
                .map(|l| ProductLiteral {
                    event: graph.event(l.index()).id().to_string(),
                    complement: l.is_complement(),
                })
                .collect();
            if cut_set.order() == 1 && !literals[0].complement {
                single_point_failures.push(literals[0].event.clone());
            }
            Product {
                literals,
                order: cut_set.order(),
                probability: *probability,
                contribution: probability
                    .filter(|_| total > 0.0)
                    .map(|p| p / total),
            }
        })
        .collect();

    ProductReport {
        products,
        order_histogram: sets.order_histogram(),
        single_point_failures,
    }
}

fn assemble_event_tree_results(results: &[TargetResult]) -> Vec<EventTreeResult> {
    let mut by_initiator: IndexMap<String, IndexMap<String, Option<f64>>> = IndexMap::new();
    for result in results {
        if let TargetId::Sequence {
            initiating_event,
            sequence,
        } = &result.target
        {
            let probability = match &result.outcome {
                TargetOutcome::Completed(analyses) => analyses.probability,
                TargetOutcome::Failed { .. } => None,
            };
            by_initiator
                .entry(initiating_event.clone())
                .or_default()
                .insert(sequence.clone(), probability);
        }
    }
    by_initiator
        .into_iter()
        .map(|(initiating_event, sequences)| EventTreeResult {
            initiating_event,
            sequences,
        })
        .collect()
}
