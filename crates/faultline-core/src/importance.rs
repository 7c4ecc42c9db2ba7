//! Importance measures per basic event.
//!
//! Every factor derives from three quantities: the nominal top-event
//! probability and the conditional probabilities with the event pinned
//! failed (`p = 1`) and pinned working (`p = 0`), both computed by
//! re-running the probability engine over the same cut sets. Factors whose
//! denominator vanishes are reported as undefined rather than poisoning
//! the rest of the table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisContext;
use crate::graph::{IndexedGraph, Literal};
use crate::mocus::CutSetCollection;
use crate::probability::ProbabilityCalculator;
use crate::settings::Approximation;
use crate::AnalysisResult;

/// The importance factors of one basic event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceRecord {
    /// Point probability of the event.
    pub probability: f64,
    /// Number of cut sets containing the event.
    pub occurrences: usize,
    /// Marginal importance factor (Birnbaum): `P(top|e=1) - P(top|e=0)`.
    pub mif: Option<f64>,
    /// Critical importance factor: `MIF * p / P(top)`.
    pub cif: Option<f64>,
    /// Diagnostic importance factor: `p * P(top|e=1) / P(top)`.
    pub dif: Option<f64>,
    /// Risk achievement worth: `P(top|e=1) / P(top)`.
    pub raw: Option<f64>,
    /// Risk reduction worth: `P(top) / P(top|e=0)`.
    pub rrw: Option<f64>,
    /// Fussell-Vesely factor: `1 - P(top|e=0) / P(top)`.
    pub fussell_vesely: Option<f64>,
}

/// Computes the importance table over every basic event occurring in the
/// cut sets, keyed by event identifier in variable-index order.
pub fn analyze_importance(
    graph: &IndexedGraph,
    sets: &CutSetCollection,
    probabilities: &[f64],
    approximation: Approximation,
    num_sums: u32,
    ctx: &AnalysisContext,
) -> AnalysisResult<IndexMap<String, ImportanceRecord>> {
    let nominal = ProbabilityCalculator::new(probabilities).evaluate(
        sets,
        approximation,
        num_sums,
        ctx,
    )?;

    let mut table = IndexMap::new();
    let mut pinned = probabilities.to_vec();
    for variable in sets.variables() {
        ctx.checkpoint()?;
        let probability = probabilities[variable];

        pinned[variable] = 1.0;
        let failed = ProbabilityCalculator::new(&pinned).evaluate(
            sets,
            approximation,
            num_sums,
            ctx,
        )?;
        pinned[variable] = 0.0;
        let working = ProbabilityCalculator::new(&pinned).evaluate(
            sets,
            approximation,
            num_sums,
            ctx,
        )?;
        pinned[variable] = probability;

        let occurrences = sets
            .cut_sets()
            .iter()
            .filter(|c| {
                c.contains(Literal::positive(variable)) || c.contains(Literal::negative(variable))
            })
            .count();

        let mif = finite(failed - working);
        let record = ImportanceRecord {
            probability,
            occurrences,
            mif,
            cif: ratio(mif.map(|m| m * probability), nominal),
            dif: ratio(Some(probability * failed), nominal),
            raw: ratio(Some(failed), nominal),
            rrw: ratio(Some(nominal), working),
            fussell_vesely: ratio(Some(nominal - working), nominal),
        };
        table.insert(graph.event(variable).id().to_string(), record);
    }
    Ok(table)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `numerator / denominator`, undefined on a vanishing denominator.
fn ratio(numerator: Option<f64>, denominator: f64) -> Option<f64> {
    let numerator = numerator?;
    if denominator == 0.0 {
        return None;
    }
    finite(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisHandle;
    use crate::mocus::MocusGenerator;
    use crate::preprocessor::Preprocessor;
    use faultline_model::{Arg, BasicEvent, CcfExpansion, Connective as MC, Expression, Formula};
    use std::sync::Arc;

    fn ctx() -> AnalysisContext {
        AnalysisContext::new("test", AnalysisHandle::new(), None)
    }

    fn event(id: &str, p: f64) -> Arc<BasicEvent> {
        Arc::new(BasicEvent::new(id, Expression::constant(p)))
    }

    fn analyze(formula: &Formula) -> IndexMap<String, ImportanceRecord> {
        let mut graph = IndexedGraph::new(formula, &CcfExpansion::default());
        let context = ctx();
        Preprocessor::new(&context).run(&mut graph).unwrap();
        let probabilities = graph
            .variable_probabilities(&faultline_model::EvalContext {
                mission_time: 8760.0,
            })
            .unwrap();
        let sets = MocusGenerator::new(&graph, None, 20, 0.0, 1_000_000, &context)
            .generate()
            .unwrap();
        analyze_importance(
            &graph,
            &sets,
            &probabilities,
            Approximation::None,
            7,
            &context,
        )
        .unwrap()
    }

    #[test]
    fn test_two_event_and_gate() {
        let formula = Formula::new(
            MC::And,
            vec![Arg::basic(&event("a", 0.1)), Arg::basic(&event("b", 0.2))],
        )
        .unwrap();
        let table = analyze(&formula);
        let a = &table["a"];
        // P(top) = 0.02; P(top|a=1) = 0.2; P(top|a=0) = 0.
        assert!((a.mif.unwrap() - 0.2).abs() < 1e-12);
        assert!((a.cif.unwrap() - 1.0).abs() < 1e-12);
        assert!((a.raw.unwrap() - 10.0).abs() < 1e-12);
        assert!((a.fussell_vesely.unwrap() - 1.0).abs() < 1e-12);
        // P(top|a=0) = 0 makes RRW undefined.
        assert!(a.rrw.is_none());
        assert_eq!(a.occurrences, 1);
    }

    #[test]
    fn test_zero_top_probability_reports_undefined() {
        let formula = Formula::new(
            MC::And,
            vec![Arg::basic(&event("a", 0.0)), Arg::basic(&event("b", 0.0))],
        )
        .unwrap();
        let table = analyze(&formula);
        let a = &table["a"];
        assert!(a.cif.is_none());
        assert!(a.dif.is_none());
        assert!(a.raw.is_none());
        // MIF needs no division and stays defined.
        assert_eq!(a.mif, Some(0.0));
    }

    #[test]
    fn test_table_keyed_in_variable_order() {
        let formula = Formula::new(
            MC::Or,
            vec![
                Arg::basic(&event("z", 0.1)),
                Arg::basic(&event("a", 0.2)),
            ],
        )
        .unwrap();
        let table = analyze(&formula);
        let keys: Vec<&String> = table.keys().collect();
        // Encounter order, not alphabetical.
        assert_eq!(keys, vec!["z", "a"]);
    }
}
