//! MOCUS-style minimal-cut-set generation.
//!
//! Works on a preprocessed, canonical graph: top-down expansion of
//! candidate cut sets, AND gates growing a candidate in place and OR gates
//! fanning it out. Candidates die on complementary literals, on exceeding
//! the order limit, and on falling below the probability cut-off. Module
//! gates are analysed recursively with their own order budget and a
//! tightened cut-off, and their cut sets are folded back as a disjunction.
//!
//! Cut sets are prime-implicant aware: a negated basic event is a
//! first-class literal, and candidates containing a literal and its
//! complement annihilate.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::AnalysisContext;
use crate::graph::{Connective, IndexedGraph, Literal};
use crate::AnalysisResult;

/// One minimal cut set: a sorted conjunction of literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CutSet {
    literals: Vec<Literal>,
}

impl CutSet {
    fn from_sorted_signed(signed: &[i32]) -> Self {
        Self {
            literals: signed.iter().map(|&s| Literal::from_signed(s)).collect(),
        }
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// Number of literals.
    pub fn order(&self) -> usize {
        self.literals.len()
    }

    pub fn contains(&self, literal: Literal) -> bool {
        self.literals.binary_search(&literal).is_ok()
    }
}

/// The cut sets of one analysis target, in canonical order: size
/// ascending, then lexicographic on sorted literal indices.
///
/// Two degenerate shapes encode the extreme verdicts: an empty collection
/// is a contradiction (the top event cannot occur) and a single empty set
/// is a tautology (the top event is certain).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutSetCollection {
    cut_sets: Vec<CutSet>,
}

impl CutSetCollection {
    pub fn tautology() -> Self {
        Self {
            cut_sets: vec![CutSet {
                literals: Vec::new(),
            }],
        }
    }

    pub fn contradiction() -> Self {
        Self {
            cut_sets: Vec::new(),
        }
    }

    pub fn cut_sets(&self) -> &[CutSet] {
        &self.cut_sets
    }

    pub fn len(&self) -> usize {
        self.cut_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cut_sets.is_empty()
    }

    pub fn is_contradiction(&self) -> bool {
        self.cut_sets.is_empty()
    }

    pub fn is_tautology(&self) -> bool {
        self.cut_sets.len() == 1 && self.cut_sets[0].literals.is_empty()
    }

    /// Distribution of cut-set counts by order.
    pub fn order_histogram(&self) -> IndexMap<usize, usize> {
        let mut histogram = IndexMap::new();
        for cut_set in &self.cut_sets {
            *histogram.entry(cut_set.order()).or_insert(0) += 1;
        }
        histogram
    }

    /// Every variable index occurring in some cut set, ascending.
    pub fn variables(&self) -> Vec<usize> {
        let mut seen: Vec<usize> = self
            .cut_sets
            .iter()
            .flat_map(|c| c.literals.iter().map(|l| l.index()))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen
    }
}

/// The module cut-off policy: a sub-module analysed from a candidate with
/// probability bound `partial` only needs cut sets whose own probability
/// clears `parent / partial`, since the folded product is what must clear
/// the global floor.
pub(crate) fn tightened_cut_off(parent: f64, partial: f64) -> f64 {
    if parent <= 0.0 {
        return 0.0;
    }
    parent / partial.clamp(f64::MIN_POSITIVE, 1.0)
}

/// Sort key ordering literals by variable index, positive before negated.
fn literal_key(signed: i32) -> (u32, bool) {
    (signed.unsigned_abs(), signed < 0)
}

/// A working cut set under expansion: resolved literals plus the gates
/// still to expand.
#[derive(Debug, Clone)]
struct Candidate {
    /// Signed variable indices, sorted by [`literal_key`].
    literals: Vec<i32>,
    /// Pending gate indices, deduplicated.
    gates: Vec<usize>,
}

impl Candidate {
    fn root(gate: usize) -> Self {
        Self {
            literals: Vec::new(),
            gates: vec![gate],
        }
    }

    /// Adds a literal; returns false when the candidate annihilates on a
    /// complementary pair.
    fn insert_literal(&mut self, literal: i32) -> bool {
        if self
            .literals
            .binary_search_by_key(&literal_key(-literal), |&l| literal_key(l))
            .is_ok()
        {
            return false;
        }
        match self
            .literals
            .binary_search_by_key(&literal_key(literal), |&l| literal_key(l))
        {
            Ok(_) => true, // idempotent
            Err(position) => {
                self.literals.insert(position, literal);
                true
            }
        }
    }

    fn insert_gate(&mut self, gate: usize) {
        if !self.gates.contains(&gate) {
            self.gates.push(gate);
        }
    }

    /// Upper bound on the candidate's probability: the product over
    /// resolved literals, with pending gates counted as one.
    fn probability_bound(&self, probabilities: &[f64]) -> f64 {
        self.literals
            .iter()
            .map(|&l| {
                let p = probabilities[l.unsigned_abs() as usize];
                if l < 0 {
                    1.0 - p
                } else {
                    p
                }
            })
            .product()
    }
}

/// Minimal-cut-set generator over one preprocessed graph.
pub struct MocusGenerator<'a> {
    graph: &'a IndexedGraph,
    probabilities: Option<&'a [f64]>,
    limit_order: u32,
    cut_off: f64,
    candidate_limit: usize,
    ctx: &'a AnalysisContext,
}

type Memo = HashMap<(usize, u32, u64), Vec<Vec<i32>>>;

impl<'a> MocusGenerator<'a> {
    pub fn new(
        graph: &'a IndexedGraph,
        probabilities: Option<&'a [f64]>,
        limit_order: u32,
        cut_off: f64,
        candidate_limit: usize,
        ctx: &'a AnalysisContext,
    ) -> Self {
        Self {
            graph,
            probabilities,
            limit_order,
            cut_off,
            candidate_limit,
            ctx,
        }
    }

    /// Enumerates the minimal cut sets of the graph root.
    pub fn generate(&self) -> AnalysisResult<CutSetCollection> {
        let root = self.graph.root();
        let root_index = root.unsigned_abs() as usize;

        if let Some(value) = self.graph.constant_value(root_index) {
            let value = value != (root < 0);
            return Ok(if value {
                CutSetCollection::tautology()
            } else {
                CutSetCollection::contradiction()
            });
        }
        if self.graph.is_variable(root_index) {
            return Ok(CutSetCollection {
                cut_sets: vec![CutSet::from_sorted_signed(&[root])],
            });
        }

        let mut memo = Memo::new();
        let sets = self.expand_gate(root_index, self.limit_order, self.cut_off, &mut memo)?;
        debug!(
            target_gate = root_index,
            count = sets.len(),
            "cut-set generation finished"
        );
        Ok(CutSetCollection {
            cut_sets: sets.iter().map(|s| CutSet::from_sorted_signed(s)).collect(),
        })
    }

    /// Runs the expansion loop for one (module) gate scope.
    fn expand_gate(
        &self,
        scope: usize,
        limit_order: u32,
        cut_off: f64,
        memo: &mut Memo,
    ) -> AnalysisResult<Vec<Vec<i32>>> {
        let key = (scope, limit_order, cut_off.to_bits());
        if let Some(done) = memo.get(&key) {
            return Ok(done.clone());
        }

        let mut work = vec![Candidate::root(scope)];
        let mut done: Vec<Vec<i32>> = Vec::new();
        let mut iterations = 0u64;
        while let Some(mut candidate) = work.pop() {
            iterations += 1;
            if iterations % 256 == 0 {
                self.ctx.checkpoint()?;
            }
            if work.len() + done.len() > self.candidate_limit {
                return Err(self.ctx.resource_error(format!(
                    "cut-set working set exceeded {} candidates",
                    self.candidate_limit
                )));
            }

            let Some(gate_index) = self.pick_gate(&candidate) else {
                done.push(candidate.literals);
                continue;
            };
            candidate.gates.retain(|&g| g != gate_index);

            // Module boundary: analyse the module on its own and fold its
            // cut sets back as a disjunction.
            if gate_index != scope && self.graph.gate(gate_index).module {
                let remaining = limit_order - candidate.literals.len() as u32;
                let module_cut_off = match self.probabilities {
                    Some(probabilities) => {
                        tightened_cut_off(cut_off, candidate.probability_bound(probabilities))
                    }
                    None => cut_off,
                };
                let module_sets =
                    self.expand_gate(gate_index, remaining, module_cut_off, memo)?;
                for module_set in &module_sets {
                    let mut folded = candidate.clone();
                    if self.absorb_literals(&mut folded, module_set, limit_order, cut_off) {
                        work.push(folded);
                    }
                }
                continue;
            }

            let gate = self.graph.gate(gate_index);
            match gate.connective {
                Connective::And => {
                    if self.absorb_args(&mut candidate, &gate.args, limit_order, cut_off)? {
                        work.push(candidate);
                    }
                }
                Connective::Or => {
                    for &arg in &gate.args {
                        let mut fanned = candidate.clone();
                        if self.absorb_args(&mut fanned, &[arg], limit_order, cut_off)? {
                            work.push(fanned);
                        }
                    }
                }
                connective => {
                    return Err(self.ctx.logic_error(format!(
                        "non-canonical {connective:?} gate reached cut-set generation"
                    )));
                }
            }
        }

        let result = minimize(done);
        memo.insert(key, result.clone());
        Ok(result)
    }

    /// Gate choice heuristic: fewest arguments first keeps the working set
    /// small. Only affects performance, never the final cut sets.
    fn pick_gate(&self, candidate: &Candidate) -> Option<usize> {
        candidate
            .gates
            .iter()
            .copied()
            .min_by_key(|&g| self.graph.gate(g).args.len())
    }

    /// Merges gate arguments into the candidate; returns whether it
    /// survives the annihilation, order, and cut-off checks.
    fn absorb_args(
        &self,
        candidate: &mut Candidate,
        args: &[i32],
        limit_order: u32,
        cut_off: f64,
    ) -> AnalysisResult<bool> {
        for &arg in args {
            let index = arg.unsigned_abs() as usize;
            if self.graph.is_variable(index) {
                if !candidate.insert_literal(arg) {
                    return Ok(false);
                }
            } else if self.graph.is_gate(index) {
                if arg < 0 {
                    return Err(self
                        .ctx
                        .logic_error("negated gate argument reached cut-set generation"));
                }
                candidate.insert_gate(index);
            } else {
                return Err(self
                    .ctx
                    .logic_error("constant argument reached cut-set generation"));
            }
        }
        Ok(self.survives(candidate, limit_order, cut_off))
    }

    /// Folds a module's resolved cut set into the candidate. Module
    /// variables are disjoint from the rest of the graph, so no
    /// annihilation can occur; the checks still run for safety.
    fn absorb_literals(
        &self,
        candidate: &mut Candidate,
        literals: &[i32],
        limit_order: u32,
        cut_off: f64,
    ) -> bool {
        for &literal in literals {
            if !candidate.insert_literal(literal) {
                return false;
            }
        }
        self.survives(candidate, limit_order, cut_off)
    }

    fn survives(&self, candidate: &Candidate, limit_order: u32, cut_off: f64) -> bool {
        if candidate.literals.len() as u32 > limit_order {
            return false;
        }
        if cut_off > 0.0 {
            if let Some(probabilities) = self.probabilities {
                if candidate.probability_bound(probabilities) < cut_off {
                    return false;
                }
            }
        }
        true
    }
}

/// Drops duplicates and proper supersets, returning canonical order.
fn minimize(mut sets: Vec<Vec<i32>>) -> Vec<Vec<i32>> {
    sets.sort_by(|a, b| {
        a.len().cmp(&b.len()).then_with(|| {
            a.iter()
                .map(|&l| literal_key(l))
                .cmp(b.iter().map(|&l| literal_key(l)))
        })
    });
    sets.dedup();
    let mut minimal: Vec<Vec<i32>> = Vec::new();
    for set in sets {
        if !minimal.iter().any(|kept| is_subset(kept, &set)) {
            minimal.push(set);
        }
    }
    minimal
}

/// Two-pointer subset test over key-sorted literal lists.
fn is_subset(small: &[i32], large: &[i32]) -> bool {
    let mut large_iter = large.iter();
    'outer: for &needle in small {
        for &candidate in large_iter.by_ref() {
            if candidate == needle {
                continue 'outer;
            }
            if literal_key(candidate) > literal_key(needle) {
                return false;
            }
        }
        return false;
    }
    true
}
