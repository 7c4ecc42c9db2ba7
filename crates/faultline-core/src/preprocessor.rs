//! Graph-rewriting passes that bring an indexed graph into canonical form.
//!
//! The pipeline runs constant propagation, pass-through elimination,
//! negation normalization (with XOR/NAND/NOR/ATLEAST lowering), gate
//! coalescing, and Boolean optimization to a fixpoint, then marks modules.
//! The canonical result contains only AND/OR gates with two or more
//! arguments, negations on variables only, and no constants; cut-set
//! generation relies on exactly this shape.

use std::collections::HashMap;

use tracing::debug;

use crate::analysis::AnalysisContext;
use crate::graph::{Connective, GateNode, IndexedGraph, Node};
use crate::AnalysisResult;

/// Upper bound on fixpoint iterations; reaching it means a pass fails to
/// reduce the rewrite measure and is a bug.
const MAX_ITERATIONS: usize = 64;

/// One rewrite over the graph.
trait Pass {
    fn name(&self) -> &'static str;

    /// Applies the rewrite; returns whether anything changed.
    fn run(&self, graph: &mut IndexedGraph) -> bool;
}

/// Drives the pass pipeline to a fixpoint and then detects modules.
pub struct Preprocessor<'a> {
    ctx: &'a AnalysisContext,
}

impl<'a> Preprocessor<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> Self {
        Self { ctx }
    }

    pub fn run(&self, graph: &mut IndexedGraph) -> AnalysisResult<()> {
        let passes: [&dyn Pass; 5] = [
            &PropagateConstants,
            &EliminatePassThrough,
            &Normalize,
            &Coalesce,
            &OptimizeBoolean,
        ];
        for iteration in 0.. {
            if iteration == MAX_ITERATIONS {
                return Err(self
                    .ctx
                    .logic_error("preprocessor failed to reach a fixpoint"));
            }
            let mut changed = false;
            for pass in passes {
                self.ctx.checkpoint()?;
                let pass_changed = pass.run(graph);
                debug!(pass = pass.name(), changed = pass_changed, "preprocessor pass");
                changed |= pass_changed;
            }
            if !changed {
                break;
            }
        }
        self.ctx.checkpoint()?;
        detect_modules(graph);
        Ok(())
    }
}

/// True when the reachable graph is in canonical form: only AND/OR gates
/// with at least two arguments, no constants, and negations on variables
/// only. Trivial graphs (a constant or a single literal root) also count.
pub fn is_canonical(graph: &IndexedGraph) -> bool {
    let root = graph.root().unsigned_abs() as usize;
    if !graph.is_gate(root) {
        return graph.is_variable(root) || graph.constant_value(root).is_some();
    }
    graph.gates_postorder().into_iter().all(|index| {
        let gate = graph.gate(index);
        matches!(gate.connective, Connective::And | Connective::Or)
            && gate.args.len() >= 2
            && gate.args.iter().all(|&arg| {
                let child = arg.unsigned_abs() as usize;
                if graph.is_variable(child) {
                    true
                } else {
                    graph.is_gate(child) && arg > 0
                }
            })
    })
}

// ---------------------------------------------------------------------------
// Constant propagation
// ---------------------------------------------------------------------------

struct PropagateConstants;

impl Pass for PropagateConstants {
    fn name(&self) -> &'static str {
        "constant propagation"
    }

    fn run(&self, graph: &mut IndexedGraph) -> bool {
        let mut changed = false;
        for index in graph.gates_postorder() {
            changed |= simplify_constants(graph, index);
        }
        changed
    }
}

/// Absorbs constant arguments of one gate per the Boolean identities and
/// rewrites degenerate arities. Children are already simplified (postorder).
fn simplify_constants(graph: &mut IndexedGraph, index: usize) -> bool {
    let gate = graph.gate(index);
    let connective = gate.connective;
    let mut min_number = gate.min_number;
    let has_constant_arg = gate
        .args
        .iter()
        .any(|&arg| graph.constant_value(arg.unsigned_abs() as usize).is_some());
    if !has_constant_arg && !gate.args.is_empty() {
        return simplify_arity(graph, index);
    }

    let args = gate.args.clone();
    let mut kept = Vec::with_capacity(args.len());
    let mut parity = false; // XOR: parity of dropped TRUE constants
    let mut result: Option<bool> = None;
    for &arg in &args {
        let child = arg.unsigned_abs() as usize;
        let value = match graph.constant_value(child) {
            Some(value) => value != (arg < 0),
            None => {
                kept.push(arg);
                continue;
            }
        };
        match connective {
            Connective::And => {
                if !value {
                    result = Some(false);
                    break;
                }
            }
            Connective::Or => {
                if value {
                    result = Some(true);
                    break;
                }
            }
            Connective::Nand => {
                if !value {
                    result = Some(true);
                    break;
                }
            }
            Connective::Nor => {
                if value {
                    result = Some(false);
                    break;
                }
            }
            Connective::Xor => parity ^= value,
            Connective::AtLeast => {
                if value {
                    min_number = min_number.saturating_sub(1);
                    if min_number == 0 {
                        result = Some(true);
                        break;
                    }
                }
            }
            Connective::Not => {
                result = Some(!value);
                break;
            }
            Connective::Null => {
                result = Some(value);
                break;
            }
        }
    }

    if result.is_none() {
        result = match connective {
            Connective::And => kept.is_empty().then_some(true),
            Connective::Or => kept.is_empty().then_some(false),
            Connective::Nand => kept.is_empty().then_some(false),
            Connective::Nor => kept.is_empty().then_some(true),
            Connective::Xor => kept.is_empty().then_some(parity),
            Connective::AtLeast => {
                if (kept.len() as u32) < min_number {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        };
    }

    if let Some(value) = result {
        graph.set_constant(index, value);
        return true;
    }

    // XOR parity flips the gate: not(xor(rest)).
    if parity && kept.len() > 1 {
        let child = graph.add_gate(GateNode::new(Connective::Xor, kept)) as i32;
        let gate = graph.gate_mut(index);
        gate.connective = Connective::Null;
        gate.min_number = 0;
        gate.args = vec![-child];
        return true;
    }
    let negate_single = parity; // xor(true, a) = not a

    let gate = graph.gate_mut(index);
    let changed = gate.args != kept || gate.min_number != min_number;
    gate.args = kept;
    gate.min_number = min_number;
    if negate_single && gate.args.len() == 1 {
        gate.connective = Connective::Null;
        gate.min_number = 0;
        gate.args[0] = -gate.args[0];
    }
    simplify_arity(graph, index) || changed
}

/// Collapses gates left with a single argument into pass-throughs.
fn simplify_arity(graph: &mut IndexedGraph, index: usize) -> bool {
    let gate = graph.gate(index);
    if gate.args.len() != 1 {
        return false;
    }
    let negated = matches!(gate.connective, Connective::Nand | Connective::Nor | Connective::Not);
    match gate.connective {
        Connective::And | Connective::Or | Connective::Xor | Connective::AtLeast
        | Connective::Nand | Connective::Nor => {
            let arg = gate.args[0];
            let gate = graph.gate_mut(index);
            gate.connective = Connective::Null;
            gate.min_number = 0;
            gate.args = vec![if negated { -arg } else { arg }];
            true
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Pass-through elimination
// ---------------------------------------------------------------------------

/// Splices out NULL gates and folds NOT gates into argument signs.
struct EliminatePassThrough;

impl EliminatePassThrough {
    /// Resolves a signed reference through any chain of NULL/NOT gates.
    fn resolve(graph: &IndexedGraph, mut arg: i32) -> i32 {
        loop {
            let index = arg.unsigned_abs() as usize;
            if !graph.is_gate(index) {
                return arg;
            }
            let gate = graph.gate(index);
            let inner = match gate.connective {
                Connective::Null => gate.args[0],
                Connective::Not => -gate.args[0],
                _ => return arg,
            };
            arg = if arg < 0 { -inner } else { inner };
        }
    }
}

impl Pass for EliminatePassThrough {
    fn name(&self) -> &'static str {
        "pass-through elimination"
    }

    fn run(&self, graph: &mut IndexedGraph) -> bool {
        let mut changed = false;
        for index in graph.gates_postorder() {
            let gate = graph.gate(index);
            if matches!(gate.connective, Connective::Null | Connective::Not) {
                continue; // handled from the parent side or the root below
            }
            let resolved: Vec<i32> = gate
                .args
                .iter()
                .map(|&arg| Self::resolve(graph, arg))
                .collect();
            if resolved != gate.args {
                graph.gate_mut(index).args = resolved;
                changed = true;
            }
        }
        let root = Self::resolve(graph, graph.root());
        if root != graph.root() {
            graph.set_root(root);
            changed = true;
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Negation normalization and lowering
// ---------------------------------------------------------------------------

/// Pushes negations down to variables (De Morgan) and lowers XOR, NAND,
/// NOR, and ATLEAST into AND/OR structure. Rebuilds only the paths that
/// change; untouched sub-DAGs keep their nodes, which preserves sharing.
struct Normalize;

impl Pass for Normalize {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn run(&self, graph: &mut IndexedGraph) -> bool {
        if Self::is_normal(graph) {
            return false;
        }
        let root = graph.root();
        let mut normalizer = Normalizer {
            memo: HashMap::new(),
        };
        let new_root =
            normalizer.normalize(graph, root.unsigned_abs() as usize, root < 0);
        graph.set_root(new_root);
        true
    }
}

impl Normalize {
    fn is_normal(graph: &IndexedGraph) -> bool {
        let root = graph.root().unsigned_abs() as usize;
        if graph.is_gate(root) && graph.root() < 0 {
            return false;
        }
        graph.gates_postorder().into_iter().all(|index| {
            let gate = graph.gate(index);
            matches!(gate.connective, Connective::And | Connective::Or)
                && gate
                    .args
                    .iter()
                    .all(|&arg| arg > 0 || !graph.is_gate(arg.unsigned_abs() as usize))
        })
    }
}

struct Normalizer {
    /// (node, polarity) -> normalized signed reference.
    memo: HashMap<(usize, bool), i32>,
}

impl Normalizer {
    fn normalize(&mut self, graph: &mut IndexedGraph, index: usize, negate: bool) -> i32 {
        if let Some(&done) = self.memo.get(&(index, negate)) {
            return done;
        }
        let result = self.normalize_uncached(graph, index, negate);
        self.memo.insert((index, negate), result);
        result
    }

    fn normalize_uncached(&mut self, graph: &mut IndexedGraph, index: usize, negate: bool) -> i32 {
        match graph.node(index) {
            Node::Variable => {
                let signed = index as i32;
                return if negate { -signed } else { signed };
            }
            Node::Constant(value) => {
                let value = *value;
                return graph.constant(value != negate);
            }
            Node::Gate(_) => {}
            Node::Unused => unreachable!("sentinel node referenced"),
        }
        let gate = graph.gate(index).clone();
        match gate.connective {
            Connective::And | Connective::Or => {
                let connective = match (gate.connective, negate) {
                    (c, false) => c,
                    (Connective::And, true) => Connective::Or,
                    (Connective::Or, true) => Connective::And,
                    _ => unreachable!(),
                };
                let args: Vec<i32> = gate
                    .args
                    .iter()
                    .map(|&arg| {
                        self.normalize(graph, arg.unsigned_abs() as usize, negate != (arg < 0))
                    })
                    .collect();
                if connective == gate.connective && args == gate.args {
                    index as i32
                } else {
                    graph.add_gate(GateNode::new(connective, args)) as i32
                }
            }
            Connective::Nand => self.rebuild_dual(graph, &gate.args, Connective::And, !negate),
            Connective::Nor => self.rebuild_dual(graph, &gate.args, Connective::Or, !negate),
            Connective::Null => {
                let arg = gate.args[0];
                self.normalize(graph, arg.unsigned_abs() as usize, negate != (arg < 0))
            }
            Connective::Not => {
                let arg = gate.args[0];
                self.normalize(graph, arg.unsigned_abs() as usize, negate == (arg < 0))
            }
            Connective::Xor => {
                let pairs = self.polarity_pairs(graph, &gate.args);
                let (positive, negative) = lower_xor(graph, &pairs);
                // Both polarities come out of one lowering; remember the
                // other one so a second reference reuses it.
                let (wanted, other) = if negate {
                    (negative, positive)
                } else {
                    (positive, negative)
                };
                self.memo.insert((index, !negate), other);
                wanted
            }
            Connective::AtLeast => {
                let pairs = self.polarity_pairs(graph, &gate.args);
                let n = pairs.len() as u32;
                // not atleast(k) = atleast(n - k + 1) over negated args
                let (k, literals): (u32, Vec<i32>) = if negate {
                    (n - gate.min_number + 1, pairs.iter().map(|p| p.1).collect())
                } else {
                    (gate.min_number, pairs.iter().map(|p| p.0).collect())
                };
                let mut memo = HashMap::new();
                lower_atleast(graph, &literals, 0, k, &mut memo)
            }
        }
    }

    fn rebuild_dual(
        &mut self,
        graph: &mut IndexedGraph,
        args: &[i32],
        base: Connective,
        negate: bool,
    ) -> i32 {
        let connective = match (base, negate) {
            (c, false) => c,
            (Connective::And, true) => Connective::Or,
            (Connective::Or, true) => Connective::And,
            _ => unreachable!(),
        };
        let args: Vec<i32> = args
            .iter()
            .map(|&arg| self.normalize(graph, arg.unsigned_abs() as usize, negate != (arg < 0)))
            .collect();
        graph.add_gate(GateNode::new(connective, args)) as i32
    }

    /// Normalizes every argument in both polarities.
    fn polarity_pairs(&mut self, graph: &mut IndexedGraph, args: &[i32]) -> Vec<(i32, i32)> {
        args.iter()
            .map(|&arg| {
                let index = arg.unsigned_abs() as usize;
                let positive = self.normalize(graph, index, arg < 0);
                let negative = self.normalize(graph, index, arg > 0);
                (positive, negative)
            })
            .collect()
    }
}

/// Folds an n-ary parity into AND/OR structure, returning both polarities:
/// `xor(a, b) = (a and not b) or (not a and b)`.
fn lower_xor(graph: &mut IndexedGraph, pairs: &[(i32, i32)]) -> (i32, i32) {
    let mut acc = pairs[0];
    for &(positive, negative) in &pairs[1..] {
        let pos_neg = graph.add_gate(GateNode::new(Connective::And, vec![acc.0, negative])) as i32;
        let neg_pos = graph.add_gate(GateNode::new(Connective::And, vec![acc.1, positive])) as i32;
        let xor = graph.add_gate(GateNode::new(Connective::Or, vec![pos_neg, neg_pos])) as i32;
        let pos_pos = graph.add_gate(GateNode::new(Connective::And, vec![acc.0, positive])) as i32;
        let neg_neg = graph.add_gate(GateNode::new(Connective::And, vec![acc.1, negative])) as i32;
        let xnor = graph.add_gate(GateNode::new(Connective::Or, vec![pos_pos, neg_neg])) as i32;
        acc = (xor, xnor);
    }
    acc
}

/// Structural k-out-of-n lowering over a literal suffix:
/// `atleast(k, [x, rest]) = (x and atleast(k-1, rest)) or atleast(k, rest)`.
/// Sub-results are shared through the memo, keeping the expansion
/// polynomial in gates.
fn lower_atleast(
    graph: &mut IndexedGraph,
    literals: &[i32],
    start: usize,
    k: u32,
    memo: &mut HashMap<(usize, u32), i32>,
) -> i32 {
    let remaining = literals.len() - start;
    if k == 0 {
        return graph.constant(true);
    }
    if (remaining as u32) < k {
        return graph.constant(false);
    }
    if let Some(&done) = memo.get(&(start, k)) {
        return done;
    }
    let result = if remaining as u32 == k {
        graph.add_gate(GateNode::new(
            Connective::And,
            literals[start..].to_vec(),
        )) as i32
    } else if k == 1 {
        graph.add_gate(GateNode::new(Connective::Or, literals[start..].to_vec())) as i32
    } else {
        let with_first = {
            let rest = lower_atleast(graph, literals, start + 1, k - 1, memo);
            graph.add_gate(GateNode::new(
                Connective::And,
                vec![literals[start], rest],
            )) as i32
        };
        let without_first = lower_atleast(graph, literals, start + 1, k, memo);
        graph.add_gate(GateNode::new(
            Connective::Or,
            vec![with_first, without_first],
        )) as i32
    };
    memo.insert((start, k), result);
    result
}

// ---------------------------------------------------------------------------
// Coalescing
// ---------------------------------------------------------------------------

/// Flattens AND-under-AND and OR-under-OR when the child has one parent,
/// preserving shared sub-graphs.
struct Coalesce;

impl Pass for Coalesce {
    fn name(&self) -> &'static str {
        "gate coalescing"
    }

    fn run(&self, graph: &mut IndexedGraph) -> bool {
        let parent_counts = graph.parent_counts();
        let mut changed = false;
        for index in graph.gates_postorder() {
            let connective = graph.gate(index).connective;
            if !matches!(connective, Connective::And | Connective::Or) {
                continue;
            }
            let args = graph.gate(index).args.clone();
            let mut merged: Vec<i32> = Vec::with_capacity(args.len());
            let mut spliced = false;
            for arg in args {
                let child = arg.unsigned_abs() as usize;
                let inline = arg > 0
                    && graph.is_gate(child)
                    && graph.gate(child).connective == connective
                    && parent_counts[child] == 1;
                if inline {
                    merged.extend_from_slice(&graph.gate(child).args);
                    spliced = true;
                } else {
                    merged.push(arg);
                }
            }
            if spliced {
                graph.gate_mut(index).args = merged;
                changed = true;
            }
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Boolean optimization
// ---------------------------------------------------------------------------

/// Idempotence, complementary-argument collapse, and absorption.
struct OptimizeBoolean;

impl Pass for OptimizeBoolean {
    fn name(&self) -> &'static str {
        "boolean optimization"
    }

    fn run(&self, graph: &mut IndexedGraph) -> bool {
        let mut changed = false;
        for index in graph.gates_postorder() {
            let connective = graph.gate(index).connective;
            if !matches!(connective, Connective::And | Connective::Or) {
                continue;
            }
            let args = graph.gate(index).args.clone();

            // Idempotence: a or a = a.
            let mut unique: Vec<i32> = Vec::with_capacity(args.len());
            for arg in args {
                if !unique.contains(&arg) {
                    unique.push(arg);
                }
            }

            // Complementary arguments: a and not a = false, a or not a = true.
            if unique.iter().any(|&arg| unique.contains(&-arg)) {
                graph.set_constant(index, connective == Connective::Or);
                changed = true;
                continue;
            }

            // Absorption: a or (a and b) = a, a and (a or b) = a.
            let dual = match connective {
                Connective::And => Connective::Or,
                Connective::Or => Connective::And,
                _ => unreachable!(),
            };
            let absorbed: Vec<i32> = unique
                .iter()
                .copied()
                .filter(|&arg| {
                    let child = arg.unsigned_abs() as usize;
                    if arg < 0 || !graph.is_gate(child) || graph.gate(child).connective != dual {
                        return true;
                    }
                    !graph
                        .gate(child)
                        .args
                        .iter()
                        .any(|other| unique.contains(other) && *other != arg)
                })
                .collect();

            let gate = graph.gate_mut(index);
            if absorbed != gate.args {
                gate.args = absorbed;
                changed = true;
            }
            changed |= simplify_arity(graph, index);
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Module detection
// ---------------------------------------------------------------------------

/// Marks gates whose sub-DAG is reachable only through them.
///
/// A DFS assigns enter/exit times to gates and first/last encounter times
/// to every node; a gate is a module iff all encounters of all its
/// descendants fall strictly inside its own enter/exit window.
fn detect_modules(graph: &mut IndexedGraph) {
    let root = graph.root().unsigned_abs() as usize;
    if !graph.is_gate(root) {
        return;
    }
    let size = graph.parent_counts().len();
    let mut times = Timestamps {
        enter: vec![0; size],
        exit: vec![0; size],
        first: vec![0; size],
        last: vec![0; size],
        clock: 0,
    };
    times.visit(graph, root);

    let mut ranges: HashMap<usize, (u64, u64)> = HashMap::new();
    for index in graph.gates_postorder() {
        let mut min_time = u64::MAX;
        let mut max_time = 0;
        for &arg in &graph.gate(index).args {
            let child = arg.unsigned_abs() as usize;
            min_time = min_time.min(times.first[child]);
            max_time = max_time.max(times.last[child]);
            if let Some(&(child_min, child_max)) = ranges.get(&child) {
                min_time = min_time.min(child_min);
                max_time = max_time.max(child_max);
            }
        }
        ranges.insert(index, (min_time, max_time));
        let is_module = min_time > times.enter[index] && max_time < times.exit[index];
        graph.gate_mut(index).module = is_module;
    }
    graph.gate_mut(root).module = true;
}

struct Timestamps {
    enter: Vec<u64>,
    exit: Vec<u64>,
    first: Vec<u64>,
    last: Vec<u64>,
    clock: u64,
}

impl Timestamps {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn visit(&mut self, graph: &IndexedGraph, index: usize) {
        let time = self.tick();
        self.enter[index] = time;
        self.first[index] = time;
        for &arg in &graph.gate(index).args.clone() {
            let child = arg.unsigned_abs() as usize;
            if graph.is_gate(child) {
                if self.enter[child] == 0 {
                    self.visit(graph, child);
                } else {
                    let time = self.tick();
                    self.last[child] = time;
                }
            } else {
                let time = self.tick();
                if self.first[child] == 0 {
                    self.first[child] = time;
                }
                self.last[child] = time;
            }
        }
        let time = self.tick();
        self.exit[index] = time;
        self.last[index] = self.last[index].max(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisHandle;
    use faultline_model::{
        Arg, BasicEvent, CcfExpansion, Connective as MC, Expression, Formula, Gate, HouseEvent,
    };
    use std::sync::Arc;

    fn ctx() -> crate::analysis::AnalysisContext {
        crate::analysis::AnalysisContext::new("test", AnalysisHandle::new(), None)
    }

    fn event(id: &str) -> Arc<BasicEvent> {
        Arc::new(BasicEvent::new(id, Expression::constant(0.1)))
    }

    fn preprocess(formula: &Formula) -> IndexedGraph {
        let mut graph = IndexedGraph::new(formula, &CcfExpansion::default());
        Preprocessor::new(&ctx()).run(&mut graph).unwrap();
        graph
    }

    #[test]
    fn test_house_events_propagate() {
        let a = event("a");
        let on = Arc::new(HouseEvent::new("on", true));
        let off = Arc::new(HouseEvent::new("off", false));
        // and(a, on, not off) = a
        let formula = Formula::new(
            MC::And,
            vec![Arg::basic(&a), Arg::house(&on), Arg::complement(
                faultline_model::ArgEvent::House(off),
            )],
        )
        .unwrap();
        let graph = preprocess(&formula);
        assert_eq!(graph.root(), 1);
    }

    #[test]
    fn test_or_with_true_house_is_tautology() {
        let a = event("a");
        let on = Arc::new(HouseEvent::new("on", true));
        let formula =
            Formula::new(MC::Or, vec![Arg::basic(&a), Arg::house(&on)]).unwrap();
        let graph = preprocess(&formula);
        let root = graph.root();
        assert!(root > 0);
        assert_eq!(graph.constant_value(root as usize), Some(true));
    }

    #[test]
    fn test_complement_collapse() {
        let a = event("a");
        // or(a, not a) = true
        let formula =
            Formula::new(MC::Or, vec![Arg::basic(&a), Arg::not_basic(&a)]).unwrap();
        let graph = preprocess(&formula);
        assert_eq!(graph.constant_value(graph.root() as usize), Some(true));

        // and(a, not a) = false
        let formula =
            Formula::new(MC::And, vec![Arg::basic(&a), Arg::not_basic(&a)]).unwrap();
        let graph = preprocess(&formula);
        assert_eq!(graph.constant_value(graph.root() as usize), Some(false));
    }

    #[test]
    fn test_nand_lowering_pushes_negation_to_variables() {
        let a = event("a");
        let b = event("b");
        let formula =
            Formula::new(MC::Nand, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap();
        let graph = preprocess(&formula);
        assert!(is_canonical(&graph));
        let root = graph.gate(graph.root() as usize);
        assert_eq!(root.connective, Connective::Or);
        let mut args = root.args.clone();
        args.sort();
        assert_eq!(args, vec![-2, -1]);
    }

    #[test]
    fn test_atleast_lowering_two_of_three() {
        let (a, b, c) = (event("a"), event("b"), event("c"));
        let formula = Formula::atleast(
            2,
            vec![Arg::basic(&a), Arg::basic(&b), Arg::basic(&c)],
        )
        .unwrap();
        let graph = preprocess(&formula);
        assert!(is_canonical(&graph));
    }

    #[test]
    fn test_preprocessing_is_idempotent() {
        let (a, b, c) = (event("a"), event("b"), event("c"));
        let inner = Gate::new(
            "inner",
            Formula::new(MC::Xor, vec![Arg::basic(&b), Arg::basic(&c)]).unwrap(),
        );
        let formula = Formula::new(
            MC::Or,
            vec![Arg::basic(&a), Arg::gate(&inner), Arg::not_basic(&c)],
        )
        .unwrap();
        let mut graph = IndexedGraph::new(&formula, &CcfExpansion::default());
        Preprocessor::new(&ctx()).run(&mut graph).unwrap();
        assert!(is_canonical(&graph));

        let root = graph.root();
        let shape: Vec<(Connective, Vec<i32>)> = graph
            .gates_postorder()
            .into_iter()
            .map(|i| (graph.gate(i).connective, graph.gate(i).args.clone()))
            .collect();
        Preprocessor::new(&ctx()).run(&mut graph).unwrap();
        let shape_after: Vec<(Connective, Vec<i32>)> = graph
            .gates_postorder()
            .into_iter()
            .map(|i| (graph.gate(i).connective, graph.gate(i).args.clone()))
            .collect();
        assert_eq!(graph.root(), root);
        assert_eq!(shape, shape_after);
    }

    #[test]
    fn test_coalescing_respects_sharing() {
        let (a, b, c) = (event("a"), event("b"), event("c"));
        let shared = Gate::new(
            "shared",
            Formula::new(MC::And, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap(),
        );
        // Both parents are AND gates over the shared AND child; the child
        // must survive because it has two parents.
        let left = Gate::new(
            "left",
            Formula::new(MC::And, vec![Arg::gate(&shared), Arg::basic(&c)]).unwrap(),
        );
        let right = Gate::new(
            "right",
            Formula::new(MC::And, vec![Arg::gate(&shared), Arg::not_basic(&c)]).unwrap(),
        );
        let top =
            Formula::new(MC::Or, vec![Arg::gate(&left), Arg::gate(&right)]).unwrap();
        let graph = preprocess(&top);
        assert!(is_canonical(&graph));
        // The shared AND gate is still referenced twice.
        let counts = graph.parent_counts();
        let shared_gates: Vec<usize> = graph
            .gates_postorder()
            .into_iter()
            .filter(|&i| counts[i] == 2)
            .collect();
        assert_eq!(shared_gates.len(), 1);
    }

    #[test]
    fn test_absorption() {
        let (a, b) = (event("a"), event("b"));
        let child = Gate::new(
            "child",
            Formula::new(MC::And, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap(),
        );
        // or(a, and(a, b)) = a
        let formula =
            Formula::new(MC::Or, vec![Arg::basic(&a), Arg::gate(&child)]).unwrap();
        let graph = preprocess(&formula);
        assert_eq!(graph.root(), 1);
    }

    #[test]
    fn test_module_detection() {
        let (a, b, c, d, e) = (event("a"), event("b"), event("c"), event("d"), event("e"));
        let module = Gate::new(
            "module",
            Formula::new(MC::Or, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap(),
        );
        // c appears under both `leaky` and `helper`, so neither is a module.
        let leaky = Gate::new(
            "leaky",
            Formula::new(MC::Or, vec![Arg::basic(&c), Arg::basic(&d)]).unwrap(),
        );
        let helper = Gate::new(
            "helper",
            Formula::new(MC::Or, vec![Arg::basic(&c), Arg::basic(&e)]).unwrap(),
        );
        let top = Formula::new(
            MC::And,
            vec![Arg::gate(&module), Arg::gate(&leaky), Arg::gate(&helper)],
        )
        .unwrap();
        let graph = preprocess(&top);
        let root = graph.root() as usize;
        assert!(graph.gate(root).module);
        let mut checked = 0;
        for index in graph.gates_postorder() {
            if index == root {
                continue;
            }
            let gate = graph.gate(index);
            let touches_c = gate.args.iter().any(|&arg| {
                let child = arg.unsigned_abs() as usize;
                graph.is_variable(child) && graph.event(child).id() == "c"
            });
            assert_eq!(gate.module, !touches_c);
            checked += 1;
        }
        assert_eq!(checked, 3);
    }

    #[test]
    fn test_cancellation_stops_preprocessing() {
        let handle = AnalysisHandle::new();
        let ctx = crate::analysis::AnalysisContext::new("test", handle.clone(), None);
        handle.cancel();
        let formula = Formula::new(
            MC::Or,
            vec![Arg::basic(&event("a")), Arg::basic(&event("b"))],
        )
        .unwrap();
        let mut graph = IndexedGraph::new(&formula, &CcfExpansion::default());
        assert!(Preprocessor::new(&ctx).run(&mut graph).is_err());
    }
}
