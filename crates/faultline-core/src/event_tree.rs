//! Event-tree traversal: from branches and forks to one Boolean formula
//! per sequence.
//!
//! A depth-first walk accumulates collect-formulas along each path;
//! reaching a sequence records the path's conjunction, and paths sharing a
//! sequence are joined by disjunction. Bypass paths contribute nothing.
//! Named branches are inlined at their reference sites; reference cycles
//! are a validation error.

use std::sync::Arc;

use indexmap::IndexMap;

use faultline_model::{
    Arg, Branch, Connective, EventTree, Formula, Gate, HouseEvent, ModelError, PathState, Target,
};

use crate::AnalysisResult;

/// Walks the event tree and returns the sequence formulas in first-reached
/// order. Each formula becomes a synthetic top gate for the fault-tree
/// pipeline.
pub fn collect_sequences(tree: &EventTree) -> AnalysisResult<IndexMap<String, Formula>> {
    let mut walker = Walker {
        tree,
        sequences: IndexMap::new(),
        chain: Vec::new(),
    };
    let mut stack = Vec::new();
    walker.walk_branch(tree.initial_state(), &mut stack, true)?;

    let mut formulas = IndexMap::new();
    for (sequence, paths) in walker.sequences {
        formulas.insert(sequence.clone(), join_paths(tree.id(), &sequence, paths));
    }
    Ok(formulas)
}

struct Walker<'a> {
    tree: &'a EventTree,
    /// Sequence id -> the collect-formulas of every path reaching it.
    sequences: IndexMap<String, Vec<Vec<Formula>>>,
    /// Active named-branch references, for cycle detection.
    chain: Vec<String>,
}

impl Walker<'_> {
    fn walk_branch(
        &mut self,
        branch: &Branch,
        stack: &mut Vec<Formula>,
        collect: bool,
    ) -> AnalysisResult<()> {
        let mut pushed = false;
        if collect {
            if let Some(formula) = &branch.collect_formula {
                stack.push(formula.clone());
                pushed = true;
            }
        }
        match &branch.target {
            Target::Fork(fork) => {
                for path in &fork.paths {
                    let collect_path = path.state != PathState::Bypass;
                    self.walk_branch(&path.branch, stack, collect_path)?;
                }
            }
            Target::Sequence(sequence) => {
                self.sequences
                    .entry(sequence.id().to_string())
                    .or_default()
                    .push(stack.clone());
            }
            Target::Branch(name) => {
                if self.chain.iter().any(|seen| seen == name) {
                    let mut chain = self.chain.clone();
                    chain.push(name.clone());
                    return Err(ModelError::BranchCycle {
                        tree: self.tree.id().to_string(),
                        chain: chain.join(" -> "),
                    }
                    .into());
                }
                let tree = self.tree;
                let target = tree.branch(name).ok_or_else(|| ModelError::UndefinedBranch {
                    tree: tree.id().to_string(),
                    branch: name.clone(),
                })?;
                self.chain.push(name.clone());
                self.walk_branch(target, stack, true)?;
                self.chain.pop();
            }
        }
        if pushed {
            stack.pop();
        }
        Ok(())
    }
}

/// OR-joins the AND-joined path formulas of one sequence.
fn join_paths(tree: &str, sequence: &str, paths: Vec<Vec<Formula>>) -> Formula {
    let mut path_formulas: Vec<Formula> = paths
        .into_iter()
        .enumerate()
        .map(|(i, collected)| join_collected(tree, sequence, i, collected))
        .collect();
    if path_formulas.len() == 1 {
        return path_formulas.pop().expect("one element");
    }
    let args = wrap(tree, sequence, "or", path_formulas);
    Formula::new(Connective::Or, args).expect("two or more paths")
}

/// AND-joins the formulas collected along one path. A path that collected
/// nothing makes its sequence certain.
fn join_collected(tree: &str, sequence: &str, path: usize, mut collected: Vec<Formula>) -> Formula {
    match collected.len() {
        0 => {
            let always = Arc::new(HouseEvent::new(
                format!("{tree}:{sequence}:certain"),
                true,
            ));
            Formula::new(Connective::Null, vec![Arg::house(&always)])
                .expect("unary pass-through")
        }
        1 => collected.pop().expect("one element"),
        _ => {
            let args = wrap(tree, sequence, &format!("path-{path}"), collected);
            Formula::new(Connective::And, args).expect("two or more collects")
        }
    }
}

/// Wraps formulas into synthetic gates so they can nest as arguments.
fn wrap(tree: &str, sequence: &str, label: &str, formulas: Vec<Formula>) -> Vec<Arg> {
    formulas
        .into_iter()
        .enumerate()
        .map(|(i, formula)| {
            let gate = Gate::new(format!("{tree}:{sequence}:{label}:{i}"), formula);
            Arg::gate(&gate)
        })
        .collect()
}
