//! Event trees: initiating events, functional-event forks, and sequences.
//!
//! An event tree starts from an initiating event, forks on functional events
//! (success/failure/bypass paths), and terminates in named sequences. Paths
//! contribute collect-formulas that the walker in the analysis crate joins
//! into one Boolean formula per sequence. Branches may be named and reused;
//! named references are resolved by the walker, which also rejects reference
//! cycles.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::event::Formula;

/// A terminal state of an event-tree walk.
#[derive(Debug, Clone)]
pub struct Sequence {
    id: String,
}

impl Sequence {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { id: id.into() })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Outcome label of a fork path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathState {
    Success,
    Failure,
    /// The functional event is not questioned on this path; nothing is
    /// collected.
    Bypass,
}

/// Where a branch leads: a further fork, a terminal sequence, or a named
/// branch defined elsewhere in the tree.
#[derive(Debug, Clone)]
pub enum Target {
    Fork(Box<Fork>),
    Sequence(Arc<Sequence>),
    Branch(String),
}

/// One labelled path out of a fork.
#[derive(Debug, Clone)]
pub struct Path {
    pub state: PathState,
    pub branch: Branch,
}

/// A fork on a functional event.
#[derive(Debug, Clone)]
pub struct Fork {
    pub functional_event: String,
    pub paths: Vec<Path>,
}

/// A (possibly named) continuation: an optional collect-formula and a target.
#[derive(Debug, Clone)]
pub struct Branch {
    pub collect_formula: Option<Formula>,
    pub target: Target,
}

impl Branch {
    pub fn to_sequence(sequence: &Arc<Sequence>) -> Self {
        Self {
            collect_formula: None,
            target: Target::Sequence(sequence.clone()),
        }
    }

    pub fn collecting(formula: Formula, target: Target) -> Self {
        Self {
            collect_formula: Some(formula),
            target,
        }
    }
}

/// A named event tree.
#[derive(Debug)]
pub struct EventTree {
    id: String,
    initial_state: Branch,
    /// Named branches addressable from [`Target::Branch`].
    branches: IndexMap<String, Branch>,
    sequences: Vec<Arc<Sequence>>,
}

impl EventTree {
    pub fn new(id: impl Into<String>, initial_state: Branch) -> Self {
        Self {
            id: id.into(),
            initial_state,
            branches: IndexMap::new(),
            sequences: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initial_state(&self) -> &Branch {
        &self.initial_state
    }

    pub fn add_branch(&mut self, name: impl Into<String>, branch: Branch) {
        self.branches.insert(name.into(), branch);
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn add_sequence(&mut self, sequence: Arc<Sequence>) {
        self.sequences.push(sequence);
    }

    pub fn sequences(&self) -> &[Arc<Sequence>] {
        &self.sequences
    }
}

/// The event starting an event-tree scenario.
#[derive(Debug)]
pub struct InitiatingEvent {
    id: String,
    /// Name of the event tree this initiator triggers.
    event_tree: String,
}

impl InitiatingEvent {
    pub fn new(id: impl Into<String>, event_tree: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event_tree: event_tree.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_tree(&self) -> &str {
        &self.event_tree
    }
}
