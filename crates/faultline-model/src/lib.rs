//! # Faultline Model
//!
//! In-memory domain model for probabilistic risk analysis.
//! Provides the immutable entities produced by an external model parser:
//! basic and house events, gates and formulas, parameters and probability
//! expressions, common-cause failure groups, fault trees, and event trees.
//!
//! Entities are reference counted and frozen once the model container is
//! assembled; the analysis crates only ever read them. Gate and parameter
//! graphs are acyclic by construction (arguments are owned references built
//! bottom-up); name-resolved references, such as event-tree branch targets,
//! are revalidated during analysis.

use thiserror::Error;

pub mod ccf_group;
pub mod event;
pub mod event_tree;
pub mod expression;
pub mod fault_tree;
pub mod model;

pub use ccf_group::{CcfExpansion, CcfGroup, CcfModel};
pub use event::{Arg, ArgEvent, BasicEvent, Connective, Formula, Gate, HouseEvent};
pub use event_tree::{
    Branch, EventTree, Fork, InitiatingEvent, Path, PathState, Sequence, Target,
};
pub use expression::{EvalContext, Expression, Parameter, SampleContext};
pub use fault_tree::FaultTree;
pub use model::Model;

/// Errors raised while assembling or validating a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("duplicate {kind} identifier `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("`{id}`: probability {value} is outside [0, 1]")]
    InvalidProbability { id: String, value: f64 },
    #[error("expression for `{id}`: {message}")]
    InvalidExpression { id: String, message: String },
    #[error("gate `{id}`: {message}")]
    InvalidFormula { id: String, message: String },
    #[error("atleast gate `{id}`: min number {min_number} is outside [1, {num_args}]")]
    InvalidMinNumber {
        id: String,
        min_number: u32,
        num_args: usize,
    },
    #[error("CCF group `{id}` needs at least 2 members, got {size}")]
    CcfGroupTooSmall { id: String, size: usize },
    #[error("CCF group `{id}`: {message}")]
    InvalidCcfFactors { id: String, message: String },
    #[error("event tree `{tree}`: branch reference cycle through `{chain}`")]
    BranchCycle { tree: String, chain: String },
    #[error("event tree `{tree}`: undefined branch `{branch}`")]
    UndefinedBranch { tree: String, branch: String },
    #[error("initiating event `{initiating_event}` references undefined event tree `{tree}`")]
    UndefinedEventTree {
        initiating_event: String,
        tree: String,
    },
    #[error("basic event `{id}` has no probability expression")]
    MissingProbability { id: String },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
