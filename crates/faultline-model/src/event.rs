//! Events and Boolean formulas.
//!
//! A fault tree is a DAG of gates over basic events (stochastic leaves) and
//! house events (deterministic constants). Formula arguments carry their own
//! negation flag, so `NOT` appears both as a connective and as a literal
//! marker; the analysis layer flattens the distinction into signed indices.

use std::sync::Arc;

use crate::expression::Expression;
use crate::{ModelError, ModelResult};

/// Logical connective of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    /// At-least-k-out-of-n, a.k.a. vote gate. The `k` lives in
    /// [`Formula::min_number`].
    AtLeast,
    Xor,
    Not,
    Nand,
    Nor,
    /// Unary pass-through.
    Null,
    Implies,
    Iff,
}

impl Connective {
    /// Lower bound on the number of arguments.
    fn min_args(&self) -> usize {
        match self {
            Connective::Not | Connective::Null => 1,
            Connective::Implies | Connective::Iff => 2,
            _ => 2,
        }
    }

    /// Upper bound on the number of arguments, if any.
    fn max_args(&self) -> Option<usize> {
        match self {
            Connective::Not | Connective::Null => Some(1),
            Connective::Implies | Connective::Iff => Some(2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Connective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Connective::And => "and",
            Connective::Or => "or",
            Connective::AtLeast => "atleast",
            Connective::Xor => "xor",
            Connective::Not => "not",
            Connective::Nand => "nand",
            Connective::Nor => "nor",
            Connective::Null => "null",
            Connective::Implies => "implies",
            Connective::Iff => "iff",
        };
        f.write_str(name)
    }
}

/// A stochastic leaf of the fault tree.
#[derive(Debug)]
pub struct BasicEvent {
    id: String,
    /// Probability model; absent for purely qualitative inputs.
    expression: Option<Arc<Expression>>,
}

impl BasicEvent {
    pub fn new(id: impl Into<String>, expression: Arc<Expression>) -> Self {
        Self {
            id: id.into(),
            expression: Some(expression),
        }
    }

    /// An event without a probability model. Quantitative analyses reject
    /// models containing such events.
    pub fn undeveloped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> Option<&Arc<Expression>> {
        self.expression.as_ref()
    }
}

/// A deterministic Boolean constant leaf.
#[derive(Debug)]
pub struct HouseEvent {
    id: String,
    state: bool,
}

impl HouseEvent {
    pub fn new(id: impl Into<String>, state: bool) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> bool {
        self.state
    }
}

/// The referent of a formula argument.
#[derive(Debug, Clone)]
pub enum ArgEvent {
    Basic(Arc<BasicEvent>),
    House(Arc<HouseEvent>),
    Gate(Arc<Gate>),
}

impl ArgEvent {
    pub fn id(&self) -> &str {
        match self {
            ArgEvent::Basic(e) => e.id(),
            ArgEvent::House(e) => e.id(),
            ArgEvent::Gate(g) => g.id(),
        }
    }
}

/// A formula argument: an event or a gate, possibly complemented.
#[derive(Debug, Clone)]
pub struct Arg {
    pub negated: bool,
    pub event: ArgEvent,
}

impl Arg {
    pub fn new(event: ArgEvent) -> Self {
        Self {
            negated: false,
            event,
        }
    }

    pub fn complement(event: ArgEvent) -> Self {
        Self {
            negated: true,
            event,
        }
    }

    pub fn basic(event: &Arc<BasicEvent>) -> Self {
        Self::new(ArgEvent::Basic(event.clone()))
    }

    pub fn house(event: &Arc<HouseEvent>) -> Self {
        Self::new(ArgEvent::House(event.clone()))
    }

    pub fn gate(gate: &Arc<Gate>) -> Self {
        Self::new(ArgEvent::Gate(gate.clone()))
    }

    pub fn not_basic(event: &Arc<BasicEvent>) -> Self {
        Self::complement(ArgEvent::Basic(event.clone()))
    }

    pub fn not_gate(gate: &Arc<Gate>) -> Self {
        Self::complement(ArgEvent::Gate(gate.clone()))
    }
}

/// A Boolean connective applied to a list of arguments.
#[derive(Debug, Clone)]
pub struct Formula {
    connective: Connective,
    /// The `k` of an `AtLeast` connective; `None` otherwise.
    min_number: Option<u32>,
    args: Vec<Arg>,
}

impl Formula {
    /// Builds a formula and checks the connective's arity rules.
    pub fn new(connective: Connective, args: Vec<Arg>) -> ModelResult<Self> {
        Self::build(connective, None, args)
    }

    /// Builds an `AtLeast` formula with the given minimum number.
    pub fn atleast(min_number: u32, args: Vec<Arg>) -> ModelResult<Self> {
        Self::build(Connective::AtLeast, Some(min_number), args)
    }

    fn build(
        connective: Connective,
        min_number: Option<u32>,
        args: Vec<Arg>,
    ) -> ModelResult<Self> {
        let id = || format!("<{connective}>");
        if args.len() < connective.min_args() {
            return Err(ModelError::InvalidFormula {
                id: id(),
                message: format!(
                    "{} requires at least {} arguments, got {}",
                    connective,
                    connective.min_args(),
                    args.len()
                ),
            });
        }
        if let Some(max) = connective.max_args() {
            if args.len() > max {
                return Err(ModelError::InvalidFormula {
                    id: id(),
                    message: format!(
                        "{} takes at most {} arguments, got {}",
                        connective,
                        max,
                        args.len()
                    ),
                });
            }
        }
        match (connective, min_number) {
            (Connective::AtLeast, Some(k)) => {
                if k < 1 || k as usize > args.len() {
                    return Err(ModelError::InvalidMinNumber {
                        id: id(),
                        min_number: k,
                        num_args: args.len(),
                    });
                }
            }
            (Connective::AtLeast, None) => {
                return Err(ModelError::InvalidFormula {
                    id: id(),
                    message: "atleast requires a min number".into(),
                });
            }
            (_, Some(_)) => {
                return Err(ModelError::InvalidFormula {
                    id: id(),
                    message: format!("{connective} does not take a min number"),
                });
            }
            _ => {}
        }
        Ok(Self {
            connective,
            min_number,
            args,
        })
    }

    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn min_number(&self) -> Option<u32> {
        self.min_number
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Applies `f` to every basic-event reference of this formula,
    /// descending through gates. A shared gate is descended into once, so
    /// the walk is linear in the DAG; callers needing set semantics still
    /// deduplicate on the event id.
    pub fn visit_basic_events(&self, f: &mut impl FnMut(&Arc<BasicEvent>)) {
        let mut visited = std::collections::HashSet::new();
        self.visit_inner(f, &mut visited);
    }

    fn visit_inner(
        &self,
        f: &mut impl FnMut(&Arc<BasicEvent>),
        visited: &mut std::collections::HashSet<*const Gate>,
    ) {
        for arg in &self.args {
            match &arg.event {
                ArgEvent::Basic(e) => f(e),
                ArgEvent::House(_) => {}
                ArgEvent::Gate(g) => {
                    if visited.insert(Arc::as_ptr(g)) {
                        g.formula().visit_inner(f, visited);
                    }
                }
            }
        }
    }
}

/// A named gate wrapping a formula.
#[derive(Debug)]
pub struct Gate {
    id: String,
    formula: Formula,
}

impl Gate {
    pub fn new(id: impl Into<String>, formula: Formula) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            formula,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    fn event(id: &str, p: f64) -> Arc<BasicEvent> {
        Arc::new(BasicEvent::new(id, Arc::new(Expression::Constant(p))))
    }

    #[test]
    fn test_formula_arity_rules() {
        let a = event("a", 0.1);
        assert!(Formula::new(Connective::And, vec![Arg::basic(&a)]).is_err());
        assert!(Formula::new(Connective::Not, vec![Arg::basic(&a)]).is_ok());
        let b = event("b", 0.2);
        assert!(Formula::new(
            Connective::Not,
            vec![Arg::basic(&a), Arg::basic(&b)]
        )
        .is_err());
    }

    #[test]
    fn test_atleast_min_number_bounds() {
        let args = || {
            vec![
                Arg::basic(&event("a", 0.1)),
                Arg::basic(&event("b", 0.2)),
                Arg::basic(&event("c", 0.3)),
            ]
        };
        assert!(Formula::atleast(0, args()).is_err());
        assert!(Formula::atleast(4, args()).is_err());
        assert!(Formula::atleast(2, args()).is_ok());
        assert!(Formula::new(Connective::And, args())
            .unwrap()
            .min_number()
            .is_none());
    }

    #[test]
    fn test_visit_basic_events_descends_gates() {
        let a = event("a", 0.1);
        let b = event("b", 0.2);
        let inner = Gate::new(
            "inner",
            Formula::new(Connective::Or, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap(),
        );
        let top = Formula::new(
            Connective::And,
            vec![Arg::gate(&inner), Arg::not_basic(&a)],
        )
        .unwrap();
        let mut seen = Vec::new();
        top.visit_basic_events(&mut |e| seen.push(e.id().to_string()));
        assert_eq!(seen, vec!["a", "b", "a"]);
    }
}
