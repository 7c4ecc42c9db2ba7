//! The top-level model container.
//!
//! Collects every construct of one input model and enforces identifier
//! uniqueness per namespace (events, gates, parameters) at registration
//! time. [`Model::validate`] revalidates the invariants the external parser
//! promises, so analysis never starts on a malformed model.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ccf_group::{CcfExpansion, CcfGroup};
use crate::event::{BasicEvent, Gate, HouseEvent};
use crate::event_tree::{EventTree, InitiatingEvent, Sequence};
use crate::expression::{EvalContext, Parameter};
use crate::fault_tree::FaultTree;
use crate::{ModelError, ModelResult};

/// An immutable risk-analysis model.
#[derive(Debug, Default)]
pub struct Model {
    name: String,
    basic_events: IndexMap<String, Arc<BasicEvent>>,
    house_events: IndexMap<String, Arc<HouseEvent>>,
    gates: IndexMap<String, Arc<Gate>>,
    parameters: IndexMap<String, Arc<Parameter>>,
    fault_trees: IndexMap<String, FaultTree>,
    ccf_groups: IndexMap<String, CcfGroup>,
    event_trees: IndexMap<String, EventTree>,
    initiating_events: IndexMap<String, InitiatingEvent>,
    sequences: IndexMap<String, Arc<Sequence>>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn insert<T>(
        table: &mut IndexMap<String, T>,
        kind: &'static str,
        id: String,
        value: T,
    ) -> ModelResult<()> {
        if table.contains_key(&id) {
            return Err(ModelError::DuplicateId { kind, id });
        }
        table.insert(id, value);
        Ok(())
    }

    pub fn add_basic_event(&mut self, event: Arc<BasicEvent>) -> ModelResult<()> {
        let id = event.id().to_string();
        if self.house_events.contains_key(&id) {
            return Err(ModelError::DuplicateId { kind: "event", id });
        }
        Self::insert(&mut self.basic_events, "event", id, event)
    }

    pub fn add_house_event(&mut self, event: Arc<HouseEvent>) -> ModelResult<()> {
        let id = event.id().to_string();
        if self.basic_events.contains_key(&id) {
            return Err(ModelError::DuplicateId { kind: "event", id });
        }
        Self::insert(&mut self.house_events, "event", id, event)
    }

    pub fn add_gate(&mut self, gate: Arc<Gate>) -> ModelResult<()> {
        Self::insert(&mut self.gates, "gate", gate.id().to_string(), gate)
    }

    pub fn add_parameter(&mut self, parameter: Arc<Parameter>) -> ModelResult<()> {
        Self::insert(
            &mut self.parameters,
            "parameter",
            parameter.id().to_string(),
            parameter,
        )
    }

    pub fn add_fault_tree(&mut self, tree: FaultTree) -> ModelResult<()> {
        Self::insert(&mut self.fault_trees, "fault tree", tree.id().to_string(), tree)
    }

    pub fn add_ccf_group(&mut self, group: CcfGroup) -> ModelResult<()> {
        Self::insert(&mut self.ccf_groups, "CCF group", group.id().to_string(), group)
    }

    pub fn add_event_tree(&mut self, tree: EventTree) -> ModelResult<()> {
        Self::insert(&mut self.event_trees, "event tree", tree.id().to_string(), tree)
    }

    pub fn add_initiating_event(&mut self, event: InitiatingEvent) -> ModelResult<()> {
        Self::insert(
            &mut self.initiating_events,
            "initiating event",
            event.id().to_string(),
            event,
        )
    }

    pub fn add_sequence(&mut self, sequence: Arc<Sequence>) -> ModelResult<()> {
        Self::insert(
            &mut self.sequences,
            "sequence",
            sequence.id().to_string(),
            sequence,
        )
    }

    pub fn basic_events(&self) -> impl Iterator<Item = &Arc<BasicEvent>> {
        self.basic_events.values()
    }

    pub fn basic_event(&self, id: &str) -> Option<&Arc<BasicEvent>> {
        self.basic_events.get(id)
    }

    pub fn house_events(&self) -> impl Iterator<Item = &Arc<HouseEvent>> {
        self.house_events.values()
    }

    pub fn gate(&self, id: &str) -> Option<&Arc<Gate>> {
        self.gates.get(id)
    }

    pub fn parameter(&self, id: &str) -> Option<&Arc<Parameter>> {
        self.parameters.get(id)
    }

    pub fn fault_trees(&self) -> impl Iterator<Item = &FaultTree> {
        self.fault_trees.values()
    }

    pub fn ccf_groups(&self) -> impl Iterator<Item = &CcfGroup> {
        self.ccf_groups.values()
    }

    pub fn event_tree(&self, id: &str) -> Option<&EventTree> {
        self.event_trees.get(id)
    }

    pub fn initiating_events(&self) -> impl Iterator<Item = &InitiatingEvent> {
        self.initiating_events.values()
    }

    /// Revalidates model invariants: expression domains, probability ranges,
    /// and CCF factor rules.
    pub fn validate(&self, ctx: &EvalContext) -> ModelResult<()> {
        for parameter in self.parameters.values() {
            parameter.expression().validate(parameter.id(), ctx)?;
        }
        for event in self.basic_events.values() {
            if let Some(expression) = event.expression() {
                expression.validate(event.id(), ctx)?;
                let value = expression.value(ctx);
                if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                    return Err(ModelError::InvalidProbability {
                        id: event.id().to_string(),
                        value,
                    });
                }
            }
        }
        let mut ccf_members = std::collections::HashSet::new();
        for group in self.ccf_groups.values() {
            group.validate(ctx)?;
            for member in group.members() {
                if !ccf_members.insert(member.id().to_string()) {
                    return Err(ModelError::DuplicateId {
                        kind: "CCF member",
                        id: member.id().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Expands every CCF group into its member substitutions.
    pub fn expand_ccf_groups(&self) -> CcfExpansion {
        let mut expansion = CcfExpansion::default();
        for group in self.ccf_groups.values() {
            expansion.merge(group.expand());
        }
        expansion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    #[test]
    fn test_duplicate_ids_rejected_per_namespace() {
        let mut model = Model::new("m");
        model
            .add_basic_event(Arc::new(BasicEvent::new("a", Expression::constant(0.1))))
            .unwrap();
        // Same namespace: basic and house events collide.
        assert!(model
            .add_house_event(Arc::new(HouseEvent::new("a", true)))
            .is_err());
        assert!(model
            .add_basic_event(Arc::new(BasicEvent::new("a", Expression::constant(0.2))))
            .is_err());
        // Parameters are a separate namespace.
        assert!(model
            .add_parameter(Parameter::new("a", Expression::constant(1.0)))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_probability() {
        let mut model = Model::new("m");
        model
            .add_basic_event(Arc::new(BasicEvent::new("a", Expression::constant(1.5))))
            .unwrap();
        let ctx = EvalContext {
            mission_time: 8760.0,
        };
        assert!(matches!(
            model.validate(&ctx),
            Err(ModelError::InvalidProbability { .. })
        ));
    }
}
