//! Fault-tree containers.

use std::collections::HashSet;
use std::sync::Arc;

use crate::event::{ArgEvent, Gate};

/// A named collection of gates with designated top gate(s).
///
/// The parser registers every gate of the tree; top gates are the ones no
/// other registered gate references.
#[derive(Debug, Default)]
pub struct FaultTree {
    id: String,
    gates: Vec<Arc<Gate>>,
}

impl FaultTree {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gates: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_gate(&mut self, gate: Arc<Gate>) {
        self.gates.push(gate);
    }

    pub fn gates(&self) -> &[Arc<Gate>] {
        &self.gates
    }

    /// Gates not referenced by any other gate of this tree, in registration
    /// order.
    pub fn top_gates(&self) -> Vec<Arc<Gate>> {
        let mut referenced: HashSet<*const Gate> = HashSet::new();
        for gate in &self.gates {
            for arg in gate.formula().args() {
                if let ArgEvent::Gate(child) = &arg.event {
                    referenced.insert(Arc::as_ptr(child));
                }
            }
        }
        self.gates
            .iter()
            .filter(|g| !referenced.contains(&Arc::as_ptr(g)))
            .cloned()
            .collect()
    }
}
