//! Compact integer-indexed representation of the Boolean formula under
//! analysis.
//!
//! Every node lives in one arena and is addressed by a positive index; the
//! sign of an argument index expresses negation, so sharing is explicit and
//! no owning pointers exist between nodes. Variables (basic events) occupy
//! indices `1..=num_variables`; gates and constants are allocated above
//! them. House events enter the graph as constants and are gone after
//! preprocessing.

use std::collections::HashMap;
use std::sync::Arc;

use faultline_model::{
    ArgEvent, BasicEvent, CcfExpansion, Connective as ModelConnective, EvalContext, Formula,
    ModelError, ModelResult,
};

/// A possibly-complemented variable, the unit cut sets are made of.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Literal {
    index: usize,
    complement: bool,
}

impl Literal {
    pub fn positive(index: usize) -> Self {
        Self {
            index,
            complement: false,
        }
    }

    pub fn negative(index: usize) -> Self {
        Self {
            index,
            complement: true,
        }
    }

    pub fn from_signed(signed: i32) -> Self {
        Self {
            index: signed.unsigned_abs() as usize,
            complement: signed < 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_complement(&self) -> bool {
        self.complement
    }

    pub fn signed(&self) -> i32 {
        let index = self.index as i32;
        if self.complement {
            -index
        } else {
            index
        }
    }
}

impl std::ops::Not for Literal {
    type Output = Literal;

    fn not(self) -> Literal {
        Literal {
            index: self.index,
            complement: !self.complement,
        }
    }
}

/// Gate connectives of the indexed graph. `Implies` and `Iff` are lowered
/// during construction and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    AtLeast,
    Xor,
    Not,
    Nand,
    Nor,
    Null,
}

/// A gate node: a connective over signed argument indices.
#[derive(Debug, Clone)]
pub struct GateNode {
    pub connective: Connective,
    /// The `k` of an `AtLeast` gate; 0 otherwise.
    pub min_number: u32,
    pub args: Vec<i32>,
    /// Set by module detection: the gate is the unique entry to its
    /// sub-DAG and can be analysed in isolation.
    pub module: bool,
}

impl GateNode {
    pub fn new(connective: Connective, args: Vec<i32>) -> Self {
        Self {
            connective,
            min_number: 0,
            args,
            module: false,
        }
    }

    pub fn atleast(min_number: u32, args: Vec<i32>) -> Self {
        Self {
            connective: Connective::AtLeast,
            min_number,
            args,
            module: false,
        }
    }
}

/// One arena slot.
#[derive(Debug, Clone)]
pub enum Node {
    /// Index 0 sentinel; never referenced.
    Unused,
    /// A basic event leaf.
    Variable,
    Gate(GateNode),
    Constant(bool),
}

/// The indexed Boolean graph of one analysis target.
#[derive(Debug)]
pub struct IndexedGraph {
    nodes: Vec<Node>,
    root: i32,
    num_variables: usize,
    /// `events[i]` backs variable `i + 1`.
    events: Vec<Arc<BasicEvent>>,
    /// Shared TRUE constant, allocated on first use.
    constant_one: Option<usize>,
}

impl IndexedGraph {
    /// Builds the graph for a target formula. CCF-substituted members are
    /// replaced by the OR of their combination events during construction,
    /// so the expansion is visible to every later stage.
    pub fn new(formula: &Formula, ccf: &CcfExpansion) -> Self {
        let mut events = Vec::new();
        let mut event_index: HashMap<String, usize> = HashMap::new();
        collect_variables(formula, ccf, &mut events, &mut event_index);

        let num_variables = events.len();
        let mut nodes = vec![Node::Unused];
        nodes.extend(std::iter::repeat_with(|| Node::Variable).take(num_variables));

        let mut graph = Self {
            nodes,
            root: 0,
            num_variables,
            events,
            constant_one: None,
        };
        let mut builder = Builder {
            event_index,
            gate_memo: HashMap::new(),
            ccf_memo: HashMap::new(),
        };
        graph.root = builder.convert_formula(&mut graph, formula, ccf);
        graph
    }

    pub fn root(&self) -> i32 {
        self.root
    }

    pub fn set_root(&mut self, root: i32) {
        self.root = root;
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn is_variable(&self, index: usize) -> bool {
        1 <= index && index <= self.num_variables
    }

    /// The basic event backing a variable index.
    pub fn event(&self, index: usize) -> &Arc<BasicEvent> {
        &self.events[index - 1]
    }

    pub fn events(&self) -> &[Arc<BasicEvent>] {
        &self.events
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn gate(&self, index: usize) -> &GateNode {
        match &self.nodes[index] {
            Node::Gate(gate) => gate,
            node => panic!("node {index} is not a gate: {node:?}"),
        }
    }

    pub fn gate_mut(&mut self, index: usize) -> &mut GateNode {
        match &mut self.nodes[index] {
            Node::Gate(gate) => gate,
            node => panic!("node {index} is not a gate: {node:?}"),
        }
    }

    pub fn is_gate(&self, index: usize) -> bool {
        matches!(self.nodes[index], Node::Gate(_))
    }

    pub fn constant_value(&self, index: usize) -> Option<bool> {
        match self.nodes[index] {
            Node::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Replaces a node with a constant in place; parents absorb it on the
    /// next constant-propagation pass.
    pub fn set_constant(&mut self, index: usize, value: bool) {
        self.nodes[index] = Node::Constant(value);
    }

    pub fn add_gate(&mut self, gate: GateNode) -> usize {
        self.nodes.push(Node::Gate(gate));
        self.nodes.len() - 1
    }

    /// Signed reference to the shared TRUE constant (negative for FALSE).
    pub fn constant(&mut self, value: bool) -> i32 {
        let index = match self.constant_one {
            Some(index) => index,
            None => {
                self.nodes.push(Node::Constant(true));
                let index = self.nodes.len() - 1;
                self.constant_one = Some(index);
                index
            }
        };
        if value {
            index as i32
        } else {
            -(index as i32)
        }
    }

    /// Indices of gates reachable from the root, children before parents.
    pub fn gates_postorder(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        let root = self.root.unsigned_abs() as usize;
        if self.is_gate(root) {
            self.postorder_visit(root, &mut visited, &mut order);
        }
        order
    }

    fn postorder_visit(&self, index: usize, visited: &mut [bool], order: &mut Vec<usize>) {
        if visited[index] {
            return;
        }
        visited[index] = true;
        for &arg in &self.gate(index).args {
            let child = arg.unsigned_abs() as usize;
            if self.is_gate(child) {
                self.postorder_visit(child, visited, order);
            }
        }
        order.push(index);
    }

    /// Reference counts per node over the reachable graph (the root counts
    /// as one reference).
    pub fn parent_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.nodes.len()];
        counts[self.root.unsigned_abs() as usize] += 1;
        for gate_index in self.gates_postorder() {
            for &arg in &self.gate(gate_index).args {
                counts[arg.unsigned_abs() as usize] += 1;
            }
        }
        counts
    }

    /// Count of reachable gate nodes.
    pub fn gate_count(&self) -> usize {
        self.gates_postorder().len()
    }

    /// Point probabilities per variable, index-aligned (slot 0 unused).
    /// Fails on missing expressions or out-of-range values.
    pub fn variable_probabilities(&self, ctx: &EvalContext) -> ModelResult<Vec<f64>> {
        let mut probabilities = vec![0.0; self.num_variables + 1];
        for (i, event) in self.events.iter().enumerate() {
            let expression = event.expression().ok_or_else(|| ModelError::MissingProbability {
                id: event.id().to_string(),
            })?;
            let value = expression.value(ctx);
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ModelError::InvalidProbability {
                    id: event.id().to_string(),
                    value,
                });
            }
            probabilities[i + 1] = value;
        }
        Ok(probabilities)
    }
}

/// Formula-to-graph conversion state.
struct Builder {
    event_index: HashMap<String, usize>,
    /// Model gate -> node index, to preserve DAG sharing.
    gate_memo: HashMap<*const faultline_model::Gate, i32>,
    /// CCF member id -> its substitution OR gate.
    ccf_memo: HashMap<String, i32>,
}

impl Builder {
    fn convert_formula(
        &mut self,
        graph: &mut IndexedGraph,
        formula: &Formula,
        ccf: &CcfExpansion,
    ) -> i32 {
        let args: Vec<i32> = formula
            .args()
            .iter()
            .map(|arg| {
                let index = match &arg.event {
                    ArgEvent::Basic(event) => self.convert_basic(graph, event, ccf),
                    ArgEvent::House(event) => graph.constant(event.state()),
                    ArgEvent::Gate(gate) => {
                        let key = Arc::as_ptr(gate);
                        match self.gate_memo.get(&key) {
                            Some(&index) => index,
                            None => {
                                let index = self.convert_formula(graph, gate.formula(), ccf);
                                self.gate_memo.insert(key, index);
                                index
                            }
                        }
                    }
                };
                if arg.negated {
                    -index
                } else {
                    index
                }
            })
            .collect();

        match formula.connective() {
            ModelConnective::And => graph.add_gate(GateNode::new(Connective::And, args)) as i32,
            ModelConnective::Or => graph.add_gate(GateNode::new(Connective::Or, args)) as i32,
            ModelConnective::AtLeast => {
                let k = formula.min_number().expect("validated atleast");
                graph.add_gate(GateNode::atleast(k, args)) as i32
            }
            ModelConnective::Xor => graph.add_gate(GateNode::new(Connective::Xor, args)) as i32,
            ModelConnective::Not => graph.add_gate(GateNode::new(Connective::Not, args)) as i32,
            ModelConnective::Nand => graph.add_gate(GateNode::new(Connective::Nand, args)) as i32,
            ModelConnective::Nor => graph.add_gate(GateNode::new(Connective::Nor, args)) as i32,
            ModelConnective::Null => graph.add_gate(GateNode::new(Connective::Null, args)) as i32,
            // implies(a, b) = or(-a, b)
            ModelConnective::Implies => {
                let lowered = vec![-args[0], args[1]];
                graph.add_gate(GateNode::new(Connective::Or, lowered)) as i32
            }
            // iff(a, b) = or(and(a, b), and(-a, -b))
            ModelConnective::Iff => {
                let both = graph.add_gate(GateNode::new(Connective::And, vec![args[0], args[1]]));
                let neither =
                    graph.add_gate(GateNode::new(Connective::And, vec![-args[0], -args[1]]));
                graph.add_gate(GateNode::new(
                    Connective::Or,
                    vec![both as i32, neither as i32],
                )) as i32
            }
        }
    }

    fn convert_basic(
        &mut self,
        graph: &mut IndexedGraph,
        event: &Arc<BasicEvent>,
        ccf: &CcfExpansion,
    ) -> i32 {
        if let Some(replacements) = ccf.substitution(event.id()) {
            if let Some(&index) = self.ccf_memo.get(event.id()) {
                return index;
            }
            let args: Vec<i32> = replacements
                .iter()
                .map(|e| self.event_index[e.id()] as i32)
                .collect();
            let index = graph.add_gate(GateNode::new(Connective::Or, args)) as i32;
            self.ccf_memo.insert(event.id().to_string(), index);
            return index;
        }
        self.event_index[event.id()] as i32
    }
}

/// First pass of construction: number the variables in deterministic
/// encounter order, routing CCF members through their substitutions.
fn collect_variables(
    formula: &Formula,
    ccf: &CcfExpansion,
    events: &mut Vec<Arc<BasicEvent>>,
    event_index: &mut HashMap<String, usize>,
) {
    formula.visit_basic_events(&mut |event| {
        if let Some(replacements) = ccf.substitution(event.id()) {
            for replacement in replacements {
                if !event_index.contains_key(replacement.id()) {
                    events.push(replacement.clone());
                    event_index.insert(replacement.id().to_string(), events.len());
                }
            }
        } else if !event_index.contains_key(event.id()) {
            events.push(event.clone());
            event_index.insert(event.id().to_string(), events.len());
        }
    });
}
