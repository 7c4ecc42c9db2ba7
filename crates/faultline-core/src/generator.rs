//! Deterministic synthetic fault-tree generation for tests and benches.
//!
//! Builds coherent (negation-free) random trees of a requested size from a
//! seed, in the spirit of the classic fault-tree generator scripts used to
//! benchmark PRA engines. The same seed always yields the same tree.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use faultline_model::{Arg, BasicEvent, Connective, Expression, Formula, Gate};

/// Shape parameters of the generated tree.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub num_basic_events: usize,
    pub num_gates: usize,
    /// Children per gate, drawn from 2..=max_children.
    pub max_children: usize,
    /// Cap on gate-type children per gate. At 1, AND gates never multiply
    /// two sub-counts, so the tree's cut-set count stays linear in its
    /// size.
    pub max_gate_children: usize,
    /// Basic-event probabilities are drawn uniformly from this range.
    pub min_probability: f64,
    pub max_probability: f64,
    /// Weight of AND gates; the rest become OR gates.
    pub and_ratio: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_basic_events: 200,
            num_gates: 80,
            max_children: 4,
            max_gate_children: 2,
            min_probability: 1e-3,
            max_probability: 5e-2,
            and_ratio: 0.4,
            seed: 0,
        }
    }
}

/// Generates a random coherent fault tree; returns the top gate and the
/// basic events in creation order.
pub fn generate(config: &GeneratorConfig) -> (Arc<Gate>, Vec<Arc<BasicEvent>>) {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let events: Vec<Arc<BasicEvent>> = (0..config.num_basic_events)
        .map(|i| {
            let p = rng.gen_range(config.min_probability..config.max_probability);
            Arc::new(BasicEvent::new(format!("e{i:03}"), Expression::constant(p)))
        })
        .collect();

    // Bottom-up: every new gate draws children from events and existing
    // gates; unconsumed nodes are swept into the top gate at the end.
    let mut gates: Vec<Arc<Gate>> = Vec::with_capacity(config.num_gates);
    let mut event_used = vec![false; events.len()];
    let mut gate_used = vec![false; config.num_gates];

    for g in 0..config.num_gates.saturating_sub(1) {
        let arity = rng.gen_range(2..=config.max_children.max(2));
        let mut args = Vec::with_capacity(arity);
        let mut chosen_events = Vec::new();
        let mut chosen_gates = Vec::new();
        for _ in 0..arity {
            // Prefer events over nested gates two to one.
            let pick_gate = !gates.is_empty()
                && chosen_gates.len() < config.max_gate_children
                && rng.gen_bool(1.0 / 3.0);
            if pick_gate {
                let index = rng.gen_range(0..gates.len());
                if chosen_gates.contains(&index) {
                    continue;
                }
                chosen_gates.push(index);
                gate_used[index] = true;
                args.push(Arg::gate(&gates[index]));
            } else {
                let index = rng.gen_range(0..events.len());
                if chosen_events.contains(&index) {
                    continue;
                }
                chosen_events.push(index);
                event_used[index] = true;
                args.push(Arg::basic(&events[index]));
            }
        }
        if args.len() < 2 {
            // Duplicate draws collapsed the argument list; pad with a
            // fresh event pick.
            let index = (0..events.len())
                .find(|i| !chosen_events.contains(i))
                .unwrap_or(0);
            event_used[index] = true;
            args.push(Arg::basic(&events[index]));
        }
        let connective = if rng.gen_bool(config.and_ratio) {
            Connective::And
        } else {
            Connective::Or
        };
        let formula = Formula::new(connective, args).expect("at least two arguments");
        gates.push(Gate::new(format!("g{g:03}"), formula));
    }

    // The top gate collects every orphan so the whole tree is reachable.
    let mut top_args: Vec<Arg> = Vec::new();
    for (index, gate) in gates.iter().enumerate() {
        if !gate_used[index] {
            top_args.push(Arg::gate(gate));
        }
    }
    for (index, event) in events.iter().enumerate() {
        if !event_used[index] {
            top_args.push(Arg::basic(event));
        }
    }
    if top_args.len() < 2 {
        top_args.push(Arg::basic(&events[0]));
    }
    let top = Gate::new("top", Formula::new(Connective::Or, top_args).expect("orphans"));
    (top, events)
}
