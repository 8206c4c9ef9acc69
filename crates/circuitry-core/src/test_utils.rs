//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::element::{ElementSpec, GateType, Placement};
use crate::engine::Circuit;
use crate::id::ElementId;
use crate::validation::check_graph;

pub fn switch(circuit: &mut Circuit) -> ElementId {
    circuit.add_element(ElementSpec::Switch, Placement::default())
}

pub fn button(circuit: &mut Circuit) -> ElementId {
    circuit.add_element(ElementSpec::Button, Placement::default())
}

/// Add a gate fed by `inputs`.
pub fn gate(circuit: &mut Circuit, gate: GateType, inputs: &[ElementId]) -> ElementId {
    let id = circuit.add_element(ElementSpec::Gate(gate), Placement::default());
    for &src in inputs {
        circuit.add_wire(src, id);
    }
    id
}

/// Add a timer with `delay` fed by `input`.
pub fn timer(circuit: &mut Circuit, delay: usize, input: ElementId) -> ElementId {
    let id = circuit.add_element(ElementSpec::Timer { delay }, Placement::default());
    circuit.add_wire(input, id);
    id
}

/// Add an output fed by `input`.
pub fn output(circuit: &mut Circuit, input: ElementId) -> ElementId {
    let id = circuit.add_element(ElementSpec::Output { luminance: 255 }, Placement::default());
    circuit.add_wire(input, id);
    id
}

/// Build `width` parallel chains of `depth` OR gates, each fed by its own
/// switch. Returns the switches.
pub fn build_or_chains(circuit: &mut Circuit, width: usize, depth: usize) -> Vec<ElementId> {
    let mut switches = Vec::with_capacity(width);
    for _ in 0..width {
        let s = switch(circuit);
        let mut prev = s;
        for _ in 0..depth {
            prev = gate(circuit, GateType::Or, &[prev]);
        }
        switches.push(s);
    }
    switches
}

/// Panic with the full violation list if any structural invariant fails.
pub fn assert_counters_consistent(circuit: &Circuit) {
    let violations = check_graph(circuit.graph());
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}
