//! Structural invariant checks over a circuit graph.
//!
//! Used by tests and debug tooling to confirm that incremental counter
//! maintenance and adjacency bookkeeping agree with a full recount.

use crate::graph::CircuitGraph;
use crate::id::ElementId;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `cnt` differs from the number of inputs whose value is true.
    CounterMismatch {
        element: ElementId,
        cnt: u32,
        expected: u32,
    },
    /// `next_cnt` differs from `cnt` between ticks.
    ScratchCounterDrift {
        element: ElementId,
        cnt: u32,
        next_cnt: u32,
    },
    /// `src` lists `dst` as an output but `dst` does not list `src` as an
    /// input, or the other way round.
    AsymmetricAdjacency { src: ElementId, dst: ElementId },
    /// Wires run both ways between two distinct elements.
    AntiParallelWire { a: ElementId, b: ElementId },
    /// An adjacency set names an element that no longer exists.
    DanglingReference { element: ElementId, missing: ElementId },
}

/// Check every element and return all violations found.
pub fn check_graph(graph: &CircuitGraph) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for element in graph.iter() {
        let id = element.id();
        let mut expected = 0;
        for &src in element.inputs() {
            match graph.get(src) {
                Some(s) => {
                    if s.value() {
                        expected += 1;
                    }
                    if !s.outputs().contains(&id) {
                        violations.push(InvariantViolation::AsymmetricAdjacency { src, dst: id });
                    }
                }
                None => violations.push(InvariantViolation::DanglingReference {
                    element: id,
                    missing: src,
                }),
            }
        }
        if element.cnt() != expected {
            violations.push(InvariantViolation::CounterMismatch {
                element: id,
                cnt: element.cnt(),
                expected,
            });
        }
        if element.cnt() != element.next_cnt() {
            violations.push(InvariantViolation::ScratchCounterDrift {
                element: id,
                cnt: element.cnt(),
                next_cnt: element.next_cnt(),
            });
        }

        for &dst in element.outputs() {
            match graph.get(dst) {
                Some(d) => {
                    if !d.inputs().contains(&id) {
                        violations.push(InvariantViolation::AsymmetricAdjacency { src: id, dst });
                    }
                    if dst != id && id < dst && element.inputs().contains(&dst) {
                        violations.push(InvariantViolation::AntiParallelWire { a: id, b: dst });
                    }
                }
                None => violations.push(InvariantViolation::DanglingReference {
                    element: id,
                    missing: dst,
                }),
            }
        }
    }

    violations
}
