//! Circuitry Core -- a deterministic, synchronous logic-circuit runtime.
//!
//! This crate provides the element/wire graph, the incremental two-phase
//! evaluation engine, delay-line timers and the descriptors exchanged with
//! serialization front ends.
//!
//! # Two-Phase Tick
//!
//! Each call to [`engine::Circuit::step`] evaluates every element against the
//! counters committed by the previous tick, then commits the elements whose
//! value changed and latches the resulting counter deltas. See [`engine`].
//!
//! # Counters
//!
//! Every element keeps `cnt`, the number of its inputs that are currently
//! true. Wiring changes and external input ([`engine::Circuit::set_value`])
//! adjust it on the spot, so the graph can be edited between ticks.
//!
//! # Key Types
//!
//! - [`engine::Circuit`] -- graph plus evaluation state.
//! - [`graph::CircuitGraph`] -- element arena and wire set.
//! - [`element::ElementKind`] -- Gate, Timer, Button, Switch, Output.
//! - [`bitbuf::BitBuffer`] -- bounded shift register behind timers.
//! - [`descriptor::ElementDescriptor`] -- round-trip metadata.

pub mod bitbuf;
pub mod config;
pub mod descriptor;
pub mod element;
pub mod engine;
pub mod graph;
pub mod id;
pub mod sim;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
