//! The evaluation engine: owns the circuit graph and advances it one tick at
//! a time.
//!
//! # Two-Phase Step
//!
//! Each `step()` runs:
//! 1. **Evaluate** -- every element computes `next_value` from the counter
//!    committed at the end of the previous tick. Elements whose value would
//!    change are queued.
//! 2. **Commit** -- queued elements take their new value and push a `+1`/`-1`
//!    into each downstream element's `next_cnt`. Once the queue is drained,
//!    every touched element latches `next_cnt` into `cnt`.
//!
//! No element observes another element's change within the same tick, so
//! the result does not depend on iteration order.

use tracing::{debug, trace};

use crate::config::CircuitConfig;
use crate::descriptor::ElementDescriptor;
use crate::element::{Element, ElementKind, ElementSpec, Placement};
use crate::graph::CircuitGraph;
use crate::id::ElementId;
use crate::sim::{SimState, StateHash, StepSummary};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("element {0} is not a button or switch")]
    NotAnInput(ElementId),
    #[error("element {0} is not a timer")]
    NotATimer(ElementId),
    #[error("timer {element} delay {delay} reaches past its {capacity}-slot buffer")]
    DelayOutOfRange {
        element: ElementId,
        delay: usize,
        capacity: usize,
    },
}

// ---------------------------------------------------------------------------
// Circuit
// ---------------------------------------------------------------------------

/// A logic circuit and its evaluation state.
///
/// Single-owner and synchronous: the host calls [`step`](Circuit::step) once
/// per tick and serializes it with every mutation.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    graph: CircuitGraph,
    config: CircuitConfig,
    sim_state: SimState,
    /// Elements whose value changes this tick.
    commit_queue: Vec<ElementId>,
    /// Elements whose `next_cnt` moved during commit.
    latch_queue: Vec<ElementId>,
}

impl Circuit {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    pub fn graph(&self) -> &CircuitGraph {
        &self.graph
    }

    pub fn tick(&self) -> u64 {
        self.sim_state.tick
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Add an element built from `spec`.
    pub fn add_element(&mut self, spec: ElementSpec, placement: Placement) -> ElementId {
        let kind = spec.build(self.config.timer_capacity);
        self.graph.insert(kind, placement)
    }

    /// Remove an element and its incident wires.
    pub fn remove_element(&mut self, id: ElementId) -> Option<Element> {
        self.graph.remove(id)
    }

    pub fn add_wire(&mut self, src: ElementId, dst: ElementId) -> bool {
        self.graph.add_wire(src, dst)
    }

    pub fn remove_wire(&mut self, src: ElementId, dst: ElementId) -> bool {
        self.graph.remove_wire(src, dst)
    }

    pub fn remove_wires_for_element(&mut self, id: ElementId) -> usize {
        self.graph.remove_wires_for_element(id)
    }

    /// Update an element's placement in place.
    pub fn set_placement(&mut self, id: ElementId, placement: Placement) -> Result<(), CircuitError> {
        let element = self
            .graph
            .get_mut(id)
            .ok_or(CircuitError::ElementNotFound(id))?;
        element.placement = placement;
        Ok(())
    }

    /// Change a timer's read offset. The value is not checked against the
    /// buffer; an out-of-range delay fails on the next `step`.
    pub fn set_delay(&mut self, id: ElementId, delay: usize) -> Result<(), CircuitError> {
        let element = self
            .graph
            .get_mut(id)
            .ok_or(CircuitError::ElementNotFound(id))?;
        match &mut element.kind {
            ElementKind::Timer(timer) => {
                timer.set_delay(delay);
                Ok(())
            }
            _ => Err(CircuitError::NotATimer(id)),
        }
    }

    // -----------------------------------------------------------------------
    // External input
    // -----------------------------------------------------------------------

    /// Drive a button or switch. Counter changes reach its direct outputs
    /// immediately rather than at the next tick.
    pub fn set_value(&mut self, id: ElementId, value: bool) -> Result<(), CircuitError> {
        let element = self
            .graph
            .get_mut(id)
            .ok_or(CircuitError::ElementNotFound(id))?;
        if !element.kind.is_input() {
            return Err(CircuitError::NotAnInput(id));
        }
        if element.value == value {
            return Ok(());
        }
        self.drive(id, value);
        Ok(())
    }

    /// Set an input's value and shift its outputs' counters. The caller has
    /// checked that `id` is a live input whose value differs.
    fn drive(&mut self, id: ElementId, value: bool) {
        let Some(element) = self.graph.get_mut(id) else {
            return;
        };
        element.value = value;
        element.next_value = value;

        let outputs = std::mem::take(&mut element.outputs);
        for &out in &outputs {
            if let Some(dst) = self.graph.get_mut(out) {
                dst.shift_counters(value);
            }
        }
        if let Some(element) = self.graph.get_mut(id) {
            element.outputs = outputs;
        }
    }

    /// Drive a held input low through the counter path.
    fn release_input(&mut self, id: ElementId) {
        if self.graph.get(id).is_some_and(|e| e.kind.is_input() && e.value) {
            self.drive(id, false);
        }
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance one tick.
    ///
    /// Fails only when a timer's delay reaches past its buffer. Delays are
    /// checked before anything is evaluated, so a failed step leaves the
    /// circuit exactly as it was.
    pub fn step(&mut self) -> Result<StepSummary, CircuitError> {
        self.check_delays()?;
        self.commit_queue.clear();
        self.latch_queue.clear();

        self.phase_evaluate()?;
        let changed = self.phase_commit();

        self.sim_state.tick += 1;
        trace!(tick = self.sim_state.tick, changed, "circuit step");
        Ok(StepSummary {
            tick: self.sim_state.tick,
            changed,
        })
    }

    fn check_delays(&self) -> Result<(), CircuitError> {
        for element in self.graph.iter() {
            if let ElementKind::Timer(timer) = &element.kind {
                if !timer.delay_fits() {
                    return Err(CircuitError::DelayOutOfRange {
                        element: element.id,
                        delay: timer.delay(),
                        capacity: timer.capacity(),
                    });
                }
            }
        }
        Ok(())
    }

    fn phase_evaluate(&mut self) -> Result<(), CircuitError> {
        for element in self.graph.iter_mut() {
            let next = element.evaluate().map_err(|_| {
                let (delay, capacity) = match &element.kind {
                    ElementKind::Timer(t) => (t.delay(), t.capacity()),
                    _ => (0, 0),
                };
                CircuitError::DelayOutOfRange {
                    element: element.id,
                    delay,
                    capacity,
                }
            })?;
            element.next_value = next;
            if next != element.value {
                self.commit_queue.push(element.id);
            }
        }
        Ok(())
    }

    fn phase_commit(&mut self) -> usize {
        let changed = self.commit_queue.len();

        for &id in &self.commit_queue {
            let Some(element) = self.graph.get_mut(id) else {
                continue;
            };
            element.value = element.next_value;
            let rising = element.value;
            let outputs = std::mem::take(&mut element.outputs);

            for &out in &outputs {
                let Some(dst) = self.graph.get_mut(out) else {
                    continue;
                };
                if rising {
                    dst.next_cnt += 1;
                } else {
                    dst.next_cnt -= 1;
                }
                if !dst.latch_pending {
                    dst.latch_pending = true;
                    self.latch_queue.push(out);
                }
            }

            if let Some(element) = self.graph.get_mut(id) {
                element.outputs = outputs;
            }
        }

        for &id in &self.latch_queue {
            if let Some(element) = self.graph.get_mut(id) {
                element.cnt = element.next_cnt;
                element.latch_pending = false;
            }
        }

        changed
    }

    /// Elements that changed value during the most recent step.
    pub fn last_changed(&self) -> &[ElementId] {
        &self.commit_queue
    }

    // -----------------------------------------------------------------------
    // Bulk state changes
    // -----------------------------------------------------------------------

    /// Force every value low. Inputs are released through the same counter
    /// path as [`set_value`](Circuit::set_value) so counters stay consistent.
    pub fn reset(&mut self) {
        let inputs: Vec<ElementId> = self
            .graph
            .iter()
            .filter(|e| e.kind.is_input() && e.value)
            .map(|e| e.id)
            .collect();
        for id in inputs {
            self.release_input(id);
        }

        for element in self.graph.iter_mut() {
            element.value = false;
            element.next_value = false;
            element.cnt = 0;
            element.next_cnt = 0;
            element.latch_pending = false;
            if let ElementKind::Timer(timer) = &mut element.kind {
                timer.clear();
            }
        }
        self.commit_queue.clear();
        self.latch_queue.clear();
        self.sim_state = SimState::new();
        debug!(elements = self.graph.len(), "circuit reset");
    }

    /// Drop every element and wire and restart ids at zero.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.commit_queue.clear();
        self.latch_queue.clear();
        self.sim_state = SimState::new();
        debug!("circuit cleared");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.graph.get(id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.graph.iter()
    }

    pub fn value(&self, id: ElementId) -> Option<bool> {
        self.graph.get(id).map(|e| e.value)
    }

    pub fn element_count(&self) -> usize {
        self.graph.len()
    }

    pub fn wire_count(&self) -> usize {
        self.graph.wire_count()
    }

    pub fn descriptor(&self, id: ElementId) -> Option<ElementDescriptor> {
        self.graph
            .get(id)
            .map(|e| ElementDescriptor::from_element(e, self.config.ticks_per_second))
    }

    /// Descriptors for every element in id order.
    pub fn descriptors(&self) -> Vec<ElementDescriptor> {
        self.graph
            .iter()
            .map(|e| ElementDescriptor::from_element(e, self.config.ticks_per_second))
            .collect()
    }

    /// Hash of the tick counter and every element's id, value and counter.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);
        for element in self.graph.iter() {
            h.write_u32(element.id.0);
            h.write_bool(element.value);
            h.write_u32(element.cnt);
        }
        h.finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
