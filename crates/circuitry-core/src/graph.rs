use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::element::{Element, ElementKind, GateType, Placement};
use crate::id::{ElementId, WireId};

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// A directed connection from `src` to `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub src: ElementId,
    pub dst: ElementId,
}

impl Wire {
    pub fn is_self_loop(&self) -> bool {
        self.src == self.dst
    }
}

// ---------------------------------------------------------------------------
// CircuitGraph
// ---------------------------------------------------------------------------

/// The element/wire graph.
///
/// Elements live in an arena indexed by [`ElementId`]; ids grow monotonically
/// and a removed element leaves a hole until [`clear`](CircuitGraph::clear).
/// Wires are stored in a `SlotMap` with a pair lookup so duplicate and
/// anti-parallel wires can be rejected in constant time.
///
/// Every mutation keeps each element's fan-in counter equal to the number of
/// its inputs whose committed value is true, so wiring can change between
/// ticks without a recount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitGraph {
    elements: Vec<Option<Element>>,
    wires: SlotMap<WireId, Wire>,
    wire_lookup: BTreeMap<(ElementId, ElementId), WireId>,
    live: usize,
}

impl CircuitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------------

    /// Insert an element and return its id. A toggle gate receives its
    /// self-loop as part of construction.
    pub fn insert(&mut self, kind: ElementKind, placement: Placement) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        let toggle = matches!(kind, ElementKind::Gate(GateType::Toggle));
        self.elements.push(Some(Element::new(id, kind, placement)));
        self.live += 1;
        if toggle {
            self.add_wire(id, id);
        }
        id
    }

    /// Remove an element and every wire touching it.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        if !self.contains(id) {
            return None;
        }
        self.remove_wires_for_element(id);
        let element = self.elements.get_mut(id.index())?.take()?;
        self.live -= 1;
        Some(element)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.index())?.as_mut()
    }

    /// Live elements in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.elements.iter_mut().flatten()
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.iter().map(|e| e.id)
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The id the next inserted element will receive.
    pub fn next_id(&self) -> ElementId {
        ElementId(self.elements.len() as u32)
    }

    /// Drop every element and wire and restart ids at zero.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.wires.clear();
        self.wire_lookup.clear();
        self.live = 0;
    }

    // -----------------------------------------------------------------------
    // Wires
    // -----------------------------------------------------------------------

    /// True if a wire runs from `src` to `dst` (direction-sensitive).
    pub fn has_wire(&self, src: ElementId, dst: ElementId) -> bool {
        self.wire_lookup.contains_key(&(src, dst))
    }

    /// Connect `src` to `dst`.
    ///
    /// Returns `false` without mutating anything when either end is missing
    /// or when a wire already joins the pair in either direction. A single
    /// self-loop per element is allowed.
    pub fn add_wire(&mut self, src: ElementId, dst: ElementId) -> bool {
        if !self.contains(src) || !self.contains(dst) {
            return false;
        }
        if self.has_wire(src, dst) || self.has_wire(dst, src) {
            return false;
        }

        let wire = self.wires.insert(Wire { src, dst });
        self.wire_lookup.insert((src, dst), wire);

        let src_high = self.elements[src.index()].as_ref().is_some_and(|e| e.value);
        if let Some(d) = self.get_mut(dst) {
            d.inputs.insert(src);
            if src_high {
                d.shift_counters(true);
            }
        }
        if let Some(s) = self.get_mut(src) {
            s.outputs.insert(dst);
        }
        true
    }

    /// Disconnect `src` from `dst`. Returns `false` if no such wire exists.
    pub fn remove_wire(&mut self, src: ElementId, dst: ElementId) -> bool {
        let Some(wire) = self.wire_lookup.remove(&(src, dst)) else {
            return false;
        };
        self.wires.remove(wire);

        let src_high = self.get(src).is_some_and(|e| e.value);
        if let Some(d) = self.get_mut(dst) {
            d.inputs.remove(&src);
            if src_high {
                d.shift_counters(false);
            }
        }
        if let Some(s) = self.get_mut(src) {
            s.outputs.remove(&dst);
        }
        true
    }

    /// Remove every wire where `id` is the source or the destination.
    /// Returns the number of wires removed.
    pub fn remove_wires_for_element(&mut self, id: ElementId) -> usize {
        let Some(element) = self.get(id) else {
            return 0;
        };
        let incoming: Vec<ElementId> = element.inputs.iter().copied().collect();
        let outgoing: Vec<ElementId> = element.outputs.iter().copied().collect();

        let mut removed = 0;
        for src in incoming {
            if self.remove_wire(src, id) {
                removed += 1;
            }
        }
        for dst in outgoing {
            if self.remove_wire(id, dst) {
                removed += 1;
            }
        }
        removed
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireId, &Wire)> {
        self.wires.iter()
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(id)
    }
}
