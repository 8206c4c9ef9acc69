//! The circuit runtime: a [`Circuit`] whose elements are kept in a
//! [`ChunkIndex`] consistent with their positions.
//!
//! This is the surface an editor drives. Every call that creates, moves or
//! removes an element updates both the graph and the chunk membership, so an
//! element always belongs to exactly one chunk matching its placement.

use std::collections::{BTreeMap, BTreeSet};

use circuitry_core::config::CircuitConfig;
use circuitry_core::descriptor::ElementDescriptor;
use circuitry_core::element::{Element, ElementParams, ElementSpec, Placement};
use circuitry_core::engine::{Circuit, CircuitError};
use circuitry_core::id::ElementId;
use circuitry_core::sim::StepSummary;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Chunk, ChunkConfig, ChunkIndex, ChunkKey, GridPosition};

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Configuration for a [`Runtime`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub circuit: CircuitConfig,
    pub chunks: ChunkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    #[error("descriptor {0} does not describe a valid element")]
    InvalidDescriptor(ElementId),
    #[error("descriptor {src} feeds unknown element {dst}")]
    UnknownWireTarget { src: ElementId, dst: ElementId },
}

fn position_of(placement: Placement) -> GridPosition {
    GridPosition::new(placement.x, placement.y)
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Runtime {
    circuit: Circuit,
    chunks: ChunkIndex,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            circuit: Circuit::new(config.circuit),
            chunks: ChunkIndex::new(config.chunks.chunk_size),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn chunks(&self) -> &ChunkIndex {
        &self.chunks
    }

    // -----------------------------------------------------------------------
    // Graph mutation
    // -----------------------------------------------------------------------

    pub fn add_element(&mut self, spec: ElementSpec, placement: Placement) -> ElementId {
        let id = self.circuit.add_element(spec, placement);
        self.chunks.insert(id, position_of(placement));
        id
    }

    /// Add an element by kind name. Returns `None` for an unknown kind or an
    /// invalid gate mode; nothing is created in that case.
    pub fn add_element_named(&mut self, kind: &str, params: &ElementParams) -> Option<ElementId> {
        let spec = ElementSpec::from_name(kind, params)?;
        Some(self.add_element(spec, params.placement))
    }

    /// Remove an element, its wires and its chunk membership.
    pub fn remove_element(&mut self, id: ElementId) -> Option<Element> {
        let element = self.circuit.remove_element(id)?;
        self.chunks.remove(id, position_of(element.placement()));
        Some(element)
    }

    /// Move an element and rechunk it. Returns the chunk it now lives in.
    pub fn move_element(&mut self, id: ElementId, to: GridPosition) -> Result<ChunkKey, CircuitError> {
        let placement = self
            .circuit
            .element(id)
            .ok_or(CircuitError::ElementNotFound(id))?
            .placement();
        let from = position_of(placement);
        self.circuit.set_placement(
            id,
            Placement {
                x: to.x,
                y: to.y,
                ..placement
            },
        )?;
        Ok(self.chunks.relocate(id, from, to))
    }

    pub fn add_wire(&mut self, src: ElementId, dst: ElementId) -> bool {
        self.circuit.add_wire(src, dst)
    }

    pub fn remove_wire(&mut self, src: ElementId, dst: ElementId) -> bool {
        self.circuit.remove_wire(src, dst)
    }

    pub fn remove_wires_for_element(&mut self, id: ElementId) -> usize {
        self.circuit.remove_wires_for_element(id)
    }

    pub fn set_delay(&mut self, id: ElementId, delay: usize) -> Result<(), CircuitError> {
        self.circuit.set_delay(id, delay)
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    pub fn set_value(&mut self, id: ElementId, value: bool) -> Result<(), CircuitError> {
        self.circuit.set_value(id, value)
    }

    pub fn step(&mut self) -> Result<StepSummary, CircuitError> {
        self.circuit.step()
    }

    pub fn reset(&mut self) {
        self.circuit.reset();
    }

    /// Empty the circuit and the chunk index and restart ids at zero.
    pub fn clear(&mut self) {
        self.circuit.clear();
        self.chunks.clear();
        debug!("runtime cleared");
    }

    // -----------------------------------------------------------------------
    // Spatial queries
    // -----------------------------------------------------------------------

    pub fn get_chunk(&mut self, pos: GridPosition, create_if_missing: bool) -> Option<&Chunk> {
        self.chunks.get_chunk(pos, create_if_missing)
    }

    pub fn chunk_of(&self, id: ElementId) -> Option<ChunkKey> {
        let element = self.circuit.element(id)?;
        Some(self.chunks.key_for(position_of(element.placement())))
    }

    /// Elements positioned inside the rectangle spanned by `min` and `max`
    /// (inclusive). Marks every overlapping chunk as recently used.
    pub fn query_viewport(&mut self, min: GridPosition, max: GridPosition) -> Vec<ElementId> {
        let (x0, x1) = (min.x.min(max.x), min.x.max(max.x));
        let (y0, y1) = (min.y.min(max.y), min.y.max(max.y));
        let keys = self.chunks.touch_rect(min, max);

        let mut result = Vec::new();
        for key in keys {
            let Some(chunk) = self.chunks.chunk(key) else {
                continue;
            };
            for &id in chunk.elements() {
                let Some(element) = self.circuit.element(id) else {
                    continue;
                };
                let p = element.placement();
                if p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y <= y1 {
                    result.push(id);
                }
            }
        }
        result
    }

    /// Run chunk eviction around the viewport center using the configured
    /// margin. Returns the number of chunks deleted.
    pub fn evict_chunks(&mut self, center: GridPosition) -> usize {
        self.chunks.evict(center, self.config.chunks.eviction_margin)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // -----------------------------------------------------------------------
    // Descriptors
    // -----------------------------------------------------------------------

    pub fn descriptors(&self) -> Vec<ElementDescriptor> {
        self.circuit.descriptors()
    }

    /// Rebuild descriptors through the construction API: elements first,
    /// then wires. Returns the map from descriptor ids to the new ids.
    ///
    /// Everything is validated before the first element is created, so an
    /// error leaves the runtime untouched.
    pub fn restore(
        &mut self,
        descriptors: &[ElementDescriptor],
    ) -> Result<BTreeMap<ElementId, ElementId>, RuntimeError> {
        let tps = self.config.circuit.ticks_per_second;
        let specs = descriptors
            .iter()
            .map(|d| d.spec(tps).ok_or(RuntimeError::InvalidDescriptor(d.id)))
            .collect::<Result<Vec<_>, _>>()?;

        let known: BTreeSet<ElementId> = descriptors.iter().map(|d| d.id).collect();
        for d in descriptors {
            if let Some(&dst) = d.outputs.iter().find(|dst| !known.contains(dst)) {
                return Err(RuntimeError::UnknownWireTarget { src: d.id, dst });
            }
        }

        let mut ids = BTreeMap::new();
        for (d, spec) in descriptors.iter().zip(specs) {
            ids.insert(d.id, self.add_element(spec, d.placement));
        }
        for d in descriptors {
            for dst in &d.outputs {
                if let (Some(&src), Some(&dst)) = (ids.get(&d.id), ids.get(dst)) {
                    // Toggle self-loops already exist; the repeat is a no-op.
                    self.add_wire(src, dst);
                }
            }
        }
        debug!(elements = ids.len(), "restored descriptors");
        Ok(ids)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
