//! Round-trip metadata handed to the serialization collaborator.
//!
//! The circuit never persists itself. It exports one [`ElementDescriptor`]
//! per element and accepts reconstruction through its ordinary construction
//! API (see [`ElementDescriptor::spec`]).

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementKind, ElementSpec, GateType, KindTag, Placement};
use crate::id::ElementId;

/// A timer delay split into whole seconds plus leftover ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDelay {
    pub seconds: u32,
    pub ticks: u32,
}

impl TimerDelay {
    /// Split `total` ticks. Whole seconds saturate at `u32::MAX`.
    pub fn from_ticks(total: usize, ticks_per_second: u32) -> Self {
        let tps = ticks_per_second.max(1) as usize;
        Self {
            seconds: u32::try_from(total / tps).unwrap_or(u32::MAX),
            // Below `tps`, so always fits.
            ticks: (total % tps) as u32,
        }
    }

    pub fn to_ticks(self, ticks_per_second: u32) -> usize {
        self.seconds as usize * ticks_per_second.max(1) as usize + self.ticks as usize
    }
}

/// Kind-specific metadata for one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: ElementId,
    pub kind: KindTag,
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<TimerDelay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luminance: Option<u8>,
    /// Elements this one feeds, self-loop included.
    #[serde(default)]
    pub outputs: Vec<ElementId>,
}

impl ElementDescriptor {
    pub fn from_element(element: &Element, ticks_per_second: u32) -> Self {
        let (gate_mode, delay, luminance) = match element.kind() {
            ElementKind::Gate(g) => (Some(g.mode_index()), None, None),
            ElementKind::Timer(t) => (
                None,
                Some(TimerDelay::from_ticks(t.delay(), ticks_per_second)),
                None,
            ),
            ElementKind::Output { luminance } => (None, None, Some(*luminance)),
            ElementKind::Button | ElementKind::Switch => (None, None, None),
        };
        Self {
            id: element.id(),
            kind: element.kind().tag(),
            placement: element.placement(),
            gate_mode,
            delay,
            luminance,
            outputs: element.outputs().iter().copied().collect(),
        }
    }

    /// Rebuild the construction spec. Returns `None` if a gate descriptor
    /// carries a mode index outside the known range.
    pub fn spec(&self, ticks_per_second: u32) -> Option<ElementSpec> {
        let spec = match self.kind {
            KindTag::Gate => ElementSpec::Gate(GateType::from_mode_index(self.gate_mode?)?),
            KindTag::Timer => ElementSpec::Timer {
                delay: self
                    .delay
                    .map_or(0, |d| d.to_ticks(ticks_per_second)),
            },
            KindTag::Button => ElementSpec::Button,
            KindTag::Switch => ElementSpec::Switch,
            KindTag::Output => ElementSpec::Output {
                luminance: self.luminance.unwrap_or(0),
            },
        };
        Some(spec)
    }
}
