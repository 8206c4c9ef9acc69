//! Element kinds and their per-tick evaluation rules.
//!
//! Every element carries the same counting state (`value`, `next_value`,
//! `cnt`, `next_cnt`) and the two dual adjacency sets. Kind-specific behavior
//! lives in [`ElementKind`] and is dispatched by [`Element::evaluate`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bitbuf::{BitBuffer, BitBufferError};
use crate::id::ElementId;

// ---------------------------------------------------------------------------
// Gate types
// ---------------------------------------------------------------------------

/// Boolean function computed by a gate from its fan-in counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateType {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    /// XOR wired through its own self-loop; holds its value between pulses.
    Toggle,
}

impl GateType {
    /// All gate types in mode-index order.
    pub const ALL: [GateType; 7] = [
        GateType::And,
        GateType::Or,
        GateType::Xor,
        GateType::Nand,
        GateType::Nor,
        GateType::Xnor,
        GateType::Toggle,
    ];

    /// Index used by the serialization collaborator.
    pub fn mode_index(self) -> u8 {
        match self {
            GateType::And => 0,
            GateType::Or => 1,
            GateType::Xor => 2,
            GateType::Nand => 3,
            GateType::Nor => 4,
            GateType::Xnor => 5,
            GateType::Toggle => 6,
        }
    }

    pub fn from_mode_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "and" => Some(GateType::And),
            "or" => Some(GateType::Or),
            "xor" => Some(GateType::Xor),
            "nand" => Some(GateType::Nand),
            "nor" => Some(GateType::Nor),
            "xnor" => Some(GateType::Xnor),
            "toggle" => Some(GateType::Toggle),
            _ => None,
        }
    }

    /// Evaluate with `high` true inputs out of `fan_in`.
    ///
    /// A gate with no inputs is always false, including NAND, NOR and XNOR.
    pub fn evaluate(self, high: u32, fan_in: usize) -> bool {
        if fan_in == 0 {
            return false;
        }
        let all = high as usize == fan_in;
        match self {
            GateType::And => all,
            GateType::Or => high > 0,
            GateType::Xor | GateType::Toggle => high % 2 == 1,
            GateType::Nand => !all,
            GateType::Nor => high == 0,
            GateType::Xnor => high % 2 == 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A delay line: a shift register read `delay` ticks behind its write head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    delay: usize,
    buffer: BitBuffer,
}

impl Timer {
    pub fn new(delay: usize, capacity: usize) -> Self {
        Self {
            delay,
            buffer: BitBuffer::new(capacity),
        }
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Change the read offset. The buffer is never resized.
    pub fn set_delay(&mut self, delay: usize) {
        self.delay = delay;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// True if the read offset lies inside the buffer.
    pub fn delay_fits(&self) -> bool {
        self.delay < self.buffer.capacity()
    }

    /// Shift in `input` and return the bit `delay` ticks behind it. An
    /// out-of-range delay fails before anything is shifted in.
    pub fn advance(&mut self, input: bool) -> Result<bool, BitBufferError> {
        if !self.delay_fits() {
            return Err(BitBufferError::OutOfRange {
                offset: self.delay,
                capacity: self.buffer.capacity(),
            });
        }
        self.buffer.push(input);
        self.buffer.read_back(self.delay)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Discriminant without payload. Used for lookups by name and in descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Gate,
    Timer,
    Button,
    Switch,
    Output,
}

impl KindTag {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gate" => Some(KindTag::Gate),
            "timer" => Some(KindTag::Timer),
            "button" => Some(KindTag::Button),
            "switch" => Some(KindTag::Switch),
            "output" => Some(KindTag::Output),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KindTag::Gate => "gate",
            KindTag::Timer => "timer",
            KindTag::Button => "button",
            KindTag::Switch => "switch",
            KindTag::Output => "output",
        }
    }
}

/// Kind-specific element state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Gate(GateType),
    Timer(Timer),
    /// Momentary input: true for the tick after it is pressed.
    Button,
    /// Latching input: holds whatever was last set.
    Switch,
    /// Passive sink. Luminance is cosmetic.
    Output { luminance: u8 },
}

impl ElementKind {
    pub fn tag(&self) -> KindTag {
        match self {
            ElementKind::Gate(_) => KindTag::Gate,
            ElementKind::Timer(_) => KindTag::Timer,
            ElementKind::Button => KindTag::Button,
            ElementKind::Switch => KindTag::Switch,
            ElementKind::Output { .. } => KindTag::Output,
        }
    }

    /// Button and Switch are driven from outside the tick loop.
    pub fn is_input(&self) -> bool {
        matches!(self, ElementKind::Button | ElementKind::Switch)
    }
}

/// What to build. Converted into an [`ElementKind`] by the circuit, which
/// supplies the timer buffer capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementSpec {
    Gate(GateType),
    Timer { delay: usize },
    Button,
    Switch,
    Output { luminance: u8 },
}

impl ElementSpec {
    /// Resolve a kind name plus loosely-typed parameters. Returns `None` for
    /// an unknown kind or an invalid gate mode.
    pub fn from_name(kind: &str, params: &ElementParams) -> Option<Self> {
        let spec = match KindTag::from_name(kind)? {
            KindTag::Gate => ElementSpec::Gate(GateType::from_mode_index(params.gate_mode)?),
            KindTag::Timer => ElementSpec::Timer {
                delay: params.delay,
            },
            KindTag::Button => ElementSpec::Button,
            KindTag::Switch => ElementSpec::Switch,
            KindTag::Output => ElementSpec::Output {
                luminance: params.luminance,
            },
        };
        Some(spec)
    }

    pub fn tag(&self) -> KindTag {
        match self {
            ElementSpec::Gate(_) => KindTag::Gate,
            ElementSpec::Timer { .. } => KindTag::Timer,
            ElementSpec::Button => KindTag::Button,
            ElementSpec::Switch => KindTag::Switch,
            ElementSpec::Output { .. } => KindTag::Output,
        }
    }

    pub(crate) fn build(self, timer_capacity: usize) -> ElementKind {
        match self {
            ElementSpec::Gate(g) => ElementKind::Gate(g),
            ElementSpec::Timer { delay } => ElementKind::Timer(Timer::new(delay, timer_capacity)),
            ElementSpec::Button => ElementKind::Button,
            ElementSpec::Switch => ElementKind::Switch,
            ElementSpec::Output { luminance } => ElementKind::Output { luminance },
        }
    }
}

/// Construction parameters accepted alongside a kind name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementParams {
    pub placement: Placement,
    pub gate_mode: u8,
    pub delay: usize,
    pub luminance: u8,
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Where an element sits on the canvas. Only `x` and `y` matter to the
/// runtime; the rest round-trips untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub orientation: u8,
    pub color: u32,
}

impl Placement {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A node of the circuit graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub(crate) id: ElementId,
    pub(crate) kind: ElementKind,
    pub(crate) placement: Placement,
    pub(crate) value: bool,
    pub(crate) next_value: bool,
    /// Number of inputs whose committed value is true.
    pub(crate) cnt: u32,
    /// Counter accumulated during commit, latched into `cnt` afterwards.
    pub(crate) next_cnt: u32,
    pub(crate) inputs: BTreeSet<ElementId>,
    pub(crate) outputs: BTreeSet<ElementId>,
    /// Set while this element waits for its `next_cnt` to be latched.
    #[serde(skip)]
    pub(crate) latch_pending: bool,
}

impl Element {
    pub(crate) fn new(id: ElementId, kind: ElementKind, placement: Placement) -> Self {
        Self {
            id,
            kind,
            placement,
            value: false,
            next_value: false,
            cnt: 0,
            next_cnt: 0,
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            latch_pending: false,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn next_value(&self) -> bool {
        self.next_value
    }

    pub fn cnt(&self) -> u32 {
        self.cnt
    }

    pub fn next_cnt(&self) -> u32 {
        self.next_cnt
    }

    /// Elements feeding this one.
    pub fn inputs(&self) -> &BTreeSet<ElementId> {
        &self.inputs
    }

    /// Elements this one feeds.
    pub fn outputs(&self) -> &BTreeSet<ElementId> {
        &self.outputs
    }

    pub fn has_self_loop(&self) -> bool {
        self.inputs.contains(&self.id)
    }

    /// Compute this tick's next value from the committed counter.
    ///
    /// Only timers can fail, when their delay reaches past the buffer.
    pub fn evaluate(&mut self) -> Result<bool, BitBufferError> {
        let next = match &mut self.kind {
            ElementKind::Gate(gate) => gate.evaluate(self.cnt, self.inputs.len()),
            ElementKind::Timer(timer) => timer.advance(self.cnt > 0)?,
            ElementKind::Button => false,
            ElementKind::Switch => self.value,
            ElementKind::Output { .. } => !self.inputs.is_empty() && self.cnt > 0,
        };
        Ok(next)
    }

    /// Apply a counter delta caused by an input changing outside the commit
    /// phase. Both the live and the scratch counters move together.
    pub(crate) fn shift_counters(&mut self, rising: bool) {
        if rising {
            self.cnt += 1;
            self.next_cnt += 1;
        } else {
            self.cnt -= 1;
            self.next_cnt -= 1;
        }
    }
}
