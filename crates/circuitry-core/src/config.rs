use serde::{Deserialize, Serialize};

/// Default number of slots in a timer's shift register.
pub const DEFAULT_TIMER_CAPACITY: usize = 128;

/// Default tick rate used to express timer delays in seconds.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 60;

/// Tunables for the evaluation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Shift register length given to every new timer. Delays from zero to
    /// `timer_capacity - 1` need no reallocation.
    pub timer_capacity: usize,
    /// Ticks the host runs per wall-clock second. Only affects how timer
    /// delays are reported in descriptors.
    pub ticks_per_second: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            timer_capacity: DEFAULT_TIMER_CAPACITY,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}
