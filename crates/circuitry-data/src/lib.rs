//! Data loading for the circuit runtime.
//!
//! - [`loader`] reads RON, TOML or JSON files and loads a validated
//!   [`RuntimeConfig`](circuitry_spatial::RuntimeConfig).
//! - [`netlist`] validates and instantiates the layered netlists emitted by
//!   the expression compiler.

pub mod loader;
pub mod netlist;

pub use loader::{DataLoadError, Format, load_config};
pub use netlist::{Layout, NetId, Netlist, NetlistError, NetlistRecord, instantiate, load_netlist};
