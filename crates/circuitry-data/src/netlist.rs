//! Instantiation of layered netlists produced by the expression compiler.
//!
//! A netlist is an ordered list of layers; each record may only read from
//! records in earlier layers. The one exception is a toggle record, which
//! may name itself as an input to mark its feedback loop. Records are built
//! in layer order and wired once every element exists.

use std::collections::BTreeMap;
use std::path::Path;

use circuitry_core::element::{ElementSpec, GateType, KindTag, Placement};
use circuitry_core::id::ElementId;
use circuitry_spatial::{GridPosition, Runtime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::{DataLoadError, deserialize_file};

// ===========================================================================
// Types
// ===========================================================================

/// Identifier of a record within one netlist.
pub type NetId = u32;

/// One element of a netlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetlistRecord {
    pub id: NetId,
    /// A gate name (`and`, `or`, `xor`, `nand`, `nor`, `xnor`, `toggle`) or
    /// another element kind (`switch`, `button`, `timer`, `output`).
    pub kind: String,
    #[serde(default)]
    pub inputs: Vec<NetId>,
    /// Timer delay in ticks.
    #[serde(default)]
    pub delay: usize,
    #[serde(default)]
    pub luminance: u8,
}

impl NetlistRecord {
    fn spec(&self) -> Option<ElementSpec> {
        if let Some(gate) = GateType::from_name(&self.kind) {
            return Some(ElementSpec::Gate(gate));
        }
        let spec = match KindTag::from_name(&self.kind)? {
            KindTag::Gate => return None,
            KindTag::Timer => ElementSpec::Timer { delay: self.delay },
            KindTag::Button => ElementSpec::Button,
            KindTag::Switch => ElementSpec::Switch,
            KindTag::Output => ElementSpec::Output {
                luminance: self.luminance,
            },
        };
        Some(spec)
    }
}

/// A stratified netlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netlist {
    pub layers: Vec<Vec<NetlistRecord>>,
}

impl Netlist {
    pub fn record_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }
}

/// Where instantiated elements are placed: one column per layer, one row
/// per record, `spacing` units apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub origin: GridPosition,
    pub spacing: i32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            origin: GridPosition::new(0, 0),
            spacing: 4,
        }
    }
}

/// Errors from netlist validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetlistError {
    #[error("duplicate record id {0}")]
    DuplicateId(NetId),
    #[error("record {record} has unknown kind '{kind}'")]
    UnknownKind { record: NetId, kind: String },
    #[error("record {record} reads unknown record {input}")]
    UnresolvedInput { record: NetId, input: NetId },
    #[error("record {record} in layer {layer} reads record {input} from layer {input_layer}")]
    ForwardReference {
        record: NetId,
        layer: usize,
        input: NetId,
        input_layer: usize,
    },
    #[error("record {0} reads itself but is not a toggle")]
    IllegalSelfReference(NetId),
}

// ===========================================================================
// Loading and instantiation
// ===========================================================================

/// Read a netlist from a RON, TOML or JSON file.
pub fn load_netlist(path: &Path) -> Result<Netlist, DataLoadError> {
    deserialize_file(path)
}

/// Check stratification and kinds without building anything.
pub fn validate(netlist: &Netlist) -> Result<(), NetlistError> {
    let mut layer_of: BTreeMap<NetId, usize> = BTreeMap::new();
    for (layer, records) in netlist.layers.iter().enumerate() {
        for record in records {
            if layer_of.insert(record.id, layer).is_some() {
                return Err(NetlistError::DuplicateId(record.id));
            }
        }
    }

    for (layer, records) in netlist.layers.iter().enumerate() {
        for record in records {
            let spec = record.spec().ok_or_else(|| NetlistError::UnknownKind {
                record: record.id,
                kind: record.kind.clone(),
            })?;
            for &input in &record.inputs {
                if input == record.id {
                    if spec != ElementSpec::Gate(GateType::Toggle) {
                        return Err(NetlistError::IllegalSelfReference(record.id));
                    }
                    continue;
                }
                let Some(&input_layer) = layer_of.get(&input) else {
                    return Err(NetlistError::UnresolvedInput {
                        record: record.id,
                        input,
                    });
                };
                if input_layer >= layer {
                    return Err(NetlistError::ForwardReference {
                        record: record.id,
                        layer,
                        input,
                        input_layer,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Build a netlist into `runtime`. Returns the element created for each
/// record. Nothing is built if validation fails.
pub fn instantiate(
    runtime: &mut Runtime,
    netlist: &Netlist,
    layout: Layout,
) -> Result<BTreeMap<NetId, ElementId>, NetlistError> {
    validate(netlist)?;

    let mut ids = BTreeMap::new();
    for (col, records) in netlist.layers.iter().enumerate() {
        for (row, record) in records.iter().enumerate() {
            let Some(spec) = record.spec() else {
                continue;
            };
            let placement = Placement::at(
                layout.origin.x + col as i32 * layout.spacing,
                layout.origin.y + row as i32 * layout.spacing,
            );
            ids.insert(record.id, runtime.add_element(spec, placement));
        }
    }

    for record in netlist.layers.iter().flatten() {
        let Some(&dst) = ids.get(&record.id) else {
            continue;
        };
        for input in &record.inputs {
            if *input == record.id {
                continue;
            }
            if let Some(&src) = ids.get(input) {
                runtime.add_wire(src, dst);
            }
        }
    }

    debug!(
        layers = netlist.layers.len(),
        elements = ids.len(),
        "instantiated netlist"
    );
    Ok(ids)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use circuitry_spatial::RuntimeConfig;

    fn rec(id: NetId, kind: &str, inputs: &[NetId]) -> NetlistRecord {
        NetlistRecord {
            id,
            kind: kind.to_string(),
            inputs: inputs.to_vec(),
            delay: 0,
            luminance: 0,
        }
    }

    fn half_adder() -> Netlist {
        Netlist {
            layers: vec![
                vec![rec(0, "switch", &[]), rec(1, "switch", &[])],
                vec![rec(2, "xor", &[0, 1]), rec(3, "and", &[0, 1])],
                vec![rec(4, "output", &[2]), rec(5, "output", &[3])],
            ],
        }
    }

    #[test]
    fn half_adder_instantiates_and_runs() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let ids = instantiate(&mut rt, &half_adder(), Layout::default()).unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(rt.circuit().wire_count(), 6);

        rt.set_value(ids[&0], true).unwrap();
        rt.set_value(ids[&1], true).unwrap();
        rt.step().unwrap();
        rt.step().unwrap();
        assert_eq!(rt.circuit().value(ids[&4]), Some(false));
        assert_eq!(rt.circuit().value(ids[&5]), Some(true));
    }

    #[test]
    fn layers_become_columns() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let layout = Layout {
            origin: GridPosition::new(100, 50),
            spacing: 10,
        };
        let ids = instantiate(&mut rt, &half_adder(), layout).unwrap();
        let p = rt.circuit().element(ids[&5]).unwrap().placement();
        assert_eq!((p.x, p.y), (120, 60));
    }

    #[test]
    fn toggle_self_reference_uses_builtin_loop() {
        let netlist = Netlist {
            layers: vec![
                vec![rec(0, "switch", &[])],
                vec![rec(1, "toggle", &[0, 1])],
            ],
        };
        let mut rt = Runtime::new(RuntimeConfig::default());
        let ids = instantiate(&mut rt, &netlist, Layout::default()).unwrap();
        let toggle = rt.circuit().element(ids[&1]).unwrap();
        assert!(toggle.has_self_loop());
        assert_eq!(toggle.inputs().len(), 2);
        assert_eq!(rt.circuit().wire_count(), 2);
    }

    #[test]
    fn self_reference_on_plain_gate_is_rejected() {
        let netlist = Netlist {
            layers: vec![vec![rec(0, "or", &[0])]],
        };
        assert_eq!(validate(&netlist), Err(NetlistError::IllegalSelfReference(0)));
    }

    #[test]
    fn forward_and_same_layer_references_are_rejected() {
        let netlist = Netlist {
            layers: vec![vec![rec(0, "or", &[1]), rec(1, "switch", &[])]],
        };
        assert_eq!(
            validate(&netlist),
            Err(NetlistError::ForwardReference {
                record: 0,
                layer: 0,
                input: 1,
                input_layer: 0
            })
        );
    }

    #[test]
    fn unknown_inputs_and_kinds_are_rejected() {
        let netlist = Netlist {
            layers: vec![vec![rec(0, "switch", &[])], vec![rec(1, "or", &[7])]],
        };
        assert_eq!(
            validate(&netlist),
            Err(NetlistError::UnresolvedInput { record: 1, input: 7 })
        );

        let netlist = Netlist {
            layers: vec![vec![rec(0, "gate", &[])]],
        };
        assert!(matches!(
            validate(&netlist),
            Err(NetlistError::UnknownKind { record: 0, .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected_before_building() {
        let netlist = Netlist {
            layers: vec![vec![rec(0, "switch", &[])], vec![rec(0, "or", &[])]],
        };
        let mut rt = Runtime::new(RuntimeConfig::default());
        assert_eq!(
            instantiate(&mut rt, &netlist, Layout::default()),
            Err(NetlistError::DuplicateId(0))
        );
        assert_eq!(rt.circuit().element_count(), 0);
    }

    #[test]
    fn timer_records_carry_delay() {
        let mut timer = rec(1, "timer", &[0]);
        timer.delay = 5;
        let netlist = Netlist {
            layers: vec![vec![rec(0, "switch", &[])], vec![timer]],
        };
        let mut rt = Runtime::new(RuntimeConfig::default());
        let ids = instantiate(&mut rt, &netlist, Layout::default()).unwrap();
        let descriptor = rt.circuit().descriptor(ids[&1]).unwrap();
        assert_eq!(descriptor.delay.unwrap().to_ticks(60), 5);
    }

    #[test]
    fn netlist_parses_from_json() {
        let json = r#"{ "layers": [[{ "id": 0, "kind": "button" }], [{ "id": 1, "kind": "NOT-A-KIND", "inputs": [0] }]] }"#;
        let netlist: Netlist = serde_json::from_str(json).unwrap();
        assert_eq!(netlist.record_count(), 2);
        assert!(validate(&netlist).is_err());
    }
}
