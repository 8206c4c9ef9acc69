//! End-to-end tests for the circuit runtime.
//!
//! These drive the public `Runtime` surface the way an editor would: build
//! elements at canvas positions, wire them, drive inputs between ticks,
//! query the viewport and prune chunks.

use circuitry_core::element::{ElementParams, ElementSpec, GateType, Placement};
use circuitry_core::id::ElementId;
use circuitry_core::test_utils::assert_counters_consistent;
use circuitry_data::{Layout, Netlist, instantiate};
use circuitry_spatial::{ChunkConfig, ChunkKey, GridPosition, Runtime, RuntimeConfig};

// ============================================================================
// Shared helpers
// ============================================================================

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig {
        chunks: ChunkConfig {
            chunk_size: 16,
            eviction_margin: 3,
        },
        ..RuntimeConfig::default()
    })
}

fn add(rt: &mut Runtime, spec: ElementSpec, x: i32, y: i32) -> ElementId {
    rt.add_element(spec, Placement::at(x, y))
}

fn value(rt: &Runtime, id: ElementId) -> bool {
    rt.circuit().value(id).unwrap()
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn and_gate_drives_output() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let b = add(&mut rt, ElementSpec::Switch, 0, 4);
    let and = add(&mut rt, ElementSpec::Gate(GateType::And), 4, 2);
    let lamp = add(&mut rt, ElementSpec::Output { luminance: 255 }, 8, 2);
    assert!(rt.add_wire(a, and));
    assert!(rt.add_wire(b, and));
    assert!(rt.add_wire(and, lamp));

    rt.set_value(a, true).unwrap();
    rt.set_value(b, true).unwrap();
    rt.step().unwrap();
    rt.step().unwrap();
    assert!(value(&rt, lamp));

    rt.set_value(a, false).unwrap();
    rt.step().unwrap();
    rt.step().unwrap();
    assert!(!value(&rt, lamp));
    assert_counters_consistent(rt.circuit());
}

#[test]
fn and_output_settles_one_tick_after_gate() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let b = add(&mut rt, ElementSpec::Switch, 0, 4);
    let and = add(&mut rt, ElementSpec::Gate(GateType::And), 4, 2);
    rt.add_wire(a, and);
    rt.add_wire(b, and);

    rt.set_value(a, true).unwrap();
    rt.step().unwrap();
    assert!(!value(&rt, and));

    rt.set_value(b, true).unwrap();
    rt.step().unwrap();
    assert!(value(&rt, and));
}

#[test]
fn zero_input_gates_are_false() {
    let mut rt = runtime();
    let gates: Vec<_> = [
        GateType::And,
        GateType::Or,
        GateType::Xor,
        GateType::Nand,
        GateType::Nor,
        GateType::Xnor,
    ]
    .into_iter()
    .map(|g| add(&mut rt, ElementSpec::Gate(g), 0, 0))
    .collect();

    rt.step().unwrap();
    for id in gates {
        assert!(!value(&rt, id));
    }
}

#[test]
fn nand_with_inputs_behaves_conventionally() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let nand = add(&mut rt, ElementSpec::Gate(GateType::Nand), 4, 0);
    rt.add_wire(a, nand);

    rt.step().unwrap();
    assert!(value(&rt, nand));
    rt.set_value(a, true).unwrap();
    rt.step().unwrap();
    assert!(!value(&rt, nand));
}

#[test]
fn toggle_holds_after_single_pulse() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let t = add(&mut rt, ElementSpec::Gate(GateType::Toggle), 4, 0);
    rt.add_wire(a, t);

    rt.set_value(a, true).unwrap();
    rt.step().unwrap();
    rt.set_value(a, false).unwrap();
    assert!(value(&rt, t));

    for _ in 0..10 {
        rt.step().unwrap();
        assert!(value(&rt, t));
    }
    assert_counters_consistent(rt.circuit());
}

#[test]
fn timer_delay_three() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let d = add(&mut rt, ElementSpec::Timer { delay: 3 }, 4, 0);
    rt.add_wire(a, d);

    // Input goes high before tick 1; output follows at tick 4.
    rt.set_value(a, true).unwrap();
    let mut rise = None;
    for tick in 1..=8 {
        rt.step().unwrap();
        if rise.is_none() && value(&rt, d) {
            rise = Some(tick);
        }
    }
    assert_eq!(rise, Some(4));

    // Input goes low before tick 9; output follows at tick 12.
    rt.set_value(a, false).unwrap();
    let mut fall = None;
    for tick in 9..=16 {
        rt.step().unwrap();
        if fall.is_none() && !value(&rt, d) {
            fall = Some(tick);
        }
    }
    assert_eq!(fall, Some(12));
}

#[test]
fn quiescent_circuit_reports_no_changes() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let or = add(&mut rt, ElementSpec::Gate(GateType::Or), 4, 0);
    let lamp = add(&mut rt, ElementSpec::Output { luminance: 1 }, 8, 0);
    rt.add_wire(a, or);
    rt.add_wire(or, lamp);
    rt.set_value(a, true).unwrap();
    rt.step().unwrap();
    rt.step().unwrap();

    let before: Vec<bool> = rt.circuit().elements().map(|e| e.value()).collect();
    let summary = rt.step().unwrap();
    assert_eq!(summary.changed, 0);
    assert!(rt.circuit().last_changed().is_empty());
    let after: Vec<bool> = rt.circuit().elements().map(|e| e.value()).collect();
    assert_eq!(before, after);
}

#[test]
fn wire_rules() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Gate(GateType::Or), 0, 0);
    let b = add(&mut rt, ElementSpec::Gate(GateType::Or), 4, 0);

    assert!(rt.add_wire(a, b));
    assert!(!rt.add_wire(b, a));
    assert!(rt.add_wire(a, a));
    assert!(!rt.add_wire(a, a));
    assert!(rt.remove_wire(a, b));
    assert!(rt.add_wire(b, a));
}

#[test]
fn named_construction_via_params() {
    let mut rt = runtime();
    let params = ElementParams {
        placement: Placement::at(40, 40),
        delay: 3,
        ..ElementParams::default()
    };
    let d = rt.add_element_named("timer", &params).unwrap();
    assert_eq!(rt.chunk_of(d), Some(ChunkKey::new(2, 2)));
    assert!(rt.add_element_named("resistor", &params).is_none());
}

#[test]
fn reset_then_run_again() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let t = add(&mut rt, ElementSpec::Gate(GateType::Toggle), 4, 0);
    let lamp = add(&mut rt, ElementSpec::Output { luminance: 1 }, 8, 0);
    rt.add_wire(a, t);
    rt.add_wire(t, lamp);

    rt.set_value(a, true).unwrap();
    rt.step().unwrap();
    rt.set_value(a, false).unwrap();
    rt.step().unwrap();
    assert!(value(&rt, lamp));

    rt.reset();
    assert!(rt.circuit().elements().all(|e| !e.value()));
    assert_counters_consistent(rt.circuit());

    rt.set_value(a, true).unwrap();
    rt.step().unwrap();
    assert!(value(&rt, t));
}

// ============================================================================
// Mid-simulation editing
// ============================================================================

#[test]
fn editing_between_ticks_keeps_counters() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let b = add(&mut rt, ElementSpec::Switch, 0, 4);
    let xor = add(&mut rt, ElementSpec::Gate(GateType::Xor), 4, 2);
    rt.add_wire(a, xor);
    rt.set_value(a, true).unwrap();
    rt.set_value(b, true).unwrap();
    rt.step().unwrap();
    assert!(value(&rt, xor));

    rt.add_wire(b, xor);
    rt.step().unwrap();
    assert!(!value(&rt, xor));

    rt.remove_wires_for_element(a);
    rt.step().unwrap();
    assert!(value(&rt, xor));

    rt.remove_element(b);
    rt.step().unwrap();
    assert!(!value(&rt, xor));
    assert_counters_consistent(rt.circuit());
}

// ============================================================================
// Spatial index
// ============================================================================

#[test]
fn emptied_distant_chunk_is_evicted() {
    let mut rt = runtime();
    let near = add(&mut rt, ElementSpec::Switch, 0, 0);
    let far_a = add(&mut rt, ElementSpec::Switch, 1000, 1000);
    let far_b = add(&mut rt, ElementSpec::Switch, 1001, 1002);
    let far_key = rt.chunk_of(far_a).unwrap();
    assert_eq!(rt.chunk_of(far_b), Some(far_key));

    // One element left: chunk survives.
    rt.remove_element(far_a);
    assert_eq!(rt.evict_chunks(GridPosition::new(0, 0)), 0);

    rt.remove_element(far_b);
    assert_eq!(rt.evict_chunks(GridPosition::new(0, 0)), 1);
    assert!(rt.chunks().chunk(far_key).is_none());
    assert_eq!(rt.chunk_of(near), Some(ChunkKey::new(0, 0)));
    assert!(rt.chunks().chunk(ChunkKey::new(0, 0)).is_some());
}

#[test]
fn occupied_chunks_survive_any_distance() {
    let mut rt = runtime();
    let ids: Vec<_> = (0..20)
        .map(|i| add(&mut rt, ElementSpec::Switch, i * 500, -i * 500))
        .collect();
    assert_eq!(rt.evict_chunks(GridPosition::new(-100_000, 100_000)), 0);
    assert_eq!(rt.chunk_count(), 20);
    for id in ids {
        assert!(rt.chunk_of(id).is_some());
    }
}

#[test]
fn viewport_panning_then_pruning() {
    let mut rt = runtime();
    let lamp = add(&mut rt, ElementSpec::Output { luminance: 3 }, 5, 5);

    // Pan far away, allocating empty chunks along the way. The first stop
    // is the lamp's own chunk.
    for step in 0..10 {
        rt.get_chunk(GridPosition::new(step * 200, 0), true);
    }
    assert_eq!(rt.chunk_count(), 10);

    let visible = rt.query_viewport(GridPosition::new(0, 0), GridPosition::new(31, 31));
    assert_eq!(visible, vec![lamp]);

    // Viewport now rests at the far end.
    let evicted = rt.evict_chunks(GridPosition::new(1800, 0));
    assert_eq!(evicted, 8);
    assert!(rt.get_chunk(GridPosition::new(1800, 0), false).is_some());
    assert!(rt.get_chunk(GridPosition::new(5, 5), false).is_some());
}

#[test]
fn moving_elements_keeps_chunk_membership_exact() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    for (x, y) in [(17, 0), (-1, -1), (300, -45), (0, 0)] {
        let key = rt.move_element(a, GridPosition::new(x, y)).unwrap();
        assert_eq!(rt.chunk_of(a), Some(key));
        let holding: Vec<_> = rt
            .chunks()
            .iter()
            .filter(|(_, chunk)| chunk.contains(a))
            .map(|(k, _)| *k)
            .collect();
        assert_eq!(holding, vec![key]);
    }
}

#[test]
fn clear_resets_everything() {
    let mut rt = runtime();
    let a = add(&mut rt, ElementSpec::Switch, 0, 0);
    let b = add(&mut rt, ElementSpec::Gate(GateType::Toggle), 100, 0);
    rt.add_wire(a, b);
    rt.step().unwrap();

    rt.clear();
    assert_eq!(rt.circuit().element_count(), 0);
    assert_eq!(rt.circuit().wire_count(), 0);
    assert_eq!(rt.chunk_count(), 0);
    assert_eq!(rt.circuit().tick(), 0);
    assert_eq!(add(&mut rt, ElementSpec::Switch, 0, 0), ElementId(0));
}

// ============================================================================
// Netlists and descriptors
// ============================================================================

#[test]
fn netlist_round_trips_through_descriptors() {
    let json = r#"{ "layers": [
        [ { "id": 0, "kind": "switch" }, { "id": 1, "kind": "switch" } ],
        [ { "id": 2, "kind": "nand", "inputs": [0, 1] } ],
        [ { "id": 3, "kind": "toggle", "inputs": [2, 3] } ],
        [ { "id": 4, "kind": "output", "inputs": [3], "luminance": 90 } ]
    ] }"#;
    let netlist: Netlist = serde_json::from_str(json).unwrap();
    let mut original = runtime();
    let ids = instantiate(&mut original, &netlist, Layout::default()).unwrap();

    let descriptors = original.descriptors();
    let encoded = serde_json::to_string(&descriptors).unwrap();
    let decoded: Vec<circuitry_core::descriptor::ElementDescriptor> =
        serde_json::from_str(&encoded).unwrap();

    let mut copy = runtime();
    let map = copy.restore(&decoded).unwrap();
    assert_eq!(copy.circuit().wire_count(), original.circuit().wire_count());

    // Both run identically.
    for rt in [&mut original, &mut copy] {
        for _ in 0..4 {
            rt.step().unwrap();
        }
    }
    for (net, id) in &ids {
        assert_eq!(
            original.circuit().value(*id),
            copy.circuit().value(map[id]),
            "record {net}"
        );
    }
    assert_eq!(original.circuit().state_hash(), copy.circuit().state_hash());
}
