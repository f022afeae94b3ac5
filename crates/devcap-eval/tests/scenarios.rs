//! Small self-contained scenarios: each builds its own registry, profile
//! set and device, then runs composition, evaluation or simulation end to
//! end.

use devcap_core::{DiagnosticKind, Value};
use devcap_eval::{assign, Evaluator, EvaluatorConfig, FieldWalker, Simulator};
use devcap_profile::{
    AxisValue, Composer, Decoder, DeviceCapabilities, ProfileSet, VideoProfileAxis,
    VideoProfileInstance,
};
use devcap_registry::Registry;
use serde_json::json;

fn registry(tree: serde_json::Value) -> Registry {
    Registry::from_json(&tree).unwrap()
}

fn queue_registry() -> Registry {
    registry(json!({
        "structs": [ { "name": "Queue", "members": [
            { "name": "flags", "type": "flags:QueueFlags", "limit": "bitmask" },
            { "name": "count", "type": "uint", "limit": "max" } ] } ],
        "flag_sets": { "QueueFlags": { "X": 1, "Y": 2, "A": 4, "B": 8 } }
    }))
}

fn device(reg: &Registry, mut tree: serde_json::Value) -> DeviceCapabilities {
    tree["api-version"] = json!("1.0.0");
    Decoder::new(reg).device(&tree).unwrap()
}

fn profiles(reg: &Registry, tree: serde_json::Value) -> ProfileSet {
    Decoder::new(reg).profile_set(&tree).unwrap()
}

#[test]
fn queue_family_carry_over() {
    let reg = queue_registry();
    let set = profiles(
        &reg,
        json!({
            "capabilities": { "q": { "queueFamiliesProperties": [
                { "Queue": { "flags": ["X"], "count": 0 } } ] } },
            "profiles": { "P": { "api-version": "1.0.0", "capabilities": ["q"] } }
        }),
    );
    let dev = device(
        &reg,
        json!({ "queueFamiliesProperties": [ { "Queue": { "flags": ["X", "Y"], "count": 4 } } ] }),
    );
    let block = set.block("q").unwrap();
    let got = assign(
        &FieldWalker::new(&reg),
        "q",
        &block.queue_families,
        &dev.queue_families,
        8,
    )
    .unwrap();
    let queue = reg.resolve("Queue").unwrap();
    assert_eq!(got.families[0][&queue]["count"], Value::Uint(4));

    // The simulated device carries the same assignment.
    let plan = Composer::new(&reg, &set).compose("P").unwrap();
    let sim = Simulator::new(&reg, EvaluatorConfig::default()).simulate(&plan, &dev, None);
    assert_eq!(sim.device.queue_families[0][&queue]["count"], Value::Uint(4));
}

#[test]
fn queue_family_exhaustion_is_distinct_from_missing() {
    let reg = queue_registry();
    let set = profiles(
        &reg,
        json!({
            "capabilities": { "q": { "queueFamiliesProperties": [
                { "Queue": { "flags": ["A"] } },
                { "Queue": { "flags": ["B"] } } ] } },
            "profiles": { "P": { "api-version": "1.0.0", "capabilities": ["q"] } }
        }),
    );
    // Both groups are satisfied by the first family only.
    let dev = device(
        &reg,
        json!({ "queueFamiliesProperties": [
            { "Queue": { "flags": ["A", "B"], "count": 1 } },
            { "Queue": { "flags": ["X"], "count": 1 } } ] }),
    );
    let verdict = Evaluator::new(&reg, &set, EvaluatorConfig::default())
        .evaluate_profile("P", &dev)
        .unwrap();
    assert!(!verdict.satisfied);
    let failures = verdict.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, DiagnosticKind::Exhausted);
    assert_eq!(failures[0].path, "P/q.queueFamiliesProperties");
}

#[test]
fn wildcard_axis_selection() {
    let axis = VideoProfileAxis {
        dims: [
            ("subsampling".to_string(), AxisValue::Is("4:2:0".into())),
            ("luma".to_string(), AxisValue::Is("8".into())),
            ("chroma".to_string(), AxisValue::Any),
        ]
        .into_iter()
        .collect(),
    };
    let instance = |s: &str, l: &str, c: &str| -> VideoProfileInstance {
        [("subsampling", s), ("luma", l), ("chroma", c)].into_iter().collect()
    };
    assert!(axis.matches(&instance("4:2:0", "8", "8")));
    assert!(axis.matches(&instance("4:2:0", "8", "10")));

    let wide = VideoProfileAxis {
        dims: [("subsampling".to_string(), AxisValue::Is("4:4:4".into()))]
            .into_iter()
            .collect(),
    };
    assert!(!wide.matches(&instance("4:2:0", "8", "8")));
    assert!(!wide.matches(&instance("4:2:0", "10", "10")));
}

#[test]
fn slot_composition_orders_required_first() {
    let reg = registry(json!({
        "structs": [ { "name": "F", "members": [
            { "name": "a", "type": "bool", "limit": "max" },
            { "name": "b", "type": "bool", "limit": "max" } ] } ]
    }));
    let set = profiles(
        &reg,
        json!({
            "capabilities": {
                "S1": { "features": { "F": { "a": true } } },
                "S2": { "features": { "F": { "b": true } } }
            },
            "profiles": {
                "P2": { "api-version": "1.0.0", "capabilities": ["S2"] },
                "P": { "api-version": "1.0.0", "profiles": ["P2"], "capabilities": ["S1"] }
            }
        }),
    );
    let plan = Composer::new(&reg, &set).compose("P").unwrap();
    let names: Vec<_> = plan.mandatory_blocks().map(|b| b.name().to_string()).collect();
    assert_eq!(names, vec!["S2", "S1"]);

    let dev = device(&reg, json!({ "features": { "F": { "a": true, "b": false } } }));
    let verdict = Evaluator::new(&reg, &set, EvaluatorConfig::default()).evaluate(&plan, &dev);
    assert!(!verdict.satisfied);
    assert!(!verdict.slots[0].satisfied);
    assert!(verdict.slots[1].satisfied);
}

#[test]
fn min_alignment_end_to_end() {
    let reg = registry(json!({
        "structs": [ { "name": "F", "members": [
            { "name": "alignment", "type": "uint", "limit": "min" } ] } ]
    }));
    let set = profiles(
        &reg,
        json!({
            "capabilities": { "A": { "properties": { "F": { "alignment": 256 } } } },
            "profiles": { "P": { "api-version": "1.0.0", "capabilities": ["A"] } }
        }),
    );
    let dev = device(&reg, json!({ "properties": { "F": { "alignment": 128 } } }));
    let plan = Composer::new(&reg, &set).compose("P").unwrap();

    let verdict = Evaluator::new(&reg, &set, EvaluatorConfig::default()).evaluate(&plan, &dev);
    assert!(verdict.satisfied);

    let sim = Simulator::new(&reg, EvaluatorConfig::default()).simulate(&plan, &dev, Some(&verdict));
    let f = reg.resolve("F").unwrap();
    assert_eq!(sim.device.properties[&f]["alignment"], Value::Uint(256));
    assert!(sim.diagnostics.is_empty(), "{:?}", sim.diagnostics);
}

#[test]
fn strict_merge_rolls_back_during_simulation() {
    let reg = registry(json!({
        "structs": [ { "name": "F", "members": [
            { "name": "vendor", "type": "uint" },
            { "name": "size", "type": "uint", "limit": "max" } ] } ]
    }));
    let set = profiles(
        &reg,
        json!({
            "capabilities": {
                "A": { "properties": { "F": { "vendor": 1, "size": 4 } } },
                "B": { "properties": { "F": { "vendor": 2, "size": 8 } } }
            },
            "profiles": { "P": { "api-version": "1.0.0", "capabilities": ["A", "B"] } }
        }),
    );
    let dev = device(&reg, json!({ "properties": { "F": { "vendor": 1, "size": 16 } } }));
    let plan = Composer::new(&reg, &set).compose("P").unwrap();
    let f = reg.resolve("F").unwrap();

    let config = EvaluatorConfig {
        merge_policy: "strict".parse().unwrap(),
        ..EvaluatorConfig::default()
    };
    let sim = Simulator::new(&reg, config).simulate(&plan, &dev, None);
    assert_eq!(sim.device.properties[&f]["size"], Value::Uint(4));
    assert_eq!(sim.diagnostics[0].kind, DiagnosticKind::Conflict);

    let sim = Simulator::new(&reg, EvaluatorConfig::default()).simulate(&plan, &dev, None);
    assert_eq!(sim.device.properties[&f]["size"], Value::Uint(8));
    assert_eq!(sim.device.properties[&f]["vendor"], Value::Uint(1));
}
