use std::collections::HashMap;

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use formtree::{EngineConfig, FieldPath, FormEngine, NodeId, Value};

fn engine(layout: serde_json::Value, data: serde_json::Value) -> FormEngine {
    FormEngine::new(
        EngineConfig::default(),
        &layout,
        data,
        Box::new(HashMap::<String, String>::new()),
        HashMap::new(),
    )
    .expect("engine construction")
}

fn repeating_fixture() -> serde_json::Value {
    json!({
        "form": [
            {"id": "prop1-input", "type": "Input",
             "dataModelBindings": {"simpleBinding": "Group.prop1"}},
            {"id": "contacts", "type": "RepeatingGroup",
             "children": ["field-input"],
             "dataModelBindings": {"group": "Group"}},
            {"id": "field-input", "type": "Input",
             "dataModelBindings": {"simpleBinding": "Group.field"}}
        ]
    })
}

#[test]
fn test_rows_expand_bindings_per_instance() {
    let mut engine = engine(repeating_fixture(), json!({}));
    let container = NodeId::root("contacts");
    engine.add_row(&container, None).unwrap();
    engine.add_row(&container, None).unwrap();

    let instances = engine.tree().instances_of("field-input").to_vec();
    assert_eq!(instances.len(), 2);

    let mut bindings: Vec<String> = instances
        .iter()
        .map(|id| {
            engine
                .resolved(id)
                .and_then(|props| props.binding("simpleBinding"))
                .expect("resolved binding")
                .to_dotted()
        })
        .collect();
    bindings.sort();
    assert_eq!(bindings, vec!["Group[0].field", "Group[1].field"]);

    // The uuid chains differ, so the two instances never collide.
    assert_ne!(instances[0], instances[1]);
}

#[test]
fn test_row_identity_survives_removal() {
    let mut engine = engine(repeating_fixture(), json!({}));
    let container = NodeId::root("contacts");
    let a = engine.add_row(&container, None).unwrap();
    let b = engine.add_row(&container, None).unwrap();
    let c = engine.add_row(&container, None).unwrap();
    assert_eq!((a.index, b.index, c.index), (0, 1, 2));

    engine.remove_row(&container, 1).unwrap();

    // A and C keep their uuids; C's index is renumbered densely to 1.
    let remaining: Vec<Uuid> = engine
        .tree()
        .instances_of("field-input")
        .iter()
        .map(|id| id.rows()[0])
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&a.uuid));
    assert!(remaining.contains(&c.uuid));
    assert!(!remaining.contains(&b.uuid));

    let c_node = NodeId::nested("field-input", vec![c.uuid]);
    let c_props = engine.resolved(&c_node).expect("surviving node resolved");
    assert_eq!(
        c_props.binding("simpleBinding").unwrap().to_dotted(),
        "Group[1].field"
    );
}

#[test]
fn test_set_value_on_destroyed_node_is_noop() {
    let mut engine = engine(repeating_fixture(), json!({}));
    let container = NodeId::root("contacts");
    let row = engine.add_row(&container, None).unwrap();
    let node = NodeId::nested("field-input", vec![row.uuid]);
    assert!(engine.tree().contains(&node));

    engine.remove_row(&container, 0).unwrap();
    let applied = engine.set_value(&node, "simpleBinding", json!("late")).unwrap();
    assert!(!applied);
    assert_eq!(engine.data().read(&FieldPath::parse("Group[0].field").unwrap()), None);
}

#[test]
fn test_edits_echo_before_flush() {
    let layout = json!({
        "form": [
            {"id": "name", "type": "Input",
             "dataModelBindings": {"simpleBinding": "person.name"}}
        ]
    });
    let mut engine = engine(layout, json!({"person": {"name": "Ada"}}));
    let node = NodeId::root("name");
    let path = FieldPath::parse("person.name").unwrap();

    engine.set_value(&node, "simpleBinding", json!("Grace")).unwrap();
    assert!(engine.has_pending());
    assert_eq!(engine.current_data().read(&path), Some(&json!("Grace")));
    assert_eq!(engine.data().read(&path), Some(&json!("Ada")));
    // Resolved value still reflects the canonical model.
    assert_eq!(
        engine.resolved(&node).unwrap().value,
        Some(Value::String("Ada".into()))
    );

    let patches = engine.flush();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].path, path);
    assert_eq!(patches[0].old, json!("Ada"));
    assert_eq!(patches[0].new, json!("Grace"));
    assert_eq!(engine.data().read(&path), Some(&json!("Grace")));
    assert_eq!(
        engine.resolved(&node).unwrap().value,
        Some(Value::String("Grace".into()))
    );

    let log = engine.take_patches();
    assert_eq!(log, patches);
    assert!(engine.take_patches().is_empty());
}

#[test]
fn test_hidden_subtree_is_never_evaluated() {
    let layout = json!({
        "form": [
            {"id": "wrapper", "type": "Group", "children": ["inner"],
             "hidden": {"function": "equals", "args": [{"dataModel": "mode"}, "hide"]}},
            {"id": "inner", "type": "Input",
             "dataModelBindings": {"simpleBinding": "field"},
             "hidden": {"function": "equals", "args": [{"dataModel": "never"}, "read"]}}
        ]
    });
    let engine = engine(layout, json!({"mode": "hide", "field": "x"}));

    let wrapper = NodeId::root("wrapper");
    let inner = NodeId::root("inner");
    assert!(engine.resolved(&wrapper).unwrap().is_hidden());
    assert!(engine.resolved(&inner).unwrap().hidden_by_ancestor);

    // Only the wrapper's own hidden expression ran: the call node plus its
    // two argument nodes. The inner node's expression was skipped.
    assert_eq!(engine.resolution().evaluator().evaluation_count(), 3);
}

#[test]
fn test_hidden_flip_reresolves_subtree() {
    let layout = json!({
        "form": [
            {"id": "wrapper", "type": "Group", "children": ["inner"],
             "hidden": {"function": "equals", "args": [{"dataModel": "mode"}, "hide"]}},
            {"id": "inner", "type": "Input",
             "dataModelBindings": {"simpleBinding": "field"}},
            {"id": "mode-input", "type": "Input",
             "dataModelBindings": {"simpleBinding": "mode"}}
        ]
    });
    let mut engine = engine(layout, json!({"mode": "hide", "field": "x"}));
    let inner = NodeId::root("inner");
    assert!(engine.resolved(&inner).unwrap().hidden_by_ancestor);
    assert_eq!(engine.resolved(&inner).unwrap().value, None);
    // Suppressed nodes expose no bindings, so edits against them fail.
    engine
        .set_value(&inner, "simpleBinding", json!("y"))
        .unwrap_err();

    engine
        .set_value(&NodeId::root("mode-input"), "simpleBinding", json!("show"))
        .unwrap();
    engine.flush();
    let props = engine.resolved(&inner).unwrap();
    assert!(!props.hidden_by_ancestor);
    assert_eq!(props.value, Some(Value::String("x".into())));
}

#[test]
fn test_row_removal_redirties_readers_outside_container() {
    let layout = json!({
        "form": [
            {"id": "contacts", "type": "RepeatingGroup",
             "children": ["field-input"],
             "dataModelBindings": {"group": "Group"}},
            {"id": "field-input", "type": "Input",
             "dataModelBindings": {"simpleBinding": "Group.field"}},
            {"id": "watcher", "type": "Input",
             "dataModelBindings": {"simpleBinding": "other"},
             "hidden": {"function": "equals",
                        "args": [{"dataModel": "Group[0].field"}, "second"]}}
        ]
    });
    let mut engine = engine(
        layout,
        json!({"Group": [{"field": "first"}, {"field": "second"}]}),
    );
    let watcher = NodeId::root("watcher");
    assert!(!engine.resolved(&watcher).unwrap().hidden);

    // Removing row 0 shifts "second" into Group[0].field; the watcher sits
    // outside the container but recorded a read under the mutated array.
    engine.remove_row(&NodeId::root("contacts"), 0).unwrap();
    assert!(engine.resolved(&watcher).unwrap().hidden);
}

#[test]
fn test_set_options_flushes_pending_edits() {
    let layout = json!({
        "form": [
            {"id": "name", "type": "Input",
             "dataModelBindings": {"simpleBinding": "person.name"}}
        ]
    });
    let mut engine = engine(layout, json!({"person": {"name": "Ada"}}));
    let path = FieldPath::parse("person.name").unwrap();
    engine
        .set_value(&NodeId::root("name"), "simpleBinding", json!("Grace"))
        .unwrap();

    engine.set_options("countries", Vec::new());
    assert!(!engine.has_pending());
    assert_eq!(engine.data().read(&path), Some(&json!("Grace")));
}

#[test]
fn test_unrelated_nodes_keep_their_version() {
    let layout = json!({
        "form": [
            {"id": "a", "type": "Input", "dataModelBindings": {"simpleBinding": "a"}},
            {"id": "b", "type": "Input", "dataModelBindings": {"simpleBinding": "b"}}
        ]
    });
    let mut engine = engine(layout, json!({"a": 1, "b": 2}));
    let a = NodeId::root("a");
    let b = NodeId::root("b");
    let b_before = engine.resolution().node_version(&b);

    engine.set_value(&a, "simpleBinding", json!(3)).unwrap();
    engine.flush();

    assert_eq!(engine.resolved(&a).unwrap().value, Some(Value::Number(3.0)));
    assert_eq!(engine.resolution().node_version(&b), b_before);
    assert!(engine.resolution().node_version(&a) > b_before);
}

#[test]
fn test_resolution_is_idempotent() {
    let mut engine = engine(repeating_fixture(), json!({"Group": [{"field": "v"}]}));
    let snapshot: Vec<_> = engine
        .tree()
        .dfs_order()
        .into_iter()
        .map(|id| (id.clone(), engine.resolved(&id).cloned()))
        .collect();

    // A full no-change re-resolution must reproduce the same bags.
    engine.set_language(engine.language().to_string());
    for (id, props) in snapshot {
        assert_eq!(engine.resolved(&id).cloned(), props, "node {}", id);
    }
}

#[test]
fn test_claim_conflicts_are_reported_not_fatal() {
    let layout = json!({
        "form": [
            {"id": "g1", "type": "Group", "children": ["shared", "ghost"]},
            {"id": "g2", "type": "Group", "children": ["shared"]},
            {"id": "shared", "type": "Input",
             "dataModelBindings": {"simpleBinding": "x"}}
        ]
    });
    let engine = engine(layout, json!({}));

    // First claim wins; the dangling reference is dropped.
    let shared = engine.tree().find_by_component("shared").unwrap();
    assert_eq!(shared.parent, Some(NodeId::root("g1")));
    assert_eq!(engine.diagnostics().len(), 2);
}

#[test]
fn test_rows_seed_from_existing_data() {
    let engine = engine(
        repeating_fixture(),
        json!({"Group": [{"field": "a"}, {"field": "b"}, {"field": "c"}]}),
    );
    let instances = engine.tree().instances_of("field-input");
    assert_eq!(instances.len(), 3);
    let values: Vec<_> = instances
        .iter()
        .filter_map(|id| engine.resolved(id).and_then(|p| p.value.clone()))
        .collect();
    assert_eq!(values.len(), 3);
    assert!(values.contains(&Value::String("b".into())));
}

#[test]
fn test_move_row_renumbers_bindings() {
    let mut engine = engine(
        repeating_fixture(),
        json!({"Group": [{"field": "first"}, {"field": "second"}]}),
    );
    let container = NodeId::root("contacts");
    engine.move_row(&container, 0, 1).unwrap();

    let instances = engine.tree().instances_of("field-input").to_vec();
    let read = |id: &NodeId| engine.resolved(id).and_then(|p| p.value.clone());
    let by_binding: HashMap<String, Option<Value>> = instances
        .iter()
        .map(|id| {
            let path = engine
                .resolved(id)
                .and_then(|p| p.binding("simpleBinding"))
                .unwrap()
                .to_dotted();
            (path, read(id))
        })
        .collect();
    assert_eq!(
        by_binding["Group[0].field"],
        Some(Value::String("second".into()))
    );
    assert_eq!(
        by_binding["Group[1].field"],
        Some(Value::String("first".into()))
    );
}
