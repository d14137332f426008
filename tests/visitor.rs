//! Tests for graph traversal and flat graph dereferencing.
mod common;
use common::*;
use openeo_pg::prelude::*;
use openeo_pg::graph::accept_process_graph;
use serde_json::json;

/// Records hook invocations as short strings.
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl ProcessGraphVisitor for Recorder {
    fn enter_process(&mut self, process_id: &str, _namespace: Option<&str>) -> Result<()> {
        self.events.push(format!("enter {}", process_id));
        Ok(())
    }

    fn leave_process(&mut self, process_id: &str, _namespace: Option<&str>) -> Result<()> {
        self.events.push(format!("leave {}", process_id));
        Ok(())
    }

    fn enter_argument(&mut self, argument_id: &str, _value: &Value) -> Result<()> {
        self.events.push(format!("arg {}", argument_id));
        Ok(())
    }

    fn leave_argument(&mut self, argument_id: &str, _value: &Value) -> Result<()> {
        self.events.push(format!("done {}", argument_id));
        Ok(())
    }

    fn constant_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        self.events.push(format!("const {}={}", argument_id, value));
        Ok(())
    }

    fn enter_array(&mut self, argument_id: &str) -> Result<()> {
        self.events.push(format!("array {}", argument_id));
        Ok(())
    }

    fn leave_array(&mut self, argument_id: &str) -> Result<()> {
        self.events.push(format!("end {}", argument_id));
        Ok(())
    }

    fn array_element_done(&mut self, _value: &Value) -> Result<()> {
        self.events.push("element".into());
        Ok(())
    }

    fn constant_array_element(&mut self, value: &Value) -> Result<()> {
        self.events.push(format!("item {}", value));
        Ok(())
    }

    fn from_parameter(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("param {}", name));
        Ok(())
    }
}

#[test]
fn test_walk_order_nested() {
    let mut recorder = Recorder::default();
    recorder.visit_node(&pi_plus_five()).unwrap();
    assert_eq!(
        recorder.events,
        vec!["enter add", "arg x", "enter pi", "leave pi", "done x", "const y=5", "leave add"]
    );
}

#[test]
fn test_flat_walk_matches_nested_walk() {
    let node = PGNode::with_arguments(
        "sum",
        arguments! {
            "data" => vec![Value::from(2), Value::from(PGNode::new("pi"))],
            "ignore_nodata" => Value::FromParameter("skip".into()),
        },
    );

    let mut nested = Recorder::default();
    nested.visit_node(&node).unwrap();

    let mut flat = Recorder::default();
    accept_process_graph(&mut flat, &node.flat_graph().unwrap()).unwrap();

    assert_eq!(
        nested.events,
        vec![
            "enter sum",
            "array data",
            "item 2",
            "enter pi",
            "leave pi",
            "element",
            "end data",
            "arg ignore_nodata",
            "param skip",
            "done ignore_nodata",
            "leave sum",
        ]
    );
    assert_eq!(flat.events, nested.events);
}

#[test]
fn test_callbacks_are_not_entered() {
    let reducer = PGNode::with_arguments(
        "mean",
        arguments! { "data" => Value::FromParameter("data".into()) },
    );
    let node = PGNode::with_arguments(
        "reduce_dimension",
        arguments! { "reducer" => SubGraph::from(reducer), "dimension" => "t" },
    );
    let mut recorder = Recorder::default();
    recorder.visit_node(&node).unwrap();
    assert!(!recorder.events.iter().any(|e| e.contains("mean")));
    assert!(!recorder.events.iter().any(|e| e.starts_with("param")));
}

#[test]
fn test_dereference_finds_result() {
    let graph = pi_plus_five().flat_graph().unwrap();
    let dereferenced = dereference_from_node_arguments(&graph).unwrap();
    assert_eq!(dereferenced.result_id(), "add1");
    assert_eq!(dereferenced.node("pi1").unwrap().process_id, "pi");
}

#[test]
fn test_dangling_reference() {
    let graph = flat(json!({
        "a": {"process_id": "add", "arguments": {"x": {"from_node": "missing"}}, "result": true}
    }));
    let err = dereference_from_node_arguments(&graph).unwrap_err();
    assert_eq!(
        err,
        VisitError::DanglingReference {
            missing: "missing".into(),
            referenced_by: "a".into(),
        }
    );
    assert!(err.to_string().contains("missing"));
    assert!(err.to_string().contains("'a'"));
}

#[test]
fn test_no_result_node() {
    let graph = flat(json!({"a": {"process_id": "pi", "arguments": {}}}));
    let err = dereference_from_node_arguments(&graph).unwrap_err();
    assert_eq!(err, VisitError::NoResultNode);
    assert!(err.to_string().contains("No result node"));
}

#[test]
fn test_multiple_result_nodes() {
    let graph = flat(json!({
        "a": {"process_id": "pi", "arguments": {}, "result": true},
        "b": {"process_id": "e", "arguments": {}, "result": true}
    }));
    let err = dereference_from_node_arguments(&graph).unwrap_err();
    assert_eq!(
        err,
        VisitError::MultipleResultNodes {
            ids: vec!["a".into(), "b".into()],
        }
    );
    assert!(err.to_string().contains("Multiple result nodes"));
}

#[test]
fn test_cycle_is_rejected() {
    let graph = flat(json!({
        "a": {"process_id": "add", "arguments": {"x": {"from_node": "b"}}, "result": true},
        "b": {"process_id": "add", "arguments": {"x": {"from_node": "a"}}}
    }));
    let err = dereference_from_node_arguments(&graph).unwrap_err();
    assert!(matches!(err, VisitError::CycleDetected { .. }));
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let graph = flat(json!({
        "load": {"process_id": "load_collection", "arguments": {"id": "S2"}},
        "left": {"process_id": "apply", "arguments": {"data": {"from_node": "load"}}},
        "right": {"process_id": "apply", "arguments": {"data": {"from_node": "load"}}},
        "merge": {
            "process_id": "merge_cubes",
            "arguments": {"cube1": {"from_node": "left"}, "cube2": {"from_node": "right"}},
            "result": true
        }
    }));
    assert_eq!(
        dereference_from_node_arguments(&graph).unwrap().result_id(),
        "merge"
    );
}

#[test]
fn test_nested_levels_are_checked() {
    let graph = flat(json!({
        "reduce": {
            "process_id": "reduce_dimension",
            "arguments": {
                "reducer": {"process_graph": {
                    "mean": {"process_id": "mean", "arguments": {"data": {"from_parameter": "data"}}}
                }}
            },
            "result": true
        }
    }));
    let err = dereference_from_node_arguments(&graph).unwrap_err();
    assert_eq!(err, VisitError::NoResultNode);
}

#[test]
fn test_missing_process_id() {
    let err = FlatGraph::from_json(&json!({"a": {"arguments": {}, "result": true}})).unwrap_err();
    assert_eq!(err, VisitError::MissingProcessId { node: "a".into() });
}

#[test]
fn test_graph_printer() {
    assert_eq!(
        pi_plus_five().to_string(),
        "└── add\n    x:\n        └── pi\n    y: 5\n"
    );

    let flat = pi_plus_five().flat_graph().unwrap();
    assert_eq!(
        GraphPrinter::render_flat(&flat).unwrap(),
        "└── add [add1]\n    x:\n        └── pi [pi1]\n    y: 5\n"
    );
}

#[test]
fn test_graph_printer_shared_node_and_callback() {
    let cube = s2_cube();
    let merged = cube.merge_cubes(&cube, Some(Callback::from("max")));
    let rendered = GraphPrinter::render_flat(&merged.flat_graph().unwrap()).unwrap();

    assert!(rendered.contains("└── load_collection [loadcollection1]"));
    assert!(rendered.contains("└── [loadcollection1] (see above)"));
    assert!(rendered.contains("overlap_resolver: <callback>"));
    assert!(rendered.contains("└── max [max1]"));
}
