//! Common test utilities for building nodes, cubes and flat graphs.
use openeo_pg::prelude::*;
use serde_json::{Value as Json, json};

/// `add(x = pi(), y = 5)`
#[allow(dead_code)]
pub fn pi_plus_five() -> PGNode {
    PGNode::with_arguments("add", arguments! { "x" => PGNode::new("pi"), "y" => 5 })
}

/// A Sentinel-2 style cube with three bands and the usual dimensions.
#[allow(dead_code)]
pub fn s2_cube() -> DataCube {
    DataCube::load_collection("S2")
        .bands(["B02", "B04", "B08"])
        .build()
        .unwrap()
}

/// Parses a flat graph from a JSON literal.
#[allow(dead_code)]
pub fn flat(value: Json) -> FlatGraph {
    FlatGraph::from_json(&value).unwrap()
}

/// A flat reducer picking band `index`.
#[allow(dead_code)]
pub fn flat_array_element(index: u32) -> FlatGraph {
    flat(json!({
        "arrayelement1": {
            "process_id": "array_element",
            "arguments": {"data": {"from_parameter": "data"}, "index": index},
            "result": true
        }
    }))
}

/// The process graph of the argument `name` of flat node `id`.
#[allow(dead_code)]
pub fn callback_of(graph: &FlatGraph, id: &str, name: &str) -> FlatGraph {
    let argument = &graph.get(id).unwrap().arguments[name];
    flat(argument["process_graph"].clone())
}
