//! Tests for the data cube API and band math.
mod common;
use common::*;
use indexmap::IndexMap;
use openeo_pg::prelude::*;
use serde_json::json;

fn reduce_nodes(graph: &FlatGraph) -> usize {
    graph
        .iter()
        .filter(|(_, node)| node.process_id == "reduce_dimension")
        .count()
}

#[test]
fn test_load_collection_arguments() {
    let cube = DataCube::load_collection("S2")
        .spatial_extent(BoundingBox::new(5.0, 51.0, 5.1, 51.1).with_crs("EPSG:4326"))
        .temporal_extent("2024-05-01", "2024-06-01")
        .build()
        .unwrap();
    assert_eq!(
        cube.flat_graph().unwrap().to_json(),
        json!({
            "loadcollection1": {
                "process_id": "load_collection",
                "arguments": {
                    "id": "S2",
                    "spatial_extent": {"west": 5.0, "south": 51.0, "east": 5.1, "north": 51.1, "crs": "EPSG:4326"},
                    "temporal_extent": ["2024-05-01", "2024-06-01"]
                },
                "result": true
            }
        })
    );
    assert!(cube.metadata().is_none());
}

#[test]
fn test_filter_bbox_then_ndvi() {
    let load = PGNode::with_arguments("load_collection", arguments! { "id" => "S2" });
    let cube = DataCube::from_node(load)
        .filter_bbox(BoundingBox::new(3.0, 51.0, 4.0, 52.0))
        .ndvi(None, None, None)
        .unwrap();

    assert_eq!(
        cube.to_json().unwrap(),
        json!({"process_graph": {
            "loadcollection1": {"process_id": "load_collection", "arguments": {"id": "S2"}},
            "filterbbox1": {
                "process_id": "filter_bbox",
                "arguments": {
                    "data": {"from_node": "loadcollection1"},
                    "extent": {"west": 3.0, "south": 51.0, "east": 4.0, "north": 52.0}
                }
            },
            "ndvi1": {
                "process_id": "ndvi",
                "arguments": {"data": {"from_node": "filterbbox1"}},
                "result": true
            }
        }})
    );
}

#[test]
fn test_band_selects_with_array_element() {
    let b04 = s2_cube().band("B04").unwrap();
    assert!(b04.is_band_math());

    let flat = b04.flat_graph().unwrap();
    assert_eq!(flat.ids().collect::<Vec<_>>(), vec!["loadcollection1", "reducedimension1"]);
    let reduce = flat.get("reducedimension1").unwrap();
    assert_eq!(reduce.arguments["dimension"], json!("bands"));
    assert_eq!(reduce.arguments["data"], json!({"from_node": "loadcollection1"}));
    assert_eq!(
        callback_of(&flat, "reducedimension1", "reducer").to_json(),
        json!({
            "arrayelement1": {
                "process_id": "array_element",
                "arguments": {"data": {"from_parameter": "data"}, "index": 1},
                "result": true
            }
        })
    );
}

#[test]
fn test_band_math_stays_in_one_reducer() {
    let cube = s2_cube();
    let b04 = cube.band("B04").unwrap();
    let b08 = cube.band("B08").unwrap();
    let diff = (&b08 - &b04).unwrap();

    let flat = diff.flat_graph().unwrap();
    assert_eq!(flat.len(), 2);
    assert_eq!(reduce_nodes(&flat), 1);
    assert_eq!(
        callback_of(&flat, "reducedimension1", "reducer").to_json(),
        json!({
            "arrayelement1": {
                "process_id": "array_element",
                "arguments": {"data": {"from_parameter": "data"}, "index": 2}
            },
            "arrayelement2": {
                "process_id": "array_element",
                "arguments": {"data": {"from_parameter": "data"}, "index": 1}
            },
            "subtract1": {
                "process_id": "subtract",
                "arguments": {"x": {"from_node": "arrayelement1"}, "y": {"from_node": "arrayelement2"}},
                "result": true
            }
        })
    );
}

#[test]
fn test_ndvi_expression_reuses_band_selections() {
    let cube = s2_cube();
    let red = cube.band("B04").unwrap();
    let nir = cube.band("B08").unwrap();
    let ndvi = (&(&nir - &red).unwrap() / &(&nir + &red).unwrap()).unwrap();

    let flat = ndvi.flat_graph().unwrap();
    assert_eq!(reduce_nodes(&flat), 1);
    let reducer = callback_of(&flat, "reducedimension1", "reducer");
    assert_eq!(
        reducer.ids().collect::<Vec<_>>(),
        vec!["arrayelement1", "arrayelement2", "subtract1", "add1", "divide1"]
    );
    assert_eq!(reducer.result_id().unwrap(), "divide1");
    assert_eq!(
        reducer.get("divide1").unwrap().arguments,
        json!({"x": {"from_node": "subtract1"}, "y": {"from_node": "add1"}})
            .as_object()
            .unwrap()
            .clone()
    );
}

#[test]
fn test_band_math_with_scalars() {
    let b04 = s2_cube().band("B04").unwrap();

    let scaled = (&b04 * 2.0).unwrap();
    let reducer = callback_of(&scaled.flat_graph().unwrap(), "reducedimension1", "reducer");
    assert_eq!(
        reducer.get("multiply1").unwrap().arguments["y"],
        json!(2.0)
    );

    let inverted = (1.0 - &b04).unwrap();
    let reducer = callback_of(&inverted.flat_graph().unwrap(), "reducedimension1", "reducer");
    let subtract = &reducer.get("subtract1").unwrap().arguments;
    assert_eq!(subtract["x"], json!(1.0));
    assert_eq!(subtract["y"], json!({"from_node": "arrayelement1"}));

    let negated = (-&b04).unwrap();
    let reducer = callback_of(&negated.flat_graph().unwrap(), "reducedimension1", "reducer");
    assert_eq!(reducer.get("multiply1").unwrap().arguments["y"], json!(-1.0));
}

#[test]
fn test_band_math_unary_and_comparison() {
    let b04 = s2_cube().band("B04").unwrap();

    let logged = b04.log10().unwrap();
    let reducer = callback_of(&logged.flat_graph().unwrap(), "reducedimension1", "reducer");
    assert_eq!(
        reducer.get("log1").unwrap().arguments,
        json!({"x": {"from_node": "arrayelement1"}, "base": 10})
            .as_object()
            .unwrap()
            .clone()
    );

    let mask = b04.absolute().unwrap().gt(0.5).unwrap();
    let reducer = callback_of(&mask.flat_graph().unwrap(), "reducedimension1", "reducer");
    assert_eq!(
        reducer.ids().collect::<Vec<_>>(),
        vec!["arrayelement1", "absolute1", "gt1"]
    );
    assert_eq!(reducer.result_id().unwrap(), "gt1");
}

#[test]
fn test_scalar_outside_band_math_uses_apply() {
    let cube = s2_cube();
    let flat = (&cube + 1.0).unwrap().flat_graph().unwrap();
    let apply = flat.get("apply1").unwrap();
    assert!(apply.result);
    assert_eq!(apply.arguments["data"], json!({"from_node": "loadcollection1"}));
    assert_eq!(
        callback_of(&flat, "apply1", "process").to_json(),
        json!({
            "add1": {
                "process_id": "add",
                "arguments": {"x": {"from_parameter": "x"}, "y": 1.0},
                "result": true
            }
        })
    );

    let flat = (10.0 / &cube).unwrap().flat_graph().unwrap();
    let divide = callback_of(&flat, "apply1", "process");
    let arguments = &divide.get("divide1").unwrap().arguments;
    assert_eq!(arguments["x"], json!(10.0));
    assert_eq!(arguments["y"], json!({"from_parameter": "x"}));
}

#[test]
fn test_cubes_outside_band_math_are_merged() {
    let s2 = s2_cube();
    let s1 = DataCube::load_collection("S1").build().unwrap();
    let flat = (&s2 * &s1).unwrap().flat_graph().unwrap();

    assert_eq!(
        flat.ids().collect::<Vec<_>>(),
        vec!["loadcollection1", "loadcollection2", "mergecubes1"]
    );
    let merge = flat.get("mergecubes1").unwrap();
    assert_eq!(merge.arguments["cube1"], json!({"from_node": "loadcollection1"}));
    assert_eq!(merge.arguments["cube2"], json!({"from_node": "loadcollection2"}));
    assert_eq!(
        callback_of(&flat, "mergecubes1", "overlap_resolver").to_json(),
        json!({
            "multiply1": {
                "process_id": "multiply",
                "arguments": {"x": {"from_parameter": "x"}, "y": {"from_parameter": "y"}},
                "result": true
            }
        })
    );
}

#[test]
fn test_flat_reducers_are_merged() {
    let cube = DataCube::load_collection("S2").build().unwrap();
    let first = cube.reduce_dimension("bands", flat_array_element(0), None);
    let second = cube.reduce_dimension("bands", flat_array_element(1), None);
    assert!(first.is_band_math());

    let sum = (&first + &second).unwrap();
    let Some(Value::ProcessGraph(SubGraph::Flat(reducer))) = sum.node().argument("reducer") else {
        panic!("reducer is not a flat graph");
    };
    assert_eq!(
        reducer.to_json(),
        json!({
            "arrayelement1": {
                "process_id": "array_element",
                "arguments": {"data": {"from_parameter": "data"}, "index": 0}
            },
            "arrayelement2": {
                "process_id": "array_element",
                "arguments": {"data": {"from_parameter": "data"}, "index": 1}
            },
            "add1": {
                "process_id": "add",
                "arguments": {"x": {"from_node": "arrayelement1"}, "y": {"from_node": "arrayelement2"}},
                "result": true
            }
        })
    );

    let flat = sum.flat_graph().unwrap();
    assert_eq!(reduce_nodes(&flat), 1);
    assert_eq!(&callback_of(&flat, "reducedimension1", "reducer"), reducer);
}

#[test]
fn test_flat_reducer_with_scalar_and_nested_reducer() {
    let cube = s2_cube();
    let flat_band = cube.reduce_dimension("bands", flat_array_element(0), None);

    let scaled = (&flat_band * 3.0).unwrap();
    let Some(Value::ProcessGraph(SubGraph::Flat(reducer))) = scaled.node().argument("reducer")
    else {
        panic!("reducer is not a flat graph");
    };
    assert_eq!(reducer.result_id().unwrap(), "multiply1");
    assert_eq!(
        reducer.get("multiply1").unwrap().arguments["x"],
        json!({"from_node": "arrayelement1"})
    );

    let mixed = (&flat_band - &cube.band("B04").unwrap()).unwrap();
    let Some(Value::ProcessGraph(SubGraph::Flat(reducer))) = mixed.node().argument("reducer") else {
        panic!("reducer is not a flat graph");
    };
    assert_eq!(
        reducer.ids().collect::<Vec<_>>(),
        vec!["arrayelement1", "arrayelement2", "subtract1"]
    );
    assert_eq!(
        reducer.get("arrayelement2").unwrap().arguments["index"],
        json!(1)
    );
}

#[test]
fn test_unknown_band() {
    let err = s2_cube().band("B99").unwrap_err();
    assert_eq!(
        err,
        GraphError::UnknownBand {
            band: "B99".into(),
            available: vec!["B02".into(), "B04".into(), "B08".into()],
        }
    );
    assert!(err.to_string().contains("B99"));

    let err = DataCube::load_collection("S2")
        .bands(["B99"])
        .metadata(CubeMetadata::with_bands(["B02"]))
        .build()
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownBand { .. }));
}

#[test]
fn test_band_needs_metadata() {
    let cube = DataCube::load_collection("S2").build().unwrap();
    let err = cube.band("B04").unwrap_err();
    assert_eq!(err, GraphError::MissingDimension("band"));
    assert_eq!(err.to_string(), "Cube has no band dimension");
}

#[test]
fn test_band_aliases() {
    let metadata = CubeMetadata {
        bands: vec![
            Band::new("B04").with_common_name("red"),
            Band::new("B08").with_common_name("nir").with_wavelength(0.842),
        ],
        ..CubeMetadata::with_bands(Vec::<String>::new())
    };
    assert_eq!(metadata.band_index("nir").unwrap(), 1);
    assert_eq!(metadata.band_index("B04").unwrap(), 0);
}

#[test]
fn test_metadata_follows_operations() {
    let cube = s2_cube();

    let filtered = cube.filter_bands(&["B08", "B04"]).unwrap();
    assert_eq!(filtered.metadata().unwrap().band_names(), vec!["B08", "B04"]);
    assert_eq!(
        filtered.flat_graph().unwrap().get("filterbands1").unwrap().arguments["bands"],
        json!(["B08", "B04"])
    );

    let with_index = cube.ndvi(None, None, Some("NDVI")).unwrap();
    assert_eq!(
        with_index.metadata().unwrap().band_names(),
        vec!["B02", "B04", "B08", "NDVI"]
    );

    let reduced = cube.ndvi(Some("B08"), Some("B04"), None).unwrap();
    assert!(reduced.metadata().unwrap().band_dimension.is_none());

    let temporal = cube.reduce_temporal("max");
    assert!(temporal.metadata().unwrap().temporal_dimension.is_none());
    assert!(!temporal.is_band_math());
}

#[test]
fn test_apply_dimension_and_friends() {
    let cube = s2_cube()
        .apply_dimension("t", "cumsum", Some("t2"))
        .resample_spatial(10.0, "near")
        .linear_scale_range(0.0, 4096.0, 0.0, 255.0)
        .unwrap();
    let flat = cube.flat_graph().unwrap();

    let apply_dimension = &flat.get("applydimension1").unwrap().arguments;
    assert_eq!(apply_dimension["dimension"], json!("t"));
    assert_eq!(apply_dimension["target_dimension"], json!("t2"));
    assert_eq!(
        callback_of(&flat, "applydimension1", "process").to_json(),
        json!({"cumsum1": {"process_id": "cumsum", "arguments": {"data": {"from_parameter": "data"}}, "result": true}})
    );

    assert_eq!(
        callback_of(&flat, "apply1", "process").to_json(),
        json!({"linearscalerange1": {
            "process_id": "linear_scale_range",
            "arguments": {
                "x": {"from_parameter": "x"},
                "inputMin": 0.0, "inputMax": 4096.0, "outputMin": 0.0, "outputMax": 255.0
            },
            "result": true
        }})
    );
}

#[test]
fn test_mask_and_save_result() {
    let cube = s2_cube();
    let clouds = cube.band("B02").unwrap().gt(0.3).unwrap();
    let mut options = IndexMap::new();
    options.insert("tile_grid".to_string(), json!("100km"));
    let saved = cube.mask(&clouds, None).save_result("GTiff", options);

    let flat = saved.flat_graph().unwrap();
    assert_eq!(flat.result_id().unwrap(), "saveresult1");
    assert_eq!(
        flat.get("saveresult1").unwrap().arguments["options"],
        json!({"tile_grid": "100km"})
    );
    // The collection is loaded once and used by both the mask and the data.
    assert_eq!(
        flat.iter()
            .filter(|(_, node)| node.process_id == "load_collection")
            .count(),
        1
    );
}

#[test]
fn test_vector_cube_and_model_training() {
    let cube = s2_cube();
    let vectors = cube.aggregate_spatial(json!({"type": "FeatureCollection", "features": []}), "mean");
    let model = vectors.fit_class_random_forest(json!({"type": "FeatureCollection"}), None, 100, Some(42));
    let saved = model.save_ml_model(IndexMap::new());

    let flat = saved.flat_graph().unwrap();
    assert_eq!(
        flat.ids().collect::<Vec<_>>(),
        vec!["loadcollection1", "aggregatespatial1", "fitclassrandomforest1", "savemlmodel1"]
    );
    assert_eq!(flat.result_id().unwrap(), "savemlmodel1");
    assert_eq!(
        flat.get("fitclassrandomforest1").unwrap().arguments,
        json!({
            "predictors": {"from_node": "aggregatespatial1"},
            "target": {"type": "FeatureCollection"},
            "num_trees": 100,
            "seed": 42
        })
        .as_object()
        .unwrap()
        .clone()
    );
    assert_eq!(
        callback_of(&flat, "aggregatespatial1", "reducer").result_id().unwrap(),
        "mean1"
    );
}

#[test]
fn test_predict_random_forest_passes_model_as_context() {
    let model = MlModel::load_ml_model("job-123");
    let predicted = s2_cube().predict_random_forest(&model, "bands");

    let flat = predicted.flat_graph().unwrap();
    let reduce = flat.get("reducedimension1").unwrap();
    assert_eq!(reduce.arguments["context"], json!({"from_node": "loadmlmodel1"}));
    assert_eq!(
        callback_of(&flat, "reducedimension1", "reducer").to_json(),
        json!({"predictrandomforest1": {
            "process_id": "predict_random_forest",
            "arguments": {"data": {"from_parameter": "data"}, "model": {"from_parameter": "context"}},
            "result": true
        }})
    );
}

#[test]
fn test_cube_from_flat_graph() {
    let flat = s2_cube().reduce_bands("mean").flat_graph().unwrap();
    let cube = DataCube::from_flat_graph(&flat, None).unwrap();
    assert_eq!(cube.node().process_id(), "reduce_dimension");
    assert_eq!(cube.flat_graph().unwrap(), flat);
}
