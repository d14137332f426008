use crate::arguments;
use crate::error::Result;
use crate::graph::{FlatGraph, PGNode, Value};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::sync::Arc;

/// A vector cube, e.g. the output of `aggregate_spatial`.
#[derive(Debug, Clone)]
pub struct VectorCube {
    pub(super) node: Arc<PGNode>,
}

/// A trained machine learning model.
#[derive(Debug, Clone)]
pub struct MlModel {
    pub(super) node: Arc<PGNode>,
}

fn options_value(options: IndexMap<String, Json>) -> Value {
    Value::Object(options.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

impl VectorCube {
    /// Wraps an existing node.
    pub fn from_node(node: impl Into<Arc<PGNode>>) -> Self {
        Self { node: node.into() }
    }

    /// The node producing this vector cube.
    pub fn node(&self) -> &Arc<PGNode> {
        &self.node
    }

    /// Appends `save_result` in `format`.
    pub fn save_result(&self, format: &str, options: IndexMap<String, Json>) -> VectorCube {
        VectorCube::from_node(PGNode::with_arguments(
            "save_result",
            arguments! {
                "data" => &self.node,
                "format" => format,
                "options" => options_value(options),
            },
        ))
    }

    fn fit_random_forest(
        &self,
        process_id: &str,
        target: Value,
        max_variables: Option<u32>,
        num_trees: u32,
        seed: Option<i64>,
    ) -> MlModel {
        let mut arguments = arguments! {
            "predictors" => &self.node,
            "target" => target,
        };
        if let Some(max_variables) = max_variables {
            arguments.insert("max_variables".into(), Value::from(max_variables));
        }
        arguments.insert("num_trees".into(), Value::from(num_trees));
        if let Some(seed) = seed {
            arguments.insert("seed".into(), Value::from(seed));
        }
        MlModel::from_node(PGNode::with_arguments(process_id, arguments))
    }

    /// Trains a random forest classifier with this cube as predictors.
    pub fn fit_class_random_forest(
        &self,
        target: impl Into<Value>,
        max_variables: Option<u32>,
        num_trees: u32,
        seed: Option<i64>,
    ) -> MlModel {
        self.fit_random_forest(
            "fit_class_random_forest",
            target.into(),
            max_variables,
            num_trees,
            seed,
        )
    }

    /// Trains a random forest regressor with this cube as predictors.
    pub fn fit_regr_random_forest(
        &self,
        target: impl Into<Value>,
        max_variables: Option<u32>,
        num_trees: u32,
        seed: Option<i64>,
    ) -> MlModel {
        self.fit_random_forest(
            "fit_regr_random_forest",
            target.into(),
            max_variables,
            num_trees,
            seed,
        )
    }

    pub fn flat_graph(&self) -> Result<FlatGraph> {
        self.node.flat_graph()
    }
}

impl MlModel {
    /// Wraps an existing node.
    pub fn from_node(node: impl Into<Arc<PGNode>>) -> Self {
        Self { node: node.into() }
    }

    /// Loads a model stored by an earlier job, by job id or URL.
    pub fn load_ml_model(id: &str) -> MlModel {
        MlModel::from_node(PGNode::with_arguments(
            "load_ml_model",
            arguments! { "id" => id },
        ))
    }

    pub fn node(&self) -> &Arc<PGNode> {
        &self.node
    }

    /// Stores the model so later jobs can load it.
    pub fn save_ml_model(&self, options: IndexMap<String, Json>) -> MlModel {
        MlModel::from_node(PGNode::with_arguments(
            "save_ml_model",
            arguments! {
                "data" => &self.node,
                "options" => options_value(options),
            },
        ))
    }

    pub fn flat_graph(&self) -> Result<FlatGraph> {
        self.node.flat_graph()
    }
}
