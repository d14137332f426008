//! Fluent data cube API on top of the node graph.
//!
//! Every cube method returns a new cube whose node takes the previous node as
//! its `data` argument. Cubes are cheap to clone: they share their node.

mod bandmath;
mod datacube;
mod metadata;
mod vector;

pub use bandmath::Operand;
pub use datacube::{DataCube, LoadCollection};
pub use metadata::{Band, BoundingBox, CubeMetadata};
pub use vector::{MlModel, VectorCube};

use crate::graph::{FlatGraph, GraphSource, PGNode, SubGraph, Value};
use std::sync::Arc;

/// A callback argument such as a reducer or an overlap resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    /// A predefined process applied to the callback parameters, e.g. `mean(data)`.
    Process(String),
    Node(Arc<PGNode>),
    Flat(FlatGraph),
}

impl Callback {
    /// The callback as a sub-graph. A predefined process receives each of
    /// `parameters` as a `from_parameter` argument of the same name.
    pub(crate) fn into_subgraph(self, parameters: &[&str]) -> SubGraph {
        match self {
            Callback::Process(process_id) => {
                let arguments = parameters
                    .iter()
                    .map(|p| (p.to_string(), Value::FromParameter(p.to_string())))
                    .collect();
                SubGraph::Node(Arc::new(PGNode::with_arguments(process_id, arguments)))
            }
            Callback::Node(node) => SubGraph::Node(node),
            Callback::Flat(graph) => SubGraph::Flat(graph),
        }
    }
}

impl From<&str> for Callback {
    fn from(process_id: &str) -> Self {
        Callback::Process(process_id.to_string())
    }
}

impl From<String> for Callback {
    fn from(process_id: String) -> Self {
        Callback::Process(process_id)
    }
}

impl From<PGNode> for Callback {
    fn from(node: PGNode) -> Self {
        Callback::Node(Arc::new(node))
    }
}

impl From<Arc<PGNode>> for Callback {
    fn from(node: Arc<PGNode>) -> Self {
        Callback::Node(node)
    }
}

impl From<FlatGraph> for Callback {
    fn from(graph: FlatGraph) -> Self {
        Callback::Flat(graph)
    }
}

macro_rules! impl_graph_source {
    ($($cube:ty),*) => {
        $(
            impl GraphSource for $cube {
                fn graph_node(&self) -> Arc<PGNode> {
                    Arc::clone(&self.node)
                }
            }

            impl From<&$cube> for Value {
                fn from(cube: &$cube) -> Self {
                    Value::from_source(cube)
                }
            }

            impl From<$cube> for Value {
                fn from(cube: $cube) -> Self {
                    Value::FromNode(cube.node)
                }
            }
        )*
    };
}

impl_graph_source!(DataCube, VectorCube, MlModel);
