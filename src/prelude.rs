//! Prelude module for convenient imports
//!
//! Re-exports the node model, the flattening machinery and the cube API.
//!
//! # Example
//!
//! ```rust
//! use openeo_pg::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let pi = PGNode::new("pi");
//! let add = PGNode::with_arguments("add", arguments! { "x" => pi, "y" => 5 });
//! let flat = add.flat_graph()?;
//! assert_eq!(flat.result_id()?, "add1");
//! # Ok(())
//! # }
//! # run_example().unwrap();
//! ```

// Graph model
pub use crate::arguments;
pub use crate::graph::{
    Arguments, FlatGraph, FlatNode, GraphSource, NodeBuilder, PGNode, Parameter, SubGraph, Value,
};

// Flattening and traversal
pub use crate::graph::{
    Flattener, GraphPrinter, IdGenerator, IdScope, ProcessGraphVisitor, Unflattener,
    dereference_from_node_arguments,
};

// Cube API
pub use crate::cube::{Band, BoundingBox, Callback, CubeMetadata, DataCube, MlModel, VectorCube};

// Loading
pub use crate::resource::{ProcessDefinition, UrlFetcher, load_json_resource};

// Error types
pub use crate::error::{GraphError, ResourceError, Result, VisitError};
