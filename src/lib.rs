//! # openeo-pg - openEO Process Graph Builder
//!
//! **openeo-pg** builds openEO process graphs client side and compiles them into the
//! flat JSON format that openEO backends accept. Graphs are described as a DAG of
//! immutable nodes, either directly or through a fluent data cube API, and flattened
//! into `{id: {process_id, arguments, result?}}` with deterministic ids.
//!
//! ## Core Workflow
//!
//! 1.  **Build**: Chain [`cube::DataCube`] methods (`load_collection`, `filter_bbox`,
//!     `band`, arithmetic, `save_result`, ...) or construct [`graph::PGNode`]s yourself.
//!     A node passed as an argument becomes a `from_node` reference; passing the same
//!     node twice shares it.
//! 2.  **Flatten**: [`graph::Flattener`] walks the nodes with a [`graph::ProcessGraphVisitor`],
//!     deduplicates shared nodes, flattens callbacks (reducers) into nested graphs and marks
//!     exactly one result node per graph level.
//! 3.  **Load**: [`resource::ProcessDefinition`] reads flat graphs from JSON text, files or
//!     URLs, and [`graph::Unflattener`] turns them back into nodes, optionally
//!     substituting parameter values.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openeo_pg::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cube = DataCube::load_collection("SENTINEL2_L2A")
//!         .spatial_extent(BoundingBox::new(5.0, 51.0, 5.1, 51.1))
//!         .temporal_extent("2024-05-01", "2024-06-01")
//!         .bands(["B04", "B08"])
//!         .build()?;
//!
//!     // Band math stays inside a single reduce_dimension node.
//!     let red = cube.band("B04")?;
//!     let nir = cube.band("B08")?;
//!     let ndvi = (&(&nir - &red)? / &(&nir + &red)?)?;
//!
//!     let result = ndvi.save_result("GTiff", Default::default());
//!     println!("{}", serde_json::to_string_pretty(&result.to_json()?)?);
//!
//!     // And back again.
//!     let flat = result.flat_graph()?;
//!     let node = PGNode::from_flat_graph(&flat, None)?;
//!     assert_eq!(node.process_id(), "save_result");
//!     Ok(())
//! }
//! ```

pub mod cube;
pub mod error;
pub mod graph;
pub mod prelude;
pub mod resource;
