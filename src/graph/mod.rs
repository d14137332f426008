pub mod display;
pub mod flat;
pub mod flatten;
pub mod ids;
pub mod node;
pub mod parameter;
pub mod unflatten;
pub mod value;
pub mod visitor;

pub use display::GraphPrinter;
pub use flat::{FlatGraph, FlatNode};
pub use flatten::{FlattenOptions, Flattener, FlattenerBuilder, IdScope};
pub use ids::IdGenerator;
pub use node::{NodeBuilder, PGNode};
pub use parameter::Parameter;
pub use unflatten::Unflattener;
pub use value::{Arguments, GraphSource, SubGraph, Value};
pub use visitor::{
    DereferencedGraph, ProcessGraphVisitor, accept_process_graph, dereference_from_node_arguments,
    walk_flat_node, walk_node,
};
