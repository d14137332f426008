use thiserror::Error;

/// Result alias for graph construction and flattening.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Errors that can occur while building nodes or flattening them into the wire format.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error(
        "Argument '{argument}' of process '{process_id}' was given both in the arguments map and as a keyword argument"
    )]
    AmbiguousArgument {
        process_id: String,
        argument: String,
    },

    #[error("Value of argument '{argument}' is not representable in a process graph: {value}")]
    ValueNotRepresentable { argument: String, value: String },

    #[error("Process '{process_id}' is missing required argument '{argument}'")]
    MissingArgument {
        process_id: String,
        argument: String,
    },

    #[error("Band '{band}' not found, available bands: {available:?}")]
    UnknownBand {
        band: String,
        available: Vec<String>,
    },

    #[error("Cube has no {0} dimension")]
    MissingDimension(&'static str),

    #[error("Expected a reduce_dimension node with a reducer callback, found process '{0}'")]
    NotAReduceNode(String),

    #[error(transparent)]
    Visit(#[from] VisitError),
}

/// Errors raised while walking, dereferencing or unflattening a flat process graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisitError {
    #[error("No result node in process graph")]
    NoResultNode,

    #[error("Multiple result nodes in process graph: {ids:?}")]
    MultipleResultNodes { ids: Vec<String> },

    #[error("from_node '{missing}' (referenced by '{referenced_by}') not in process graph")]
    DanglingReference {
        missing: String,
        referenced_by: String,
    },

    #[error("Node '{node}' has no process_id")]
    MissingProcessId { node: String },

    #[error("Cycle detected in process graph at node '{node}'")]
    CycleDetected { node: String },

    #[error("No substitution value for parameter '{name}'")]
    UnresolvedParameter { name: String },

    #[error("Node '{node}' is malformed: {message}")]
    Malformed { node: String, message: String },
}

/// Errors that can occur when loading a process graph from a JSON resource.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse process graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot load '{0}': no URL fetcher configured")]
    UnsupportedUrl(String),

    #[error("Failed to fetch resource: {0}")]
    Fetch(String),

    #[error("Resource is not a process graph: {0}")]
    NotAProcessGraph(String),

    #[error(transparent)]
    Visit(#[from] VisitError),
}
