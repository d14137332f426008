use super::flat::FlatGraph;
use super::node::PGNode;
use super::parameter::Parameter;
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;

/// Ordered mapping of argument name to value. Insertion order is the walk order.
pub type Arguments = IndexMap<String, Value>;

/// An argument value of a process graph node.
///
/// Literal JSON structure and the three reference kinds (`from_node`,
/// `from_parameter`, `process_graph`) are distinct variants, so consumers
/// dispatch by pattern instead of inspecting object keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Result of another node.
    FromNode(Arc<PGNode>),
    /// Reference to a named parameter of the enclosing process.
    FromParameter(String),
    /// A callback: a sub-graph with its own result node.
    ProcessGraph(SubGraph),
}

/// The two forms a callback sub-graph can be given in.
#[derive(Debug, Clone, PartialEq)]
pub enum SubGraph {
    Node(Arc<PGNode>),
    Flat(FlatGraph),
}

/// Anything that stands for the result of a process graph node.
///
/// Passing such an object as an argument turns it into a `from_node` reference.
pub trait GraphSource {
    fn graph_node(&self) -> Arc<PGNode>;
}

impl GraphSource for Arc<PGNode> {
    fn graph_node(&self) -> Arc<PGNode> {
        Arc::clone(self)
    }
}

impl Value {
    /// Wraps the node behind `source` as a `from_node` reference.
    pub fn from_source<S: GraphSource + ?Sized>(source: &S) -> Self {
        Value::FromNode(source.graph_node())
    }

    /// Null, bool, number or string.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// The node this value references, if it is a `from_node` reference.
    pub fn as_node(&self) -> Option<&Arc<PGNode>> {
        match self {
            Value::FromNode(node) => Some(node),
            _ => None,
        }
    }

    /// The string, for `Value::String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a literal into its JSON form. Returns `None` for references,
    /// containers and non-finite floats.
    pub fn literal_json(&self) -> Option<Json> {
        match self {
            Value::Null => Some(Json::Null),
            Value::Bool(b) => Some(Json::Bool(*b)),
            Value::Int(i) => Some(Json::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number),
            Value::String(s) => Some(Json::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::FromNode(node) => write!(f, "<from_node {}>", node.process_id()),
            Value::FromParameter(name) => write!(f, "<from_parameter {}>", name),
            Value::ProcessGraph(_) => write!(f, "<process_graph>"),
        }
    }
}

impl From<Json> for Value {
    /// Literal conversion: JSON objects stay plain objects, even when they
    /// look like references.
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $( impl From<$t> for Value { fn from(v: $t) -> Self { Value::Int(i64::from(v)) } } )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

/// Values beyond `i64::MAX` become floats.
macro_rules! impl_from_wide_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    i64::try_from(v)
                        .map(Value::Int)
                        .unwrap_or(Value::Float(v as f64))
                }
            }
        )*
    };
}

impl_from_wide_unsigned!(u64, usize);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

/// Lists are normalized one level deep: each element goes through its own `Into<Value>`.
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<PGNode> for Value {
    fn from(node: PGNode) -> Self {
        Value::FromNode(Arc::new(node))
    }
}

impl From<Arc<PGNode>> for Value {
    fn from(node: Arc<PGNode>) -> Self {
        Value::FromNode(node)
    }
}

impl From<&Arc<PGNode>> for Value {
    fn from(node: &Arc<PGNode>) -> Self {
        Value::FromNode(Arc::clone(node))
    }
}

impl From<Parameter> for Value {
    fn from(parameter: Parameter) -> Self {
        Value::FromParameter(parameter.name)
    }
}

impl From<&Parameter> for Value {
    fn from(parameter: &Parameter) -> Self {
        Value::FromParameter(parameter.name.clone())
    }
}

impl From<SubGraph> for Value {
    fn from(graph: SubGraph) -> Self {
        Value::ProcessGraph(graph)
    }
}

impl From<FlatGraph> for SubGraph {
    fn from(graph: FlatGraph) -> Self {
        SubGraph::Flat(graph)
    }
}

impl From<PGNode> for SubGraph {
    fn from(node: PGNode) -> Self {
        SubGraph::Node(Arc::new(node))
    }
}

impl From<Arc<PGNode>> for SubGraph {
    fn from(node: Arc<PGNode>) -> Self {
        SubGraph::Node(node)
    }
}

/// Builds an [`Arguments`] map, converting every value with `Into<Value>`.
///
/// ```
/// use openeo_pg::arguments;
/// use openeo_pg::graph::Value;
///
/// let args = arguments! { "x" => 3, "y" => "four" };
/// assert_eq!(args["x"], Value::Int(3));
/// ```
#[macro_export]
macro_rules! arguments {
    () => { $crate::graph::Arguments::new() };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut args = $crate::graph::Arguments::new();
        $( args.insert(($key).to_string(), $crate::graph::Value::from($value)); )+
        args
    }};
}
