use super::display::GraphPrinter;
use super::flat::FlatGraph;
use super::flatten::Flattener;
use super::parameter::Parameter;
use super::unflatten::Unflattener;
use super::value::{Arguments, SubGraph, Value};
use crate::error::{GraphError, Result, VisitError};
use crate::resource::ProcessDefinition;
use indexmap::IndexMap;
use serde_json::{Map, Value as Json, json};
use std::fmt;
use std::sync::Arc;

/// One operation of a process graph: a process id, its arguments and an optional namespace.
///
/// Nodes are immutable once built. Edits such as [`PGNode::update_arguments`]
/// return a new node, so every `Arc<PGNode>` handed out keeps describing the
/// same operation. Equality is structural; sharing is tracked by `Arc` identity
/// and only matters for flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct PGNode {
    process_id: String,
    arguments: Arguments,
    namespace: Option<String>,
}

impl PGNode {
    /// A node without arguments.
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            arguments: Arguments::new(),
            namespace: None,
        }
    }

    /// A node with the given arguments and no namespace.
    pub fn with_arguments(process_id: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            process_id: process_id.into(),
            arguments,
            namespace: None,
        }
    }

    /// Starts a [`NodeBuilder`].
    pub fn builder(process_id: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(process_id)
    }

    /// The process this node invokes.
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    /// All arguments, in insertion order.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// A single argument by name.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// The process namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns a copy with `extra` merged over the existing arguments.
    pub fn update_arguments(&self, extra: Arguments) -> PGNode {
        let mut arguments = self.arguments.clone();
        arguments.extend(extra);
        PGNode {
            process_id: self.process_id.clone(),
            arguments,
            namespace: self.namespace.clone(),
        }
    }

    /// Returns a copy with a single argument set or replaced.
    pub fn with_argument(&self, name: impl Into<String>, value: impl Into<Value>) -> PGNode {
        let mut arguments = Arguments::new();
        arguments.insert(name.into(), value.into());
        self.update_arguments(arguments)
    }

    /// Nested (non-flattened) dictionary form, with referenced nodes expanded in place.
    pub fn to_dict(&self) -> Result<Json> {
        let mut arguments = Map::new();
        for (name, value) in &self.arguments {
            arguments.insert(name.clone(), value_to_dict(name, value)?);
        }
        let mut dict = Map::new();
        dict.insert("process_id".into(), Json::String(self.process_id.clone()));
        dict.insert("arguments".into(), Json::Object(arguments));
        if let Some(namespace) = &self.namespace {
            dict.insert("namespace".into(), Json::String(namespace.clone()));
        }
        Ok(Json::Object(dict))
    }

    /// Flattens the graph rooted at this node with a fresh id generator.
    pub fn flat_graph(&self) -> Result<FlatGraph> {
        Flattener::new().flatten(self)
    }

    /// Wire form for submission: `{"process_graph": {...}}`.
    pub fn to_process_graph_json(&self) -> Result<Json> {
        Ok(json!({ "process_graph": self.flat_graph()?.to_json() }))
    }

    /// Wraps the flattened graph as a user-defined process.
    pub fn to_process_definition(
        &self,
        id: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Result<ProcessDefinition> {
        Ok(ProcessDefinition {
            id: Some(id.into()),
            parameters,
            process_graph: self.flat_graph()?,
            ..ProcessDefinition::default()
        })
    }

    /// Rebuilds a nested node graph from its flat form.
    ///
    /// Without `parameters`, or with an empty table, `from_parameter`
    /// references stay placeholders. Otherwise every top-level parameter must
    /// be substitutable.
    pub fn from_flat_graph(
        flat: &FlatGraph,
        parameters: Option<IndexMap<String, Json>>,
    ) -> std::result::Result<Arc<PGNode>, VisitError> {
        let mut unflattener = Unflattener::new(flat);
        if let Some(parameters) = parameters.filter(|p| !p.is_empty()) {
            unflattener = unflattener.with_parameters(parameters);
        }
        unflattener.unflatten()
    }
}

impl fmt::Display for PGNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match GraphPrinter::render_node(self) {
            Ok(tree) => write!(f, "{}", tree),
            Err(_) => write!(f, "<{}>", self.process_id),
        }
    }
}

fn value_to_dict(argument: &str, value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Array(items) => Json::Array(
            items
                .iter()
                .map(|v| value_to_dict(argument, v))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), value_to_dict(argument, v)?);
            }
            Json::Object(out)
        }
        Value::FromNode(node) => json!({ "from_node": node.to_dict()? }),
        Value::FromParameter(name) => json!({ "from_parameter": name }),
        Value::ProcessGraph(SubGraph::Node(node)) => json!({ "process_graph": node.to_dict()? }),
        Value::ProcessGraph(SubGraph::Flat(graph)) => json!({ "process_graph": graph.to_json() }),
        literal => literal
            .literal_json()
            .ok_or_else(|| GraphError::ValueNotRepresentable {
                argument: argument.to_string(),
                value: literal.to_string(),
            })?,
    })
}

/// Fluent construction of a [`PGNode`].
///
/// Arguments can be given as a whole map and as individual keyword arguments.
/// Supplying the same name both ways is rejected by [`NodeBuilder::build`].
pub struct NodeBuilder {
    process_id: String,
    arguments: Option<Arguments>,
    keywords: Arguments,
    namespace: Option<String>,
}

impl NodeBuilder {
    /// A builder without arguments.
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            arguments: None,
            keywords: Arguments::new(),
            namespace: None,
        }
    }

    /// Sets the whole argument map.
    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Adds one keyword argument.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// Sets the process namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Fails with `AmbiguousArgument` when a keyword repeats a name of the argument map.
    pub fn build(self) -> Result<PGNode> {
        let mut arguments = self.arguments.unwrap_or_default();
        for (name, value) in self.keywords {
            if arguments.contains_key(&name) {
                return Err(GraphError::AmbiguousArgument {
                    process_id: self.process_id,
                    argument: name,
                });
            }
            arguments.insert(name, value);
        }
        Ok(PGNode {
            process_id: self.process_id,
            arguments,
            namespace: self.namespace,
        })
    }
}
