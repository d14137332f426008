use super::flat::FlatGraph;
use super::node::PGNode;
use super::value::{Arguments, SubGraph, Value};
use crate::error::VisitError;
use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;

/// Rebuilds a nested node graph from a flat graph.
///
/// Every flat entry becomes exactly one `Arc<PGNode>`, so entries referenced
/// from several places are shared again and flatten back to a single entry.
///
/// Without a substitution table `from_parameter` references stay
/// placeholders. With a table every reference of the top-level graph must be
/// substitutable. Callback graphs are never substituted: their parameters are
/// bound by the invoking process and shadow outer names.
pub struct Unflattener<'g> {
    graph: &'g FlatGraph,
    parameters: Option<IndexMap<String, Json>>,
    nodes: AHashMap<String, Arc<PGNode>>,
    in_progress: AHashSet<String>,
}

impl<'g> Unflattener<'g> {
    /// An unflattener that keeps `from_parameter` placeholders.
    pub fn new(graph: &'g FlatGraph) -> Self {
        Self {
            graph,
            parameters: None,
            nodes: AHashMap::new(),
            in_progress: AHashSet::new(),
        }
    }

    /// Switches to substitution mode.
    pub fn with_parameters(mut self, parameters: IndexMap<String, Json>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Returns the node of the graph's result entry.
    pub fn unflatten(mut self) -> Result<Arc<PGNode>, VisitError> {
        let result = self.graph.result_id()?.to_string();
        debug!(
            result = %result,
            substitution = self.parameters.is_some(),
            "unflattening process graph"
        );
        self.node(&result)
    }

    fn node(&mut self, id: &str) -> Result<Arc<PGNode>, VisitError> {
        if let Some(node) = self.nodes.get(id) {
            return Ok(Arc::clone(node));
        }
        if !self.in_progress.insert(id.to_string()) {
            return Err(VisitError::CycleDetected {
                node: id.to_string(),
            });
        }
        let graph = self.graph;
        let entry = graph.get(id).ok_or_else(|| VisitError::DanglingReference {
            missing: id.to_string(),
            referenced_by: "<result>".into(),
        })?;

        let mut arguments = Arguments::new();
        for (name, value) in &entry.arguments {
            arguments.insert(name.clone(), self.value(id, value)?);
        }
        let mut builder = PGNode::builder(&entry.process_id).arguments(arguments);
        if let Some(namespace) = &entry.namespace {
            builder = builder.namespace(namespace);
        }
        let node = Arc::new(builder.build().map_err(|e| VisitError::Malformed {
            node: id.to_string(),
            message: e.to_string(),
        })?);

        self.in_progress.remove(id);
        self.nodes.insert(id.to_string(), Arc::clone(&node));
        Ok(node)
    }

    fn value(&mut self, owner: &str, value: &Json) -> Result<Value, VisitError> {
        match value {
            Json::Object(map) => {
                if let Some(target) = map.get("from_node") {
                    let target = target.as_str().ok_or_else(|| VisitError::Malformed {
                        node: owner.to_string(),
                        message: "from_node is not a string".into(),
                    })?;
                    if !self.graph.contains(target) {
                        return Err(VisitError::DanglingReference {
                            missing: target.to_string(),
                            referenced_by: owner.to_string(),
                        });
                    }
                    return Ok(Value::FromNode(self.node(target)?));
                }
                if let Some(name) = map.get("from_parameter").and_then(Json::as_str) {
                    return self.parameter(name);
                }
                if let Some(nested) = map.get("process_graph") {
                    let nested = FlatGraph::from_json(nested)?;
                    let node = Unflattener::new(&nested).unflatten()?;
                    return Ok(Value::ProcessGraph(SubGraph::Node(node)));
                }
                let mut object = IndexMap::new();
                for (k, v) in map {
                    object.insert(k.clone(), self.value(owner, v)?);
                }
                Ok(Value::Object(object))
            }
            Json::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|v| self.value(owner, v))
                    .collect::<Result<_, _>>()?,
            )),
            literal => Ok(Value::from(literal.clone())),
        }
    }

    fn parameter(&self, name: &str) -> Result<Value, VisitError> {
        match &self.parameters {
            None => Ok(Value::FromParameter(name.to_string())),
            Some(parameters) => match parameters.get(name) {
                Some(value) => Ok(Value::from(value.clone())),
                None => Err(VisitError::UnresolvedParameter {
                    name: name.to_string(),
                }),
            },
        }
    }
}
