//! Traversal of process graphs.
//!
//! A single walk order serves both graph forms. Nested graphs are walked
//! through `from_node` pointers ([`walk_node`]); flat graphs are first
//! validated by [`dereference_from_node_arguments`] and then walked by id
//! ([`walk_flat_node`]) as if they were nested. Consumers implement
//! [`ProcessGraphVisitor`] and override only the hooks they need.

use super::flat::{FlatGraph, FlatNode};
use super::node::PGNode;
use super::value::Value;
use crate::error::{Result, VisitError};
use ahash::AHashMap;
use serde_json::Value as Json;
use tracing::debug;

/// Callback hooks invoked during a walk. All hooks default to no-ops.
///
/// Arguments of a process are visited in insertion order:
/// - arrays: `enter_array`, then per element either `constant_array_element`
///   or a walk of the element followed by `array_element_done`, then `leave_array`;
/// - objects and references: `enter_argument`, a walk of the value, `leave_argument`;
/// - literals: `constant_argument`.
///
/// Walking a value follows `from_node` references (through [`visit_node`] or
/// [`visit_flat_node`]), reports `from_parameter` references and recurses
/// into plain objects and arrays. Callback sub-graphs (`process_graph`) are
/// a separate graph level and are not entered.
///
/// [`visit_node`]: ProcessGraphVisitor::visit_node
/// [`visit_flat_node`]: ProcessGraphVisitor::visit_flat_node
#[allow(unused_variables)]
pub trait ProcessGraphVisitor {
    fn enter_process(&mut self, process_id: &str, namespace: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn leave_process(&mut self, process_id: &str, namespace: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn enter_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        Ok(())
    }

    fn leave_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        Ok(())
    }

    fn constant_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        Ok(())
    }

    fn enter_array(&mut self, argument_id: &str) -> Result<()> {
        Ok(())
    }

    fn leave_array(&mut self, argument_id: &str) -> Result<()> {
        Ok(())
    }

    fn array_element_done(&mut self, value: &Value) -> Result<()> {
        Ok(())
    }

    fn constant_array_element(&mut self, value: &Value) -> Result<()> {
        Ok(())
    }

    fn from_parameter(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    /// Called for the root and for every `from_node` target of a nested graph.
    fn visit_node(&mut self, node: &PGNode) -> Result<()> {
        walk_node(self, node)
    }

    /// Called for the result node and every `from_node` target of a flat graph.
    fn visit_flat_node(&mut self, graph: &DereferencedGraph<'_>, id: &str) -> Result<()> {
        walk_flat_node(self, graph, id)
    }
}

/// Walks the arguments of `node`, invoking the hooks of `visitor`.
pub fn walk_node<V: ProcessGraphVisitor + ?Sized>(visitor: &mut V, node: &PGNode) -> Result<()> {
    visitor.enter_process(node.process_id(), node.namespace())?;
    for (name, value) in node.arguments() {
        match value {
            Value::Array(items) => {
                visitor.enter_array(name)?;
                for item in items {
                    if item.is_literal() {
                        visitor.constant_array_element(item)?;
                    } else {
                        walk_value(visitor, item)?;
                        visitor.array_element_done(item)?;
                    }
                }
                visitor.leave_array(name)?;
            }
            literal if literal.is_literal() => visitor.constant_argument(name, literal)?,
            other => {
                visitor.enter_argument(name, other)?;
                walk_value(visitor, other)?;
                visitor.leave_argument(name, other)?;
            }
        }
    }
    visitor.leave_process(node.process_id(), node.namespace())
}

fn walk_value<V: ProcessGraphVisitor + ?Sized>(visitor: &mut V, value: &Value) -> Result<()> {
    match value {
        Value::FromNode(node) => visitor.visit_node(node),
        Value::FromParameter(name) => visitor.from_parameter(name),
        Value::Object(map) => map.values().try_for_each(|v| walk_value(visitor, v)),
        Value::Array(items) => items.iter().try_for_each(|v| walk_value(visitor, v)),
        _ => Ok(()),
    }
}

/// Walks a flat graph from its result node.
pub fn accept_process_graph<V: ProcessGraphVisitor + ?Sized>(
    visitor: &mut V,
    graph: &FlatGraph,
) -> Result<()> {
    let dereferenced = dereference_from_node_arguments(graph)?;
    let result = dereferenced.result_id().to_string();
    visitor.visit_flat_node(&dereferenced, &result)
}

/// Walks the arguments of flat node `id`, invoking the hooks of `visitor`.
///
/// Hooks receive argument values as literal [`Value`]s; `from_node` targets
/// are walked through [`ProcessGraphVisitor::visit_flat_node`].
pub fn walk_flat_node<V: ProcessGraphVisitor + ?Sized>(
    visitor: &mut V,
    graph: &DereferencedGraph<'_>,
    id: &str,
) -> Result<()> {
    let node = graph.node(id)?;
    visitor.enter_process(&node.process_id, node.namespace.as_deref())?;
    for (name, json) in &node.arguments {
        match json {
            Json::Array(items) => {
                visitor.enter_array(name)?;
                for item in items {
                    let element = Value::from(item.clone());
                    if element.is_literal() {
                        visitor.constant_array_element(&element)?;
                    } else {
                        walk_flat_value(visitor, graph, item)?;
                        visitor.array_element_done(&element)?;
                    }
                }
                visitor.leave_array(name)?;
            }
            Json::Object(_) => {
                let value = Value::from(json.clone());
                visitor.enter_argument(name, &value)?;
                walk_flat_value(visitor, graph, json)?;
                visitor.leave_argument(name, &value)?;
            }
            literal => visitor.constant_argument(name, &Value::from(literal.clone()))?,
        }
    }
    visitor.leave_process(&node.process_id, node.namespace.as_deref())
}

fn walk_flat_value<V: ProcessGraphVisitor + ?Sized>(
    visitor: &mut V,
    graph: &DereferencedGraph<'_>,
    value: &Json,
) -> Result<()> {
    match value {
        Json::Object(map) => {
            if let Some(target) = map.get("from_node").and_then(Json::as_str) {
                visitor.visit_flat_node(graph, target)
            } else if let Some(name) = map.get("from_parameter").and_then(Json::as_str) {
                visitor.from_parameter(name)
            } else if map.contains_key("process_graph") {
                Ok(())
            } else {
                map.values()
                    .try_for_each(|v| walk_flat_value(visitor, graph, v))
            }
        }
        Json::Array(items) => items
            .iter()
            .try_for_each(|v| walk_flat_value(visitor, graph, v)),
        _ => Ok(()),
    }
}

/// A flat graph whose references have been checked, ready to be walked.
#[derive(Debug, Clone)]
pub struct DereferencedGraph<'g> {
    graph: &'g FlatGraph,
    result: String,
}

impl<'g> DereferencedGraph<'g> {
    /// Id of the level's result node.
    pub fn result_id(&self) -> &str {
        &self.result
    }

    /// The validated level.
    pub fn graph(&self) -> &'g FlatGraph {
        self.graph
    }

    /// The entry under `id`; dangling ids were rejected by dereferencing.
    pub fn node(&self, id: &str) -> std::result::Result<&'g FlatNode, VisitError> {
        self.graph
            .get(id)
            .ok_or_else(|| VisitError::DanglingReference {
                missing: id.to_string(),
                referenced_by: self.result.clone(),
            })
    }
}

/// Resolves every `from_node` reference of a flat graph and returns a handle
/// for walking it from its result node.
///
/// Fails when the graph has no or several result nodes, when a reference
/// points to a missing id, or when references form a cycle. Nested callback
/// graphs are checked the same way, each as its own level.
pub fn dereference_from_node_arguments(
    graph: &FlatGraph,
) -> std::result::Result<DereferencedGraph<'_>, VisitError> {
    let result = graph.result_id()?.to_string();

    let mut edges: AHashMap<&str, Vec<String>> = AHashMap::new();
    for (id, node) in graph.iter() {
        let mut targets = Vec::new();
        for value in node.arguments.values() {
            collect_references(value, &mut targets)?;
        }
        for target in &targets {
            if !graph.contains(target) {
                return Err(VisitError::DanglingReference {
                    missing: target.clone(),
                    referenced_by: id.clone(),
                });
            }
        }
        edges.insert(id.as_str(), targets);
    }

    detect_cycles(graph, &edges)?;
    debug!(result = %result, nodes = graph.len(), "dereferenced flat graph");

    Ok(DereferencedGraph { graph, result })
}

/// Collects the `from_node` targets of one argument value. Nested callback
/// graphs are validated on the spot instead of contributing edges.
fn collect_references(
    value: &Json,
    targets: &mut Vec<String>,
) -> std::result::Result<(), VisitError> {
    match value {
        Json::Object(map) => {
            if let Some(target) = map.get("from_node").and_then(Json::as_str) {
                targets.push(target.to_string());
            } else if let Some(nested) = map.get("process_graph") {
                let nested = FlatGraph::from_json(nested)?;
                dereference_from_node_arguments(&nested)?;
            } else {
                for v in map.values() {
                    collect_references(v, targets)?;
                }
            }
        }
        Json::Array(items) => {
            for v in items {
                collect_references(v, targets)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

fn detect_cycles(
    graph: &FlatGraph,
    edges: &AHashMap<&str, Vec<String>>,
) -> std::result::Result<(), VisitError> {
    let mut marks: AHashMap<String, Mark> = AHashMap::new();
    for id in graph.ids() {
        if marks.contains_key(id) {
            continue;
        }
        // Iterative DFS: (node, index of next outgoing edge)
        let mut stack: Vec<(String, usize)> = vec![(id.to_string(), 0)];
        marks.insert(id.to_string(), Mark::Visiting);
        while let Some((current, next)) = stack.pop() {
            let targets = edges.get(current.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(target) = targets.get(next) {
                stack.push((current, next + 1));
                match marks.get(target.as_str()) {
                    Some(Mark::Visiting) => {
                        return Err(VisitError::CycleDetected {
                            node: target.clone(),
                        });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(target.clone(), Mark::Visiting);
                        stack.push((target.clone(), 0));
                    }
                }
            } else {
                marks.insert(current, Mark::Done);
            }
        }
    }
    Ok(())
}
