use super::ids::IdGenerator;
use crate::error::VisitError;
use ahash::AHashMap;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use tracing::debug;

/// One entry of a flat process graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode {
    pub process_id: String,
    pub arguments: Map<String, Json>,
    pub namespace: Option<String>,
    pub description: Option<String>,
    pub result: bool,
}

impl FlatNode {
    /// An entry that is not the result.
    pub fn new(process_id: impl Into<String>, arguments: Map<String, Json>) -> Self {
        Self {
            process_id: process_id.into(),
            arguments,
            namespace: None,
            description: None,
            result: false,
        }
    }

    /// Wire form; `result` is only written when set.
    pub fn to_json(&self) -> Json {
        let mut entry = Map::new();
        entry.insert("process_id".into(), Json::String(self.process_id.clone()));
        entry.insert("arguments".into(), Json::Object(self.arguments.clone()));
        if let Some(namespace) = &self.namespace {
            entry.insert("namespace".into(), Json::String(namespace.clone()));
        }
        if let Some(description) = &self.description {
            entry.insert("description".into(), Json::String(description.clone()));
        }
        if self.result {
            entry.insert("result".into(), Json::Bool(true));
        }
        Json::Object(entry)
    }

    fn from_json(id: &str, value: &Json) -> Result<Self, VisitError> {
        let entry = value.as_object().ok_or_else(|| VisitError::Malformed {
            node: id.to_string(),
            message: "node entry is not an object".into(),
        })?;
        let process_id = entry
            .get("process_id")
            .and_then(Json::as_str)
            .ok_or_else(|| VisitError::MissingProcessId {
                node: id.to_string(),
            })?;
        let arguments = match entry.get("arguments") {
            None | Some(Json::Null) => Map::new(),
            Some(Json::Object(arguments)) => arguments.clone(),
            Some(_) => {
                return Err(VisitError::Malformed {
                    node: id.to_string(),
                    message: "arguments is not an object".into(),
                });
            }
        };
        Ok(Self {
            process_id: process_id.to_string(),
            arguments,
            namespace: entry
                .get("namespace")
                .and_then(Json::as_str)
                .map(str::to_string),
            description: entry
                .get("description")
                .and_then(Json::as_str)
                .map(str::to_string),
            result: entry.get("result").and_then(Json::as_bool).unwrap_or(false),
        })
    }
}

/// The canonical wire form: node id to entry, with references by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct FlatGraph {
    nodes: IndexMap<String, FlatNode>,
}

impl FlatGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the entry under `id`.
    pub fn insert(&mut self, id: impl Into<String>, node: FlatNode) {
        self.nodes.insert(id.into(), node);
    }

    /// The entry under `id`.
    pub fn get(&self, id: &str) -> Option<&FlatNode> {
        self.nodes.get(id)
    }

    /// Whether `id` names an entry.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of entries at this level.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no entries.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlatNode)> {
        self.nodes.iter()
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// The id of the single entry flagged as result.
    pub fn result_id(&self) -> Result<&str, VisitError> {
        let results: Vec<&str> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.result)
            .map(|(id, _)| id.as_str())
            .collect();
        match results.as_slice() {
            [id] => Ok(*id),
            [] => Err(VisitError::NoResultNode),
            _ => Err(VisitError::MultipleResultNodes {
                ids: results.iter().map(|id| id.to_string()).collect(),
            }),
        }
    }

    /// Flags `id` as the result and clears the flag everywhere else.
    pub fn set_result(&mut self, id: &str) {
        for (node_id, node) in self.nodes.iter_mut() {
            node.result = node_id == id;
        }
    }

    /// The `{id: entry}` object.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.to_json()))
                .collect(),
        )
    }

    /// Parses the `{id: entry}` object. References are not checked here.
    pub fn from_json(value: &Json) -> Result<Self, VisitError> {
        let entries = value.as_object().ok_or_else(|| VisitError::Malformed {
            node: "<root>".into(),
            message: "flat graph is not an object".into(),
        })?;
        let mut graph = FlatGraph::new();
        for (id, entry) in entries {
            graph.insert(id.clone(), FlatNode::from_json(id, entry)?);
        }
        Ok(graph)
    }

    /// Copies the graph under fresh ids drawn from `ids`, rewriting every
    /// `from_node` reference. Nested callback graphs are relabeled too, from
    /// the same generator.
    pub fn relabel(&self, ids: &mut IdGenerator) -> FlatGraph {
        let mapping: AHashMap<String, String> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), ids.generate(&node.process_id)))
            .collect();
        let mut relabeled = FlatGraph::new();
        for (id, node) in &self.nodes {
            let arguments = node
                .arguments
                .iter()
                .map(|(name, value)| (name.clone(), rewrite_references(value, &mapping, ids)))
                .collect();
            relabeled.insert(
                mapping.get(id).cloned().unwrap_or_else(|| id.clone()),
                FlatNode {
                    arguments,
                    ..node.clone()
                },
            );
        }
        relabeled
    }

    /// Appends a new result node whose arguments are built from the id of the
    /// current result. The current result loses its flag.
    pub fn chain(
        &self,
        process_id: &str,
        arguments: impl FnOnce(&str) -> Map<String, Json>,
    ) -> Result<FlatGraph, VisitError> {
        let previous = self.result_id()?.to_string();
        let mut ids = IdGenerator::reserving(self.ids());
        let id = ids.generate(process_id);
        let mut chained = self.clone();
        chained.insert(id.clone(), FlatNode::new(process_id, arguments(&previous)));
        chained.set_result(&id);
        debug!(process_id, previous = %previous, id = %id, "chained flat graph node");
        Ok(chained)
    }

    /// Combines two independently built graphs under a binary process.
    ///
    /// Both sides are relabeled into `ids`, so colliding ids of the inputs never
    /// clash. The new node takes the former results as `left_arg` and `right_arg`
    /// and becomes the only result.
    pub fn merge_binary(
        process_id: &str,
        left: &FlatGraph,
        right: &FlatGraph,
        left_arg: &str,
        right_arg: &str,
        ids: &mut IdGenerator,
    ) -> Result<FlatGraph, VisitError> {
        let left = left.relabel(ids);
        let right = right.relabel(ids);
        let left_result = left.result_id()?.to_string();
        let right_result = right.result_id()?.to_string();

        let mut merged = FlatGraph::new();
        for (id, node) in left.nodes.into_iter().chain(right.nodes) {
            merged.insert(id, node);
        }
        let mut arguments = Map::new();
        arguments.insert(left_arg.into(), json!({ "from_node": left_result }));
        arguments.insert(right_arg.into(), json!({ "from_node": right_result }));
        let id = ids.generate(process_id);
        merged.insert(id.clone(), FlatNode::new(process_id, arguments));
        merged.set_result(&id);
        debug!(
            process_id,
            nodes = merged.len(),
            ids = %merged.ids().join(","),
            "merged flat graphs"
        );
        Ok(merged)
    }
}

fn rewrite_references(
    value: &Json,
    mapping: &AHashMap<String, String>,
    ids: &mut IdGenerator,
) -> Json {
    match value {
        Json::Object(map) => {
            if let Some(Json::String(target)) = map.get("from_node") {
                if let Some(new_id) = mapping.get(target) {
                    return json!({ "from_node": new_id });
                }
            }
            if let Some(nested) = map.get("process_graph") {
                if let Ok(graph) = FlatGraph::from_json(nested) {
                    return json!({ "process_graph": graph.relabel(ids).to_json() });
                }
            }
            Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), rewrite_references(v, mapping, ids)))
                    .collect(),
            )
        }
        Json::Array(items) => Json::Array(
            items
                .iter()
                .map(|v| rewrite_references(v, mapping, ids))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl TryFrom<Json> for FlatGraph {
    type Error = VisitError;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        FlatGraph::from_json(&value)
    }
}

impl From<FlatGraph> for Json {
    fn from(graph: FlatGraph) -> Self {
        graph.to_json()
    }
}
