//! Loading process graphs from JSON resources.
//!
//! A resource is a raw JSON string, a file path or an `http(s)://` URL. Its
//! content is either a bare flat graph or a process definition envelope
//! (`{"id": ..., "parameters": [...], "process_graph": {...}}`).

use crate::error::{ResourceError, VisitError};
use crate::graph::{FlatGraph, PGNode, Parameter, Unflattener};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fs;
use std::sync::Arc;
use tracing::debug;

/// Retrieves the body of an `http(s)://` resource.
///
/// The crate performs no network access itself; callers that want to load
/// graphs from URLs plug in their HTTP client here.
pub trait UrlFetcher {
    fn fetch(&self, url: &str) -> Result<String, ResourceError>;
}

impl<F> UrlFetcher for F
where
    F: Fn(&str) -> Result<String, ResourceError>,
{
    fn fetch(&self, url: &str) -> Result<String, ResourceError> {
        self(url)
    }
}

fn is_url(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Parses `src` as JSON text, a URL or a file path, in that order.
pub fn load_json_resource(
    src: &str,
    fetcher: Option<&dyn UrlFetcher>,
) -> Result<Json, ResourceError> {
    let trimmed = src.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        debug!(bytes = src.len(), "parsing inline JSON resource");
        return Ok(serde_json::from_str(src)?);
    }
    if is_url(src) {
        let fetcher = fetcher.ok_or_else(|| ResourceError::UnsupportedUrl(src.to_string()))?;
        debug!(url = src, "fetching JSON resource");
        let body = fetcher.fetch(src)?;
        return Ok(serde_json::from_str(&body)?);
    }
    debug!(path = src, "reading JSON resource");
    let content = fs::read_to_string(src).map_err(|source| ResourceError::Io {
        path: src.to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// A process graph together with its metadata, as stored for user-defined processes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Json>,
    #[serde(default)]
    pub process_graph: FlatGraph,
}

impl ProcessDefinition {
    /// Accepts an envelope with a `process_graph` key or a bare flat graph.
    pub fn from_json(value: Json) -> Result<Self, ResourceError> {
        let Json::Object(mut map) = value else {
            return Err(ResourceError::NotAProcessGraph(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        };
        match map.remove("process_graph") {
            Some(graph) => {
                let process_graph = FlatGraph::from_json(&graph)?;
                let mut definition: ProcessDefinition = serde_json::from_value(Json::Object(map))?;
                definition.process_graph = process_graph;
                Ok(definition)
            }
            None => Ok(ProcessDefinition {
                process_graph: FlatGraph::from_json(&Json::Object(map))?,
                ..ProcessDefinition::default()
            }),
        }
    }

    /// [`load_json_resource`] followed by [`ProcessDefinition::from_json`].
    pub fn load(src: &str, fetcher: Option<&dyn UrlFetcher>) -> Result<Self, ResourceError> {
        Self::from_json(load_json_resource(src, fetcher)?)
    }

    /// Defaults of the declared parameters.
    pub fn parameter_defaults(&self) -> IndexMap<String, Json> {
        Parameter::defaults(&self.parameters)
    }

    /// Rebuilds the nested node graph.
    ///
    /// The substitution table is the declared defaults overridden by
    /// `parameters`. When it is empty, `from_parameter` references stay
    /// placeholders; otherwise a top-level reference missing from it fails.
    pub fn to_node(
        &self,
        parameters: Option<IndexMap<String, Json>>,
    ) -> Result<Arc<PGNode>, VisitError> {
        let unflattener = Unflattener::new(&self.process_graph);
        let mut table = self.parameter_defaults();
        table.extend(parameters.unwrap_or_default());
        if table.is_empty() {
            return unflattener.unflatten();
        }
        debug!(
            id = self.id.as_deref().unwrap_or("<anonymous>"),
            parameters = table.len(),
            "substituting process parameters"
        );
        unflattener.with_parameters(table).unflatten()
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
