use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A named placeholder for a value that is bound when the process is executed.
///
/// Used as an argument it becomes `{"from_parameter": name}`. In a process
/// definition it declares the parameter with its schema and optional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "default_schema")]
    pub schema: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

fn default_schema() -> Json {
    Json::Object(serde_json::Map::new())
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Parameter {
    /// A required parameter accepting any value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            schema: default_schema(),
            default: None,
            optional: false,
        }
    }

    /// Declares a default value, which also makes the parameter optional.
    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self.optional = true;
        self
    }

    /// JSON schema of accepted values.
    pub fn with_schema(mut self, schema: Json) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The parameter every data cube callback receives.
    pub fn data() -> Self {
        Self::new("data")
    }

    /// Collects the declared defaults of `parameters`, keyed by name.
    pub fn defaults(parameters: &[Parameter]) -> IndexMap<String, Json> {
        parameters
            .iter()
            .filter_map(|p| p.default.as_ref().map(|d| (p.name.clone(), d.clone())))
            .collect()
    }
}
