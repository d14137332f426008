use super::flat::{FlatGraph, FlatNode};
use super::ids::IdGenerator;
use super::node::PGNode;
use super::value::{SubGraph, Value};
use super::visitor::{ProcessGraphVisitor, dereference_from_node_arguments, walk_node};
use crate::error::{GraphError, Result, VisitError};
use ahash::AHashMap;
use serde_json::{Map, Value as Json, json};
use tracing::debug;

/// How ids are drawn for nested callback graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScope {
    /// Callbacks draw from the generator of the enclosing graph, so no id
    /// appears twice anywhere in the output.
    #[default]
    Shared,
    /// Every callback level starts with fresh counters.
    PerGraph,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    pub id_scope: IdScope,
}

pub struct FlattenerBuilder {
    options: FlattenOptions,
    ids: IdGenerator,
}

impl FlattenerBuilder {
    /// Whether callbacks share the outer id generator.
    pub fn id_scope(mut self, scope: IdScope) -> Self {
        self.options.id_scope = scope;
        self
    }

    /// Continues the namespace of an existing generator.
    /// Starts from an existing generator, so its issued ids are skipped.
    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Finishes the flattener.
    pub fn build(self) -> Flattener {
        Flattener::with_parts(self.options, self.ids)
    }
}

/// Argument accumulator of the process or array currently being rebuilt.
enum Frame {
    Arguments(Map<String, Json>),
    Array(String, Vec<Json>),
}

/// Converts a nested node graph into the flat wire format.
///
/// Nodes are flattened in post-order: referenced nodes get their ids before
/// the nodes that use them. A node instance reached more than once is
/// flattened once; later visits reuse its id. Structurally equal but
/// separately built nodes stay separate entries.
pub struct Flattener {
    options: FlattenOptions,
    ids: IdGenerator,
    /// Node instance address to generated id.
    node_cache: AHashMap<usize, String>,
    flattened: FlatGraph,
    frames: Vec<Frame>,
    last_node_id: Option<String>,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new()
    }
}

impl Flattener {
    /// A flattener with a shared id scope and a fresh generator.
    pub fn new() -> Self {
        Self::with_parts(FlattenOptions::default(), IdGenerator::new())
    }

    /// Starts a [`FlattenerBuilder`].
    pub fn builder() -> FlattenerBuilder {
        FlattenerBuilder {
            options: FlattenOptions::default(),
            ids: IdGenerator::new(),
        }
    }

    fn with_parts(options: FlattenOptions, ids: IdGenerator) -> Self {
        Self {
            options,
            ids,
            node_cache: AHashMap::new(),
            flattened: FlatGraph::new(),
            frames: Vec::new(),
            last_node_id: None,
        }
    }

    /// Generator holding every id issued so far.
    pub fn id_generator(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn into_id_generator(self) -> IdGenerator {
        self.ids
    }

    /// Flattens the graph rooted at `root` and marks the root entry as result.
    ///
    /// The id generator carries over between calls on the same flattener; the
    /// node cache does not.
    pub fn flatten(&mut self, root: &PGNode) -> Result<FlatGraph> {
        self.node_cache.clear();
        self.frames.clear();
        self.flattened = FlatGraph::new();

        let root_id = self.node_id(root)?;
        let mut flattened = std::mem::take(&mut self.flattened);
        flattened.set_result(&root_id);
        debug!(
            root = %root_id,
            nodes = flattened.len(),
            "flattened process graph"
        );
        Ok(flattened)
    }

    /// Id of `node`, flattening it first when it has not been seen yet.
    fn node_id(&mut self, node: &PGNode) -> Result<String> {
        self.visit_node(node)?;
        self.last_node_id.clone().ok_or_else(|| {
            GraphError::from(VisitError::Malformed {
                node: node.process_id().to_string(),
                message: "node produced no flat graph entry".into(),
            })
        })
    }

    fn flatten_callback(&mut self, node: &PGNode) -> Result<FlatGraph> {
        let ids = match self.options.id_scope {
            IdScope::Shared => std::mem::take(&mut self.ids),
            IdScope::PerGraph => IdGenerator::new(),
        };
        let mut nested = Flattener::with_parts(self.options, ids);
        let result = nested.flatten(node);
        if self.options.id_scope == IdScope::Shared {
            self.ids = nested.into_id_generator();
        }
        debug!(process_id = node.process_id(), "flattened callback");
        result
    }

    /// A flat callback must be a valid graph level on its own. Under a shared
    /// id scope its ids are redrawn from the outer generator.
    fn embed_flat_callback(&mut self, graph: &FlatGraph) -> Result<FlatGraph> {
        dereference_from_node_arguments(graph)?;
        Ok(match self.options.id_scope {
            IdScope::Shared => graph.relabel(&mut self.ids),
            IdScope::PerGraph => graph.clone(),
        })
    }

    /// Wire form of an argument value, with references replaced by ids.
    fn flatten_value(&mut self, argument: &str, value: &Value) -> Result<Json> {
        Ok(match value {
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|v| self.flatten_value(argument, v))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.flatten_value(argument, v)?);
                }
                Json::Object(out)
            }
            Value::FromNode(node) => json!({ "from_node": self.node_id(node)? }),
            Value::FromParameter(name) => json!({ "from_parameter": name }),
            Value::ProcessGraph(SubGraph::Node(node)) => {
                json!({ "process_graph": self.flatten_callback(node)?.to_json() })
            }
            Value::ProcessGraph(SubGraph::Flat(graph)) => {
                json!({ "process_graph": self.embed_flat_callback(graph)?.to_json() })
            }
            literal => literal
                .literal_json()
                .ok_or_else(|| GraphError::ValueNotRepresentable {
                    argument: argument.to_string(),
                    value: literal.to_string(),
                })?,
        })
    }

    fn store_argument(&mut self, argument_id: &str, value: Json) {
        if let Some(Frame::Arguments(arguments)) = self.frames.last_mut() {
            arguments.insert(argument_id.to_string(), value);
        }
    }

    fn store_array_element(&mut self, value: &Value) -> Result<()> {
        let argument = match self.frames.last() {
            Some(Frame::Array(argument, _)) => argument.clone(),
            _ => return Ok(()),
        };
        let json = self.flatten_value(&argument, value)?;
        if let Some(Frame::Array(_, items)) = self.frames.last_mut() {
            items.push(json);
        }
        Ok(())
    }
}

impl ProcessGraphVisitor for Flattener {
    fn enter_process(&mut self, _process_id: &str, _namespace: Option<&str>) -> Result<()> {
        self.frames.push(Frame::Arguments(Map::new()));
        Ok(())
    }

    fn leave_process(&mut self, process_id: &str, namespace: Option<&str>) -> Result<()> {
        let arguments = match self.frames.pop() {
            Some(Frame::Arguments(arguments)) => arguments,
            _ => Map::new(),
        };
        let id = self.ids.generate(process_id);
        let mut node = FlatNode::new(process_id, arguments);
        node.namespace = namespace.map(str::to_string);
        self.flattened.insert(id.clone(), node);
        self.last_node_id = Some(id);
        Ok(())
    }

    fn leave_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        let json = self.flatten_value(argument_id, value)?;
        self.store_argument(argument_id, json);
        Ok(())
    }

    fn constant_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        let json = self.flatten_value(argument_id, value)?;
        self.store_argument(argument_id, json);
        Ok(())
    }

    fn enter_array(&mut self, argument_id: &str) -> Result<()> {
        self.frames.push(Frame::Array(argument_id.to_string(), Vec::new()));
        Ok(())
    }

    fn leave_array(&mut self, argument_id: &str) -> Result<()> {
        if let Some(Frame::Array(_, items)) = self.frames.pop() {
            self.store_argument(argument_id, Json::Array(items));
        }
        Ok(())
    }

    fn array_element_done(&mut self, value: &Value) -> Result<()> {
        self.store_array_element(value)
    }

    fn constant_array_element(&mut self, value: &Value) -> Result<()> {
        self.store_array_element(value)
    }

    fn visit_node(&mut self, node: &PGNode) -> Result<()> {
        let key = node as *const PGNode as usize;
        if let Some(id) = self.node_cache.get(&key) {
            self.last_node_id = Some(id.clone());
            return Ok(());
        }
        walk_node(self, node)?;
        if let Some(id) = &self.last_node_id {
            self.node_cache.insert(key, id.clone());
        }
        Ok(())
    }
}
