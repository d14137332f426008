use super::flat::FlatGraph;
use super::node::PGNode;
use super::value::{SubGraph, Value};
use super::visitor::{
    DereferencedGraph, ProcessGraphVisitor, accept_process_graph, walk_flat_node,
};
use crate::error::Result;
use ahash::AHashSet;
use serde_json::Value as Json;

/// Renders a process graph as an indented tree, one process per `└──` line.
///
/// Flat graphs show node ids next to process ids, and a node reached a second
/// time is printed as a back reference instead of being expanded again.
/// Callback graphs are rendered inline below their argument.
#[derive(Default)]
pub struct GraphPrinter {
    out: String,
    depth: usize,
    pending_id: Option<String>,
    seen: AHashSet<String>,
}

impl GraphPrinter {
    /// Renders the nested graph under `node`.
    pub fn render_node(node: &PGNode) -> Result<String> {
        let mut printer = GraphPrinter::default();
        printer.visit_node(node)?;
        Ok(printer.out)
    }

    /// Renders a flat graph from its result node.
    pub fn render_flat(graph: &FlatGraph) -> Result<String> {
        let mut printer = GraphPrinter::default();
        accept_process_graph(&mut printer, graph)?;
        Ok(printer.out)
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn callback(&mut self, name: &str, graph: &SubGraph) -> Result<()> {
        self.line(&format!("{}: <callback>", name));
        let rendered = match graph {
            SubGraph::Node(node) => GraphPrinter::render_node(node)?,
            SubGraph::Flat(flat) => GraphPrinter::render_flat(flat)?,
        };
        self.depth += 1;
        for line in rendered.lines() {
            self.line(line);
        }
        self.depth -= 1;
        Ok(())
    }
}

/// Flat graphs reach the printer as literal objects; recover the callback graph.
fn flat_callback(value: &Value) -> Option<SubGraph> {
    let Value::Object(map) = value else {
        return None;
    };
    let nested = to_json(map.get("process_graph")?)?;
    FlatGraph::from_json(&nested).ok().map(SubGraph::Flat)
}

fn to_json(value: &Value) -> Option<Json> {
    match value {
        Value::Array(items) => items.iter().map(to_json).collect::<Option<_>>().map(Json::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| to_json(v).map(|v| (k.clone(), v)))
            .collect::<Option<_>>()
            .map(Json::Object),
        literal => literal.literal_json(),
    }
}

impl ProcessGraphVisitor for GraphPrinter {
    fn enter_process(&mut self, process_id: &str, namespace: Option<&str>) -> Result<()> {
        let mut text = format!("└── {}", process_id);
        if let Some(id) = self.pending_id.take() {
            text.push_str(&format!(" [{}]", id));
        }
        if let Some(namespace) = namespace {
            text.push_str(&format!(" ({})", namespace));
        }
        self.line(&text);
        self.depth += 1;
        Ok(())
    }

    fn leave_process(&mut self, _process_id: &str, _namespace: Option<&str>) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn enter_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        if let Value::ProcessGraph(graph) = value {
            return self.callback(argument_id, graph);
        }
        if let Some(graph) = flat_callback(value) {
            return self.callback(argument_id, &graph);
        }
        self.line(&format!("{}:", argument_id));
        self.depth += 1;
        Ok(())
    }

    fn leave_argument(&mut self, _argument_id: &str, value: &Value) -> Result<()> {
        if !matches!(value, Value::ProcessGraph(_)) && flat_callback(value).is_none() {
            self.depth = self.depth.saturating_sub(1);
        }
        Ok(())
    }

    fn constant_argument(&mut self, argument_id: &str, value: &Value) -> Result<()> {
        self.line(&format!("{}: {}", argument_id, value));
        Ok(())
    }

    fn enter_array(&mut self, argument_id: &str) -> Result<()> {
        self.line(&format!("{}: [", argument_id));
        self.depth += 1;
        Ok(())
    }

    fn leave_array(&mut self, _argument_id: &str) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.line("]");
        Ok(())
    }

    fn constant_array_element(&mut self, value: &Value) -> Result<()> {
        self.line(&value.to_string());
        Ok(())
    }

    fn from_parameter(&mut self, name: &str) -> Result<()> {
        self.line(&format!("<parameter {}>", name));
        Ok(())
    }

    fn visit_flat_node(&mut self, graph: &DereferencedGraph<'_>, id: &str) -> Result<()> {
        if !self.seen.insert(id.to_string()) {
            self.line(&format!("└── [{}] (see above)", id));
            return Ok(());
        }
        self.pending_id = Some(id.to_string());
        walk_flat_node(self, graph, id)
    }
}
