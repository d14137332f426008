use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use openeo_pg::prelude::*;
use serde_json::Value as Json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect and normalize openEO process graphs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log graph processing steps (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check result nodes and references of a process graph
    Validate {
        /// JSON text, file path or URL of a flat graph or process definition
        source: String,
    },
    /// Print a process graph as a tree
    Tree { source: String },
    /// Rebuild a process graph with canonical node ids
    Normalize {
        source: String,
        /// Parameter value as name=json; repeatable
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Json)>,
        /// Print JSON on a single line
        #[arg(long)]
        compact: bool,
    },
}

/// Values that are not valid JSON are taken as plain strings.
fn parse_param(raw: &str) -> Result<(String, Json), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Json::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Validate { source } => run_validate(&source),
        Command::Tree { source } => run_tree(&source),
        Command::Normalize {
            source,
            params,
            compact,
        } => run_normalize(&source, params, compact),
    }
}

fn load(source: &str) -> ProcessDefinition {
    ProcessDefinition::load(source, None)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load '{}': {}", source, e)))
}

fn run_validate(source: &str) {
    let definition = load(source);
    let graph = dereference_from_node_arguments(&definition.process_graph)
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid process graph: {}", e)));
    println!(
        "OK: {} nodes, result node '{}'",
        definition.process_graph.len(),
        graph.result_id()
    );
    for parameter in &definition.parameters {
        let default = parameter
            .default
            .as_ref()
            .map(|d| format!(" (default {})", d))
            .unwrap_or_default();
        println!("  parameter '{}'{}", parameter.name, default);
    }
}

fn run_tree(source: &str) {
    let definition = load(source);
    let tree = GraphPrinter::render_flat(&definition.process_graph)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to render process graph: {}", e)));
    print!("{}", tree);
}

fn run_normalize(source: &str, params: Vec<(String, Json)>, compact: bool) {
    let definition = load(source);
    let params: IndexMap<String, Json> = params.into_iter().collect();
    let node = definition
        .to_node((!params.is_empty()).then_some(params))
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to unflatten: {}", e)));
    let json = node
        .to_process_graph_json()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to flatten: {}", e)));
    let output = if compact {
        serde_json::to_string(&json)
    } else {
        serde_json::to_string_pretty(&json)
    }
    .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize: {}", e)));
    println!("{}", output);
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
