// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ordoplay_shadergraph` - compile shader graphs from the command line.
//!
//! Without `--graph` a demonstration graph is compiled: a checkerboard
//! feeding a tint sub-graph feeding the master output.
//!
//! ```text
//! ordoplay_shadergraph [--graph <file.ron>] [--options <file.ron>]
//!                      [--precision float|half] [--preview]
//!                      [--save-graph <file.ron>]
//! ```

use ordoplay_shader_graph::generation::OptionsError;
use ordoplay_shader_graph::nodes::procedural;
use ordoplay_shader_graph::{
    compile, CompileOptions, ConnectionError, GenerationError, GenerationMode, Graph, GraphError, Node,
    Precision, Property, PropertyType, ShaderRequirements, SlotId, SlotValue, UvChannel, ValueType,
};
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Command-line failures
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Demo graph is missing node type {0}")]
    MissingNodeType(&'static str),
}

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    graph: Option<PathBuf>,
    options: Option<PathBuf>,
    precision: Option<Precision>,
    preview: bool,
    save_graph: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, CliError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--graph" => parsed.graph = Some(Self::value(&mut args, &arg)?.into()),
                "--options" => parsed.options = Some(Self::value(&mut args, &arg)?.into()),
                "--save-graph" => parsed.save_graph = Some(Self::value(&mut args, &arg)?.into()),
                "--preview" => parsed.preview = true,
                "--precision" => {
                    parsed.precision = Some(match Self::value(&mut args, &arg)?.as_str() {
                        "float" => Precision::Float,
                        "half" => Precision::Half,
                        other => return Err(CliError::Usage(format!("Unknown precision: {other}"))),
                    });
                }
                other => return Err(CliError::Usage(format!("Unknown argument: {other}"))),
            }
        }
        Ok(parsed)
    }

    fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
        args.next()
            .ok_or_else(|| CliError::Usage(format!("{flag} expects a value")))
    }

    /// File options first, then command-line overrides
    fn compile_options(&self) -> Result<CompileOptions, CliError> {
        let mut options = match &self.options {
            Some(path) => CompileOptions::load(path)?,
            None => CompileOptions::default(),
        };
        if let Some(precision) = self.precision {
            options.precision = precision;
        }
        if self.preview {
            options.mode = GenerationMode::Preview;
        }
        Ok(options)
    }
}

fn create(type_id: &'static str) -> Result<Node, CliError> {
    procedural::create(type_id).ok_or(CliError::MissingNodeType(type_id))
}

/// Sub-graph multiplying its color input by a tint property
fn tint_subgraph() -> Result<Graph, CliError> {
    let mut graph = Graph::new("Tint");
    let tint = Property::new("Tint", PropertyType::Color, SlotValue::Vector4([1.0, 0.5, 0.25, 1.0]));
    let base = Property::new("Base", PropertyType::Color, SlotValue::Vector4([1.0; 4]));
    let tint_reader = graph.add_node(Node::property(&tint).map_err(GraphError::from)?);
    let base_reader = graph.add_node(Node::property(&base).map_err(GraphError::from)?);
    graph.add_property(base);
    graph.add_property(tint);

    let multiply = graph.add_node(create("multiply")?);
    let mut output = Node::subgraph_output();
    let color = output.add_input("Color", ValueType::Vector4);
    let output = graph.add_node(output);
    graph.set_output_node(output)?;

    graph.connect(base_reader, SlotId(0), multiply, SlotId(0))?;
    graph.connect(tint_reader, SlotId(0), multiply, SlotId(1))?;
    graph.connect(multiply, SlotId(2), output, color)?;
    Ok(graph)
}

/// Checkerboard feeding the tint sub-graph feeding the master output
fn demo_graph(tint: &Rc<Graph>) -> Result<Graph, CliError> {
    let mut graph = Graph::new("Tinted Checkerboard");
    let checker = graph.add_node(create("checkerboard")?);
    let sub = graph.add_node(Node::subgraph("Tint"));
    let master = graph.add_node(Node::master_output());
    graph.set_output_node(master)?;
    graph.bind_subgraph(sub, Some(tint))?;

    let sub_node = graph.node(sub).ok_or(GraphError::NodeNotFound(sub))?;
    let missing = |name: &str| CliError::Usage(format!("Tint sub-graph has no slot {name}"));
    let base = sub_node.slot_named("_Base").ok_or_else(|| missing("_Base"))?.id;
    let color = sub_node.slot_named("Color").ok_or_else(|| missing("Color"))?.id;

    graph.connect(checker, SlotId(4), sub, base)?;
    graph.connect(sub, color, master, SlotId(0))?;
    Ok(graph)
}

fn describe(requirements: &ShaderRequirements) -> Vec<String> {
    let mut lines = Vec::new();
    let spatial = [
        ("normal", requirements.normal),
        ("tangent", requirements.tangent),
        ("bitangent", requirements.bitangent),
        ("view direction", requirements.view_direction),
        ("position", requirements.position),
    ];
    for (label, needed) in spatial {
        let spaces: Vec<&str> = needed.spaces().map(|s| s.name()).collect();
        if !spaces.is_empty() {
            lines.push(format!("{label}: {}", spaces.join(", ")));
        }
    }
    let channels: Vec<String> = UvChannel::all()
        .into_iter()
        .filter(|c| requirements.requires_mesh_uv(*c))
        .map(|c| c.field_name())
        .collect();
    if !channels.is_empty() {
        lines.push(format!("mesh uv: {}", channels.join(", ")));
    }
    for (label, needed) in [
        ("screen position", requirements.screen_position),
        ("vertex color", requirements.vertex_color),
        ("time", requirements.time),
    ] {
        if needed {
            lines.push(label.to_string());
        }
    }
    lines
}

fn run(args: &Args) -> Result<(), CliError> {
    let options = args.compile_options()?;

    // The sub-graph must outlive compilation; nodes only hold a weak handle
    let tint;
    let graph = match &args.graph {
        Some(path) => Graph::load(path)?,
        None => {
            tint = Rc::new(tint_subgraph()?);
            demo_graph(&tint)?
        }
    };

    if let Some(path) = &args.save_graph {
        graph.save(path)?;
        tracing::info!("Saved {} to {}", graph.name, path.display());
    }

    let shader = compile(&graph, &options)?;
    println!("{}", shader.source);

    tracing::info!("Requirements:");
    for line in describe(&shader.requirements) {
        tracing::info!("  {line}");
    }
    for property in &shader.properties {
        tracing::info!(
            "Property {} ({}){}",
            property.reference_name,
            property.value_type,
            if property.generated { " [generated]" } else { "" }
        );
    }
    Ok(())
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ordoplay_shader_graph=debug,ordoplay_shadergraph=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("OrdoPlay shader graph compiler v{}", env!("CARGO_PKG_VERSION"));

    let result = Args::parse(std::env::args().skip(1)).and_then(|args| run(&args));
    if let Err(e) = result {
        tracing::error!("Compilation failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, CliError> {
        Args::parse(list.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn test_parse_overrides() {
        let parsed = args(&["--precision", "half", "--preview"]).unwrap();
        let options = parsed.compile_options().unwrap();
        assert_eq!(options.precision, Precision::Half);
        assert_eq!(options.mode, GenerationMode::Preview);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(args(&["--fast"]), Err(CliError::Usage(_))));
        assert!(matches!(args(&["--precision", "double"]), Err(CliError::Usage(_))));
        assert!(matches!(args(&["--options"]), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_demo_graph_compiles() {
        let tint = Rc::new(tint_subgraph().unwrap());
        let graph = demo_graph(&tint).unwrap();
        let shader = compile(&graph, &CompileOptions::default()).unwrap();

        assert!(shader.source.contains("SG_Checkerboard_float("));
        assert!(shader.source.contains(&format!("SG_Tint_{}_float(", tint.id.short())));
        assert!(shader.requirements.requires_mesh_uv(UvChannel::Uv0));
        assert!(describe(&shader.requirements).contains(&"mesh uv: uv0".to_string()));
    }
}
