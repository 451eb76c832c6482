// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader source generation.
//!
//! Generation walks the active node set of a graph in dependency order and
//! emits one function call per node into `PopulateSurfaceData`. Function
//! bodies are registered once per compilation; bound sub-graphs become a
//! function of their own, generated recursively in [`GenerationMode::Final`].
//!
//! All emitted text carries `{precision}` tokens until [`ShaderGenerator::finish`].

use crate::graph::{CycleError, Graph};
use crate::node::{Node, NodeId, NodeKind};
use crate::nodes::subgraph::{self, ConfigurationError};
use crate::property::{PreviewProperty, PropertyCollector, ShaderProperty};
use crate::requirements::{RequirementAggregator, ShaderRequirements, UvChannel};
use crate::slot::{sanitize_identifier, Slot, SlotDirection, SlotId, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Token replaced by the precision keyword when source is finished
pub const PRECISION_TOKEN: &str = "{precision}";

/// Floating point precision of the generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floats
    #[default]
    Float,
    /// 16-bit floats
    Half,
}

impl Precision {
    /// Type keyword substituted for `{precision}`
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Half => "half",
        }
    }
}

/// How unconnected inputs are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Unconnected inputs read generated uniforms so they can be edited live
    Preview,
    /// Unconnected inputs are inlined as literals
    #[default]
    Final,
}

/// Compilation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Float precision
    pub precision: Precision,
    /// Literal or uniform inputs
    pub mode: GenerationMode,
}

impl CompileOptions {
    /// Options for the live preview
    pub fn preview() -> Self {
        Self {
            mode: GenerationMode::Preview,
            ..Self::default()
        }
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON; missing fields take their defaults
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Load options from a RON file
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        let options = Self::from_ron(&content)?;
        tracing::debug!("Loaded compile options from {}", path.display());
        Ok(options)
    }
}

/// Options file errors
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// File could not be read
    #[error("Failed to read options: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON
    #[error("Invalid options: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Line-oriented source builder with indentation
#[derive(Debug, Default)]
pub struct ShaderGenerator {
    source: String,
    indent: usize,
}

impl ShaderGenerator {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line at the current indentation
    pub fn add_line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.source.push_str("    ");
            }
            self.source.push_str(line);
        }
        self.source.push('\n');
    }

    /// Append multi-line text, re-indenting every line
    pub fn add_block(&mut self, text: &str) {
        for line in text.lines() {
            self.add_line(line);
        }
    }

    /// Append an empty line
    pub fn blank_line(&mut self) {
        self.source.push('\n');
    }

    /// Increase indentation
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease indentation
    pub fn deindent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Text so far, tokens intact
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Text with tokens intact
    pub fn into_source(self) -> String {
        self.source
    }

    /// Final text with `{precision}` substituted
    pub fn finish(self, precision: Precision) -> String {
        self.source.replace(PRECISION_TOKEN, precision.keyword())
    }
}

/// Function definitions emitted during one compilation, keyed by name.
///
/// The first registration of a name wins.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, String>,
    in_progress: Vec<String>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a function was registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Register a function; returns false if the name is taken
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> bool {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return false;
        }
        self.functions.insert(name, source.into());
        true
    }

    /// Function sources in registration order
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.values().map(String::as_str)
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if nothing was registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn begin(&mut self, name: &str) -> Result<(), GenerationError> {
        if self.in_progress.iter().any(|n| n == name) {
            return Err(GenerationError::RecursiveSubGraph(name.to_string()));
        }
        self.in_progress.push(name.to_string());
        Ok(())
    }

    fn end(&mut self, name: &str) {
        self.in_progress.retain(|n| n != name);
    }
}

/// Output of a compilation
#[derive(Debug, Clone)]
pub struct GeneratedShader {
    /// Complete shader source
    pub source: String,
    /// Built-in values the source reads from `SurfaceInputs`
    pub requirements: ShaderRequirements,
    /// Uniforms declared by the source
    pub properties: Vec<ShaderProperty>,
    /// Live values for generated uniforms, preview mode only
    pub preview_properties: Vec<PreviewProperty>,
}

/// Per-graph state while emitting node calls
struct GenerationContext<'a> {
    graph: &'a Graph,
    order: Vec<NodeId>,
    mode: GenerationMode,
}

impl<'a> GenerationContext<'a> {
    fn new(graph: &'a Graph, root: NodeId, mode: GenerationMode) -> Result<Self, GenerationError> {
        graph.topological_order()?;
        if graph.node(root).is_none() {
            return Err(GenerationError::NodeNotFound(root));
        }

        let order = graph.active_nodes_from(root);
        // An unbound sub-graph node that still has slots has outputs nobody declares
        for node in order.iter().filter_map(|id| graph.node(*id)) {
            if let NodeKind::SubGraph(sub) = &node.kind {
                if let (false, Some(slot)) = (sub.is_bound(), node.slots().first()) {
                    return Err(stale(node, &slot.shader_name));
                }
            }
        }

        Ok(Self { graph, order, mode })
    }

    fn nodes(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.order.iter().filter_map(|id| self.graph.node(*id))
    }

    fn output_expression(&self, node: &Node, slot: &Slot) -> Result<String, GenerationError> {
        match &node.kind {
            NodeKind::Property(p) => self
                .graph
                .property(p.property)
                .map(|property| property.reference_name.clone())
                .ok_or(GenerationError::PropertyNotFound(p.property)),
            _ => Ok(node.output_variable(slot)),
        }
    }

    fn input_expression(&self, node: &Node, slot: &Slot) -> Result<String, GenerationError> {
        if let Some(connection) = self.graph.connection_to(node.id, slot.id) {
            let source = self
                .graph
                .node(connection.from_node)
                .ok_or(GenerationError::NodeNotFound(connection.from_node))?;
            let output = source
                .slot(connection.from_slot)
                .ok_or(GenerationError::SlotNotFound(source.id, connection.from_slot))?;
            let expression = self.output_expression(source, output)?;
            return Ok(output.value_type.convert_expression(&expression, slot.value_type));
        }

        if let Some((expression, value_type)) = slot.binding.expression() {
            return Ok(value_type.convert_expression(&expression, slot.value_type));
        }

        if Node::input_uses_uniform(slot, self.mode) {
            return Ok(node.preview_uniform_name(slot));
        }

        match slot.default_value.literal() {
            Some(literal) => Ok(slot
                .default_value
                .value_type()
                .convert_expression(&literal, slot.value_type)),
            None => Ok(node.preview_uniform_name(slot)),
        }
    }

    fn argument(&self, node: &Node, slot: &Slot) -> Result<String, GenerationError> {
        if slot.is_output() {
            return Ok(node.output_variable(slot));
        }
        Ok(slot.value_type.argument(&self.input_expression(node, slot)?))
    }

    fn emit_nodes(&self, registry: &mut FunctionRegistry, body: &mut ShaderGenerator) -> Result<(), GenerationError> {
        for node in self.nodes() {
            self.emit_node(node, registry, body)?;
        }
        Ok(())
    }

    fn emit_node(
        &self,
        node: &Node,
        registry: &mut FunctionRegistry,
        body: &mut ShaderGenerator,
    ) -> Result<(), GenerationError> {
        match &node.kind {
            // Property nodes are read through their uniform
            NodeKind::Output(_) | NodeKind::Property(_) => Ok(()),
            NodeKind::Procedural(definition) => {
                let name = definition.qualified_function_name();
                registry.add(name.clone(), definition.function_source());

                let args = node
                    .slots()
                    .iter()
                    .map(|slot| self.argument(node, slot))
                    .collect::<Result<Vec<_>, _>>()?;
                declare_outputs(node, node.output_slots(), body);
                body.add_line(format!("{name}({});", args.join(", ")));
                Ok(())
            }
            NodeKind::SubGraph(sub) => {
                let Some(referenced) = sub.referenced_graph() else {
                    return Ok(());
                };
                let name = referenced.generate_subgraph_function(registry)?;

                let mut args = vec!["IN".to_string()];
                for property in referenced.properties() {
                    let slot = node
                        .slot(SlotId::from_guid(property.guid))
                        .filter(|slot| slot.is_input())
                        .ok_or_else(|| stale(node, &property.reference_name))?;
                    args.push(self.argument(node, slot)?);
                }

                let mut outputs = Vec::new();
                if let Some(output_node) = referenced.output_node().and_then(|id| referenced.node(id)) {
                    for target in output_node.input_slots() {
                        let slot = node
                            .slot(target.id)
                            .filter(|slot| slot.is_output())
                            .ok_or_else(|| stale(node, &target.shader_name))?;
                        args.push(node.output_variable(slot));
                        outputs.push(slot);
                    }
                }

                declare_outputs(node, outputs.into_iter(), body);
                body.add_line(format!("{name}({});", args.join(", ")));
                Ok(())
            }
        }
    }

    /// Fields of `SurfaceDescription` and the expressions that fill them
    fn surface_fields(&self, root: NodeId) -> Result<Vec<(String, ValueType, String)>, GenerationError> {
        let node = self.graph.node(root).ok_or(GenerationError::NodeNotFound(root))?;
        let mut fields = Vec::new();

        if let NodeKind::Output(_) = node.kind {
            for slot in node.input_slots().filter(|s| s.value_type != ValueType::Texture2D) {
                fields.push((slot.shader_name.clone(), slot.value_type, self.input_expression(node, slot)?));
            }
        } else {
            for slot in node.output_slots().filter(|s| s.value_type != ValueType::Texture2D) {
                fields.push((slot.shader_name.clone(), slot.value_type, self.output_expression(node, slot)?));
            }
        }
        Ok(fields)
    }
}

fn stale(node: &Node, slot: &str) -> GenerationError {
    GenerationError::StaleSubGraph {
        node: node.id,
        slot: slot.to_string(),
    }
}

fn declare_outputs<'s>(node: &Node, slots: impl Iterator<Item = &'s Slot>, body: &mut ShaderGenerator) {
    for slot in slots.filter(|s| s.value_type != ValueType::Texture2D) {
        body.add_line(format!("{} {};", slot.value_type.shader_type(), node.output_variable(slot)));
    }
}

fn write_surface_inputs(requirements: &ShaderRequirements, shader: &mut ShaderGenerator) {
    shader.add_line("struct SurfaceInputs");
    shader.add_line("{");
    shader.indent();

    let spatial = [
        (requirements.normal, "Normal"),
        (requirements.tangent, "Tangent"),
        (requirements.bitangent, "BiTangent"),
        (requirements.view_direction, "ViewDirection"),
        (requirements.position, "Position"),
    ];
    for (needed, suffix) in spatial {
        for space in needed.spaces() {
            shader.add_line(format!("{PRECISION_TOKEN}3 {}Space{suffix};", space.name()));
        }
    }
    for channel in UvChannel::all() {
        if requirements.requires_mesh_uv(channel) {
            shader.add_line(format!("{PRECISION_TOKEN}4 {};", channel.field_name()));
        }
    }
    if requirements.screen_position {
        shader.add_line(format!("{PRECISION_TOKEN}4 ScreenPosition;"));
    }
    if requirements.vertex_color {
        shader.add_line(format!("{PRECISION_TOKEN}4 VertexColor;"));
    }
    if requirements.time {
        shader.add_line(format!("{PRECISION_TOKEN}3 TimeParameters;"));
    }

    shader.deindent();
    shader.add_line("};");
}

impl Graph {
    /// Register this graph's sub-graph function and its dependencies.
    ///
    /// Returns the function name. Sub-graph bodies are always generated in
    /// [`GenerationMode::Final`].
    pub fn generate_subgraph_function(&self, registry: &mut FunctionRegistry) -> Result<String, GenerationError> {
        let name = format!(
            "SG_{}_{}_{PRECISION_TOKEN}",
            sanitize_identifier(&self.name),
            self.id.short()
        );
        if registry.contains(&name) {
            return Ok(name);
        }

        registry.begin(&name)?;
        let source = self.subgraph_function_source(&name, registry);
        registry.end(&name);
        registry.add(name.clone(), source?);

        tracing::debug!("Generated sub-graph function {}", name);
        Ok(name)
    }

    fn subgraph_function_source(&self, name: &str, registry: &mut FunctionRegistry) -> Result<String, GenerationError> {
        let output = self.output_node().and_then(|id| self.node(id));

        let mut params = vec!["SurfaceInputs IN".to_string()];
        for property in self.properties() {
            let value_type = subgraph::property_value_type(property)?;
            params.push(value_type.parameter_declaration(&property.reference_name, SlotDirection::Input));
        }
        if let Some(output) = output {
            for slot in output.input_slots() {
                let value_type = subgraph::output_value_type(slot)?;
                params.push(value_type.parameter_declaration(&slot.shader_name, SlotDirection::Output));
            }
        }

        let mut body = ShaderGenerator::new();
        body.add_line(format!("void {name}({})", params.join(", ")));
        body.add_line("{");
        body.indent();
        if let Some(output) = output {
            let context = GenerationContext::new(self, output.id, GenerationMode::Final)?;
            context.emit_nodes(registry, &mut body)?;
            for slot in output.input_slots() {
                body.add_line(format!("{} = {};", slot.shader_name, context.input_expression(output, slot)?));
            }
        }
        body.deindent();
        body.add_line("}");
        Ok(body.into_source())
    }
}

/// Compile a graph from its output node
pub fn compile(graph: &Graph, options: &CompileOptions) -> Result<GeneratedShader, GenerationError> {
    let root = graph.output_node().ok_or(GenerationError::NoOutputNode)?;
    compile_from(graph, root, options)
}

/// Compile the part of a graph upstream of `root`.
///
/// A non-output root exposes its own outputs as the surface description,
/// which is how single-node previews are built.
pub fn compile_from(graph: &Graph, root: NodeId, options: &CompileOptions) -> Result<GeneratedShader, GenerationError> {
    let context = GenerationContext::new(graph, root, options.mode)?;
    tracing::debug!(
        "Compiling {} ({} active nodes, {:?})",
        graph.name,
        context.order.len(),
        options.mode
    );

    let requirements = RequirementAggregator::new(graph, context.nodes().collect()).all();

    let mut collector = PropertyCollector::new();
    graph.collect_shader_properties_for(&context.order, &mut collector, options.mode)?;
    let mut preview_properties = Vec::new();
    if options.mode == GenerationMode::Preview {
        graph.collect_preview_properties_for(&context.order, &mut preview_properties);
    }

    let mut registry = FunctionRegistry::new();
    let mut surface = ShaderGenerator::new();
    surface.add_line("SurfaceDescription PopulateSurfaceData(SurfaceInputs IN)");
    surface.add_line("{");
    surface.indent();
    context.emit_nodes(&mut registry, &mut surface)?;
    let fields = context.surface_fields(root)?;
    surface.add_line("SurfaceDescription surface = (SurfaceDescription)0;");
    for (field, _, expression) in &fields {
        surface.add_line(format!("surface.{field} = {expression};"));
    }
    surface.add_line("return surface;");
    surface.deindent();
    surface.add_line("}");

    let mut shader = ShaderGenerator::new();
    shader.add_line(format!("// {}", graph.name));
    shader.blank_line();
    write_surface_inputs(&requirements, &mut shader);
    if !collector.is_empty() {
        shader.blank_line();
        shader.add_block(&collector.declarations());
    }
    for function in registry.functions() {
        shader.blank_line();
        shader.add_block(function);
    }
    shader.blank_line();
    shader.add_line("struct SurfaceDescription");
    shader.add_line("{");
    shader.indent();
    for (field, value_type, _) in &fields {
        shader.add_line(format!("{} {field};", value_type.shader_type()));
    }
    shader.deindent();
    shader.add_line("};");
    shader.blank_line();
    shader.add_block(surface.source());

    tracing::info!(
        "Compiled {}: {} functions, {} properties",
        graph.name,
        registry.len(),
        collector.len()
    );

    Ok(GeneratedShader {
        source: shader.finish(options.precision),
        requirements,
        properties: collector.into_properties(),
        preview_properties,
    })
}

/// Code generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The graph is not acyclic
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// `compile` needs a designated output node
    #[error("Graph has no output node")]
    NoOutputNode,

    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// A connection names a slot that does not exist
    #[error("Slot {1} not found on node {0:?}")]
    SlotNotFound(NodeId, SlotId),

    /// A property node reads a property the graph no longer declares
    #[error("Property not found: {0}")]
    PropertyNotFound(Uuid),

    /// A sub-graph node's slots do not match its bound graph
    #[error("Sub-graph node {node:?} is out of date: missing slot {slot}")]
    StaleSubGraph {
        /// Sub-graph node
        node: NodeId,
        /// Slot the bound graph expects
        slot: String,
    },

    /// A sub-graph function is reached again while it is being generated
    #[error("Sub-graph {0} references itself")]
    RecursiveSubGraph(String),

    /// A property type has no slot representation
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
