// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the shader graph.

use crate::graph::{Graph, GraphError};
use crate::nodes::procedural::{self, ProceduralDefinition};
use crate::nodes::subgraph::{self, ConfigurationError, SubGraphNode};
use crate::property::{PreviewProperty, Property, PropertyCollector, ShaderProperty};
use crate::requirements::ShaderRequirements;
use crate::generation::GenerationMode;
use crate::slot::{sanitize_identifier, Binding, Slot, SlotDirection, SlotId, SlotValue, ValueType};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used to keep generated names unique
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Built-in values and properties
    Input,
    /// Master and sub-graph outputs
    Output,
    /// Math operations
    Math,
    /// Procedural patterns
    Procedural,
    /// Utility nodes
    Utility,
    /// Sub-graph references
    SubGraph,
}

impl NodeCategory {
    /// Menu label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Math => "Math",
            Self::Procedural => "Procedural",
            Self::Utility => "Utility",
            Self::SubGraph => "Sub-graph",
        }
    }
}

/// How a node preview is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewMode {
    /// Flat quad
    Preview2D,
    /// Lit sphere
    Preview3D,
}

/// Output node flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// Surface description of a full shader
    Master,
    /// Outputs of a sub-graph
    SubGraphOutput,
}

/// Node reading a graph property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyNode {
    /// Guid of the property in the owning graph
    pub property: Uuid,
}

/// Node variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// Fixed schema, one function template
    Procedural(#[serde(with = "procedural::serde_definition")] &'static ProceduralDefinition),
    /// Graph property
    Property(PropertyNode),
    /// Reference to another graph
    SubGraph(SubGraphNode),
    /// Compilation root
    Output(OutputKind),
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Ordered slots
    slots: Vec<Slot>,
    /// Variant data
    pub kind: NodeKind,
}

impl Node {
    /// Create a node with explicit slots
    pub fn new(name: impl Into<String>, kind: NodeKind, slots: Vec<Slot>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            slots,
            kind,
        }
    }

    /// Create a node from a procedural definition
    pub fn procedural(definition: &'static ProceduralDefinition) -> Self {
        let slots = definition.slots.iter().map(|s| s.to_slot()).collect();
        Self::new(definition.name, NodeKind::Procedural(definition), slots)
    }

    /// Create a node reading `property`
    pub fn property(property: &Property) -> Result<Self, ConfigurationError> {
        let value_type = subgraph::property_value_type(property)?;
        let slot = Slot::new(
            SlotId(0),
            property.display_name.clone(),
            "Out",
            SlotDirection::Output,
            value_type,
            property.default_value.clone(),
        );
        Ok(Self::new(
            property.display_name.clone(),
            NodeKind::Property(PropertyNode { property: property.guid }),
            vec![slot],
        ))
    }

    /// Create an unbound sub-graph reference
    pub fn subgraph(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::SubGraph(SubGraphNode::new()), Vec::new())
    }

    /// Create a master output node
    pub fn master_output() -> Self {
        let slots = vec![
            Slot::input(0, "Albedo", ValueType::Vector3).with_default(SlotValue::Vector3([0.5, 0.5, 0.5])),
            Slot::input(1, "Normal", ValueType::Vector3).with_default(SlotValue::Vector3([0.0, 0.0, 1.0])),
            Slot::input(2, "Emission", ValueType::Vector3),
            Slot::input(3, "Metallic", ValueType::Vector1),
            Slot::input(4, "Smoothness", ValueType::Vector1).with_default(SlotValue::Vector1(0.5)),
            Slot::input(5, "Occlusion", ValueType::Vector1).with_default(SlotValue::Vector1(1.0)),
            Slot::input(6, "Alpha", ValueType::Vector1).with_default(SlotValue::Vector1(1.0)),
        ];
        Self::new("Master", NodeKind::Output(OutputKind::Master), slots)
    }

    /// Create a sub-graph output node with no slots yet
    pub fn subgraph_output() -> Self {
        Self::new("Output", NodeKind::Output(OutputKind::SubGraphOutput), Vec::new())
    }

    /// Add an input to this node, returning its id
    pub fn add_input(&mut self, name: impl Into<String>, value_type: ValueType) -> SlotId {
        let next = self.slots.iter().map(|s| s.id.0 + 1).max().unwrap_or(0);
        self.add_slot(Slot::input(next, name, value_type));
        SlotId(next)
    }

    /// Add a slot, replacing any slot with the same id
    pub fn add_slot(&mut self, slot: Slot) {
        match self.slots.iter_mut().find(|s| s.id == slot.id) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
    }

    /// Get a slot by ID
    pub fn slot(&self, slot_id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    /// Get a slot by shader name
    pub fn slot_named(&self, shader_name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.shader_name == shader_name)
    }

    /// Set the default value of an input
    pub fn set_default(&mut self, slot_id: SlotId, value: SlotValue) -> bool {
        match self.slots.iter_mut().find(|s| s.id == slot_id && s.is_input()) {
            Some(slot) => {
                slot.default_value = value;
                true
            }
            None => false,
        }
    }

    /// Get all slots
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Get input slots
    pub fn input_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.is_input())
    }

    /// Get output slots
    pub fn output_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.is_output())
    }

    pub(crate) fn replace_slots(&mut self, slots: Vec<Slot>) {
        self.slots = slots;
    }

    /// Menu path, e.g. `Procedural/Checkerboard`
    pub fn title(&self) -> String {
        match &self.kind {
            NodeKind::Procedural(def) => def.title.to_string(),
            NodeKind::Property(_) => format!("Input/Property/{}", self.name),
            NodeKind::SubGraph(_) => format!("Sub-graph/{}", self.name),
            NodeKind::Output(OutputKind::Master) => "Output/Master".to_string(),
            NodeKind::Output(OutputKind::SubGraphOutput) => "Output/Sub-graph Output".to_string(),
        }
    }

    /// Category of this node
    pub fn category(&self) -> NodeCategory {
        match &self.kind {
            NodeKind::Procedural(def) => def.category,
            NodeKind::Property(_) => NodeCategory::Input,
            NodeKind::SubGraph(_) => NodeCategory::SubGraph,
            NodeKind::Output(_) => NodeCategory::Output,
        }
    }

    /// Whether the editor should draw a preview for this node
    pub fn has_preview(&self) -> bool {
        match &self.kind {
            NodeKind::Procedural(_) | NodeKind::Property(_) => true,
            NodeKind::SubGraph(sub) => sub.has_preview(),
            NodeKind::Output(_) => false,
        }
    }

    /// Preview dimensionality
    pub fn preview_mode(&self) -> PreviewMode {
        match &self.kind {
            NodeKind::SubGraph(sub) => sub.preview_mode(),
            _ => PreviewMode::Preview2D,
        }
    }

    /// Base name for generated locals
    pub fn variable_name(&self) -> String {
        format!("{}_{}", sanitize_identifier(&self.name), self.id.short())
    }

    /// Local holding the value of an output slot
    pub fn output_variable(&self, slot: &Slot) -> String {
        format!("{}_{}", self.variable_name(), slot.shader_name)
    }

    /// Uniform standing in for an unconnected input
    pub fn preview_uniform_name(&self, slot: &Slot) -> String {
        format!("_{}_{}", self.variable_name(), slot.shader_name)
    }

    /// Built-in values this node needs, given its connections in `graph`
    pub fn requirements(&self, graph: &Graph) -> ShaderRequirements {
        self.requirements_at_depth(graph, 0)
    }

    pub(crate) fn requirements_at_depth(&self, graph: &Graph, depth: usize) -> ShaderRequirements {
        let from_slots = self
            .input_slots()
            .filter(|slot| !graph.is_connected(self.id, slot.id))
            .fold(ShaderRequirements::NONE, |acc, slot| {
                acc.union(ShaderRequirements::from_binding(slot.binding))
            });

        match &self.kind {
            NodeKind::SubGraph(sub) => from_slots.union(sub.requirements_at_depth(depth)),
            _ => from_slots,
        }
    }

    /// Whether an unconnected, unbound input is read from a uniform instead of a literal
    pub(crate) fn input_uses_uniform(slot: &Slot, mode: GenerationMode) -> bool {
        mode == GenerationMode::Preview || slot.default_value.literal().is_none()
    }

    /// Inputs that fall back to their default value
    fn unconnected_value_inputs<'a>(&'a self, graph: &'a Graph) -> impl Iterator<Item = &'a Slot> + 'a {
        self.input_slots().filter(move |slot| {
            slot.binding == Binding::None && !graph.is_connected(self.id, slot.id)
        })
    }

    /// Contribute uniforms for this node
    pub fn collect_shader_properties(
        &self,
        graph: &Graph,
        collector: &mut PropertyCollector,
        mode: GenerationMode,
    ) -> Result<(), ConfigurationError> {
        for slot in self.unconnected_value_inputs(graph) {
            if Self::input_uses_uniform(slot, mode) {
                collector.add_shader_property(ShaderProperty {
                    reference_name: self.preview_uniform_name(slot),
                    display_name: format!("{} {}", self.name, slot.display_name),
                    value_type: slot.value_type,
                    default_value: slot.default_value.clone(),
                    generated: true,
                });
            }
        }

        if let NodeKind::SubGraph(sub) = &self.kind {
            sub.collect_shader_properties(collector)?;
        }
        Ok(())
    }

    /// Contribute live values for the preview renderer
    pub fn collect_preview_properties(&self, graph: &Graph, properties: &mut Vec<PreviewProperty>) {
        properties.extend(self.unconnected_value_inputs(graph).map(|slot| PreviewProperty {
            name: self.preview_uniform_name(slot),
            value: slot.default_value.clone(),
        }));

        if let NodeKind::SubGraph(sub) = &self.kind {
            sub.collect_preview_properties(properties);
        }
    }

    /// Rebuild a sub-graph node's slots from its bound graph.
    ///
    /// Returns false for other node kinds. On error nothing is modified.
    pub fn synchronize_slots(&mut self) -> Result<bool, ConfigurationError> {
        let NodeKind::SubGraph(sub) = &self.kind else {
            return Ok(false);
        };
        let desired = sub.desired_slots()?;
        self.slots = subgraph::reconcile_slots(&self.slots, desired);
        tracing::debug!("Synchronized sub-graph node {} ({} slots)", self.name, self.slots.len());
        Ok(true)
    }

    /// Bind a sub-graph node to `graph`, or unbind it with `None`.
    ///
    /// The new slot schema is computed before anything is committed.
    pub fn set_subgraph(&mut self, graph: Option<&Rc<Graph>>) -> Result<(), GraphError> {
        let id = self.id;
        let NodeKind::SubGraph(sub) = &mut self.kind else {
            return Err(GraphError::NotASubGraphNode(id));
        };
        let desired = subgraph::desired_slots_for(graph.map(|g| g.as_ref()))?;
        sub.set_referenced_graph(graph);
        self.slots = subgraph::reconcile_slots(&self.slots, desired);
        Ok(())
    }
}

/// What a registered node type instantiates
#[derive(Debug, Clone, Copy)]
pub enum NodeTemplate {
    /// Fixed-schema node
    Procedural(&'static ProceduralDefinition),
    /// Unbound sub-graph reference
    SubGraph,
    /// Master output
    MasterOutput,
    /// Sub-graph output
    SubGraphOutput,
}

impl NodeTemplate {
    /// Create a node instance
    pub fn instantiate(&self) -> Node {
        match self {
            Self::Procedural(def) => Node::procedural(def),
            Self::SubGraph => Node::subgraph("Sub-graph"),
            Self::MasterOutput => Node::master_output(),
            Self::SubGraphOutput => Node::subgraph_output(),
        }
    }
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Menu path
    pub title: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Instance factory
    pub template: NodeTemplate,
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by ID
    types: indexmap::IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: indexmap::IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(|t| t.template.instantiate())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyType;

    #[test]
    fn test_procedural_node_schema() {
        let node = procedural::create("checkerboard").unwrap();
        assert_eq!(node.title(), "Procedural/Checkerboard");
        assert_eq!(node.input_slots().count(), 4);
        assert_eq!(node.output_slots().count(), 1);
        assert!(node.has_preview());
        assert_eq!(node.preview_mode(), PreviewMode::Preview2D);
    }

    #[test]
    fn test_add_slot_replaces_same_id() {
        let mut node = Node::subgraph_output();
        let id = node.add_input("Color", ValueType::Vector4);
        node.add_slot(Slot::input(id.0, "Tint", ValueType::Vector3));
        assert_eq!(node.slots().len(), 1);
        assert_eq!(node.slot(id).unwrap().display_name, "Tint");
        assert_eq!(node.add_input("Alpha", ValueType::Vector1), SlotId(id.0 + 1));
    }

    #[test]
    fn test_property_node_output_type() {
        let prop = Property::new("Tint", PropertyType::Color, SlotValue::Vector4([1.0; 4]));
        let node = Node::property(&prop).unwrap();
        let out = node.output_slots().next().unwrap();
        assert_eq!(out.value_type, ValueType::Vector4);
        assert_eq!(node.category(), NodeCategory::Input);

        let toggle = Property::new("Toggle", PropertyType::Boolean, SlotValue::Vector1(0.0));
        assert!(Node::property(&toggle).is_err());
    }

    #[test]
    fn test_output_node_has_no_preview() {
        let node = Node::master_output();
        assert!(!node.has_preview());
        assert_eq!(node.title(), "Output/Master");
        assert!(node.slot_named("Albedo").is_some());
    }

    #[test]
    fn test_variable_names_are_identifiers() {
        let node = procedural::create("one_minus").unwrap();
        let var = node.variable_name();
        assert!(var.starts_with("OneMinus_"));
        assert_eq!(var.len(), "OneMinus_".len() + 8);
    }

    #[test]
    fn test_registry_creates_nodes() {
        let registry = crate::nodes::create_shader_registry();
        let node = registry.create_node("checkerboard").unwrap();
        assert_eq!(node.name, "Checkerboard");
        assert!(registry.create_node("missing").is_none());
        assert!(registry.types_in_category(NodeCategory::Output).count() >= 2);
    }
}
