// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sub-graph reference nodes.
//!
//! A sub-graph node mirrors the properties of its bound graph as inputs and
//! the inputs of that graph's output node as outputs. The schema is rebuilt
//! from scratch on every synchronization: the desired slot list is derived
//! from the bound graph, then [`reconcile_slots`] replaces the current list.

use crate::generation::GenerationMode;
use crate::graph::{Graph, GraphId};
use crate::node::PreviewMode;
use crate::property::{PreviewProperty, Property, PropertyCollector, PropertyType};
use crate::requirements::{
    NeededCoordinateSpace, RequirementAggregator, ShaderRequirements, UvChannel, MAX_SUBGRAPH_DEPTH,
};
use crate::slot::{Slot, SlotDirection, SlotId, ValueType};
use serde::{Deserialize, Serialize};
use std::rc::{Rc, Weak};

/// Invalid graph asset content
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Property type with no slot representation
    #[error("Property '{name}' has type {property_type:?}, which cannot be exposed as a slot")]
    UnmappedPropertyType {
        /// Property display name
        name: String,
        /// Offending type
        property_type: PropertyType,
    },

    /// Sub-graph output that cannot be returned through an `out` parameter
    #[error("Sub-graph output '{name}' has type {value_type}, which cannot be returned")]
    UnsupportedOutputType {
        /// Output slot display name
        name: String,
        /// Offending type
        value_type: ValueType,
    },
}

/// Slot value type for a property
pub fn property_value_type(property: &Property) -> Result<ValueType, ConfigurationError> {
    let value_type = match property.property_type {
        PropertyType::Color => ValueType::Vector4,
        PropertyType::Texture => ValueType::Texture2D,
        PropertyType::Float => ValueType::Vector1,
        PropertyType::Vector2 => ValueType::Vector2,
        PropertyType::Vector3 => ValueType::Vector3,
        PropertyType::Vector4 => ValueType::Vector4,
        PropertyType::Matrix2 => ValueType::Matrix2,
        PropertyType::Matrix3 => ValueType::Matrix3,
        PropertyType::Matrix4 => ValueType::Matrix4,
        PropertyType::Boolean | PropertyType::Cubemap => {
            return Err(ConfigurationError::UnmappedPropertyType {
                name: property.display_name.clone(),
                property_type: property.property_type,
            })
        }
    };
    Ok(value_type)
}

/// Slot type a sub-graph returns for an input of its output node.
///
/// Textures are resources, not values, and cannot be written to an `out` parameter.
pub fn output_value_type(slot: &Slot) -> Result<ValueType, ConfigurationError> {
    match slot.value_type {
        ValueType::Texture2D => Err(ConfigurationError::UnsupportedOutputType {
            name: slot.display_name.clone(),
            value_type: slot.value_type,
        }),
        other => Ok(other),
    }
}

/// Slot schema a node bound to `graph` should have.
///
/// Inputs mirror the graph properties, outputs mirror the inputs of the
/// graph's output node. `None` yields an empty schema.
pub fn desired_slots_for(graph: Option<&Graph>) -> Result<Vec<Slot>, ConfigurationError> {
    let Some(graph) = graph else {
        return Ok(Vec::new());
    };

    let mut desired = Vec::new();
    for property in graph.properties() {
        let value_type = property_value_type(property)?;
        desired.push(Slot::new(
            SlotId::from_guid(property.guid),
            property.display_name.clone(),
            property.reference_name.clone(),
            SlotDirection::Input,
            value_type,
            property.default_value.clone(),
        ));
    }

    if let Some(output) = graph.output_node().and_then(|id| graph.node(id)) {
        for slot in output.input_slots() {
            desired.push(Slot::new(
                slot.id,
                slot.display_name.clone(),
                slot.shader_name.clone(),
                SlotDirection::Output,
                output_value_type(slot)?,
                slot.default_value.clone(),
            ));
        }
    }

    Ok(desired)
}

/// Replace `current` with `desired`, matching slots by id.
///
/// A slot whose id, direction and type are unchanged keeps its current
/// default value. Slots absent from `desired` are dropped.
pub fn reconcile_slots(current: &[Slot], desired: Vec<Slot>) -> Vec<Slot> {
    desired
        .into_iter()
        .map(|mut slot| {
            let kept = current.iter().find(|c| {
                c.id == slot.id && c.direction == slot.direction && c.value_type == slot.value_type
            });
            if let Some(existing) = kept {
                slot.default_value = existing.default_value.clone();
            }
            slot
        })
        .collect()
}

/// Reference to an externally owned graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubGraphNode {
    /// Bound graph; not persisted, re-bound by the host after loading
    #[serde(skip)]
    referenced: Option<Weak<Graph>>,
    /// Identity of the bound graph, kept across edits and reloads
    pub graph_id: Option<GraphId>,
    /// Name of the bound graph when it was last bound
    pub graph_name: Option<String>,
}

impl SubGraphNode {
    /// Create an unbound reference
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_referenced_graph(&mut self, graph: Option<&Rc<Graph>>) {
        self.referenced = graph.map(Rc::downgrade);
        self.graph_id = graph.map(|g| g.id);
        self.graph_name = graph.map(|g| g.name.clone());
    }

    /// The bound graph, if it is still alive
    pub fn referenced_graph(&self) -> Option<Rc<Graph>> {
        self.referenced.as_ref()?.upgrade()
    }

    /// Check if the bound graph was dropped while this node still refers to it
    pub fn is_dangling(&self) -> bool {
        self.referenced.as_ref().is_some_and(|weak| weak.strong_count() == 0)
    }

    /// Name of the graph this node was last bound to
    pub fn display_graph_name(&self) -> &str {
        self.graph_name.as_deref().unwrap_or("<unnamed>")
    }

    /// Check if this node refers to `graph`, or to another version of it
    pub fn references(&self, graph: &Graph) -> bool {
        self.graph_id == Some(graph.id)
    }

    /// Check if a live graph is bound
    pub fn is_bound(&self) -> bool {
        self.referenced_graph().is_some()
    }

    /// Previews are only available while bound
    pub fn has_preview(&self) -> bool {
        self.is_bound()
    }

    /// 3D while bound, flat otherwise
    pub fn preview_mode(&self) -> PreviewMode {
        if self.is_bound() {
            PreviewMode::Preview3D
        } else {
            PreviewMode::Preview2D
        }
    }

    /// Slot schema for the current binding
    pub fn desired_slots(&self) -> Result<Vec<Slot>, ConfigurationError> {
        desired_slots_for(self.referenced_graph().as_deref())
    }

    /// Requirements of the bound graph's active nodes
    pub fn requirements(&self) -> ShaderRequirements {
        self.requirements_at_depth(0)
    }

    pub(crate) fn requirements_at_depth(&self, depth: usize) -> ShaderRequirements {
        let Some(graph) = self.referenced_graph() else {
            return ShaderRequirements::NONE;
        };
        if depth >= MAX_SUBGRAPH_DEPTH {
            tracing::warn!("Sub-graph '{}' nested too deeply, requirements ignored", graph.name);
            return ShaderRequirements::NONE;
        }
        let aggregator = RequirementAggregator::for_active_nodes(&graph).with_depth(depth + 1);
        aggregator.all()
    }

    /// Spaces the bound graph needs the normal in
    pub fn requires_normal(&self) -> NeededCoordinateSpace {
        self.requirements().normal
    }

    /// Spaces the bound graph needs the tangent in
    pub fn requires_tangent(&self) -> NeededCoordinateSpace {
        self.requirements().tangent
    }

    /// Spaces the bound graph needs the bitangent in
    pub fn requires_bitangent(&self) -> NeededCoordinateSpace {
        self.requirements().bitangent
    }

    /// Spaces the bound graph needs the view direction in
    pub fn requires_view_direction(&self) -> NeededCoordinateSpace {
        self.requirements().view_direction
    }

    /// Spaces the bound graph needs the position in
    pub fn requires_position(&self) -> NeededCoordinateSpace {
        self.requirements().position
    }

    /// Whether the bound graph reads a UV channel
    pub fn requires_mesh_uv(&self, channel: UvChannel) -> bool {
        self.requirements().requires_mesh_uv(channel)
    }

    /// Whether the bound graph reads the screen position
    pub fn requires_screen_position(&self) -> bool {
        self.requirements().screen_position
    }

    /// Whether the bound graph reads the vertex color
    pub fn requires_vertex_color(&self) -> bool {
        self.requirements().vertex_color
    }

    /// Whether the bound graph reads time
    pub fn requires_time(&self) -> bool {
        self.requirements().time
    }

    /// Collect the bound graph's uniforms, as a final pass
    pub fn collect_shader_properties(&self, collector: &mut PropertyCollector) -> Result<(), ConfigurationError> {
        match self.referenced_graph() {
            Some(graph) => graph.collect_shader_properties(collector, GenerationMode::Final),
            None => Ok(()),
        }
    }

    /// Collect the bound graph's property values.
    ///
    /// The bound graph's body is generated with literals, so only its
    /// declared properties have uniforms to preview.
    pub fn collect_preview_properties(&self, properties: &mut Vec<PreviewProperty>) {
        if let Some(graph) = self.referenced_graph() {
            properties.extend(graph.properties().iter().map(Property::preview));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};
    use crate::nodes::procedural;
    use crate::slot::SlotValue;

    fn tint_graph() -> Graph {
        let mut graph = Graph::new("Tint");
        graph.add_property(Property::new("Strength", PropertyType::Float, SlotValue::Vector1(1.0)));
        graph.add_property(Property::new("Offset", PropertyType::Vector3, SlotValue::Vector3([0.0; 3])));
        let mut output = Node::subgraph_output();
        output.add_input("Color", ValueType::Vector4);
        let output = graph.add_node(output);
        graph.set_output_node(output).unwrap();
        graph
    }

    fn sub(node: &Node) -> &SubGraphNode {
        match &node.kind {
            NodeKind::SubGraph(sub) => sub,
            _ => panic!("not a sub-graph node"),
        }
    }

    #[test]
    fn test_property_mapping_table() {
        let cases = [
            (PropertyType::Color, ValueType::Vector4),
            (PropertyType::Texture, ValueType::Texture2D),
            (PropertyType::Float, ValueType::Vector1),
            (PropertyType::Vector2, ValueType::Vector2),
            (PropertyType::Vector3, ValueType::Vector3),
            (PropertyType::Vector4, ValueType::Vector4),
            (PropertyType::Matrix2, ValueType::Matrix2),
            (PropertyType::Matrix3, ValueType::Matrix3),
            (PropertyType::Matrix4, ValueType::Matrix4),
        ];
        for (property_type, expected) in cases {
            let prop = Property::new("P", property_type, SlotValue::zero(expected));
            assert_eq!(property_value_type(&prop).unwrap(), expected);
        }

        let cube = Property::new("Sky", PropertyType::Cubemap, SlotValue::Texture2D(None));
        assert_eq!(
            property_value_type(&cube),
            Err(ConfigurationError::UnmappedPropertyType {
                name: "Sky".to_string(),
                property_type: PropertyType::Cubemap,
            })
        );
    }

    #[test]
    fn test_binding_mirrors_properties_and_outputs() {
        let tint = Rc::new(tint_graph());
        let mut node = Node::subgraph("Tint");
        node.set_subgraph(Some(&tint)).unwrap();

        let inputs: Vec<_> = node.input_slots().collect();
        assert_eq!(inputs.len(), 2);
        for prop in tint.properties() {
            let slot = node.slot(SlotId::from_guid(prop.guid)).unwrap();
            assert!(slot.is_input());
            assert_eq!(slot.shader_name, prop.reference_name);
        }
        let types: Vec<_> = inputs.iter().map(|s| s.value_type).collect();
        assert!(types.contains(&ValueType::Vector1));
        assert!(types.contains(&ValueType::Vector3));

        let outputs: Vec<_> = node.output_slots().collect();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].value_type, ValueType::Vector4);
        assert!(node.has_preview());
        assert_eq!(node.preview_mode(), PreviewMode::Preview3D);
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let tint = Rc::new(tint_graph());
        let mut node = Node::subgraph("Tint");
        node.set_subgraph(Some(&tint)).unwrap();

        let first = node.slots().to_vec();
        assert!(node.synchronize_slots().unwrap());
        assert_eq!(node.slots(), first.as_slice());
        assert!(node.synchronize_slots().unwrap());
        assert_eq!(node.slots(), first.as_slice());
    }

    #[test]
    fn test_unbind_clears_slots() {
        let tint = Rc::new(tint_graph());
        let mut node = Node::subgraph("Tint");
        node.set_subgraph(Some(&tint)).unwrap();
        assert!(!node.slots().is_empty());

        node.set_subgraph(None).unwrap();
        assert!(node.slots().is_empty());
        assert!(!node.has_preview());
        assert_eq!(node.preview_mode(), PreviewMode::Preview2D);
    }

    #[test]
    fn test_rebinding_replaces_schema() {
        let tint = Rc::new(tint_graph());
        let mut other = Graph::new("Other");
        other.add_property(Property::new("Mask", PropertyType::Texture, SlotValue::Texture2D(None)));
        let other = Rc::new(other);

        let mut node = Node::subgraph("Sub");
        node.set_subgraph(Some(&tint)).unwrap();
        node.set_subgraph(Some(&other)).unwrap();

        assert_eq!(node.slots().len(), 1);
        assert_eq!(node.slots()[0].value_type, ValueType::Texture2D);
        assert!(sub(&node).references(&other));
        assert!(!sub(&node).references(&tint));
    }

    #[test]
    fn test_unmapped_property_leaves_node_untouched() {
        let tint = Rc::new(tint_graph());
        let mut broken = tint_graph();
        broken.add_property(Property::new("Flag", PropertyType::Boolean, SlotValue::Vector1(0.0)));
        let broken = Rc::new(broken);

        let mut node = Node::subgraph("Tint");
        node.set_subgraph(Some(&tint)).unwrap();
        let before = node.slots().to_vec();

        assert!(node.set_subgraph(Some(&broken)).is_err());
        assert_eq!(node.slots(), before.as_slice());
        assert!(sub(&node).references(&tint));
    }

    #[test]
    fn test_reconcile_keeps_edited_defaults() {
        let current = vec![
            Slot::input(1, "A", ValueType::Vector1).with_default(SlotValue::Vector1(3.0)),
            Slot::input(2, "Stale", ValueType::Vector1),
        ];
        let desired = vec![
            Slot::input(1, "A", ValueType::Vector1),
            Slot::input(3, "B", ValueType::Vector2),
        ];
        let slots = reconcile_slots(&current, desired);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].default_value, SlotValue::Vector1(3.0));
        assert_eq!(slots[1].id, SlotId(3));
    }

    #[test]
    fn test_unbound_queries_degrade() {
        let node = SubGraphNode::new();
        for channel in UvChannel::all() {
            assert!(!node.requires_mesh_uv(channel));
        }
        assert!(node.requires_normal().is_empty());
        assert!(node.requires_tangent().is_empty());
        assert!(node.requires_bitangent().is_empty());
        assert!(node.requires_view_direction().is_empty());
        assert!(node.requires_position().is_empty());
        assert!(!node.requires_screen_position());
        assert!(!node.requires_vertex_color());
        assert!(!node.requires_time());

        let mut collector = PropertyCollector::new();
        node.collect_shader_properties(&mut collector).unwrap();
        assert!(collector.is_empty());
        let mut preview = Vec::new();
        node.collect_preview_properties(&mut preview);
        assert!(preview.is_empty());
    }

    #[test]
    fn test_bound_queries_delegate() {
        let mut graph = tint_graph();
        let fresnel = graph.add_node(procedural::create("fresnel").unwrap());
        let output = graph.output_node().unwrap();
        let out_slot = graph.node(output).unwrap().input_slots().next().unwrap().id;
        let fresnel_out = graph.node(fresnel).unwrap().output_slots().next().unwrap().id;
        graph.connect(fresnel, fresnel_out, output, out_slot).unwrap();
        let graph = Rc::new(graph);

        let mut node = SubGraphNode::new();
        node.set_referenced_graph(Some(&graph));
        assert_eq!(node.requires_normal(), NeededCoordinateSpace::WORLD);
        assert_eq!(node.requires_view_direction(), NeededCoordinateSpace::WORLD);
        assert!(!node.requires_mesh_uv(UvChannel::Uv0));

        let mut preview = Vec::new();
        node.collect_preview_properties(&mut preview);
        let names: Vec<_> = preview.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["_Strength", "_Offset"]);
    }

    #[test]
    fn test_dropped_graph_counts_as_unbound() {
        let mut node = SubGraphNode::new();
        {
            let graph = Rc::new(tint_graph());
            node.set_referenced_graph(Some(&graph));
            assert!(node.is_bound());
        }
        assert!(!node.is_bound());
        assert!(node.desired_slots().unwrap().is_empty());
    }

    #[test]
    fn test_dangling_only_after_drop() {
        let mut node = SubGraphNode::new();
        assert!(!node.is_dangling());
        assert!(node.referenced_graph().is_none());

        let graph = Rc::new(tint_graph());
        node.set_referenced_graph(Some(&graph));
        assert!(!node.is_dangling());
        assert_eq!(node.display_graph_name(), "Tint");

        drop(graph);
        assert!(node.is_dangling());
        assert!(node.referenced_graph().is_none());
        assert_eq!(node.display_graph_name(), "Tint");

        node.set_referenced_graph(None);
        assert!(!node.is_dangling());
    }

    #[test]
    fn test_texture_output_is_unsupported() {
        let mut graph = Graph::new("Masked");
        let mut output = Node::subgraph_output();
        output.add_input("Mask", ValueType::Texture2D);
        let output = graph.add_node(output);
        graph.set_output_node(output).unwrap();
        let graph = Rc::new(graph);

        assert_eq!(
            desired_slots_for(Some(&*graph)),
            Err(ConfigurationError::UnsupportedOutputType {
                name: "Mask".to_string(),
                value_type: ValueType::Texture2D,
            })
        );

        let mut node = Node::subgraph("Masked");
        assert!(node.set_subgraph(Some(&graph)).is_err());
        assert!(node.slots().is_empty());
        assert!(!sub(&node).is_bound());
    }
}
