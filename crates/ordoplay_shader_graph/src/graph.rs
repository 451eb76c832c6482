// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, connections and properties.

use crate::connection::{Connection, ConnectionId};
use crate::generation::GenerationMode;
use crate::node::{Node, NodeId, NodeKind};
use crate::nodes::subgraph::{self, ConfigurationError};
use crate::property::{PreviewProperty, Property, PropertyCollector, ShaderProperty};
use crate::requirements::{RequirementAggregator, ShaderRequirements};
use crate::slot::SlotId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used to keep generated names unique
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

/// A shader graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    /// Declared properties, in declaration order
    properties: Vec<Property>,
    /// Designated output node
    output_node: Option<NodeId>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            properties: Vec::new(),
            output_node: None,
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        if self.output_node == Some(node_id) {
            self.output_node = None;
        }
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Designate the node compilation is rooted at
    pub fn set_output_node(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        if !matches!(node.kind, NodeKind::Output(_)) {
            return Err(GraphError::NotAnOutputNode(node_id));
        }
        self.output_node = Some(node_id);
        Ok(())
    }

    /// Designated output node
    pub fn output_node(&self) -> Option<NodeId> {
        self.output_node
    }

    /// Declare a property
    pub fn add_property(&mut self, property: Property) -> Uuid {
        let guid = property.guid;
        self.properties.push(property);
        guid
    }

    /// Remove a property together with the nodes reading it
    pub fn remove_property(&mut self, guid: Uuid) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.guid == guid)?;
        let readers: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| matches!(n.kind, NodeKind::Property(p) if p.property == guid))
            .map(|n| n.id)
            .collect();
        for node_id in readers {
            self.remove_node(node_id);
        }
        Some(self.properties.remove(index))
    }

    /// Get a property by guid
    pub fn property(&self, guid: Uuid) -> Option<&Property> {
        self.properties.iter().find(|p| p.guid == guid)
    }

    /// Declared properties
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Connect an output slot to an input slot
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_slot: SlotId,
        to_node: NodeId,
        to_slot: SlotId,
    ) -> Result<ConnectionId, ConnectionError> {
        // Validate nodes exist
        let source_node = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        // Validate slots exist
        let source_slot = source_node.slot(from_slot)
            .ok_or(ConnectionError::SlotNotFound(from_node, from_slot))?;
        let target_slot = target_node.slot(to_slot)
            .ok_or(ConnectionError::SlotNotFound(to_node, to_slot))?;

        if !source_slot.can_connect(target_slot) {
            return Err(ConnectionError::IncompatibleSlots {
                from: source_slot.value_type,
                to: target_slot.value_type,
            });
        }

        if self.is_connected(to_node, to_slot) {
            return Err(ConnectionError::SlotAlreadyConnected(to_node, to_slot));
        }

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        if self.depends_on(from_node, to_node) {
            return Err(ConnectionError::WouldCreateCycle);
        }

        let connection = Connection::new(from_node, from_slot, to_node, to_slot);
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connection feeding an input slot
    pub fn connection_to(&self, node_id: NodeId, slot_id: SlotId) -> Option<&Connection> {
        self.connections.values().find(|c| c.targets(node_id, slot_id))
    }

    /// Connections reading an output slot
    pub fn connections_from(&self, node_id: NodeId, slot_id: SlotId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.reads(node_id, slot_id))
    }

    /// Check if an input slot has an incoming connection
    pub fn is_connected(&self, node_id: NodeId, slot_id: SlotId) -> bool {
        self.connection_to(node_id, slot_id).is_some()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Check if `node_id` reads, directly or transitively, from `dependency`
    pub fn depends_on(&self, node_id: NodeId, dependency: NodeId) -> bool {
        let mut stack = vec![node_id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == dependency {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.extend(
                self.connections
                    .values()
                    .filter(|c| c.to_node == current)
                    .map(|c| c.from_node),
            );
        }
        false
    }

    /// Get nodes in dependency order, dependencies first
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        // Visit all nodes that this node depends on
        for connection in self.connections_for_node(node_id) {
            if connection.to_node == node_id {
                self.visit(connection.from_node, visited, temp_mark, order)?;
            }
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }

    /// Nodes reachable upstream from the designated output, dependencies first.
    ///
    /// Without an output node every node is active.
    pub fn active_nodes(&self) -> Vec<NodeId> {
        match self.output_node {
            Some(root) => self.active_nodes_from(root),
            None => self
                .topological_order()
                .unwrap_or_else(|_| self.node_ids().collect()),
        }
    }

    /// Nodes reachable upstream from `root` (inclusive), dependencies first
    pub fn active_nodes_from(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        if self.nodes.contains_key(&root) {
            self.collect_upstream(root, &mut visited, &mut order);
        }
        order
    }

    fn collect_upstream(&self, node_id: NodeId, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !visited.insert(node_id) {
            return;
        }
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };
        for slot in node.input_slots() {
            if let Some(connection) = self.connection_to(node_id, slot.id) {
                self.collect_upstream(connection.from_node, visited, order);
            }
        }
        order.push(node_id);
    }

    /// Union of the active nodes' requirements
    pub fn requirements(&self) -> ShaderRequirements {
        RequirementAggregator::for_active_nodes(self).all()
    }

    /// Collect uniforms for the active node set
    pub fn collect_shader_properties(
        &self,
        collector: &mut PropertyCollector,
        mode: GenerationMode,
    ) -> Result<(), ConfigurationError> {
        self.collect_shader_properties_for(&self.active_nodes(), collector, mode)
    }

    pub(crate) fn collect_shader_properties_for(
        &self,
        active: &[NodeId],
        collector: &mut PropertyCollector,
        mode: GenerationMode,
    ) -> Result<(), ConfigurationError> {
        for property in &self.properties {
            collector.add_shader_property(ShaderProperty {
                reference_name: property.reference_name.clone(),
                display_name: property.display_name.clone(),
                value_type: subgraph::property_value_type(property)?,
                default_value: property.default_value.clone(),
                generated: false,
            });
        }
        for node in active.iter().filter_map(|id| self.nodes.get(id)) {
            node.collect_shader_properties(self, collector, mode)?;
        }
        Ok(())
    }

    /// Collect live values for the preview renderer
    pub fn collect_preview_properties(&self, properties: &mut Vec<PreviewProperty>) {
        self.collect_preview_properties_for(&self.active_nodes(), properties);
    }

    pub(crate) fn collect_preview_properties_for(&self, active: &[NodeId], properties: &mut Vec<PreviewProperty>) {
        properties.extend(self.properties.iter().map(Property::preview));
        for node in active.iter().filter_map(|id| self.nodes.get(id)) {
            node.collect_preview_properties(self, properties);
        }
    }

    /// Bind a sub-graph node to `graph`, or unbind it with `None`.
    ///
    /// Connections to slots that disappear are removed.
    pub fn bind_subgraph(&mut self, node_id: NodeId, graph: Option<&Rc<Graph>>) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.set_subgraph(graph)?;
        tracing::debug!(
            "Bound sub-graph node {} to {}",
            node.name,
            graph.map_or("nothing", |g| g.name.as_str())
        );
        self.prune_invalid_connections(node_id);
        Ok(())
    }

    /// Re-bind and re-synchronize every node referring to `changed`.
    ///
    /// Nodes are matched by graph id, so `changed` may be a new version of
    /// the graph they were bound to, or the graph itself after loading.
    /// Returns how many nodes were updated.
    pub fn notify_subgraph_changed(&mut self, changed: &Rc<Graph>) -> Result<usize, GraphError> {
        let desired = subgraph::desired_slots_for(Some(changed))?;
        let affected: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| matches!(&n.kind, NodeKind::SubGraph(sub) if sub.references(changed)))
            .map(|n| n.id)
            .collect();

        for node_id in &affected {
            if let Some(node) = self.nodes.get_mut(node_id) {
                if let NodeKind::SubGraph(sub) = &mut node.kind {
                    sub.set_referenced_graph(Some(changed));
                }
                let slots = subgraph::reconcile_slots(node.slots(), desired.clone());
                node.replace_slots(slots);
            }
            self.prune_invalid_connections(*node_id);
        }
        tracing::debug!("Sub-graph {} changed, {} node(s) updated", changed.name, affected.len());
        Ok(affected.len())
    }

    /// Re-synchronize every sub-graph node against its current binding.
    ///
    /// Unbound nodes, including nodes whose graph was dropped, lose their slots.
    pub fn resynchronize_subgraphs(&mut self) -> Result<usize, GraphError> {
        self.resynchronize_where(|node| matches!(node.kind, NodeKind::SubGraph(_)))
    }

    /// All schemas are computed before any node is touched
    fn resynchronize_where(&mut self, filter: impl Fn(&Node) -> bool) -> Result<usize, GraphError> {
        let mut updates = Vec::new();
        for node in self.nodes.values().filter(|n| filter(n)) {
            if let NodeKind::SubGraph(sub) = &node.kind {
                if sub.is_dangling() {
                    tracing::warn!(
                        "Sub-graph '{}' was dropped while node {} still referenced it",
                        sub.display_graph_name(),
                        node.name
                    );
                }
                updates.push((node.id, sub.desired_slots()?));
            }
        }

        let count = updates.len();
        for (node_id, desired) in updates {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                let slots = subgraph::reconcile_slots(node.slots(), desired);
                node.replace_slots(slots);
            }
            self.prune_invalid_connections(node_id);
        }
        tracing::debug!("Re-synchronized {count} sub-graph node(s) in {}", self.name);
        Ok(count)
    }

    /// Drop connections of `node_id` whose endpoints no longer fit
    fn prune_invalid_connections(&mut self, node_id: NodeId) {
        let nodes = &self.nodes;
        let before = self.connections.len();
        self.connections.retain(|_, c| {
            if !c.involves_node(node_id) {
                return true;
            }
            let from = nodes.get(&c.from_node).and_then(|n| n.slot(c.from_slot));
            let to = nodes.get(&c.to_node).and_then(|n| n.slot(c.to_slot));
            matches!((from, to), (Some(from), Some(to)) if from.can_connect(to))
        });
        let removed = before - self.connections.len();
        if removed > 0 {
            tracing::debug!("Removed {removed} stale connection(s) after slot synchronization");
        }
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON.
    ///
    /// Sub-graph nodes come back unbound with their last synchronized slots;
    /// rebind them with [`Graph::bind_subgraph`].
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let ron_str = self
            .to_ron()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, ron_str)
    }

    /// Load from a RON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let graph = Self::from_ron(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        tracing::debug!("Loaded graph {} from {}", graph.name, path.display());
        Ok(graph)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Slot not found
    #[error("Slot {1} not found on node {0:?}")]
    SlotNotFound(NodeId, SlotId),

    /// Wrong directions, hidden target or incompatible types
    #[error("Cannot connect {from} to {to}")]
    IncompatibleSlots {
        /// Source type
        from: crate::slot::ValueType,
        /// Target type
        to: crate::slot::ValueType,
    },

    /// Input is already connected
    #[error("Slot {1} on node {0:?} is already connected")]
    SlotAlreadyConnected(NodeId, SlotId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// The connection would close a cycle
    #[error("Connection would create a cycle")]
    WouldCreateCycle,
}

/// Error when editing graph structure
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Only output nodes can be designated as the output
    #[error("Node {0:?} is not an output node")]
    NotAnOutputNode(NodeId),

    /// Only sub-graph nodes can be bound
    #[error("Node {0:?} is not a sub-graph node")]
    NotASubGraphNode(NodeId),

    /// The bound graph cannot be represented
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::procedural;
    use crate::property::PropertyType;
    use crate::slot::{SlotValue, ValueType};

    fn out_slot(graph: &Graph, node: NodeId) -> SlotId {
        graph.node(node).unwrap().output_slots().next().unwrap().id
    }

    fn in_slot(graph: &Graph, node: NodeId, index: usize) -> SlotId {
        graph.node(node).unwrap().input_slots().nth(index).unwrap().id
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut graph = Graph::new("Test");
        let a = graph.add_node(procedural::create("add").unwrap());
        let b = graph.add_node(procedural::create("one_minus").unwrap());

        let id = graph.connect(a, out_slot(&graph, a), b, in_slot(&graph, b, 0)).unwrap();
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.is_connected(b, in_slot(&graph, b, 0)));
        assert_eq!(graph.connections_from(a, out_slot(&graph, a)).count(), 1);

        graph.disconnect(id);
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_connect_rejects_invalid() {
        let mut graph = Graph::new("Test");
        let a = graph.add_node(procedural::create("add").unwrap());
        let b = graph.add_node(procedural::create("multiply").unwrap());
        let uv = graph.add_node(procedural::create("uv").unwrap());

        // Input to input
        assert!(matches!(
            graph.connect(a, in_slot(&graph, a, 0), b, in_slot(&graph, b, 0)),
            Err(ConnectionError::IncompatibleSlots { .. })
        ));
        // Hidden target
        assert!(graph.connect(a, out_slot(&graph, a), uv, in_slot(&graph, uv, 0)).is_err());
        // Self loop
        assert!(matches!(
            graph.connect(a, out_slot(&graph, a), a, in_slot(&graph, a, 0)),
            Err(ConnectionError::SelfLoop)
        ));
        // Missing slot
        assert!(matches!(
            graph.connect(a, SlotId(99), b, in_slot(&graph, b, 0)),
            Err(ConnectionError::SlotNotFound(..))
        ));

        graph.connect(a, out_slot(&graph, a), b, in_slot(&graph, b, 0)).unwrap();
        assert!(matches!(
            graph.connect(uv, out_slot(&graph, uv), b, in_slot(&graph, b, 0)),
            Err(ConnectionError::SlotAlreadyConnected(..))
        ));
        assert!(matches!(
            graph.connect(b, out_slot(&graph, b), a, in_slot(&graph, a, 1)),
            Err(ConnectionError::WouldCreateCycle)
        ));
    }

    #[test]
    fn test_incompatible_types_rejected() {
        let mut graph = Graph::new("Test");
        let prop = Property::new("M", PropertyType::Matrix3, SlotValue::zero(ValueType::Matrix3));
        let reader = graph.add_node(Node::property(&prop).unwrap());
        graph.add_property(prop);
        let add = graph.add_node(procedural::create("add").unwrap());

        assert!(matches!(
            graph.connect(reader, SlotId(0), add, in_slot(&graph, add, 0)),
            Err(ConnectionError::IncompatibleSlots {
                from: ValueType::Matrix3,
                to: ValueType::Vector4
            })
        ));
    }

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let mut graph = Graph::new("Test");
        let c = graph.add_node(procedural::create("one_minus").unwrap());
        let b = graph.add_node(procedural::create("multiply").unwrap());
        let a = graph.add_node(procedural::create("uv").unwrap());
        graph.connect(a, out_slot(&graph, a), b, in_slot(&graph, b, 0)).unwrap();
        graph.connect(b, out_slot(&graph, b), c, in_slot(&graph, c, 0)).unwrap();

        let order = graph.topological_order().unwrap();
        let pos = |id| order.iter().position(|n| *n == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn test_active_nodes_from_output() {
        let mut graph = Graph::new("Test");
        let uv = graph.add_node(procedural::create("uv").unwrap());
        let dead = graph.add_node(procedural::create("time").unwrap());
        let master = graph.add_node(Node::master_output());
        graph.set_output_node(master).unwrap();
        graph.connect(uv, out_slot(&graph, uv), master, in_slot(&graph, master, 0)).unwrap();

        let active = graph.active_nodes();
        assert_eq!(active, vec![uv, master]);
        assert!(!active.contains(&dead));
        assert!(!graph.requirements().time);
        assert!(graph.requirements().requires_mesh_uv(crate::requirements::UvChannel::Uv0));
    }

    #[test]
    fn test_set_output_node_requires_output_kind() {
        let mut graph = Graph::new("Test");
        let add = graph.add_node(procedural::create("add").unwrap());
        assert!(matches!(graph.set_output_node(add), Err(GraphError::NotAnOutputNode(_))));

        let master = graph.add_node(Node::master_output());
        graph.set_output_node(master).unwrap();
        graph.remove_node(master);
        assert_eq!(graph.output_node(), None);
    }

    #[test]
    fn test_remove_property_removes_readers() {
        let mut graph = Graph::new("Test");
        let prop = Property::new("Tint", PropertyType::Color, SlotValue::Vector4([1.0; 4]));
        let reader = graph.add_node(Node::property(&prop).unwrap());
        let guid = graph.add_property(prop);

        assert!(graph.remove_property(guid).is_some());
        assert!(graph.node(reader).is_none());
        assert!(graph.properties().is_empty());
    }

    fn tint_graph(with_offset: bool) -> Graph {
        let mut graph = Graph::new("Tint");
        graph.add_property(Property::new("Strength", PropertyType::Float, SlotValue::Vector1(1.0)));
        if with_offset {
            graph.add_property(Property::new("Offset", PropertyType::Vector3, SlotValue::Vector3([0.0; 3])));
        }
        let mut output = Node::subgraph_output();
        output.add_input("Color", ValueType::Vector4);
        let output = graph.add_node(output);
        graph.set_output_node(output).unwrap();
        graph
    }

    #[test]
    fn test_bind_subgraph_prunes_connections() {
        let tint = Rc::new(tint_graph(true));
        let mut graph = Graph::new("Main");
        let sub = graph.add_node(Node::subgraph("Tint"));
        let uv = graph.add_node(procedural::create("uv").unwrap());
        graph.bind_subgraph(sub, Some(&tint)).unwrap();

        let offset = SlotId::from_guid(tint.properties()[1].guid);
        graph.connect(uv, out_slot(&graph, uv), sub, offset).unwrap();
        assert_eq!(graph.connection_count(), 1);

        graph.bind_subgraph(sub, None).unwrap();
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.node(sub).unwrap().slots().is_empty());

        assert!(matches!(
            graph.bind_subgraph(uv, Some(&tint)),
            Err(GraphError::NotASubGraphNode(_))
        ));
    }

    #[test]
    fn test_notify_subgraph_changed() {
        let tint = Rc::new(tint_graph(false));
        let mut graph = Graph::new("Main");
        let sub = graph.add_node(Node::subgraph("Tint"));
        let unrelated = graph.add_node(Node::subgraph("Unbound"));
        graph.bind_subgraph(sub, Some(&tint)).unwrap();
        assert_eq!(graph.node(sub).unwrap().input_slots().count(), 1);

        // The host publishes an edited version of the same graph
        let mut edited = (*tint).clone();
        edited.add_property(Property::new(
            "Offset",
            PropertyType::Vector3,
            SlotValue::Vector3([0.0; 3]),
        ));
        let edited = Rc::new(edited);
        drop(tint);

        assert_eq!(graph.notify_subgraph_changed(&edited).unwrap(), 1);
        assert_eq!(graph.node(sub).unwrap().input_slots().count(), 2);
        assert!(graph.node(sub).unwrap().has_preview());
        assert!(graph.node(unrelated).unwrap().slots().is_empty());

        assert_eq!(graph.resynchronize_subgraphs().unwrap(), 2);
        assert_eq!(graph.node(sub).unwrap().input_slots().count(), 2);
    }

    #[test]
    fn test_resynchronize_is_all_or_nothing() {
        let good = Rc::new(tint_graph(true));
        let mut bad = tint_graph(false);
        let mut graph = Graph::new("Main");
        let first = graph.add_node(Node::subgraph("Good"));
        let second = graph.add_node(Node::subgraph("Bad"));
        graph.bind_subgraph(first, Some(&good)).unwrap();

        bad.add_property(Property::new("Flag", PropertyType::Boolean, SlotValue::Vector1(0.0)));
        let bad = Rc::new(bad);
        assert!(graph.bind_subgraph(second, Some(&bad)).is_err());
        assert!(graph.node(second).unwrap().slots().is_empty());

        let before = graph.node(first).unwrap().slots().to_vec();
        graph.resynchronize_subgraphs().unwrap();
        assert_eq!(graph.node(first).unwrap().slots(), before.as_slice());
    }

    #[test]
    fn test_ron_keeps_structure() {
        let tint = Rc::new(tint_graph(true));
        let mut graph = Graph::new("Main");
        let checker = graph.add_node(procedural::create("checkerboard").unwrap());
        let sub = graph.add_node(Node::subgraph("Tint"));
        let master = graph.add_node(Node::master_output());
        graph.set_output_node(master).unwrap();
        graph.bind_subgraph(sub, Some(&tint)).unwrap();
        graph.connect(checker, SlotId(4), master, SlotId(0)).unwrap();

        let loaded = Graph::from_ron(&graph.to_ron().unwrap()).unwrap();
        assert_eq!(loaded.id, graph.id);
        assert_eq!(loaded.node_count(), 3);
        assert_eq!(loaded.connection_count(), 1);
        assert_eq!(loaded.output_node(), Some(master));
        assert!(matches!(
            loaded.node(checker).unwrap().kind,
            NodeKind::Procedural(def) if def.type_id == "checkerboard"
        ));

        // The graph handle is not persisted, only the last synchronized slots
        let NodeKind::SubGraph(loaded_sub) = &loaded.node(sub).unwrap().kind else {
            panic!("expected a sub-graph node");
        };
        assert!(!loaded_sub.is_bound());
        assert_eq!(loaded_sub.graph_id, Some(tint.id));
        assert_eq!(loaded.node(sub).unwrap().slots(), graph.node(sub).unwrap().slots());
    }
}
