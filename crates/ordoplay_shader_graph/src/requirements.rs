// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in value requirements and their aggregation over node sets.
//!
//! Every node reports a [`ShaderRequirements`] flag set. The host asks the
//! aggregate once per compilation to decide which surface inputs and
//! coordinate-space transforms to generate. All reductions are
//! order-independent folds.

use crate::graph::Graph;
use crate::node::Node;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Coordinate space a vector can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// Object space
    Object,
    /// View space
    View,
    /// World space
    World,
    /// Tangent space
    Tangent,
}

impl CoordinateSpace {
    /// Prefix used in surface input field names
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::View => "View",
            Self::World => "World",
            Self::Tangent => "Tangent",
        }
    }

    /// Single-space mask
    pub fn to_needed(self) -> NeededCoordinateSpace {
        match self {
            Self::Object => NeededCoordinateSpace::OBJECT,
            Self::View => NeededCoordinateSpace::VIEW,
            Self::World => NeededCoordinateSpace::WORLD,
            Self::Tangent => NeededCoordinateSpace::TANGENT,
        }
    }

    /// All spaces, in declaration order
    pub fn all() -> [CoordinateSpace; 4] {
        [Self::Object, Self::View, Self::World, Self::Tangent]
    }
}

bitflags! {
    /// Set of coordinate spaces a vector is needed in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NeededCoordinateSpace: u8 {
        /// Object space
        const OBJECT = 1 << 0;
        /// View space
        const VIEW = 1 << 1;
        /// World space
        const WORLD = 1 << 2;
        /// Tangent space
        const TANGENT = 1 << 3;
    }
}

impl NeededCoordinateSpace {
    /// Spaces contained in this mask
    pub fn spaces(self) -> impl Iterator<Item = CoordinateSpace> {
        CoordinateSpace::all()
            .into_iter()
            .filter(move |space| self.contains(space.to_needed()))
    }
}

/// Mesh texture coordinate channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UvChannel {
    /// First channel
    Uv0,
    /// Second channel
    Uv1,
    /// Third channel
    Uv2,
    /// Fourth channel
    Uv3,
}

impl UvChannel {
    /// Channel index
    pub fn index(&self) -> usize {
        match self {
            Self::Uv0 => 0,
            Self::Uv1 => 1,
            Self::Uv2 => 2,
            Self::Uv3 => 3,
        }
    }

    /// Surface input field name
    pub fn field_name(&self) -> String {
        format!("uv{}", self.index())
    }

    /// Single-channel mask
    pub fn to_mask(self) -> UvChannelMask {
        UvChannelMask::from_bits_truncate(1 << self.index())
    }

    /// All channels
    pub fn all() -> [UvChannel; 4] {
        [Self::Uv0, Self::Uv1, Self::Uv2, Self::Uv3]
    }
}

bitflags! {
    /// Set of UV channels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UvChannelMask: u8 {
        /// `uv0`
        const UV0 = 1 << 0;
        /// `uv1`
        const UV1 = 1 << 1;
        /// `uv2`
        const UV2 = 1 << 2;
        /// `uv3`
        const UV3 = 1 << 3;
    }
}

/// Built-in values a node (or a whole graph) needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderRequirements {
    /// Spaces the surface normal is needed in
    pub normal: NeededCoordinateSpace,
    /// Spaces the tangent is needed in
    pub tangent: NeededCoordinateSpace,
    /// Spaces the bitangent is needed in
    pub bitangent: NeededCoordinateSpace,
    /// Spaces the view direction is needed in
    pub view_direction: NeededCoordinateSpace,
    /// Spaces the position is needed in
    pub position: NeededCoordinateSpace,
    /// Mesh UV channels
    pub mesh_uv: UvChannelMask,
    /// Screen position
    pub screen_position: bool,
    /// Vertex color
    pub vertex_color: bool,
    /// Time parameters
    pub time: bool,
}

impl ShaderRequirements {
    /// Nothing required; the identity of [`ShaderRequirements::union`]
    pub const NONE: Self = Self {
        normal: NeededCoordinateSpace::empty(),
        tangent: NeededCoordinateSpace::empty(),
        bitangent: NeededCoordinateSpace::empty(),
        view_direction: NeededCoordinateSpace::empty(),
        position: NeededCoordinateSpace::empty(),
        mesh_uv: UvChannelMask::empty(),
        screen_position: false,
        vertex_color: false,
        time: false,
    };

    /// Requirement introduced by an unconnected bound input
    pub fn from_binding(binding: crate::slot::Binding) -> Self {
        use crate::slot::Binding;

        let mut req = Self::NONE;
        match binding {
            Binding::None => {}
            Binding::MeshUv(channel) => req.mesh_uv = channel.to_mask(),
            Binding::Normal(space) => req.normal = space.to_needed(),
            Binding::Tangent(space) => req.tangent = space.to_needed(),
            Binding::Bitangent(space) => req.bitangent = space.to_needed(),
            Binding::ViewDirection(space) => req.view_direction = space.to_needed(),
            Binding::Position(space) => req.position = space.to_needed(),
            Binding::ScreenPosition => req.screen_position = true,
            Binding::VertexColor => req.vertex_color = true,
            Binding::Time => req.time = true,
        }
        req
    }

    /// Set union
    pub fn union(self, other: Self) -> Self {
        Self {
            normal: self.normal | other.normal,
            tangent: self.tangent | other.tangent,
            bitangent: self.bitangent | other.bitangent,
            view_direction: self.view_direction | other.view_direction,
            position: self.position | other.position,
            mesh_uv: self.mesh_uv | other.mesh_uv,
            screen_position: self.screen_position || other.screen_position,
            vertex_color: self.vertex_color || other.vertex_color,
            time: self.time || other.time,
        }
    }

    /// Whether a UV channel is required
    pub fn requires_mesh_uv(&self, channel: UvChannel) -> bool {
        self.mesh_uv.contains(channel.to_mask())
    }

    /// Check if nothing is required
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for ShaderRequirements {
    fn default() -> Self {
        Self::NONE
    }
}

/// Maximum sub-graph nesting followed when aggregating requirements
pub const MAX_SUBGRAPH_DEPTH: usize = 16;

/// Computes requirement unions over a set of nodes of one graph
pub struct RequirementAggregator<'a> {
    graph: &'a Graph,
    nodes: Vec<&'a Node>,
    depth: usize,
}

impl<'a> RequirementAggregator<'a> {
    /// Aggregate over an explicit node set
    pub fn new(graph: &'a Graph, nodes: Vec<&'a Node>) -> Self {
        Self {
            graph,
            nodes,
            depth: 0,
        }
    }

    /// Aggregate over the graph's active nodes
    pub fn for_active_nodes(graph: &'a Graph) -> Self {
        let nodes = graph
            .active_nodes()
            .into_iter()
            .filter_map(|id| graph.node(id))
            .collect();
        Self::new(graph, nodes)
    }

    pub(crate) fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Boolean-any query
    pub fn any(&self, query: impl Fn(&ShaderRequirements) -> bool) -> bool {
        self.nodes
            .iter()
            .any(|node| query(&node.requirements_at_depth(self.graph, self.depth)))
    }

    /// Mask-union query, seeded at the empty mask
    pub fn mask_union(
        &self,
        query: impl Fn(&ShaderRequirements) -> NeededCoordinateSpace,
    ) -> NeededCoordinateSpace {
        self.nodes
            .iter()
            .fold(NeededCoordinateSpace::empty(), |mask, node| {
                mask | query(&node.requirements_at_depth(self.graph, self.depth))
            })
    }

    /// Union of every requirement
    pub fn all(&self) -> ShaderRequirements {
        self.nodes.iter().fold(ShaderRequirements::NONE, |acc, node| {
            acc.union(node.requirements_at_depth(self.graph, self.depth))
        })
    }

    /// Spaces the normal is needed in
    pub fn requires_normal(&self) -> NeededCoordinateSpace {
        self.mask_union(|r| r.normal)
    }

    /// Spaces the tangent is needed in
    pub fn requires_tangent(&self) -> NeededCoordinateSpace {
        self.mask_union(|r| r.tangent)
    }

    /// Spaces the bitangent is needed in
    pub fn requires_bitangent(&self) -> NeededCoordinateSpace {
        self.mask_union(|r| r.bitangent)
    }

    /// Spaces the view direction is needed in
    pub fn requires_view_direction(&self) -> NeededCoordinateSpace {
        self.mask_union(|r| r.view_direction)
    }

    /// Spaces the position is needed in
    pub fn requires_position(&self) -> NeededCoordinateSpace {
        self.mask_union(|r| r.position)
    }

    /// Whether any node reads the given UV channel
    pub fn requires_mesh_uv(&self, channel: UvChannel) -> bool {
        self.any(|r| r.requires_mesh_uv(channel))
    }

    /// Whether any node reads the screen position
    pub fn requires_screen_position(&self) -> bool {
        self.any(|r| r.screen_position)
    }

    /// Whether any node reads the vertex color
    pub fn requires_vertex_color(&self) -> bool {
        self.any(|r| r.vertex_color)
    }

    /// Whether any node reads time
    pub fn requires_time(&self) -> bool {
        self.any(|r| r.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::procedural;
    use crate::slot::Binding;

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_union_identity() {
        let req = ShaderRequirements::from_binding(Binding::Normal(CoordinateSpace::World));
        assert_eq!(req.union(ShaderRequirements::NONE), req);
        assert!(ShaderRequirements::NONE.is_empty());
    }

    #[test]
    fn test_from_binding() {
        let req = ShaderRequirements::from_binding(Binding::MeshUv(UvChannel::Uv2));
        assert!(req.requires_mesh_uv(UvChannel::Uv2));
        assert!(!req.requires_mesh_uv(UvChannel::Uv0));

        let req = ShaderRequirements::from_binding(Binding::Time);
        assert!(req.time);
        assert!(req.normal.is_empty());
    }

    #[test]
    fn test_spaces_iterates_mask() {
        let mask = NeededCoordinateSpace::WORLD | NeededCoordinateSpace::OBJECT;
        let spaces: Vec<_> = mask.spaces().collect();
        assert_eq!(spaces, vec![CoordinateSpace::Object, CoordinateSpace::World]);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let mut graph = Graph::new("Requirements");
        let ids = [
            graph.add_node(procedural::create("normal_vector").unwrap()),
            graph.add_node(procedural::create("view_direction").unwrap()),
            graph.add_node(procedural::create("uv").unwrap()),
            graph.add_node(procedural::create("time").unwrap()),
        ];

        let expected = RequirementAggregator::new(
            &graph,
            ids.iter().filter_map(|id| graph.node(*id)).collect(),
        )
        .all();
        assert_eq!(expected.normal, NeededCoordinateSpace::WORLD);
        assert!(expected.time);
        assert!(expected.requires_mesh_uv(UvChannel::Uv0));

        for order in permutations(&ids) {
            let nodes = order.iter().filter_map(|id| graph.node(*id)).collect();
            let aggregator = RequirementAggregator::new(&graph, nodes);
            assert_eq!(aggregator.all(), expected);
            assert_eq!(aggregator.requires_normal(), expected.normal);
            assert_eq!(aggregator.requires_view_direction(), expected.view_direction);
            assert!(aggregator.requires_time());
            assert!(!aggregator.requires_vertex_color());
        }
    }

    #[test]
    fn test_empty_set_is_identity() {
        let graph = Graph::new("Empty");
        let aggregator = RequirementAggregator::new(&graph, Vec::new());
        assert!(aggregator.requires_normal().is_empty());
        assert!(!aggregator.requires_mesh_uv(UvChannel::Uv0));
        assert!(aggregator.all().is_empty());
    }
}
