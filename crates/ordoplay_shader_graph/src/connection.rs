// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edges between node slots.
//!
//! An edge runs from an output slot to an input slot. Slot ids are only
//! unique within their node, so each endpoint is a `(NodeId, SlotId)` pair
//! and a bare `SlotId` never identifies a slot on its own.

use crate::node::NodeId;
use crate::slot::SlotId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an edge, unique within its graph and stable across saves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge from output slot `from_slot` of `from_node` to input slot `to_slot`
/// of `to_node`.
///
/// An input endpoint accepts at most one edge; an output endpoint may fan out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Edge identifier
    pub id: ConnectionId,
    /// Node owning the output endpoint
    pub from_node: NodeId,
    /// Output slot on `from_node`
    pub from_slot: SlotId,
    /// Node owning the input endpoint
    pub to_node: NodeId,
    /// Input slot on `to_node`
    pub to_slot: SlotId,
}

impl Connection {
    /// Edge with a fresh id; slot existence and type compatibility are the
    /// graph's concern
    pub fn new(from_node: NodeId, from_slot: SlotId, to_node: NodeId, to_slot: SlotId) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            from_slot,
            to_node,
            to_slot,
        }
    }

    /// Check if either endpoint belongs to `node_id`
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this edge feeds input `slot_id` of `node_id`
    pub fn targets(&self, node_id: NodeId, slot_id: SlotId) -> bool {
        self.to_node == node_id && self.to_slot == slot_id
    }

    /// Check if this edge reads output `slot_id` of `node_id`
    pub fn reads(&self, node_id: NodeId, slot_id: SlotId) -> bool {
        self.from_node == node_id && self.from_slot == slot_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_predicates() {
        let (source, target, other) = (NodeId::new(), NodeId::new(), NodeId::new());
        let edge = Connection::new(source, SlotId(2), target, SlotId(2));

        assert!(edge.reads(source, SlotId(2)));
        assert!(!edge.reads(target, SlotId(2)));
        assert!(!edge.reads(source, SlotId(0)));

        assert!(edge.targets(target, SlotId(2)));
        assert!(!edge.targets(source, SlotId(2)));
        assert!(!edge.targets(other, SlotId(2)));

        assert!(edge.involves_node(source));
        assert!(edge.involves_node(target));
        assert!(!edge.involves_node(other));
    }

    #[test]
    fn test_ids_are_distinct() {
        let (a, b) = (NodeId::new(), NodeId::new());
        let first = Connection::new(a, SlotId(0), b, SlotId(0));
        let second = Connection::new(a, SlotId(0), b, SlotId(0));
        assert_ne!(first.id, second.id);
    }
}
