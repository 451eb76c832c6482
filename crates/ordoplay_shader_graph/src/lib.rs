// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader graph compiler for `OrdoPlay` Editor.
//!
//! A shader graph is a directed acyclic graph of nodes whose typed slots are
//! wired together. This crate provides:
//! - The node model: procedural nodes, property readers, sub-graph references
//!   and output nodes
//! - Requirement aggregation over the active node set
//! - Uniform collection for final and preview builds
//! - Shader source generation with a deferred `{precision}` token
//!
//! ## Sub-graphs
//!
//! A sub-graph node holds a non-owning handle to another graph and mirrors its
//! properties as inputs and its output node's inputs as outputs. Hosts notify
//! the owning graph with [`Graph::notify_subgraph_changed`] after editing a
//! referenced graph.

pub mod slot;
pub mod requirements;
pub mod property;
pub mod node;
pub mod connection;
pub mod graph;
pub mod generation;
pub mod nodes;

pub use connection::{Connection, ConnectionId};
pub use generation::{
    compile, compile_from, CompileOptions, GeneratedShader, GenerationError, GenerationMode, Precision,
};
pub use graph::{ConnectionError, Graph, GraphError, GraphId};
pub use node::{Node, NodeId, NodeKind, NodeRegistry, NodeType};
pub use nodes::subgraph::{ConfigurationError, SubGraphNode};
pub use property::{PreviewProperty, Property, PropertyType, ShaderProperty};
pub use requirements::{CoordinateSpace, NeededCoordinateSpace, ShaderRequirements, UvChannel};
pub use slot::{Binding, Slot, SlotDirection, SlotId, SlotValue, ValueType};
