// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node variants and the shader graph node registry.

pub mod procedural;
pub mod subgraph;

use crate::node::{NodeCategory, NodeRegistry, NodeTemplate, NodeType};

/// Create the registry with every node type the editor can place
pub fn create_shader_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Output Nodes
    // ========================================================================

    registry.register(NodeType {
        id: "master_output".to_string(),
        title: "Output/Master".to_string(),
        category: NodeCategory::Output,
        description: "Surface description of the final shader".to_string(),
        template: NodeTemplate::MasterOutput,
    });

    registry.register(NodeType {
        id: "subgraph_output".to_string(),
        title: "Output/Sub-graph Output".to_string(),
        category: NodeCategory::Output,
        description: "Values returned by a sub-graph".to_string(),
        template: NodeTemplate::SubGraphOutput,
    });

    // ========================================================================
    // Sub-graphs
    // ========================================================================

    registry.register(NodeType {
        id: "subgraph".to_string(),
        title: "Sub-graph/Reference".to_string(),
        category: NodeCategory::SubGraph,
        description: "Embed another graph as a single node".to_string(),
        template: NodeTemplate::SubGraph,
    });

    // ========================================================================
    // Fixed-schema nodes
    // ========================================================================

    for def in procedural::DEFINITIONS {
        registry.register(NodeType {
            id: def.type_id.to_string(),
            title: def.title.to_string(),
            category: def.category,
            description: def.description.to_string(),
            template: NodeTemplate::Procedural(*def),
        });
    }

    registry
}
