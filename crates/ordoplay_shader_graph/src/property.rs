// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph properties and the collector that turns them into shader uniforms.

use crate::slot::{sanitize_identifier, SlotValue, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of an externally configurable graph value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// RGBA color
    Color,
    /// 2D texture
    Texture,
    /// Scalar
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// 2x2 matrix
    Matrix2,
    /// 3x3 matrix
    Matrix3,
    /// 4x4 matrix
    Matrix4,
    /// Boolean toggle
    Boolean,
    /// Cube map texture
    Cubemap,
}

/// A graph-level property, exposed as a shader uniform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Stable identity
    pub guid: Uuid,
    /// Name shown in the editor
    pub display_name: String,
    /// Identifier used in generated code
    pub reference_name: String,
    /// Property kind
    pub property_type: PropertyType,
    /// Initial value
    pub default_value: SlotValue,
}

impl Property {
    /// Create a property; the reference name is derived from the display name
    pub fn new(display_name: impl Into<String>, property_type: PropertyType, default_value: SlotValue) -> Self {
        let display_name = display_name.into();
        Self {
            guid: Uuid::new_v4(),
            reference_name: format!("_{}", sanitize_identifier(&display_name).trim_start_matches('_')),
            display_name,
            property_type,
            default_value,
        }
    }

    /// Override the reference name
    pub fn with_reference_name(mut self, reference_name: impl Into<String>) -> Self {
        self.reference_name = sanitize_identifier(&reference_name.into());
        self
    }

    /// Snapshot of the current value for live preview
    pub fn preview(&self) -> PreviewProperty {
        PreviewProperty {
            name: self.reference_name.clone(),
            value: self.default_value.clone(),
        }
    }
}

/// Read-only snapshot of a value for the preview renderer
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewProperty {
    /// Uniform name
    pub name: String,
    /// Current value
    pub value: SlotValue,
}

/// A uniform declaration contributed during compilation
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProperty {
    /// Uniform name
    pub reference_name: String,
    /// Name shown in material inspectors
    pub display_name: String,
    /// Uniform type
    pub value_type: ValueType,
    /// Initial value
    pub default_value: SlotValue,
    /// Generated for an unconnected slot rather than declared by the author
    pub generated: bool,
}

impl ShaderProperty {
    /// Uniform declaration lines, with `{precision}` tokens
    pub fn declaration(&self) -> String {
        match self.value_type {
            ValueType::Texture2D => format!(
                "TEXTURE2D({0});\nSAMPLER(sampler_{0});",
                self.reference_name
            ),
            other => format!("{} {};", other.shader_type(), self.reference_name),
        }
    }
}

/// Collects uniform declarations from the active node set.
///
/// Properties are keyed by reference name; the first contribution wins.
#[derive(Debug, Clone, Default)]
pub struct PropertyCollector {
    properties: IndexMap<String, ShaderProperty>,
}

impl PropertyCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property; returns false if the name was already collected
    pub fn add_shader_property(&mut self, property: ShaderProperty) -> bool {
        if self.properties.contains_key(&property.reference_name) {
            return false;
        }
        self.properties.insert(property.reference_name.clone(), property);
        true
    }

    /// Get a collected property by reference name
    pub fn get(&self, reference_name: &str) -> Option<&ShaderProperty> {
        self.properties.get(reference_name)
    }

    /// Collected properties in contribution order
    pub fn properties(&self) -> impl Iterator<Item = &ShaderProperty> {
        self.properties.values()
    }

    /// Number of collected properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if nothing was collected
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// All uniform declarations, one per line
    pub fn declarations(&self) -> String {
        self.properties
            .values()
            .map(ShaderProperty::declaration)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Consume into the collected list
    pub fn into_properties(self) -> Vec<ShaderProperty> {
        self.properties.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(name: &str, value_type: ValueType) -> ShaderProperty {
        ShaderProperty {
            reference_name: name.to_string(),
            display_name: name.to_string(),
            value_type,
            default_value: SlotValue::zero(value_type),
            generated: false,
        }
    }

    #[test]
    fn test_reference_name_from_display_name() {
        let prop = Property::new("Base Color", PropertyType::Color, SlotValue::Vector4([1.0; 4]));
        assert_eq!(prop.reference_name, "_BaseColor");
        assert_eq!(prop.preview().name, "_BaseColor");
    }

    #[test]
    fn test_collector_deduplicates() {
        let mut collector = PropertyCollector::new();
        assert!(collector.add_shader_property(uniform("_Tint", ValueType::Vector4)));
        assert!(!collector.add_shader_property(uniform("_Tint", ValueType::Vector1)));
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.get("_Tint").unwrap().value_type, ValueType::Vector4);
    }

    #[test]
    fn test_declarations() {
        let mut collector = PropertyCollector::new();
        collector.add_shader_property(uniform("_Tint", ValueType::Vector4));
        collector.add_shader_property(uniform("_MainTex", ValueType::Texture2D));
        assert_eq!(
            collector.declarations(),
            "{precision}4 _Tint;\nTEXTURE2D(_MainTex);\nSAMPLER(sampler__MainTex);"
        );
    }
}
