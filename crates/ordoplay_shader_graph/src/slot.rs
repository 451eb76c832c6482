// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot definitions for node inputs/outputs.

use crate::requirements::{CoordinateSpace, UvChannel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a slot, unique within its owning node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl SlotId {
    /// Derive a stable slot id from a property guid.
    ///
    /// The same guid always yields the same id, so slots mirroring a
    /// property survive re-synchronization.
    pub fn from_guid(guid: Uuid) -> Self {
        let bits = guid.as_u128();
        let folded = (bits as u32)
            ^ ((bits >> 32) as u32)
            ^ ((bits >> 64) as u32)
            ^ ((bits >> 96) as u32);
        Self(folded)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotDirection {
    /// Input slot
    Input,
    /// Output slot
    Output,
}

/// Data type that can flow through slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Scalar
    Vector1,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector / Color
    Vector4,
    /// 2x2 matrix
    Matrix2,
    /// 3x3 matrix
    Matrix3,
    /// 4x4 matrix
    Matrix4,
    /// 2D texture with its sampler
    Texture2D,
}

impl ValueType {
    /// Number of components for vector types
    pub fn components(&self) -> Option<usize> {
        match self {
            Self::Vector1 => Some(1),
            Self::Vector2 => Some(2),
            Self::Vector3 => Some(3),
            Self::Vector4 => Some(4),
            Self::Matrix2 | Self::Matrix3 | Self::Matrix4 | Self::Texture2D => None,
        }
    }

    /// Check if a value of this type can flow into a slot of `other` type
    pub fn can_convert_to(&self, other: &ValueType) -> bool {
        if self == other {
            return true;
        }

        // Vectors coerce freely, everything else must match exactly
        self.components().is_some() && other.components().is_some()
    }

    /// Shader type keyword, with a `{precision}` token for float types
    pub fn shader_type(&self) -> &'static str {
        match self {
            Self::Vector1 => "{precision}",
            Self::Vector2 => "{precision}2",
            Self::Vector3 => "{precision}3",
            Self::Vector4 => "{precision}4",
            Self::Matrix2 => "{precision}2x2",
            Self::Matrix3 => "{precision}3x3",
            Self::Matrix4 => "{precision}4x4",
            Self::Texture2D => "Texture2D",
        }
    }

    /// Function parameter declaration for a slot of this type
    pub fn parameter_declaration(&self, name: &str, direction: SlotDirection) -> String {
        match (self, direction) {
            (Self::Texture2D, _) => format!("TEXTURE2D_PARAM({name}, sampler_{name})"),
            (_, SlotDirection::Input) => format!("{} {name}", self.shader_type()),
            (_, SlotDirection::Output) => format!("out {} {name}", self.shader_type()),
        }
    }

    /// Function call argument for an input of this type
    pub fn argument(&self, expression: &str) -> String {
        match self {
            Self::Texture2D => format!("TEXTURE2D_ARGS({expression}, sampler_{expression})"),
            _ => expression.to_string(),
        }
    }

    /// Rewrite `expression` of this type into an expression of type `to`.
    ///
    /// Callers must check [`ValueType::can_convert_to`] first; incompatible
    /// pairs return the expression unchanged.
    pub fn convert_expression(&self, expression: &str, to: ValueType) -> String {
        let (Some(from_n), Some(to_n)) = (self.components(), to.components()) else {
            return expression.to_string();
        };

        match from_n.cmp(&to_n) {
            std::cmp::Ordering::Equal => expression.to_string(),
            std::cmp::Ordering::Greater => {
                format!("{expression}.{}", &"xyzw"[..to_n])
            }
            std::cmp::Ordering::Less if from_n == 1 => {
                format!("(({}){expression})", to.shader_type())
            }
            std::cmp::Ordering::Less => {
                let padding = ", 0".repeat(to_n - from_n);
                format!("{}({expression}{padding})", to.shader_type())
            }
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vector1 => "Vector1",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Vector4 => "Vector4",
            Self::Matrix2 => "Matrix2",
            Self::Matrix3 => "Matrix3",
            Self::Matrix4 => "Matrix4",
            Self::Texture2D => "Texture2D",
        };
        f.write_str(name)
    }
}

/// Built-in value an unconnected input slot falls back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Binding {
    /// No binding, the slot uses its default value
    #[default]
    None,
    /// Mesh texture coordinates
    MeshUv(UvChannel),
    /// Surface normal
    Normal(CoordinateSpace),
    /// Surface tangent
    Tangent(CoordinateSpace),
    /// Surface bitangent
    Bitangent(CoordinateSpace),
    /// Direction towards the camera
    ViewDirection(CoordinateSpace),
    /// Fragment position
    Position(CoordinateSpace),
    /// Screen space position
    ScreenPosition,
    /// Interpolated vertex color
    VertexColor,
    /// Shader time in seconds
    Time,
}

impl Binding {
    /// Surface input expression and its type, if bound
    pub fn expression(&self) -> Option<(String, ValueType)> {
        let bound = match self {
            Self::None => return None,
            Self::MeshUv(channel) => (format!("IN.{}", channel.field_name()), ValueType::Vector4),
            Self::Normal(space) => (format!("IN.{}SpaceNormal", space.name()), ValueType::Vector3),
            Self::Tangent(space) => (format!("IN.{}SpaceTangent", space.name()), ValueType::Vector3),
            Self::Bitangent(space) => {
                (format!("IN.{}SpaceBiTangent", space.name()), ValueType::Vector3)
            }
            Self::ViewDirection(space) => {
                (format!("IN.{}SpaceViewDirection", space.name()), ValueType::Vector3)
            }
            Self::Position(space) => (format!("IN.{}SpacePosition", space.name()), ValueType::Vector3),
            Self::ScreenPosition => ("IN.ScreenPosition".to_string(), ValueType::Vector4),
            Self::VertexColor => ("IN.VertexColor".to_string(), ValueType::Vector4),
            Self::Time => ("IN.TimeParameters.x".to_string(), ValueType::Vector1),
        };
        Some(bound)
    }
}

/// A slot on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot id, unique within the owning node
    pub id: SlotId,
    /// Name shown in the editor
    pub display_name: String,
    /// Identifier used in generated code
    pub shader_name: String,
    /// Slot direction
    pub direction: SlotDirection,
    /// Data type
    pub value_type: ValueType,
    /// Value used when an input is left unconnected
    pub default_value: SlotValue,
    /// Built-in value used when an input is left unconnected
    pub binding: Binding,
    /// Hidden slots cannot be connected
    pub hidden: bool,
}

impl Slot {
    /// Create a new slot
    pub fn new(
        id: SlotId,
        display_name: impl Into<String>,
        shader_name: impl Into<String>,
        direction: SlotDirection,
        value_type: ValueType,
        default_value: SlotValue,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            shader_name: sanitize_identifier(&shader_name.into()),
            direction,
            value_type,
            default_value,
            binding: Binding::None,
            hidden: false,
        }
    }

    /// Create a new input slot with a zero default
    pub fn input(id: u32, name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self::new(
            SlotId(id),
            name.clone(),
            name,
            SlotDirection::Input,
            value_type,
            SlotValue::zero(value_type),
        )
    }

    /// Create a new output slot
    pub fn output(id: u32, name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self::new(
            SlotId(id),
            name.clone(),
            name,
            SlotDirection::Output,
            value_type,
            SlotValue::zero(value_type),
        )
    }

    /// Set the default value
    pub fn with_default(mut self, value: SlotValue) -> Self {
        self.default_value = value;
        self
    }

    /// Bind to a built-in value
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    /// Hide from the editor
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Check if this is an input slot
    pub fn is_input(&self) -> bool {
        self.direction == SlotDirection::Input
    }

    /// Check if this is an output slot
    pub fn is_output(&self) -> bool {
        self.direction == SlotDirection::Output
    }

    /// Check if a connection from this slot into `other` is valid
    pub fn can_connect(&self, other: &Slot) -> bool {
        if !self.is_output() || !other.is_input() || other.hidden {
            return false;
        }

        self.value_type.can_convert_to(&other.value_type)
    }
}

/// Statically declared slot, used by fixed node schemas
#[derive(Debug, Clone, Copy)]
pub struct SlotDescriptor {
    /// Slot id
    pub id: u32,
    /// Display and shader name
    pub name: &'static str,
    /// Slot direction
    pub direction: SlotDirection,
    /// Data type
    pub value_type: ValueType,
    /// Default components, truncated to the slot type
    pub default: [f32; 4],
    /// Built-in binding
    pub binding: Binding,
    /// Hidden from the editor
    pub hidden: bool,
}

impl SlotDescriptor {
    /// Declare an input
    pub const fn input(id: u32, name: &'static str, value_type: ValueType, default: [f32; 4]) -> Self {
        Self {
            id,
            name,
            direction: SlotDirection::Input,
            value_type,
            default,
            binding: Binding::None,
            hidden: false,
        }
    }

    /// Declare an input bound to a built-in value
    pub const fn bound(id: u32, name: &'static str, value_type: ValueType, binding: Binding) -> Self {
        Self {
            id,
            name,
            direction: SlotDirection::Input,
            value_type,
            default: [0.0; 4],
            binding,
            hidden: false,
        }
    }

    /// Declare an output
    pub const fn output(id: u32, name: &'static str, value_type: ValueType) -> Self {
        Self {
            id,
            name,
            direction: SlotDirection::Output,
            value_type,
            default: [0.0; 4],
            binding: Binding::None,
            hidden: false,
        }
    }

    /// Hide from the editor
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Instantiate the slot
    pub fn to_slot(&self) -> Slot {
        Slot {
            id: SlotId(self.id),
            display_name: self.name.to_string(),
            shader_name: sanitize_identifier(self.name),
            direction: self.direction,
            value_type: self.value_type,
            default_value: SlotValue::from_components(self.value_type, self.default),
            binding: self.binding,
            hidden: self.hidden,
        }
    }
}

/// Value that can be stored in a slot or property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotValue {
    /// Scalar
    Vector1(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector / Color
    Vector4([f32; 4]),
    /// 2x2 matrix, row major
    Matrix2([f32; 4]),
    /// 3x3 matrix, row major
    Matrix3([f32; 9]),
    /// 4x4 matrix, row major
    Matrix4([f32; 16]),
    /// Texture asset name
    Texture2D(Option<String>),
}

impl SlotValue {
    /// Zero value for a type; matrices default to identity
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Matrix2 => Self::Matrix2(identity()),
            ValueType::Matrix3 => Self::Matrix3(identity()),
            ValueType::Matrix4 => Self::Matrix4(identity()),
            ValueType::Texture2D => Self::Texture2D(None),
            _ => Self::from_components(value_type, [0.0; 4]),
        }
    }

    /// Build a vector value from up to four components
    pub fn from_components(value_type: ValueType, c: [f32; 4]) -> Self {
        match value_type {
            ValueType::Vector1 => Self::Vector1(c[0]),
            ValueType::Vector2 => Self::Vector2([c[0], c[1]]),
            ValueType::Vector3 => Self::Vector3([c[0], c[1], c[2]]),
            ValueType::Vector4 => Self::Vector4(c),
            other => Self::zero(other),
        }
    }

    /// Get the value type for this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Vector1(_) => ValueType::Vector1,
            Self::Vector2(_) => ValueType::Vector2,
            Self::Vector3(_) => ValueType::Vector3,
            Self::Vector4(_) => ValueType::Vector4,
            Self::Matrix2(_) => ValueType::Matrix2,
            Self::Matrix3(_) => ValueType::Matrix3,
            Self::Matrix4(_) => ValueType::Matrix4,
            Self::Texture2D(_) => ValueType::Texture2D,
        }
    }

    /// Shader literal for this value; textures have none
    pub fn literal(&self) -> Option<String> {
        let literal = match self {
            Self::Vector1(v) => format_float(*v),
            Self::Vector2(v) => constructor(ValueType::Vector2, v),
            Self::Vector3(v) => constructor(ValueType::Vector3, v),
            Self::Vector4(v) => constructor(ValueType::Vector4, v),
            Self::Matrix2(m) => constructor(ValueType::Matrix2, m),
            Self::Matrix3(m) => constructor(ValueType::Matrix3, m),
            Self::Matrix4(m) => constructor(ValueType::Matrix4, m),
            Self::Texture2D(_) => return None,
        };
        Some(literal)
    }
}

fn identity<const N: usize>() -> [f32; N] {
    let size = (N as f32).sqrt() as usize;
    let mut m = [0.0; N];
    for i in 0..size {
        m[i * size + i] = 1.0;
    }
    m
}

fn constructor(value_type: ValueType, components: &[f32]) -> String {
    let args: Vec<String> = components.iter().copied().map(format_float).collect();
    format!("{}({})", value_type.shader_type(), args.join(", "))
}

/// Format a float so it always reads as a float literal
pub fn format_float(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Turn a display name into a valid shader identifier
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '_' => Some(c),
            ' ' | '-' | '/' => None,
            _ => Some('_'),
        })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_coercion() {
        assert!(ValueType::Vector1.can_convert_to(&ValueType::Vector4));
        assert!(ValueType::Vector4.can_convert_to(&ValueType::Vector2));
        assert!(ValueType::Matrix3.can_convert_to(&ValueType::Matrix3));
        assert!(!ValueType::Matrix3.can_convert_to(&ValueType::Matrix4));
        assert!(!ValueType::Texture2D.can_convert_to(&ValueType::Vector4));
        assert!(!ValueType::Vector3.can_convert_to(&ValueType::Matrix3));
    }

    #[test]
    fn test_convert_expression() {
        assert_eq!(ValueType::Vector4.convert_expression("c", ValueType::Vector2), "c.xy");
        assert_eq!(
            ValueType::Vector1.convert_expression("s", ValueType::Vector3),
            "(({precision}3)s)"
        );
        assert_eq!(
            ValueType::Vector2.convert_expression("uv", ValueType::Vector4),
            "{precision}4(uv, 0, 0)"
        );
        assert_eq!(ValueType::Vector3.convert_expression("n", ValueType::Vector3), "n");
    }

    #[test]
    fn test_literals() {
        assert_eq!(SlotValue::Vector1(1.0).literal().unwrap(), "1.0");
        assert_eq!(
            SlotValue::Vector4([0.2, 0.2, 0.2, 1.0]).literal().unwrap(),
            "{precision}4(0.2, 0.2, 0.2, 1.0)"
        );
        assert_eq!(
            SlotValue::zero(ValueType::Matrix2).literal().unwrap(),
            "{precision}2x2(1.0, 0.0, 0.0, 1.0)"
        );
        assert!(SlotValue::Texture2D(None).literal().is_none());
    }

    #[test]
    fn test_descriptor_truncates_default() {
        let slot = SlotDescriptor::input(3, "Frequency", ValueType::Vector2, [1.0, 1.0, 1.0, 1.0]).to_slot();
        assert_eq!(slot.default_value, SlotValue::Vector2([1.0, 1.0]));
        assert_eq!(slot.id, SlotId(3));
        assert!(slot.is_input());
    }

    #[test]
    fn test_guid_slot_id_is_stable() {
        let guid = Uuid::new_v4();
        assert_eq!(SlotId::from_guid(guid), SlotId::from_guid(guid));
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Color A"), "ColorA");
        assert_eq!(sanitize_identifier("2nd"), "_2nd");
        assert_eq!(sanitize_identifier("a.b"), "a_b");
    }

    #[test]
    fn test_can_connect_requires_output_to_input() {
        let out = Slot::output(0, "Out", ValueType::Vector4);
        let input = Slot::input(1, "In", ValueType::Vector2);
        assert!(out.can_connect(&input));
        assert!(!input.can_connect(&out));
        assert!(!out.can_connect(&input.clone().hidden()));
    }
}
