// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-schema nodes.
//!
//! Every procedural node is a static slot schema plus one function body
//! template. The body references slots by shader name and uses the
//! `{precision}` token for float types. Definitions are looked up by type id
//! through [`DEFINITIONS`]; there is no runtime discovery.

use crate::node::{Node, NodeCategory};
use crate::requirements::{CoordinateSpace, UvChannel};
use crate::slot::{Binding, SlotDescriptor, ValueType};

/// Static description of a procedural node
#[derive(Debug)]
pub struct ProceduralDefinition {
    /// Registry key
    pub type_id: &'static str,
    /// Default node name
    pub name: &'static str,
    /// Menu path
    pub title: &'static str,
    /// Category
    pub category: NodeCategory,
    /// Tooltip
    pub description: &'static str,
    /// Generated function name, without the precision suffix
    pub function_name: &'static str,
    /// Slot schema, in parameter order
    pub slots: &'static [SlotDescriptor],
    /// Function body template
    pub body: &'static str,
}

impl ProceduralDefinition {
    /// Function name including the precision suffix token
    pub fn qualified_function_name(&self) -> String {
        format!("{}_{{precision}}", self.function_name)
    }

    /// Complete function definition
    pub fn function_source(&self) -> String {
        let params: Vec<String> = self
            .slots
            .iter()
            .map(|s| {
                let slot = s.to_slot();
                slot.value_type.parameter_declaration(&slot.shader_name, slot.direction)
            })
            .collect();
        format!(
            "void {}({})\n{}",
            self.qualified_function_name(),
            params.join(", "),
            self.body.trim_matches('\n')
        )
    }
}

const COLOR_A: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
const COLOR_B: [f32; 4] = [0.7, 0.7, 0.7, 1.0];

/// Anti-aliased checkerboard
pub static CHECKERBOARD: ProceduralDefinition = ProceduralDefinition {
    type_id: "checkerboard",
    name: "Checkerboard",
    title: "Procedural/Checkerboard",
    category: NodeCategory::Procedural,
    description: "Checkerboard pattern filtered with screen-space derivatives",
    function_name: "SG_Checkerboard",
    slots: &[
        SlotDescriptor::bound(0, "UV", ValueType::Vector2, Binding::MeshUv(UvChannel::Uv0)),
        SlotDescriptor::input(1, "ColorA", ValueType::Vector4, COLOR_A),
        SlotDescriptor::input(2, "ColorB", ValueType::Vector4, COLOR_B),
        SlotDescriptor::input(3, "Frequency", ValueType::Vector2, [1.0, 1.0, 1.0, 1.0]),
        SlotDescriptor::output(4, "Out", ValueType::Vector4),
    ],
    body: r"
{
    UV = UV + 0.25 / Frequency;
    {precision}4 derivatives = {precision}4(ddx(UV), ddy(UV));
    {precision}2 duv_length = sqrt({precision}2(dot(derivatives.xz, derivatives.xz), dot(derivatives.yw, derivatives.yw)));
    {precision} width = 0.5;
    {precision}2 distance3 = 2.0 * abs(frac((UV.xy + 0.5) * Frequency) - 0.5) - width;
    {precision}2 scale = 0.5 / duv_length.xy;
    {precision}2 blend_out = saturate(scale / 3);
    {precision}2 vector_alpha = clamp(distance3 * scale.xy * blend_out.xy, -1.0, 1.0);
    {precision} alpha = saturate(vector_alpha.x * vector_alpha.y);
    Out = lerp(ColorA, ColorB, alpha.xxxx);
}
",
};

/// Component-wise addition
pub static ADD: ProceduralDefinition = ProceduralDefinition {
    type_id: "add",
    name: "Add",
    title: "Math/Add",
    category: NodeCategory::Math,
    description: "A + B",
    function_name: "SG_Add",
    slots: &[
        SlotDescriptor::input(0, "A", ValueType::Vector4, [0.0; 4]),
        SlotDescriptor::input(1, "B", ValueType::Vector4, [1.0; 4]),
        SlotDescriptor::output(2, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = A + B;\n}",
};

/// Component-wise multiplication
pub static MULTIPLY: ProceduralDefinition = ProceduralDefinition {
    type_id: "multiply",
    name: "Multiply",
    title: "Math/Multiply",
    category: NodeCategory::Math,
    description: "A * B",
    function_name: "SG_Multiply",
    slots: &[
        SlotDescriptor::input(0, "A", ValueType::Vector4, [0.0; 4]),
        SlotDescriptor::input(1, "B", ValueType::Vector4, [2.0; 4]),
        SlotDescriptor::output(2, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = A * B;\n}",
};

/// Linear interpolation
pub static LERP: ProceduralDefinition = ProceduralDefinition {
    type_id: "lerp",
    name: "Lerp",
    title: "Math/Lerp",
    category: NodeCategory::Math,
    description: "Interpolate between A and B by T",
    function_name: "SG_Lerp",
    slots: &[
        SlotDescriptor::input(0, "A", ValueType::Vector4, [0.0; 4]),
        SlotDescriptor::input(1, "B", ValueType::Vector4, [1.0; 4]),
        SlotDescriptor::input(2, "T", ValueType::Vector4, [0.5; 4]),
        SlotDescriptor::output(3, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = lerp(A, B, T);\n}",
};

/// One minus the input
pub static ONE_MINUS: ProceduralDefinition = ProceduralDefinition {
    type_id: "one_minus",
    name: "One Minus",
    title: "Math/One Minus",
    category: NodeCategory::Math,
    description: "1 - In",
    function_name: "SG_OneMinus",
    slots: &[
        SlotDescriptor::input(0, "In", ValueType::Vector4, [1.0; 4]),
        SlotDescriptor::output(1, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = 1 - In;\n}",
};

/// View-angle falloff
pub static FRESNEL: ProceduralDefinition = ProceduralDefinition {
    type_id: "fresnel",
    name: "Fresnel",
    title: "Utility/Fresnel Effect",
    category: NodeCategory::Utility,
    description: "Fresnel term from the surface normal and view direction",
    function_name: "SG_Fresnel",
    slots: &[
        SlotDescriptor::bound(0, "Normal", ValueType::Vector3, Binding::Normal(CoordinateSpace::World)),
        SlotDescriptor::bound(
            1,
            "ViewDir",
            ValueType::Vector3,
            Binding::ViewDirection(CoordinateSpace::World),
        ),
        SlotDescriptor::input(2, "Power", ValueType::Vector1, [1.0; 4]),
        SlotDescriptor::output(3, "Out", ValueType::Vector1),
    ],
    body: "{\n    Out = pow((1.0 - saturate(dot(normalize(Normal), normalize(ViewDir)))), Power);\n}",
};

/// Mesh UV channel 0
pub static UV: ProceduralDefinition = ProceduralDefinition {
    type_id: "uv",
    name: "UV",
    title: "Input/Geometry/UV",
    category: NodeCategory::Input,
    description: "Mesh texture coordinates",
    function_name: "SG_UV",
    slots: &[
        SlotDescriptor::bound(0, "UV", ValueType::Vector4, Binding::MeshUv(UvChannel::Uv0)).hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = UV;\n}",
};

/// Shader time
pub static TIME: ProceduralDefinition = ProceduralDefinition {
    type_id: "time",
    name: "Time",
    title: "Input/Basic/Time",
    category: NodeCategory::Input,
    description: "Time in seconds and its sine",
    function_name: "SG_Time",
    slots: &[
        SlotDescriptor::bound(0, "Seconds", ValueType::Vector1, Binding::Time).hidden(),
        SlotDescriptor::output(1, "Time", ValueType::Vector1),
        SlotDescriptor::output(2, "Sine Time", ValueType::Vector1),
    ],
    body: "{\n    Time = Seconds;\n    SineTime = sin(Seconds);\n}",
};

/// World space normal
pub static NORMAL_VECTOR: ProceduralDefinition = ProceduralDefinition {
    type_id: "normal_vector",
    name: "Normal Vector",
    title: "Input/Geometry/Normal Vector",
    category: NodeCategory::Input,
    description: "Surface normal in world space",
    function_name: "SG_NormalVector",
    slots: &[
        SlotDescriptor::bound(0, "Normal", ValueType::Vector3, Binding::Normal(CoordinateSpace::World)).hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector3),
    ],
    body: "{\n    Out = Normal;\n}",
};

/// World space tangent
pub static TANGENT_VECTOR: ProceduralDefinition = ProceduralDefinition {
    type_id: "tangent_vector",
    name: "Tangent Vector",
    title: "Input/Geometry/Tangent Vector",
    category: NodeCategory::Input,
    description: "Surface tangent in world space",
    function_name: "SG_TangentVector",
    slots: &[
        SlotDescriptor::bound(0, "Tangent", ValueType::Vector3, Binding::Tangent(CoordinateSpace::World)).hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector3),
    ],
    body: "{\n    Out = Tangent;\n}",
};

/// World space bitangent
pub static BITANGENT_VECTOR: ProceduralDefinition = ProceduralDefinition {
    type_id: "bitangent_vector",
    name: "Bitangent Vector",
    title: "Input/Geometry/Bitangent Vector",
    category: NodeCategory::Input,
    description: "Surface bitangent in world space",
    function_name: "SG_BitangentVector",
    slots: &[
        SlotDescriptor::bound(
            0,
            "Bitangent",
            ValueType::Vector3,
            Binding::Bitangent(CoordinateSpace::World),
        )
        .hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector3),
    ],
    body: "{\n    Out = Bitangent;\n}",
};

/// World space view direction
pub static VIEW_DIRECTION: ProceduralDefinition = ProceduralDefinition {
    type_id: "view_direction",
    name: "View Direction",
    title: "Input/Geometry/View Direction",
    category: NodeCategory::Input,
    description: "Direction from the surface towards the camera",
    function_name: "SG_ViewDirection",
    slots: &[
        SlotDescriptor::bound(
            0,
            "ViewDir",
            ValueType::Vector3,
            Binding::ViewDirection(CoordinateSpace::World),
        )
        .hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector3),
    ],
    body: "{\n    Out = ViewDir;\n}",
};

/// World space position
pub static POSITION: ProceduralDefinition = ProceduralDefinition {
    type_id: "position",
    name: "Position",
    title: "Input/Geometry/Position",
    category: NodeCategory::Input,
    description: "Fragment position in world space",
    function_name: "SG_Position",
    slots: &[
        SlotDescriptor::bound(0, "Position", ValueType::Vector3, Binding::Position(CoordinateSpace::World)).hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector3),
    ],
    body: "{\n    Out = Position;\n}",
};

/// Screen position
pub static SCREEN_POSITION: ProceduralDefinition = ProceduralDefinition {
    type_id: "screen_position",
    name: "Screen Position",
    title: "Input/Geometry/Screen Position",
    category: NodeCategory::Input,
    description: "Clip-space position after the perspective divide",
    function_name: "SG_ScreenPosition",
    slots: &[
        SlotDescriptor::bound(0, "ScreenPos", ValueType::Vector4, Binding::ScreenPosition).hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = ScreenPos;\n}",
};

/// Vertex color
pub static VERTEX_COLOR: ProceduralDefinition = ProceduralDefinition {
    type_id: "vertex_color",
    name: "Vertex Color",
    title: "Input/Geometry/Vertex Color",
    category: NodeCategory::Input,
    description: "Interpolated mesh vertex color",
    function_name: "SG_VertexColor",
    slots: &[
        SlotDescriptor::bound(0, "Color", ValueType::Vector4, Binding::VertexColor).hidden(),
        SlotDescriptor::output(1, "Out", ValueType::Vector4),
    ],
    body: "{\n    Out = Color;\n}",
};

/// Every procedural definition, in menu order
pub static DEFINITIONS: &[&ProceduralDefinition] = &[
    &CHECKERBOARD,
    &ADD,
    &MULTIPLY,
    &LERP,
    &ONE_MINUS,
    &FRESNEL,
    &UV,
    &TIME,
    &NORMAL_VECTOR,
    &TANGENT_VECTOR,
    &BITANGENT_VECTOR,
    &VIEW_DIRECTION,
    &POSITION,
    &SCREEN_POSITION,
    &VERTEX_COLOR,
];

/// Look up a definition by type id
pub fn definition(type_id: &str) -> Option<&'static ProceduralDefinition> {
    DEFINITIONS.iter().copied().find(|d| d.type_id == type_id)
}

/// Create a node from a type id
pub fn create(type_id: &str) -> Option<Node> {
    definition(type_id).map(Node::procedural)
}

/// Serializes a definition reference as its type id
pub(crate) mod serde_definition {
    use super::{definition, ProceduralDefinition};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        def: &&'static ProceduralDefinition,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(def.type_id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<&'static ProceduralDefinition, D::Error> {
        let type_id = String::deserialize(deserializer)?;
        definition(&type_id)
            .ok_or_else(|| D::Error::custom(format!("unknown procedural node type '{type_id}'")))
    }
}
