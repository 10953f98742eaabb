//! Scene graph node types
//!
//! Core types for the CPU-side scene graph: node IDs, transforms, materials, content variants, and nodes.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use super::particles::ParticleSystem;
use super::resources::{ModelHandle, TextureHandle};

/// Unique identifier for a scene graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneNodeId(pub u64);

/// Local transform relative to the parent node.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl LocalTransform {
    /// Identity transform (no translation, rotation, or scaling).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a translation-only transform.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a rotation-only transform.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Convert to a 4x4 matrix.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.position,
        )
    }
}

/// Draw ordering bucket. Lower bins are drawn first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderBin {
    /// Sky domes (day atmosphere, night stars).
    Atmosphere,
    /// Sun and moons.
    Celestial,
    /// Cloud layers.
    Clouds,
    /// Rain and weather particle overlays.
    #[default]
    Weather,
}

/// Per-node appearance values written by updaters.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Emission / tint colour (RGBA).
    pub color: Vec4,
    pub ambient: Vec4,
    pub fog_color: Vec4,
    pub fog_depth: f32,
    /// Opacity multiplier applied on top of `color.w`.
    pub alpha: f32,
    /// Texture coordinate offset (UV scroll).
    pub uv_offset: Vec2,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            ambient: Vec4::ZERO,
            fog_color: Vec4::ZERO,
            fog_depth: 0.0,
            alpha: 1.0,
            uv_offset: Vec2::ZERO,
        }
    }
}

/// Visibility gate evaluated against the eye point during traversal.
///
/// Unlike [`SceneNode::visible`], a gate is re-evaluated every traversal and
/// never changes the node's own state, so lifting it restores the node
/// instantly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CullGate {
    /// Skip the subtree while the eye is below `height` (world Y).
    HideBelow { height: f32 },
}

impl CullGate {
    /// Whether this gate culls its subtree for the given eye position.
    #[inline]
    pub fn hides(&self, eye: Vec3) -> bool {
        match *self {
            CullGate::HideBelow { height } => eye.y < height,
        }
    }
}

/// What a scene node contains.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContent {
    /// A grouping node with no geometry of its own.
    Group,

    /// A mesh asset with an optional texture override (domes, cloud layers).
    Mesh {
        model_name: String,
        model: Option<ModelHandle>,
        texture_name: String,
        texture: Option<TextureHandle>,
    },

    /// A camera-facing textured quad (sun disc, glare, moons).
    Billboard {
        texture_name: String,
        texture: Option<TextureHandle>,
        size: f32,
    },

    /// A CPU-simulated particle system (rain).
    Particles(ParticleSystem),
}

impl NodeContent {
    /// Build mesh content.
    pub fn mesh(model_name: impl Into<String>, model: Option<ModelHandle>) -> Self {
        NodeContent::Mesh {
            model_name: model_name.into(),
            model,
            texture_name: String::new(),
            texture: None,
        }
    }

    /// Build billboard content.
    pub fn billboard(texture_name: impl Into<String>, texture: Option<TextureHandle>, size: f32) -> Self {
        NodeContent::Billboard {
            texture_name: texture_name.into(),
            texture,
            size,
        }
    }

    /// Name of the texture currently bound, if the content carries one.
    pub fn texture_name(&self) -> Option<&str> {
        match self {
            NodeContent::Mesh { texture_name, .. } | NodeContent::Billboard { texture_name, .. } => {
                Some(texture_name.as_str())
            }
            NodeContent::Particles(ps) => Some(ps.texture_name()),
            NodeContent::Group => None,
        }
    }

    /// Handle of the texture currently bound.
    pub fn texture(&self) -> Option<TextureHandle> {
        match self {
            NodeContent::Mesh { texture, .. } | NodeContent::Billboard { texture, .. } => *texture,
            NodeContent::Particles(ps) => ps.texture(),
            NodeContent::Group => None,
        }
    }

    /// Bind a texture. Ignored for groups and particle systems.
    pub fn set_texture(&mut self, name: &str, handle: Option<TextureHandle>) {
        match self {
            NodeContent::Mesh { texture_name, texture, .. }
            | NodeContent::Billboard { texture_name, texture, .. } => {
                name.clone_into(texture_name);
                *texture = handle;
            }
            NodeContent::Particles(_) | NodeContent::Group => {}
        }
    }

    /// Mutable access to the particle system, if this is one.
    pub fn particles_mut(&mut self) -> Option<&mut ParticleSystem> {
        match self {
            NodeContent::Particles(ps) => Some(ps),
            _ => None,
        }
    }

    /// Shared access to the particle system, if this is one.
    pub fn particles(&self) -> Option<&ParticleSystem> {
        match self {
            NodeContent::Particles(ps) => Some(ps),
            _ => None,
        }
    }
}

/// A single node in the scene graph.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub id: SceneNodeId,
    pub name: String,
    pub parent: Option<SceneNodeId>,
    pub children: Vec<SceneNodeId>,
    pub local_transform: LocalTransform,
    /// Cached world transform (recomputed during propagation).
    pub world_transform: Mat4,
    pub bin: RenderBin,
    pub visible: bool,
    pub cull_gate: Option<CullGate>,
    pub material: Material,
    pub content: NodeContent,
}

impl SceneNode {
    /// Create a new scene node.
    pub fn new(
        id: SceneNodeId,
        name: impl Into<String>,
        bin: RenderBin,
        content: NodeContent,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            local_transform: LocalTransform::identity(),
            world_transform: Mat4::IDENTITY,
            bin,
            visible: true,
            cull_gate: None,
            material: Material::default(),
            content,
        }
    }
}
