//! Flattened scene graph output for the renderer.
//!
//! `FlatDrawEntry` is the result of walking the scene graph: one entry per visible
//! drawable node, already carrying its world transform and material.

use glam::{Mat4, Vec3};

use super::node::{Material, RenderBin, SceneNodeId};
use super::resources::{ModelHandle, TextureHandle};

/// Per-traversal inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameContext {
    /// Camera position in world space.
    pub eye: Vec3,
}

impl FrameContext {
    pub fn new(eye: Vec3) -> Self {
        Self { eye }
    }
}

/// One rendered particle in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleInstance {
    pub position: Vec3,
    pub alpha: f32,
}

/// What the renderer should draw for an entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Drawable {
    Mesh {
        model: Option<ModelHandle>,
        texture: Option<TextureHandle>,
    },
    Billboard {
        texture: Option<TextureHandle>,
        size: f32,
    },
    Particles {
        texture: Option<TextureHandle>,
        streak: Vec3,
        instances: Vec<ParticleInstance>,
    },
}

/// One entry in the flattened visible set.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatDrawEntry {
    pub node: SceneNodeId,
    pub bin: RenderBin,
    /// World-space transform after propagation.
    pub world_transform: Mat4,
    pub material: Material,
    pub drawable: Drawable,
}

impl FlatDrawEntry {
    /// World-space origin of the entry.
    pub fn world_position(&self) -> Vec3 {
        self.world_transform.transform_point3(Vec3::ZERO)
    }
}
