//! CPU-side scene graph the sky subtree lives in

pub mod flatten;
pub mod graph;
pub mod node;
pub mod particles;
pub mod resources;

pub use flatten::{Drawable, FlatDrawEntry, FrameContext, ParticleInstance};
pub use graph::SceneGraph;
pub use node::{CullGate, LocalTransform, Material, NodeContent, RenderBin, SceneNode, SceneNodeId};
pub use particles::{Particle, ParticleSystem};
pub use resources::{ModelHandle, ResourceManager, ResourceRegistry, TextureHandle};
