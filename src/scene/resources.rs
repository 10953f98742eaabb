//! Resource collaborator interface.
//!
//! Asset loading is owned by the host. The sky only asks for handles by
//! identifier and must cope with `None` (missing or failed assets).

use std::collections::HashMap;

/// Opaque handle to a loaded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque handle to a loaded model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    pub id: u64,
    /// Number of particle systems contained in the model.
    pub particle_systems: u32,
}

/// Shared asset provider used by the sky.
pub trait ResourceManager {
    /// Look up a texture by identifier.
    fn texture(&self, name: &str) -> Option<TextureHandle>;

    /// Look up a model by identifier.
    fn model(&self, name: &str) -> Option<ModelHandle>;
}

/// In-memory [`ResourceManager`] keyed by identifier.
#[derive(Clone, Debug, Default)]
pub struct ResourceRegistry {
    textures: HashMap<String, TextureHandle>,
    models: HashMap<String, ModelHandle>,
    next_id: u64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Register a texture, returning the existing handle if already known.
    pub fn register_texture(&mut self, name: impl Into<String>) -> TextureHandle {
        let name = name.into();
        if let Some(handle) = self.textures.get(&name) {
            return *handle;
        }
        let handle = TextureHandle(self.alloc_id());
        self.textures.insert(name, handle);
        handle
    }

    /// Register a model with the given number of particle systems.
    pub fn register_model(&mut self, name: impl Into<String>, particle_systems: u32) -> ModelHandle {
        let handle = ModelHandle {
            id: self.alloc_id(),
            particle_systems,
        };
        self.models.insert(name.into(), handle);
        handle
    }

    /// Register every identifier from a preload listing.
    pub fn register_all(&mut self, models: &[String], textures: &[String]) {
        for m in models {
            if !self.models.contains_key(m) {
                self.register_model(m.clone(), 0);
            }
        }
        for t in textures {
            self.register_texture(t.clone());
        }
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

impl ResourceManager for ResourceRegistry {
    fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).copied()
    }

    fn model(&self, name: &str) -> Option<ModelHandle> {
        self.models.get(name).copied()
    }
}
