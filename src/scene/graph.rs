//! Scene graph: CPU-side hierarchy of nodes.
//!
//! The scene graph organizes sky content with parent/child relationships.
//! Each frame, `flatten()` walks the tree and produces a flat `Vec<FlatDrawEntry>`
//! sorted by render bin, ready for the renderer.

use std::collections::HashMap;

use glam::Mat4;

use super::flatten::{Drawable, FlatDrawEntry, FrameContext, ParticleInstance};
use super::node::{LocalTransform, NodeContent, RenderBin, SceneNode, SceneNodeId};

/// CPU-side scene graph.
pub struct SceneGraph {
    nodes: HashMap<SceneNodeId, SceneNode>,
    root: SceneNodeId,
    next_id: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a new scene graph with a root Group node.
    pub fn new() -> Self {
        let root_id = SceneNodeId(0);
        let root_node = SceneNode::new(root_id, "root", RenderBin::default(), NodeContent::Group);

        let mut nodes = HashMap::new();
        nodes.insert(root_id, root_node);

        Self {
            nodes,
            root: root_id,
            next_id: 1,
        }
    }

    /// Get the root node ID.
    pub fn root(&self) -> SceneNodeId {
        self.root
    }

    /// Allocate a fresh node ID.
    fn alloc_id(&mut self) -> SceneNodeId {
        let id = SceneNodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a child node under `parent`. Returns the new node's ID.
    pub fn add_child(
        &mut self,
        parent: SceneNodeId,
        name: impl Into<String>,
        bin: RenderBin,
        content: NodeContent,
    ) -> SceneNodeId {
        let id = self.alloc_id();
        let mut node = SceneNode::new(id, name, bin, content);
        node.parent = Some(parent);

        self.nodes.insert(id, node);

        // Register as child of parent
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }

        id
    }

    /// Remove a node and its entire subtree. Cannot remove the root.
    pub fn remove(&mut self, id: SceneNodeId) {
        if id == self.root {
            return;
        }

        // Collect subtree IDs (BFS)
        let mut to_remove = vec![id];
        let mut i = 0;
        while i < to_remove.len() {
            let current = to_remove[i];
            if let Some(node) = self.nodes.get(&current) {
                to_remove.extend_from_slice(&node.children);
            }
            i += 1;
        }

        // Detach from parent
        if let Some(parent_id) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| *c != id);
            }
        }

        // Remove all nodes in subtree
        for nid in to_remove {
            self.nodes.remove(&nid);
        }
    }

    /// Set the local transform of a node.
    pub fn set_transform(&mut self, id: SceneNodeId, transform: LocalTransform) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.local_transform = transform;
        }
    }

    /// Set the visibility of a node.
    pub fn set_visible(&mut self, id: SceneNodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    /// Whether the node exists.
    pub fn contains(&self, id: SceneNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get an immutable reference to a node.
    pub fn get(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable reference to a node.
    pub fn get_mut(&mut self, id: SceneNodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: SceneNodeId) -> impl Iterator<Item = SceneNodeId> + '_ {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Find the first direct child of `parent` with the given name.
    pub fn find_child(&self, parent: SceneNodeId, name: &str) -> Option<SceneNodeId> {
        self.children(parent)
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk the whole tree, propagate transforms, and collect all visible drawables.
    pub fn flatten(&mut self, ctx: &FrameContext) -> Vec<FlatDrawEntry> {
        self.flatten_from(self.root, ctx)
    }

    /// Like [`flatten`](Self::flatten) but only collects the subtree under `id`.
    ///
    /// Ancestors still contribute their transforms, visibility and gates.
    pub fn flatten_from(&mut self, id: SceneNodeId, ctx: &FrameContext) -> Vec<FlatDrawEntry> {
        self.propagate_transforms(self.root, Mat4::IDENTITY);

        let mut out = Vec::new();
        if self.ancestors_pass(id, ctx) {
            self.collect_visible(id, ctx, &mut out);
        }
        out.sort_by_key(|e| e.bin);
        out
    }

    /// Whether every strict ancestor of `id` is visible and ungated.
    fn ancestors_pass(&self, id: SceneNodeId, ctx: &FrameContext) -> bool {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = current {
            let Some(node) = self.nodes.get(&pid) else {
                return false;
            };
            if !node.visible || node.cull_gate.is_some_and(|g| g.hides(ctx.eye)) {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Recursively propagate world transforms.
    fn propagate_transforms(&mut self, node_id: SceneNodeId, parent_world: Mat4) {
        // Compute this node's world transform
        let (local_mat, children) = {
            let node = match self.nodes.get(&node_id) {
                Some(n) => n,
                None => return,
            };
            (node.local_transform.to_mat4(), node.children.clone())
        };

        let world = parent_world * local_mat;

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.world_transform = world;
        }

        for child_id in children {
            self.propagate_transforms(child_id, world);
        }
    }

    /// Recursively collect visible entries.
    fn collect_visible(&self, node_id: SceneNodeId, ctx: &FrameContext, out: &mut Vec<FlatDrawEntry>) {
        let node = match self.nodes.get(&node_id) {
            Some(n) => n,
            None => return,
        };

        if !node.visible {
            return;
        }

        if node.cull_gate.is_some_and(|g| g.hides(ctx.eye)) {
            return;
        }

        let drawable = match &node.content {
            NodeContent::Group => None,
            NodeContent::Mesh { model, texture, .. } => Some(Drawable::Mesh {
                model: *model,
                texture: *texture,
            }),
            NodeContent::Billboard { texture, size, .. } => Some(Drawable::Billboard {
                texture: *texture,
                size: *size,
            }),
            NodeContent::Particles(ps) => {
                let instances = ps
                    .particles()
                    .iter()
                    .map(|p| ParticleInstance {
                        position: node.world_transform.transform_point3(p.position),
                        alpha: p.alpha * node.material.alpha,
                    })
                    .collect();
                Some(Drawable::Particles {
                    texture: ps.texture(),
                    streak: ps.streak,
                    instances,
                })
            }
        };

        if let Some(drawable) = drawable {
            out.push(FlatDrawEntry {
                node: node.id,
                bin: node.bin,
                world_transform: node.world_transform,
                material: node.material.clone(),
                drawable,
            });
        }

        // Recurse into children
        for &child_id in &node.children {
            self.collect_visible(child_id, ctx, out);
        }
    }
}
