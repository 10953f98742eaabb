//! Per-node updaters.
//!
//! `SkyManager::update` writes fresh values into each updater; traversal then
//! applies every updater to the node it names. Updaters only hold node ids.

use glam::{Quat, Vec2, Vec4};

use crate::scene::{SceneNode, SceneNodeId};

/// Writes per-frame values onto one scene node.
pub trait NodeUpdater {
    /// Node this updater targets.
    fn node(&self) -> SceneNodeId;

    /// Push the current values onto `node`.
    fn apply(&self, node: &mut SceneNode);
}

// ---------------------------------------------------------------------------
// Clouds
// ---------------------------------------------------------------------------

/// Scrolls and fades one cloud layer.
#[derive(Clone, Debug)]
pub struct CloudUpdater {
    node: SceneNodeId,
    /// Wrapping animation timer in `[0, 1)`.
    pub timer: f32,
    /// Layer weight.
    pub opacity: f32,
    pub emission: Vec4,
    /// False while the layer has no weight or no texture.
    pub visible: bool,
}

impl CloudUpdater {
    pub fn new(node: SceneNodeId) -> Self {
        Self {
            node,
            timer: 0.0,
            opacity: 0.0,
            emission: Vec4::ONE,
            visible: false,
        }
    }
}

impl NodeUpdater for CloudUpdater {
    fn node(&self) -> SceneNodeId {
        self.node
    }

    fn apply(&self, node: &mut SceneNode) {
        node.material.uv_offset = Vec2::new(0.0, -self.timer);
        node.material.alpha = self.opacity;
        node.material.color = self.emission;
        node.visible = self.visible;
    }
}

// ---------------------------------------------------------------------------
// Atmosphere
// ---------------------------------------------------------------------------

/// Day dome colours.
#[derive(Clone, Debug)]
pub struct AtmosphereUpdater {
    node: SceneNodeId,
    pub fog_color: Vec4,
    pub fog_depth: f32,
    pub ambient: Vec4,
    pub sky_color: Vec4,
}

impl AtmosphereUpdater {
    pub fn new(node: SceneNodeId) -> Self {
        Self {
            node,
            fog_color: Vec4::ZERO,
            fog_depth: 0.0,
            ambient: Vec4::ZERO,
            sky_color: Vec4::ONE,
        }
    }
}

impl NodeUpdater for AtmosphereUpdater {
    fn node(&self) -> SceneNodeId {
        self.node
    }

    fn apply(&self, node: &mut SceneNode) {
        node.material.fog_color = self.fog_color;
        node.material.fog_depth = self.fog_depth;
        node.material.ambient = self.ambient;
        node.material.color = self.sky_color;
    }
}

/// Star dome opacity and roll.
#[derive(Clone, Debug)]
pub struct AtmosphereNightUpdater {
    node: SceneNodeId,
    pub opacity: f32,
    /// Roll about the vertical axis, radians.
    pub roll: f32,
    pub visible: bool,
}

impl AtmosphereNightUpdater {
    pub fn new(node: SceneNodeId) -> Self {
        Self {
            node,
            opacity: 0.0,
            roll: 0.0,
            visible: false,
        }
    }
}

impl NodeUpdater for AtmosphereNightUpdater {
    fn node(&self) -> SceneNodeId {
        self.node
    }

    fn apply(&self, node: &mut SceneNode) {
        node.material.alpha = self.opacity;
        node.local_transform.rotation = Quat::from_rotation_y(self.roll);
        node.visible = self.visible;
    }
}

// ---------------------------------------------------------------------------
// Effect fading
// ---------------------------------------------------------------------------

/// Opacity of one particle system inside a weather overlay effect.
#[derive(Clone, Debug)]
pub struct AlphaFader {
    node: SceneNodeId,
    pub alpha: f32,
}

impl AlphaFader {
    pub fn new(node: SceneNodeId, alpha: f32) -> Self {
        Self { node, alpha }
    }
}

impl NodeUpdater for AlphaFader {
    fn node(&self) -> SceneNodeId {
        self.node
    }

    fn apply(&self, node: &mut SceneNode) {
        node.material.alpha = self.alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeContent, RenderBin};

    fn node() -> SceneNode {
        SceneNode::new(SceneNodeId(5), "n", RenderBin::Clouds, NodeContent::mesh("m", None))
    }

    #[test]
    fn test_cloud_updater_writes_material() {
        let mut updater = CloudUpdater::new(SceneNodeId(5));
        updater.timer = 0.25;
        updater.opacity = 0.75;
        updater.emission = Vec4::new(0.6, 0.6, 0.6, 1.0);
        updater.visible = true;

        let mut n = node();
        updater.apply(&mut n);
        assert_eq!(n.material.uv_offset, Vec2::new(0.0, -0.25));
        assert_eq!(n.material.alpha, 0.75);
        assert_eq!(n.material.color, Vec4::new(0.6, 0.6, 0.6, 1.0));
        assert!(n.visible);
    }

    #[test]
    fn test_night_updater_hides_and_rolls() {
        let mut updater = AtmosphereNightUpdater::new(SceneNodeId(5));
        updater.roll = std::f32::consts::FRAC_PI_2;
        let mut n = node();
        updater.apply(&mut n);
        assert!(!n.visible);
        let fwd = n.local_transform.rotation * glam::Vec3::NEG_Z;
        assert!((fwd - glam::Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn test_updaters_through_trait_objects() {
        let atmosphere = AtmosphereUpdater {
            fog_depth: 0.4,
            ..AtmosphereUpdater::new(SceneNodeId(5))
        };
        let fader = AlphaFader::new(SceneNodeId(5), 0.3);
        let table: [&dyn NodeUpdater; 2] = [&atmosphere, &fader];

        let mut n = node();
        for u in table {
            assert_eq!(u.node(), SceneNodeId(5));
            u.apply(&mut n);
        }
        assert_eq!(n.material.fog_depth, 0.4);
        assert_eq!(n.material.alpha, 0.3);
    }
}
