//! Hides weather particles while the eye is below the water plane.

use crate::scene::{CullGate, SceneNode};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnderwaterSwitchCallback {
    enabled: bool,
    water_level: f32,
}

impl UnderwaterSwitchCallback {
    pub fn new(enabled: bool, water_level: f32) -> Self {
        Self { enabled, water_level }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_water_level(&mut self, level: f32) {
        self.water_level = level;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn water_level(&self) -> f32 {
        self.water_level
    }

    /// Gate to install on weather nodes, if the water plane is active.
    pub fn gate(&self) -> Option<CullGate> {
        self.enabled.then_some(CullGate::HideBelow { height: self.water_level })
    }

    pub fn apply(&self, node: &mut SceneNode) {
        node.cull_gate = self.gate();
    }
}
