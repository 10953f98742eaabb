//! Sun disc and glare.
//!
//! The host supplies the direction; the sun only places and fades the two
//! billboards.

use glam::Vec3;

use super::bind_texture;
use super::config::{SkyAssets, SunConfig};
use super::weather::WeatherResult;
use crate::scene::{LocalTransform, ResourceManager, SceneGraph, SceneNodeId};

#[derive(Clone, Copy, Debug)]
pub(crate) struct SunNodes {
    pub group: SceneNodeId,
    pub disc: SceneNodeId,
    pub glare: SceneNodeId,
}

#[derive(Clone, Debug)]
pub struct Sun {
    config: SunConfig,
    direction: Vec3,
    enabled: bool,
    /// Time-of-day multiplier on the glare halo.
    glare_fade: f32,
}

impl Sun {
    pub fn new(config: SunConfig) -> Self {
        Self {
            config,
            direction: Vec3::Y,
            enabled: true,
            glare_fade: 1.0,
        }
    }

    pub fn config(&self) -> &SunConfig {
        &self.config
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction;
    }

    /// Unit direction toward the sun, zero if the host gave a zero vector.
    pub fn direction(&self) -> Vec3 {
        self.direction.normalize_or_zero()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_glare_fade(&mut self, fade: f32) {
        self.glare_fade = fade.clamp(0.0, 1.0);
    }

    pub fn glare_fade(&self) -> f32 {
        self.glare_fade
    }

    pub fn position(&self, distance: f32) -> Vec3 {
        self.direction() * distance
    }

    pub fn disc_alpha(&self, weather: &WeatherResult) -> f32 {
        (weather.glare_view * weather.sun_disc_color.w).clamp(0.0, 1.0)
    }

    pub fn glare_alpha(&self, weather: &WeatherResult) -> f32 {
        self.disc_alpha(weather) * self.glare_fade
    }

    pub(crate) fn apply(
        &self,
        scene: &mut SceneGraph,
        resources: &dyn ResourceManager,
        nodes: &SunNodes,
        assets: &SkyAssets,
        weather: &WeatherResult,
        distance: f32,
    ) {
        scene.set_visible(nodes.group, self.enabled);
        if !self.enabled {
            return;
        }
        scene.set_transform(nodes.group, LocalTransform::from_position(self.position(distance)));

        let has_disc = bind_texture(scene, resources, nodes.disc, &assets.sun_texture);
        let has_glare = bind_texture(scene, resources, nodes.glare, &assets.sun_glare_texture);

        let disc_alpha = self.disc_alpha(weather);
        if let Some(node) = scene.get_mut(nodes.disc) {
            node.material.color = weather.sun_disc_color.truncate().extend(1.0);
            node.material.alpha = disc_alpha;
            node.visible = has_disc && disc_alpha > 0.0;
        }
        let glare_alpha = self.glare_alpha(weather);
        if let Some(node) = scene.get_mut(nodes.glare) {
            node.material.color = weather.sun_color;
            node.material.alpha = glare_alpha;
            node.visible = has_glare && glare_alpha > 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_position_is_normalized_direction_times_distance() {
        let mut sun = Sun::new(SunConfig::default());
        sun.set_direction(Vec3::new(0.0, 3.0, 4.0));
        let pos = sun.position(1000.0);
        assert!((pos - Vec3::new(0.0, 600.0, 800.0)).length() < 1e-3);
    }

    #[test]
    fn test_zero_direction_does_not_produce_nan() {
        let mut sun = Sun::new(SunConfig::default());
        sun.set_direction(Vec3::ZERO);
        assert_eq!(sun.position(1000.0), Vec3::ZERO);
    }

    #[test]
    fn test_disc_and_glare_alpha() {
        let mut sun = Sun::new(SunConfig::default());
        let weather = WeatherResult {
            glare_view: 0.5,
            sun_disc_color: Vec4::new(1.0, 0.9, 0.8, 0.8),
            ..Default::default()
        };
        assert!((sun.disc_alpha(&weather) - 0.4).abs() < 1e-6);
        sun.set_glare_fade(0.5);
        assert!((sun.glare_alpha(&weather) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_glare_fade_clamped() {
        let mut sun = Sun::new(SunConfig::default());
        sun.set_glare_fade(3.0);
        assert_eq!(sun.glare_fade(), 1.0);
        sun.set_glare_fade(-1.0);
        assert_eq!(sun.glare_fade(), 0.0);
    }
}
