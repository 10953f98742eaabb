//! Rain emitter lifecycle.
//!
//! Rain is either off, running, or fading out after the weather stopped
//! calling for it. The drop node only exists while running or fading.

use glam::{Quat, Vec3};
use log::{debug, trace, warn};

use super::config::RainConfig;
use super::updater::NodeUpdater;
use super::weather::WeatherResult;
use crate::scene::{
    NodeContent, Particle, ParticleSystem, RenderBin, ResourceManager, SceneGraph, SceneNode,
    SceneNodeId,
};

/// Simple deterministic RNG for drop placement.
#[derive(Clone, Debug)]
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self { state: seed.wrapping_add(1) }
    }

    /// Advance state and return next u32
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut h = (self.state >> 32) as u32;
        h = h.wrapping_mul(0x45d9f3b);
        h ^= h >> 16;
        h = h.wrapping_mul(0x45d9f3b);
        h ^= h >> 16;
        h
    }

    /// Generate f32 in range [0, 1)
    fn next_float(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Generate f32 in range [min, max)
    fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_float() * (max - min)
    }
}

/// Rain lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RainState {
    #[default]
    Inactive,
    Active,
    FadingOut,
}

// ---------------------------------------------------------------------------
// Shooter / fader
// ---------------------------------------------------------------------------

/// Spawns drops inside the emission cylinder.
#[derive(Clone, Debug)]
pub struct RainShooter {
    node: SceneNodeId,
    rng: SimpleRng,
    velocity: Vec3,
    lifetime: f32,
    radius: f32,
    min_height: f32,
    max_height: f32,
}

impl RainShooter {
    pub fn new(node: SceneNodeId, config: &RainConfig) -> Self {
        Self {
            node,
            rng: SimpleRng::new(config.seed),
            velocity: Vec3::NEG_Y,
            lifetime: 0.0,
            radius: config.diameter * 0.5,
            min_height: config.min_height,
            max_height: config.max_height,
        }
    }

    /// Fall speed and wind tilt for new drops.
    pub fn set_motion(&mut self, speed: f32, wind_speed: f32, tilt_divisor: f32) {
        let speed = speed.max(0.0);
        let tilt = -(wind_speed / tilt_divisor).atan();
        self.velocity = Quat::from_rotation_x(tilt) * Vec3::new(0.0, -speed, 0.0);
        self.lifetime = if speed > 0.0 {
            (self.max_height - self.min_height) / speed
        } else {
            0.0
        };
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    /// Emit up to `count` drops. Returns how many the system accepted.
    pub fn shoot(&mut self, ps: &mut ParticleSystem, count: usize) -> usize {
        if self.lifetime <= 0.0 {
            return 0;
        }
        let mut emitted = 0;
        for _ in 0..count {
            // Uniform over the disc area
            let r = self.radius * self.rng.next_float().sqrt();
            let theta = self.rng.range(0.0, std::f32::consts::TAU);
            let y = self.rng.range(self.min_height, self.max_height);
            let position = Vec3::new(r * theta.cos(), y, r * theta.sin());
            if !ps.emit(Particle::new(position, self.velocity, self.lifetime)) {
                break;
            }
            emitted += 1;
        }
        emitted
    }
}

impl NodeUpdater for RainShooter {
    fn node(&self) -> SceneNodeId {
        self.node
    }

    fn apply(&self, node: &mut SceneNode) {
        if let Some(ps) = node.content.particles_mut() {
            ps.streak = self.velocity.normalize_or(Vec3::NEG_Y);
        }
    }
}

/// Sets every drop's opacity.
#[derive(Clone, Debug)]
pub struct RainFader {
    node: SceneNodeId,
    pub alpha: f32,
}

impl RainFader {
    pub fn new(node: SceneNodeId) -> Self {
        Self { node, alpha: 0.0 }
    }
}

impl NodeUpdater for RainFader {
    fn node(&self) -> SceneNodeId {
        self.node
    }

    fn apply(&self, node: &mut SceneNode) {
        if let Some(ps) = node.content.particles_mut() {
            for p in ps.particles_mut() {
                p.alpha = self.alpha;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub(crate) struct RainNodes {
    pub node: SceneNodeId,
    effect: String,
    pub shooter: RainShooter,
    pub fader: RainFader,
}

/// Inputs for one rain step.
pub(crate) struct RainFrame<'a> {
    pub target: &'a WeatherResult,
    pub blended: &'a WeatherResult,
    pub speed: f32,
    pub dt: f32,
}

/// Rain emitter state machine and its emission accumulator.
#[derive(Clone, Debug)]
pub struct RainSystem {
    config: RainConfig,
    state: RainState,
    /// Seconds since the fade started.
    fade_elapsed: f32,
    /// Emission accumulator in seconds.
    timer: f32,
    nodes: Option<RainNodes>,
}

impl RainSystem {
    pub fn new(config: RainConfig) -> Self {
        Self {
            config,
            state: RainState::Inactive,
            fade_elapsed: 0.0,
            timer: 0.0,
            nodes: None,
        }
    }

    pub fn state(&self) -> RainState {
        self.state
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn node(&self) -> Option<SceneNodeId> {
        self.nodes.as_ref().map(|n| n.node)
    }

    pub(crate) fn nodes(&self) -> Option<&RainNodes> {
        self.nodes.as_ref()
    }

    /// Opacity multiplier from the lifecycle (1 while active, ramps to 0 while fading).
    pub fn lifecycle_alpha(&self) -> f32 {
        match self.state {
            RainState::Active => 1.0,
            RainState::Inactive => 0.0,
            RainState::FadingOut => {
                if self.config.fade_duration <= 0.0 {
                    0.0
                } else {
                    (1.0 - self.fade_elapsed / self.config.fade_duration).clamp(0.0, 1.0)
                }
            }
        }
    }

    pub fn advance_timer(&mut self, dt: f32) {
        self.timer += dt;
    }

    /// Drop accumulated time beyond one emission interval.
    pub fn wrap_timer(&mut self, rate: f32) {
        if rate > 0.0 {
            self.timer = self.timer.rem_euclid(1.0 / rate);
        } else {
            self.timer = 0.0;
        }
    }

    /// Step the lifecycle and the drops.
    pub(crate) fn step(
        &mut self,
        scene: &mut SceneGraph,
        parent: SceneNodeId,
        resources: &dyn ResourceManager,
        frame: &RainFrame<'_>,
    ) {
        let wants = frame.target.calls_for_rain();
        let effect = frame.target.rain_effect.as_str();
        let same_effect = self.nodes.as_ref().is_some_and(|n| n.effect == effect);

        match (self.state, wants) {
            (RainState::Inactive, true) => {
                self.create(scene, parent, resources, effect);
                self.set_state(RainState::Active);
            }
            (RainState::Active, true) if !same_effect => {
                debug!("Rain effect changed to '{effect}', rebuilding");
                self.destroy(scene);
                self.create(scene, parent, resources, effect);
            }
            (RainState::Active, false) => {
                self.fade_elapsed = 0.0;
                self.set_state(RainState::FadingOut);
            }
            (RainState::FadingOut, true) => {
                if !same_effect {
                    self.destroy(scene);
                    self.create(scene, parent, resources, effect);
                }
                self.set_state(RainState::Active);
            }
            (RainState::FadingOut, false) => {
                self.fade_elapsed += frame.dt;
                if self.fade_elapsed >= self.config.fade_duration {
                    self.destroy(scene);
                    self.set_state(RainState::Inactive);
                }
            }
            (RainState::Active, true) | (RainState::Inactive, false) => {}
        }

        let rate = frame.target.rain_frequency;
        if self.state != RainState::Active {
            self.wrap_timer(rate);
        }

        let alpha = frame.blended.effect_fade * self.config.alpha_scale * self.lifecycle_alpha();
        let emitting = self.state == RainState::Active;
        let Some(nodes) = self.nodes.as_mut() else {
            return;
        };
        let speed = if frame.speed.is_finite() && frame.speed > 0.0 {
            frame.speed
        } else {
            self.config.default_speed
        };
        nodes.shooter.set_motion(speed, frame.blended.wind_speed, self.config.wind_tilt_divisor);
        nodes.fader.alpha = alpha;

        let Some(ps) = scene.get_mut(nodes.node).and_then(|n| n.content.particles_mut()) else {
            return;
        };
        ps.advance(frame.dt);
        if emitting && frame.dt > 0.0 && rate > 0.0 {
            let owed = (self.timer * rate).floor();
            self.timer -= owed / rate;
            self.timer = self.timer.max(0.0);
            nodes.shooter.shoot(ps, owed as usize);
        }
        trace!("Rain: {} drops ({:?})", ps.len(), self.state);
    }

    /// Forget the nodes without touching the scene (the caller removed them).
    pub(crate) fn detach(&mut self) {
        self.nodes = None;
        self.state = RainState::Inactive;
        self.fade_elapsed = 0.0;
    }

    fn set_state(&mut self, state: RainState) {
        if self.state != state {
            debug!("Rain {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn create(&mut self, scene: &mut SceneGraph, parent: SceneNodeId, resources: &dyn ResourceManager, effect: &str) {
        let texture = resources.texture(effect);
        if texture.is_none() {
            warn!("Rain texture '{effect}' not found");
        }
        let ps = ParticleSystem::new(effect, texture, self.config.max_particles);
        let node = scene.add_child(parent, "rain", RenderBin::Weather, NodeContent::Particles(ps));
        self.nodes = Some(RainNodes {
            node,
            effect: effect.to_string(),
            shooter: RainShooter::new(node, &self.config),
            fader: RainFader::new(node),
        });
        self.fade_elapsed = 0.0;
    }

    fn destroy(&mut self, scene: &mut SceneGraph) {
        if let Some(nodes) = self.nodes.take() {
            if let Some(ps) = scene.get_mut(nodes.node).and_then(|n| n.content.particles_mut()) {
                ps.clear();
            }
            scene.remove(nodes.node);
        }
    }
}
