//! Weather description and the cross-fade between two of them.
//!
//! The host's weather logic produces [`WeatherResult`] snapshots; the sky
//! never edits them. [`WeatherTransition`] blends from the value showing at
//! the moment of a retarget toward the newest target over a bounded window.

use glam::Vec4;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lerp trait
// ---------------------------------------------------------------------------

/// Trait for types that can be linearly interpolated.
pub trait Lerp: Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec4 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec4::lerp(*self, *other, t)
    }
}

#[inline]
fn mix<T: Lerp>(a: &T, b: &T, t: f32) -> T {
    a.lerp(b, t)
}

// ---------------------------------------------------------------------------
// WeatherResult
// ---------------------------------------------------------------------------

/// One weather description as produced by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherResult {
    pub cloud_texture: String,
    /// Layer the host is fading in. When set, the host drives the cloud
    /// cross-fade itself through `cloud_blend_factor`.
    pub next_cloud_texture: String,
    /// Weight of `next_cloud_texture` (0..1). Ignored while that is empty.
    pub cloud_blend_factor: f32,

    pub fog_color: Vec4,
    pub ambient_color: Vec4,
    pub sky_color: Vec4,
    pub sun_color: Vec4,
    /// Disc tint; alpha is the sun's transparency.
    pub sun_disc_color: Vec4,
    pub fog_depth: f32,

    pub wind_speed: f32,
    pub cloud_speed: f32,
    /// How much of the sun and moons shows through the weather (0..1).
    pub glare_view: f32,

    pub night: bool,
    pub night_fade: f32,
    pub is_storm: bool,

    pub ambient_loop_sound_id: String,
    pub ambient_sound_volume: f32,

    /// Model identifier of the ambient particle overlay ("" = none).
    pub particle_effect: String,
    /// Texture identifier of the rain drop ("" = no rain).
    pub rain_effect: String,
    pub effect_fade: f32,
    pub rain_speed: f32,
    /// Drops emitted per second.
    pub rain_frequency: f32,
}

impl Default for WeatherResult {
    fn default() -> Self {
        Self {
            cloud_texture: String::new(),
            next_cloud_texture: String::new(),
            cloud_blend_factor: 0.0,
            fog_color: Vec4::new(0.5, 0.55, 0.6, 1.0),
            ambient_color: Vec4::new(0.3, 0.3, 0.3, 1.0),
            sky_color: Vec4::new(0.45, 0.55, 0.7, 1.0),
            sun_color: Vec4::ONE,
            sun_disc_color: Vec4::ONE,
            fog_depth: 1.0,
            wind_speed: 0.0,
            cloud_speed: 1.0,
            glare_view: 1.0,
            night: false,
            night_fade: 0.0,
            is_storm: false,
            ambient_loop_sound_id: String::new(),
            ambient_sound_volume: 0.0,
            particle_effect: String::new(),
            rain_effect: String::new(),
            effect_fade: 0.0,
            rain_speed: 0.0,
            rain_frequency: 0.0,
        }
    }
}

impl WeatherResult {
    /// Whether this weather wants the rain emitter running.
    pub fn calls_for_rain(&self) -> bool {
        !self.rain_effect.is_empty() && self.rain_frequency > 0.0
    }

    /// Ambient loop handle forwarded to the host's audio.
    pub fn ambient_loop(&self) -> (&str, f32) {
        (&self.ambient_loop_sound_id, self.ambient_sound_volume)
    }

    /// Blend toward `target` by `t` in `[0, 1]`.
    ///
    /// Numbers lerp. Flags flip at the midpoint. Identifiers and the cloud
    /// blend factor, which belongs to the target's layer pair, switch to the
    /// target's immediately.
    pub fn blend(&self, target: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let late = t >= 0.5;
        Self {
            cloud_texture: target.cloud_texture.clone(),
            next_cloud_texture: target.next_cloud_texture.clone(),
            cloud_blend_factor: target.cloud_blend_factor,
            fog_color: mix(&self.fog_color, &target.fog_color, t),
            ambient_color: mix(&self.ambient_color, &target.ambient_color, t),
            sky_color: mix(&self.sky_color, &target.sky_color, t),
            sun_color: mix(&self.sun_color, &target.sun_color, t),
            sun_disc_color: mix(&self.sun_disc_color, &target.sun_disc_color, t),
            fog_depth: mix(&self.fog_depth, &target.fog_depth, t),
            wind_speed: mix(&self.wind_speed, &target.wind_speed, t),
            cloud_speed: mix(&self.cloud_speed, &target.cloud_speed, t),
            glare_view: mix(&self.glare_view, &target.glare_view, t),
            night: if late { target.night } else { self.night },
            night_fade: mix(&self.night_fade, &target.night_fade, t),
            is_storm: if late { target.is_storm } else { self.is_storm },
            ambient_loop_sound_id: target.ambient_loop_sound_id.clone(),
            ambient_sound_volume: mix(&self.ambient_sound_volume, &target.ambient_sound_volume, t),
            particle_effect: target.particle_effect.clone(),
            rain_effect: target.rain_effect.clone(),
            effect_fade: mix(&self.effect_fade, &target.effect_fade, t),
            rain_speed: mix(&self.rain_speed, &target.rain_speed, t),
            rain_frequency: mix(&self.rain_frequency, &target.rain_frequency, t),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Countdown-driven blend between two weather snapshots.
///
/// `remaining` only ever decreases between retargets and never leaves
/// `[0, duration]`.
#[derive(Clone, Debug)]
pub struct WeatherTransition {
    from: WeatherResult,
    target: WeatherResult,
    /// Length of the current blend window.
    window: f32,
    remaining: f32,
    duration: f32,
}

impl WeatherTransition {
    /// Start settled at `initial`.
    pub fn new(initial: WeatherResult, duration: f32) -> Self {
        Self {
            from: initial.clone(),
            target: initial,
            window: 0.0,
            remaining: 0.0,
            duration: duration.max(0.0),
        }
    }

    /// Point the blend at a new target.
    ///
    /// The blend restarts from whatever is currently showing. With `reset`
    /// the countdown restarts at the full duration, otherwise the new target
    /// is reached when the current countdown runs out.
    pub fn retarget(&mut self, target: WeatherResult, reset: bool) {
        self.from = self.current();
        self.target = target;
        if reset {
            self.remaining = self.duration;
        }
        self.window = self.remaining;
    }

    /// Advance the countdown by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if dt > 0.0 {
            self.remaining = (self.remaining - dt).max(0.0);
        }
    }

    /// Blend progress, 0.0 at retarget and 1.0 once settled.
    pub fn progress(&self) -> f32 {
        if self.window <= 0.0 {
            1.0
        } else {
            (1.0 - self.remaining / self.window).clamp(0.0, 1.0)
        }
    }

    /// Weight of the incoming cloud layer: 0.0 right after a reset, 1.0 once
    /// a full duration has run. Retargets without a reset leave it unchanged.
    pub fn cloud_weight(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (1.0 - self.remaining / self.duration).clamp(0.0, 1.0)
        }
    }

    /// The weather showing right now.
    pub fn current(&self) -> WeatherResult {
        if self.remaining <= 0.0 {
            return self.target.clone();
        }
        self.from.blend(&self.target, self.progress())
    }

    pub fn from(&self) -> &WeatherResult {
        &self.from
    }

    pub fn target(&self) -> &WeatherResult {
        &self.target
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Whether we are mid-transition.
    pub fn is_transitioning(&self) -> bool {
        self.remaining > 0.0
    }
}
