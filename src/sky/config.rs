//! Sky configuration.
//!
//! Every top-level field has a default, so a JSON file only needs to name the
//! values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Full sky configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyConfig {
    /// Length of a weather cross-fade in seconds.
    pub transition_duration: f32,
    /// Cloud UV scroll per second at `cloud_speed == 1`.
    pub cloud_scroll_rate: f32,
    /// Grey added to the fog colour to get the cloud emission colour.
    pub cloud_colour_offset: f32,
    /// Night dome roll about the vertical axis, degrees per second.
    pub night_roll_rate: f32,
    /// Distance of the sun and moon billboards from the eye.
    pub celestial_distance: f32,
    /// Secunda's tint while the script colour override is active.
    pub moon_script_color: [f32; 4],

    // -- Sub-configs -------------------------------------------------------

    pub sun: SunConfig,
    pub masser: MoonConfig,
    pub secunda: MoonConfig,
    pub rain: RainConfig,
    pub assets: SkyAssets,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            transition_duration: 10.0,
            cloud_scroll_rate: 0.003,
            cloud_colour_offset: 0.13,
            night_roll_rate: 1.0,
            celestial_distance: 1000.0,
            moon_script_color: [1.0, 0.078, 0.078, 1.0],
            sun: SunConfig::default(),
            masser: MoonConfig::masser(),
            secunda: MoonConfig::secunda(),
            rain: RainConfig::default(),
            assets: SkyAssets::default(),
        }
    }
}

impl SkyConfig {
    /// Parse a config from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values the manager cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: &str) -> Result<()> {
            if ok { Ok(()) } else { Err(Error::Config(msg.to_string())) }
        }

        check(
            self.transition_duration.is_finite() && self.transition_duration >= 0.0,
            "transition_duration must be finite and non-negative",
        )?;
        check(self.cloud_scroll_rate.is_finite(), "cloud_scroll_rate must be finite")?;
        check(self.night_roll_rate.is_finite(), "night_roll_rate must be finite")?;
        check(
            self.celestial_distance.is_finite() && self.celestial_distance > 0.0,
            "celestial_distance must be positive",
        )?;
        check(self.sun.size > 0.0 && self.sun.glare_size > 0.0, "sun sizes must be positive")?;

        for (name, moon) in [("masser", &self.masser), ("secunda", &self.secunda)] {
            if moon.phase_cycle_days == 0 {
                return Err(Error::Config(format!("{name}.phase_cycle_days must be at least 1")));
            }
            if moon.texture_prefix.is_empty() {
                return Err(Error::Config(format!("{name}.texture_prefix must not be empty")));
            }
        }

        let rain = &self.rain;
        check(rain.diameter > 0.0, "rain.diameter must be positive")?;
        check(rain.min_height < rain.max_height, "rain.min_height must be below rain.max_height")?;
        check(rain.fade_duration >= 0.0, "rain.fade_duration must be non-negative")?;
        check(rain.wind_tilt_divisor > 0.0, "rain.wind_tilt_divisor must be positive")?;
        check(
            rain.default_speed.is_finite() && rain.default_speed > 0.0,
            "rain.default_speed must be positive",
        )?;
        check(rain.max_particles > 0, "rain.max_particles must be at least 1")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sun config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunConfig {
    /// Billboard size of the disc.
    pub size: f32,
    /// Billboard size of the glare halo.
    pub glare_size: f32,
}

impl Default for SunConfig {
    fn default() -> Self {
        Self {
            size: 150.0,
            glare_size: 600.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Moon config
// ---------------------------------------------------------------------------

/// Configuration for a single moon.
///
/// A moon block in JSON must be complete: the two moons have different
/// defaults, so there is no single fallback for omitted fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoonConfig {
    pub size: f32,
    /// Days for one full cycle through the eight phases.
    pub phase_cycle_days: u32,
    /// Shifts the cycle start relative to day 0 of the year.
    pub phase_offset_days: u32,
    /// Prefix of the per-phase texture identifiers.
    pub texture_prefix: String,
}

impl MoonConfig {
    pub fn masser() -> Self {
        Self {
            size: 94.0,
            phase_cycle_days: 24,
            phase_offset_days: 0,
            texture_prefix: "masser".to_string(),
        }
    }

    pub fn secunda() -> Self {
        Self {
            size: 40.0,
            phase_cycle_days: 16,
            phase_offset_days: 0,
            texture_prefix: "secunda".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rain config
// ---------------------------------------------------------------------------

/// Rain emitter volume and fade behaviour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainConfig {
    /// Diameter of the emission cylinder centred on the eye.
    pub diameter: f32,
    pub min_height: f32,
    pub max_height: f32,
    /// Seconds for rain to fade out once the weather stops calling for it.
    pub fade_duration: f32,
    /// Drop opacity at full effect strength.
    pub alpha_scale: f32,
    /// Wind speed per radian of drop tilt (tilt = atan(wind / divisor)).
    pub wind_tilt_divisor: f32,
    /// Fall speed used when the weather asks for rain without giving one.
    pub default_speed: f32,
    pub max_particles: usize,
    pub seed: u64,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            diameter: 600.0,
            min_height: 200.0,
            max_height: 700.0,
            fade_duration: 1.0,
            alpha_scale: 0.6,
            wind_tilt_divisor: 50.0,
            default_speed: 600.0,
            max_particles: 4096,
            seed: 0x5eed,
        }
    }
}

// ---------------------------------------------------------------------------
// Asset identifiers
// ---------------------------------------------------------------------------

/// Identifiers of the static assets the sky subtree is built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyAssets {
    pub atmosphere_mesh: String,
    pub night_mesh: String,
    pub clouds_mesh: String,
    pub sun_texture: String,
    pub sun_glare_texture: String,
}

impl Default for SkyAssets {
    fn default() -> Self {
        Self {
            atmosphere_mesh: "meshes/sky_atmosphere".to_string(),
            night_mesh: "meshes/sky_night".to_string(),
            clouds_mesh: "meshes/sky_clouds".to_string(),
            sun_texture: "textures/sun".to_string(),
            sun_glare_texture: "textures/sun_glare".to_string(),
        }
    }
}
