//! GPU uniform for sky shading.

use bytemuck::{Pod, Zeroable};

/// GPU-ready sky uniform buffer.
///
/// All `vec3` fields are padded to 16-byte alignment for WGSL compatibility.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SkyUniform {
    // -- Sun (16 + 16 = 32 bytes) --
    pub sun_direction: [f32; 3],
    pub sun_visibility: f32,
    pub sun_color: [f32; 3],
    pub hour: f32,

    // -- Colours (16 * 3 = 48 bytes) --
    pub fog_color: [f32; 4],
    pub ambient_color: [f32; 4],
    pub sky_color: [f32; 4],

    // -- Dome animation (16 bytes) --
    pub fog_depth: f32,
    pub stars_opacity: f32,
    pub cloud_blend: f32,
    pub cloud_offset: f32,

    // -- Moons (16 + 16 = 32 bytes) --
    pub masser_direction: [f32; 3],
    /// Coarse phase 0..=4.
    pub masser_phase: f32,
    pub secunda_direction: [f32; 3],
    pub secunda_phase: f32,

    // -- Weather (16 bytes) --
    pub wind_speed: f32,
    pub rain_intensity: f32,
    pub is_storm: u32,
    pub is_night: u32,
}

impl Default for SkyUniform {
    fn default() -> Self {
        Self {
            sun_direction: [0.0, 1.0, 0.0],
            sun_visibility: 1.0,
            sun_color: [1.0, 1.0, 1.0],
            hour: 12.0,
            fog_color: [0.0; 4],
            ambient_color: [0.0; 4],
            sky_color: [0.0; 4],
            fog_depth: 0.0,
            stars_opacity: 0.0,
            cloud_blend: 0.0,
            cloud_offset: 0.0,
            masser_direction: [0.0, 0.0, -1.0],
            masser_phase: 0.0,
            secunda_direction: [0.0, 0.0, -1.0],
            secunda_phase: 0.0,
            wind_speed: 0.0,
            rain_intensity: 0.0,
            is_storm: 0,
            is_night: 0,
        }
    }
}
