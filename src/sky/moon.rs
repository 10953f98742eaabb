//! Moon state and the per-moon render facade.

use glam::{Quat, Vec3, Vec4};
use log::debug;

use super::bind_texture;
use super::calendar;
use super::config::MoonConfig;
use super::weather::WeatherResult;
use crate::scene::{LocalTransform, ResourceManager, SceneGraph, SceneNodeId};

/// Lunar phase. The first eight values walk one cycle starting at full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    Full,
    WaningGibbous,
    ThirdQuarter,
    WaningCrescent,
    New,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    /// No phase supplied. Never rendered; the calendar phase is used instead.
    #[default]
    Unspecified,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Full,
        Phase::WaningGibbous,
        Phase::ThirdQuarter,
        Phase::WaningCrescent,
        Phase::New,
        Phase::WaxingCrescent,
        Phase::FirstQuarter,
        Phase::WaxingGibbous,
    ];

    /// Phase at `index` in cycle order; anything past the cycle is `Unspecified`.
    pub fn from_index(index: u8) -> Self {
        Self::ALL.get(index as usize).copied().unwrap_or(Phase::Unspecified)
    }

    pub fn is_specified(self) -> bool {
        self != Phase::Unspecified
    }

    /// Visible fraction bucket: New=0, crescent=1, quarter=2, gibbous=3, Full=4.
    ///
    /// `Unspecified` has no bucket; resolve it with [`Moon::effective_phase`].
    pub fn coarse(self) -> Option<u8> {
        match self {
            Phase::New => Some(0),
            Phase::WaxingCrescent | Phase::WaningCrescent => Some(1),
            Phase::FirstQuarter | Phase::ThirdQuarter => Some(2),
            Phase::WaxingGibbous | Phase::WaningGibbous => Some(3),
            Phase::Full => Some(4),
            Phase::Unspecified => None,
        }
    }

    fn texture_suffix(self) -> &'static str {
        match self {
            Phase::Full | Phase::Unspecified => "full",
            Phase::WaningGibbous => "three_wan",
            Phase::ThirdQuarter => "half_wan",
            Phase::WaningCrescent => "one_wan",
            Phase::New => "new",
            Phase::WaxingCrescent => "one_wax",
            Phase::FirstQuarter => "half_wax",
            Phase::WaxingGibbous => "three_wax",
        }
    }
}

/// Host-supplied moon placement and appearance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoonState {
    /// Elevation above the horizon, radians.
    pub rotation_from_horizon: f32,
    /// Azimuth from north, radians.
    pub rotation_from_north: f32,
    pub phase: Phase,
    /// How much the moon is shadowed by the atmosphere (0..1).
    pub shadow_blend: f32,
    pub moon_alpha: f32,
}

impl Default for MoonState {
    fn default() -> Self {
        Self {
            rotation_from_horizon: 0.0,
            rotation_from_north: 0.0,
            phase: Phase::Unspecified,
            shadow_blend: 0.0,
            moon_alpha: 0.0,
        }
    }
}

/// Scene nodes of one moon.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MoonNodes {
    pub group: SceneNodeId,
    pub disc: SceneNodeId,
    pub circle: SceneNodeId,
}

/// One moon: config, latest host state and tint.
#[derive(Clone, Debug)]
pub struct Moon {
    name: &'static str,
    config: MoonConfig,
    state: MoonState,
    tint: Vec4,
}

impl Moon {
    pub fn new(name: &'static str, config: MoonConfig) -> Self {
        Self {
            name,
            config,
            state: MoonState::default(),
            tint: Vec4::ONE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &MoonConfig {
        &self.config
    }

    pub fn set_state(&mut self, state: MoonState) {
        self.state = state;
    }

    pub fn state(&self) -> &MoonState {
        &self.state
    }

    pub fn set_tint(&mut self, tint: Vec4) {
        self.tint = tint;
    }

    pub fn tint(&self) -> Vec4 {
        self.tint
    }

    /// Phase from the calendar alone.
    pub fn calendar_phase(&self, day_of_year: u32) -> Phase {
        calendar::phase_for_day(day_of_year, self.config.phase_cycle_days, self.config.phase_offset_days)
    }

    /// Phase to render: the host's if supplied, else the calendar's.
    pub fn effective_phase(&self, day_of_year: u32) -> Phase {
        if self.state.phase.is_specified() {
            self.state.phase
        } else {
            self.calendar_phase(day_of_year)
        }
    }

    /// Coarse bucket of [`effective_phase`](Self::effective_phase).
    pub fn coarse_phase(&self, day_of_year: u32) -> u8 {
        // The calendar always yields a specified phase
        self.effective_phase(day_of_year).coarse().unwrap_or_default()
    }

    /// Unit direction from the eye toward the moon.
    pub fn direction(&self) -> Vec3 {
        Quat::from_rotation_y(-self.state.rotation_from_north)
            * Quat::from_rotation_x(self.state.rotation_from_horizon)
            * Vec3::NEG_Z
    }

    /// Disc opacity under the given weather glare.
    pub fn opacity(&self, glare_view: f32) -> f32 {
        (self.state.moon_alpha * (1.0 - self.state.shadow_blend) * glare_view).clamp(0.0, 1.0)
    }

    pub fn texture_name(&self, phase: Phase) -> String {
        format!("textures/{}_{}", self.config.texture_prefix, phase.texture_suffix())
    }

    pub fn circle_texture_name(&self) -> String {
        format!("textures/{}_circle", self.config.texture_prefix)
    }

    /// Append every texture this moon can show.
    pub fn push_assets(&self, textures: &mut Vec<String>) {
        for phase in Phase::ALL {
            textures.push(self.texture_name(phase));
        }
        textures.push(self.circle_texture_name());
    }

    pub(crate) fn apply(
        &self,
        scene: &mut SceneGraph,
        resources: &dyn ResourceManager,
        nodes: &MoonNodes,
        day_of_year: u32,
        weather: &WeatherResult,
        distance: f32,
    ) {
        scene.set_transform(nodes.group, LocalTransform::from_position(self.direction() * distance));

        let phase = self.effective_phase(day_of_year);
        let texture = self.texture_name(phase);
        let changed = scene
            .get(nodes.disc)
            .is_some_and(|n| n.content.texture_name() != Some(texture.as_str()));
        if changed {
            debug!("{} phase -> {:?}", self.name, phase);
        }
        let has_disc = bind_texture(scene, resources, nodes.disc, &texture);
        let has_circle = bind_texture(scene, resources, nodes.circle, &self.circle_texture_name());

        let opacity = self.opacity(weather.glare_view);
        if let Some(node) = scene.get_mut(nodes.disc) {
            node.material.color = self.tint;
            node.material.alpha = opacity;
            node.visible = has_disc && opacity > 0.0;
        }
        if let Some(node) = scene.get_mut(nodes.circle) {
            node.material.color = weather.sky_color;
            node.material.alpha = self.state.moon_alpha;
            node.visible = has_circle && self.state.moon_alpha > 0.0;
        }
    }
}
