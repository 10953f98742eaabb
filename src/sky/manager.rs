//! Sky state manager.
//!
//! [`SkyManager`] owns the sky subtree of the host's scene graph. The host
//! calls the setters whenever it likes, then once per frame [`update`]
//! followed by [`traverse`]. Setters only store values; all scene work
//! happens in those two calls.
//!
//! [`update`]: SkyManager::update
//! [`traverse`]: SkyManager::traverse

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::{Quat, Vec3, Vec4};
use log::{debug, info, warn};

use super::bind_texture;
use super::calendar;
use super::config::SkyConfig;
use super::moon::{Moon, MoonNodes, MoonState};
use super::rain::{RainFrame, RainState, RainSystem};
use super::state::SkyUniform;
use super::sun::{Sun, SunNodes};
use super::underwater::UnderwaterSwitchCallback;
use super::updater::{AlphaFader, AtmosphereNightUpdater, AtmosphereUpdater, CloudUpdater, NodeUpdater};
use super::weather::{WeatherResult, WeatherTransition};
use crate::scene::{
    FlatDrawEntry, FrameContext, LocalTransform, NodeContent, ParticleSystem, RenderBin, ResourceManager,
    SceneGraph, SceneNodeId,
};

/// A weather overlay effect (ash, blight, snow) and its faders.
struct ParticleEffect {
    name: String,
    node: SceneNodeId,
    faders: Vec<AlphaFader>,
    from_alpha: f32,
    to_alpha: f32,
    alpha: f32,
    /// Fading to zero; removed once the blend completes.
    retiring: bool,
}

/// Everything that exists only after lazy creation.
struct SkyNodes {
    root: SceneNodeId,
    atmosphere: AtmosphereUpdater,
    night: AtmosphereNightUpdater,
    night_drawable: bool,
    clouds: SceneNodeId,
    cloud_layers: [CloudUpdater; 2],
    clouds_drawable: bool,
    sun: SunNodes,
    masser: MoonNodes,
    secunda: MoonNodes,
    /// Parent of the overlay effects.
    particles: SceneNodeId,
    effects: Vec<ParticleEffect>,
}

enum Creation {
    NotCreated,
    Created(Box<SkyNodes>),
}

/// Dynamic sky and weather state manager.
pub struct SkyManager {
    parent: SceneNodeId,
    resources: Arc<dyn ResourceManager>,
    config: SkyConfig,
    creation: Creation,

    enabled: bool,
    hour: f32,
    day: u32,
    month: u32,

    transition: WeatherTransition,
    /// Cloud layer fading out.
    clouds: String,
    /// Cloud layer fading in.
    next_clouds: String,
    /// The last weather named both layers itself.
    host_clouds: bool,
    cloud_timer: f32,
    /// Night dome roll, radians.
    night_roll: f32,
    stars_opacity: f32,

    is_storm: bool,
    storm_direction: Vec3,
    rain_speed: f32,
    wind_speed: f32,
    rain: RainSystem,
    underwater: UnderwaterSwitchCallback,

    sun: Sun,
    masser: Moon,
    secunda: Moon,
}

impl SkyManager {
    /// Create a manager whose subtree will hang under `parent`.
    ///
    /// No scene nodes are created until the first enabled [`update`](Self::update).
    pub fn new(parent: SceneNodeId, resources: Arc<dyn ResourceManager>, config: SkyConfig) -> Self {
        Self {
            parent,
            resources,
            creation: Creation::NotCreated,
            enabled: true,
            hour: 0.0,
            day: 1,
            month: 0,
            transition: WeatherTransition::new(WeatherResult::default(), config.transition_duration),
            clouds: String::new(),
            next_clouds: String::new(),
            host_clouds: false,
            cloud_timer: 0.0,
            night_roll: 0.0,
            stars_opacity: 0.0,
            is_storm: false,
            storm_direction: Vec3::NEG_Z,
            rain_speed: 0.0,
            wind_speed: 0.0,
            rain: RainSystem::new(config.rain.clone()),
            underwater: UnderwaterSwitchCallback::default(),
            sun: Sun::new(config.sun.clone()),
            masser: Moon::new("Masser", config.masser.clone()),
            secunda: Moon::new("Secunda", config.secunda.clone()),
            config,
        }
    }

    // -- Setters ------------------------------------------------------------

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_hour(&mut self, hour: f32) {
        self.hour = hour;
    }

    /// Day of month (from 1) and zero-based month.
    pub fn set_date(&mut self, day: u32, month: u32) {
        self.day = day;
        self.month = month;
    }

    /// Retarget the weather blend.
    ///
    /// The countdown restarts when the cloud texture differs from the one
    /// currently fading in or the overlay effect changes. Otherwise the new
    /// target is reached at the end of the running countdown and the cloud
    /// layers keep their weights.
    ///
    /// A weather with a `next_cloud_texture` names both layers itself and
    /// weights them with its `cloud_blend_factor`; the countdown then restarts
    /// when that pair changes.
    pub fn set_weather(&mut self, weather: WeatherResult) {
        let host_clouds = !weather.next_cloud_texture.is_empty();
        let clouds_changed = if host_clouds {
            weather.cloud_texture != self.clouds || weather.next_cloud_texture != self.next_clouds
        } else {
            weather.cloud_texture != self.next_clouds
        };
        let reset = clouds_changed || weather.particle_effect != self.transition.target().particle_effect;

        if host_clouds {
            self.clouds.clone_from(&weather.cloud_texture);
            self.next_clouds.clone_from(&weather.next_cloud_texture);
        } else if clouds_changed {
            self.clouds = std::mem::replace(&mut self.next_clouds, weather.cloud_texture.clone());
        } else if self.host_clouds {
            // The host finished its own fade onto the layer we already show
            self.clouds.clone_from(&self.next_clouds);
        }
        self.host_clouds = host_clouds;
        if reset {
            debug!(
                "Weather retarget: clouds '{}' -> '{}', effect '{}'",
                self.clouds, self.next_clouds, weather.particle_effect
            );
        }
        self.rain_speed = weather.rain_speed;

        if let Creation::Created(nodes) = &mut self.creation {
            for effect in &mut nodes.effects {
                effect.from_alpha = effect.alpha;
                if !weather.particle_effect.is_empty() && effect.name == weather.particle_effect {
                    effect.to_alpha = weather.effect_fade;
                    effect.retiring = false;
                } else {
                    effect.to_alpha = 0.0;
                    effect.retiring = true;
                }
            }
        }

        self.transition.retarget(weather, reset);
    }

    /// Override the drop speed. The next [`set_weather`](Self::set_weather)
    /// replaces it with that weather's `rain_speed`.
    pub fn set_rain_speed(&mut self, speed: f32) {
        self.rain_speed = speed;
    }

    pub fn set_storm_direction(&mut self, direction: Vec3) {
        self.storm_direction = direction;
    }

    pub fn set_sun_direction(&mut self, direction: Vec3) {
        self.sun.set_direction(direction);
    }

    pub fn set_sun_enabled(&mut self, enabled: bool) {
        self.sun.set_enabled(enabled);
    }

    pub fn set_masser_state(&mut self, state: MoonState) {
        self.masser.set_state(state);
    }

    pub fn set_secunda_state(&mut self, state: MoonState) {
        self.secunda.set_state(state);
    }

    pub fn set_glare_time_of_day_fade(&mut self, fade: f32) {
        self.sun.set_glare_fade(fade);
    }

    pub fn set_water_enabled(&mut self, enabled: bool) {
        self.underwater.set_enabled(enabled);
    }

    pub fn set_water_height(&mut self, height: f32) {
        self.underwater.set_water_level(height);
    }

    /// Tint Secunda with the script colour instead of white.
    pub fn set_moon_colour(&mut self, red: bool) {
        let tint = if red {
            Vec4::from_array(self.config.moon_script_color)
        } else {
            Vec4::ONE
        };
        self.secunda.set_tint(tint);
    }

    // -- Per frame ----------------------------------------------------------

    /// Advance by `duration` seconds and push fresh values into the subtree.
    ///
    /// Timers advance even while disabled; visual work only happens while
    /// enabled. Negative or non-finite durations count as zero.
    pub fn update(&mut self, scene: &mut SceneGraph, duration: f32) {
        let dt = if duration.is_finite() && duration > 0.0 { duration } else { 0.0 };

        self.transition.advance(dt);
        let weather = self.transition.current();

        let scroll = dt * weather.cloud_speed * self.config.cloud_scroll_rate;
        if scroll.is_finite() {
            self.cloud_timer = (self.cloud_timer + scroll).rem_euclid(1.0);
        }
        self.rain.advance_timer(dt);
        self.night_roll = (self.night_roll + dt * self.config.night_roll_rate.to_radians()).rem_euclid(TAU);

        if !self.enabled {
            if let Creation::Created(nodes) = &self.creation {
                scene.set_visible(nodes.root, false);
            }
            self.rain.wrap_timer(self.transition.target().rain_frequency);
            return;
        }

        if matches!(self.creation, Creation::NotCreated) {
            self.create(scene);
        }
        self.update_visuals(scene, &weather, dt);
    }

    /// Frame traversal: move the sky onto the eye, apply every updater and
    /// flatten the sky subtree. Call after [`update`](Self::update).
    pub fn traverse(&self, scene: &mut SceneGraph, ctx: &FrameContext) -> Vec<FlatDrawEntry> {
        let Creation::Created(nodes) = &self.creation else {
            return Vec::new();
        };
        if !self.enabled {
            return Vec::new();
        }

        scene.set_transform(nodes.root, LocalTransform::from_position(ctx.eye));

        let mut updaters: Vec<&dyn NodeUpdater> = vec![&nodes.atmosphere, &nodes.night];
        updaters.extend(nodes.cloud_layers.iter().map(|l| l as &dyn NodeUpdater));
        for effect in &nodes.effects {
            updaters.extend(effect.faders.iter().map(|f| f as &dyn NodeUpdater));
        }
        if let Some(rain) = self.rain.nodes() {
            updaters.push(&rain.shooter);
            updaters.push(&rain.fader);
        }
        for updater in updaters {
            if let Some(node) = scene.get_mut(updater.node()) {
                updater.apply(node);
            }
        }

        for id in [Some(nodes.particles), self.rain.node()].into_iter().flatten() {
            if let Some(node) = scene.get_mut(id) {
                self.underwater.apply(node);
            }
        }

        scene.flatten_from(nodes.root, ctx)
    }

    /// Remove the sky subtree from the scene.
    pub fn teardown(mut self, scene: &mut SceneGraph) {
        if let Creation::Created(nodes) = std::mem::replace(&mut self.creation, Creation::NotCreated) {
            scene.remove(nodes.root);
            self.rain.detach();
            info!("Sky subtree removed");
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_created(&self) -> bool {
        matches!(self.creation, Creation::Created(_))
    }

    pub fn root(&self) -> Option<SceneNodeId> {
        match &self.creation {
            Creation::Created(nodes) => Some(nodes.root),
            Creation::NotCreated => None,
        }
    }

    pub fn config(&self) -> &SkyConfig {
        &self.config
    }

    pub fn hour(&self) -> f32 {
        self.hour
    }

    /// `(day, month)` as last set.
    pub fn date(&self) -> (u32, u32) {
        (self.day, self.month)
    }

    pub fn remaining_transition_time(&self) -> f32 {
        self.transition.remaining()
    }

    pub fn transition_progress(&self) -> f32 {
        self.transition.progress()
    }

    /// The blended weather showing right now.
    pub fn current_weather(&self) -> WeatherResult {
        self.transition.current()
    }

    pub fn target_weather(&self) -> &WeatherResult {
        self.transition.target()
    }

    pub fn cloud_animation_timer(&self) -> f32 {
        self.cloud_timer
    }

    /// `(fading-out texture, fading-in texture, weight of the fading-in layer)`.
    pub fn cloud_layers(&self) -> (&str, &str, f32) {
        (&self.clouds, &self.next_clouds, self.cloud_weight())
    }

    pub fn stars_opacity(&self) -> f32 {
        self.stars_opacity
    }

    pub fn is_storm(&self) -> bool {
        self.is_storm
    }

    pub fn wind_speed(&self) -> f32 {
        self.wind_speed
    }

    pub fn rain_state(&self) -> RainState {
        self.rain.state()
    }

    pub fn rain_node(&self) -> Option<SceneNodeId> {
        self.rain.node()
    }

    pub fn rain_particles<'a>(&self, scene: &'a SceneGraph) -> Option<&'a ParticleSystem> {
        self.rain.node().and_then(|id| scene.get(id)).and_then(|n| n.content.particles())
    }

    /// Current opacity of an overlay effect, if it exists.
    pub fn particle_effect_alpha(&self, name: &str) -> Option<f32> {
        match &self.creation {
            Creation::Created(nodes) => nodes.effects.iter().find(|e| e.name == name).map(|e| e.alpha),
            Creation::NotCreated => None,
        }
    }

    /// Ambient loop the host should play: target's id at the blended volume.
    pub fn ambient_loop(&self) -> (&str, f32) {
        let (id, _) = self.transition.target().ambient_loop();
        (id, self.transition.current().ambient_sound_volume)
    }

    pub fn sun(&self) -> &Sun {
        &self.sun
    }

    pub fn masser(&self) -> &Moon {
        &self.masser
    }

    pub fn secunda(&self) -> &Moon {
        &self.secunda
    }

    /// Weight of the fading-in cloud layer.
    fn cloud_weight(&self) -> f32 {
        let target = self.transition.target();
        if target.next_cloud_texture.is_empty() {
            self.transition.cloud_weight()
        } else if target.cloud_blend_factor.is_finite() {
            target.cloud_blend_factor.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn day_of_year(&self) -> u32 {
        calendar::day_of_year(self.day, self.month)
    }

    /// Masser's coarse phase: New=0, crescent=1, half=2, gibbous=3, Full=4.
    pub fn masser_phase(&self) -> u8 {
        self.masser.coarse_phase(self.day_of_year())
    }

    /// Secunda's coarse phase, same buckets as [`masser_phase`](Self::masser_phase).
    pub fn secunda_phase(&self) -> u8 {
        self.secunda.coarse_phase(self.day_of_year())
    }

    /// GPU-ready snapshot of the sky.
    pub fn uniform(&self) -> SkyUniform {
        let w = self.transition.current();
        SkyUniform {
            sun_direction: self.sun.direction().to_array(),
            sun_visibility: if self.sun.is_enabled() { self.sun.disc_alpha(&w) } else { 0.0 },
            sun_color: w.sun_color.truncate().to_array(),
            hour: self.hour,
            fog_color: w.fog_color.to_array(),
            ambient_color: w.ambient_color.to_array(),
            sky_color: w.sky_color.to_array(),
            fog_depth: w.fog_depth,
            stars_opacity: self.stars_opacity,
            cloud_blend: self.cloud_weight(),
            cloud_offset: self.cloud_timer,
            masser_direction: self.masser.direction().to_array(),
            masser_phase: f32::from(self.masser_phase()),
            secunda_direction: self.secunda.direction().to_array(),
            secunda_phase: f32::from(self.secunda_phase()),
            wind_speed: w.wind_speed,
            rain_intensity: w.effect_fade * self.rain.lifecycle_alpha(),
            is_storm: u32::from(w.is_storm),
            is_night: u32::from(w.night),
        }
    }

    /// Append every model and texture identifier the sky may reference under
    /// its configuration and current target.
    pub fn list_assets_to_preload(&self, models: &mut Vec<String>, textures: &mut Vec<String>) {
        let assets = &self.config.assets;
        let target = self.transition.target();

        for name in [
            &assets.atmosphere_mesh,
            &assets.night_mesh,
            &assets.clouds_mesh,
            &target.particle_effect,
        ] {
            push_unique(models, name);
        }

        let mut moon_textures = Vec::new();
        self.masser.push_assets(&mut moon_textures);
        self.secunda.push_assets(&mut moon_textures);
        for name in [&assets.sun_texture, &assets.sun_glare_texture]
            .into_iter()
            .chain(moon_textures.iter())
        {
            push_unique(textures, name);
        }
        for name in [
            &self.clouds,
            &self.next_clouds,
            &target.cloud_texture,
            &target.next_cloud_texture,
            &target.rain_effect,
        ] {
            push_unique(textures, name);
        }
    }

    // -- Internals ----------------------------------------------------------

    fn create(&mut self, scene: &mut SceneGraph) {
        let resources = self.resources.as_ref();
        let assets = &self.config.assets;

        let root = scene.add_child(self.parent, "sky", RenderBin::Atmosphere, NodeContent::Group);

        let (atmosphere_content, atmosphere_drawable) = mesh_content(resources, &assets.atmosphere_mesh);
        let atmosphere = scene.add_child(root, "atmosphere", RenderBin::Atmosphere, atmosphere_content);
        scene.set_visible(atmosphere, atmosphere_drawable);

        let (night_content, night_drawable) = mesh_content(resources, &assets.night_mesh);
        let night = scene.add_child(root, "atmosphere_night", RenderBin::Atmosphere, night_content);
        scene.set_visible(night, false);

        let sun_group = scene.add_child(root, "sun", RenderBin::Celestial, NodeContent::Group);
        let sun = SunNodes {
            group: sun_group,
            disc: scene.add_child(
                sun_group,
                "sun_disc",
                RenderBin::Celestial,
                NodeContent::billboard("", None, self.config.sun.size),
            ),
            glare: scene.add_child(
                sun_group,
                "sun_glare",
                RenderBin::Celestial,
                NodeContent::billboard("", None, self.config.sun.glare_size),
            ),
        };
        let masser = add_moon(scene, root, "masser", self.config.masser.size);
        let secunda = add_moon(scene, root, "secunda", self.config.secunda.size);

        let clouds = scene.add_child(root, "clouds", RenderBin::Clouds, NodeContent::Group);
        let (cloud_content, clouds_drawable) = mesh_content(resources, &assets.clouds_mesh);
        let cloud_layers = [0, 1].map(|i| {
            let id = scene.add_child(clouds, format!("cloud_layer_{i}"), RenderBin::Clouds, cloud_content.clone());
            scene.set_visible(id, false);
            CloudUpdater::new(id)
        });

        let particles = scene.add_child(root, "particles", RenderBin::Weather, NodeContent::Group);

        self.creation = Creation::Created(Box::new(SkyNodes {
            root,
            atmosphere: AtmosphereUpdater::new(atmosphere),
            night: AtmosphereNightUpdater::new(night),
            night_drawable,
            clouds,
            cloud_layers,
            clouds_drawable,
            sun,
            masser,
            secunda,
            particles,
            effects: Vec::new(),
        }));
        info!("Sky subtree created ({} scene nodes)", scene.node_count());
    }

    fn update_visuals(&mut self, scene: &mut SceneGraph, weather: &WeatherResult, dt: f32) {
        let cloud_weight = self.cloud_weight();
        let Creation::Created(nodes) = &mut self.creation else {
            return;
        };
        let resources = self.resources.as_ref();
        let config = &self.config;
        let progress = self.transition.progress();

        scene.set_visible(nodes.root, true);
        self.is_storm = weather.is_storm;
        self.wind_speed = weather.wind_speed;

        // Atmosphere
        nodes.atmosphere.fog_color = weather.fog_color;
        nodes.atmosphere.fog_depth = weather.fog_depth;
        nodes.atmosphere.ambient = weather.ambient_color;
        nodes.atmosphere.sky_color = weather.sky_color;

        self.stars_opacity = if weather.night { weather.night_fade } else { 0.0 };
        nodes.night.opacity = self.stars_opacity;
        nodes.night.roll = self.night_roll;
        nodes.night.visible = weather.night && nodes.night_drawable;

        // Clouds
        let emission = (weather.fog_color.truncate() + Vec3::splat(config.cloud_colour_offset))
            .min(Vec3::ONE)
            .extend(1.0);
        let textures = [self.clouds.as_str(), self.next_clouds.as_str()];
        let weights = [1.0 - cloud_weight, cloud_weight];
        for (i, layer) in nodes.cloud_layers.iter_mut().enumerate() {
            let has_texture = bind_texture(scene, resources, layer.node(), textures[i]);
            layer.timer = self.cloud_timer;
            layer.opacity = weights[i];
            layer.emission = emission;
            layer.visible = nodes.clouds_drawable && has_texture && weights[i] > 0.0;
        }

        let storm = if weather.is_storm {
            storm_orientation(self.storm_direction)
        } else {
            Quat::IDENTITY
        };
        scene.set_transform(nodes.clouds, LocalTransform::from_rotation(storm));
        scene.set_transform(nodes.particles, LocalTransform::from_rotation(storm));

        // Celestial bodies
        let distance = config.celestial_distance;
        let day_of_year = calendar::day_of_year(self.day, self.month);
        self.sun.apply(scene, resources, &nodes.sun, &config.assets, weather, distance);
        self.masser.apply(scene, resources, &nodes.masser, day_of_year, weather, distance);
        self.secunda.apply(scene, resources, &nodes.secunda, day_of_year, weather, distance);

        // Overlay effects
        let target = self.transition.target();
        let wanted = target.particle_effect.as_str();
        if !wanted.is_empty() && !nodes.effects.iter().any(|e| e.name == wanted) {
            let from = self.transition.from();
            let from_alpha = if from.particle_effect == wanted { from.effect_fade } else { 0.0 };
            debug!("Particle effect '{wanted}' added");
            nodes.effects.push(add_effect(
                scene,
                resources,
                nodes.particles,
                wanted,
                from_alpha,
                target.effect_fade,
            ));
        }
        for effect in &mut nodes.effects {
            effect.alpha = effect.from_alpha + (effect.to_alpha - effect.from_alpha) * progress;
            for fader in &mut effect.faders {
                fader.alpha = effect.alpha;
            }
        }
        if progress >= 1.0 {
            nodes.effects.retain(|effect| {
                if effect.retiring {
                    debug!("Particle effect '{}' removed", effect.name);
                    scene.remove(effect.node);
                    false
                } else {
                    true
                }
            });
        }

        // Rain
        let frame = RainFrame {
            target,
            blended: weather,
            speed: self.rain_speed,
            dt,
        };
        self.rain.step(scene, nodes.root, resources, &frame);
    }
}

impl Drop for SkyManager {
    fn drop(&mut self) {
        if self.is_created() {
            warn!("SkyManager dropped without teardown; its nodes stay in the scene");
        }
    }
}

/// Mesh content for `name`, and whether its model resolved.
fn mesh_content(resources: &dyn ResourceManager, name: &str) -> (NodeContent, bool) {
    let model = resources.model(name);
    if model.is_none() {
        warn!("Sky model '{name}' not found");
    }
    (NodeContent::mesh(name, model), model.is_some())
}

fn add_moon(scene: &mut SceneGraph, root: SceneNodeId, name: &str, size: f32) -> MoonNodes {
    let group = scene.add_child(root, name, RenderBin::Celestial, NodeContent::Group);
    let circle = scene.add_child(
        group,
        format!("{name}_circle"),
        RenderBin::Celestial,
        NodeContent::billboard("", None, size),
    );
    let disc = scene.add_child(
        group,
        format!("{name}_disc"),
        RenderBin::Celestial,
        NodeContent::billboard("", None, size),
    );
    MoonNodes { group, disc, circle }
}

fn add_effect(
    scene: &mut SceneGraph,
    resources: &dyn ResourceManager,
    parent: SceneNodeId,
    name: &str,
    from_alpha: f32,
    to_alpha: f32,
) -> ParticleEffect {
    let node = scene.add_child(parent, format!("effect_{name}"), RenderBin::Weather, NodeContent::Group);
    let mut faders = Vec::new();
    match resources.model(name) {
        Some(model) => {
            for i in 0..model.particle_systems {
                let child = scene.add_child(
                    node,
                    format!("{name}#{i}"),
                    RenderBin::Weather,
                    NodeContent::mesh(name, Some(model)),
                );
                faders.push(AlphaFader::new(child, from_alpha));
            }
        }
        None => warn!("Particle effect model '{name}' not found"),
    }
    ParticleEffect {
        name: name.to_string(),
        node,
        faders,
        from_alpha,
        to_alpha,
        alpha: from_alpha,
        retiring: false,
    }
}

/// Rotation taking the dome's north axis onto the storm direction.
fn storm_orientation(direction: Vec3) -> Quat {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_rotation_arc(Vec3::NEG_Z, dir)
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Drawable, ResourceRegistry};
    use crate::sky::moon::Phase;

    const ASH: &str = "meshes/ash_cloud";

    fn clear() -> WeatherResult {
        WeatherResult {
            cloud_texture: "textures/clouds_clear".to_string(),
            fog_depth: 0.2,
            glare_view: 1.0,
            ..Default::default()
        }
    }

    fn overcast() -> WeatherResult {
        WeatherResult {
            cloud_texture: "textures/clouds_overcast".to_string(),
            fog_depth: 0.8,
            glare_view: 0.0,
            ..Default::default()
        }
    }

    fn rainy() -> WeatherResult {
        WeatherResult {
            cloud_texture: "textures/clouds_rain".to_string(),
            rain_effect: "textures/raindrop".to_string(),
            rain_frequency: 20.0,
            rain_speed: 600.0,
            effect_fade: 1.0,
            wind_speed: 10.0,
            ..Default::default()
        }
    }

    fn ashstorm() -> WeatherResult {
        WeatherResult {
            cloud_texture: "textures/clouds_ash".to_string(),
            particle_effect: ASH.to_string(),
            effect_fade: 1.0,
            is_storm: true,
            ..Default::default()
        }
    }

    /// Registry holding every asset the given weathers need.
    fn registry_for(weathers: &[WeatherResult]) -> ResourceRegistry {
        let mut probe = SkyManager::new(SceneNodeId(0), Arc::new(ResourceRegistry::new()), SkyConfig::default());
        let (mut models, mut textures) = (Vec::new(), Vec::new());
        probe.list_assets_to_preload(&mut models, &mut textures);
        for w in weathers {
            probe.set_weather(w.clone());
            probe.list_assets_to_preload(&mut models, &mut textures);
        }
        let mut reg = ResourceRegistry::new();
        reg.register_model(ASH, 2);
        reg.register_all(&models, &textures);
        reg
    }

    fn setup(weathers: &[WeatherResult]) -> (SceneGraph, SkyManager) {
        let scene = SceneGraph::new();
        let sky = SkyManager::new(scene.root(), Arc::new(registry_for(weathers)), SkyConfig::default());
        (scene, sky)
    }

    fn has_particles(entries: &[FlatDrawEntry]) -> bool {
        entries.iter().any(|e| matches!(e.drawable, Drawable::Particles { .. }))
    }

    fn billboards(entries: &[FlatDrawEntry]) -> usize {
        entries.iter().filter(|e| matches!(e.drawable, Drawable::Billboard { .. })).count()
    }

    #[test]
    fn test_lazy_creation() {
        let (mut scene, mut sky) = setup(&[]);
        assert!(!sky.is_created());
        assert_eq!(scene.node_count(), 1);

        sky.update(&mut scene, 0.0);
        assert!(sky.is_created());
        let count = scene.node_count();
        assert!(count > 1);

        // Creation happens once
        sky.update(&mut scene, 1.0);
        assert_eq!(scene.node_count(), count);
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_disabled_from_start_creates_nothing() {
        let (mut scene, mut sky) = setup(&[]);
        sky.set_enabled(false);
        sky.update(&mut scene, 1.0);
        assert!(!sky.is_created());
        assert!(sky.traverse(&mut scene, &FrameContext::default()).is_empty());
    }

    #[test]
    fn test_remaining_time_stays_in_window() {
        let weathers = [clear(), overcast(), rainy(), ashstorm()];
        let (mut scene, mut sky) = setup(&weathers);
        let duration = sky.config().transition_duration;
        let steps = [0.5, -3.0, f32::NAN, 2.0, 7.5, 0.0, 30.0];

        for (i, w) in weathers.iter().cycle().take(12).enumerate() {
            sky.set_weather(w.clone());
            let mut last = sky.remaining_transition_time();
            assert!((0.0..=duration).contains(&last));
            for dt in steps.iter().skip(i % 3).take(3) {
                sky.update(&mut scene, *dt);
                let now = sky.remaining_transition_time();
                assert!((0.0..=duration).contains(&now));
                assert!(now <= last, "countdown went up: {last} -> {now}");
                last = now;
            }
        }
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_halfway_through_window() {
        let (mut scene, mut sky) = setup(&[clear(), overcast()]);
        sky.set_weather(clear());
        sky.update(&mut scene, 10.0);
        assert_eq!(sky.remaining_transition_time(), 0.0);

        sky.set_weather(overcast());
        assert_eq!(sky.remaining_transition_time(), 10.0);
        sky.update(&mut scene, 5.0);
        assert!((sky.remaining_transition_time() - 5.0).abs() < 1e-5);

        let w = sky.current_weather();
        assert!((w.fog_depth - 0.5).abs() < 1e-5);
        assert!((w.glare_view - 0.5).abs() < 1e-5);

        let (from, to, weight) = sky.cloud_layers();
        assert_eq!(from, "textures/clouds_clear");
        assert_eq!(to, "textures/clouds_overcast");
        assert!((weight - 0.5).abs() < 1e-5);
        sky.teardown(&mut scene);
    }

    fn layer_opacities(sky: &SkyManager) -> [f32; 2] {
        match &sky.creation {
            Creation::Created(nodes) => nodes.cloud_layers.each_ref().map(|l| l.opacity),
            Creation::NotCreated => [0.0; 2],
        }
    }

    #[test]
    fn test_same_clouds_keep_layer_weights() {
        let (mut scene, mut sky) = setup(&[clear(), overcast()]);
        sky.set_weather(clear());
        sky.update(&mut scene, 10.0);
        sky.set_weather(overcast());
        sky.update(&mut scene, 6.0);
        let [out_before, in_before] = layer_opacities(&sky);
        assert!((in_before - 0.6).abs() < 1e-5);
        assert!((out_before - 0.4).abs() < 1e-5);

        // Nudging a colour keeps the cross-fade where it was
        sky.set_weather(WeatherResult { fog_depth: 0.1, ..overcast() });
        assert!((sky.cloud_layers().2 - 0.6).abs() < 1e-5);
        sky.update(&mut scene, 0.0);
        let [out_after, in_after] = layer_opacities(&sky);
        assert!((in_after - in_before).abs() < 1e-5);
        assert!((out_after - out_before).abs() < 1e-5);
        assert!((sky.uniform().cloud_blend - 0.6).abs() < 1e-5);

        // A host resending every frame still gets a steady fade
        let mut last = sky.cloud_layers().2;
        for frame in 0..100 {
            let fog_depth = 0.8 + 0.001 * frame as f32;
            sky.set_weather(WeatherResult { fog_depth, ..overcast() });
            sky.update(&mut scene, 0.02);
            let weight = sky.cloud_layers().2;
            assert!(weight >= last - 1e-6, "weight fell: {last} -> {weight}");
            assert!(weight - last < 0.01, "weight jumped: {last} -> {weight}");
            last = weight;
        }
        assert!((last - 0.8).abs() < 1e-3);
        assert!((layer_opacities(&sky)[1] - last).abs() < 1e-6);

        sky.update(&mut scene, 3.0);
        assert_eq!(sky.cloud_layers().2, 1.0);
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_set_weather_replaces_rain_speed_override() {
        let (_, mut sky) = setup(&[]);
        sky.set_rain_speed(900.0);
        assert_eq!(sky.rain_speed, 900.0);
        sky.set_weather(rainy());
        assert_eq!(sky.rain_speed, 600.0);
        sky.set_rain_speed(450.0);
        assert_eq!(sky.rain_speed, 450.0);
    }

    #[test]
    fn test_host_named_cloud_layers() {
        let handoff = |blend: f32| WeatherResult {
            next_cloud_texture: "textures/clouds_overcast".to_string(),
            cloud_blend_factor: blend,
            ..clear()
        };
        let (mut scene, mut sky) = setup(&[clear(), overcast(), handoff(0.0)]);
        sky.set_weather(clear());
        sky.update(&mut scene, 10.0);

        sky.set_weather(handoff(0.25));
        assert_eq!(sky.remaining_transition_time(), 10.0);
        sky.update(&mut scene, 3.0);
        let (from, to, weight) = sky.cloud_layers();
        assert_eq!(from, "textures/clouds_clear");
        assert_eq!(to, "textures/clouds_overcast");
        assert_eq!(weight, 0.25);
        assert_eq!(layer_opacities(&sky), [0.75, 0.25]);
        assert_eq!(sky.uniform().cloud_blend, 0.25);

        // Same pair, new factor: the host moves the fade, the countdown runs on
        sky.set_weather(handoff(0.75));
        assert!((sky.remaining_transition_time() - 7.0).abs() < 1e-5);
        sky.update(&mut scene, 0.0);
        assert_eq!(layer_opacities(&sky), [0.25, 0.75]);

        // Host settles on the layer it faded in
        sky.set_weather(overcast());
        assert!((sky.remaining_transition_time() - 7.0).abs() < 1e-5);
        let (from, to, _) = sky.cloud_layers();
        assert_eq!(from, "textures/clouds_overcast");
        assert_eq!(to, "textures/clouds_overcast");
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_same_clouds_do_not_reset_countdown() {
        let (mut scene, mut sky) = setup(&[clear()]);
        sky.set_weather(clear());
        sky.update(&mut scene, 4.0);
        let brighter = WeatherResult { fog_depth: 0.0, ..clear() };
        sky.set_weather(brighter);
        assert!((sky.remaining_transition_time() - 6.0).abs() < 1e-5);
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_update_zero_is_idempotent() {
        let stormy_rain = WeatherResult {
            particle_effect: ASH.to_string(),
            is_storm: true,
            night: true,
            night_fade: 0.7,
            ..rainy()
        };
        let (mut scene, mut sky) = setup(&[stormy_rain.clone()]);
        sky.set_weather(stormy_rain);
        sky.set_masser_state(MoonState { moon_alpha: 1.0, rotation_from_horizon: 0.5, ..Default::default() });
        let ctx = FrameContext::new(Vec3::new(3.0, 40.0, -2.0));

        sky.update(&mut scene, 1.0);
        let first = sky.traverse(&mut scene, &ctx);
        let timer = sky.cloud_animation_timer();

        sky.update(&mut scene, 0.0);
        let second = sky.traverse(&mut scene, &ctx);
        assert_eq!(first, second);
        assert_eq!(sky.cloud_animation_timer(), timer);
        assert!(has_particles(&second));
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_phase_coarsening() {
        let (_scene, mut sky) = setup(&[]);
        let expected = [
            (Phase::New, 0),
            (Phase::WaxingCrescent, 1),
            (Phase::WaningCrescent, 1),
            (Phase::FirstQuarter, 2),
            (Phase::ThirdQuarter, 2),
            (Phase::WaxingGibbous, 3),
            (Phase::WaningGibbous, 3),
            (Phase::Full, 4),
        ];
        for (phase, coarse) in expected {
            sky.set_masser_state(MoonState { phase, ..Default::default() });
            sky.set_secunda_state(MoonState { phase, ..Default::default() });
            assert_eq!(sky.masser_phase(), coarse, "{phase:?}");
            assert_eq!(sky.secunda_phase(), coarse, "{phase:?}");
        }

        // Unspecified falls back to the calendar: Jan 13 is day 12, New for Masser
        sky.set_date(13, 0);
        sky.set_masser_state(MoonState { phase: Phase::Unspecified, ..Default::default() });
        assert_eq!(sky.masser_phase(), 0);
        sky.set_date(1, 0);
        assert_eq!(sky.masser_phase(), 4);
    }

    #[test]
    fn test_rain_lifecycle() {
        let (mut scene, mut sky) = setup(&[rainy(), clear()]);
        sky.set_weather(rainy());
        sky.update(&mut scene, 0.5);
        assert_eq!(sky.rain_state(), RainState::Active);
        let drops = sky.rain_particles(&scene).map_or(0, |ps| ps.len());
        assert_eq!(drops, 10);

        sky.set_weather(clear());
        sky.update(&mut scene, 0.1);
        assert_eq!(sky.rain_state(), RainState::FadingOut);
        let emitted = sky.rain_particles(&scene).map(|ps| ps.emitted_total());

        sky.update(&mut scene, 0.3);
        assert_eq!(sky.rain_state(), RainState::FadingOut);
        assert_eq!(sky.rain_particles(&scene).map(|ps| ps.emitted_total()), emitted);

        sky.update(&mut scene, 1.0);
        assert_eq!(sky.rain_state(), RainState::Inactive);
        assert!(sky.rain_node().is_none());
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_underwater_hides_rain_and_restores() {
        let (mut scene, mut sky) = setup(&[rainy()]);
        sky.set_water_enabled(true);
        sky.set_water_height(0.0);
        sky.set_weather(rainy());
        sky.update(&mut scene, 0.5);

        let below = sky.traverse(&mut scene, &FrameContext::new(Vec3::new(0.0, -10.0, 0.0)));
        assert!(!has_particles(&below));
        assert_eq!(sky.rain_state(), RainState::Active);
        let rain = sky.rain_node().expect("rain node");
        assert!(scene.get(rain).is_some_and(|n| n.visible));

        let above = sky.traverse(&mut scene, &FrameContext::new(Vec3::new(0.0, 10.0, 0.0)));
        assert!(has_particles(&above));

        sky.set_water_enabled(false);
        let below = sky.traverse(&mut scene, &FrameContext::new(Vec3::new(0.0, -10.0, 0.0)));
        assert!(has_particles(&below));
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_disabled_update_advances_timers() {
        let (mut scene, mut sky) = setup(&[overcast()]);
        sky.update(&mut scene, 0.0);
        sky.set_weather(overcast());
        sky.set_enabled(false);

        sky.update(&mut scene, 10.0);
        assert_eq!(sky.remaining_transition_time(), 0.0);
        assert!((sky.cloud_animation_timer() - 0.03).abs() < 1e-5);
        assert!(sky.traverse(&mut scene, &FrameContext::default()).is_empty());
        let root = sky.root().expect("root");
        assert!(scene.get(root).is_some_and(|n| !n.visible));

        sky.set_enabled(true);
        sky.update(&mut scene, 0.0);
        assert!(!sky.traverse(&mut scene, &FrameContext::default()).is_empty());
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_sun_enable_toggle() {
        let (mut scene, mut sky) = setup(&[]);
        sky.update(&mut scene, 0.0);
        let on = billboards(&sky.traverse(&mut scene, &FrameContext::default()));
        assert_eq!(on, 2);

        sky.set_sun_enabled(false);
        sky.update(&mut scene, 0.0);
        let off = billboards(&sky.traverse(&mut scene, &FrameContext::default()));
        assert_eq!(off, 0);
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_sun_placed_at_celestial_distance() {
        let (mut scene, mut sky) = setup(&[]);
        sky.set_sun_direction(Vec3::new(0.0, 2.0, 0.0));
        sky.update(&mut scene, 0.0);
        let eye = Vec3::new(5.0, 1.0, 5.0);
        let entries = sky.traverse(&mut scene, &FrameContext::new(eye));
        let sun = entries
            .iter()
            .find(|e| matches!(e.drawable, Drawable::Billboard { .. }))
            .expect("sun billboard");
        assert!((sun.world_position() - (eye + Vec3::Y * 1000.0)).length() < 1e-2);
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_effect_crossfade() {
        let (mut scene, mut sky) = setup(&[ashstorm(), clear()]);
        sky.set_weather(ashstorm());
        sky.update(&mut scene, 5.0);
        let alpha = sky.particle_effect_alpha(ASH).expect("effect");
        assert!((alpha - 0.5).abs() < 1e-5);

        let entries = sky.traverse(&mut scene, &FrameContext::default());
        let ash: Vec<_> = entries.iter().filter(|e| e.bin == RenderBin::Weather).collect();
        assert_eq!(ash.len(), 2);
        assert!(ash.iter().all(|e| (e.material.alpha - 0.5).abs() < 1e-5));

        sky.set_weather(clear());
        sky.update(&mut scene, 5.0);
        let alpha = sky.particle_effect_alpha(ASH).expect("still fading");
        assert!((alpha - 0.25).abs() < 1e-5);

        sky.update(&mut scene, 5.0);
        assert!(sky.particle_effect_alpha(ASH).is_none());
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_storm_orients_clouds() {
        let (mut scene, mut sky) = setup(&[ashstorm()]);
        sky.set_storm_direction(Vec3::X);
        sky.set_weather(ashstorm());
        sky.update(&mut scene, 10.0);
        assert!(sky.is_storm());

        let entries = sky.traverse(&mut scene, &FrameContext::default());
        let cloud = entries.iter().find(|e| e.bin == RenderBin::Clouds).expect("cloud layer");
        let north = cloud.world_transform.transform_vector3(Vec3::NEG_Z);
        assert!((north - Vec3::X).length() < 1e-4);
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_moon_colour_override() {
        let (_scene, mut sky) = setup(&[]);
        sky.set_moon_colour(true);
        assert_eq!(sky.secunda().tint(), Vec4::from_array(SkyConfig::default().moon_script_color));
        assert_eq!(sky.masser().tint(), Vec4::ONE);
        sky.set_moon_colour(false);
        assert_eq!(sky.secunda().tint(), Vec4::ONE);
    }

    #[test]
    fn test_preload_lists_everything() {
        let (_scene, mut sky) = setup(&[]);
        sky.set_weather(ashstorm());
        let (mut models, mut textures) = (Vec::new(), Vec::new());
        sky.list_assets_to_preload(&mut models, &mut textures);

        assert!(models.contains(&"meshes/sky_clouds".to_string()));
        assert!(models.contains(&ASH.to_string()));
        assert!(textures.contains(&"textures/sun".to_string()));
        assert!(textures.contains(&"textures/masser_full".to_string()));
        assert!(textures.contains(&"textures/secunda_circle".to_string()));
        assert!(textures.contains(&"textures/clouds_ash".to_string()));
        assert!(!textures.iter().any(String::is_empty));

        // Listing again adds nothing new
        let before = (models.len(), textures.len());
        sky.list_assets_to_preload(&mut models, &mut textures);
        assert_eq!((models.len(), textures.len()), before);
    }

    #[test]
    fn test_missing_assets_render_nothing() {
        let mut scene = SceneGraph::new();
        let mut sky = SkyManager::new(scene.root(), Arc::new(ResourceRegistry::new()), SkyConfig::default());
        sky.set_weather(rainy());
        sky.update(&mut scene, 1.0);
        let entries = sky.traverse(&mut scene, &FrameContext::default());
        assert!(entries.iter().all(|e| matches!(e.drawable, Drawable::Particles { texture: None, .. })));
        sky.teardown(&mut scene);
    }

    #[test]
    fn test_teardown_removes_subtree() {
        let (mut scene, mut sky) = setup(&[rainy()]);
        sky.set_weather(rainy());
        sky.update(&mut scene, 1.0);
        assert!(scene.node_count() > 1);
        sky.teardown(&mut scene);
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_uniform_snapshot() {
        let (mut scene, mut sky) = setup(&[clear()]);
        sky.set_hour(18.5);
        sky.set_weather(clear());
        sky.update(&mut scene, 10.0);
        let u = sky.uniform();
        assert_eq!(u.hour, 18.5);
        assert!((u.fog_depth - 0.2).abs() < 1e-6);
        assert_eq!(u.cloud_blend, 1.0);
        assert_eq!(u.is_storm, 0);
        sky.teardown(&mut scene);
    }
}
