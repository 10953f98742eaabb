//! Skydome - headless sky driver
//!
//! Runs a scripted day through the sky manager and logs what it renders.

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec3, Vec4};

use skydome::core::logging;
use skydome::scene::{Drawable, FrameContext, ResourceRegistry, SceneGraph};
use skydome::sky::{MoonState, SkyConfig, SkyManager, WeatherResult};

/// Simulated seconds per frame.
const FRAME_DT: f32 = 1.0 / 30.0;
/// In-game hours per real second.
const HOURS_PER_SECOND: f32 = 0.05;

fn main() {
    logging::init();
    log::info!("Skydome starting...");

    let args: Vec<String> = std::env::args().collect();
    let config = match parse_config_arg(&args) {
        Some(path) => {
            log::info!("Loading sky config from: {}", path.display());
            match SkyConfig::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Failed to load {}: {e}", path.display());
                    std::process::exit(1);
                }
            }
        }
        None => SkyConfig::default(),
    };
    let seconds = parse_seconds_arg(&args).unwrap_or(120.0);

    let script = weather_script();

    // Register every asset the script can reach
    let mut models = Vec::new();
    let mut textures = Vec::new();
    {
        let mut probe = SkyManager::new(SceneGraph::new().root(), Arc::new(ResourceRegistry::new()), config.clone());
        probe.list_assets_to_preload(&mut models, &mut textures);
        for (_, weather) in &script {
            probe.set_weather(weather.clone());
            probe.list_assets_to_preload(&mut models, &mut textures);
        }
    }
    let mut registry = ResourceRegistry::new();
    registry.register_model("meshes/ash_cloud", 3);
    registry.register_all(&models, &textures);
    log::info!("Preloaded {} models, {} textures", registry.model_count(), registry.texture_count());

    let mut scene = SceneGraph::new();
    let mut sky = SkyManager::new(scene.root(), Arc::new(registry), config);
    sky.set_water_enabled(true);
    sky.set_water_height(0.0);
    sky.set_date(13, 6);

    let frames = (seconds / FRAME_DT) as u32;
    let mut next_script = 0;
    let mut hour = 6.0f32;
    let eye = Vec3::new(0.0, 12.0, 0.0);

    for frame in 0..frames {
        let t = frame as f32 * FRAME_DT;
        while next_script < script.len() && script[next_script].0 <= t {
            log::info!("[{t:6.1}s] weather -> {}", script[next_script].1.cloud_texture);
            sky.set_weather(script[next_script].1.clone());
            next_script += 1;
        }

        hour = (hour + FRAME_DT * HOURS_PER_SECOND).rem_euclid(24.0);
        let angle = (hour - 6.0) / 12.0 * std::f32::consts::PI;
        sky.set_hour(hour);
        sky.set_sun_direction(Vec3::new(angle.cos(), angle.sin(), 0.0));
        sky.set_glare_time_of_day_fade(angle.sin().max(0.0));
        sky.set_masser_state(MoonState {
            rotation_from_horizon: -angle.sin(),
            rotation_from_north: 0.3,
            moon_alpha: (-angle.sin()).max(0.0),
            ..Default::default()
        });
        sky.set_secunda_state(MoonState {
            rotation_from_horizon: -angle.sin() * 0.8,
            rotation_from_north: -0.4,
            moon_alpha: (-angle.sin()).max(0.0),
            ..Default::default()
        });

        sky.update(&mut scene, FRAME_DT);
        let entries = sky.traverse(&mut scene, &FrameContext::new(eye));

        if frame % 300 == 0 {
            let drops: usize = entries
                .iter()
                .map(|e| match &e.drawable {
                    Drawable::Particles { instances, .. } => instances.len(),
                    _ => 0,
                })
                .sum();
            let (from, to, weight) = sky.cloud_layers();
            let (sound, volume) = sky.ambient_loop();
            log::info!(
                "[{t:6.1}s] hour {hour:5.2} | {} draws | clouds {from} -> {to} ({weight:.2}) | rain {:?}, {drops} drops | stars {:.2} | masser {} secunda {} | ambient '{sound}' @ {volume:.2}",
                entries.len(),
                sky.rain_state(),
                sky.stars_opacity(),
                sky.masser_phase(),
                sky.secunda_phase(),
            );
        }
    }

    let uniform = sky.uniform();
    log::info!(
        "Final uniform: sun {:?}, fog {:?}, storm {}",
        uniform.sun_direction,
        uniform.fog_color,
        uniform.is_storm
    );
    sky.teardown(&mut scene);
    log::info!("Done ({} scene nodes left)", scene.node_count());
}

/// `(start time in seconds, weather)` pairs.
fn weather_script() -> Vec<(f32, WeatherResult)> {
    let clear = WeatherResult {
        cloud_texture: "textures/clouds_clear".to_string(),
        fog_color: Vec4::new(0.6, 0.7, 0.8, 1.0),
        sky_color: Vec4::new(0.4, 0.6, 0.9, 1.0),
        fog_depth: 0.2,
        cloud_speed: 1.0,
        ambient_loop_sound_id: "wind_calm".to_string(),
        ambient_sound_volume: 0.3,
        ..Default::default()
    };
    let rain = WeatherResult {
        cloud_texture: "textures/clouds_rain".to_string(),
        fog_color: Vec4::new(0.3, 0.32, 0.35, 1.0),
        sky_color: Vec4::new(0.25, 0.28, 0.3, 1.0),
        fog_depth: 0.8,
        glare_view: 0.0,
        wind_speed: 12.0,
        cloud_speed: 2.5,
        ambient_loop_sound_id: "rain_heavy".to_string(),
        ambient_sound_volume: 0.9,
        rain_effect: "textures/raindrop".to_string(),
        rain_speed: 600.0,
        rain_frequency: 400.0,
        effect_fade: 1.0,
        ..Default::default()
    };
    let ash = WeatherResult {
        cloud_texture: "textures/clouds_ash".to_string(),
        fog_color: Vec4::new(0.35, 0.2, 0.15, 1.0),
        fog_depth: 0.9,
        glare_view: 0.1,
        wind_speed: 30.0,
        cloud_speed: 4.0,
        is_storm: true,
        particle_effect: "meshes/ash_cloud".to_string(),
        effect_fade: 1.0,
        ambient_loop_sound_id: "ashstorm".to_string(),
        ambient_sound_volume: 1.0,
        ..Default::default()
    };
    let night = WeatherResult {
        night: true,
        night_fade: 1.0,
        ..clear.clone()
    };
    vec![(0.0, clear), (20.0, rain), (50.0, ash), (80.0, night)]
}

/// Parse --config argument from command line
fn parse_config_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == "--config" || args[i] == "-c" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

/// Parse --seconds argument from command line (simulated run length)
fn parse_seconds_arg(args: &[String]) -> Option<f32> {
    for i in 0..args.len() {
        if args[i] == "--seconds" || args[i] == "-s" {
            if let Some(value) = args.get(i + 1) {
                return value.parse().ok();
            }
        }
    }
    None
}
