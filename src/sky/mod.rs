//! Dynamic sky: celestial bodies, cloud layers, atmosphere tint and weather
//! effects, blended as the host's weather changes.

pub mod calendar;
pub mod config;
pub mod manager;
pub mod moon;
pub mod rain;
pub mod state;
pub mod sun;
pub mod underwater;
pub mod updater;
pub mod weather;

pub use config::{MoonConfig, RainConfig, SkyAssets, SkyConfig, SunConfig};
pub use manager::SkyManager;
pub use moon::{Moon, MoonState, Phase};
pub use rain::{RainFader, RainShooter, RainState, RainSystem};
pub use state::SkyUniform;
pub use sun::Sun;
pub use underwater::UnderwaterSwitchCallback;
pub use updater::{AlphaFader, AtmosphereNightUpdater, AtmosphereUpdater, CloudUpdater, NodeUpdater};
pub use weather::{Lerp, WeatherResult, WeatherTransition};

use log::warn;

use crate::scene::{ResourceManager, SceneGraph, SceneNodeId};

/// Bind texture `name` on node `id`, looking it up only when the name changes.
///
/// Returns whether the node now has a usable handle. An empty name clears the
/// binding without a warning.
pub(crate) fn bind_texture(
    scene: &mut SceneGraph,
    resources: &dyn ResourceManager,
    id: SceneNodeId,
    name: &str,
) -> bool {
    let Some(node) = scene.get_mut(id) else {
        return false;
    };
    if node.content.texture_name() == Some(name) {
        return node.content.texture().is_some();
    }
    let handle = if name.is_empty() { None } else { resources.texture(name) };
    if handle.is_none() && !name.is_empty() {
        warn!("Sky texture '{name}' not found");
    }
    node.content.set_texture(name, handle);
    handle.is_some()
}
