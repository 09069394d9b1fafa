//! Decorative ball-pit scenes for Bevy.
//!
//! A scene is a few hundred glossy spheres bouncing in a box that fills the
//! camera's view, with one body optionally chasing the cursor. The physics
//! lives in `ballpit_physics`; this crate wires it into the ECS:
//!
//! - [`pointer`]: per-scene hover/move/click/leave tracking
//! - [`surface`]: camera framing, debounced resizes, visibility-driven
//!   suspend/resume
//! - [`spheres`], [`material`], [`palette`]: one instanced mesh and material
//!   per scene, the subsurface shader and palette sampling
//! - [`scene`]: spawning, per-frame driving and runtime control
//! - [`config`], [`config_watcher`]: JSON config and hot reload
//!
//! ```ignore
//! App::new()
//!     .add_plugins((DefaultPlugins, BallpitPlugin))
//!     .add_systems(Startup, |mut commands: Commands, window: Single<Entity, With<PrimaryWindow>>,
//!                            mut spawn: MessageWriter<SpawnBallpit>| {
//!         let config = BallpitConfig::default();
//!         let ambient = AmbientLight::default();
//!         let surface = spawn_surface_camera(&mut commands, *window, config.surface, ambient);
//!         spawn.write(SpawnBallpit { surface, config });
//!     });
//! ```

use bevy::prelude::*;

pub mod config;
pub mod config_watcher;
pub mod material;
pub mod palette;
pub mod pointer;
pub mod scene;
pub mod spheres;
pub mod surface;

pub use config::{
    load_config, parse_color, save_config, BallpitConfig, ConfigError, ConfigResult,
    MaterialSettings, SceneLayout, SubsurfaceSettings,
};
pub use config_watcher::{reload_config, ConfigWatchPlugin, ConfigWatcher, WatchError, WatchResult};
pub use material::{
    ball_material, instance_color_data, linear_vec4, BallMaterial, BallMaterialPlugin,
    SubsurfaceExtension, SubsurfaceUniforms,
};
pub use palette::{color_at, sample_palette};
pub use pointer::{
    PointerEvent, PointerEventKind, PointerPlugin, PointerRegistry, PointerSet, PointerState,
};
pub use scene::{
    plan_bounds, project_pointer, BallpitScene, BoundsUpdate, CenterTween, SceneAction,
    SceneCommand, SceneError, ScenePlugin, SceneResult, SpawnBallpit,
};
pub use spheres::{instance_transform, BallInstance, BallLight, SphereAssets, SphereInstances};
pub use surface::{
    compute_metrics, spawn_surface_camera, FrameClock, LoopTransition, RenderSurface,
    ResizeDebounce, SurfaceMetrics, SurfacePlugin, SurfaceResized, SurfaceSet, SurfaceSettings,
    SurfaceVisibility,
};

/// Everything a ball-pit app needs except the material, which requires the
/// render plugins. See [`BallpitPlugin`].
pub struct BallpitSimulationPlugin;

impl Plugin for BallpitSimulationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((PointerPlugin, SurfacePlugin, ScenePlugin))
            .configure_sets(Update, PointerSet.before(SurfaceSet::Resize));
    }
}

/// Pointer tracking, surfaces, scenes and the sphere material.
pub struct BallpitPlugin;

impl Plugin for BallpitPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((BallpitSimulationPlugin, BallMaterialPlugin));
    }
}
