use ballpit_core::{
    load_config, spawn_surface_camera, BallpitConfig, BallpitPlugin, ConfigWatchPlugin,
    SpawnBallpit,
};
use ballpit_panel::BallpitPanelPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use std::path::PathBuf;

/// Usage: `ballpit [CONFIG.json] [--no-panel]`
fn main() -> AppExit {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let show_panel = !args.iter().any(|arg| arg == "--no-panel");
    let config_path = args.iter().find(|arg| !arg.starts_with("--")).map(PathBuf::from);

    let config = match &config_path {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return AppExit::error();
            }
        },
        None => BallpitConfig::default(),
    };

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Ball pit".into(),
                    ..default()
                }),
                ..default()
            })
            .set(LogPlugin {
                filter: "wgpu=error,naga=warn,ballpit_core=info,ballpit_physics=info".into(),
                level: bevy::log::Level::INFO,
                ..default()
            }),
    )
    .add_plugins(BallpitPlugin)
    .insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.04)))
    .insert_resource(StartupConfig(config.clone()))
    .add_systems(Startup, setup);

    if show_panel {
        app.add_plugins(BallpitPanelPlugin { config });
    }
    if let Some(path) = config_path {
        app.add_plugins(ConfigWatchPlugin { path });
    }

    app.run()
}

#[derive(Resource)]
struct StartupConfig(BallpitConfig);

fn setup(
    mut commands: Commands,
    window: Query<Entity, With<PrimaryWindow>>,
    config: Res<StartupConfig>,
    mut spawn: MessageWriter<SpawnBallpit>,
) {
    let Ok(window) = window.single() else {
        error!("No primary window, nothing to render into");
        return;
    };
    let config = config.0.clone();

    let ambient_color = match config.ambient() {
        Ok(color) => color,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let ambient = AmbientLight {
        color: ambient_color,
        brightness: config.ambient_intensity,
        ..default()
    };

    let surface = spawn_surface_camera(&mut commands, window, config.surface, ambient);
    spawn.write(SpawnBallpit { surface, config });
}
