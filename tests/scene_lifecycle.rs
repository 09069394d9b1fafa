use ballpit_core::{
    load_config, save_config, BallInstance, BallLight, BallMaterial, BallpitConfig, BallpitScene,
    BallpitSimulationPlugin, PointerRegistry, RenderSurface, SceneAction, SceneCommand,
    SpawnBallpit, SurfaceSettings,
};
use bevy::input::touch::TouchInput;
use bevy::mesh::MeshTag;
use bevy::prelude::*;
use bevy::render::storage::ShaderStorageBuffer;
use bevy::time::TimeUpdateStrategy;
use bevy::transform::TransformPlugin;
use bevy::window::{CursorLeft, CursorMoved, WindowOccluded, WindowResized};
use std::time::Duration;

/// `AssetEvent::Modified` count for ball materials since the last reset.
#[derive(Resource, Default)]
struct MaterialWrites(usize);

fn count_material_writes(
    mut events: MessageReader<AssetEvent<BallMaterial>>,
    mut writes: ResMut<MaterialWrites>,
) {
    writes.0 += events
        .read()
        .filter(|e| matches!(e, AssetEvent::Modified { .. }))
        .count();
}

/// Headless app with one window and one surface camera.
fn headless_app() -> (App, Entity, Entity) {
    headless_app_with(Window::default())
}

fn headless_app_with(window: Window) -> (App, Entity, Entity) {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, AssetPlugin::default(), TransformPlugin))
        .init_asset::<Mesh>()
        .init_asset::<BallMaterial>()
        .init_asset::<ShaderStorageBuffer>()
        .init_resource::<MaterialWrites>()
        .add_systems(Last, count_material_writes)
        // Window and input messages normally registered by WindowPlugin/InputPlugin
        .add_message::<WindowResized>()
        .add_message::<WindowOccluded>()
        .add_message::<CursorMoved>()
        .add_message::<CursorLeft>()
        .add_message::<TouchInput>()
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)))
        .add_plugins(BallpitSimulationPlugin);

    let window = app.world_mut().spawn(window).id();
    let surface = app
        .world_mut()
        .spawn((
            Camera3d::default(),
            Transform::from_xyz(0.0, 0.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
            RenderSurface::new(window, SurfaceSettings::default()),
        ))
        .id();

    (app, window, surface)
}

fn small_config(count: usize) -> BallpitConfig {
    let mut config = BallpitConfig {
        seed: Some(11),
        ..Default::default()
    };
    config.simulation.count = count;
    config
}

fn scenes(app: &mut App) -> Vec<Entity> {
    let world = app.world_mut();
    let mut query = world.query_filtered::<Entity, With<BallpitScene>>();
    query.iter(world).collect()
}

fn instance_count(app: &mut App) -> usize {
    let world = app.world_mut();
    let mut query = world.query::<&BallInstance>();
    query.iter(world).count()
}

fn light_count(app: &mut App) -> usize {
    let world = app.world_mut();
    let mut query = world.query::<&BallLight>();
    query.iter(world).count()
}

fn positions(app: &App, scene: Entity) -> Vec<Vec3> {
    app.world()
        .get::<BallpitScene>(scene)
        .map(|s| s.engine().positions().to_vec())
        .unwrap_or_default()
}

fn command(app: &mut App, scene: Entity, action: SceneAction) {
    app.world_mut().write_message(SceneCommand { scene, action });
}

fn scene_ref(app: &App, scene: Entity) -> &BallpitScene {
    app.world().get::<BallpitScene>(scene).unwrap()
}

fn spawn_one(app: &mut App, surface: Entity, config: BallpitConfig) -> Entity {
    app.world_mut().write_message(SpawnBallpit { surface, config });
    app.update();
    scenes(app)[0]
}

#[test]
fn test_spawn_builds_instances_and_registers_pointer() {
    let (mut app, _, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: small_config(30),
    });
    app.update();

    let live = scenes(&mut app);
    assert_eq!(live.len(), 1);
    assert_eq!(instance_count(&mut app), 30);
    assert_eq!(light_count(&mut app), 1);
    assert_eq!(app.world().resource::<PointerRegistry>().listener_count(), 1);
    // One mesh, one material and one tint buffer for the whole scene
    assert_eq!(app.world().resource::<Assets<BallMaterial>>().len(), 1);
    assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);
    assert_eq!(app.world().resource::<Assets<ShaderStorageBuffer>>().len(), 1);

    let world = app.world_mut();
    let mut query = world.query::<(&BallInstance, &MeshTag, &MeshMaterial3d<BallMaterial>)>();
    let mut materials = Vec::new();
    for (instance, tag, material) in query.iter(world) {
        assert_eq!(tag.0 as usize, instance.index);
        materials.push(material.0.id());
    }
    materials.dedup();
    assert_eq!(materials.len(), 1);

    // The box was fitted to the 1280x720 window
    let scene = app.world().get::<BallpitScene>(live[0]).unwrap();
    let metrics = app.world().get::<RenderSurface>(surface).unwrap().metrics();
    assert!((scene.engine().live().max_x - metrics.world_width / 2.0).abs() < 1e-4);
    assert!((scene.engine().live().max_y - metrics.world_height / 2.0).abs() < 1e-4);
}

#[test]
fn test_invalid_requests_spawn_nothing() {
    let (mut app, window, _) = headless_app();

    // Not a camera
    app.world_mut().write_message(SpawnBallpit {
        surface: window,
        config: small_config(10),
    });
    app.update();
    assert!(scenes(&mut app).is_empty());

    // Zero bodies
    let (mut app, _, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: small_config(0),
    });
    app.update();
    assert!(scenes(&mut app).is_empty());
    assert_eq!(instance_count(&mut app), 0);
    assert_eq!(app.world().resource::<PointerRegistry>().listener_count(), 0);
}

#[test]
fn test_set_count_rebuilds_instances() {
    let (mut app, _, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: small_config(30),
    });
    app.update();
    let scene = scenes(&mut app)[0];
    let bounds = app.world().get::<BallpitScene>(scene).unwrap().engine().live();

    command(&mut app, scene, SceneAction::SetCount(12));
    app.update();

    assert_eq!(instance_count(&mut app), 12);
    assert_eq!(light_count(&mut app), 1);
    assert_eq!(app.world().resource::<Assets<BallMaterial>>().len(), 1);
    assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);
    assert_eq!(app.world().resource::<Assets<ShaderStorageBuffer>>().len(), 1);

    let rebuilt = app.world().get::<BallpitScene>(scene).unwrap().engine().live();
    assert_eq!(rebuilt.max_x, bounds.max_x);
    assert_eq!(rebuilt.max_y, bounds.max_y);

    // Invalid count is rejected and the scene keeps running
    command(&mut app, scene, SceneAction::SetCount(0));
    app.update();
    assert_eq!(instance_count(&mut app), 12);
}

#[test]
fn test_pause_freezes_physics() {
    let (mut app, _, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: small_config(20),
    });
    app.update();
    let scene = scenes(&mut app)[0];

    command(&mut app, scene, SceneAction::TogglePause);
    app.update();
    assert!(app.world().get::<BallpitScene>(scene).unwrap().is_paused());

    let frozen = positions(&app, scene);
    for _ in 0..5 {
        app.update();
    }
    assert_eq!(positions(&app, scene), frozen);

    command(&mut app, scene, SceneAction::TogglePause);
    for _ in 0..5 {
        app.update();
    }
    assert_ne!(positions(&app, scene), frozen);
}

#[test]
fn test_occluded_window_suspends_scene() {
    let (mut app, window, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: small_config(20),
    });
    app.update();
    let scene = scenes(&mut app)[0];

    app.world_mut().write_message(WindowOccluded {
        window,
        occluded: true,
    });
    app.update();
    assert!(!app.world().get::<RenderSurface>(surface).unwrap().is_animating());
    assert!(app.world().resource::<Time<Virtual>>().is_paused());

    let frozen = positions(&app, scene);
    for _ in 0..3 {
        app.update();
    }
    assert_eq!(positions(&app, scene), frozen);

    app.world_mut().write_message(WindowOccluded {
        window,
        occluded: false,
    });
    app.update();
    assert!(app.world().get::<RenderSurface>(surface).unwrap().is_animating());
    assert!(!app.world().resource::<Time<Virtual>>().is_paused());
}

#[test]
fn test_double_dispose_is_harmless() {
    let (mut app, _, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: small_config(25),
    });
    app.update();
    let scene = scenes(&mut app)[0];

    command(&mut app, scene, SceneAction::Dispose);
    command(&mut app, scene, SceneAction::Dispose);
    app.update();

    assert!(scenes(&mut app).is_empty());
    assert_eq!(instance_count(&mut app), 0);
    assert_eq!(light_count(&mut app), 0);
    assert_eq!(app.world().resource::<PointerRegistry>().listener_count(), 0);
    assert_eq!(app.world().resource::<Assets<BallMaterial>>().len(), 0);
    assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 0);
    assert_eq!(app.world().resource::<Assets<ShaderStorageBuffer>>().len(), 0);

    // Disposing a scene that is already gone is a logged no-op
    command(&mut app, scene, SceneAction::Dispose);
    app.update();
    assert_eq!(app.world().resource::<PointerRegistry>().listener_count(), 0);
}

#[test]
fn test_scene_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ballpit.json");
    let mut config = small_config(8);
    config.colors = vec!["#FF0000".into(), "#0000FF".into()];
    config.simulation.follow_cursor = false;
    save_config(&config, &path).unwrap();

    let (mut app, _, surface) = headless_app();
    app.world_mut().write_message(SpawnBallpit {
        surface,
        config: load_config(&path).unwrap(),
    });
    app.update();

    let scene = scenes(&mut app)[0];
    let colors = app
        .world()
        .get::<BallpitScene>(scene)
        .unwrap()
        .spheres()
        .unwrap()
        .colors()
        .to_vec();
    assert_eq!(colors.len(), 8);
    assert_eq!(colors[0].to_linear(), LinearRgba::RED);
    assert_eq!(colors[7].to_linear(), LinearRgba::BLUE);

    // Body 0 is hidden when it does not follow the cursor
    let world = app.world_mut();
    let mut query = world.query::<(&BallInstance, &Transform)>();
    let hidden = query
        .iter(world)
        .find(|(instance, _)| instance.index == 0)
        .map(|(_, t)| t.scale)
        .unwrap();
    assert_eq!(hidden, Vec3::ZERO);
}

#[test]
fn test_paused_scene_leaves_material_alone() {
    let (mut app, _, surface) = headless_app();
    let scene = spawn_one(&mut app, surface, small_config(30));
    app.update();

    command(&mut app, scene, SceneAction::TogglePause);
    app.update();

    app.world_mut().resource_mut::<MaterialWrites>().0 = 0;
    for _ in 0..3 {
        app.update();
    }
    assert_eq!(app.world().resource::<MaterialWrites>().0, 0);

    // Running again touches the shared material at most once per frame
    command(&mut app, scene, SceneAction::TogglePause);
    app.update();
    app.world_mut().resource_mut::<MaterialWrites>().0 = 0;
    app.update();
    assert!(app.world().resource::<MaterialWrites>().0 <= 1);
}

#[test]
fn test_set_colors_rewrites_tint_buffer() {
    let (mut app, _, surface) = headless_app();
    let scene = spawn_one(&mut app, surface, small_config(4));

    command(
        &mut app,
        scene,
        SceneAction::SetColors(vec![Color::srgb(0.0, 1.0, 0.0)]),
    );
    app.update();

    let spheres = scene_ref(&app, scene).spheres().unwrap();
    assert!(spheres.colors().iter().all(|c| c.to_linear() == LinearRgba::GREEN));
    let material = app
        .world()
        .resource::<Assets<BallMaterial>>()
        .get(spheres.material())
        .unwrap();
    assert_eq!(material.extension.uniforms.light_color, Vec4::new(0.0, 1.0, 0.0, 1.0));
    let buffer = app
        .world()
        .resource::<Assets<ShaderStorageBuffer>>()
        .get(&material.extension.instance_colors)
        .unwrap();
    // Four vec4<f32> tints
    assert_eq!(buffer.data.as_ref().map(Vec::len), Some(4 * 16));
}

#[test]
fn test_reconfigure_applies_new_layout() {
    let (mut app, _, surface) = headless_app();
    app.world_mut()
        .entity_mut(surface)
        .insert(AmbientLight::default());
    let scene = spawn_one(&mut app, surface, small_config(20));
    let world_height = app
        .world()
        .get::<RenderSurface>(surface)
        .unwrap()
        .metrics()
        .world_height;

    let mut config = small_config(20);
    config.layout.height_fraction = 0.5;
    config.layout.band_offset = 0.25;
    config.ambient_intensity = 123.0;
    command(&mut app, scene, SceneAction::Reconfigure(Box::new(config)));
    app.update();

    let live = scene_ref(&app, scene).engine().live();
    assert!((live.max_y - world_height * 0.25).abs() < 1e-4);
    assert!((scene_ref(&app, scene).group_offset() - world_height * 0.25).abs() < 1e-4);
    let root = app.world().get::<Transform>(scene).unwrap();
    assert!((root.translation.y - world_height * 0.25).abs() < 1e-4);
    for p in scene_ref(&app, scene).engine().positions().iter().skip(1) {
        assert!(p.y.abs() <= live.max_y + 1e-4);
    }
    assert_eq!(app.world().get::<AmbientLight>(surface).unwrap().brightness, 123.0);
}

#[test]
fn test_reconfigure_applies_surface_settings() {
    let (mut app, _, surface) = headless_app();
    let scene = spawn_one(&mut app, surface, small_config(10));
    let before = app.world().get::<RenderSurface>(surface).unwrap().metrics();

    let mut config = small_config(10);
    config.surface.fov_degrees = 30.0;
    config.surface.camera_distance = 10.0;
    command(&mut app, scene, SceneAction::Reconfigure(Box::new(config)));
    for _ in 0..10 {
        app.update();
    }

    let surface_ref = app.world().get::<RenderSurface>(surface).unwrap();
    assert_eq!(surface_ref.settings.camera_distance, 10.0);
    assert!(surface_ref.metrics().world_height < before.world_height);
    let camera = app.world().get::<Transform>(surface).unwrap();
    assert!((camera.translation.z - 10.0).abs() < 1e-4);

    let live = scene_ref(&app, scene).engine().live();
    assert!((live.max_x - surface_ref.metrics().world_width / 2.0).abs() < 1e-4);
}

#[test]
fn test_cursor_drives_body_zero() {
    let (mut app, window, surface) = headless_app();
    let scene = spawn_one(&mut app, surface, small_config(10));
    app.update();

    app.world_mut().write_message(CursorMoved {
        window,
        position: Vec2::new(640.0, 360.0),
        delta: None,
    });
    for _ in 0..30 {
        app.update();
    }
    let engine = scene_ref(&app, scene).engine();
    assert!(engine.control_sphere0());
    assert!(engine.center().length() < 1e-3);
    assert!(engine.positions()[0].length() < 0.5);

    app.world_mut().write_message(CursorLeft { window });
    app.update();
    assert!(!scene_ref(&app, scene).engine().control_sphere0());
}

#[test]
fn test_cursor_target_is_local_to_the_band() {
    let (mut app, window, surface) = headless_app();
    let mut config = small_config(10);
    config.layout.band_offset = 0.25;
    let scene = spawn_one(&mut app, surface, config);
    app.update();

    let metrics = app.world().get::<RenderSurface>(surface).unwrap().metrics();
    assert!((scene_ref(&app, scene).group_offset() - metrics.world_height * 0.25).abs() < 1e-4);

    // Halfway to the top right corner
    app.world_mut().write_message(CursorMoved {
        window,
        position: Vec2::new(960.0, 180.0),
        delta: None,
    });
    for _ in 0..30 {
        app.update();
    }

    let center = scene_ref(&app, scene).engine().center();
    assert!((center.x - metrics.world_width / 4.0).abs() < 1e-3);
    assert!((center.y - (metrics.world_height / 4.0 - metrics.world_height * 0.25)).abs() < 1e-3);
    assert!(center.z.abs() < 1e-3);
}

#[test]
fn test_pixel_ratio_is_reported_not_forced() {
    let mut window = Window::default();
    window.resolution.set_scale_factor(3.0);
    let (mut app, window, surface) = headless_app_with(window);
    app.update();

    let metrics = app.world().get::<RenderSurface>(surface).unwrap().metrics();
    assert_eq!(metrics.pixel_ratio, 2.5);
    let window = app.world().get::<Window>(window).unwrap();
    assert_eq!(window.resolution.scale_factor_override(), None);
    assert_eq!(window.resolution.scale_factor(), 3.0);
}
