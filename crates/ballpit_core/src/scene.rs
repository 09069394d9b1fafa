//! Scene factory and per-frame scene driving.
//!
//! A scene is a root entity with a [`BallpitScene`] component. It owns one
//! [`PhysicsEngine`], the sphere instances parented under the root, and the
//! small amount of interaction state (cursor tween, pause, dispose).
//!
//! Scenes are created by writing [`SpawnBallpit`] and controlled through
//! [`SceneCommand`]. All systems run inside [`SurfaceSet::BeforeRender`]:
//!
//! ```text
//! spawn -> commands -> resize -> pointer targets -> advance -> sync
//! ```

use ballpit_physics::{PhysicsEngine, SimulationConfig, SimulationConfigError};
use bevy::prelude::*;

use crate::config::{BallpitConfig, ConfigError, SceneLayout};
use crate::material::BallMaterial;
use crate::pointer::{PointerEvent, PointerEventKind, PointerRegistry};
use crate::spheres::{BallInstance, BallLight, SphereAssets, SphereInstances};
use crate::surface::{RenderSurface, SurfaceMetrics, SurfaceResized, SurfaceSet};

/// Request to build a scene rendering through `surface`.
#[derive(Message, Debug, Clone)]
pub struct SpawnBallpit {
    /// Camera entity carrying a [`RenderSurface`]
    pub surface: Entity,
    pub config: BallpitConfig,
}

/// Runtime control of a live scene.
#[derive(Message, Debug, Clone)]
pub struct SceneCommand {
    pub scene: Entity,
    pub action: SceneAction,
}

#[derive(Debug, Clone)]
pub enum SceneAction {
    /// Rebuild with a different body count
    SetCount(usize),
    /// Suspend or resume physics; rendering keeps going
    TogglePause,
    SetColors(Vec<Color>),
    /// Rebuild from a new config, keeping the live bounds
    Reconfigure(Box<BallpitConfig>),
    Dispose,
}

/// Error raised while building or driving a scene.
#[derive(Debug)]
pub enum SceneError {
    Config(ConfigError),
    /// Surface entity has no camera or no `RenderSurface`
    MissingSurface(Entity),
    /// Surface is bound to a window that does not exist
    MissingWindow(Entity),
    AlreadyDisposed(Entity),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::Config(e) => write!(f, "Config error: {}", e),
            SceneError::MissingSurface(e) => {
                write!(f, "Entity {:?} is not a camera with a RenderSurface", e)
            }
            SceneError::MissingWindow(e) => write!(f, "Window {:?} does not exist", e),
            SceneError::AlreadyDisposed(e) => write!(f, "Scene {:?} is already disposed", e),
        }
    }
}

impl std::error::Error for SceneError {}

impl From<ConfigError> for SceneError {
    fn from(e: ConfigError) -> Self {
        SceneError::Config(e)
    }
}

impl From<SimulationConfigError> for SceneError {
    fn from(e: SimulationConfigError) -> Self {
        SceneError::Config(ConfigError::Simulation(e))
    }
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Quadratic ease-out of the cursor target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterTween {
    from: Vec3,
    to: Vec3,
    elapsed: f32,
    duration: f32,
}

impl CenterTween {
    pub fn new(from: Vec3, to: Vec3, duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.to
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Advance by `delta` seconds and return the eased position.
    pub fn advance(&mut self, delta: f32) -> Vec3 {
        self.elapsed = (self.elapsed + delta).min(self.duration);
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = self.elapsed / self.duration;
        let eased = 1.0 - (1.0 - t) * (1.0 - t);
        self.from.lerp(self.to, eased)
    }
}

/// Outcome of fitting a scene to new surface metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsUpdate {
    pub max_x: f32,
    pub max_y: f32,
    /// Vertical offset of the scene root
    pub group_offset: f32,
    /// Bodies were rescattered
    pub reinit: bool,
}

/// Fit the box to a `world_width` x `world_height` cross-section.
pub fn plan_bounds(
    layout: &SceneLayout,
    current_x: f32,
    current_y: f32,
    world_width: f32,
    world_height: f32,
) -> BoundsUpdate {
    let max_x = world_width / 2.0;
    let max_y = world_height * layout.height_fraction / 2.0;
    let reinit = relative_change(current_x, max_x) >= layout.reinit_threshold
        || relative_change(current_y, max_y) >= layout.reinit_threshold;

    BoundsUpdate {
        max_x,
        max_y,
        group_offset: world_height * layout.band_offset,
        reinit,
    }
}

fn relative_change(old: f32, new: f32) -> f32 {
    if old <= 0.0 {
        return f32::INFINITY;
    }
    (new - old).abs() / old
}

/// Cast a pointer at `ndc` from a perspective camera onto the camera-facing
/// plane through the world origin.
pub fn project_pointer(
    camera: &GlobalTransform,
    fov_y_radians: f32,
    aspect: f32,
    ndc: Vec2,
) -> Option<Vec3> {
    let half_tan = (fov_y_radians / 2.0).tan();
    let view_dir = Vec3::new(ndc.x * half_tan * aspect, ndc.y * half_tan, -1.0);
    let direction = Dir3::new(camera.rotation() * view_dir).ok()?;
    let ray = Ray3d::new(camera.translation(), direction);
    let plane = InfinitePlane3d {
        normal: camera.back(),
    };
    let distance = ray.intersect_plane(Vec3::ZERO, plane)?;
    Some(ray.get_point(distance))
}

/// One live ball pit.
#[derive(Component, Debug)]
pub struct BallpitScene {
    engine: PhysicsEngine,
    config: BallpitConfig,
    surface: Entity,
    spheres: Option<SphereInstances>,
    tween: Option<CenterTween>,
    paused: bool,
    disposed: bool,
    group_offset: f32,
}

impl BallpitScene {
    pub fn new(engine: PhysicsEngine, config: BallpitConfig, surface: Entity) -> Self {
        Self {
            engine,
            config,
            surface,
            spheres: None,
            tween: None,
            paused: false,
            disposed: false,
            group_offset: 0.0,
        }
    }

    pub fn engine(&self) -> &PhysicsEngine {
        &self.engine
    }

    pub fn config(&self) -> &BallpitConfig {
        &self.config
    }

    pub fn surface(&self) -> Entity {
        self.surface
    }

    pub fn spheres(&self) -> Option<&SphereInstances> {
        self.spheres.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn group_offset(&self) -> f32 {
        self.group_offset
    }

    /// Flip the pause flag and return the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Fit the engine box to new surface metrics, rescattering the bodies if
    /// the box changed enough.
    pub fn apply_resize(&mut self, metrics: &SurfaceMetrics) -> BoundsUpdate {
        let live = self.engine.live();
        let update = plan_bounds(
            &self.config.layout,
            live.max_x,
            live.max_y,
            metrics.world_width,
            metrics.world_height,
        );

        if let Err(e) = self.engine.set_bounds(update.max_x, update.max_y) {
            warn!("Keeping box {:.2} x {:.2}: {}", live.max_x, live.max_y, e);
            return BoundsUpdate {
                max_x: live.max_x,
                max_y: live.max_y,
                group_offset: self.group_offset,
                reinit: false,
            };
        }
        if update.reinit {
            self.engine.reinit_positions();
        }
        self.group_offset = update.group_offset;
        update
    }

    /// Ease the controlled body toward `point` (scene-local).
    pub fn retarget(&mut self, point: Vec3) {
        let from = self.engine.center();
        self.tween = Some(CenterTween::new(from, point, self.config.cursor_tween_secs));
        self.engine.set_control_sphere0(true);
    }

    /// Hand body 0 back to the simulation.
    pub fn release(&mut self) {
        self.engine.set_control_sphere0(false);
    }

    /// Run one step unless paused. Returns whether the engine moved.
    pub fn advance(&mut self, delta: f32) -> bool {
        if self.paused || self.disposed {
            return false;
        }
        if let Some(tween) = self.tween.as_mut() {
            let center = tween.advance(delta);
            self.engine.set_center(center);
            if tween.is_finished() {
                self.tween = None;
            }
        }
        self.engine.update(delta);
        true
    }

    /// Unregister from the pointer registry. Only the first call does
    /// anything.
    pub fn mark_disposed(&mut self, owner: Entity, registry: &mut PointerRegistry) -> SceneResult<()> {
        if self.disposed {
            return Err(SceneError::AlreadyDisposed(owner));
        }
        registry.unregister(owner);
        self.disposed = true;
        Ok(())
    }

    /// Replace the engine and instances with ones built from `config`. The
    /// live bounds, cursor target and control flag carry over; the caller
    /// refits the box if the layout changed.
    pub fn rebuild(
        &mut self,
        root: Entity,
        config: BallpitConfig,
        commands: &mut Commands,
        assets: &mut SphereAssets,
    ) -> SceneResult<()> {
        config.validate()?;
        let palette = config.palette()?;
        let live = self.engine.live();

        let mut simulation = config.simulation.clone();
        simulation.max_x = live.max_x;
        simulation.max_y = live.max_y;
        let mut engine = build_engine(simulation, config.seed)?;
        engine.set_center(self.engine.center());
        engine.set_control_sphere0(live.control_sphere0 && config.simulation.follow_cursor);
        engine.reinit_positions();

        if let Some(old) = self.spheres.take() {
            old.despawn(commands, assets);
        }
        self.spheres = Some(SphereInstances::spawn(
            commands, root, &engine, &config, &palette, assets,
        ));
        self.engine = engine;
        self.config = config;
        Ok(())
    }
}

fn build_engine(simulation: SimulationConfig, seed: Option<u64>) -> SceneResult<PhysicsEngine> {
    let engine = match seed {
        Some(seed) => PhysicsEngine::with_seed(simulation, seed)?,
        None => PhysicsEngine::new(simulation)?,
    };
    Ok(engine)
}

/// Builds and drives every [`BallpitScene`].
pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<SpawnBallpit>()
            .add_message::<SceneCommand>()
            .add_systems(
                Update,
                (
                    spawn_requested_scenes,
                    handle_scene_commands,
                    apply_surface_resizes,
                    apply_pointer_targets,
                    advance_scenes,
                    sync_instances,
                )
                    .chain()
                    .in_set(SurfaceSet::BeforeRender),
            );
    }
}

fn spawn_requested_scenes(
    mut requests: MessageReader<SpawnBallpit>,
    mut commands: Commands,
    surfaces: Query<&RenderSurface, With<Camera>>,
    windows: Query<&Window>,
    mut registry: ResMut<PointerRegistry>,
    mut assets: SphereAssets,
) {
    for request in requests.read() {
        match spawn_scene(
            request,
            &mut commands,
            &surfaces,
            &windows,
            &mut registry,
            &mut assets,
        ) {
            Ok(root) => info!(
                "Spawned ball pit {:?} with {} bodies on surface {:?}",
                root, request.config.simulation.count, request.surface
            ),
            Err(e) => error!("Failed to spawn ball pit: {}", e),
        }
    }
}

fn spawn_scene(
    request: &SpawnBallpit,
    commands: &mut Commands,
    surfaces: &Query<&RenderSurface, With<Camera>>,
    windows: &Query<&Window>,
    registry: &mut PointerRegistry,
    assets: &mut SphereAssets,
) -> SceneResult<Entity> {
    let config = request.config.clone();
    config.validate()?;
    let palette = config.palette()?;

    let surface = surfaces
        .get(request.surface)
        .map_err(|_| SceneError::MissingSurface(request.surface))?;
    let window = windows
        .get(surface.window)
        .map_err(|_| SceneError::MissingWindow(surface.window))?;

    let engine = build_engine(config.simulation.clone(), config.seed)?;
    let mut scene = BallpitScene::new(engine, config, request.surface);

    // The surface may already be sized; later resizes arrive as messages.
    let metrics = surface.metrics();
    if metrics.world_width > 0.0 && metrics.world_height > 0.0 {
        scene.apply_resize(&metrics);
    }

    let root = commands
        .spawn((
            Name::new("Ballpit"),
            Transform::from_xyz(0.0, scene.group_offset, 0.0),
            Visibility::default(),
        ))
        .id();
    scene.spheres = Some(SphereInstances::spawn(
        commands,
        root,
        &scene.engine,
        &scene.config,
        &palette,
        assets,
    ));
    commands.entity(root).insert(scene);

    registry.register(
        root,
        surface.window,
        Rect::new(0.0, 0.0, window.width(), window.height()),
    );
    Ok(root)
}

fn handle_scene_commands(
    mut reader: MessageReader<SceneCommand>,
    mut commands: Commands,
    mut scenes: Query<(&mut BallpitScene, &mut Transform)>,
    mut surfaces: SurfaceAccess,
    mut lights: Query<&mut PointLight, With<BallLight>>,
    mut registry: ResMut<PointerRegistry>,
    mut assets: SphereAssets,
) {
    for command in reader.read() {
        let root = command.scene;
        let Ok((mut scene, mut transform)) = scenes.get_mut(root) else {
            warn!("Scene {:?} does not exist, ignoring {:?}", root, command.action);
            continue;
        };
        if scene.disposed {
            debug!("Scene {:?} is disposed, ignoring {:?}", root, command.action);
            continue;
        }

        match &command.action {
            SceneAction::TogglePause => {
                let paused = scene.toggle_pause();
                info!("Scene {:?} {}", root, if paused { "paused" } else { "resumed" });
            }
            SceneAction::SetCount(count) => {
                let mut config = scene.config.clone();
                config.simulation.count = *count;
                match scene.rebuild(root, config, &mut commands, &mut assets) {
                    Ok(()) => {
                        refit_scene(&mut scene, &mut transform, &mut surfaces);
                        info!("Scene {:?} rebuilt with {} bodies", root, count);
                    }
                    Err(e) => error!("Scene {:?} rejected count {}: {}", root, count, e),
                }
            }
            SceneAction::Reconfigure(config) => {
                match scene.rebuild(root, (**config).clone(), &mut commands, &mut assets) {
                    Ok(()) => {
                        refit_scene(&mut scene, &mut transform, &mut surfaces);
                        info!("Scene {:?} reconfigured", root);
                    }
                    Err(e) => error!("Scene {:?} rejected new config: {}", root, e),
                }
            }
            SceneAction::SetColors(palette) => {
                if palette.is_empty() {
                    warn!("Scene {:?} ignoring empty palette", root);
                    continue;
                }
                let scene = &mut *scene;
                let Some(spheres) = scene.spheres.as_mut() else {
                    continue;
                };
                let lead = spheres.set_colors(palette, &mut assets);
                if let Ok(mut light) = lights.get_mut(spheres.light()) {
                    light.color = lead;
                }
                scene.config.colors = palette.iter().map(|c| c.to_srgba().to_hex()).collect();
                debug!("Scene {:?} recolored with {} stops", root, palette.len());
            }
            SceneAction::Dispose => {
                match scene.mark_disposed(root, &mut registry) {
                    Ok(()) => {
                        if let Some(spheres) = scene.spheres.take() {
                            spheres.release_assets(&mut assets);
                        }
                        commands.entity(root).despawn();
                        info!("Scene {:?} disposed", root);
                    }
                    Err(e) => debug!("{}", e),
                }
            }
        }
    }
}

/// Surface cameras as seen from a scene command.
type SurfaceAccess<'w, 's> = Query<
    'w,
    's,
    (&'static mut RenderSurface, &'static mut Transform, Option<&'static mut AmbientLight>),
    Without<BallpitScene>,
>;

/// Push a freshly rebuilt config out to the root transform and the surface:
/// layout band, ambient light and camera settings.
fn refit_scene(
    scene: &mut BallpitScene,
    transform: &mut Transform,
    surfaces: &mut SurfaceAccess,
) {
    let Ok((mut surface, mut camera, ambient)) = surfaces.get_mut(scene.surface) else {
        return;
    };

    let settings = scene.config.surface;
    let distance = surface.settings.camera_distance;
    if surface.set_settings(settings) {
        if settings.camera_distance != distance {
            *camera = Transform::from_xyz(0.0, 0.0, settings.camera_distance)
                .looking_at(Vec3::ZERO, Vec3::Y);
        }
        debug!("Surface {:?} picked up new settings", scene.surface);
    }

    let metrics = surface.metrics();
    if metrics.world_width > 0.0 && metrics.world_height > 0.0 {
        let update = scene.apply_resize(&metrics);
        transform.translation.y = update.group_offset;
    }

    if let Some(mut ambient) = ambient {
        match scene.config.ambient() {
            Ok(color) => {
                ambient.color = color;
                ambient.brightness = scene.config.ambient_intensity;
            }
            Err(e) => warn!("Keeping ambient light: {}", e),
        }
    }
}

fn apply_surface_resizes(
    mut reader: MessageReader<SurfaceResized>,
    mut scenes: Query<(Entity, &mut BallpitScene, &mut Transform)>,
    mut registry: ResMut<PointerRegistry>,
) {
    for resized in reader.read() {
        for (root, mut scene, mut transform) in scenes.iter_mut() {
            if scene.surface != resized.surface || scene.disposed {
                continue;
            }
            let update = scene.apply_resize(&resized.metrics);
            transform.translation.y = update.group_offset;
            registry.set_bounds(
                root,
                Rect::new(0.0, 0.0, resized.metrics.width, resized.metrics.height),
            );
            if update.reinit {
                info!(
                    "Scene {:?} box is now {:.2} x {:.2}, bodies rescattered",
                    root, update.max_x, update.max_y
                );
            }
        }
    }
}

/// Cast pointer moves onto the camera-facing plane through the origin.
fn apply_pointer_targets(
    mut reader: MessageReader<PointerEvent>,
    mut scenes: Query<&mut BallpitScene>,
    cameras: Query<(&RenderSurface, &GlobalTransform)>,
) {
    for event in reader.read() {
        let Ok(mut scene) = scenes.get_mut(event.owner) else {
            continue;
        };
        match event.kind {
            PointerEventKind::Move => {
                if !scene.config.simulation.follow_cursor {
                    continue;
                }
                let Ok((surface, camera)) = cameras.get(scene.surface) else {
                    continue;
                };
                let metrics = surface.metrics();
                let Some(hit) = project_pointer(
                    camera,
                    metrics.fov_degrees.to_radians(),
                    metrics.aspect,
                    event.ndc,
                ) else {
                    continue;
                };
                let target = hit - Vec3::Y * scene.group_offset;
                scene.retarget(target);
            }
            PointerEventKind::Leave => scene.release(),
            PointerEventKind::Enter | PointerEventKind::Click => {
                debug!("Pointer {:?} on scene {:?}", event.kind, event.owner);
            }
        }
    }
}

fn advance_scenes(surfaces: Query<&RenderSurface>, mut scenes: Query<&mut BallpitScene>) {
    for mut scene in scenes.iter_mut() {
        let Ok(surface) = surfaces.get(scene.surface) else {
            continue;
        };
        if !surface.is_animating() {
            continue;
        }
        scene.advance(surface.clock().delta);
    }
}

fn sync_instances(
    mut scenes: Query<(&mut BallpitScene, &GlobalTransform)>,
    mut transforms: Query<&mut Transform, With<BallInstance>>,
    mut lights: Query<&mut Transform, (With<BallLight>, Without<BallInstance>)>,
    mut materials: ResMut<Assets<BallMaterial>>,
) {
    for (mut scene, root_transform) in scenes.iter_mut() {
        let scene = &mut *scene;
        if scene.disposed {
            continue;
        }
        let Some(spheres) = scene.spheres.as_mut() else {
            continue;
        };
        let lead = spheres.write_transforms(&scene.engine, &mut transforms);
        if let Ok(mut light) = lights.get_mut(spheres.light()) {
            light.translation = lead;
        }
        spheres.set_light_position(root_transform.transform_point(lead), &mut materials);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> Entity {
        World::new().spawn_empty().id()
    }

    fn seeded_scene() -> BallpitScene {
        let config = BallpitConfig {
            seed: Some(7),
            ..Default::default()
        };
        let engine = build_engine(config.simulation.clone(), config.seed).unwrap();
        BallpitScene::new(engine, config, entity())
    }

    fn metrics(world_width: f32, world_height: f32) -> SurfaceMetrics {
        SurfaceMetrics {
            world_width,
            world_height,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_resize_keeps_positions() {
        let mut scene = seeded_scene();
        let before = scene.engine().positions().to_vec();

        // 5.0 -> 5.25 on X, Y unchanged: 5% change
        let update = scene.apply_resize(&metrics(10.5, 10.0));

        assert!(!update.reinit);
        assert_eq!(scene.engine().positions(), before.as_slice());
        assert_eq!(scene.engine().live().max_x, 5.25);
        assert_eq!(scene.engine().live().max_y, 5.0);
    }

    #[test]
    fn test_large_resize_rescatters() {
        let mut scene = seeded_scene();
        let before = scene.engine().positions().to_vec();

        // 5.0 -> 7.0 on X: 40% change
        let update = scene.apply_resize(&metrics(14.0, 10.0));

        assert!(update.reinit);
        assert_ne!(scene.engine().positions(), before.as_slice());
        for p in scene.engine().positions().iter().skip(1) {
            assert!(p.x.abs() <= 7.0 && p.y.abs() <= 5.0);
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let layout = SceneLayout::default();
        // 5.0 -> 6.0 is exactly 20%
        assert!(plan_bounds(&layout, 5.0, 5.0, 12.0, 10.0).reinit);
        assert!(!plan_bounds(&layout, 5.0, 5.0, 11.8, 10.0).reinit);
    }

    #[test]
    fn test_zero_bounds_always_reinit() {
        let update = plan_bounds(&SceneLayout::default(), 0.0, 5.0, 10.0, 10.0);
        assert!(update.reinit);
    }

    #[test]
    fn test_layout_band() {
        let layout = SceneLayout {
            height_fraction: 0.5,
            band_offset: 0.25,
            reinit_threshold: 0.2,
        };
        let update = plan_bounds(&layout, 5.0, 5.0, 20.0, 16.0);
        assert_eq!(update.max_x, 10.0);
        assert_eq!(update.max_y, 4.0);
        assert_eq!(update.group_offset, 4.0);
    }

    #[test]
    fn test_double_dispose_is_noop() {
        let mut scene = seeded_scene();
        let owner = entity();
        let window = entity();
        let mut registry = PointerRegistry::default();
        registry.register(owner, window, Rect::new(0.0, 0.0, 10.0, 10.0));

        assert!(scene.mark_disposed(owner, &mut registry).is_ok());
        assert_eq!(registry.listener_count(), 0);
        assert!(matches!(
            scene.mark_disposed(owner, &mut registry),
            Err(SceneError::AlreadyDisposed(_))
        ));
        assert_eq!(registry.listener_count(), 0);
        assert!(scene.is_disposed());
    }

    #[test]
    fn test_pause_freezes_engine() {
        let mut scene = seeded_scene();
        assert!(scene.toggle_pause());
        let before = scene.engine().positions().to_vec();

        assert!(!scene.advance(0.016));
        assert_eq!(scene.engine().positions(), before.as_slice());

        assert!(!scene.toggle_pause());
        assert!(scene.advance(0.016));
    }

    #[test]
    fn test_non_finite_metrics_keep_the_box() {
        let mut scene = seeded_scene();
        scene.apply_resize(&metrics(10.0, 10.0));
        let before = scene.engine().positions().to_vec();

        let update = scene.apply_resize(&metrics(f32::NAN, 10.0));

        assert!(!update.reinit);
        assert_eq!(update.max_x, 5.0);
        assert_eq!(scene.engine().live().max_x, 5.0);
        assert_eq!(scene.engine().positions(), before.as_slice());
    }

    #[test]
    fn test_pointer_projects_onto_origin_plane() {
        let camera = GlobalTransform::from(
            Transform::from_xyz(0.0, 0.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
        );
        let fov = 50f32.to_radians();
        let half_height = (fov / 2.0).tan() * 20.0;

        let center = project_pointer(&camera, fov, 2.0, Vec2::ZERO).unwrap();
        assert!(center.length() < 1e-4);

        let corner = project_pointer(&camera, fov, 2.0, Vec2::new(1.0, -1.0)).unwrap();
        assert!((corner.x - half_height * 2.0).abs() < 1e-3);
        assert!((corner.y + half_height).abs() < 1e-3);
        assert!(corner.z.abs() < 1e-4);
    }

    #[test]
    fn test_tween_eases_out() {
        let mut tween = CenterTween::new(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0);
        let half = tween.advance(0.5);
        // Quadratic ease-out covers 75% of the way at the midpoint
        assert!((half.x - 7.5).abs() < 1e-5);
        assert!(!tween.is_finished());

        let end = tween.advance(2.0);
        assert_eq!(end, tween.target());
        assert!(tween.is_finished());
    }

    #[test]
    fn test_zero_duration_tween_snaps() {
        let mut tween = CenterTween::new(Vec3::ZERO, Vec3::ONE, 0.0);
        assert_eq!(tween.advance(0.0), Vec3::ONE);
        assert!(tween.is_finished());
    }

    #[test]
    fn test_retarget_takes_control() {
        let mut scene = seeded_scene();
        scene.retarget(Vec3::new(2.0, 1.0, 0.0));
        assert!(scene.engine().control_sphere0());

        for _ in 0..60 {
            scene.advance(1.0 / 60.0);
        }
        assert_eq!(scene.engine().center(), Vec3::new(2.0, 1.0, 0.0));

        scene.release();
        assert!(!scene.engine().control_sphere0());
    }
}
