//! Render surface lifecycle: camera framing, resize handling and the
//! animate/suspend state machine.
//!
//! A [`RenderSurface`] lives on the camera entity and is bound to a window.
//! Each frame runs the surface sets in order:
//!
//! ```text
//! Update:     SurfaceSet::Resize -> SurfaceSet::BeforeRender
//! PostUpdate: SurfaceSet::AfterRender
//! ```
//!
//! Resizes are debounced. Once a burst of `WindowResized` messages settles,
//! the metrics are recomputed and a [`SurfaceResized`] message is written for
//! scenes to react to.
//!
//! Animation runs only while the window is visible on screen (not occluded)
//! and not minimized. When neither surface wants to animate, virtual time is
//! paused and winit drops to reactive low-power updates.

use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::prelude::*;
use bevy::window::{WindowOccluded, WindowResized};
use bevy::winit::{UpdateMode, WinitSettings};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigError, ConfigResult};

/// Ordered hooks around the per-frame scene update.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceSet {
    /// Visibility and debounced resize handling
    Resize,
    /// Scene simulation and instance writes
    BeforeRender,
    /// Bookkeeping after transforms are propagated
    AfterRender,
}

/// Camera and output tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceSettings {
    /// Vertical field of view at aspects inside the clamp band
    pub fov_degrees: f32,
    /// Below this aspect the fov widens to keep the horizontal framing
    pub min_aspect: Option<f32>,
    /// Above this aspect the fov narrows to keep the horizontal framing
    pub max_aspect: Option<f32>,
    pub min_pixel_ratio: f32,
    pub max_pixel_ratio: f32,
    pub resize_debounce_ms: u64,
    /// Camera distance from the origin along +Z
    pub camera_distance: f32,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 50.0,
            min_aspect: None,
            max_aspect: Some(1.5),
            min_pixel_ratio: 1.0,
            max_pixel_ratio: 2.5,
            resize_debounce_ms: 100,
            camera_distance: 20.0,
        }
    }
}

impl SurfaceSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "surface.fov_degrees must be within (0, 180), got {}",
                self.fov_degrees
            )));
        }
        if self.min_pixel_ratio <= 0.0 || self.min_pixel_ratio > self.max_pixel_ratio {
            return Err(ConfigError::Invalid(format!(
                "surface pixel ratio band [{}, {}] is empty",
                self.min_pixel_ratio, self.max_pixel_ratio
            )));
        }
        if let (Some(min), Some(max)) = (self.min_aspect, self.max_aspect) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "surface aspect band [{}, {}] is empty",
                    min, max
                )));
            }
        }
        if self.camera_distance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "surface.camera_distance must be positive, got {}",
                self.camera_distance
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

/// Derived sizes of the surface after a resize.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceMetrics {
    /// Logical width in pixels
    pub width: f32,
    /// Logical height in pixels
    pub height: f32,
    pub aspect: f32,
    /// Effective vertical fov after aspect clamping
    pub fov_degrees: f32,
    /// Device pixel ratio clamped to the settings band. Report only: Bevy
    /// renders at the window's physical size, so the clamp does not change the
    /// render resolution.
    pub pixel_ratio: f32,
    /// Width of the view frustum cross-section at the camera's distance
    pub world_width: f32,
    /// Height of the view frustum cross-section at the camera's distance
    pub world_height: f32,
}

/// Compute framing for a surface of `width` x `height` logical pixels viewed
/// from `distance` units away.
pub fn compute_metrics(
    settings: &SurfaceSettings,
    width: f32,
    height: f32,
    device_pixel_ratio: f32,
    distance: f32,
) -> SurfaceMetrics {
    let aspect = if height > 0.0 { width / height } else { 1.0 };

    let fov_degrees = match (settings.min_aspect, settings.max_aspect) {
        (Some(min), _) if aspect < min => fov_for_aspect(settings.fov_degrees, aspect, min),
        (_, Some(max)) if aspect > max => fov_for_aspect(settings.fov_degrees, aspect, max),
        _ => settings.fov_degrees,
    };

    let world_height = 2.0 * (fov_degrees.to_radians() / 2.0).tan() * distance;

    SurfaceMetrics {
        width,
        height,
        aspect,
        fov_degrees,
        pixel_ratio: device_pixel_ratio
            .clamp(settings.min_pixel_ratio, settings.max_pixel_ratio),
        world_width: world_height * aspect,
        world_height,
    }
}

fn fov_for_aspect(base_fov_degrees: f32, aspect: f32, limit: f32) -> f32 {
    if !(aspect > 0.0 && aspect.is_finite()) || limit <= 0.0 {
        return base_fov_degrees;
    }
    let half_tan = (base_fov_degrees.to_radians() / 2.0).tan() / (aspect / limit);
    2.0 * half_tan.atan().to_degrees()
}

/// Loop start/stop produced by a visibility change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTransition {
    Start,
    Stop,
}

/// Two observed signals and the derived "should animate" flag.
///
/// Level-triggered: every signal re-evaluates the flag and a transition is
/// reported only when it actually flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceVisibility {
    intersecting: bool,
    hidden: bool,
    animating: bool,
}

impl Default for SurfaceVisibility {
    fn default() -> Self {
        Self {
            intersecting: true,
            hidden: false,
            animating: true,
        }
    }
}

impl SurfaceVisibility {
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn is_intersecting(&self) -> bool {
        self.intersecting
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_intersecting(&mut self, intersecting: bool) -> Option<LoopTransition> {
        self.intersecting = intersecting;
        self.reevaluate()
    }

    pub fn set_hidden(&mut self, hidden: bool) -> Option<LoopTransition> {
        self.hidden = hidden;
        self.reevaluate()
    }

    fn reevaluate(&mut self) -> Option<LoopTransition> {
        let should = self.intersecting && !self.hidden;
        if should == self.animating {
            return None;
        }
        self.animating = should;
        Some(if should {
            LoopTransition::Start
        } else {
            LoopTransition::Stop
        })
    }
}

/// Trailing-edge debounce for resize bursts.
///
/// Starts armed so the first tick fires the initial resize.
#[derive(Debug, Clone)]
pub struct ResizeDebounce {
    timer: Timer,
    pending: bool,
    immediate: bool,
}

impl ResizeDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            timer: Timer::new(delay, TimerMode::Once),
            pending: true,
            immediate: true,
        }
    }

    /// Record a raw resize and restart the quiet period.
    pub fn trigger(&mut self) {
        self.pending = true;
        self.timer.reset();
    }

    /// Advance the quiet period; true exactly once per settled burst.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if !self.pending {
            return false;
        }
        if self.immediate {
            self.immediate = false;
            self.pending = false;
            return true;
        }
        self.timer.tick(delta);
        if self.timer.just_finished() {
            self.pending = false;
            return true;
        }
        false
    }
}

/// Pausable frame clock; only advances while the surface animates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    pub elapsed: f32,
    pub delta: f32,
    pub frames: u64,
}

/// Marks the camera that scenes render through.
#[derive(Component, Debug, Clone)]
pub struct RenderSurface {
    /// Window the camera presents into
    pub window: Entity,
    pub settings: SurfaceSettings,
    metrics: SurfaceMetrics,
    visibility: SurfaceVisibility,
    debounce: ResizeDebounce,
    clock: FrameClock,
}

impl RenderSurface {
    pub fn new(window: Entity, settings: SurfaceSettings) -> Self {
        Self {
            window,
            debounce: ResizeDebounce::new(settings.debounce()),
            settings,
            metrics: SurfaceMetrics::default(),
            visibility: SurfaceVisibility::default(),
            clock: FrameClock::default(),
        }
    }

    pub fn metrics(&self) -> SurfaceMetrics {
        self.metrics
    }

    pub fn visibility(&self) -> SurfaceVisibility {
        self.visibility
    }

    pub fn is_animating(&self) -> bool {
        self.visibility.is_animating()
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    /// Swap in new settings. Metrics are recomputed on the next settled
    /// resize; returns false if nothing changed.
    pub fn set_settings(&mut self, settings: SurfaceSettings) -> bool {
        if self.settings == settings {
            return false;
        }
        self.settings = settings;
        self.debounce = ResizeDebounce::new(settings.debounce());
        self.debounce.trigger();
        true
    }
}

/// After-resize hook.
#[derive(Message, Debug, Clone, Copy)]
pub struct SurfaceResized {
    /// Camera entity carrying the [`RenderSurface`]
    pub surface: Entity,
    pub metrics: SurfaceMetrics,
}

/// Spawn a perspective camera looking at the origin from `+Z` and bind it to
/// `window`.
pub fn spawn_surface_camera(
    commands: &mut Commands,
    window: Entity,
    settings: SurfaceSettings,
    ambient: AmbientLight,
) -> Entity {
    commands
        .spawn((
            Camera3d::default(),
            Projection::Perspective(PerspectiveProjection {
                fov: settings.fov_degrees.to_radians(),
                ..default()
            }),
            Tonemapping::AcesFitted,
            Transform::from_xyz(0.0, 0.0, settings.camera_distance).looking_at(Vec3::ZERO, Vec3::Y),
            ambient,
            RenderSurface::new(window, settings),
        ))
        .id()
}

/// Plugin that drives every [`RenderSurface`].
pub struct SurfacePlugin;

impl Plugin for SurfacePlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<SurfaceResized>()
            .configure_sets(Update, (SurfaceSet::Resize, SurfaceSet::BeforeRender).chain())
            .configure_sets(PostUpdate, SurfaceSet::AfterRender)
            .add_systems(
                Update,
                (observe_windows, apply_resizes, tick_frame_clock)
                    .chain()
                    .in_set(SurfaceSet::Resize),
            )
            .add_systems(PostUpdate, count_frames.in_set(SurfaceSet::AfterRender));
    }
}

/// Feed occlusion and size signals into each surface's state machine and
/// debounce.
fn observe_windows(
    mut occluded: MessageReader<WindowOccluded>,
    mut resized: MessageReader<WindowResized>,
    mut surfaces: Query<&mut RenderSurface>,
    mut time: ResMut<Time<Virtual>>,
    winit: Option<ResMut<WinitSettings>>,
) {
    let mut changed = false;

    for event in occluded.read() {
        for mut surface in surfaces.iter_mut().filter(|s| s.window == event.window) {
            if let Some(transition) = surface.visibility.set_intersecting(!event.occluded) {
                info!("Surface {:?} {:?} (occluded: {})", event.window, transition, event.occluded);
                changed = true;
            }
        }
    }

    for event in resized.read() {
        let minimized = event.width <= 0.0 || event.height <= 0.0;
        for mut surface in surfaces.iter_mut().filter(|s| s.window == event.window) {
            if let Some(transition) = surface.visibility.set_hidden(minimized) {
                info!("Surface {:?} {:?} (minimized: {})", event.window, transition, minimized);
                changed = true;
            }
            if !minimized {
                surface.debounce.trigger();
            }
        }
    }

    if !changed {
        return;
    }

    let any_animating = surfaces.iter().any(|s| s.is_animating());
    if any_animating {
        time.unpause();
    } else {
        time.pause();
    }
    if let Some(mut winit) = winit {
        winit.focused_mode = if any_animating {
            UpdateMode::Continuous
        } else {
            UpdateMode::reactive_low_power(Duration::from_secs(1))
        };
        winit.unfocused_mode = winit.focused_mode;
    }
}

/// Recompute metrics once a resize burst has settled and fire the hook.
fn apply_resizes(
    real_time: Res<Time<Real>>,
    mut surfaces: Query<(Entity, &mut RenderSurface, &Transform, Option<&mut Projection>)>,
    windows: Query<&Window>,
    mut writer: MessageWriter<SurfaceResized>,
) {
    for (entity, mut surface, transform, projection) in surfaces.iter_mut() {
        if !surface.debounce.tick(real_time.delta()) {
            continue;
        }
        let Ok(window) = windows.get(surface.window) else {
            warn!("Surface {:?} lost its window {:?}", entity, surface.window);
            continue;
        };

        let metrics = compute_metrics(
            &surface.settings,
            window.width(),
            window.height(),
            window.resolution.base_scale_factor(),
            transform.translation.length(),
        );

        if let Some(mut projection) = projection {
            if let Projection::Perspective(perspective) = projection.as_mut() {
                perspective.fov = metrics.fov_degrees.to_radians();
            }
        }

        debug!(
            "Surface {:?} resized: {}x{} world {:.2}x{:.2} fov {:.1}",
            entity,
            metrics.width,
            metrics.height,
            metrics.world_width,
            metrics.world_height,
            metrics.fov_degrees
        );
        surface.metrics = metrics;
        writer.write(SurfaceResized {
            surface: entity,
            metrics,
        });
    }
}

fn tick_frame_clock(time: Res<Time>, mut surfaces: Query<&mut RenderSurface>) {
    for mut surface in surfaces.iter_mut() {
        if surface.is_animating() {
            surface.clock.delta = time.delta_secs();
            surface.clock.elapsed += surface.clock.delta;
        } else {
            surface.clock.delta = 0.0;
        }
    }
}

fn count_frames(mut surfaces: Query<&mut RenderSurface>) {
    for mut surface in surfaces.iter_mut().filter(|s| s.is_animating()) {
        surface.clock.frames += 1;
    }
}
