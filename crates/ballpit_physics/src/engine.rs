//! Ball-pit body simulation.
//!
//! A deliberately stylized integrator: heavier bodies fall faster, collisions
//! push both bodies apart by half the overlap and kick their velocities by
//! their own speed, and walls reflect with a damping factor. The result reads
//! as floaty glass marbles rather than rigid bodies.
//!
//! # Step order
//!
//! 1. Controlled body 0 eases toward `center` (when enabled)
//! 2. Integration: gravity, friction, velocity clamp, position
//! 3. Constraints: pairwise overlap, push from body 0, wall clamp
//!
//! Collision is O(n²) per step. Body counts are in the tens to low hundreds.

use bevy::math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{LiveTunables, SimulationConfig, SimulationConfigError, SimulationConfigResult};

/// Fraction of the remaining distance body 0 covers per step when controlled.
pub const CONTROL_SMOOTHING: f32 = 0.12;

/// Distance floor used when normalizing the separation between two centers.
pub const COLLISION_EPSILON: f32 = 0.0001;

/// Minimum speed used to scale the velocity kick between two free bodies.
pub const BODY_KICK_FLOOR: f32 = 1.0;

/// Minimum speed used to scale the velocity kick away from body 0.
pub const CONTROLLED_KICK_FLOOR: f32 = 2.0;

/// Fixed-count simulation of spherical bodies.
///
/// Bodies are addressed by index. Index 0 is special: when
/// [`LiveTunables::control_sphere0`] is set it follows [`PhysicsEngine::center`]
/// instead of being simulated.
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    config: SimulationConfig,
    live: LiveTunables,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    sizes: Vec<f32>,
    center: Vec3,
    rng: StdRng,
}

impl PhysicsEngine {
    /// Build an engine seeded from OS entropy.
    pub fn new(config: SimulationConfig) -> SimulationConfigResult<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Build a deterministic engine. Two engines with the same config and seed
    /// produce identical layouts and trajectories.
    pub fn with_seed(config: SimulationConfig, seed: u64) -> SimulationConfigResult<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulationConfig, rng: StdRng) -> SimulationConfigResult<Self> {
        config.validate()?;

        let count = config.count;
        let mut engine = Self {
            live: LiveTunables::from(&config),
            config,
            positions: vec![Vec3::ZERO; count],
            velocities: vec![Vec3::ZERO; count],
            sizes: vec![1.0; count],
            center: Vec3::ZERO,
            rng,
        };
        engine.reinit_positions();
        engine.set_sizes();
        Ok(engine)
    }

    pub fn count(&self) -> usize {
        self.config.count
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn live(&self) -> LiveTunables {
        self.live
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    /// Target point body 0 is pulled toward while controlled.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn control_sphere0(&self) -> bool {
        self.live.control_sphere0
    }

    /// Attach or release body 0. Written by the pointer enter/leave handler.
    pub fn set_control_sphere0(&mut self, enabled: bool) {
        self.live.control_sphere0 = enabled;
    }

    /// Rewrite the X/Y half-extents. Written by the resize handler.
    ///
    /// Bodies are not moved; anything outside the new box is clamped on the
    /// next step. Negative extents collapse to zero; non-finite ones are
    /// rejected and the box is left as it was.
    pub fn set_bounds(&mut self, max_x: f32, max_y: f32) -> SimulationConfigResult<()> {
        if !max_x.is_finite() {
            return Err(SimulationConfigError::NonFinite("max_x"));
        }
        if !max_y.is_finite() {
            return Err(SimulationConfigError::NonFinite("max_y"));
        }
        self.live.max_x = max_x.max(0.0);
        self.live.max_y = max_y.max(0.0);
        Ok(())
    }

    /// Place a single body explicitly.
    pub fn set_body(&mut self, index: usize, position: Vec3, velocity: Vec3) {
        if index < self.positions.len() {
            self.positions[index] = position;
            self.velocities[index] = velocity;
        }
    }

    /// Put body 0 on `center` and scatter the rest uniformly inside the box.
    pub fn reinit_positions(&mut self) {
        let (max_x, max_y, max_z) = (self.live.max_x, self.live.max_y, self.config.max_z);

        if let Some(first) = self.positions.first_mut() {
            *first = self.center;
        }
        for position in self.positions.iter_mut().skip(1) {
            *position = Vec3::new(
                self.rng.gen_range(-max_x..=max_x),
                self.rng.gen_range(-max_y..=max_y),
                self.rng.gen_range(-max_z..=max_z),
            );
        }
    }

    /// `size0` for body 0, uniform in `[min_size, max_size]` for the rest.
    pub fn set_sizes(&mut self) {
        let (min, max) = (self.config.min_size, self.config.max_size);

        if let Some(first) = self.sizes.first_mut() {
            *first = self.config.size0;
        }
        for size in self.sizes.iter_mut().skip(1) {
            *size = self.rng.gen_range(min..=max);
        }
    }

    /// Advance every body by one step.
    pub fn update(&mut self, delta: f32) {
        let start = if self.live.control_sphere0 {
            self.steer_controlled_body();
            1
        } else {
            0
        };

        self.integrate(start, delta);
        self.resolve_constraints(start);
    }

    fn steer_controlled_body(&mut self) {
        if self.positions.is_empty() {
            return;
        }
        self.positions[0] = self.positions[0].lerp(self.center, CONTROL_SMOOTHING);
        self.velocities[0] = Vec3::ZERO;
    }

    fn integrate(&mut self, start: usize, delta: f32) {
        let cfg = &self.config;
        for i in start..self.positions.len() {
            let mut velocity = self.velocities[i];
            velocity.y -= delta * cfg.gravity * self.sizes[i];
            velocity *= cfg.friction;
            velocity = velocity.clamp_length_max(cfg.max_velocity);

            self.positions[i] += velocity;
            self.velocities[i] = velocity;
        }
    }

    fn resolve_constraints(&mut self, start: usize) {
        let count = self.positions.len();
        let controlled = self.live.control_sphere0 && count > 0;
        let controlled_pos = if controlled { self.positions[0] } else { Vec3::ZERO };
        let controlled_size = self.sizes.first().copied().unwrap_or(0.0);

        for i in start..count {
            let mut pos = self.positions[i];
            let mut vel = self.velocities[i];
            let radius = self.sizes[i];

            for j in (i + 1)..count {
                let other_pos = self.positions[j];
                let other_vel = self.velocities[j];
                let separation = other_pos - pos;
                let dist = separation.length();
                let reach = radius + self.sizes[j];
                if dist >= reach {
                    continue;
                }

                let push = separation / dist.max(COLLISION_EPSILON) * (0.5 * (reach - dist));
                let own_kick = push * vel.length().max(BODY_KICK_FLOOR);
                let other_kick = push * other_vel.length().max(BODY_KICK_FLOOR);

                pos -= push;
                vel -= own_kick;
                self.positions[j] = other_pos + push;
                self.velocities[j] = other_vel + other_kick;
            }

            if controlled {
                let separation = controlled_pos - pos;
                let dist = separation.length();
                let reach = radius + controlled_size;
                if dist < reach {
                    let push = separation / dist.max(COLLISION_EPSILON) * (reach - dist);
                    let kick = push * vel.length().max(CONTROLLED_KICK_FLOOR);
                    pos -= push;
                    vel -= kick;
                }
            }

            self.clamp_to_walls(&mut pos, &mut vel, radius);

            self.positions[i] = pos;
            self.velocities[i] = vel;
        }
    }

    fn clamp_to_walls(&self, pos: &mut Vec3, vel: &mut Vec3, radius: f32) {
        let bounce = self.config.wall_bounce;

        if pos.x.abs() + radius > self.live.max_x {
            pos.x = pos.x.signum() * (self.live.max_x - radius);
            vel.x = -vel.x * bounce;
        }

        if self.config.gravity == 0.0 {
            if pos.y.abs() + radius > self.live.max_y {
                pos.y = pos.y.signum() * (self.live.max_y - radius);
                vel.y = -vel.y * bounce;
            }
        } else if pos.y - radius < -self.live.max_y {
            pos.y = -self.live.max_y + radius;
            vel.y = -vel.y * bounce;
        }

        if pos.z.abs() + radius > self.config.max_z {
            pos.z = pos.z.signum() * (self.config.max_z - radius);
            vel.z = -vel.z * bounce;
        }
    }
}
