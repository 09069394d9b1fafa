//! Pure simulation core for the ball-pit scene.
//!
//! No ECS and no rendering: just bodies, tunables and a step function. The
//! scene layer in `ballpit_core` owns one [`PhysicsEngine`] per scene and
//! copies its state into instance transforms every frame.

pub mod config;
pub mod engine;

pub use config::{LiveTunables, SimulationConfig, SimulationConfigError, SimulationConfigResult};
pub use engine::{
    PhysicsEngine, BODY_KICK_FLOOR, COLLISION_EPSILON, CONTROLLED_KICK_FLOOR, CONTROL_SMOOTHING,
};
