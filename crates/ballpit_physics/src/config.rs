//! Simulation tunables and their validation.

use serde::{Deserialize, Serialize};

/// Per-engine simulation configuration.
///
/// Everything here is fixed for the lifetime of one [`crate::PhysicsEngine`]
/// except the fields mirrored into [`LiveTunables`], which the engine copies at
/// construction and lets callers rewrite afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of bodies. Changing it requires a new engine.
    pub count: usize,
    /// Initial half-extent on X (rewritten on resize)
    pub max_x: f32,
    /// Initial half-extent on Y (rewritten on resize)
    pub max_y: f32,
    /// Half-extent on Z
    pub max_z: f32,
    /// Smallest radius for bodies 1..count
    pub min_size: f32,
    /// Largest radius for bodies 1..count
    pub max_size: f32,
    /// Radius of body 0
    pub size0: f32,
    /// Downward pull, scaled by each body's radius
    pub gravity: f32,
    /// Per-step velocity damping multiplier
    pub friction: f32,
    /// Velocity multiplier applied when a wall reflects a body
    pub wall_bounce: f32,
    /// Per-step displacement cap
    pub max_velocity: f32,
    /// Start with body 0 attached to the pointer target
    pub control_sphere0: bool,
    /// Body 0 tracks the pointer; when false it is hidden
    pub follow_cursor: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            count: 200,
            max_x: 5.0,
            max_y: 5.0,
            max_z: 2.0,
            min_size: 0.5,
            max_size: 1.0,
            size0: 1.0,
            gravity: 0.5,
            friction: 0.9975,
            wall_bounce: 0.95,
            max_velocity: 0.15,
            control_sphere0: false,
            follow_cursor: true,
        }
    }
}

impl SimulationConfig {
    /// Zero-gravity preset: bodies float and bounce off both ceiling and floor.
    pub fn zero_gravity() -> Self {
        Self {
            gravity: 0.0,
            friction: 0.9995,
            wall_bounce: 1.0,
            ..Default::default()
        }
    }

    /// Reject configurations that would produce NaN or degenerate boxes.
    pub fn validate(&self) -> SimulationConfigResult<()> {
        if self.count == 0 {
            return Err(SimulationConfigError::ZeroCount);
        }

        let finite = [
            ("max_x", self.max_x),
            ("max_y", self.max_y),
            ("max_z", self.max_z),
            ("min_size", self.min_size),
            ("max_size", self.max_size),
            ("size0", self.size0),
            ("gravity", self.gravity),
            ("friction", self.friction),
            ("wall_bounce", self.wall_bounce),
            ("max_velocity", self.max_velocity),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(SimulationConfigError::NonFinite(name));
            }
        }

        for (name, value) in [
            ("max_x", self.max_x),
            ("max_y", self.max_y),
            ("max_z", self.max_z),
        ] {
            if value <= 0.0 {
                return Err(SimulationConfigError::NonPositiveBound(name, value));
            }
        }

        if self.max_velocity < 0.0 {
            return Err(SimulationConfigError::NegativeMaxVelocity(self.max_velocity));
        }

        if self.min_size <= 0.0 || self.size0 < 0.0 || self.min_size > self.max_size {
            return Err(SimulationConfigError::InvalidSizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }

        if !(0.0..=1.0).contains(&self.friction) {
            return Err(SimulationConfigError::FrictionOutOfRange(self.friction));
        }

        Ok(())
    }
}

/// Tunables that other parts of the scene are allowed to rewrite while the
/// engine is running.
///
/// Writers:
/// - `control_sphere0`: the pointer enter/leave handler
/// - `max_x` / `max_y`: the surface resize handler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveTunables {
    pub control_sphere0: bool,
    pub max_x: f32,
    pub max_y: f32,
}

impl From<&SimulationConfig> for LiveTunables {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            control_sphere0: config.control_sphere0,
            max_x: config.max_x,
            max_y: config.max_y,
        }
    }
}

/// Rejected simulation configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationConfigError {
    /// `count` must be at least 1
    ZeroCount,
    /// A tunable was NaN or infinite
    NonFinite(&'static str),
    /// A half-extent was zero or negative
    NonPositiveBound(&'static str, f32),
    /// `max_velocity` below zero
    NegativeMaxVelocity(f32),
    /// Sizes must satisfy `0 < min_size <= max_size`
    InvalidSizeRange { min: f32, max: f32 },
    /// `friction` must stay in `[0, 1]`
    FrictionOutOfRange(f32),
}

impl std::fmt::Display for SimulationConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationConfigError::ZeroCount => write!(f, "body count must be at least 1"),
            SimulationConfigError::NonFinite(name) => write!(f, "{} is not finite", name),
            SimulationConfigError::NonPositiveBound(name, v) => {
                write!(f, "{} must be positive, got {}", name, v)
            }
            SimulationConfigError::NegativeMaxVelocity(v) => {
                write!(f, "max_velocity must not be negative, got {}", v)
            }
            SimulationConfigError::InvalidSizeRange { min, max } => {
                write!(f, "invalid size range: min {} max {}", min, max)
            }
            SimulationConfigError::FrictionOutOfRange(v) => {
                write!(f, "friction must be within [0, 1], got {}", v)
            }
        }
    }
}

impl std::error::Error for SimulationConfigError {}

/// Result type for configuration checks.
pub type SimulationConfigResult<T> = Result<T, SimulationConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SimulationConfig::default().validate(), Ok(()));
        assert_eq!(SimulationConfig::zero_gravity().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_degenerate_values() {
        let zero = SimulationConfig {
            count: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(SimulationConfigError::ZeroCount));

        let negative = SimulationConfig {
            max_velocity: -1.0,
            ..Default::default()
        };
        assert_eq!(
            negative.validate(),
            Err(SimulationConfigError::NegativeMaxVelocity(-1.0))
        );

        let inverted = SimulationConfig {
            min_size: 2.0,
            max_size: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(SimulationConfigError::InvalidSizeRange { .. })
        ));

        let nan = SimulationConfig {
            gravity: f32::NAN,
            ..Default::default()
        };
        assert_eq!(nan.validate(), Err(SimulationConfigError::NonFinite("gravity")));
    }

    #[test]
    fn test_live_tunables_copy_initial_bounds() {
        let config = SimulationConfig {
            max_x: 7.0,
            max_y: 3.0,
            control_sphere0: true,
            ..Default::default()
        };
        let live = LiveTunables::from(&config);
        assert_eq!(live.max_x, 7.0);
        assert_eq!(live.max_y, 3.0);
        assert!(live.control_sphere0);
    }
}
