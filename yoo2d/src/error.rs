//! Error types.
//!
//! [`ConfigError`] is returned when an engine object is built or reconfigured
//! with arguments that would corrupt later geometry math. [`FrameFault`]
//! describes a per-entity anomaly caught during a frame; faults never escape
//! the frame loop, they are logged and reported through the entity's
//! [`EntityHook::Error`](crate::entity::EntityHook::Error) hook.

use thiserror::Error;

use crate::entity::EntityId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("polygon needs at least 3 points, got {0}")]
    DegeneratePolygon(usize),

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f32 },

    #[error("slide duration must be zero or positive, got {0}")]
    InvalidDuration(f32),

    #[error("tick rate must be positive, got {0}")]
    InvalidTickRate(f32),

    #[error("max frame delta must be positive, got {0}s")]
    InvalidFrameDelta(f32),

    #[error("scale must be positive, got ({0}, {1})")]
    InvalidScale(f32, f32),

    #[error("rectangle size must not be negative, got ({0}, {1})")]
    NegativeSize(f32, f32),

    #[error("ellipse radii must not be negative, got ({0}, {1})")]
    NegativeRadius(f32, f32),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameFault {
    #[error("entity {entity:?} reached a non-finite position")]
    NonFinitePosition { entity: EntityId },

    #[error("entity {entity:?} panicked during {phase}: {message}")]
    Panicked {
        entity: EntityId,
        phase: &'static str,
        message: String,
    },
}

/// Rejects NaN and infinities for a named field.
pub(crate) fn ensure_finite(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

/// Accepts zero (snap) and positive durations.
pub(crate) fn ensure_duration(seconds: f32) -> Result<f32, ConfigError> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(seconds)
    } else {
        Err(ConfigError::InvalidDuration(seconds))
    }
}
