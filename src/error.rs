//! Error types for the particle engine.
//!
//! This module provides error types for prototype loading, handle lookups,
//! and instance creation. Recoverable conditions (a vertex buffer that is too
//! small, an animation that cannot be fetched) are not errors; they are
//! handled locally and reported through return values.

use std::fmt;

/// Errors surfaced by the public particle API.
#[derive(Debug)]
pub enum ParticleError {
    /// A prototype buffer was malformed or failed validation.
    InvalidPrototype(String),
    /// A handle was stale or belonged to another context.
    InvalidHandle,
    /// No free instance slot was available.
    CapacityExceeded,
}

impl fmt::Display for ParticleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticleError::InvalidPrototype(msg) => write!(f, "Invalid effect prototype: {}", msg),
            ParticleError::InvalidHandle => write!(f, "Stale or foreign instance handle"),
            ParticleError::CapacityExceeded => {
                write!(f, "No free instance slot. Increase max_instances or destroy instances.")
            }
        }
    }
}

impl std::error::Error for ParticleError {}

impl From<serde_json::Error> for ParticleError {
    fn from(e: serde_json::Error) -> Self {
        ParticleError::InvalidPrototype(e.to_string())
    }
}

/// Result of a failed animation fetch from the host.
///
/// Fetch failures are recovered locally: the affected emitter is simulated
/// as usual but produces no vertices for the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// The tile source does not contain the requested animation.
    NotFound,
    /// The host could not resolve the tile source at all.
    Unknown,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound => write!(f, "Animation not found in tile source"),
            FetchError::Unknown => write!(f, "Tile source could not be resolved"),
        }
    }
}

impl std::error::Error for FetchError {}
