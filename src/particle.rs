//! The simulated particle record.

use glam::{Vec2, Vec4};

/// One live particle.
///
/// Values sampled at spawn time are kept next to their animated counterparts
/// (`spawn_size` vs `size`, and so on) so the per-particle curves can
/// modulate them every tick without drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Current rendered size, after the scale curve.
    pub size: f32,
    /// Size sampled at spawn, already multiplied by the instance scale.
    pub spawn_size: f32,
    pub rotation: f32,
    pub spawn_rotation: f32,
    pub color: Vec4,
    pub spawn_color: Vec4,
    /// Seconds of life remaining. Strictly negative means expired.
    pub time_left: f32,
    pub max_life: f32,
    /// Current flipbook tile, numbered from 1. Zero means no animation.
    pub tile_index: u32,
    /// Generator state captured at spawn, so per-particle spread replays
    /// identically after a reload.
    pub initial_seed: u32,
    /// Depth key for the per-emitter stable sort.
    pub sort_key: f32,
    /// Sub-dt offset consumed on the particle's first simulation step.
    pub spawn_offset: f32,
}

impl Particle {
    /// Normalized age in [0, 1].
    #[inline]
    pub fn normalized_age(&self) -> f32 {
        if self.max_life > 0.0 {
            (1.0 - self.time_left / self.max_life).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}
