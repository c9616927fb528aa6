//! Deterministic random number generation.
//!
//! Every emitter owns one [`Lcg`] generator, reseeded explicitly on reset and
//! reload. Each spawned particle captures a fresh `next_u32` as its
//! `initial_seed`, so per-particle property spread can be replayed from that
//! seed long after the emitter generator has advanced.
//!
//! The generator is a plain 32-bit linear congruential generator. Using a
//! fixed, hand-written recurrence keeps particle state byte-identical across
//! platforms and crate versions, which the reload and replay paths rely on.

use glam::Vec2;
use std::f32::consts::TAU;

/// A small reseedable linear congruential generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// Create a generator from a seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Replace the generator state with a new seed.
    pub fn reseed(&mut self, seed: u32) {
        self.state = seed;
    }

    /// Advance the generator and return the full 32-bit state.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state
    }

    /// Random f32 in [0, 1], with 16-bit resolution from the high word.
    #[inline]
    pub fn uniform01(&mut self) -> f32 {
        ((self.next_u32() >> 16) & 0xffff) as f32 / 65535.0
    }

    /// Random f32 in [a, b].
    #[inline]
    pub fn uniform(&mut self, a: f32, b: f32) -> f32 {
        a + (b - a) * self.uniform01()
    }

    /// Random unit vector in the plane.
    #[inline]
    pub fn unit_vector_2d(&mut self) -> Vec2 {
        let angle = self.uniform(0.0, TAU);
        Vec2::new(angle.cos(), angle.sin())
    }
}
