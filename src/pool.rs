//! Fixed-capacity particle storage.
//!
//! Each emitter owns one pool sized to its `max_particle_count`. The fixed
//! capacity gives predictable memory, no per-tick allocation and natural
//! back-pressure: spawns are dropped once the pool is full. Removal swaps
//! with the tail; the per-tick stable sort re-establishes depth order.

use crate::particle::Particle;

#[derive(Debug, Clone)]
pub(crate) struct ParticlePool {
    particles: Vec<Particle>,
    capacity: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a particle. Ignored when the pool is full.
    pub fn push(&mut self, particle: Particle) -> bool {
        if self.particles.len() < self.capacity {
            self.particles.push(particle);
            true
        } else {
            false
        }
    }

    /// Remove by swapping with the tail.
    pub fn swap_remove(&mut self, index: usize) {
        self.particles.swap_remove(index);
    }

    /// Stable ascending sort over the live range.
    pub fn sort_by_key(&mut self, key: impl Fn(&Particle) -> f32) {
        self.particles.sort_by(|a, b| key(a).total_cmp(&key(b)));
    }

    /// Resize the pool, truncating live particles from the tail if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        if self.particles.len() > capacity {
            self.particles.truncate(capacity);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn free(&self) -> usize {
        self.capacity - self.particles.len()
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
