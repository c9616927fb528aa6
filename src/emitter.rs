//! Runtime emitter state.
//!
//! Each emitter of an instance owns a state machine, a deterministic
//! generator and a fixed-capacity particle pool. The state machine:
//!
//! | From | Event | To |
//! |------|-------|----|
//! | Sleeping | start | Prespawn |
//! | Prespawn | `timer >= start_delay` | Spawning |
//! | Spawning | duration reached, once | Postspawn |
//! | Spawning | duration reached, loop | Spawning, `timer -= duration` |
//! | Prespawn / Spawning / Postspawn | stop | Postspawn |
//! | Postspawn | pool drained | Sleeping |
//! | any | reset | Sleeping |
//!
//! The loop wrap subtracts `duration` instead of zeroing the timer, so
//! emitters with different durations stay phase-consistent over long
//! accumulated play times.

use crate::animation::TextureHandle;
use crate::pool::ParticlePool;
use crate::prototype::{EmitterPrototype, PlayMode};
use crate::rng::Lcg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmitterState {
    Sleeping,
    Prespawn,
    Spawning,
    Postspawn,
}

#[derive(Debug, Clone)]
pub(crate) struct Emitter {
    pub state: EmitterState,
    /// Seconds since start, wrapped by the loop transition.
    pub timer: f32,
    /// Fractional particles owed by the rate accumulator.
    pub spawn_accumulator: f32,
    /// Seed the generator was last reseeded with.
    pub seed: u32,
    pub rng: Lcg,
    pub pool: ParticlePool,
    /// First vertex written by the most recent update, as a vertex index.
    pub vertex_index: usize,
    /// Vertices written by the most recent update.
    pub vertex_count: usize,
    /// Texture resolved by the most recent animation fetch.
    pub texture: TextureHandle,
}

impl Emitter {
    pub fn new(seed: u32, capacity: usize) -> Self {
        Self {
            state: EmitterState::Sleeping,
            timer: 0.0,
            spawn_accumulator: 0.0,
            seed,
            rng: Lcg::new(seed),
            pool: ParticlePool::new(capacity),
            vertex_index: 0,
            vertex_count: 0,
            texture: TextureHandle::default(),
        }
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.state == EmitterState::Sleeping
    }

    pub fn start(&mut self) {
        if self.state == EmitterState::Sleeping {
            self.state = EmitterState::Prespawn;
            self.timer = 0.0;
            self.spawn_accumulator = 0.0;
        }
    }

    pub fn stop(&mut self) {
        if self.state != EmitterState::Sleeping {
            self.state = EmitterState::Postspawn;
        }
    }

    /// Back to Sleeping with the original seed, dropping all particles.
    pub fn reset(&mut self) {
        self.state = EmitterState::Sleeping;
        self.timer = 0.0;
        self.spawn_accumulator = 0.0;
        self.rng.reseed(self.seed);
        self.pool.clear();
        self.vertex_index = 0;
        self.vertex_count = 0;
    }

    /// Advance the timer and run the transitions for one tick.
    ///
    /// Returns the seconds of this tick eligible for spawning: zero while
    /// delayed or stopped, only the portion past `start_delay` on the tick
    /// the delay elapses, and only the portion up to the duration on a
    /// once-emitter's final tick.
    pub fn advance(&mut self, proto: &EmitterPrototype, dt: f32) -> f32 {
        if self.state == EmitterState::Sleeping || dt <= 0.0 {
            return 0.0;
        }
        self.timer += dt;

        let mut window = match self.state {
            EmitterState::Prespawn => {
                if self.timer >= proto.start_delay {
                    self.state = EmitterState::Spawning;
                    self.timer - proto.start_delay
                } else {
                    return 0.0;
                }
            }
            EmitterState::Spawning => dt,
            _ => 0.0,
        };

        if self.state == EmitterState::Spawning {
            let end = proto.start_delay + proto.duration;
            if self.timer >= end {
                match proto.play_mode {
                    PlayMode::Once => {
                        window = (window - (self.timer - end)).max(0.0);
                        self.state = EmitterState::Postspawn;
                    }
                    PlayMode::Loop => {
                        while self.timer >= end {
                            self.timer -= proto.duration;
                        }
                    }
                }
            }
        }
        window.min(dt)
    }

    /// Normalized emitter time `t_e` in [0, 1], measured from the end of
    /// the start delay.
    ///
    /// The timer includes the delay and the loop wrap keeps it inside
    /// `[start_delay, start_delay + duration)`, so curves span the
    /// spawning phase. Dividing the raw timer would pin every delayed
    /// emitter's curves at their end value.
    #[inline]
    pub fn normalized_time(&self, proto: &EmitterPrototype) -> f32 {
        ((self.timer - proto.start_delay) / proto.duration).clamp(0.0, 1.0)
    }

    /// Postspawn emitters fall asleep once their pool drains.
    pub fn settle(&mut self) {
        if self.state == EmitterState::Postspawn && self.pool.is_empty() {
            self.state = EmitterState::Sleeping;
            self.timer = 0.0;
            self.spawn_accumulator = 0.0;
        }
    }
}
