//! The particle context: instance slots, ticking and batching.
//!
//! A context is a first-class object; callers may create many. All public
//! operations assume the caller serializes them, there are no internal
//! threads and nothing suspends. Within one [`Context::update`] instances
//! and emitters are processed in creation and declaration order, which is
//! also the callback order of the following [`Context::render`].

use crate::animation::{FetchResult, TileSourceHandle};
use crate::error::ParticleError;
use crate::instance::{ConstantOverride, Instance, InstanceHandle};
use crate::particle::Particle;
use crate::prototype::Prototype;
use crate::render::{RenderBatch, RenderConstant};
use crate::rng::Lcg;
use crate::simulation::SortOrder;
use glam::{Vec2, Vec4};

/// Context-wide particle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Live particles across all instances.
    pub particles: u32,
    /// The context particle budget.
    pub max_particles: u32,
}

/// Per-instance counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceStats {
    /// Accumulated play time in seconds.
    pub time: f32,
}

/// Read-back of one emitter's runtime state, for tooling and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterStats {
    pub timer: f32,
    pub seed: u32,
    pub particles: u32,
    pub sleeping: bool,
}

struct Slot {
    instance: Option<Instance>,
    generation: u16,
}

/// A particle simulation context.
pub struct Context {
    slots: Vec<Slot>,
    free: Vec<u16>,
    max_particles: u32,
    master_rng: Lcg,
    sort_order: SortOrder,
}

impl Context {
    /// Create a context with room for `max_instances` instances. Emitter
    /// pools are clamped to `max_particles`.
    pub fn new(max_instances: u32, max_particles: u32) -> Self {
        let max_instances = max_instances.min(u16::MAX as u32) as u16;
        let slots = (0..max_instances)
            .map(|_| Slot { instance: None, generation: 0 })
            .collect();
        let free = (0..max_instances).rev().collect();
        Self {
            slots,
            free,
            max_particles,
            master_rng: Lcg::new(0x8D1CE5EE),
            sort_order: SortOrder::default(),
        }
    }

    /// Select how particles are depth-sorted within an emitter.
    pub fn set_sort_order(&mut self, sort_order: SortOrder) {
        self.sort_order = sort_order;
    }

    // -----------------------------------------------------------------------
    // Instance lifecycle
    // -----------------------------------------------------------------------

    /// Create an instance of a prototype. Fails with `CapacityExceeded`
    /// when every slot is taken.
    pub fn create_instance(&mut self, prototype: &Prototype) -> Result<InstanceHandle, ParticleError> {
        let slot = self.free.pop().ok_or(ParticleError::CapacityExceeded)?;
        let instance = Instance::new(prototype, self.max_particles, &mut self.master_rng);
        let entry = &mut self.slots[slot as usize];
        entry.instance = Some(instance);
        Ok(InstanceHandle::new(entry.generation, slot))
    }

    /// Destroy an instance. The slot's generation advances, so existing
    /// handles to it go stale.
    pub fn destroy_instance(&mut self, handle: InstanceHandle) -> Result<(), ParticleError> {
        let slot = self.resolve(handle)?;
        let entry = &mut self.slots[slot];
        entry.instance = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot as u16);
        Ok(())
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn start(&mut self, handle: InstanceHandle) -> Result<(), ParticleError> {
        self.get_mut(handle)?.start();
        Ok(())
    }

    pub fn stop(&mut self, handle: InstanceHandle) -> Result<(), ParticleError> {
        self.get_mut(handle)?.stop();
        Ok(())
    }

    pub fn reset(&mut self, handle: InstanceHandle) -> Result<(), ParticleError> {
        self.get_mut(handle)?.reset();
        Ok(())
    }

    pub fn set_position(&mut self, handle: InstanceHandle, position: Vec2) -> Result<(), ParticleError> {
        self.get_mut(handle)?.transform.position = position;
        Ok(())
    }

    pub fn set_rotation(&mut self, handle: InstanceHandle, rotation: f32) -> Result<(), ParticleError> {
        self.get_mut(handle)?.transform.rotation = rotation;
        Ok(())
    }

    pub fn set_scale(&mut self, handle: InstanceHandle, scale: f32) -> Result<(), ParticleError> {
        self.get_mut(handle)?.transform.scale = scale;
        Ok(())
    }

    /// Whether every emitter of the instance is asleep.
    pub fn is_sleeping(&self, handle: InstanceHandle) -> Result<bool, ParticleError> {
        Ok(self.get(handle)?.is_sleeping())
    }

    // -----------------------------------------------------------------------
    // Render constants
    // -----------------------------------------------------------------------

    /// Override a render constant for one emitter of the instance, keyed by
    /// the hashes of the emitter id and the constant name.
    pub fn set_render_constant(
        &mut self,
        handle: InstanceHandle,
        emitter_id_hash: u64,
        name_hash: u64,
        value: Vec4,
    ) -> Result<(), ParticleError> {
        let instance = self.get_mut(handle)?;
        if let Some(existing) = instance
            .constants
            .iter_mut()
            .find(|c| c.emitter_id_hash == emitter_id_hash && c.name_hash == name_hash)
        {
            existing.value = value;
        } else {
            instance.constants.push(ConstantOverride { emitter_id_hash, name_hash, value });
        }
        Ok(())
    }

    /// Remove a render-constant override.
    pub fn reset_render_constant(
        &mut self,
        handle: InstanceHandle,
        emitter_id_hash: u64,
        name_hash: u64,
    ) -> Result<(), ParticleError> {
        let instance = self.get_mut(handle)?;
        instance
            .constants
            .retain(|c| !(c.emitter_id_hash == emitter_id_hash && c.name_hash == name_hash));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reload
    // -----------------------------------------------------------------------

    /// Rebuild an instance's emitters against its (possibly reloaded)
    /// prototype, preserving timers, seeds and live particles for emitters
    /// that survive. See [`Prototype::reload`].
    pub fn reload_instance(&mut self, handle: InstanceHandle, replay: bool) -> Result<(), ParticleError> {
        let slot = self.resolve(handle)?;
        let max_particles = self.max_particles;
        let sort_order = self.sort_order;
        let instance = self.slots[slot].instance.as_mut().ok_or(ParticleError::InvalidHandle)?;
        instance.reload(replay, max_particles, &mut self.master_rng, sort_order);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance every instance by `dt` and write particle quads into
    /// `vertex_buffer`. Returns the number of bytes written.
    ///
    /// A buffer that cannot hold every particle is not an error: quads are
    /// written up to the last whole particle that fits. `fetch` resolves
    /// flipbook animations; emitters without a tile source, or whose fetch
    /// fails, are simulated but produce no vertices.
    pub fn update(
        &mut self,
        dt: f32,
        vertex_buffer: &mut [u8],
        mut fetch: Option<&mut dyn FnMut(TileSourceHandle, u64) -> FetchResult>,
    ) -> usize {
        let mut cursor = 0;
        for slot in &mut self.slots {
            if let Some(instance) = slot.instance.as_mut() {
                instance.update(dt, vertex_buffer, &mut cursor, &mut fetch, self.sort_order);
            }
        }
        cursor
    }

    /// Invoke `callback` once per emitter that wrote vertices in the most
    /// recent update, in update order. Render never mutates particle state.
    pub fn render(&self, mut callback: impl FnMut(&RenderBatch)) {
        let mut constants: Vec<RenderConstant> = Vec::new();
        for slot in &self.slots {
            let Some(instance) = slot.instance.as_ref() else {
                continue;
            };
            let data = instance.prototype.borrow();
            for (emitter, proto) in instance.emitters.iter().zip(data.emitters.iter()) {
                if emitter.vertex_count == 0 {
                    continue;
                }
                constants.clear();
                constants.extend(
                    instance
                        .constants
                        .iter()
                        .filter(|c| c.emitter_id_hash == proto.id_hash)
                        .map(|c| RenderConstant { name_hash: c.name_hash, value: c.value }),
                );
                callback(&RenderBatch {
                    material: proto.material_hash,
                    texture: emitter.texture,
                    blend_mode: proto.blend_mode,
                    vertex_index: emitter.vertex_index,
                    vertex_count: emitter.vertex_count,
                    constants: &constants,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Stats {
        let particles = self
            .slots
            .iter()
            .filter_map(|s| s.instance.as_ref())
            .map(Instance::live_particles)
            .sum();
        Stats { particles, max_particles: self.max_particles }
    }

    pub fn instance_stats(&self, handle: InstanceHandle) -> Result<InstanceStats, ParticleError> {
        Ok(InstanceStats { time: self.get(handle)?.play_time })
    }

    /// Runtime state of one emitter, for tooling and tests.
    pub fn emitter_stats(
        &self,
        handle: InstanceHandle,
        emitter_index: usize,
    ) -> Result<EmitterStats, ParticleError> {
        let instance = self.get(handle)?;
        let emitter = instance.emitters.get(emitter_index).ok_or(ParticleError::InvalidHandle)?;
        Ok(EmitterStats {
            timer: emitter.timer,
            seed: emitter.seed,
            particles: emitter.pool.len() as u32,
            sleeping: emitter.is_sleeping(),
        })
    }

    /// Read access to one emitter's live particles, in sorted order.
    pub fn particles(
        &self,
        handle: InstanceHandle,
        emitter_index: usize,
    ) -> Result<&[Particle], ParticleError> {
        let instance = self.get(handle)?;
        let emitter = instance.emitters.get(emitter_index).ok_or(ParticleError::InvalidHandle)?;
        Ok(emitter.pool.particles())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn resolve(&self, handle: InstanceHandle) -> Result<usize, ParticleError> {
        let slot = handle.slot();
        match self.slots.get(slot) {
            Some(entry) if entry.generation == handle.generation() && entry.instance.is_some() => Ok(slot),
            _ => Err(ParticleError::InvalidHandle),
        }
    }

    fn get(&self, handle: InstanceHandle) -> Result<&Instance, ParticleError> {
        let slot = self.resolve(handle)?;
        self.slots[slot].instance.as_ref().ok_or(ParticleError::InvalidHandle)
    }

    fn get_mut(&mut self, handle: InstanceHandle) -> Result<&mut Instance, ParticleError> {
        let slot = self.resolve(handle)?;
        self.slots[slot].instance.as_mut().ok_or(ParticleError::InvalidHandle)
    }
}
