//! Running effect instances.
//!
//! An instance is one realization of a prototype: a world transform, one
//! runtime emitter per emitter description and a set of render-constant
//! overrides. Instances are addressed through generation-tagged handles so
//! a stale handle fails lookup instead of aliasing a recycled slot.

use crate::animation::{AnimationData, FetchResult, TileSourceHandle};
use crate::emitter::Emitter;
use crate::modifier::ResolvedModifier;
use crate::prototype::{EmitterPrototype, Prototype, PrototypeData};
use crate::render;
use crate::rng::Lcg;
use crate::simulation::{self, SortOrder};
use crate::spawn::{spawn_particles, SpawnParams};
use glam::{Vec2, Vec4};
use std::cell::RefCell;
use std::rc::Rc;

/// Opaque instance handle: generation tag in the high 16 bits, slot index in
/// the low 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub(crate) u32);

impl InstanceHandle {
    pub(crate) fn new(generation: u16, slot: u16) -> Self {
        Self((u32::from(generation) << 16) | u32::from(slot))
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        (self.0 & 0xffff) as usize
    }

    #[inline]
    pub(crate) fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// The raw 32-bit handle value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// World transform of an instance: translation, rotation, uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct InstanceTransform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: f32,
}

impl InstanceTransform {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: 0.0,
        scale: 1.0,
    };

    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.position + Vec2::from_angle(self.rotation).rotate(p * self.scale)
    }

    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::from_angle(self.rotation).rotate(v)
    }

    #[inline]
    pub fn inverse_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::from_angle(-self.rotation).rotate(v)
    }

    /// World point into the instance frame.
    #[inline]
    pub fn inverse_point(&self, p: Vec2) -> Vec2 {
        let unrotated = self.inverse_rotate(p - self.position);
        if self.scale.abs() < f32::EPSILON {
            unrotated
        } else {
            unrotated / self.scale
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConstantOverride {
    pub emitter_id_hash: u64,
    pub name_hash: u64,
    pub value: Vec4,
}

pub(crate) struct Instance {
    pub prototype: Rc<RefCell<PrototypeData>>,
    pub emitters: Vec<Emitter>,
    pub transform: InstanceTransform,
    /// Position at the end of the previous update, for inherit-velocity.
    pub prev_position: Vec2,
    /// Accumulated play time while awake.
    pub play_time: f32,
    /// Step size of the most recent update, used to re-derive emitters on
    /// a replayed reload.
    pub last_dt: f32,
    /// Whether the instance was stopped after its last start.
    pub stopped: bool,
    pub constants: Vec<ConstantOverride>,
    /// Scratch space for resolved modifiers, reused across ticks.
    modifier_scratch: Vec<ResolvedModifier>,
}

/// One emitter tick: advance the state machine, spawn, resolve and apply
/// modifiers, simulate. The same path drives live updates and reload
/// replay; replay passes `depth_sort = false` so re-derived particles keep
/// spawn order until the next real update.
#[allow(clippy::too_many_arguments)]
fn tick_emitter(
    emitter: &mut Emitter,
    proto: &EmitterPrototype,
    transform: &InstanceTransform,
    instance_velocity: Vec2,
    dt: f32,
    animation: Option<&AnimationData>,
    scratch: &mut Vec<ResolvedModifier>,
    sort_order: SortOrder,
    depth_sort: bool,
) {
    let window = emitter.advance(proto, dt);
    let params = SpawnParams { transform, instance_velocity };
    spawn_particles(emitter, proto, &params, window, dt);
    if emitter.is_sleeping() {
        scratch.clear();
    } else {
        simulation::resolve_modifiers(emitter, proto, transform, scratch);
    }
    simulation::simulate(emitter, proto, transform, dt, animation, scratch, sort_order, depth_sort);
}

impl Instance {
    pub fn new(prototype: &Prototype, max_context_particles: u32, master_rng: &mut Lcg) -> Self {
        let data = prototype.inner.borrow();
        let emitters = data
            .emitters
            .iter()
            .map(|e| {
                let capacity = e.max_particle_count.min(max_context_particles) as usize;
                Emitter::new(master_rng.next_u32(), capacity)
            })
            .collect();
        drop(data);
        Self {
            prototype: Rc::clone(&prototype.inner),
            emitters,
            transform: InstanceTransform::IDENTITY,
            prev_position: Vec2::ZERO,
            play_time: 0.0,
            last_dt: 0.0,
            stopped: false,
            constants: Vec::new(),
            modifier_scratch: Vec::new(),
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.emitters.iter().all(Emitter::is_sleeping)
    }

    pub fn start(&mut self) {
        for emitter in &mut self.emitters {
            emitter.start();
        }
        self.stopped = false;
    }

    pub fn stop(&mut self) {
        for emitter in &mut self.emitters {
            emitter.stop();
        }
        self.stopped = true;
    }

    pub fn reset(&mut self) {
        for emitter in &mut self.emitters {
            emitter.reset();
        }
        self.play_time = 0.0;
        self.stopped = false;
        self.prev_position = self.transform.position;
    }

    pub fn live_particles(&self) -> u32 {
        self.emitters.iter().map(|e| e.pool.len() as u32).sum()
    }

    /// Advance the whole instance by one tick, writing vertices at `cursor`.
    pub fn update(
        &mut self,
        dt: f32,
        vertex_buffer: &mut [u8],
        cursor: &mut usize,
        fetch: &mut Option<&mut dyn FnMut(TileSourceHandle, u64) -> FetchResult>,
        sort_order: SortOrder,
    ) {
        let data = self.prototype.borrow();
        let awake = !self.is_sleeping();
        let instance_velocity = if dt > 0.0 {
            (self.transform.position - self.prev_position) / dt
        } else {
            Vec2::ZERO
        };

        for (index, (emitter, proto)) in self.emitters.iter_mut().zip(data.emitters.iter()).enumerate() {
            let animation = match (data.tile_sources.get(index).copied().flatten(), fetch.as_mut()) {
                (Some(tile_source), Some(callback)) => {
                    callback(tile_source, proto.animation_hash).ok()
                }
                _ => None,
            };

            tick_emitter(
                emitter,
                proto,
                &self.transform,
                instance_velocity,
                dt,
                animation.as_ref(),
                &mut self.modifier_scratch,
                sort_order,
                true,
            );

            emitter.vertex_index = *cursor / std::mem::size_of::<crate::render::Vertex>();
            emitter.vertex_count = match &animation {
                Some(anim) => {
                    emitter.texture = anim.texture;
                    render::write_quads(
                        vertex_buffer,
                        cursor,
                        emitter.pool.particles(),
                        anim,
                        proto.space,
                        &self.transform,
                    )
                }
                None => 0,
            };
        }

        if awake {
            self.play_time += dt;
        }
        if dt > 0.0 {
            self.last_dt = dt;
        }
        self.prev_position = self.transform.position;
    }

    /// Ticks needed to re-derive the elapsed timeline with the most recent
    /// update step.
    fn replay_steps(&self) -> u32 {
        if self.last_dt > 0.0 && self.play_time > 0.0 {
            (self.play_time / self.last_dt).round() as u32
        } else {
            0
        }
    }

    /// Rebuild the per-emitter runtime to match the (possibly reloaded)
    /// prototype.
    ///
    /// Without `replay`, emitters present before and after keep their
    /// timer, seed, state and live particles; pools are resized when
    /// `max_particle_count` changed, truncating from the tail, and emitters
    /// new to the description start Sleeping.
    ///
    /// With `replay` on a playing instance, every emitter is re-derived
    /// deterministically: reseeded (retained emitters from their stored
    /// seed, new ones from a fresh draw), restarted and stepped over the
    /// accumulated play time with the most recent update step. On a
    /// fixed-step host this reproduces retained particles bit for bit, and
    /// it lets a grown `max_particle_count` materialize the spawns the old
    /// cap dropped. Replay ticks skip the depth sort so re-derived
    /// particles keep spawn order until the next update. Removed emitters
    /// drop their particles either way.
    pub fn reload(
        &mut self,
        replay: bool,
        max_context_particles: u32,
        master_rng: &mut Lcg,
        sort_order: SortOrder,
    ) {
        let prototype = Rc::clone(&self.prototype);
        let data = prototype.borrow();
        let was_playing = !self.is_sleeping();
        let steps = self.replay_steps();
        let old: Vec<Emitter> = std::mem::take(&mut self.emitters);
        let mut old_iter = old.into_iter();

        for proto in data.emitters.iter() {
            let capacity = proto.max_particle_count.min(max_context_particles) as usize;
            let previous = old_iter.next();
            let emitter = if replay && was_playing {
                let seed = match &previous {
                    Some(emitter) => emitter.seed,
                    None => master_rng.next_u32(),
                };
                let mut emitter = Emitter::new(seed, capacity);
                emitter.start();
                for _ in 0..steps {
                    tick_emitter(
                        &mut emitter,
                        proto,
                        &self.transform,
                        Vec2::ZERO,
                        self.last_dt,
                        None,
                        &mut self.modifier_scratch,
                        sort_order,
                        false,
                    );
                }
                if self.stopped {
                    emitter.stop();
                }
                emitter
            } else {
                match previous {
                    Some(mut emitter) => {
                        emitter.pool.set_capacity(capacity);
                        emitter
                    }
                    None => Emitter::new(master_rng.next_u32(), capacity),
                }
            };
            self.emitters.push(emitter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_packing() {
        let handle = InstanceHandle::new(3, 17);
        assert_eq!(handle.generation(), 3);
        assert_eq!(handle.slot(), 17);
        assert_eq!(handle.raw(), (3 << 16) | 17);
    }

    #[test]
    fn test_transform_roundtrip() {
        let t = InstanceTransform {
            position: Vec2::new(3.0, -2.0),
            rotation: 0.7,
            scale: 2.0,
        };
        let p = Vec2::new(1.5, 4.0);
        let roundtrip = t.inverse_point(t.transform_point(p));
        assert!((roundtrip - p).length() < 1e-5);
    }

    #[test]
    fn test_transform_scales_and_rotates() {
        let t = InstanceTransform {
            position: Vec2::ZERO,
            rotation: std::f32::consts::FRAC_PI_2,
            scale: 2.0,
        };
        let p = t.transform_point(Vec2::new(1.0, 0.0));
        assert!((p - Vec2::new(0.0, 2.0)).length() < 1e-5);
    }
}
