//! Rate-accumulator particle spawning.
//!
//! While an emitter is in its spawn window the rate property (particles per
//! second, sampled at the emitter's normalized time) accumulates fractional
//! particles across ticks; whole particles are emitted and clamped to the
//! pool's free space. Within one tick the new particles are distributed at
//! evenly spaced sub-dt offsets, consumed by their first simulation step.
//!
//! Initial particle values are sampled from the emitter-wide properties at
//! `t_p = 0`, each with a fresh generator draw for spread. The draw order is
//! fixed (seed capture first, then life, speed, size, color, rotation) so a
//! reseeded emitter replays spawns exactly.

use crate::emitter::Emitter;
use crate::instance::InstanceTransform;
use crate::particle::Particle;
use crate::prototype::{EmissionSpace, EmitterPrototype};
use glam::{Vec2, Vec4};

/// Per-instance inputs to a spawn pass.
pub(crate) struct SpawnParams<'a> {
    pub transform: &'a InstanceTransform,
    /// Instance velocity derived from the previous tick's position.
    pub instance_velocity: Vec2,
}

pub(crate) fn spawn_particles(
    emitter: &mut Emitter,
    proto: &EmitterPrototype,
    params: &SpawnParams,
    window: f32,
    dt: f32,
) {
    if window <= 0.0 {
        return;
    }
    let t_e = emitter.normalized_time(proto);
    let rate = proto.properties.spawn_rate.evaluate(t_e, &mut emitter.rng).max(0.0);
    emitter.spawn_accumulator += rate * window;

    let mut count = emitter.spawn_accumulator.floor() as u32;
    emitter.spawn_accumulator -= count as f32;
    count = count.min(emitter.pool.free() as u32);
    if count == 0 {
        return;
    }

    let window_start = dt - window;
    for i in 0..count {
        let offset = window_start + window * i as f32 / count as f32;
        let particle = sample_particle(emitter, proto, params, t_e, offset);
        emitter.pool.push(particle);
    }
}

fn sample_particle(
    emitter: &mut Emitter,
    proto: &EmitterPrototype,
    params: &SpawnParams,
    t_e: f32,
    offset: f32,
) -> Particle {
    let props = &proto.properties;
    let initial_seed = emitter.rng.next_u32();
    let rng = &mut emitter.rng;
    let life = props.particle_life.evaluate(t_e, rng);
    let speed = props.particle_speed.evaluate(t_e, rng);
    let size = props.particle_size.evaluate(t_e, rng) * params.transform.scale;
    let red = props.particle_red.evaluate(t_e, rng);
    let green = props.particle_green.evaluate(t_e, rng);
    let blue = props.particle_blue.evaluate(t_e, rng);
    let alpha = props.particle_alpha.evaluate(t_e, rng);
    let rotation = props.particle_rotation.evaluate(t_e, rng);

    let local_velocity = Vec2::from_angle(proto.rotation).rotate(Vec2::new(0.0, speed));
    let (position, velocity, rotation) = match proto.space {
        EmissionSpace::World => {
            let position = params.transform.transform_point(proto.position);
            let velocity = params.transform.rotate(local_velocity) * params.transform.scale
                + params.instance_velocity * proto.inherit_velocity;
            (position, velocity, rotation + proto.rotation + params.transform.rotation)
        }
        EmissionSpace::Emitter => {
            let velocity = local_velocity
                + params.transform.inverse_rotate(params.instance_velocity)
                    * safe_inverse_scale(params.transform.scale)
                    * proto.inherit_velocity;
            (proto.position, velocity, rotation + proto.rotation)
        }
    };

    let color = Vec4::new(red, green, blue, alpha);
    Particle {
        position,
        velocity,
        size,
        spawn_size: size,
        rotation,
        spawn_rotation: rotation,
        color,
        spawn_color: color,
        time_left: life,
        max_life: life,
        tile_index: 0,
        initial_seed,
        sort_key: 0.0,
        spawn_offset: offset,
    }
}

#[inline]
fn safe_inverse_scale(scale: f32) -> f32 {
    if scale.abs() < f32::EPSILON {
        0.0
    } else {
        1.0 / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::{EmitterProperties, ParticleCurves, PlayMode};
    use crate::render::BlendMode;
    use crate::spline::Property;

    fn proto(rate: f32, space: EmissionSpace) -> EmitterPrototype {
        let mut properties = EmitterProperties::default();
        properties.spawn_rate = Property::constant(rate);
        EmitterPrototype {
            id_hash: 0,
            space,
            duration: 1.0,
            start_delay: 0.0,
            play_mode: PlayMode::Loop,
            max_particle_count: 64,
            blend_mode: BlendMode::Alpha,
            material_hash: 0,
            animation_hash: 0,
            inherit_velocity: 0.0,
            position: Vec2::ZERO,
            rotation: 0.0,
            properties,
            curves: ParticleCurves::default(),
            modifiers: Vec::new(),
        }
    }

    fn identity() -> InstanceTransform {
        InstanceTransform {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    fn run_ticks(rate: f32, dt: f32, ticks: u32) -> usize {
        let p = proto(rate, EmissionSpace::World);
        let mut e = Emitter::new(1, 64);
        e.start();
        let transform = identity();
        let params = SpawnParams { transform: &transform, instance_velocity: Vec2::ZERO };
        for _ in 0..ticks {
            let window = e.advance(&p, dt);
            spawn_particles(&mut e, &p, &params, window, dt);
        }
        e.pool.len()
    }

    #[test]
    fn test_rate_above_tick_frequency() {
        assert_eq!(run_ticks(10.0, 1.0, 1), 10);
    }

    #[test]
    fn test_rate_below_tick_frequency_accumulates() {
        assert_eq!(run_ticks(1.0, 0.5, 2), 1);
    }

    #[test]
    fn test_fractional_rate_total() {
        assert_eq!(run_ticks(2.5, 1.0, 4), 10);
    }

    #[test]
    fn test_spawns_clamped_to_pool() {
        let p = proto(100.0, EmissionSpace::World);
        let mut e = Emitter::new(1, 64);
        e.pool.set_capacity(5);
        e.start();
        let transform = identity();
        let params = SpawnParams { transform: &transform, instance_velocity: Vec2::ZERO };
        for _ in 0..4 {
            let window = e.advance(&p, 1.0);
            spawn_particles(&mut e, &p, &params, window, 1.0);
        }
        assert_eq!(e.pool.len(), 5);
    }

    #[test]
    fn test_sub_dt_offsets_are_even() {
        let p = proto(4.0, EmissionSpace::World);
        let mut e = Emitter::new(1, 64);
        e.start();
        let transform = identity();
        let params = SpawnParams { transform: &transform, instance_velocity: Vec2::ZERO };
        let window = e.advance(&p, 1.0);
        spawn_particles(&mut e, &p, &params, window, 1.0);
        let offsets: Vec<f32> = e.pool.particles().iter().map(|p| p.spawn_offset).collect();
        assert_eq!(offsets, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_world_space_applies_transform() {
        let p = proto(1.0, EmissionSpace::World);
        let mut e = Emitter::new(1, 64);
        e.start();
        let transform = InstanceTransform {
            position: Vec2::new(10.0, 0.0),
            rotation: 0.0,
            scale: 1.0,
        };
        let params = SpawnParams { transform: &transform, instance_velocity: Vec2::ZERO };
        let window = e.advance(&p, 1.0);
        spawn_particles(&mut e, &p, &params, window, 1.0);
        assert_eq!(e.pool.particles()[0].position.x, 10.0);
    }

    #[test]
    fn test_emitter_space_ignores_transform() {
        let p = proto(1.0, EmissionSpace::Emitter);
        let mut e = Emitter::new(1, 64);
        e.start();
        let transform = InstanceTransform {
            position: Vec2::new(10.0, 0.0),
            rotation: 0.0,
            scale: 1.0,
        };
        let params = SpawnParams { transform: &transform, instance_velocity: Vec2::ZERO };
        let window = e.advance(&p, 1.0);
        spawn_particles(&mut e, &p, &params, window, 1.0);
        assert_eq!(e.pool.particles()[0].position.x, 0.0);
    }

    #[test]
    fn test_inherited_velocity() {
        let mut p = proto(1.0, EmissionSpace::World);
        p.inherit_velocity = 0.5;
        let mut e = Emitter::new(1, 64);
        e.start();
        let transform = identity();
        let params = SpawnParams {
            transform: &transform,
            instance_velocity: Vec2::new(6.0, 0.0),
        };
        let window = e.advance(&p, 1.0);
        spawn_particles(&mut e, &p, &params, window, 1.0);
        assert_eq!(e.pool.particles()[0].velocity, Vec2::new(3.0, 0.0));
    }
}
