//! Per-tick particle simulation.
//!
//! For every live particle: capture the flipbook tile from the age at the
//! start of the tick, age by the effective dt (first ticks honor the sub-dt
//! spawn offset), evaluate the per-particle curves with a generator seeded
//! from the particle's captured seed, integrate, apply the emitter's
//! modifiers in declared order and produce the sort key. Expired particles
//! are swept with a swap-to-tail pass and the stable sort re-establishes
//! depth order.

use crate::animation::AnimationData;
use crate::emitter::Emitter;
use crate::instance::InstanceTransform;
use crate::modifier::{ModifierSpace, ResolvedModifier};
use crate::prototype::{EmissionSpace, EmitterPrototype};
use glam::{Vec2, Vec4};

/// Ordering used for the per-emitter depth sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Youngest first. Matches the engine's historical draw order and keeps
    /// ties (particles spawned the same tick) in insertion order.
    #[default]
    Age,
    /// Depth along the instance-frame y-axis, ascending.
    AxisY,
}

/// Resolve the emitter's modifiers into the frame its particles live in,
/// sampling each magnitude once for the tick.
pub(crate) fn resolve_modifiers(
    emitter: &mut Emitter,
    proto: &EmitterPrototype,
    transform: &InstanceTransform,
    out: &mut Vec<ResolvedModifier>,
) {
    out.clear();
    let t_e = emitter.normalized_time(proto);
    for modifier in &proto.modifiers {
        let magnitude = modifier.magnitude.evaluate(t_e, &mut emitter.rng);
        let local_anchor = proto.position + Vec2::from_angle(proto.rotation).rotate(modifier.position);
        let local_angle = proto.rotation + modifier.rotation;

        let world_framed = proto.space == EmissionSpace::World && modifier.space == ModifierSpace::World;
        let (anchor, angle, max_distance) = if world_framed {
            (
                transform.transform_point(local_anchor),
                transform.rotation + local_angle,
                modifier.max_distance.map(|d| d * transform.scale),
            )
        } else {
            (local_anchor, local_angle, modifier.max_distance)
        };

        let axes = Vec2::from_angle(angle);
        out.push(ResolvedModifier {
            kind: modifier.kind,
            magnitude,
            anchor,
            forward: axes.rotate(Vec2::Y),
            side: axes.rotate(Vec2::X),
            max_distance,
        });
    }
}

/// Age, animate, integrate and sort one emitter's particles.
///
/// `depth_sort` is off for reload replay ticks, which keep spawn order;
/// sort keys are still produced so the next live update sorts as usual.
#[allow(clippy::too_many_arguments)]
pub(crate) fn simulate(
    emitter: &mut Emitter,
    proto: &EmitterPrototype,
    transform: &InstanceTransform,
    dt: f32,
    animation: Option<&AnimationData>,
    modifiers: &[ResolvedModifier],
    sort_order: SortOrder,
    depth_sort: bool,
) {
    let space = proto.space;
    for particle in emitter.pool.particles_mut() {
        let pre_age = (particle.max_life - particle.time_left).max(0.0);
        if let Some(anim) = animation {
            particle.tile_index = anim.tile_for(pre_age, particle.max_life);
        }

        let dt_eff = (dt - particle.spawn_offset).max(0.0);
        particle.spawn_offset = 0.0;
        particle.time_left -= dt_eff;
        if particle.time_left < 0.0 {
            continue;
        }

        let t_p = particle.normalized_age();
        let mut curve_rng = crate::rng::Lcg::new(particle.initial_seed);
        let curves = &proto.curves;
        particle.size = particle.spawn_size * curves.scale.evaluate(t_p, &mut curve_rng);
        let tint = Vec4::new(
            curves.red.evaluate(t_p, &mut curve_rng),
            curves.green.evaluate(t_p, &mut curve_rng),
            curves.blue.evaluate(t_p, &mut curve_rng),
            curves.alpha.evaluate(t_p, &mut curve_rng),
        );
        particle.color = particle.spawn_color * tint;
        particle.rotation = particle.spawn_rotation + curves.rotation.evaluate(t_p, &mut curve_rng);

        particle.position += particle.velocity * dt_eff;
        for modifier in modifiers {
            modifier.apply(particle, dt_eff);
        }

        particle.sort_key = match sort_order {
            SortOrder::Age => t_p,
            SortOrder::AxisY => match space {
                EmissionSpace::World => transform.inverse_point(particle.position).y,
                EmissionSpace::Emitter => particle.position.y,
            },
        };
    }

    // Expired particles go out the same tick their time runs negative.
    let mut i = 0;
    while i < emitter.pool.len() {
        if emitter.pool.particles()[i].time_left < 0.0 {
            emitter.pool.swap_remove(i);
        } else {
            i += 1;
        }
    }

    if depth_sort {
        emitter.pool.sort_by_key(|p| p.sort_key);
    }
    emitter.settle();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::{EmitterProperties, ParticleCurves, PlayMode};
    use crate::render::BlendMode;
    use crate::spawn::{spawn_particles, SpawnParams};
    use crate::spline::Property;

    fn proto(rate: f32, life: f32) -> EmitterPrototype {
        let mut properties = EmitterProperties::default();
        properties.spawn_rate = Property::constant(rate);
        properties.particle_life = Property::constant(life);
        EmitterPrototype {
            id_hash: 0,
            space: EmissionSpace::World,
            duration: 1.0,
            start_delay: 0.0,
            play_mode: PlayMode::Loop,
            max_particle_count: 64,
            blend_mode: BlendMode::Alpha,
            material_hash: 0,
            animation_hash: 0,
            inherit_velocity: 0.0,
            position: glam::Vec2::ZERO,
            rotation: 0.0,
            properties,
            curves: ParticleCurves::default(),
            modifiers: Vec::new(),
        }
    }

    fn identity() -> InstanceTransform {
        InstanceTransform {
            position: glam::Vec2::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    fn tick(e: &mut Emitter, p: &EmitterPrototype, transform: &InstanceTransform, dt: f32) {
        let window = e.advance(p, dt);
        let params = SpawnParams { transform, instance_velocity: glam::Vec2::ZERO };
        spawn_particles(e, p, &params, window, dt);
        simulate(e, p, transform, dt, None, &[], SortOrder::Age, true);
    }

    #[test]
    fn test_particle_ages_full_dt_on_spawn_tick() {
        let p = proto(1.0, 1.0);
        let mut e = Emitter::new(1, 64);
        e.start();
        let t = identity();
        tick(&mut e, &p, &t, 1.0);
        assert_eq!(e.pool.len(), 1);
        assert_eq!(e.pool.particles()[0].time_left, 0.0);
    }

    #[test]
    fn test_expired_removed_next_tick() {
        let p = proto(1.0, 1.0);
        let mut e = Emitter::new(1, 64);
        e.start();
        let t = identity();
        tick(&mut e, &p, &t, 1.0);
        // The first particle expires while a fresh one replaces it.
        tick(&mut e, &p, &t, 1.0);
        assert_eq!(e.pool.len(), 1);
        assert_eq!(e.pool.particles()[0].time_left, 0.0);
    }

    #[test]
    fn test_youngest_sorts_first() {
        let p = proto(1.0, 4.0);
        let mut e = Emitter::new(1, 64);
        e.start();
        let t = identity();
        tick(&mut e, &p, &t, 1.0);
        tick(&mut e, &p, &t, 1.0);
        let particles = e.pool.particles();
        assert_eq!(particles.len(), 2);
        assert!(particles[0].time_left > particles[1].time_left);
    }

    #[test]
    fn test_integration_moves_particles() {
        let mut p = proto(1.0, 10.0);
        p.properties.particle_speed = Property::constant(2.0);
        let mut e = Emitter::new(1, 64);
        e.start();
        let t = identity();
        tick(&mut e, &p, &t, 1.0);
        // Spawned along the emitter's y-axis, integrated for the full tick.
        assert_eq!(e.pool.particles()[0].position, glam::Vec2::new(0.0, 2.0));
    }
}
