//! Force-field modifiers acting on all particles of an emitter.
//!
//! Modifiers are a closed set, expressed as a tagged variant and dispatched
//! with a match. Each modifier has an anchor and rotation in the emitter's
//! local frame, a `space` selector, an optional `max_distance` cutoff and a
//! magnitude property evaluated against the emitter's normalized time.
//!
//! | Modifier | Effect |
//! |----------|--------|
//! | Acceleration | `v += magnitude * dir * dt`, `dir` defaulting to the modifier's y-axis |
//! | Drag | `v -= min(\|v\|, magnitude * dt) * v_hat`, never flips the sign |
//! | Radial | push away from (or toward, for negative magnitude) the anchor |
//! | Vortex | tangential push around the anchor |

use crate::particle::Particle;
use crate::spline::Property;
use glam::Vec2;
use serde::Deserialize;

/// Frame a modifier's anchor and axes are resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierSpace {
    /// Anchor is moved with the instance transform.
    World,
    /// Anchor stays in the emitter's local frame.
    #[default]
    Emitter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ModifierKind {
    Acceleration {
        /// Explicit unit direction; `None` uses the modifier's y-axis.
        direction: Option<Vec2>,
    },
    Drag {
        /// When set, only the velocity component along the modifier's
        /// y-axis is dampened.
        directional: bool,
    },
    Radial,
    Vortex,
}

#[derive(Debug, Clone)]
pub(crate) struct Modifier {
    pub kind: ModifierKind,
    pub magnitude: Property,
    pub space: ModifierSpace,
    /// Anchor in the emitter's local frame.
    pub position: Vec2,
    /// Rotation of the modifier frame, radians.
    pub rotation: f32,
    /// Particles farther than this from the anchor are unaffected.
    pub max_distance: Option<f32>,
}

/// A modifier resolved into the frame its emitter's particles live in,
/// with the magnitude already sampled for the tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedModifier {
    pub kind: ModifierKind,
    pub magnitude: f32,
    pub anchor: Vec2,
    /// The modifier's y-axis in the particle frame.
    pub forward: Vec2,
    /// The modifier's x-axis in the particle frame.
    pub side: Vec2,
    /// Cutoff distance, already scaled where the frame is scaled.
    pub max_distance: Option<f32>,
}

impl ResolvedModifier {
    /// Apply the modifier to one particle's velocity.
    pub fn apply(&self, particle: &mut Particle, dt: f32) {
        match self.kind {
            ModifierKind::Acceleration { direction } => {
                let dir = direction.unwrap_or(self.forward);
                particle.velocity += dir * (self.magnitude * dt);
            }
            ModifierKind::Drag { directional } => {
                if directional {
                    let along = particle.velocity.dot(self.forward);
                    let decel = (self.magnitude * dt).max(0.0).min(along.abs());
                    particle.velocity -= self.forward * (decel * along.signum());
                } else {
                    let speed = particle.velocity.length();
                    if speed > 0.0 {
                        let decel = (self.magnitude * dt).max(0.0).min(speed);
                        particle.velocity -= particle.velocity * (decel / speed);
                    }
                }
            }
            ModifierKind::Radial => {
                let delta = particle.position - self.anchor;
                let distance = delta.length();
                if self.out_of_range(distance) {
                    return;
                }
                // A particle sitting on the anchor is pushed along the
                // modifier's forward axis.
                let dir = if distance > 0.0 { delta / distance } else { self.forward };
                particle.velocity += dir * (self.magnitude * dt);
            }
            ModifierKind::Vortex => {
                let delta = particle.position - self.anchor;
                let distance = delta.length();
                if self.out_of_range(distance) {
                    return;
                }
                let tangent = if distance > 0.0 {
                    delta.perp() / distance
                } else {
                    self.side
                };
                particle.velocity += tangent * (self.magnitude * dt);
            }
        }
    }

    #[inline]
    fn out_of_range(&self, distance: f32) -> bool {
        matches!(self.max_distance, Some(max) if distance > max)
    }
}
