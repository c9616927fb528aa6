//! Animatable scalar properties.
//!
//! Almost every tunable value in an effect description is a [`Property`]:
//! either a constant or a cubic Hermite spline over normalized time, with an
//! optional symmetric random spread applied once at sample time.
//!
//! Emitter-wide properties are sampled against the emitter's normalized time
//! `timer / duration`; per-particle curves are sampled against the particle's
//! normalized age `1 - time_left / max_life`.

use crate::rng::Lcg;

/// One key point of a Hermite spline.
///
/// The tangent is expressed as a direction `(tx, ty)` per unit x, so a key
/// with tangent `(1, 0)` is flat and `(1, 1)` rises at 45 degrees in
/// normalized-time space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineKey {
    /// Normalized time of the key, in [0, 1].
    pub t: f32,
    /// Value at the key.
    pub value: f32,
    /// Tangent x component.
    pub tx: f32,
    /// Tangent y component.
    pub ty: f32,
}

/// The animatable part of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A fixed value.
    Constant(f32),
    /// A cubic Hermite spline over keys with strictly increasing `t`.
    Spline(Vec<SplineKey>),
}

/// A scalar property: constant or spline, plus an optional spread.
///
/// `spread` is the half-width of a uniform random offset added once per
/// sample. A generator draw happens on every evaluation, spread or not, so
/// replaying a particle from its captured seed consumes the generator in
/// exactly the same pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value: PropertyValue,
    pub spread: f32,
}

impl Property {
    /// A constant property without spread.
    pub fn constant(value: f32) -> Self {
        Self {
            value: PropertyValue::Constant(value),
            spread: 0.0,
        }
    }

    /// Sample the property at normalized time `t`, clamped to [0, 1].
    pub fn evaluate(&self, t: f32, rng: &mut Lcg) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let base = match &self.value {
            PropertyValue::Constant(v) => *v,
            PropertyValue::Spline(keys) => sample_spline(keys, t),
        };
        base + rng.uniform(-self.spread, self.spread)
    }
}

/// Evaluate a Hermite spline at `t`.
///
/// The segment containing `t` is located by binary search; tangents are
/// scaled by the segment width so they are expressed per unit of the
/// normalized parameter.
fn sample_spline(keys: &[SplineKey], t: f32) -> f32 {
    match keys {
        [] => 0.0,
        [only] => only.value,
        _ => {
            // Index of the first key with key.t > t, so the segment is [hi-1, hi].
            let hi = keys
                .partition_point(|k| k.t <= t)
                .clamp(1, keys.len() - 1);
            let k0 = &keys[hi - 1];
            let k1 = &keys[hi];
            let dt = k1.t - k0.t;
            if dt <= 0.0 {
                return k0.value;
            }
            let u = ((t - k0.t) / dt).clamp(0.0, 1.0);
            let m0 = tangent_slope(k0) * dt;
            let m1 = tangent_slope(k1) * dt;
            hermite(u, k0.value, m0, k1.value, m1)
        }
    }
}

#[inline]
fn tangent_slope(k: &SplineKey) -> f32 {
    if k.tx.abs() < f32::EPSILON {
        0.0
    } else {
        k.ty / k.tx
    }
}

#[inline]
fn hermite(u: f32, p0: f32, m0: f32, p1: f32, m1: f32) -> f32 {
    let u2 = u * u;
    let u3 = u2 * u;
    let h00 = 2.0 * u3 - 3.0 * u2 + 1.0;
    let h10 = u3 - 2.0 * u2 + u;
    let h01 = -2.0 * u3 + 3.0 * u2;
    let h11 = u3 - u2;
    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave_spline() -> Property {
        Property {
            value: PropertyValue::Spline(vec![
                SplineKey { t: 0.00, value: 0.0, tx: 1.0, ty: 0.0 },
                SplineKey { t: 0.25, value: 0.0, tx: 1.0, ty: 1.0 },
                SplineKey { t: 0.50, value: 1.0, tx: 1.0, ty: 0.0 },
                SplineKey { t: 0.75, value: 0.0, tx: 1.0, ty: -1.0 },
                SplineKey { t: 1.00, value: 0.0, tx: 1.0, ty: 0.0 },
            ]),
            spread: 0.0,
        }
    }

    #[test]
    fn test_wave_spline_signs() {
        let p = wave_spline();
        let mut rng = Lcg::new(0);
        assert!(p.evaluate(0.125, &mut rng) < 0.0);
        assert_eq!(p.evaluate(0.25, &mut rng), 0.0);
        assert!(p.evaluate(0.375, &mut rng) > 0.0);
        assert_eq!(p.evaluate(0.5, &mut rng), 1.0);
        assert!(p.evaluate(0.625, &mut rng) > 0.0);
        assert_eq!(p.evaluate(0.75, &mut rng), 0.0);
        assert!(p.evaluate(0.875, &mut rng) < 0.0);
        assert!(p.evaluate(1.0, &mut rng).abs() < 1e-6);
    }

    #[test]
    fn test_clamped_outside_range() {
        let p = wave_spline();
        let mut rng = Lcg::new(0);
        assert_eq!(p.evaluate(-1.0, &mut rng), 0.0);
        assert!(p.evaluate(2.0, &mut rng).abs() < 1e-6);
    }

    #[test]
    fn test_constant_spread_bounds() {
        let p = Property {
            value: PropertyValue::Constant(0.0),
            spread: 1.0,
        };
        let mut rng = Lcg::new(0x5EED);
        for _ in 0..1000 {
            let v = p.evaluate(0.0, &mut rng);
            assert!(v.abs() <= 1.0);
            assert_ne!(v, 0.0);
        }
    }

    #[test]
    fn test_single_key_spline_is_constant() {
        let p = Property {
            value: PropertyValue::Spline(vec![SplineKey { t: 0.0, value: 3.0, tx: 1.0, ty: 0.0 }]),
            spread: 0.0,
        };
        let mut rng = Lcg::new(0);
        assert_eq!(p.evaluate(0.7, &mut rng), 3.0);
    }
}
