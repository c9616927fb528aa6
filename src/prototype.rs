//! Effect prototypes: declarative, hot-reloadable effect descriptions.
//!
//! A prototype is deserialized from a caller-supplied byte buffer holding a
//! JSON document, validated, and shared read-mostly by every instance created
//! from it. [`Prototype::reload`] atomically replaces the content in place;
//! running instances keep their emitters and particles and observe the new
//! description at their next `reload_instance` call.
//!
//! Unknown property keys are not an error: they are logged with a warning
//! and dropped, so older runtimes tolerate newer effect files.

use crate::animation::TileSourceHandle;
use crate::error::ParticleError;
use crate::modifier::{Modifier, ModifierKind, ModifierSpace};
use crate::render::BlendMode;
use crate::spline::{Property, PropertyValue, SplineKey};
use glam::Vec2;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// FNV-1a hash of a name, used for emitter ids, materials, animations and
/// render constants. Hashing on the way in keeps the hot path free of string
/// compares.
pub fn hash_name(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Space particles of an emitter live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionSpace {
    /// Particles are transformed into world space at spawn time.
    #[default]
    World,
    /// Particles stay in emitter-local space and are transformed at render.
    Emitter,
}

/// Whether an emitter plays once or wraps around its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    #[default]
    Once,
    Loop,
}

/// Emitter-wide properties, sampled against the emitter's normalized time.
#[derive(Debug, Clone)]
pub(crate) struct EmitterProperties {
    pub spawn_rate: Property,
    pub particle_life: Property,
    pub particle_speed: Property,
    pub particle_size: Property,
    pub particle_red: Property,
    pub particle_green: Property,
    pub particle_blue: Property,
    pub particle_alpha: Property,
    pub particle_rotation: Property,
}

impl Default for EmitterProperties {
    fn default() -> Self {
        Self {
            spawn_rate: Property::constant(0.0),
            particle_life: Property::constant(1.0),
            particle_speed: Property::constant(0.0),
            particle_size: Property::constant(1.0),
            particle_red: Property::constant(1.0),
            particle_green: Property::constant(1.0),
            particle_blue: Property::constant(1.0),
            particle_alpha: Property::constant(1.0),
            particle_rotation: Property::constant(0.0),
        }
    }
}

/// Per-particle curves, sampled against the particle's normalized age.
///
/// These modulate the values sampled at spawn: `scale` and the color
/// channels multiply, `rotation` adds.
#[derive(Debug, Clone)]
pub(crate) struct ParticleCurves {
    pub scale: Property,
    pub red: Property,
    pub green: Property,
    pub blue: Property,
    pub alpha: Property,
    pub rotation: Property,
}

impl Default for ParticleCurves {
    fn default() -> Self {
        Self {
            scale: Property::constant(1.0),
            red: Property::constant(1.0),
            green: Property::constant(1.0),
            blue: Property::constant(1.0),
            alpha: Property::constant(1.0),
            rotation: Property::constant(0.0),
        }
    }
}

/// Validated, runtime-ready description of one emitter.
#[derive(Debug, Clone)]
pub(crate) struct EmitterPrototype {
    pub id_hash: u64,
    pub space: EmissionSpace,
    pub duration: f32,
    pub start_delay: f32,
    pub play_mode: PlayMode,
    pub max_particle_count: u32,
    pub blend_mode: BlendMode,
    pub material_hash: u64,
    pub animation_hash: u64,
    pub inherit_velocity: f32,
    pub position: Vec2,
    pub rotation: f32,
    pub properties: EmitterProperties,
    pub curves: ParticleCurves,
    pub modifiers: Vec<Modifier>,
}

/// Shared prototype content. Instances hold an `Rc` to this.
pub(crate) struct PrototypeData {
    pub emitters: Vec<EmitterPrototype>,
    pub tile_sources: Vec<Option<TileSourceHandle>>,
}

/// A loaded effect prototype.
///
/// Cloning is cheap and shares the underlying description. The prototype is
/// released when the last clone and the last instance referencing it are
/// dropped.
#[derive(Clone)]
pub struct Prototype {
    pub(crate) inner: Rc<RefCell<PrototypeData>>,
}

impl Prototype {
    /// Deserialize and validate a prototype from a byte buffer.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ParticleError> {
        let desc: EffectDesc = serde_json::from_slice(buffer)?;
        let emitters = convert_effect(desc)?;
        let tile_sources = vec![None; emitters.len()];
        Ok(Self {
            inner: Rc::new(RefCell::new(PrototypeData { emitters, tile_sources })),
        })
    }

    /// Atomically replace the prototype content from a new buffer.
    ///
    /// Emitters and particles of existing instances are not touched; they
    /// pick up the new description at their next `reload_instance`. Tile
    /// sources already assigned stay assigned per emitter index.
    pub fn reload(&self, buffer: &[u8]) -> Result<(), ParticleError> {
        let desc: EffectDesc = serde_json::from_slice(buffer)?;
        let emitters = convert_effect(desc)?;
        let mut data = self.inner.borrow_mut();
        let mut tile_sources = vec![None; emitters.len()];
        for (slot, old) in tile_sources.iter_mut().zip(data.tile_sources.iter()) {
            *slot = *old;
        }
        data.emitters = emitters;
        data.tile_sources = tile_sources;
        Ok(())
    }

    /// Associate an opaque tile-source handle with an emitter.
    ///
    /// The handle is passed unchanged to the animation fetch callback.
    pub fn set_tile_source(&self, emitter_index: usize, handle: TileSourceHandle) {
        let mut data = self.inner.borrow_mut();
        if let Some(slot) = data.tile_sources.get_mut(emitter_index) {
            *slot = Some(handle);
        } else {
            log::warn!(
                "set_tile_source: emitter index {} out of range ({} emitters)",
                emitter_index,
                data.tile_sources.len()
            );
        }
    }

    /// Number of emitters in the current description.
    pub fn emitter_count(&self) -> usize {
        self.inner.borrow().emitters.len()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EffectDesc {
    #[serde(default)]
    emitters: Vec<EmitterDesc>,
}

fn default_duration() -> f32 {
    1.0
}

fn default_max_particle_count() -> u32 {
    16
}

#[derive(Deserialize)]
struct EmitterDesc {
    #[serde(default)]
    id: String,
    #[serde(default)]
    space: EmissionSpace,
    #[serde(default = "default_duration")]
    duration: f32,
    #[serde(default)]
    start_delay: f32,
    #[serde(default)]
    play_mode: PlayMode,
    #[serde(default = "default_max_particle_count")]
    max_particle_count: u32,
    #[serde(default)]
    blend_mode: BlendMode,
    #[serde(default)]
    material: String,
    #[serde(default)]
    animation: String,
    #[serde(default)]
    inherit_velocity: f32,
    #[serde(default)]
    position: [f32; 2],
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    properties: HashMap<String, PropertyDesc>,
    #[serde(default)]
    particle_properties: HashMap<String, PropertyDesc>,
    #[serde(default)]
    modifiers: Vec<ModifierDesc>,
}

/// Property wire form. A bare number is shorthand for a constant.
#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyDesc {
    Value(f32),
    Constant {
        constant: f32,
        #[serde(default)]
        spread: f32,
    },
    Spline {
        spline: Vec<[f32; 4]>,
        #[serde(default)]
        spread: f32,
    },
}

impl Default for PropertyDesc {
    fn default() -> Self {
        PropertyDesc::Value(0.0)
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModifierDesc {
    Acceleration {
        #[serde(default)]
        magnitude: PropertyDesc,
        #[serde(default)]
        direction: Option<[f32; 2]>,
        #[serde(flatten)]
        common: ModifierCommon,
    },
    Drag {
        #[serde(default)]
        magnitude: PropertyDesc,
        #[serde(default)]
        directional: bool,
        #[serde(flatten)]
        common: ModifierCommon,
    },
    Radial {
        #[serde(default)]
        magnitude: PropertyDesc,
        #[serde(flatten)]
        common: ModifierCommon,
    },
    Vortex {
        #[serde(default)]
        magnitude: PropertyDesc,
        #[serde(flatten)]
        common: ModifierCommon,
    },
}

#[derive(Deserialize, Default)]
struct ModifierCommon {
    #[serde(default)]
    position: [f32; 2],
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    space: ModifierSpace,
    #[serde(default)]
    max_distance: Option<f32>,
}

// ---------------------------------------------------------------------------
// Conversion & validation
// ---------------------------------------------------------------------------

fn convert_effect(desc: EffectDesc) -> Result<Vec<EmitterPrototype>, ParticleError> {
    desc.emitters
        .into_iter()
        .enumerate()
        .map(|(i, e)| convert_emitter(e, i))
        .collect()
}

fn convert_emitter(desc: EmitterDesc, index: usize) -> Result<EmitterPrototype, ParticleError> {
    if desc.duration <= 0.0 {
        return Err(ParticleError::InvalidPrototype(format!(
            "emitter {}: duration must be > 0, got {}",
            index, desc.duration
        )));
    }
    if desc.max_particle_count == 0 {
        return Err(ParticleError::InvalidPrototype(format!(
            "emitter {}: max_particle_count must be > 0",
            index
        )));
    }

    let mut properties = EmitterProperties::default();
    for (key, value) in desc.properties {
        let property = convert_property(value, index, &key)?;
        match key.as_str() {
            "spawn_rate" => properties.spawn_rate = property,
            "particle_life" => properties.particle_life = property,
            "particle_speed" => properties.particle_speed = property,
            "particle_size" => properties.particle_size = property,
            "particle_red" => properties.particle_red = property,
            "particle_green" => properties.particle_green = property,
            "particle_blue" => properties.particle_blue = property,
            "particle_alpha" => properties.particle_alpha = property,
            "particle_rotation" => properties.particle_rotation = property,
            other => {
                log::warn!("emitter {}: unknown emitter property '{}', dropped", index, other);
            }
        }
    }

    let mut curves = ParticleCurves::default();
    for (key, value) in desc.particle_properties {
        let property = convert_property(value, index, &key)?;
        match key.as_str() {
            "scale" => curves.scale = property,
            "red" => curves.red = property,
            "green" => curves.green = property,
            "blue" => curves.blue = property,
            "alpha" => curves.alpha = property,
            "rotation" => curves.rotation = property,
            other => {
                log::warn!("emitter {}: unknown particle property '{}', dropped", index, other);
            }
        }
    }

    let modifiers = desc
        .modifiers
        .into_iter()
        .map(|m| convert_modifier(m, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EmitterPrototype {
        id_hash: hash_name(&desc.id),
        space: desc.space,
        duration: desc.duration,
        start_delay: desc.start_delay.max(0.0),
        play_mode: desc.play_mode,
        max_particle_count: desc.max_particle_count,
        blend_mode: desc.blend_mode,
        material_hash: hash_name(&desc.material),
        animation_hash: hash_name(&desc.animation),
        inherit_velocity: desc.inherit_velocity,
        position: Vec2::from(desc.position),
        rotation: desc.rotation,
        properties,
        curves,
        modifiers,
    })
}

fn convert_property(desc: PropertyDesc, emitter: usize, key: &str) -> Result<Property, ParticleError> {
    let (value, spread) = match desc {
        PropertyDesc::Value(v) => (PropertyValue::Constant(v), 0.0),
        PropertyDesc::Constant { constant, spread } => (PropertyValue::Constant(constant), spread),
        PropertyDesc::Spline { spline, spread } => {
            let keys: Vec<SplineKey> = spline
                .iter()
                .map(|[t, value, tx, ty]| SplineKey { t: *t, value: *value, tx: *tx, ty: *ty })
                .collect();
            let mut prev = -1.0f32;
            for k in &keys {
                if !(0.0..=1.0).contains(&k.t) || k.t <= prev {
                    return Err(ParticleError::InvalidPrototype(format!(
                        "emitter {}: property '{}' spline keys must be strictly increasing in [0, 1]",
                        emitter, key
                    )));
                }
                prev = k.t;
            }
            (PropertyValue::Spline(keys), spread)
        }
    };
    if spread < 0.0 {
        return Err(ParticleError::InvalidPrototype(format!(
            "emitter {}: property '{}' spread must be >= 0",
            emitter, key
        )));
    }
    Ok(Property { value, spread })
}

fn convert_modifier(desc: ModifierDesc, emitter: usize) -> Result<Modifier, ParticleError> {
    let (kind, magnitude, common) = match desc {
        ModifierDesc::Acceleration { magnitude, direction, common } => {
            let direction = direction.map(|d| Vec2::from(d).normalize_or_zero());
            (ModifierKind::Acceleration { direction }, magnitude, common)
        }
        ModifierDesc::Drag { magnitude, directional, common } => {
            (ModifierKind::Drag { directional }, magnitude, common)
        }
        ModifierDesc::Radial { magnitude, common } => (ModifierKind::Radial, magnitude, common),
        ModifierDesc::Vortex { magnitude, common } => (ModifierKind::Vortex, magnitude, common),
    };
    Ok(Modifier {
        kind,
        magnitude: convert_property(magnitude, emitter, "magnitude")?,
        space: common.space,
        position: Vec2::from(common.position),
        rotation: common.rotation,
        max_distance: common.max_distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_prototype() {
        let proto = Prototype::from_bytes(br#"{ "emitters": [ {} ] }"#).unwrap();
        assert_eq!(proto.emitter_count(), 1);
    }

    #[test]
    fn test_empty_effect() {
        let proto = Prototype::from_bytes(br#"{}"#).unwrap();
        assert_eq!(proto.emitter_count(), 0);
    }

    #[test]
    fn test_unknown_property_keys_are_dropped() {
        let proto = Prototype::from_bytes(
            br#"{ "emitters": [ {
                "properties": { "spawn_rate": 1.0, "warp_factor": 9.0 },
                "particle_properties": { "scale": 1.0, "charm": 0.5 }
            } ] }"#,
        )
        .unwrap();
        assert_eq!(proto.emitter_count(), 1);
    }

    #[test]
    fn test_rejects_zero_duration() {
        let err = Prototype::from_bytes(br#"{ "emitters": [ { "duration": 0.0 } ] }"#);
        assert!(matches!(err, Err(ParticleError::InvalidPrototype(_))));
    }

    #[test]
    fn test_rejects_zero_max_particles() {
        let err = Prototype::from_bytes(br#"{ "emitters": [ { "max_particle_count": 0 } ] }"#);
        assert!(matches!(err, Err(ParticleError::InvalidPrototype(_))));
    }

    #[test]
    fn test_rejects_unsorted_spline() {
        let err = Prototype::from_bytes(
            br#"{ "emitters": [ { "properties": {
                "particle_size": { "spline": [[0.5, 0, 1, 0], [0.25, 1, 1, 0]] }
            } } ] }"#,
        );
        assert!(matches!(err, Err(ParticleError::InvalidPrototype(_))));
    }

    #[test]
    fn test_reload_swaps_emitters_and_keeps_tile_sources() {
        let proto = Prototype::from_bytes(br#"{ "emitters": [ {} ] }"#).unwrap();
        proto.set_tile_source(0, TileSourceHandle(0xBAADF00D));
        proto
            .reload(br#"{ "emitters": [ {}, {} ] }"#)
            .unwrap();
        assert_eq!(proto.emitter_count(), 2);
        let data = proto.inner.borrow();
        assert_eq!(data.tile_sources[0], Some(TileSourceHandle(0xBAADF00D)));
        assert_eq!(data.tile_sources[1], None);
    }

    #[test]
    fn test_hash_name_is_stable() {
        assert_eq!(hash_name("tint"), hash_name("tint"));
        assert_ne!(hash_name("tint"), hash_name("emitter"));
    }
}
