//! Vertex emission and draw batching.
//!
//! After simulation each emitter writes six vertices per visible particle
//! into the caller-supplied buffer, two triangles in "N" order: lower-left,
//! upper-left, lower-right, then lower-right, upper-left, upper-right. UVs
//! are quantized to 16-bit fixed point and colors to premultiplied RGBA8.
//!
//! The writer never overruns the buffer: when the remaining space cannot
//! hold a whole particle the emitter is truncated there and the written byte
//! count reported by `update` reflects it.

use crate::animation::{AnimationData, TextureHandle};
use crate::instance::InstanceTransform;
use crate::particle::Particle;
use crate::prototype::EmissionSpace;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use serde::Deserialize;

/// Blend mode of an emitter, forwarded untouched to the render callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Standard alpha blending (default).
    #[default]
    Alpha,
    /// Additive blending, for glows and fire.
    Additive,
    /// Multiplicative blending, for smoke and shadows.
    Multiply,
}

/// Packed particle vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Texture coordinates quantized to `u * 65535`.
    pub u: u16,
    pub v: u16,
    /// Premultiplied RGBA.
    pub color: [u8; 4],
}

/// Bytes needed to hold the vertices of `n` particles.
pub const fn vertex_buffer_size(particle_count: usize) -> usize {
    particle_count * 6 * std::mem::size_of::<Vertex>()
}

/// A caller-side uniform override forwarded to the render callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConstant {
    pub name_hash: u64,
    pub value: Vec4,
}

/// One emitter's draw data for a frame.
#[derive(Debug)]
pub struct RenderBatch<'a> {
    /// Hash of the emitter's material name.
    pub material: u64,
    /// Texture resolved by the animation fetch.
    pub texture: TextureHandle,
    pub blend_mode: BlendMode,
    /// First vertex of the batch, as an index into the vertex buffer.
    pub vertex_index: usize,
    pub vertex_count: usize,
    /// Render-constant overrides whose emitter id matches this emitter.
    pub constants: &'a [RenderConstant],
}

/// Write quads for an emitter's sorted particles.
///
/// `cursor` is a byte offset into `out` and is advanced past every whole
/// particle written. Returns the number of vertices written.
pub(crate) fn write_quads(
    out: &mut [u8],
    cursor: &mut usize,
    particles: &[Particle],
    animation: &AnimationData,
    space: EmissionSpace,
    transform: &InstanceTransform,
) -> usize {
    const QUAD_BYTES: usize = 6 * std::mem::size_of::<Vertex>();

    if animation.tex_coords.is_empty() {
        return 0;
    }
    let (width_factor, height_factor) = aspect_factors(animation.tile_width, animation.tile_height);
    let mut written = 0;
    for particle in particles {
        if *cursor + QUAD_BYTES > out.len() {
            break;
        }

        let (position, rotation) = match space {
            EmissionSpace::World => (particle.position, particle.rotation),
            EmissionSpace::Emitter => (
                transform.transform_point(particle.position),
                particle.rotation + transform.rotation,
            ),
        };

        let half_w = 0.5 * particle.size * width_factor;
        let half_h = 0.5 * particle.size * height_factor;
        let axis = Vec2::from_angle(rotation);
        let ex = axis * half_w;
        let ey = axis.perp() * half_h;

        let tile = particle.tile_index.max(1) as usize - 1;
        let rect = animation.tex_coords[tile.min(animation.tex_coords.len().saturating_sub(1))];
        let u0 = quantize(rect.u0);
        let v0 = quantize(rect.v0);
        let u1 = quantize(rect.u1);
        let v1 = quantize(rect.v1);
        let color = pack_color(particle.color);

        let lower_left = position - ex - ey;
        let upper_left = position - ex + ey;
        let lower_right = position + ex - ey;
        let upper_right = position + ex + ey;

        let quad = [
            vertex(lower_left, u0, v1, color),
            vertex(upper_left, u0, v0, color),
            vertex(lower_right, u1, v1, color),
            vertex(lower_right, u1, v1, color),
            vertex(upper_left, u0, v0, color),
            vertex(upper_right, u1, v0, color),
        ];
        out[*cursor..*cursor + QUAD_BYTES].copy_from_slice(bytemuck::cast_slice(&quad));
        *cursor += QUAD_BYTES;
        written += 6;
    }
    written
}

/// Aspect-preserving quad factors: the longer tile axis maps to `size`.
fn aspect_factors(tile_width: u32, tile_height: u32) -> (f32, f32) {
    if tile_width == 0 || tile_height == 0 {
        return (1.0, 1.0);
    }
    if tile_width > tile_height {
        (1.0, tile_height as f32 / tile_width as f32)
    } else {
        (tile_width as f32 / tile_height as f32, 1.0)
    }
}

#[inline]
fn vertex(p: Vec2, u: u16, v: u16, color: [u8; 4]) -> Vertex {
    Vertex { x: p.x, y: p.y, z: 0.0, u, v, color }
}

#[inline]
fn quantize(uv: f32) -> u16 {
    (uv.clamp(0.0, 1.0) * 65535.0) as u16
}

#[inline]
fn pack_color(color: Vec4) -> [u8; 4] {
    let alpha = color.w.clamp(0.0, 1.0);
    let channel = |c: f32| (c.clamp(0.0, 1.0) * alpha * 255.0 + 0.5) as u8;
    [
        channel(color.x),
        channel(color.y),
        channel(color.z),
        (alpha * 255.0 + 0.5) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Playback, TexRect};
    use std::rc::Rc;

    fn unit_animation(tile_width: u32, tile_height: u32) -> AnimationData {
        AnimationData {
            texture: TextureHandle(0),
            tex_coords: Rc::from(vec![TexRect { u0: 0.0, v0: 0.0, u1: 1.0, v1: 1.0 }]),
            tile_width,
            tile_height,
            start_tile: 1,
            end_tile: 1,
            fps: 0,
            playback: Playback::None,
        }
    }

    fn particle(size: f32) -> Particle {
        Particle {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            size,
            spawn_size: size,
            rotation: 0.0,
            spawn_rotation: 0.0,
            color: Vec4::ONE,
            spawn_color: Vec4::ONE,
            time_left: 1.0,
            max_life: 1.0,
            tile_index: 1,
            initial_seed: 0,
            sort_key: 0.0,
            spawn_offset: 0.0,
        }
    }

    fn identity() -> InstanceTransform {
        InstanceTransform { position: Vec2::ZERO, rotation: 0.0, scale: 1.0 }
    }

    fn quad_of(buffer: &[u8]) -> &[Vertex] {
        bytemuck::cast_slice(&buffer[..6 * std::mem::size_of::<Vertex>()])
    }

    #[test]
    fn test_buffer_size_for_one_particle() {
        assert_eq!(vertex_buffer_size(1), 6 * std::mem::size_of::<Vertex>());
    }

    #[test]
    fn test_n_order_uvs() {
        let mut buffer = vec![0u8; vertex_buffer_size(1)];
        let mut cursor = 0;
        let anim = unit_animation(1, 1);
        let count = write_quads(&mut buffer, &mut cursor, &[particle(1.0)], &anim, EmissionSpace::World, &identity());
        assert_eq!(count, 6);
        let quad = quad_of(&buffer);
        let uvs: Vec<(u16, u16)> = quad.iter().map(|v| (v.u, v.v)).collect();
        assert_eq!(
            uvs,
            vec![(0, 65535), (0, 0), (65535, 65535), (65535, 65535), (0, 0), (65535, 0)]
        );
    }

    #[test]
    fn test_aspect_preserving_dims() {
        let mut buffer = vec![0u8; vertex_buffer_size(1)];
        let mut cursor = 0;
        let anim = unit_animation(2, 3);
        write_quads(&mut buffer, &mut cursor, &[particle(1.0)], &anim, EmissionSpace::World, &identity());
        let quad = quad_of(&buffer);
        let width = ((quad[0].x - quad[2].x).powi(2) + (quad[0].y - quad[2].y).powi(2)).sqrt();
        let height = ((quad[0].x - quad[1].x).powi(2) + (quad[0].y - quad[1].y).powi(2)).sqrt();
        assert!((width - 2.0 / 3.0).abs() < 1e-6);
        assert!((height - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_truncates_at_last_whole_particle() {
        // Room for one particle, two offered.
        let mut buffer = vec![0u8; vertex_buffer_size(1)];
        let mut cursor = 0;
        let anim = unit_animation(1, 1);
        let particles = [particle(1.0), particle(2.0)];
        let count = write_quads(&mut buffer, &mut cursor, &particles, &anim, EmissionSpace::World, &identity());
        assert_eq!(count, 6);
        assert_eq!(cursor, vertex_buffer_size(1));
    }

    #[test]
    fn test_emitter_space_transforms_at_render() {
        let mut buffer = vec![0u8; vertex_buffer_size(1)];
        let mut cursor = 0;
        let anim = unit_animation(1, 1);
        let transform = InstanceTransform { position: Vec2::new(5.0, 0.0), rotation: 0.0, scale: 1.0 };
        write_quads(&mut buffer, &mut cursor, &[particle(1.0)], &anim, EmissionSpace::Emitter, &transform);
        let quad = quad_of(&buffer);
        let center_x = (quad[0].x + quad[5].x) * 0.5;
        assert!((center_x - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_premultiplied_color() {
        assert_eq!(pack_color(Vec4::new(1.0, 0.5, 0.0, 0.5)), [128, 64, 0, 128]);
    }
}
