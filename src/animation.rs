//! Flipbook animation playback.
//!
//! Animation data lives with the host: emitters only carry an opaque tile
//! source handle and an animation name hash. Once per emitter per tick the
//! engine asks the host for [`AnimationData`] through the fetch callback and
//! drives each particle's tile index from its age.
//!
//! Tiles are numbered from 1, the way flipbook editors count them; the UV
//! rectangle for tile `n` is `tex_coords[n - 1]`.

use crate::error::FetchError;
use std::rc::Rc;

/// Opaque host handle naming a tile source. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileSourceHandle(pub u64);

/// Opaque host handle naming a texture. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureHandle(pub u64);

/// One tile's UV rectangle: `(u0, v0)` top-left, `(u1, v1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TexRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// Flipbook playback mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    /// Hold the start tile.
    #[default]
    None,
    /// Advance once over the particle's lifetime, clamped to the end tile.
    OnceForward,
    /// Reverse once over the particle's lifetime.
    OnceBackward,
    /// Advance at `fps`, wrapping.
    LoopForward,
    /// Reverse at `fps`, wrapping.
    LoopBackward,
    /// Bounce between the end tiles at `fps`.
    PingPong,
}

/// Animation data fetched from the host per emitter per tick.
#[derive(Debug, Clone)]
pub struct AnimationData {
    pub texture: TextureHandle,
    /// UV rectangles for all tiles of the source image.
    pub tex_coords: Rc<[TexRect]>,
    /// Tile pixel dimensions, used to keep the particle quad's aspect.
    pub tile_width: u32,
    pub tile_height: u32,
    /// First tile of the animation, numbered from 1.
    pub start_tile: u32,
    /// Last tile of the animation, inclusive.
    pub end_tile: u32,
    /// Playback speed for the looping modes.
    pub fps: u32,
    pub playback: Playback,
}

/// Result type of the host's animation fetch callback.
pub type FetchResult = Result<AnimationData, FetchError>;

impl AnimationData {
    /// Number of tiles in the animation.
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.end_tile.saturating_sub(self.start_tile) + 1
    }

    /// Tile shown for a particle of the given age.
    ///
    /// `age` is the particle's age at the start of the tick, so a particle
    /// spawned this tick shows the first frame of its animation.
    pub(crate) fn tile_for(&self, age: f32, max_life: f32) -> u32 {
        let n = self.tile_count();
        if n <= 1 {
            return self.start_tile;
        }
        match self.playback {
            Playback::None => self.start_tile,
            Playback::OnceForward => {
                let step = once_step(age, max_life, n);
                self.start_tile + step
            }
            Playback::OnceBackward => {
                let step = once_step(age, max_life, n);
                self.end_tile - step
            }
            Playback::LoopForward => {
                let frame = (age * self.fps as f32).floor() as u32;
                self.start_tile + frame % n
            }
            Playback::LoopBackward => {
                let frame = (age * self.fps as f32).floor() as u32;
                self.end_tile - frame % n
            }
            Playback::PingPong => {
                let period = 2 * n - 2;
                let frame = (age * self.fps as f32).floor() as u32 % period;
                let step = if frame < n { frame } else { period - frame };
                self.start_tile + step
            }
        }
    }
}

/// Step for the once modes: the animation spans the whole lifetime.
#[inline]
fn once_step(age: f32, max_life: f32, n: u32) -> u32 {
    if max_life <= 0.0 {
        return 0;
    }
    let t = (age / max_life).clamp(0.0, 1.0);
    ((t * n as f32).floor() as u32).min(n - 1)
}
