// Copyright voxel-core contributors, MIT License.

//! The process/scene-wide color atlas: a compacted, deduplicated pool of
//! RGBA colors referenced by one or more [`crate::palette::Palette`]s.
//!
//! Grounded on `all-is-cubes`'s texture-allocator pattern (a pooled,
//! index-addressed resource with a free list) adapted from textures to
//! flat colors, per `spec.md` §3/§4.1.

use std::collections::HashMap;

use crate::math::Rgba;

/// Side length of the square the atlas may be packed into for upload as a
/// 2D texture (`spec.md` §3). A compile-time constant, like the chunk size.
/// Matches `original_source/core/config.h`'s `COLOR_ATLAS_SIZE`.
pub const ATLAS_SIZE: usize = 512;

/// Maximum number of unique colors the atlas can hold.
pub const ATLAS_CAPACITY: usize = ATLAS_SIZE * ATLAS_SIZE / 2;

/// Index into the [`ColorAtlas`].
pub type AtlasIndex = u32;

#[derive(Debug)]
struct Slot {
    color: Rgba,
    /// Precomputed ambient-occlusion tint: a darkened variant of `color`
    /// blended toward black, used by the mesher to avoid a per-vertex
    /// shader multiply (`spec.md` §3: "plus their complementary colors for
    /// ambient-occlusion tinting").
    ao_tint: Rgba,
    refcount: u32,
}

fn ao_tint_of(color: Rgba) -> Rgba {
    const DARKEN: f32 = 0.6;
    Rgba::new(
        color.red() * DARKEN,
        color.green() * DARKEN,
        color.blue() * DARKEN,
        color.alpha(),
    )
}

/// A pool of unique colors, deduplicated and refcounted, shared by any
/// number of palettes.
#[derive(Debug, Default)]
pub struct ColorAtlas {
    slots: Vec<Option<Slot>>,
    free_list: Vec<AtlasIndex>,
    reverse: HashMap<u32, AtlasIndex>,
    dirty_min: Option<AtlasIndex>,
    dirty_max: Option<AtlasIndex>,
}

/// Error returned when the atlas cannot accommodate a new color.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("color atlas is full ({ATLAS_CAPACITY} entries)")]
pub struct AtlasFull;

impl ColorAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or allocates an atlas index for `color`, incrementing its
    /// refcount. Colors already present are deduplicated in O(1).
    pub fn acquire(&mut self, color: Rgba) -> Result<AtlasIndex, AtlasFull> {
        if let Some(&index) = self.reverse.get(&color.packed()) {
            self.slots[index as usize].as_mut().unwrap().refcount += 1;
            return Ok(index);
        }
        let index = if let Some(index) = self.free_list.pop() {
            index
        } else if self.slots.len() < ATLAS_CAPACITY {
            let index = self.slots.len() as AtlasIndex;
            self.slots.push(None);
            index
        } else {
            return Err(AtlasFull);
        };
        self.slots[index as usize] = Some(Slot {
            color,
            ao_tint: ao_tint_of(color),
            refcount: 1,
        });
        self.reverse.insert(color.packed(), index);
        self.mark_dirty(index);
        Ok(index)
    }

    /// Decrements the refcount for `index`; frees the slot on reaching
    /// zero.
    pub fn release(&mut self, index: AtlasIndex) {
        let Some(slot) = self.slots[index as usize].as_mut() else {
            log::warn!("ColorAtlas::release on already-free index {index}");
            return;
        };
        slot.refcount -= 1;
        if slot.refcount == 0 {
            let color = slot.color;
            self.slots[index as usize] = None;
            self.reverse.remove(&color.packed());
            self.free_list.push(index);
        }
    }

    /// Replaces the color stored at `index` in place (used when a
    /// palette entry's color is edited while still referencing the same
    /// atlas slot would be wrong — callers should instead release+acquire
    /// unless they know the slot is uniquely referenced; exposed for the
    /// single-owner repaint fast path).
    pub fn set_color(&mut self, index: AtlasIndex, color: Rgba) {
        if let Some(slot) = self.slots[index as usize].as_mut() {
            self.reverse.remove(&slot.color.packed());
            slot.color = color;
            slot.ao_tint = ao_tint_of(color);
            self.reverse.insert(color.packed(), index);
            self.mark_dirty(index);
        }
    }

    pub fn color(&self, index: AtlasIndex) -> Option<Rgba> {
        self.slots[index as usize].as_ref().map(|s| s.color)
    }

    pub fn ao_tint(&self, index: AtlasIndex) -> Option<Rgba> {
        self.slots[index as usize].as_ref().map(|s| s.ao_tint)
    }

    fn mark_dirty(&mut self, index: AtlasIndex) {
        self.dirty_min = Some(self.dirty_min.map_or(index, |m| m.min(index)));
        self.dirty_max = Some(self.dirty_max.map_or(index, |m| m.max(index)));
    }

    /// Returns and clears the `[min, max]` range of indices changed since
    /// the last call, for the renderer to re-upload.
    pub fn take_dirty_range(&mut self) -> Option<(AtlasIndex, AtlasIndex)> {
        let range = self.dirty_min.zip(self.dirty_max);
        self.dirty_min = None;
        self.dirty_max = None;
        range
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
