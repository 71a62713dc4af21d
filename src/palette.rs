// Copyright voxel-core contributors, MIT License.

//! Per-shape color palette: an 8-bit block-color-index space backed by the
//! shared [`crate::atlas::ColorAtlas`]. See `spec.md` §4.1.

use std::collections::HashMap;

use crate::atlas::{AtlasIndex, ColorAtlas};
use crate::math::Rgba;

/// A palette entry index, `0..=254`. `255` is reserved for air
/// (`crate::shape::AIR_BLOCK`) and never a valid palette entry.
pub type PaletteEntry = u8;

/// Block byte value reserved for air; never a valid [`PaletteEntry`].
pub const AIR_BLOCK_INDEX: u8 = 255;

/// Maximum number of distinct colors a single palette can hold.
pub const PALETTE_CAPACITY: usize = 255;

/// Base hues for the 252-color default palette, each later expanded into
/// three alpha variants. Grounded on
/// `original_source/core/color_palette.c`'s
/// `_color_palette_create_default_colors_2021`.
#[rustfmt::skip]
const DEFAULT_PALETTE_2021_BASE: [[u8; 3]; 84] = [
    [61, 0, 85], [136, 0, 252], [173, 49, 255], [182, 122, 233], [201, 162, 255], [202, 186, 224], [237, 215, 255],
    [107, 0, 68], [178, 0, 113], [255, 0, 120], [255, 12, 236], [255, 105, 243], [255, 157, 219], [248, 203, 231],
    [70, 5, 0], [98, 32, 27], [184, 13, 0], [255, 18, 0], [255, 95, 83], [255, 117, 156], [255, 175, 198],
    [97, 39, 0], [127, 65, 50], [188, 75, 0], [253, 110, 14], [251, 145, 31], [253, 174, 78], [255, 192, 129],
    [120, 90, 0], [186, 158, 0], [255, 191, 0], [255, 224, 58], [255, 221, 120], [255, 251, 166], [255, 253, 211],
    [30, 61, 0], [59, 117, 0], [96, 214, 0], [132, 255, 32], [179, 255, 97], [209, 255, 160], [233, 255, 189],
    [13, 48, 0], [2, 83, 0], [20, 160, 17], [6, 238, 0], [106, 255, 133], [152, 218, 151], [190, 245, 200],
    [34, 67, 57], [60, 137, 90], [11, 159, 115], [4, 229, 162], [132, 255, 226], [146, 229, 207], [186, 255, 239],
    [5, 44, 56], [0, 81, 123], [17, 139, 174], [0, 198, 255], [76, 215, 255], [130, 196, 215], [164, 250, 255],
    [0, 23, 71], [0, 47, 142], [0, 81, 173], [0, 120, 255], [42, 143, 255], [158, 189, 255], [211, 223, 255],
    [0, 0, 0], [43, 43, 43], [84, 84, 84], [128, 128, 128], [168, 168, 168], [212, 212, 212], [255, 255, 255],
    [86, 51, 23], [129, 88, 54], [234, 159, 98], [230, 198, 170], [255, 220, 191], [255, 240, 197], [255, 247, 237],
];

/// The three alpha values each [`DEFAULT_PALETTE_2021_BASE`] hue is
/// expanded into, in insertion order, mirroring
/// `_color_palette_default_add_color`.
const DEFAULT_PALETTE_2021_ALPHAS: [u8; 3] = [255, 191, 128];

/// The 252-color default palette (`spec.md` §3): each base hue at full
/// alpha, then at alpha 191, then at alpha 128.
pub fn default_palette_2021() -> Vec<Rgba> {
    let mut out = Vec::with_capacity(DEFAULT_PALETTE_2021_BASE.len() * DEFAULT_PALETTE_2021_ALPHAS.len());
    for [r, g, b] in DEFAULT_PALETTE_2021_BASE {
        for a in DEFAULT_PALETTE_2021_ALPHAS {
            out.push(Rgba::from_srgb8([r, g, b, a]));
        }
    }
    out
}

/// The 112-color "pico-8-style" default palette (`spec.md` §3), 7 rows of
/// 16 fully-opaque colors; the 7th row (entries 96..112,
/// [`PICO8P_EMISSIVE_START`]) duplicates row 1's hues and is meant to be
/// marked emissive for light-emitting blocks. Grounded on
/// `original_source/core/color_palette.c`'s
/// `_color_palette_create_default_colors_pico8p`.
#[rustfmt::skip]
const DEFAULT_PALETTE_PICO8P: [[u8; 3]; 112] = [
    [0, 0, 0], [30, 44, 81], [125, 39, 83], [17, 132, 82], [169, 82, 58], [95, 86, 79], [194, 195, 199], [255, 241, 233],
    [251, 17, 80], [253, 162, 40], [254, 234, 65], [36, 226, 67], [52, 175, 252], [130, 119, 155], [253, 121, 169], [253, 204, 171],
    [42, 42, 42], [48, 75, 118], [159, 14, 101], [2, 100, 62], [130, 45, 27], [114, 87, 66], [94, 74, 75], [153, 0, 39],
    [234, 0, 25], [255, 114, 0], [255, 210, 64], [28, 194, 61], [53, 136, 254], [117, 104, 131], [254, 92, 141], [255, 127, 126],
    [84, 84, 84], [82, 0, 100], [114, 23, 128], [1, 81, 46], [86, 46, 23], [77, 65, 53], [71, 55, 58], [81, 28, 48],
    [184, 0, 39], [195, 75, 41], [214, 161, 67], [37, 154, 62], [52, 122, 181], [97, 77, 102], [255, 0, 118], [254, 78, 107],
    [126, 126, 126], [30, 23, 41], [47, 38, 65], [69, 73, 100], [92, 108, 133], [154, 169, 188], [202, 210, 233], [237, 232, 255],
    [125, 0, 40], [132, 73, 44], [161, 122, 67], [3, 124, 48], [58, 93, 149], [187, 37, 162], [255, 165, 165], [254, 191, 199],
    [168, 168, 168], [210, 210, 210], [255, 255, 255], [148, 69, 62], [186, 95, 66], [214, 130, 106], [254, 174, 137], [254, 223, 195],
    [255, 170, 87], [38, 178, 128], [29, 225, 136], [171, 247, 115], [130, 20, 212], [237, 0, 168], [209, 135, 255], [255, 140, 223],
    [142, 105, 95], [169, 124, 127], [186, 147, 140], [206, 170, 156], [225, 200, 180], [245, 229, 216], [109, 89, 88], [125, 108, 101],
    [145, 131, 120], [166, 155, 136], [188, 180, 157], [217, 205, 193], [255, 232, 136], [113, 247, 178], [204, 255, 210], [154, 208, 255],
    [255, 255, 255], [30, 44, 81], [125, 39, 83], [17, 132, 82], [169, 82, 58], [95, 86, 79], [194, 195, 199], [255, 241, 233],
    [251, 17, 80], [253, 162, 40], [254, 234, 65], [36, 226, 67], [52, 175, 252], [130, 119, 155], [253, 121, 169], [253, 204, 171],
];

/// First entry of [`DEFAULT_PALETTE_PICO8P`]'s emissive row.
pub const PICO8P_EMISSIVE_START: usize = 96;

/// The 112-color "pico-8-style" default palette, fully opaque.
pub fn default_palette_pico8p() -> Vec<Rgba> {
    DEFAULT_PALETTE_PICO8P.iter().map(|&[r, g, b]| Rgba::from_srgb8([r, g, b, 255])).collect()
}

#[derive(Debug, Clone)]
struct Slot {
    color: Rgba,
    refcount: u32,
    atlas_index: Option<AtlasIndex>,
    emissive: bool,
}

/// Per-shape palette mapping an 8-bit block color index to an RGBA color
/// and an atlas slot.
#[derive(Debug)]
pub struct Palette {
    /// `shared` palettes free their atlas slot when an entry's refcount
    /// reaches zero; non-shared palettes retain it (`spec.md` §4.1).
    shared: bool,
    slots: Vec<Option<Slot>>,
    free_list: Vec<PaletteEntry>,
    reverse: HashMap<u32, PaletteEntry>,
    /// User-visible ordering indirection. `None` means identity
    /// (`ordered_entry(i) == i`); becomes `Some` the first time an entry is
    /// removed, so later insertions/removals don't perturb indices that
    /// scripting code has already observed (`spec.md` §4.1).
    ordered: Option<Vec<PaletteEntry>>,
    lighting_dirty: bool,
}

/// Errors from palette mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum PaletteError {
    #[error("palette entry {0} is not allocated")]
    NotAllocated(PaletteEntry),
    #[error("palette entry {0} still has {1} references")]
    StillInUse(PaletteEntry, u32),
}

impl Palette {
    pub fn new(shared: bool) -> Self {
        Self {
            shared,
            slots: Vec::new(),
            free_list: Vec::new(),
            reverse: HashMap::new(),
            ordered: None,
            lighting_dirty: false,
        }
    }

    /// Builds a palette pre-seeded with `colors` in order (entry `i` holds
    /// `colors[i]`), for loading one of the default palettes (`spec.md` §3:
    /// "Default palettes ... are well-known constants; indices into them can
    /// be resolved at load time"). `colors` after [`PALETTE_CAPACITY`] are
    /// dropped with a warning rather than erroring.
    pub fn seeded(shared: bool, colors: &[Rgba]) -> Self {
        let mut palette = Self::new(shared);
        for &color in colors {
            palette.check_and_add(color);
        }
        palette
    }

    fn high_mark(&self) -> usize {
        self.slots.len()
    }

    /// O(1) reverse lookup by color.
    pub fn find(&self, rgba: Rgba) -> Option<PaletteEntry> {
        self.reverse.get(&rgba.packed()).copied()
    }

    /// Returns the existing entry for `rgba`, or allocates a new one.
    /// `added` is `true` iff a new entry was allocated. On capacity
    /// exhaustion, returns the air sentinel with `added = false`
    /// (`spec.md` §7: "Palette failure maps the requested color to air").
    pub fn check_and_add(&mut self, rgba: Rgba) -> (PaletteEntry, bool) {
        if let Some(&entry) = self.reverse.get(&rgba.packed()) {
            return (entry, false);
        }
        let entry = if let Some(entry) = self.free_list.pop() {
            entry
        } else if self.slots.len() < PALETTE_CAPACITY {
            let entry = self.slots.len() as PaletteEntry;
            self.slots.push(None);
            entry
        } else {
            log::warn!("palette is full ({PALETTE_CAPACITY} entries); mapping color to air");
            return (AIR_BLOCK_INDEX, false);
        };
        self.slots[entry as usize] = Some(Slot {
            color: rgba,
            refcount: 0,
            atlas_index: None,
            emissive: false,
        });
        self.reverse.insert(rgba.packed(), entry);
        (entry, true)
    }

    fn slot(&self, entry: PaletteEntry) -> Result<&Slot, PaletteError> {
        self.slots
            .get(entry as usize)
            .and_then(Option::as_ref)
            .ok_or(PaletteError::NotAllocated(entry))
    }

    fn slot_mut(&mut self, entry: PaletteEntry) -> Result<&mut Slot, PaletteError> {
        self.slots
            .get_mut(entry as usize)
            .and_then(Option::as_mut)
            .ok_or(PaletteError::NotAllocated(entry))
    }

    pub fn color(&self, entry: PaletteEntry) -> Option<Rgba> {
        self.slots.get(entry as usize)?.as_ref().map(|s| s.color)
    }

    pub fn refcount(&self, entry: PaletteEntry) -> u32 {
        self.slots
            .get(entry as usize)
            .and_then(Option::as_ref)
            .map_or(0, |s| s.refcount)
    }

    pub fn is_emissive(&self, entry: PaletteEntry) -> bool {
        self.slots
            .get(entry as usize)
            .and_then(Option::as_ref)
            .map_or(false, |s| s.emissive)
    }

    pub fn set_emissive(&mut self, entry: PaletteEntry, emissive: bool) -> Result<(), PaletteError> {
        self.slot_mut(entry)?.emissive = emissive;
        Ok(())
    }

    pub fn atlas_index(&self, entry: PaletteEntry) -> Option<AtlasIndex> {
        self.slots.get(entry as usize)?.as_ref()?.atlas_index
    }

    /// Increments the refcount of `entry`. On the 0→1 transition, acquires
    /// an atlas index.
    pub fn increment(
        &mut self,
        atlas: &mut ColorAtlas,
        entry: PaletteEntry,
    ) -> Result<(), PaletteError> {
        let color = self.slot(entry)?.color;
        let slot = self.slot_mut(entry)?;
        slot.refcount += 1;
        if slot.refcount == 1 {
            match atlas.acquire(color) {
                Ok(index) => self.slot_mut(entry)?.atlas_index = Some(index),
                Err(_) => log::warn!("color atlas full; palette entry {entry} has no atlas slot"),
            }
        }
        Ok(())
    }

    /// Decrements the refcount of `entry`. On the 1→0 transition, releases
    /// the atlas index if this palette is `shared`; a non-shared palette
    /// retains it so the color stays resident for likely reuse.
    pub fn decrement(
        &mut self,
        atlas: &mut ColorAtlas,
        entry: PaletteEntry,
    ) -> Result<(), PaletteError> {
        let slot = self.slot_mut(entry)?;
        debug_assert!(slot.refcount > 0, "decrement on zero-refcount entry");
        slot.refcount = slot.refcount.saturating_sub(1);
        if slot.refcount == 0 && self.shared {
            if let Some(index) = slot.atlas_index.take() {
                atlas.release(index);
            }
        }
        Ok(())
    }

    /// Frees `entry` for reuse. Only valid when its refcount is zero.
    /// Compacts the user-visible ordered view (`spec.md` §4.1).
    pub fn remove_unused(&mut self, entry: PaletteEntry) -> Result<(), PaletteError> {
        let slot = self.slot(entry)?;
        if slot.refcount != 0 {
            return Err(PaletteError::StillInUse(entry, slot.refcount));
        }
        if self.ordered.is_none() {
            self.ordered = Some((0..self.high_mark() as PaletteEntry).collect());
        }
        self.ordered.as_mut().unwrap().retain(|&e| e != entry);

        let color = self.slots[entry as usize].take().unwrap().color;
        self.reverse.remove(&color.packed());
        self.free_list.push(entry);
        Ok(())
    }

    /// Updates an entry's color. Sets the lighting-dirty flag when the
    /// change could affect baked lighting (`spec.md` §4.1): the entry is
    /// emissive, opacity crosses the opaque/non-opaque boundary, or both
    /// the old and new alpha are translucent but differ.
    pub fn set_color(&mut self, atlas: &mut ColorAtlas, entry: PaletteEntry, rgba: Rgba) -> Result<(), PaletteError> {
        let old = self.slot(entry)?.color;
        let old_opaque = old.is_opaque();
        let new_opaque = rgba.is_opaque();
        let both_translucent = !old.is_opaque() && old.alpha() > 0.0 && !rgba.is_opaque() && rgba.alpha() > 0.0;

        if self.is_emissive(entry)
            || old_opaque != new_opaque
            || (both_translucent && (old.alpha() - rgba.alpha()).abs() > f32::EPSILON)
        {
            self.lighting_dirty = true;
        }

        self.reverse.remove(&old.packed());
        let slot = self.slot_mut(entry)?;
        slot.color = rgba;
        self.reverse.insert(rgba.packed(), entry);
        if let Some(index) = self.slots[entry as usize].as_ref().unwrap().atlas_index {
            atlas.set_color(index, rgba);
        }
        Ok(())
    }

    /// Consumes and clears the lighting-dirty flag.
    pub fn take_lighting_dirty(&mut self) -> bool {
        std::mem::take(&mut self.lighting_dirty)
    }

    /// Number of entries visible in the user-facing ordered enumeration.
    pub fn ordered_len(&self) -> usize {
        match &self.ordered {
            Some(v) => v.len(),
            None => self.high_mark(),
        }
    }

    /// Maps a user-visible ordered position to its palette entry.
    pub fn ordered_entry(&self, pos: usize) -> Option<PaletteEntry> {
        match &self.ordered {
            Some(v) => v.get(pos).copied(),
            None => (pos < self.high_mark()).then_some(pos as PaletteEntry),
        }
    }
}
