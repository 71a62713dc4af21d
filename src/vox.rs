// Copyright voxel-core contributors, MIT License.

//! Reading and writing the MagicaVoxel `.vox` format, used solely as a
//! color-grid exchange format for a single shape (`spec.md` §8). This is
//! not a general `.vox` importer: multi-model files, materials,
//! transform/layer metadata, and every other modern `.vox` chunk type
//! are deliberately out of scope — only the `MAIN`/`PACK`/`SIZE`/`XYZI`/
//! `RGBA` chunks a single static model needs are understood.
//!
//! Grounded on `all-is-cubes`'s `dot_vox`-based importer/exporter
//! (`all-is-cubes-content`'s voxel model loading, per
//! `original_source/`), reworked here as a direct hand-rolled reader/
//! writer over the chunk framing instead of depending on an external
//! `.vox` crate, since this crate's only use of the format is this one
//! narrow round trip.

use std::io;
use std::path::Path;

use crate::math::{GridCoordinate, GridPoint, Rgba};
use crate::shape::Shape;

const MAGIC: &[u8; 4] = b"VOX ";
const VERSION: u32 = 150;

/// Maximum extent on any axis a `.vox` model (and this crate's
/// single-byte-coordinate wire format) can represent.
pub const MAX_VOX_EXTENT: GridCoordinate = 256;

/// Errors from reading or writing a `.vox` file.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VoxError {
    #[error("not a valid .vox file")]
    InvalidFormat,
    #[error("multi-model .vox files (PACK chunk) are not supported")]
    PackChunkFound,
    #[error("could not open or read the file: {0}")]
    CantOpenFile(#[from] io::Error),
    #[error("unrecognized or malformed chunk tag {0:?}")]
    UnknownChunk([u8; 4]),
    #[error("more than one model (SIZE chunk) found in a single-model file")]
    MultipleModels,
    #[error("shape extent exceeds the .vox format's {MAX_VOX_EXTENT} limit on an axis")]
    ShapeTooLarge,
}

/// One voxel's position (already axis-swapped into this crate's Y-up
/// coordinates) and its 1-based `.vox` palette index.
#[derive(Clone, Copy, Debug)]
struct RawVoxel {
    pos: GridPoint,
    color_index: u8,
}

/// A parsed (or about-to-be-written) `.vox` model: size, voxel list, and
/// 256-entry color palette, all already in this crate's coordinate
/// convention.
#[derive(Clone, Debug)]
pub struct VoxModel {
    pub size: (GridCoordinate, GridCoordinate, GridCoordinate),
    voxels: Vec<RawVoxel>,
    /// `palette[i]` is the color for `.vox` color index `i + 1`
    /// (`.vox` color index `0` is never stored; it means "no voxel").
    palette: Box<[Rgba; 256]>,
}

/// A plausible stand-in for MagicaVoxel's built-in default palette, used
/// only when a file omits its `RGBA` chunk (uncommon — virtually every
/// real exporter writes one). Not byte-identical to the official
/// default; just a monotonic ramp so color indices stay visually
/// distinguishable.
fn fallback_palette() -> Box<[Rgba; 256]> {
    let mut palette = Box::new([Rgba::transparent(); 256]);
    for (i, entry) in palette.iter_mut().enumerate() {
        let t = i as f32 / 255.0;
        *entry = Rgba::new(t, t, t, 1.0);
    }
    palette
}

impl VoxModel {
    /// Builds a model from the occupied blocks of `shape`, relative to
    /// its bounding box's lower corner. Colors beyond the 255 the `.vox`
    /// palette can hold are clamped to the last-assigned index, logging
    /// a warning, rather than failing the export outright.
    pub fn from_shape(shape: &Shape) -> Result<Self, VoxError> {
        let bounds = shape.bounding_box();
        let size = bounds.size();
        if size.x > MAX_VOX_EXTENT || size.y > MAX_VOX_EXTENT || size.z > MAX_VOX_EXTENT {
            return Err(VoxError::ShapeTooLarge);
        }

        let mut palette = Box::new([Rgba::transparent(); 256]);
        let mut color_to_index: std::collections::HashMap<u32, u8> = std::collections::HashMap::new();
        let mut next_index: u16 = 0;
        let mut voxels = Vec::new();

        for cube in bounds.interior_iter() {
            let color = shape.color_at(cube);
            if color.is_invisible() {
                continue;
            }
            let key = color.packed();
            let color_index = match color_to_index.get(&key) {
                Some(&idx) => idx,
                None => {
                    let idx = if next_index < 255 {
                        let idx = next_index as u8;
                        next_index += 1;
                        palette[idx as usize] = color;
                        idx
                    } else {
                        log::warn!("vox export: more than 255 distinct colors; clamping extras to the last palette slot");
                        254
                    };
                    color_to_index.insert(key, idx);
                    idx
                }
            };
            let local = cube - bounds.lower();
            voxels.push(RawVoxel {
                pos: GridPoint::new(local.x, local.y, local.z),
                // `.vox` color indices are 1-based.
                color_index: color_index + 1,
            });
        }

        Ok(Self {
            size: (size.x, size.y, size.z),
            voxels,
            palette,
        })
    }

    /// Stages every voxel into `shape` (as one batched transaction) and
    /// commits.
    pub fn into_shape(&self, shape: &mut Shape) {
        for voxel in &self.voxels {
            let color = self.palette[(voxel.color_index - 1) as usize];
            shape.stage_set(voxel.pos, color);
        }
        shape.commit();
    }
}

// --- Reading -----------------------------------------------------------

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], VoxError> {
        let end = self.pos.checked_add(n).ok_or(VoxError::InvalidFormat)?;
        let slice = self.bytes.get(self.pos..end).ok_or(VoxError::InvalidFormat)?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, VoxError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().map_err(|_| VoxError::InvalidFormat)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn tag(&mut self) -> Result<[u8; 4], VoxError> {
        self.take(4)?.try_into().map_err(|_| VoxError::InvalidFormat)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

fn is_plausible_tag(tag: [u8; 4]) -> bool {
    // Real `.vox` chunk tags mix case (`nTRN`, `MATL`, `rCAM`, ...); only
    // reject tags that couldn't plausibly be a chunk id at all.
    tag.iter().all(u8::is_ascii_alphanumeric)
}

/// Parses a `.vox` file's bytes into a [`VoxModel`].
pub fn read_vox(bytes: &[u8]) -> Result<VoxModel, VoxError> {
    let mut cursor = Cursor::new(bytes);
    if cursor.take(4)? != MAGIC {
        return Err(VoxError::InvalidFormat);
    }
    let _version = cursor.u32()?;

    let main_tag = cursor.tag()?;
    if &main_tag != b"MAIN" {
        return Err(VoxError::InvalidFormat);
    }
    let main_content_size = cursor.u32()?;
    let main_children_size = cursor.u32()?;
    cursor.take(main_content_size as usize)?; // MAIN's own content is always empty.
    let children = cursor.take(main_children_size as usize)?;

    let mut size: Option<(GridCoordinate, GridCoordinate, GridCoordinate)> = None;
    let mut voxels = Vec::new();
    let mut palette: Option<Box<[Rgba; 256]>> = None;
    let mut seen_size_chunk = false;

    let mut inner = Cursor::new(children);
    while inner.remaining() > 0 {
        let tag = inner.tag()?;
        let content_size = inner.u32()?;
        let children_size = inner.u32()?;
        let content = inner.take(content_size as usize)?;
        inner.take(children_size as usize)?; // none of the chunks we understand nest further.

        match &tag {
            b"PACK" => return Err(VoxError::PackChunkFound),
            b"SIZE" => {
                if seen_size_chunk {
                    return Err(VoxError::MultipleModels);
                }
                seen_size_chunk = true;
                let mut c = Cursor::new(content);
                let x = c.u32()? as GridCoordinate;
                let y = c.u32()? as GridCoordinate;
                let z = c.u32()? as GridCoordinate;
                // `.vox` is Z-up (x = width, y = depth, z = height); this
                // crate is Y-up, so height and depth swap on the way in.
                size = Some((x, z, y));
            }
            b"XYZI" => {
                let mut c = Cursor::new(content);
                let count = c.u32()?;
                for _ in 0..count {
                    let entry = c.take(4)?;
                    let (x, y, z, color_index) = (entry[0], entry[1], entry[2], entry[3]);
                    if color_index == 0 {
                        continue;
                    }
                    voxels.push(RawVoxel {
                        pos: GridPoint::new(x as GridCoordinate, z as GridCoordinate, y as GridCoordinate),
                        color_index,
                    });
                }
            }
            b"RGBA" => {
                let mut entries = Box::new([Rgba::transparent(); 256]);
                let mut c = Cursor::new(content);
                for entry in entries.iter_mut() {
                    let bytes: [u8; 4] = c.take(4)?.try_into().map_err(|_| VoxError::InvalidFormat)?;
                    *entry = Rgba::from_srgb8(bytes);
                }
                palette = Some(entries);
            }
            _ if is_plausible_tag(tag) => {
                // A recognized-shape-but-unimplemented chunk (nTRN, MATL,
                // LAYR, and the like from newer `.vox` revisions): skipped,
                // not an error.
            }
            _ => return Err(VoxError::UnknownChunk(tag)),
        }
    }

    let size = size.ok_or(VoxError::InvalidFormat)?;
    if size.0 > MAX_VOX_EXTENT || size.1 > MAX_VOX_EXTENT || size.2 > MAX_VOX_EXTENT {
        return Err(VoxError::ShapeTooLarge);
    }

    Ok(VoxModel {
        size,
        voxels,
        palette: palette.unwrap_or_else(fallback_palette),
    })
}

pub fn load_file(path: &Path) -> Result<VoxModel, VoxError> {
    let bytes = std::fs::read(path)?;
    read_vox(&bytes)
}

// --- Writing -------------------------------------------------------------

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], content: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // no nested children, ever, for the chunks we emit.
    out.extend_from_slice(content);
}

/// Serializes a [`VoxModel`] to `.vox` bytes, in `MAIN -> SIZE -> XYZI ->
/// RGBA` chunk order.
pub fn write_vox(model: &VoxModel) -> Result<Vec<u8>, VoxError> {
    let (sx, sy, sz) = model.size;
    if sx > MAX_VOX_EXTENT || sy > MAX_VOX_EXTENT || sz > MAX_VOX_EXTENT {
        return Err(VoxError::ShapeTooLarge);
    }

    let mut size_content = Vec::with_capacity(12);
    // Swap back to `.vox`'s Z-up axis order on the way out.
    size_content.extend_from_slice(&(sx as u32).to_le_bytes());
    size_content.extend_from_slice(&(sz as u32).to_le_bytes());
    size_content.extend_from_slice(&(sy as u32).to_le_bytes());

    let mut xyzi_content = Vec::with_capacity(4 + model.voxels.len() * 4);
    xyzi_content.extend_from_slice(&(model.voxels.len() as u32).to_le_bytes());
    for voxel in &model.voxels {
        xyzi_content.push(voxel.pos.x as u8);
        xyzi_content.push(voxel.pos.z as u8);
        xyzi_content.push(voxel.pos.y as u8);
        xyzi_content.push(voxel.color_index);
    }

    let mut rgba_content = Vec::with_capacity(256 * 4);
    for color in model.palette.iter() {
        rgba_content.extend_from_slice(&color.to_srgb8());
    }

    let mut children = Vec::new();
    write_chunk(&mut children, b"SIZE", &size_content);
    write_chunk(&mut children, b"XYZI", &xyzi_content);
    write_chunk(&mut children, b"RGBA", &rgba_content);

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(b"MAIN");
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(children.len() as u32).to_le_bytes());
    out.extend_from_slice(&children);
    Ok(out)
}

pub fn save_file(path: &Path, model: &VoxModel) -> Result<(), VoxError> {
    let bytes = write_vox(model)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> VoxModel {
        let mut palette = Box::new([Rgba::transparent(); 256]);
        palette[0] = Rgba::new(1.0, 0.0, 0.0, 1.0);
        palette[1] = Rgba::new(0.0, 1.0, 0.0, 1.0);
        VoxModel {
            size: (2, 1, 1),
            voxels: vec![
                RawVoxel { pos: GridPoint::new(0, 0, 0), color_index: 1 },
                RawVoxel { pos: GridPoint::new(1, 0, 0), color_index: 2 },
            ],
            palette,
        }
    }

    #[test]
    fn write_then_read_round_trips_voxels_and_palette() {
        let model = sample_model();
        let bytes = write_vox(&model).unwrap();
        let parsed = read_vox(&bytes).unwrap();
        assert_eq!(parsed.size, model.size);
        assert_eq!(parsed.voxels.len(), 2);
        assert_eq!(parsed.palette[0], model.palette[0]);
        assert_eq!(parsed.palette[1], model.palette[1]);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"NOPE0000".to_vec();
        assert!(matches!(read_vox(&bytes), Err(VoxError::InvalidFormat)));
    }

    #[test]
    fn rejects_pack_chunk() {
        let mut children = Vec::new();
        write_chunk(&mut children, b"PACK", &1u32.to_le_bytes());
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(b"MAIN");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(children.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&children);
        assert!(matches!(read_vox(&bytes), Err(VoxError::PackChunkFound)));
    }

    #[test]
    fn unrecognized_but_plausible_chunk_is_skipped() {
        let model = sample_model();
        let mut bytes = write_vox(&model).unwrap();
        // Splice an `nTRN`-like extra chunk in right after MAIN's header by
        // rebuilding with one extra chunk prepended to the children list.
        let mut extra = Vec::new();
        write_chunk(&mut extra, b"NOTE", b"ignored");
        // Grow MAIN's declared children size to cover the inserted chunk.
        let main_children_len_offset = 4 + 4 + 4 + 4; // magic+version+tag+content_size
        let old_len = u32::from_le_bytes(bytes[main_children_len_offset..main_children_len_offset + 4].try_into().unwrap());
        let new_len = old_len + extra.len() as u32;
        bytes[main_children_len_offset..main_children_len_offset + 4].copy_from_slice(&new_len.to_le_bytes());
        let insert_at = main_children_len_offset + 4;
        bytes.splice(insert_at..insert_at, extra);
        let parsed = read_vox(&bytes).unwrap();
        assert_eq!(parsed.voxels.len(), 2);
    }

    #[test]
    fn import_and_export_round_trip_through_a_shape() {
        let model = sample_model();
        let mut shape = Shape::new(true);
        model.into_shape(&mut shape);
        assert_eq!(shape.color_at(GridPoint::new(0, 0, 0)), Rgba::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(shape.color_at(GridPoint::new(1, 0, 0)), Rgba::new(0.0, 1.0, 0.0, 1.0));

        let exported = VoxModel::from_shape(&shape).unwrap();
        assert_eq!(exported.voxels.len(), 2);
    }
}
