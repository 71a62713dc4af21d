// Copyright voxel-core contributors, MIT License.

//! Core voxel shape model for a cube-based 3D engine: a palette-indexed
//! block grid partitioned into chunks (each an octree), a vertex buffer
//! allocator for packing per-chunk mesh geometry into shared buffers, a
//! baked sunlight/emission lighting propagator, and a transactional edit
//! log with undo/redo.
//!
//! This crate does not render anything, own a scene graph, parse any
//! file format beyond `.vox` color-grid exchange, expose scripting
//! bindings, or solve physics beyond box-cast/ray-cast query contracts.

pub mod atlas;
pub mod chunk;
pub mod chunking;
pub mod history;
pub mod lighting;
pub mod math;
pub mod mesh;
pub mod octree;
pub mod palette;
pub mod rtree;
pub mod shape;
pub mod transaction;
pub mod vbuffer;
pub mod vox;

pub use chunking::{ChunkPos, CHUNK_SIZE};
pub use lighting::{Light, LightingOptions};
pub use math::{Face6, Face7, FreeCoordinate, GridAab, GridCoordinate, GridPoint, GridVector, Rgb, Rgba};
pub use palette::{PaletteEntry, AIR_BLOCK_INDEX};
pub use shape::{Shape, ShapeError, TransformHandle};
pub use transaction::{BlockChange, Transaction};
