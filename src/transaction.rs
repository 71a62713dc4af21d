// Copyright voxel-core contributors, MIT License.

//! A batch of pending block edits: one entry per touched cube, amendable
//! in place while staged, committed atomically, and invertible for undo
//! (`spec.md` §4.3).
//!
//! Unlike `all-is-cubes`'s generic `Transaction<T>`/`Merge`-trait
//! machinery (built for heterogeneous effects across many target types),
//! edits here only ever touch one thing — a shape's block grid — so this
//! is a flat, purpose-built log instead: a `BlockChange` struct plus an
//! order-preserving, amend-on-restage index.

use std::collections::HashMap;

use crate::math::{GridCoordinate, GridPoint};
use crate::palette::PaletteEntry;

/// One cube's before/after palette entry within a [`Transaction`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockChange {
    pub before: PaletteEntry,
    pub after: PaletteEntry,
    pub x: GridCoordinate,
    pub y: GridCoordinate,
    pub z: GridCoordinate,
}

impl BlockChange {
    pub fn cube(&self) -> GridPoint {
        GridPoint::new(self.x, self.y, self.z)
    }

    fn inverted(&self) -> BlockChange {
        BlockChange {
            before: self.after,
            after: self.before,
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

/// A batch of block edits, staged by cube and applied together.
///
/// Restaging a cube that's already in this transaction amends the
/// existing entry's `after` value in place rather than appending a
/// second entry, so `iter()` always yields at most one change per cube,
/// in the order each cube was first touched. If the amendment brings
/// `after` back to the entry's original `before`, the edit is a net
/// no-op and the entry is dropped entirely.
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    entries: Vec<(GridPoint, BlockChange)>,
    index: HashMap<GridPoint, usize>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stages `after` at `cube`, recording `before` as the pre-transaction
    /// value the first time this cube is touched.
    pub fn stage(&mut self, cube: GridPoint, before: PaletteEntry, after: PaletteEntry) {
        if let Some(&idx) = self.index.get(&cube) {
            self.entries[idx].1.after = after;
            if self.entries[idx].1.after == self.entries[idx].1.before {
                self.drop_entry(cube);
            }
            return;
        }
        if before == after {
            return;
        }
        let idx = self.entries.len();
        self.entries.push((
            cube,
            BlockChange {
                before,
                after,
                x: cube.x,
                y: cube.y,
                z: cube.z,
            },
        ));
        self.index.insert(cube, idx);
    }

    fn drop_entry(&mut self, cube: GridPoint) {
        let Some(idx) = self.index.remove(&cube) else {
            return;
        };
        self.entries.remove(idx);
        for (pos, (c, _)) in self.entries.iter().enumerate().skip(idx) {
            self.index.insert(*c, pos);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockChange> {
        self.entries.iter().map(|(_, change)| change)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// The transaction that undoes this one: every entry's before/after
    /// swapped, same order, so replaying a transaction's edits and then
    /// its inverse's is always a round trip.
    pub fn inverse(&self) -> Transaction {
        let entries: Vec<(GridPoint, BlockChange)> =
            self.entries.iter().map(|(cube, change)| (*cube, change.inverted())).collect();
        let index = entries.iter().enumerate().map(|(i, (c, _))| (*c, i)).collect();
        Transaction { entries, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_then_amend_keeps_original_before_and_order() {
        let mut tx = Transaction::new();
        tx.stage(GridPoint::new(0, 0, 0), 255, 1);
        tx.stage(GridPoint::new(1, 0, 0), 255, 2);
        tx.stage(GridPoint::new(0, 0, 0), 255, 3);
        assert_eq!(tx.len(), 2);
        let changes: Vec<_> = tx.iter().collect();
        assert_eq!(changes[0].cube(), GridPoint::new(0, 0, 0));
        assert_eq!(changes[0].before, 255);
        assert_eq!(changes[0].after, 3);
        assert_eq!(changes[1].cube(), GridPoint::new(1, 0, 0));
    }

    #[test]
    fn amend_back_to_before_drops_entry() {
        let mut tx = Transaction::new();
        tx.stage(GridPoint::new(0, 0, 0), 255, 1);
        tx.stage(GridPoint::new(0, 0, 0), 255, 255);
        assert!(tx.is_empty());
    }

    #[test]
    fn no_op_initial_stage_is_never_recorded() {
        let mut tx = Transaction::new();
        tx.stage(GridPoint::new(0, 0, 0), 7, 7);
        assert!(tx.is_empty());
    }

    #[test]
    fn inverse_swaps_before_and_after_preserving_order() {
        let mut tx = Transaction::new();
        tx.stage(GridPoint::new(0, 0, 0), 255, 1);
        tx.stage(GridPoint::new(1, 0, 0), 255, 2);
        let inv = tx.inverse();
        let changes: Vec<_> = inv.iter().collect();
        assert_eq!(changes[0].before, 1);
        assert_eq!(changes[0].after, 255);
        assert_eq!(changes[1].before, 2);
        assert_eq!(changes[1].after, 255);
    }
}
