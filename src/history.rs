// Copyright voxel-core contributors, MIT License.

//! A bounded undo/redo ring of committed [`Transaction`]s (`spec.md`
//! §4.3). Grounded on the teacher's fixed-capacity session/undo buffers
//! (ring-with-cursor over a `VecDeque`) rather than an unbounded `Vec`,
//! since an undo history that grows forever is exactly the kind of
//! long-lived-session leak that pattern exists to avoid.

use std::collections::VecDeque;

use crate::transaction::Transaction;

/// Maximum number of committed transactions retained for undo.
pub const NB_UNDOABLE_ACTIONS: usize = 20;

/// A cursor-based undo/redo ring. `cursor` counts how many of the most
/// recently pushed transactions are currently "undone": `entries[len -
/// 1 - cursor]` is the last transaction still in effect.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<Transaction>,
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
        }
    }

    /// Records a newly committed transaction. Any transactions beyond
    /// the current cursor (the redo branch) are discarded, since they no
    /// longer follow from the new present; the oldest entry is evicted
    /// once the ring is full.
    pub fn push(&mut self, tx: Transaction) {
        for _ in 0..self.cursor {
            self.entries.pop_back();
        }
        self.cursor = 0;
        if self.entries.len() == NB_UNDOABLE_ACTIONS {
            self.entries.pop_front();
        }
        self.entries.push_back(tx);
    }

    /// Returns the transaction to undo (the caller applies its
    /// [`Transaction::inverse`]), advancing the cursor. `None` if there
    /// is nothing left to undo.
    pub fn undo(&mut self) -> Option<&Transaction> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        let idx = self.entries.len() - self.cursor;
        self.entries.get(idx)
    }

    /// Returns the transaction to redo (the caller re-applies it
    /// forward), retreating the cursor. `None` if there is nothing to
    /// redo.
    pub fn redo(&mut self) -> Option<&Transaction> {
        if self.cursor == 0 {
            return None;
        }
        let idx = self.entries.len() - self.cursor;
        self.cursor -= 1;
        self.entries.get(idx)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::GridPoint;

    fn tx_for(cube: GridPoint, before: u8, after: u8) -> Transaction {
        let mut tx = Transaction::new();
        tx.stage(cube, before, after);
        tx
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut h = History::new();
        h.push(tx_for(GridPoint::new(0, 0, 0), 255, 1));
        h.push(tx_for(GridPoint::new(1, 0, 0), 255, 2));
        assert!(h.can_undo());
        assert!(!h.can_redo());

        let undone = h.undo().unwrap().clone();
        assert_eq!(undone.iter().next().unwrap().after, 2);
        assert!(h.can_redo());

        let redone = h.redo().unwrap().clone();
        assert_eq!(redone.iter().next().unwrap().after, 2);
        assert!(!h.can_redo());
    }

    #[test]
    fn pushing_after_undo_discards_redo_branch() {
        let mut h = History::new();
        h.push(tx_for(GridPoint::new(0, 0, 0), 255, 1));
        h.push(tx_for(GridPoint::new(1, 0, 0), 255, 2));
        h.undo();
        h.push(tx_for(GridPoint::new(2, 0, 0), 255, 3));
        assert!(!h.can_redo(), "new edit should discard the stale redo branch");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let mut h = History::new();
        for i in 0..(NB_UNDOABLE_ACTIONS + 5) {
            h.push(tx_for(GridPoint::new(i as i32, 0, 0), 255, 1));
        }
        assert_eq!(h.len(), NB_UNDOABLE_ACTIONS);
        for _ in 0..NB_UNDOABLE_ACTIONS {
            assert!(h.undo().is_some());
        }
        assert!(h.undo().is_none(), "oldest entries should have been evicted");
    }
}
