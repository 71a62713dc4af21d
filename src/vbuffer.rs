// Copyright voxel-core contributors, MIT License.

//! A gap-tracking allocator for packing many chunks' worth of mesh
//! geometry into a small number of shared, growable buffers, with
//! defragmentation and coalesced dirty-range tracking for re-upload
//! (`spec.md` §3/§6).
//!
//! This module owns no actual vertex/index bytes — only offset/length
//! bookkeeping. The renderer that owns the real GPU buffer is out of
//! scope here; this allocator hands out [`BufferRegion`] handles and
//! tells the caller which byte ranges changed.

/// Opaque handle to an allocated span within a [`Buffer`]. Stable across
/// growth, splits, and defragmentation moves (the offset it refers to may
/// change; the handle itself does not).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BufferRegion(u32);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum AreaKind {
    Occupied,
    Free,
}

struct AreaNode {
    kind: AreaKind,
    offset: u32,
    length: u32,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Where a [`Buffer`] sits in its capacity-growth lifecycle, per
/// `spec.md`'s capacity policy: an uninitialized buffer overshoots its
/// first allocation for headroom, then tightens toward actual demand
/// during early growth, before settling into steady geometric growth.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CapacityState {
    Uninitialized,
    InitScaleDown,
    Runtime,
    RuntimeScaleUp,
}

/// Overshoot divisor applied to the first few allocations, before the
/// buffer has a usage history to size itself against.
const INIT_SCALE_RATE: f64 = 0.75;
/// Multiplier applied to existing capacity once the buffer is in steady
/// runtime use and must grow again.
const RUNTIME_SCALE_RATE: f64 = 4.0;

fn round_up_to_perfect_square(n: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    let root = (n as f64).sqrt().ceil() as u32;
    root * root
}

/// A single growable arena of vertex- or index-sized slots, doubly-linked
/// in physical offset order so adjacent free spans can be found and
/// merged without a separate interval tree.
pub struct Buffer {
    arena: Vec<Option<AreaNode>>,
    head: Option<u32>,
    tail: Option<u32>,
    capacity: u32,
    used: u32,
    state: CapacityState,
    dirty_ranges: Vec<(u32, u32)>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            head: None,
            tail: None,
            capacity: 0,
            used: 0,
            state: CapacityState::Uninitialized,
            dirty_ranges: Vec::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    fn alloc_node(&mut self, node: AreaNode) -> u32 {
        self.arena.push(Some(node));
        (self.arena.len() - 1) as u32
    }

    fn node(&self, id: u32) -> &AreaNode {
        self.arena[id as usize].as_ref().expect("dangling vbuffer area id")
    }

    fn node_mut(&mut self, id: u32) -> &mut AreaNode {
        self.arena[id as usize].as_mut().expect("dangling vbuffer area id")
    }

    fn next_capacity_for(&self, needed_total: u32) -> u32 {
        match self.state {
            CapacityState::Uninitialized | CapacityState::InitScaleDown => {
                round_up_to_perfect_square((needed_total as f64 / INIT_SCALE_RATE).ceil() as u32)
            }
            CapacityState::Runtime | CapacityState::RuntimeScaleUp => {
                let grown = ((self.capacity.max(1) as f64) * RUNTIME_SCALE_RATE).ceil() as u32;
                round_up_to_perfect_square(grown.max(needed_total))
            }
        }
    }

    fn transition_after_grow(&mut self) {
        self.state = match self.state {
            CapacityState::Uninitialized | CapacityState::InitScaleDown => CapacityState::InitScaleDown,
            CapacityState::Runtime | CapacityState::RuntimeScaleUp => CapacityState::RuntimeScaleUp,
        };
    }

    /// Moves a settled buffer from its scale-down/scale-up transients
    /// back into steady `Runtime` state once demand stops exceeding the
    /// overshoot ratio. Callers that know usage has stabilized (e.g. the
    /// mesher, between edit bursts) may call this explicitly; otherwise
    /// it happens lazily the next time `next_capacity_for` sees demand
    /// comfortably inside the current overshoot.
    fn settle(&mut self, needed_total: u32) {
        let comfortable = match self.state {
            CapacityState::InitScaleDown => (needed_total as f64) <= (self.capacity as f64) * INIT_SCALE_RATE,
            CapacityState::RuntimeScaleUp => (needed_total as f64) <= (self.capacity as f64) / RUNTIME_SCALE_RATE,
            _ => false,
        };
        if comfortable {
            self.state = CapacityState::Runtime;
        }
    }

    fn grow_for(&mut self, needed_additional: u32) {
        let needed_total = self.capacity + needed_additional;
        self.settle(needed_total);
        let new_capacity = self.next_capacity_for(needed_total).max(needed_total);
        let additional = new_capacity - self.capacity;
        if additional == 0 {
            return;
        }
        if let Some(tail) = self.tail {
            if self.node(tail).kind == AreaKind::Free {
                let tail_length = self.node(tail).length;
                self.node_mut(tail).length = tail_length + additional;
                self.capacity = new_capacity;
                self.transition_after_grow();
                return;
            }
        }
        let new_node = AreaNode {
            kind: AreaKind::Free,
            offset: self.capacity,
            length: additional,
            prev: self.tail,
            next: None,
        };
        let id = self.alloc_node(new_node);
        if let Some(tail) = self.tail {
            self.node_mut(tail).next = Some(id);
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
        self.capacity = new_capacity;
        self.transition_after_grow();
    }

    /// Finds (growing the buffer if necessary) and occupies a free span
    /// of at least `length` slots.
    pub fn allocate(&mut self, length: u32) -> BufferRegion {
        assert!(length > 0, "cannot allocate a zero-length region");
        loop {
            let mut cursor = self.head;
            while let Some(id) = cursor {
                let node = self.node(id);
                if node.kind == AreaKind::Free && node.length >= length {
                    let region = self.split_or_take(id, length);
                    self.used += length;
                    return region;
                }
                cursor = node.next;
            }
            self.grow_for(length);
        }
    }

    fn split_or_take(&mut self, id: u32, length: u32) -> BufferRegion {
        let node_length = self.node(id).length;
        if node_length == length {
            self.node_mut(id).kind = AreaKind::Occupied;
            return BufferRegion(id);
        }
        let offset = self.node(id).offset;
        self.node_mut(id).offset = offset + length;
        self.node_mut(id).length = node_length - length;
        let prev = self.node(id).prev;
        let occupied = AreaNode {
            kind: AreaKind::Occupied,
            offset,
            length,
            prev,
            next: Some(id),
        };
        let occupied_id = self.alloc_node(occupied);
        self.node_mut(id).prev = Some(occupied_id);
        if let Some(p) = prev {
            self.node_mut(p).next = Some(occupied_id);
        } else {
            self.head = Some(occupied_id);
        }
        BufferRegion(occupied_id)
    }

    pub fn offset_of(&self, region: BufferRegion) -> u32 {
        self.node(region.0).offset
    }

    pub fn length_of(&self, region: BufferRegion) -> u32 {
        self.node(region.0).length
    }

    /// Frees `region`, coalescing with any physically-adjacent free
    /// neighbors so fragmentation doesn't accumulate one gap per churned
    /// chunk.
    pub fn free(&mut self, region: BufferRegion) {
        let id = region.0;
        self.used -= self.node(id).length;
        self.node_mut(id).kind = AreaKind::Free;
        self.coalesce_with_neighbors(id);
    }

    fn coalesce_with_neighbors(&mut self, id: u32) {
        if let Some(next) = self.node(id).next {
            if self.node(next).kind == AreaKind::Free {
                let next_length = self.node(next).length;
                let next_next = self.node(next).next;
                self.node_mut(id).length += next_length;
                self.node_mut(id).next = next_next;
                if let Some(nn) = next_next {
                    self.node_mut(nn).prev = Some(id);
                } else {
                    self.tail = Some(id);
                }
                self.arena[next as usize] = None;
            }
        }
        if let Some(prev) = self.node(id).prev {
            if self.node(prev).kind == AreaKind::Free {
                let id_length = self.node(id).length;
                let id_next = self.node(id).next;
                self.node_mut(prev).length += id_length;
                self.node_mut(prev).next = id_next;
                if let Some(n) = id_next {
                    self.node_mut(n).prev = Some(prev);
                } else {
                    self.tail = Some(prev);
                }
                self.arena[id as usize] = None;
            }
        }
    }

    /// Grows or relocates `region` to hold `new_length` slots. Contents
    /// are not preserved across a relocation — there is no backing byte
    /// array here to copy — so the caller must rewrite its slots from
    /// scratch into the returned region. A no-op if already large enough.
    pub fn reallocate(&mut self, region: BufferRegion, new_length: u32) -> BufferRegion {
        if self.length_of(region) >= new_length {
            return region;
        }
        self.free(region);
        self.allocate(new_length)
    }

    /// Trims `region` down to `new_length`, releasing the freed tail.
    /// No-op if `region` is already that size or smaller.
    pub fn shrink_to(&mut self, region: BufferRegion, new_length: u32) {
        let id = region.0;
        let length = self.node(id).length;
        if new_length >= length {
            return;
        }
        let offset = self.node(id).offset;
        self.used -= length - new_length;
        self.node_mut(id).length = new_length;
        let next = self.node(id).next;
        let remainder = AreaNode {
            kind: AreaKind::Free,
            offset: offset + new_length,
            length: length - new_length,
            prev: Some(id),
            next,
        };
        let remainder_id = self.alloc_node(remainder);
        self.node_mut(id).next = Some(remainder_id);
        if let Some(n) = next {
            self.node_mut(n).prev = Some(remainder_id);
        } else {
            self.tail = Some(remainder_id);
        }
        self.coalesce_with_neighbors(remainder_id);
    }

    /// Merges `[offset, offset+length)` into the set of ranges the
    /// caller needs to re-upload, coalescing overlapping/adjacent ranges.
    pub fn mark_dirty(&mut self, offset: u32, length: u32) {
        if length == 0 {
            return;
        }
        self.dirty_ranges.push((offset, offset + length));
        self.dirty_ranges.sort_by_key(|r| r.0);
        let mut merged: Vec<(u32, u32)> = Vec::new();
        for r in self.dirty_ranges.drain(..) {
            if let Some(last) = merged.last_mut() {
                if r.0 <= last.1 {
                    last.1 = last.1.max(r.1);
                    continue;
                }
            }
            merged.push(r);
        }
        self.dirty_ranges = merged;
    }

    pub fn take_dirty_ranges(&mut self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.dirty_ranges)
    }

    /// Compacts every occupied area to the front of the buffer, in
    /// current physical order, leaving one trailing free area. Returns
    /// the regions that moved, for the caller to apply to its own
    /// backing storage, and marks the moved ranges dirty.
    pub fn defragment(&mut self) -> Vec<(BufferRegion, u32, u32, u32)> {
        let mut moves = Vec::new();
        let mut write_cursor = 0u32;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let next = self.node(id).next;
            if self.node(id).kind == AreaKind::Occupied {
                let old_offset = self.node(id).offset;
                let length = self.node(id).length;
                if old_offset != write_cursor {
                    moves.push((BufferRegion(id), old_offset, write_cursor, length));
                    self.node_mut(id).offset = write_cursor;
                }
                write_cursor += length;
            }
            cursor = next;
        }

        let mut occupied = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let next = self.node(id).next;
            let is_occupied = self.node(id).kind == AreaKind::Occupied;
            if is_occupied {
                occupied.push(id);
            } else {
                self.arena[id as usize] = None;
            }
            cursor = next;
        }

        for pair in occupied.windows(2) {
            self.node_mut(pair[0]).next = Some(pair[1]);
            self.node_mut(pair[1]).prev = Some(pair[0]);
        }
        self.head = occupied.first().copied();
        let last_occupied = occupied.last().copied();
        if let Some(last) = last_occupied {
            self.node_mut(last).next = None;
        }

        if write_cursor < self.capacity {
            let tail = AreaNode {
                kind: AreaKind::Free,
                offset: write_cursor,
                length: self.capacity - write_cursor,
                prev: last_occupied,
                next: None,
            };
            let tail_id = self.alloc_node(tail);
            match last_occupied {
                Some(last) => self.node_mut(last).next = Some(tail_id),
                None => self.head = Some(tail_id),
            }
            self.tail = Some(tail_id);
        } else {
            self.tail = last_occupied;
        }

        for &(_, _, new_offset, length) in &moves {
            self.mark_dirty(new_offset, length);
        }
        moves
    }
}

/// Accumulates a variable-length, not-known-in-advance run of slots (one
/// chunk's worth of mesh vertices or indices) into a [`Buffer`], growing
/// the backing region geometrically as more space is requested and
/// trimming the unused tail on [`Writer::done`].
pub struct Writer<'a> {
    buffer: &'a mut Buffer,
    region: Option<BufferRegion>,
    used: u32,
}

impl<'a> Writer<'a> {
    pub fn new(buffer: &'a mut Buffer) -> Self {
        Self {
            buffer,
            region: None,
            used: 0,
        }
    }

    /// Reserves the next slot and returns its absolute offset. If this
    /// triggers growth beyond the current region's capacity, the region
    /// is reallocated — per [`Buffer::reallocate`], already-written slots
    /// are not preserved, so callers emit their data in a single
    /// monotonic pass and only trust the offsets from the most recent
    /// `get_next_space` calls after the final one.
    pub fn get_next_space(&mut self) -> u32 {
        let needed = self.used + 1;
        self.region = Some(match self.region {
            None => self.buffer.allocate(needed),
            Some(region) if self.buffer.length_of(region) < needed => self.buffer.reallocate(region, needed),
            Some(region) => region,
        });
        let offset = self.buffer.offset_of(self.region.unwrap());
        let at = offset + self.used;
        self.used += 1;
        at
    }

    /// Finalizes the write, trimming unused trailing capacity and
    /// marking the written range dirty for re-upload. Returns the final
    /// region, or `None` if nothing was ever written.
    pub fn done(self) -> Option<BufferRegion> {
        let region = self.region?;
        self.buffer.shrink_to(region, self.used);
        let offset = self.buffer.offset_of(region);
        self.buffer.mark_dirty(offset, self.used);
        Some(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_grows_buffer_from_empty() {
        let mut buf = Buffer::new();
        let region = buf.allocate(10);
        assert!(buf.capacity() >= 10);
        assert_eq!(buf.length_of(region), 10);
        assert_eq!(buf.used(), 10);
    }

    #[test]
    fn free_then_allocate_reuses_gap() {
        let mut buf = Buffer::new();
        let a = buf.allocate(10);
        let a_offset = buf.offset_of(a);
        let b = buf.allocate(10);
        buf.free(a);
        let c = buf.allocate(8);
        assert_eq!(buf.offset_of(c), a_offset, "freed gap should be reused before growing");
        assert_eq!(buf.used(), 18);
        let _ = b;
    }

    #[test]
    fn free_coalesces_adjacent_gaps() {
        let mut buf = Buffer::new();
        let a = buf.allocate(4);
        let b = buf.allocate(4);
        let c = buf.allocate(4);
        buf.free(a);
        buf.free(b);
        // a and b are adjacent and now both free; a new allocation that
        // needs more than either alone should fit without growing.
        let cap_before = buf.capacity();
        let d = buf.allocate(8);
        assert_eq!(buf.capacity(), cap_before, "coalesced gap should satisfy without growth");
        let _ = (c, d);
    }

    #[test]
    fn dirty_ranges_coalesce_overlaps_and_adjacency() {
        let mut buf = Buffer::new();
        buf.mark_dirty(0, 5);
        buf.mark_dirty(5, 5);
        buf.mark_dirty(20, 3);
        let ranges = buf.take_dirty_ranges();
        assert_eq!(ranges, vec![(0, 10), (20, 23)]);
    }

    #[test]
    fn defragment_compacts_and_reports_moves() {
        let mut buf = Buffer::new();
        let a = buf.allocate(4);
        let b = buf.allocate(4);
        let c = buf.allocate(4);
        buf.free(b);
        let moves = buf.defragment();
        assert!(moves.iter().any(|&(region, _, _, _)| region == c));
        assert_eq!(buf.offset_of(a), 0);
        assert_eq!(buf.offset_of(c), 4);
    }

    #[test]
    fn writer_accumulates_and_trims_tail() {
        let mut buf = Buffer::new();
        let offsets: Vec<u32> = {
            let mut w = Writer::new(&mut buf);
            let mut offsets = Vec::new();
            for _ in 0..5 {
                offsets.push(w.get_next_space());
            }
            let region = w.done().unwrap();
            assert_eq!(buf_used_is(&buf), 5);
            let _ = region;
            offsets
        };
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    fn buf_used_is(buf: &Buffer) -> u32 {
        buf.used()
    }
}
