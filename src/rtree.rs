// Copyright voxel-core contributors, MIT License.

//! A broad-phase R-tree spatial index over arbitrary axis-aligned boxes,
//! used to answer overlap and ray/box-cast queries against a scene's
//! colliders without scanning every one of them.
//!
//! Nodes live in an arena (`Vec<Option<NodeRec<P>>>`) addressed by index
//! rather than linked via `Rc`/`RefCell`, the same ownership style the
//! octree in [`crate::octree`] uses, so that a leaf's externally-visible
//! [`LeafId`] stays valid across splits and condensation.

use std::collections::HashSet;

use cgmath::{Point3, Vector3};

use crate::math::{Aab, FreeCoordinate};

/// Minimum node occupancy before condensation reclaims a node.
const MIN_OCCUPANCY: usize = 2;
/// Maximum node occupancy before a node is split.
const MAX_OCCUPANCY: usize = 4;

/// Volume delta, in cubic world units, below which an in-place leaf bounds
/// update is accepted without forcing a remove-and-reinsert.
const UPDATE_IN_PLACE_THRESHOLD: FreeCoordinate = 25.0;

/// Nominal step length used to decompose a long swept-box cast into a
/// sequence of broad-phase overlap queries.
const SWEEP_STEP_LENGTH: FreeCoordinate = 64.0;

type NodeId = usize;

/// Opaque handle to a single inserted leaf. Stable across splits,
/// condensation, and in-place or reinsertion updates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct LeafId(NodeId);

enum NodeKind<P> {
    Leaf {
        payload: P,
        groups: u16,
        collides_with: u16,
    },
    Internal {
        children: Vec<NodeId>,
    },
}

struct NodeRec<P> {
    parent: Option<NodeId>,
    bounds: Aab,
    kind: NodeKind<P>,
}

/// A ray in world space, used by [`RTree::cast_ray`].
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3<FreeCoordinate>,
    pub direction: Vector3<FreeCoordinate>,
}

/// Slab-method ray/box intersection. Returns the entry distance along the
/// ray, clamped to zero if the origin is already inside the box, or `None`
/// if the ray misses.
fn ray_aab_intersection(aab: &Aab, ray: &Ray) -> Option<FreeCoordinate> {
    let lower = aab.lower();
    let upper = aab.upper();
    let mut t_min = 0.0_f64;
    let mut t_max = FreeCoordinate::INFINITY;
    for axis in 0..3 {
        let (lo, hi, origin, dir) = match axis {
            0 => (lower.x, upper.x, ray.origin.x, ray.direction.x),
            1 => (lower.y, upper.y, ray.origin.y, ray.direction.y),
            _ => (lower.z, upper.z, ray.origin.z, ray.direction.z),
        };
        if dir.abs() < 1e-12 {
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }
        let mut t1 = (lo - origin) / dir;
        let mut t2 = (hi - origin) / dir;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

fn reciprocal_mask(a_groups: u16, a_collides_with: u16, b_groups: u16, b_collides_with: u16) -> bool {
    (a_groups & b_collides_with) != 0 && (b_groups & a_collides_with) != 0
}

/// A quadratic-split R-tree of axis-aligned boxes, each carrying a
/// caller-chosen payload `P` (typically a shape or collider id) plus a
/// 16-bit collision group mask and a 16-bit collides-with mask tested
/// reciprocally between query and leaf.
pub struct RTree<P> {
    arena: Vec<Option<NodeRec<P>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
}

impl<P: Copy> Default for RTree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy> RTree<P> {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn alloc(&mut self, rec: NodeRec<P>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.arena[id] = Some(rec);
            id
        } else {
            self.arena.push(Some(rec));
            self.arena.len() - 1
        }
    }

    fn dealloc(&mut self, id: NodeId) {
        self.arena[id] = None;
        self.free.push(id);
    }

    fn node(&self, id: NodeId) -> &NodeRec<P> {
        self.arena[id].as_ref().expect("dangling rtree node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeRec<P> {
        self.arena[id].as_mut().expect("dangling rtree node id")
    }

    fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Leaf { .. })
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Internal { children } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    /// Inserts a new leaf and returns a handle stable until that leaf is
    /// removed.
    pub fn insert(&mut self, bounds: Aab, groups: u16, collides_with: u16, payload: P) -> LeafId {
        let id = self.alloc(NodeRec {
            parent: None,
            bounds,
            kind: NodeKind::Leaf {
                payload,
                groups,
                collides_with,
            },
        });
        self.attach_leaf(id);
        LeafId(id)
    }

    /// Attaches an already-allocated, parentless leaf node into the tree.
    /// Used both by [`Self::insert`] and by condensation's reinsertion of
    /// orphaned leaves.
    fn attach_leaf(&mut self, leaf_id: NodeId) {
        let bounds = self.node(leaf_id).bounds;
        match self.root {
            None => {
                self.root = Some(leaf_id);
            }
            Some(root_id) if self.is_leaf(root_id) => {
                let new_root = self.alloc(NodeRec {
                    parent: None,
                    bounds: self.node(root_id).bounds.union(&bounds),
                    kind: NodeKind::Internal {
                        children: vec![root_id, leaf_id],
                    },
                });
                self.node_mut(root_id).parent = Some(new_root);
                self.node_mut(leaf_id).parent = Some(new_root);
                self.root = Some(new_root);
            }
            Some(root_id) => {
                let target = self.choose_subtree(root_id, bounds);
                self.insert_child_into(target, leaf_id);
            }
        }
    }

    /// Descends from `current` (an internal node) picking, at each level,
    /// the child requiring the least bounds enlargement, stopping at the
    /// first internal node whose children are leaves.
    fn choose_subtree(&self, mut current: NodeId, bounds: Aab) -> NodeId {
        loop {
            let children = self.children(current);
            if children.is_empty() || self.is_leaf(children[0]) {
                return current;
            }
            let mut best = children[0];
            let mut best_enlargement = self.enlargement(best, bounds);
            for &c in &children[1..] {
                let enlargement = self.enlargement(c, bounds);
                if enlargement < best_enlargement
                    || (enlargement == best_enlargement
                        && self.tie_break_better(c, best))
                {
                    best = c;
                    best_enlargement = enlargement;
                }
            }
            current = best;
        }
    }

    fn enlargement(&self, node: NodeId, bounds: Aab) -> FreeCoordinate {
        let current = self.node(node).bounds;
        current.union(&bounds).volume() - current.volume()
    }

    /// Tie-break rule shared by subtree choice and quadratic split:
    /// smaller existing volume wins, then fewer children.
    fn tie_break_better(&self, candidate: NodeId, incumbent: NodeId) -> bool {
        let cv = self.node(candidate).bounds.volume();
        let iv = self.node(incumbent).bounds.volume();
        if cv != iv {
            return cv < iv;
        }
        self.children(candidate).len() < self.children(incumbent).len()
    }

    /// Appends `child` to `parent`'s children, updates bounds, and splits
    /// (possibly cascading to the root) if `parent` overflows.
    fn insert_child_into(&mut self, parent: NodeId, child: NodeId) {
        match &mut self.node_mut(parent).kind {
            NodeKind::Internal { children } => children.push(child),
            NodeKind::Leaf { .. } => unreachable!("attempted to insert into a leaf node"),
        }
        self.node_mut(child).parent = Some(parent);
        self.recompute_bounds(parent);
        if self.children(parent).len() > MAX_OCCUPANCY {
            self.split_and_propagate(parent);
        } else {
            self.propagate_bounds_upward(parent);
        }
    }

    fn recompute_bounds(&mut self, node: NodeId) {
        let children = self.children(node).to_vec();
        let mut bounds = self.node(children[0]).bounds;
        for &c in &children[1..] {
            bounds = bounds.union(&self.node(c).bounds);
        }
        self.node_mut(node).bounds = bounds;
    }

    fn propagate_bounds_upward(&mut self, mut node: NodeId) {
        while let Some(parent) = self.node(node).parent {
            self.recompute_bounds(parent);
            node = parent;
        }
    }

    /// Quadratic-split `node`'s children into two groups, keeping one in
    /// `node` and moving the rest into a new sibling, then attaches the
    /// sibling to `node`'s parent (creating a new root if `node` had none).
    fn split_and_propagate(&mut self, node: NodeId) {
        let children = match &self.node(node).kind {
            NodeKind::Internal { children } => children.clone(),
            NodeKind::Leaf { .. } => unreachable!(),
        };
        let (group_a, group_b) = self.quadratic_split(children);

        for &c in &group_a {
            self.node_mut(c).parent = Some(node);
        }
        self.node_mut(node).kind = NodeKind::Internal { children: group_a };
        self.recompute_bounds(node);

        let sibling = self.alloc(NodeRec {
            parent: None,
            bounds: self.node(node).bounds,
            kind: NodeKind::Internal {
                children: group_b.clone(),
            },
        });
        for &c in &group_b {
            self.node_mut(c).parent = Some(sibling);
        }
        self.recompute_bounds(sibling);

        match self.node(node).parent {
            None => {
                let new_root = self.alloc(NodeRec {
                    parent: None,
                    bounds: self.node(node).bounds.union(&self.node(sibling).bounds),
                    kind: NodeKind::Internal {
                        children: vec![node, sibling],
                    },
                });
                self.node_mut(node).parent = Some(new_root);
                self.node_mut(sibling).parent = Some(new_root);
                self.root = Some(new_root);
            }
            Some(parent) => {
                self.insert_child_into(parent, sibling);
            }
        }
    }

    /// Classic quadratic-split: pick the pair of entries wasting the most
    /// volume if merged as seeds, then repeatedly assign the remaining
    /// entry with the largest preference difference to whichever seed
    /// group needs the least enlargement, forcing the rest to one side
    /// once the other has met minimum occupancy.
    fn quadratic_split(&self, entries: Vec<NodeId>) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut best_pair = (0, 1);
        let mut best_waste = FreeCoordinate::NEG_INFINITY;
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let waste = self
                    .node(entries[i])
                    .bounds
                    .merge_waste(&self.node(entries[j]).bounds);
                if waste > best_waste {
                    best_waste = waste;
                    best_pair = (i, j);
                }
            }
        }
        let seed_a = entries[best_pair.0];
        let seed_b = entries[best_pair.1];
        let mut remaining: Vec<NodeId> = entries
            .into_iter()
            .enumerate()
            .filter(|&(i, _)| i != best_pair.0 && i != best_pair.1)
            .map(|(_, id)| id)
            .collect();

        let mut group_a = vec![seed_a];
        let mut group_b = vec![seed_b];
        let mut bounds_a = self.node(seed_a).bounds;
        let mut bounds_b = self.node(seed_b).bounds;

        while !remaining.is_empty() {
            if group_a.len() + remaining.len() == MIN_OCCUPANCY {
                group_a.extend(remaining.drain(..));
                break;
            }
            if group_b.len() + remaining.len() == MIN_OCCUPANCY {
                group_b.extend(remaining.drain(..));
                break;
            }

            let mut pick_index = 0;
            let mut pick_preference = FreeCoordinate::NEG_INFINITY;
            let mut pick_d1 = 0.0;
            let mut pick_d2 = 0.0;
            for (idx, &e) in remaining.iter().enumerate() {
                let eb = self.node(e).bounds;
                let d1 = bounds_a.union(&eb).volume() - bounds_a.volume();
                let d2 = bounds_b.union(&eb).volume() - bounds_b.volume();
                let preference = (d1 - d2).abs();
                if preference > pick_preference {
                    pick_preference = preference;
                    pick_index = idx;
                    pick_d1 = d1;
                    pick_d2 = d2;
                }
            }
            let entry = remaining.remove(pick_index);
            let assign_to_a = if pick_d1 != pick_d2 {
                pick_d1 < pick_d2
            } else if bounds_a.volume() != bounds_b.volume() {
                bounds_a.volume() < bounds_b.volume()
            } else {
                group_a.len() <= group_b.len()
            };
            if assign_to_a {
                bounds_a = bounds_a.union(&self.node(entry).bounds);
                group_a.push(entry);
            } else {
                bounds_b = bounds_b.union(&self.node(entry).bounds);
                group_b.push(entry);
            }
        }

        (group_a, group_b)
    }

    /// Removes a leaf entirely, condensing underpopulated ancestors and
    /// reinserting any leaves that were orphaned by that condensation.
    pub fn remove(&mut self, leaf_id: LeafId) {
        let id = leaf_id.0;
        let parent = self.node(id).parent;
        self.dealloc(id);
        match parent {
            None => self.root = None,
            Some(parent_id) => {
                self.remove_child(parent_id, id);
                self.condense(parent_id);
            }
        }
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        match &mut self.node_mut(parent).kind {
            NodeKind::Internal { children } => children.retain(|&c| c != child),
            NodeKind::Leaf { .. } => unreachable!(),
        }
    }

    /// Walks upward from `node`, deleting internal nodes that fall below
    /// minimum occupancy and collecting their leaf descendants (by id, not
    /// by value, so external `LeafId`s stay valid) for reinsertion.
    fn condense(&mut self, mut node: NodeId) {
        let mut orphans: Vec<NodeId> = Vec::new();
        loop {
            let parent = self.node(node).parent;
            let count = self.children(node).len();
            if count < MIN_OCCUPANCY {
                let leaves = self.dismantle(node);
                match parent {
                    Some(p) => {
                        self.remove_child(p, node);
                        orphans.extend(leaves);
                        node = p;
                    }
                    None => {
                        self.root = None;
                        orphans.extend(leaves);
                        break;
                    }
                }
            } else {
                self.recompute_bounds(node);
                match parent {
                    Some(p) => node = p,
                    None => break,
                }
            }
        }
        for leaf in orphans {
            self.node_mut(leaf).parent = None;
            self.attach_leaf(leaf);
        }
        self.collapse_root_if_singular();
    }

    /// Recursively frees `node` and every internal descendant, returning
    /// the leaf node ids found underneath (left allocated, untouched).
    fn dismantle(&mut self, node: NodeId) -> Vec<NodeId> {
        match &self.arena[node] {
            Some(NodeRec {
                kind: NodeKind::Leaf { .. },
                ..
            }) => vec![node],
            Some(NodeRec {
                kind: NodeKind::Internal { children },
                ..
            }) => {
                let children = children.clone();
                let mut leaves = Vec::new();
                for c in children {
                    leaves.extend(self.dismantle(c));
                }
                self.dealloc(node);
                leaves
            }
            None => Vec::new(),
        }
    }

    fn collapse_root_if_singular(&mut self) {
        if let Some(root_id) = self.root {
            if let NodeKind::Internal { children } = &self.node(root_id).kind {
                if children.len() == 1 {
                    let only = children[0];
                    self.node_mut(only).parent = None;
                    self.dealloc(root_id);
                    self.root = Some(only);
                }
            }
        }
    }

    /// Updates a leaf's bounds. If the change to its parent's enclosing
    /// box is small, the update happens in place; otherwise the leaf is
    /// removed and reinserted from the root.
    pub fn update(&mut self, leaf_id: LeafId, new_bounds: Aab) {
        let id = leaf_id.0;
        self.node_mut(id).bounds = new_bounds;
        let Some(parent) = self.node(id).parent else {
            return;
        };
        let old_parent_volume = self.node(parent).bounds.volume();
        let children = self.children(parent).to_vec();
        let mut candidate = self.node(children[0]).bounds;
        for &c in &children[1..] {
            candidate = candidate.union(&self.node(c).bounds);
        }
        let delta = (candidate.volume() - old_parent_volume).abs();
        if delta < UPDATE_IN_PLACE_THRESHOLD {
            self.node_mut(parent).bounds = candidate;
            self.propagate_bounds_upward(parent);
        } else {
            self.remove_child(parent, id);
            self.condense(parent);
            self.node_mut(id).parent = None;
            self.attach_leaf(id);
        }
    }

    /// Returns every leaf intersecting `bounds` whose masks reciprocally
    /// match `groups`/`collides_with`.
    pub fn query_overlap(&self, bounds: Aab, groups: u16, collides_with: u16) -> Vec<(LeafId, P)> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.query_overlap_rec(root, &bounds, groups, collides_with, &mut out);
        }
        out
    }

    fn query_overlap_rec(
        &self,
        node: NodeId,
        bounds: &Aab,
        groups: u16,
        collides_with: u16,
        out: &mut Vec<(LeafId, P)>,
    ) {
        let rec = self.node(node);
        if !rec.bounds.intersects(bounds) {
            return;
        }
        match &rec.kind {
            NodeKind::Leaf {
                payload,
                groups: leaf_groups,
                collides_with: leaf_cw,
            } => {
                if reciprocal_mask(groups, collides_with, *leaf_groups, *leaf_cw) {
                    out.push((LeafId(node), *payload));
                }
            }
            NodeKind::Internal { children } => {
                for &c in children {
                    self.query_overlap_rec(c, bounds, groups, collides_with, out);
                }
            }
        }
    }

    /// Casts a ray, returning every matching leaf hit as `(leaf, distance)`
    /// sorted by ascending distance.
    pub fn cast_ray(
        &self,
        ray: Ray,
        max_distance: FreeCoordinate,
        groups: u16,
        collides_with: u16,
    ) -> Vec<(LeafId, FreeCoordinate)> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.cast_ray_rec(root, &ray, max_distance, groups, collides_with, &mut out);
        }
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        out
    }

    fn cast_ray_rec(
        &self,
        node: NodeId,
        ray: &Ray,
        max_distance: FreeCoordinate,
        groups: u16,
        collides_with: u16,
        out: &mut Vec<(LeafId, FreeCoordinate)>,
    ) {
        let rec = self.node(node);
        let Some(t) = ray_aab_intersection(&rec.bounds, ray) else {
            return;
        };
        if t > max_distance {
            return;
        }
        match &rec.kind {
            NodeKind::Leaf {
                payload: _,
                groups: leaf_groups,
                collides_with: leaf_cw,
            } => {
                if reciprocal_mask(groups, collides_with, *leaf_groups, *leaf_cw) {
                    out.push((LeafId(node), t));
                }
            }
            NodeKind::Internal { children } => {
                for &c in children {
                    self.cast_ray_rec(c, ray, max_distance, groups, collides_with, out);
                }
            }
        }
    }

    /// Casts a box of fixed shape `aab` swept along `direction` for
    /// `distance` units, decomposed into broad-phase overlap queries every
    /// [`SWEEP_STEP_LENGTH`] units. Returns each matching leaf once, at the
    /// distance traveled when it was first found to overlap, sorted
    /// ascending.
    pub fn cast_swept_box(
        &self,
        aab: Aab,
        direction: Vector3<FreeCoordinate>,
        distance: FreeCoordinate,
        groups: u16,
        collides_with: u16,
    ) -> Vec<(LeafId, FreeCoordinate)> {
        let dir_len = (direction.x * direction.x + direction.y * direction.y + direction.z * direction.z).sqrt();
        if dir_len <= 0.0 || distance <= 0.0 {
            return self
                .query_overlap(aab, groups, collides_with)
                .into_iter()
                .map(|(id, _)| (id, 0.0))
                .collect();
        }
        let unit = direction / dir_len;
        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut traveled = 0.0;
        while traveled < distance {
            let step_len = (distance - traveled).min(SWEEP_STEP_LENGTH);
            let step_box = aab
                .translated(unit * traveled)
                .union(&aab.translated(unit * (traveled + step_len)));
            for (leaf_id, _payload) in self.query_overlap(step_box, groups, collides_with) {
                if seen.insert(leaf_id) {
                    results.push((leaf_id, traveled));
                }
            }
            traveled += step_len;
        }
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        results
    }

    pub fn leaf_bounds(&self, leaf_id: LeafId) -> Aab {
        self.node(leaf_id.0).bounds
    }

    pub fn leaf_payload(&self, leaf_id: LeafId) -> P {
        match &self.node(leaf_id.0).kind {
            NodeKind::Leaf { payload, .. } => *payload,
            NodeKind::Internal { .. } => unreachable!("LeafId pointed at an internal node"),
        }
    }

    /// Number of leaves currently indexed. O(n); intended for tests and
    /// diagnostics, not hot paths.
    pub fn len(&self) -> usize {
        fn count<P>(tree: &RTree<P>, node: NodeId) -> usize {
            match &tree.node(node).kind {
                NodeKind::Leaf { .. } => 1,
                NodeKind::Internal { children } => children.iter().map(|&c| count(tree, c)).sum(),
            }
        }
        self.root.map_or(0, |r| count(self, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_at(x: FreeCoordinate, y: FreeCoordinate, z: FreeCoordinate) -> Aab {
        Aab::new(
            Point3::new(x, y, z),
            Point3::new(x + 1.0, y + 1.0, z + 1.0),
        )
    }

    #[test]
    fn insert_and_overlap_query_finds_expected_leaves() {
        let mut tree: RTree<u32> = RTree::new();
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(tree.insert(box_at(i as f64 * 2.0, 0.0, 0.0), 1, 1, i));
        }
        assert_eq!(tree.len(), 20);
        let hits = tree.query_overlap(box_at(0.0, 0.0, 0.0), 1, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 0);
    }

    #[test]
    fn remove_preserves_other_leaf_ids() {
        let mut tree: RTree<u32> = RTree::new();
        let mut ids = Vec::new();
        for i in 0..30 {
            ids.push(tree.insert(box_at(i as f64 * 3.0, 0.0, 0.0), 1, 1, i));
        }
        let removed = ids.remove(10);
        tree.remove(removed);
        assert_eq!(tree.len(), 29);
        for (i, &id) in ids.iter().enumerate() {
            assert_eq!(tree.leaf_payload(id), i as u32 + if i >= 10 { 1 } else { 0 });
        }
    }

    #[test]
    fn mask_reciprocity_excludes_non_matching_groups() {
        let mut tree: RTree<&'static str> = RTree::new();
        tree.insert(box_at(0.0, 0.0, 0.0), 0b0001, 0b0010, "a");
        let hits = tree.query_overlap(box_at(0.0, 0.0, 0.0), 0b0010, 0b0001);
        assert_eq!(hits.len(), 1);
        let hits = tree.query_overlap(box_at(0.0, 0.0, 0.0), 0b0100, 0b0100);
        assert!(hits.is_empty());
    }

    #[test]
    fn cast_ray_hits_sorted_by_distance() {
        let mut tree: RTree<u32> = RTree::new();
        tree.insert(box_at(5.0, 0.0, 0.0), 1, 1, 1);
        tree.insert(box_at(2.0, 0.0, 0.0), 1, 1, 2);
        let ray = Ray {
            origin: Point3::new(-10.0, 0.5, 0.5),
            direction: Vector3::new(1.0, 0.0, 0.0),
        };
        let hits = tree.cast_ray(ray, 100.0, 1, 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(tree.leaf_payload(hits[0].0), 2);
        assert_eq!(tree.leaf_payload(hits[1].0), 1);
    }

    #[test]
    fn update_small_delta_stays_in_place() {
        let mut tree: RTree<u32> = RTree::new();
        let a = tree.insert(box_at(0.0, 0.0, 0.0), 1, 1, 1);
        tree.insert(box_at(100.0, 100.0, 100.0), 1, 1, 2);
        tree.update(a, box_at(0.1, 0.0, 0.0));
        assert_eq!(tree.leaf_bounds(a).lower().x, 0.1);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn tree_survives_many_inserts_and_removals() {
        let mut tree: RTree<u32> = RTree::new();
        let mut ids = Vec::new();
        for i in 0..200 {
            ids.push(tree.insert(box_at(i as f64, (i % 7) as f64, (i % 5) as f64), 1, 1, i));
        }
        for _ in 0..100 {
            let id = ids.remove(0);
            tree.remove(id);
        }
        assert_eq!(tree.len(), 100);
        for &id in &ids {
            let payload = tree.leaf_payload(id);
            let hits = tree.query_overlap(tree.leaf_bounds(id), 1, 1);
            assert!(hits.iter().any(|&(_, p)| p == payload));
        }
    }
}
