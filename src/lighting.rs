// Copyright voxel-core contributors, MIT License.

//! Baked per-voxel lighting: a BFS-propagated sunlight channel plus an
//! RGB emissive channel, with incremental add/remove/replace updates
//! instead of full rebakes (`spec.md` §5).
//!
//! The propagator is generic over a [`LightField`] rather than tied
//! directly to [`crate::shape::Shape`], the same seam `all-is-cubes` draws
//! between its `Space` storage and its lighting algorithm (`raytrace.rs`
//! sampling through a trait rather than a concrete struct) — it lets the
//! BFS cross chunk boundaries without needing to know how chunks are laid
//! out in memory.

use std::collections::VecDeque;

use crate::math::{GridAab, GridPoint, Rgb};

/// Maximum value of any light channel (4-bit-style range, matching the
/// discrete step cost model below).
pub const MAX_LIGHT: u8 = 15;

/// Cost, in light units, of spreading one step through open air.
pub const SUNLIGHT_PROPAGATION_STEP: u8 = 1;

/// A baked light sample: one sunlight channel and one RGB emissive
/// channel, each independently propagated and summed at sample time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Light {
    pub sun: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Light {
    pub const DARK: Light = Light { sun: 0, r: 0, g: 0, b: 0 };

    pub fn channel(self, channel: Channel) -> u8 {
        match channel {
            Channel::Sun => self.sun,
            Channel::R => self.r,
            Channel::G => self.g,
            Channel::B => self.b,
        }
    }

    pub fn with_channel(mut self, channel: Channel, value: u8) -> Self {
        match channel {
            Channel::Sun => self.sun = value,
            Channel::R => self.r = value,
            Channel::G => self.g = value,
            Channel::B => self.b = value,
        }
        self
    }

    /// Combines the sunlight channel (treated as white) and the emissive
    /// channel into a single displayable color, scaled to `[0.0, 1.0]`.
    pub fn combined_rgb(self) -> Rgb {
        let scale = 1.0 / MAX_LIGHT as f32;
        let sun = self.sun as f32 * scale;
        Rgb::new(
            (sun + self.r as f32 * scale).min(1.0),
            (sun + self.g as f32 * scale).min(1.0),
            (sun + self.b as f32 * scale).min(1.0),
        )
    }

    pub fn is_dark(self) -> bool {
        self.sun == 0 && self.r == 0 && self.g == 0 && self.b == 0
    }
}

/// One of the four independently-propagated light channels. The bitmask
/// used by [`LightPropagator::remove_and_refill`] packs these as bits
/// `0..=3` in sun/r/g/b order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channel {
    Sun = 0,
    R = 1,
    G = 2,
    B = 3,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Sun, Channel::R, Channel::G, Channel::B];

    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// How much a channel's step cost grows as a translucent voxel's opacity
/// increases from 0 toward 1, before the step is clamped by an optional
/// cap. `t` is the voxel's alpha.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Easing {
    Linear,
    Quadratic,
    Cubic,
    Exponential,
    Circular,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Quadratic => t * t,
            Easing::Cubic => t * t * t,
            Easing::Exponential => {
                if t <= 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * (t - 1.0))
                }
            }
            Easing::Circular => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        }
    }
}

/// How the sunlight channel combines at a vertex from its surrounding
/// cubes when meshing (`spec.md` §5.4 / §4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SunlightMode {
    Min,
    Max,
    Mean,
}

impl Default for SunlightMode {
    fn default() -> Self {
        SunlightMode::Min
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LightingOptions {
    pub absorption_easing: Easing,
    pub sunlight_mode: SunlightMode,
    /// Upper bound on the step cost any single translucent voxel can
    /// impose, regardless of its alpha. `None` means uncapped.
    pub step_cap: Option<u8>,
}

impl Default for LightingOptions {
    fn default() -> Self {
        Self {
            absorption_easing: Easing::Quadratic,
            sunlight_mode: SunlightMode::Min,
            step_cap: None,
        }
    }
}

/// A voxel's effect on light passing through it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoxelOpacity {
    /// No attenuation.
    Empty,
    /// Attenuates by an easing-scaled amount proportional to `alpha`.
    Translucent(f32),
    /// Blocks light entirely.
    Opaque,
}

/// The storage and voxel-property surface the propagator needs. Implemented
/// by whatever owns the actual per-chunk light arrays (a [`crate::shape::Shape`]
/// in this crate), so the BFS can be written once and walk across chunk
/// boundaries transparently.
pub trait LightField {
    /// The region light may occupy; points outside are treated as open air
    /// for propagation purposes but not stored.
    fn bounds(&self) -> GridAab;
    fn opacity_at(&self, cube: GridPoint) -> VoxelOpacity;
    fn emission_at(&self, cube: GridPoint) -> Option<Rgb>;
    fn light_at(&self, cube: GridPoint) -> Light;
    fn set_light_at(&mut self, cube: GridPoint, light: Light);
}

/// Matches [`crate::math::Face6::ALL`]'s normal vectors, duplicated here as
/// point deltas to keep this module decoupled from an instantiated
/// `Face6` array.
fn face_neighbor_deltas() -> [GridPoint; 6] {
    [
        GridPoint::new(1, 0, 0),
        GridPoint::new(-1, 0, 0),
        GridPoint::new(0, 0, -1),
        GridPoint::new(0, 0, 1),
        GridPoint::new(0, 1, 0),
        GridPoint::new(0, -1, 0),
    ]
}

fn neighbors26(center: GridPoint) -> impl Iterator<Item = GridPoint> {
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dz| {
                if dx == 0 && dy == 0 && dz == 0 {
                    None
                } else {
                    Some(GridPoint::new(center.x + dx, center.y + dy, center.z + dz))
                }
            })
        })
    })
}

struct TouchedBounds(Option<GridAab>);
impl TouchedBounds {
    fn new() -> Self {
        Self(None)
    }
    fn include(&mut self, cube: GridPoint) {
        self.0 = Some(match self.0 {
            Some(b) => b.including(cube),
            None => GridAab::empty_at(cube).including(cube),
        });
    }
    fn finish(self) -> Option<GridAab> {
        self.0.map(|b| b.expanded(1))
    }
}

/// BFS-based propagator for baked sunlight and emissive light.
pub struct LightPropagator {
    pub options: LightingOptions,
}

impl LightPropagator {
    pub fn new(options: LightingOptions) -> Self {
        Self { options }
    }

    fn step_cost(&self, opacity: VoxelOpacity) -> Option<u8> {
        match opacity {
            VoxelOpacity::Opaque => None,
            VoxelOpacity::Empty => Some(SUNLIGHT_PROPAGATION_STEP),
            VoxelOpacity::Translucent(alpha) => {
                let eased = self.options.absorption_easing.apply(alpha);
                let extra = (eased * 14.0).round() as u8;
                let cost = SUNLIGHT_PROPAGATION_STEP.saturating_add(extra);
                Some(match self.options.step_cap {
                    Some(cap) => cost.min(cap),
                    None => cost,
                })
            }
        }
    }

    /// Propagates a single channel from `seeds` (cube, initial value)
    /// outward through 6-connected neighbors, each step costing
    /// [`Self::step_cost`] — except straight-down steps through open air,
    /// which are free, matching classic voxel-engine skylight behavior.
    /// Returns the bounding box of cubes whose stored light changed,
    /// expanded by one cube, for dirtying dependent chunks.
    pub fn propagate_channel<F: LightField>(
        &self,
        field: &mut F,
        channel: Channel,
        seeds: impl IntoIterator<Item = (GridPoint, u8)>,
        free_vertical_descent: bool,
    ) -> Option<GridAab> {
        let mut touched = TouchedBounds::new();
        let mut queue: VecDeque<(GridPoint, u8)> = VecDeque::new();
        for (cube, value) in seeds {
            if !field.bounds().contains_cube(cube) {
                continue;
            }
            if value > field.light_at(cube).channel(channel) {
                let updated = field.light_at(cube).with_channel(channel, value);
                field.set_light_at(cube, updated);
                touched.include(cube);
                queue.push_back((cube, value));
            }
        }

        let face_deltas = face_neighbor_deltas();
        while let Some((cube, value)) = queue.pop_front() {
            if value == 0 {
                continue;
            }
            for (face_index, delta) in face_deltas.iter().enumerate() {
                let neighbor = GridPoint::new(cube.x + delta.x, cube.y + delta.y, cube.z + delta.z);
                if !field.bounds().contains_cube(neighbor) {
                    continue;
                }
                let opacity = field.opacity_at(neighbor);
                let is_straight_down = face_index == 5 && delta.y < 0;
                let cost = if free_vertical_descent && is_straight_down && opacity == VoxelOpacity::Empty {
                    0
                } else {
                    match self.step_cost(opacity) {
                        Some(c) => c,
                        None => continue,
                    }
                };
                let new_value = value.saturating_sub(cost);
                if new_value > field.light_at(neighbor).channel(channel) {
                    let updated = field.light_at(neighbor).with_channel(channel, new_value);
                    field.set_light_at(neighbor, updated);
                    touched.include(neighbor);
                    if cost == 0 {
                        queue.push_front((neighbor, new_value));
                    } else {
                        queue.push_back((neighbor, new_value));
                    }
                }
            }
        }

        touched.finish()
    }

    /// Seeds sunlight at every cube in `columns` (typically the shape's
    /// footprint expanded by one cube on each horizontal side, at the
    /// shape's maximum Y) with [`MAX_LIGHT`], then propagates downward and
    /// outward.
    pub fn propagate_sunlight<F: LightField>(
        &self,
        field: &mut F,
        columns: impl IntoIterator<Item = GridPoint>,
    ) -> Option<GridAab> {
        let seeds: Vec<(GridPoint, u8)> = columns.into_iter().map(|c| (c, MAX_LIGHT)).collect();
        self.propagate_channel(field, Channel::Sun, seeds, true)
    }

    /// Seeds an emissive source at `cube` by lighting all 26 surrounding
    /// neighbors at full intensity (the source is taken to glow uniformly
    /// in every direction, not just through its six faces), then
    /// propagates each RGB channel outward from there.
    pub fn propagate_emission<F: LightField>(&self, field: &mut F, cube: GridPoint, color: Rgb) -> Option<GridAab> {
        let mut result: Option<GridAab> = None;
        for (channel, level) in [
            (Channel::R, (color.red() * MAX_LIGHT as f32).round() as u8),
            (Channel::G, (color.green() * MAX_LIGHT as f32).round() as u8),
            (Channel::B, (color.blue() * MAX_LIGHT as f32).round() as u8),
        ] {
            if level == 0 {
                continue;
            }
            let seeds: Vec<(GridPoint, u8)> = neighbors26(cube).chain(std::iter::once(cube)).map(|c| (c, level)).collect();
            let touched = self.propagate_channel(field, channel, seeds, false);
            result = match (result, touched) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (a, None) => a,
                (None, b) => b,
            };
        }
        result
    }

    /// Removes light that originated at `cube` from the given channels
    /// (packed as [`Channel::bit`] flags) and refills the darkened region
    /// from any remaining neighboring sources. This is the classic
    /// two-pass removal BFS: first a darkening pass that clears any
    /// neighbor strictly dimmer than the node being unlit (meaning it was
    /// lit *by* this source), collecting neighbors that are *not* dimmer
    /// (lit by something else, or already dark) as refill seeds; then a
    /// normal propagation pass reseeded from those survivors.
    pub fn remove_and_refill<F: LightField>(&self, field: &mut F, cube: GridPoint, channel_mask: u8) -> Option<GridAab> {
        let mut touched = TouchedBounds::new();
        let mut refill_seeds: Vec<(Channel, GridPoint, u8)> = Vec::new();

        for channel in Channel::ALL {
            if channel_mask & channel.bit() == 0 {
                continue;
            }
            let mut darken_queue: VecDeque<(GridPoint, u8)> = VecDeque::new();
            let start_value = field.light_at(cube).channel(channel);
            if start_value == 0 {
                continue;
            }
            field.set_light_at(cube, field.light_at(cube).with_channel(channel, 0));
            touched.include(cube);
            darken_queue.push_back((cube, start_value));

            let face_deltas = face_neighbor_deltas();
            while let Some((node, value)) = darken_queue.pop_front() {
                for delta in face_deltas.iter() {
                    let neighbor = GridPoint::new(node.x + delta.x, node.y + delta.y, node.z + delta.z);
                    if !field.bounds().contains_cube(neighbor) {
                        continue;
                    }
                    let neighbor_value = field.light_at(neighbor).channel(channel);
                    if neighbor_value != 0 && neighbor_value < value {
                        field.set_light_at(neighbor, field.light_at(neighbor).with_channel(channel, 0));
                        touched.include(neighbor);
                        darken_queue.push_back((neighbor, neighbor_value));
                    } else if neighbor_value >= value {
                        refill_seeds.push((channel, neighbor, neighbor_value));
                    }
                }
            }
        }

        for channel in Channel::ALL {
            let seeds: Vec<(GridPoint, u8)> = refill_seeds
                .iter()
                .filter(|&&(c, _, _)| c == channel)
                .map(|&(_, cube, value)| (cube, value))
                .collect();
            if seeds.is_empty() {
                continue;
            }
            if let Some(t) = self.propagate_channel(field, channel, seeds, channel == Channel::Sun) {
                touched.0 = Some(touched.0.map_or(t, |b| b.union(&t)));
            }
        }

        touched.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestField {
        bounds: GridAab,
        opacity: HashMap<GridPoint, VoxelOpacity>,
        light: HashMap<GridPoint, Light>,
    }

    impl TestField {
        fn new(bounds: GridAab) -> Self {
            Self {
                bounds,
                opacity: HashMap::new(),
                light: HashMap::new(),
            }
        }
    }

    impl LightField for TestField {
        fn bounds(&self) -> GridAab {
            self.bounds
        }
        fn opacity_at(&self, cube: GridPoint) -> VoxelOpacity {
            self.opacity.get(&cube).copied().unwrap_or(VoxelOpacity::Empty)
        }
        fn emission_at(&self, _cube: GridPoint) -> Option<Rgb> {
            None
        }
        fn light_at(&self, cube: GridPoint) -> Light {
            self.light.get(&cube).copied().unwrap_or(Light::DARK)
        }
        fn set_light_at(&mut self, cube: GridPoint, light: Light) {
            self.light.insert(cube, light);
        }
    }

    #[test]
    fn sunlight_descends_free_and_spreads_under_overhang() {
        let bounds = GridAab::new(GridPoint::new(0, 0, 0), crate::math::GridVector::new(5, 5, 5));
        let mut field = TestField::new(bounds);
        field.opacity.insert(GridPoint::new(2, 3, 2), VoxelOpacity::Opaque);
        let prop = LightPropagator::new(LightingOptions::default());
        prop.propagate_sunlight(&mut field, [GridPoint::new(2, 4, 2)]);
        assert_eq!(field.light_at(GridPoint::new(2, 0, 2)).sun, MAX_LIGHT);
        // Under the overhang, light must sneak in horizontally, costing at least one step.
        assert!(field.light_at(GridPoint::new(2, 2, 2)).sun < MAX_LIGHT);
    }

    #[test]
    fn emission_lights_all_26_neighbors_uniformly() {
        let bounds = GridAab::new(GridPoint::new(0, 0, 0), crate::math::GridVector::new(5, 5, 5));
        let mut field = TestField::new(bounds);
        let prop = LightPropagator::new(LightingOptions::default());
        prop.propagate_emission(&mut field, GridPoint::new(2, 2, 2), Rgb::new(1.0, 0.0, 0.0));
        for n in neighbors26(GridPoint::new(2, 2, 2)) {
            assert_eq!(field.light_at(n).r, MAX_LIGHT, "{n:?}");
        }
    }

    #[test]
    fn removal_darkens_only_what_this_source_lit() {
        let bounds = GridAab::new(GridPoint::new(0, 0, 0), crate::math::GridVector::new(9, 1, 1));
        let mut field = TestField::new(bounds);
        let prop = LightPropagator::new(LightingOptions::default());
        prop.propagate_channel(&mut field, Channel::R, [(GridPoint::new(0, 0, 0), MAX_LIGHT)], false);
        prop.propagate_channel(&mut field, Channel::R, [(GridPoint::new(8, 0, 0), MAX_LIGHT)], false);
        let mid_before = field.light_at(GridPoint::new(4, 0, 0)).r;
        assert!(mid_before > 0);
        prop.remove_and_refill(&mut field, GridPoint::new(0, 0, 0), Channel::R.bit());
        // still lit from the far source, just dimmer (or equal, if it was already dominant)
        assert!(field.light_at(GridPoint::new(4, 0, 0)).r > 0);
        assert!(field.light_at(GridPoint::new(0, 0, 0)).r < MAX_LIGHT);
    }
}
