// Copyright voxel-core contributors, MIT License.

//! [`Rgb`]/[`Rgba`] color types and the packed-8-bit representation used by
//! the `.vox` exchange format and the color atlas/palette.

use std::fmt;

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

/// A color with no transparency, components in `[0.0, 1.0]`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    r: NotNan<f32>,
    g: NotNan<f32>,
    b: NotNan<f32>,
}

impl fmt::Debug for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

impl Rgb {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: NotNan::new(r).expect("NaN color component"),
            g: NotNan::new(g).expect("NaN color component"),
            b: NotNan::new(b).expect("NaN color component"),
        }
    }

    pub fn red(self) -> f32 {
        self.r.into_inner()
    }
    pub fn green(self) -> f32 {
        self.g.into_inner()
    }
    pub fn blue(self) -> f32 {
        self.b.into_inner()
    }
}

/// A color with an alpha channel, components in `[0.0, 1.0]`.
///
/// `Eq`/`Hash` are derived via the packed 8-bit-per-channel form, matching
/// how the palette's reverse map keys colors (`spec.md` §4.1: "reverse map
/// key for dedup (hash of packed RGBA → entry)").
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Rgba {
    r: NotNan<f32>,
    g: NotNan<f32>,
    b: NotNan<f32>,
    a: NotNan<f32>,
}

impl fmt::Debug for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl PartialEq for Rgba {
    fn eq(&self, other: &Self) -> bool {
        self.packed() == other.packed()
    }
}
impl Eq for Rgba {}
impl std::hash::Hash for Rgba {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.packed().hash(state);
    }
}

impl Rgba {
    /// Fully transparent black, the sentinel returned for air / unset
    /// palette entries.
    pub fn transparent() -> Rgba {
        Rgba::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: NotNan::new(r).expect("NaN color component"),
            g: NotNan::new(g).expect("NaN color component"),
            b: NotNan::new(b).expect("NaN color component"),
            a: NotNan::new(a).expect("NaN color component"),
        }
    }

    pub fn red(self) -> f32 {
        self.r.into_inner()
    }
    pub fn green(self) -> f32 {
        self.g.into_inner()
    }
    pub fn blue(self) -> f32 {
        self.b.into_inner()
    }
    pub fn alpha(self) -> f32 {
        self.a.into_inner()
    }

    pub fn rgb(self) -> Rgb {
        Rgb::new(self.red(), self.green(), self.blue())
    }

    /// `true` if alpha is exactly `1.0`.
    pub fn is_opaque(self) -> bool {
        self.alpha() >= 1.0
    }

    /// `true` if alpha is exactly `0.0`.
    pub fn is_invisible(self) -> bool {
        self.alpha() <= 0.0
    }

    /// Packs into 4 bytes of sRGB-ish `[0, 255]` integer components, the
    /// form the `.vox` `RGBA` chunk and the color atlas store.
    pub fn to_srgb8(self) -> [u8; 4] {
        let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            to_u8(self.red()),
            to_u8(self.green()),
            to_u8(self.blue()),
            to_u8(self.alpha()),
        ]
    }

    pub fn from_srgb8(bytes: [u8; 4]) -> Self {
        let to_f32 = |c: u8| f32::from(c) / 255.0;
        Self::new(
            to_f32(bytes[0]),
            to_f32(bytes[1]),
            to_f32(bytes[2]),
            to_f32(bytes[3]),
        )
    }

    /// Packed `u32` form (`0xRRGGBBAA`) used as the palette's reverse-map
    /// hash key.
    pub fn packed(self) -> u32 {
        let [r, g, b, a] = self.to_srgb8();
        u32::from_be_bytes([r, g, b, a])
    }

    /// Perceptual luminance, used by the mesher's triangle-shift fallback
    /// (`spec.md` §4.4).
    pub fn luminance(self) -> f32 {
        0.2126 * self.red() + 0.7152 * self.green() + 0.0722 * self.blue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb8_round_trip() {
        let bytes = [12, 200, 77, 255];
        let c = Rgba::from_srgb8(bytes);
        assert_eq!(c.to_srgb8(), bytes);
    }

    #[test]
    fn packed_equality_matches_eq() {
        let a = Rgba::new(1.0, 0.0, 0.0, 1.0);
        let b = Rgba::from_srgb8(a.to_srgb8());
        assert_eq!(a, b);
        assert_eq!(a.packed(), b.packed());
    }
}
