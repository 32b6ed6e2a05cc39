//! Planar coordinates and the rectangular simulation area.
//!
//! The world is a flat rectangle measured in metres, as in classic DTN
//! simulators; `f64` keeps sub-millimetre precision over any realistic area.

/// A point in the simulation plane, metres from the area's origin corner.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in metres.
    #[inline]
    pub fn distance(self, other: Coord) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Squared Euclidean distance; cheaper for range comparisons.
    #[inline]
    pub fn distance_sq(self, other: Coord) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Linear interpolation: `t = 0` gives `self`, `t = 1` gives `other`.
    #[inline]
    pub fn lerp(self, other: Coord, t: f64) -> Coord {
        let t = t.clamp(0.0, 1.0);
        Coord {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// The rectangular world `[0, width] × [0, height]`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Area {
    pub width:  f64,
    pub height: f64,
}

impl Area {
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `true` if `c` lies inside the area (boundary included).
    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        (0.0..=self.width).contains(&c.x) && (0.0..=self.height).contains(&c.y)
    }

    /// Nearest point of the area to `c`.
    #[inline]
    pub fn clamp(&self, c: Coord) -> Coord {
        Coord {
            x: c.x.clamp(0.0, self.width),
            y: c.y.clamp(0.0, self.height),
        }
    }

    /// `true` if both dimensions are finite and positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}
