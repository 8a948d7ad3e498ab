//! Axis-aligned bounds in the coordinate units of a grid's CRS.

use anyhow::{Result, ensure};
use geo::{Polygon, Rect, coord};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Rectangular bounds given as `left, bottom, right, top` in CRS units.
///
/// Serialized as a four element array `[left, bottom, right, top]`.
///
/// # Examples
/// ```
/// use tileforge_core::Bounds;
///
/// let a = Bounds::new(-10.0, -5.0, 10.0, 5.0).unwrap();
/// let b = Bounds::new(0.0, 0.0, 20.0, 20.0).unwrap();
/// assert_eq!(a.intersection(&b), Some(Bounds::new(0.0, 0.0, 10.0, 5.0).unwrap()));
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Bounds {
	pub left: f64,
	pub bottom: f64,
	pub right: f64,
	pub top: f64,
}

impl Bounds {
	/// Creates new bounds, checking that they are finite and not inverted.
	pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Result<Bounds> {
		ensure!(
			left.is_finite() && bottom.is_finite() && right.is_finite() && top.is_finite(),
			"bounds must be finite, got [{left}, {bottom}, {right}, {top}]"
		);
		ensure!(left <= right, "left ({left}) must be <= right ({right})");
		ensure!(bottom <= top, "bottom ({bottom}) must be <= top ({top})");
		Ok(Bounds {
			left,
			bottom,
			right,
			top,
		})
	}

	pub fn width(&self) -> f64 {
		self.right - self.left
	}

	pub fn height(&self) -> f64 {
		self.top - self.bottom
	}

	/// Returns `true` if both bounds share an area larger than zero.
	///
	/// Bounds that only touch along an edge or in a corner do not overlap.
	pub fn overlaps(&self, other: &Bounds) -> bool {
		self.left < other.right && other.left < self.right && self.bottom < other.top && other.bottom < self.top
	}

	/// Returns `true` if `other` lies completely inside these bounds.
	pub fn contains(&self, other: &Bounds) -> bool {
		self.left <= other.left && self.bottom <= other.bottom && self.right >= other.right && self.top >= other.top
	}

	/// Returns the overlapping part of both bounds, or `None` if they do not overlap.
	pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
		if !self.overlaps(other) {
			return None;
		}
		Some(Bounds {
			left: self.left.max(other.left),
			bottom: self.bottom.max(other.bottom),
			right: self.right.min(other.right),
			top: self.top.min(other.top),
		})
	}

	/// Grows the bounds by `distance` on every side.
	pub fn buffered(&self, distance: f64) -> Bounds {
		Bounds {
			left: self.left - distance,
			bottom: self.bottom - distance,
			right: self.right + distance,
			top: self.top + distance,
		}
	}

	/// Clips the bounds to `limit`. Parts outside of `limit` are cut off.
	pub fn clipped(&self, limit: &Bounds) -> Bounds {
		Bounds {
			left: self.left.max(limit.left),
			bottom: self.bottom.max(limit.bottom),
			right: self.right.min(limit.right),
			top: self.top.min(limit.top),
		}
	}

	pub fn to_rect(&self) -> Rect<f64> {
		Rect::new(
			coord! { x: self.left, y: self.bottom },
			coord! { x: self.right, y: self.top },
		)
	}

	pub fn to_polygon(&self) -> Polygon<f64> {
		self.to_rect().to_polygon()
	}

	pub fn as_array(&self) -> [f64; 4] {
		[self.left, self.bottom, self.right, self.top]
	}
}

impl From<Rect<f64>> for Bounds {
	fn from(rect: Rect<f64>) -> Self {
		Bounds {
			left: rect.min().x,
			bottom: rect.min().y,
			right: rect.max().x,
			top: rect.max().y,
		}
	}
}

impl TryFrom<[f64; 4]> for Bounds {
	type Error = anyhow::Error;

	fn try_from(value: [f64; 4]) -> Result<Self> {
		Bounds::new(value[0], value[1], value[2], value[3])
	}
}

impl From<Bounds> for [f64; 4] {
	fn from(bounds: Bounds) -> Self {
		bounds.as_array()
	}
}

impl Debug for Bounds {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}, {}, {}, {}]", self.left, self.bottom, self.right, self.top)
	}
}
