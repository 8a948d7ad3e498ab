//! Inclusive ranges of zoom levels.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest zoom level any pyramid supports.
pub const MAX_ZOOM: u8 = 30;

/// An inclusive range of zoom levels `min..=max`.
///
/// # Examples
/// ```
/// use tileforge_core::ZoomLevels;
///
/// let zooms = ZoomLevels::new(2, 4).unwrap();
/// assert_eq!(zooms.descending().collect::<Vec<_>>(), vec![4, 3, 2]);
/// assert!(zooms.contains(3));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawZoomLevels")]
pub struct ZoomLevels {
	pub min: u8,
	pub max: u8,
}

#[derive(Deserialize)]
struct RawZoomLevels {
	min: u8,
	max: u8,
}

impl TryFrom<RawZoomLevels> for ZoomLevels {
	type Error = anyhow::Error;

	fn try_from(raw: RawZoomLevels) -> Result<Self> {
		ZoomLevels::new(raw.min, raw.max)
	}
}

impl ZoomLevels {
	pub fn new(min: u8, max: u8) -> Result<ZoomLevels> {
		ensure!(min <= max, "min zoom ({min}) must be <= max zoom ({max})");
		ensure!(max <= MAX_ZOOM, "max zoom ({max}) must be <= {MAX_ZOOM}");
		Ok(ZoomLevels { min, max })
	}

	/// A range covering exactly one zoom level.
	pub fn single(zoom: u8) -> Result<ZoomLevels> {
		ZoomLevels::new(zoom, zoom)
	}

	pub fn contains(&self, zoom: u8) -> bool {
		self.min <= zoom && zoom <= self.max
	}

	/// Returns `true` if `other` lies completely inside this range.
	pub fn includes(&self, other: &ZoomLevels) -> bool {
		self.min <= other.min && other.max <= self.max
	}

	/// Number of zoom levels in the range, never zero.
	#[allow(clippy::len_without_is_empty)]
	pub fn len(&self) -> usize {
		usize::from(self.max - self.min) + 1
	}

	pub fn ascending(&self) -> impl DoubleEndedIterator<Item = u8> + use<> {
		self.min..=self.max
	}

	pub fn descending(&self) -> impl Iterator<Item = u8> + use<> {
		(self.min..=self.max).rev()
	}
}

impl fmt::Debug for ZoomLevels {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}..={}", self.min, self.max)
	}
}
