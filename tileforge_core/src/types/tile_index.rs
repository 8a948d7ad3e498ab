//! Pyramid-independent tile identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a tile by `(zoom, row, col)`.
///
/// A `TileIndex` alone does not say which pyramid it belongs to; combine it with a
/// [`TilePyramid`](crate::TilePyramid) to get a [`Tile`](crate::Tile).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
	pub zoom: u8,
	pub row: u32,
	pub col: u32,
}

impl TileIndex {
	pub fn new(zoom: u8, row: u32, col: u32) -> TileIndex {
		TileIndex { zoom, row, col }
	}
}

impl From<(u8, u32, u32)> for TileIndex {
	fn from((zoom, row, col): (u8, u32, u32)) -> Self {
		TileIndex { zoom, row, col }
	}
}

impl fmt::Display for TileIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.zoom, self.row, self.col)
	}
}

impl fmt::Debug for TileIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileIndex({}/{}/{})", self.zoom, self.row, self.col)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_as_path() {
		let index = TileIndex::from((4, 3, 9));
		assert_eq!(index.to_string(), "4/3/9");
		assert_eq!(format!("{index:?}"), "TileIndex(4/3/9)");
	}

	#[test]
	fn orders_by_zoom_then_row_then_col() {
		let mut indices = vec![TileIndex::new(2, 0, 1), TileIndex::new(1, 5, 5), TileIndex::new(2, 0, 0)];
		indices.sort();
		assert_eq!(
			indices,
			vec![TileIndex::new(1, 5, 5), TileIndex::new(2, 0, 0), TileIndex::new(2, 0, 1)]
		);
	}
}
