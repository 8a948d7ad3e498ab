//! A tile: a [`TileIndex`] bound to the [`TilePyramid`] it belongs to.

use super::{Bounds, Crs, MAX_ZOOM, TileIndex, TilePyramid};
use geo::Polygon;
use std::fmt;

/// An immutable tile of a specific pyramid.
///
/// Equality and hashing cover both the index and the pyramid, so the same
/// `(zoom, row, col)` in a process pyramid and an output pyramid are different tiles.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
	index: TileIndex,
	pyramid: TilePyramid,
}

impl Tile {
	/// Creates a tile without checking that `index` lies inside `pyramid`.
	/// Use [`TilePyramid::tile`] for a checked constructor.
	pub(crate) fn new_unchecked(index: TileIndex, pyramid: TilePyramid) -> Tile {
		Tile { index, pyramid }
	}

	pub fn index(&self) -> TileIndex {
		self.index
	}

	/// Stable identifier of the tile within its pyramid.
	pub fn id(&self) -> TileIndex {
		self.index
	}

	pub fn zoom(&self) -> u8 {
		self.index.zoom
	}

	pub fn row(&self) -> u32 {
		self.index.row
	}

	pub fn col(&self) -> u32 {
		self.index.col
	}

	pub fn pyramid(&self) -> &TilePyramid {
		&self.pyramid
	}

	pub fn pixelbuffer(&self) -> u16 {
		self.pyramid.pixelbuffer
	}

	pub fn crs(&self) -> Crs {
		self.pyramid.grid.crs()
	}

	/// Bounds including the pixelbuffer.
	pub fn bounds(&self) -> Bounds {
		self.pyramid.tile_bounds_buffered(&self.index)
	}

	pub fn bounds_unbuffered(&self) -> Bounds {
		self.pyramid.tile_bounds(&self.index)
	}

	/// Footprint of the tile without pixelbuffer.
	pub fn polygon(&self) -> Polygon<f64> {
		self.bounds_unbuffered().to_polygon()
	}

	/// Width and height in pixels, including the pixelbuffer on both sides.
	pub fn shape(&self) -> (u32, u32) {
		let bounds = self.bounds();
		let pixel = self.pyramid.pixel_size(self.index.zoom);
		(
			(bounds.width() / pixel).round() as u32,
			(bounds.height() / pixel).round() as u32,
		)
	}

	/// The tile one zoom level up covering this tile, or `None` at zoom 0.
	pub fn parent(&self) -> Option<Tile> {
		let zoom = self.index.zoom.checked_sub(1)?;
		Some(Tile::new_unchecked(
			TileIndex::new(zoom, self.index.row / 2, self.index.col / 2),
			self.pyramid,
		))
	}

	/// Tiles one zoom level down covered by this tile.
	///
	/// Fewer than four children exist where the grid edge cuts a metatile.
	pub fn children(&self) -> Vec<Tile> {
		if self.index.zoom >= MAX_ZOOM {
			return Vec::new();
		}
		let zoom = self.index.zoom + 1;
		let height = self.pyramid.matrix_height(zoom);
		let width = self.pyramid.matrix_width(zoom);
		let (row, col) = (self.index.row * 2, self.index.col * 2);
		[(row, col), (row, col + 1), (row + 1, col), (row + 1, col + 1)]
			.into_iter()
			.filter(|(r, c)| *r < height && *c < width)
			.map(|(r, c)| Tile::new_unchecked(TileIndex::new(zoom, r, c), self.pyramid))
			.collect()
	}
}

impl fmt::Display for Tile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.index)
	}
}

impl fmt::Debug for Tile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Tile({}, {:?})", self.index, self.pyramid)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Grid;
	use std::collections::HashSet;

	fn pyramid(metatiling: u8, pixelbuffer: u16) -> TilePyramid {
		TilePyramid::new(Grid::Geodetic, metatiling, pixelbuffer).unwrap()
	}

	#[test]
	fn equality_includes_pyramid() {
		let a = pyramid(1, 0).tile(3, 1, 2).unwrap();
		let b = pyramid(2, 0).tile(3, 1, 2).unwrap();
		assert_ne!(a, b);
		assert_eq!(a.id(), b.id());
		let set: HashSet<Tile> = [a, a, b].into_iter().collect();
		assert_eq!(set.len(), 2);
	}

	#[test]
	fn parent_and_children_roundtrip() {
		let tile = pyramid(1, 0).tile(4, 5, 9).unwrap();
		let parent = tile.parent().unwrap();
		assert_eq!(parent.index(), TileIndex::new(3, 2, 4));
		assert!(parent.children().contains(&tile));
		assert_eq!(parent.children().len(), 4);
		assert!(pyramid(1, 0).tile(0, 0, 0).unwrap().parent().is_none());
	}

	#[test]
	fn children_are_cut_at_grid_edge() {
		// a metatiling of 2 at zoom 0 covers the whole geodetic grid with a single tile
		let root = pyramid(2, 0).tile(0, 0, 0).unwrap();
		let children: Vec<TileIndex> = root.children().iter().map(Tile::index).collect();
		assert_eq!(children, vec![TileIndex::new(1, 0, 0), TileIndex::new(1, 0, 1)]);
	}

	#[test]
	fn shape_includes_pixelbuffer() {
		assert_eq!(pyramid(1, 0).tile(5, 10, 10).unwrap().shape(), (256, 256));
		assert_eq!(pyramid(2, 16).tile(5, 5, 5).unwrap().shape(), (544, 544));
	}
}
