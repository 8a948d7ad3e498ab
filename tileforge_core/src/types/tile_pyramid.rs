//! Tile pyramids: a grid, split into metatiles at every zoom level.
//!
//! A [`TilePyramid`] turns a [`Grid`] into concrete tile matrices. Two pyramids on the
//! same grid may use different metatiling factors, so one tile of the first pyramid can
//! cover several tiles of the second. [`TilePyramid::intersecting`] bridges between them.

use super::{Bounds, Grid, MAX_ZOOM, Tile, TileIndex};
use anyhow::{Result, ensure};
use geo::{BoundingRect, MultiPolygon, Relate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tileforge_derive::context;

/// Largest supported metatiling factor.
pub const MAX_METATILING: u8 = 16;

/// Default edge length of a base tile in pixels.
pub const DEFAULT_TILE_SIZE: u16 = 256;

/// A tile pyramid definition.
///
/// - `metatiling`: how many base tiles form one tile along each axis (power of two, ≤ 16).
/// - `pixelbuffer`: extra pixels around each tile when computing buffered bounds.
/// - `tile_size`: edge length of a base tile in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTilePyramid")]
pub struct TilePyramid {
	pub grid: Grid,
	pub metatiling: u8,
	pub pixelbuffer: u16,
	pub tile_size: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTilePyramid {
	grid: Grid,
	#[serde(default = "default_metatiling")]
	metatiling: u8,
	#[serde(default)]
	pixelbuffer: u16,
	#[serde(default = "default_tile_size")]
	tile_size: u16,
}

fn default_metatiling() -> u8 {
	1
}

fn default_tile_size() -> u16 {
	DEFAULT_TILE_SIZE
}

impl TryFrom<RawTilePyramid> for TilePyramid {
	type Error = anyhow::Error;

	fn try_from(raw: RawTilePyramid) -> Result<Self> {
		TilePyramid::new(raw.grid, raw.metatiling, raw.pixelbuffer)?.with_tile_size(raw.tile_size)
	}
}

impl TilePyramid {
	/// Creates a pyramid with the default tile size of 256 pixels.
	pub fn new(grid: Grid, metatiling: u8, pixelbuffer: u16) -> Result<TilePyramid> {
		ensure!(
			metatiling.is_power_of_two() && metatiling <= MAX_METATILING,
			"metatiling ({metatiling}) must be a power of two <= {MAX_METATILING}"
		);
		Ok(TilePyramid {
			grid,
			metatiling,
			pixelbuffer,
			tile_size: DEFAULT_TILE_SIZE,
		})
	}

	pub fn with_tile_size(mut self, tile_size: u16) -> Result<TilePyramid> {
		ensure!(tile_size > 0, "tile_size must be greater than zero");
		self.tile_size = tile_size;
		Ok(self)
	}

	/// Number of tile columns at `zoom`.
	pub fn matrix_width(&self, zoom: u8) -> u32 {
		let base = u64::from(self.grid.shape().0) << zoom;
		base.div_ceil(u64::from(self.metatiling)) as u32
	}

	/// Number of tile rows at `zoom`.
	pub fn matrix_height(&self, zoom: u8) -> u32 {
		let base = u64::from(self.grid.shape().1) << zoom;
		base.div_ceil(u64::from(self.metatiling)) as u32
	}

	/// Edge length of one (metatiled) tile at `zoom` in CRS units.
	pub fn tile_size_units(&self, zoom: u8) -> f64 {
		self.grid.base_tile_size(zoom) * f64::from(self.metatiling)
	}

	/// Size of one pixel at `zoom` in CRS units.
	pub fn pixel_size(&self, zoom: u8) -> f64 {
		self.grid.base_tile_size(zoom) / f64::from(self.tile_size)
	}

	/// Returns the tile at `(zoom, row, col)`, checking that it exists in this pyramid.
	#[context("Failed to get tile {zoom}/{row}/{col} of the {} pyramid (metatiling {})", self.grid, self.metatiling)]
	pub fn tile(&self, zoom: u8, row: u32, col: u32) -> Result<Tile> {
		ensure!(zoom <= MAX_ZOOM, "zoom ({zoom}) must be <= {MAX_ZOOM}");
		let height = self.matrix_height(zoom);
		let width = self.matrix_width(zoom);
		ensure!(row < height, "row ({row}) must be < {height}");
		ensure!(col < width, "col ({col}) must be < {width}");
		Ok(Tile::new_unchecked(TileIndex::new(zoom, row, col), *self))
	}

	/// Returns the tile identified by `index`, checking that it exists in this pyramid.
	pub fn tile_at(&self, index: TileIndex) -> Result<Tile> {
		self.tile(index.zoom, index.row, index.col)
	}

	/// Bounds of a tile without pixelbuffer, clipped to the grid.
	pub fn tile_bounds(&self, index: &TileIndex) -> Bounds {
		self.raw_bounds(index).clipped(&self.grid.bounds())
	}

	/// Bounds of a tile grown by the pixelbuffer, clipped to the grid.
	pub fn tile_bounds_buffered(&self, index: &TileIndex) -> Bounds {
		let buffer = f64::from(self.pixelbuffer) * self.pixel_size(index.zoom);
		self.raw_bounds(index).buffered(buffer).clipped(&self.grid.bounds())
	}

	fn raw_bounds(&self, index: &TileIndex) -> Bounds {
		let grid = self.grid.bounds();
		let size = self.tile_size_units(index.zoom);
		let left = grid.left + f64::from(index.col) * size;
		let top = grid.top - f64::from(index.row) * size;
		Bounds {
			left,
			bottom: top - size,
			right: left + size,
			top,
		}
	}

	/// All tiles at `zoom` sharing a non-zero area with `bounds`.
	///
	/// Tiles that only touch `bounds` along an edge are not returned. The sequence is
	/// lazy and ordered by row, then column.
	pub fn tiles_from_bounds(&self, bounds: &Bounds, zoom: u8) -> impl Iterator<Item = Tile> + use<> {
		let pyramid = *self;
		let bounds = *bounds;
		self
			.matrix_window(&bounds, zoom)
			.into_iter()
			.flat_map(move |(row_min, row_max, col_min, col_max)| {
				(row_min..=row_max).flat_map(move |row| {
					(col_min..=col_max).map(move |col| Tile::new_unchecked(TileIndex::new(zoom, row, col), pyramid))
				})
			})
			.filter(move |tile| tile.bounds_unbuffered().overlaps(&bounds))
	}

	/// Row and column ranges covering `bounds` at `zoom`, or `None` if `bounds` lies outside the grid.
	fn matrix_window(&self, bounds: &Bounds, zoom: u8) -> Option<(u32, u32, u32, u32)> {
		let grid = self.grid.bounds();
		let bounds = bounds.intersection(&grid)?;
		let size = self.tile_size_units(zoom);
		let max_row = f64::from(self.matrix_height(zoom) - 1);
		let max_col = f64::from(self.matrix_width(zoom) - 1);

		let col_min = ((bounds.left - grid.left) / size).floor().clamp(0.0, max_col);
		let col_max = (((bounds.right - grid.left) / size).ceil() - 1.0).clamp(0.0, max_col);
		let row_min = ((grid.top - bounds.top) / size).floor().clamp(0.0, max_row);
		let row_max = (((grid.top - bounds.bottom) / size).ceil() - 1.0).clamp(0.0, max_row);

		Some((row_min as u32, row_max as u32, col_min as u32, col_max as u32))
	}

	/// Tiles of this pyramid at the zoom of `tile` that overlap `tile`.
	///
	/// `tile` may belong to another pyramid, as long as both share the same grid.
	pub fn intersecting(&self, tile: &Tile) -> Result<Vec<Tile>> {
		ensure!(
			tile.pyramid().grid == self.grid,
			"tile {} is on grid {} but pyramid uses grid {}",
			tile.index(),
			tile.pyramid().grid,
			self.grid
		);
		Ok(self.tiles_from_bounds(&tile.bounds_unbuffered(), tile.zoom()).collect())
	}

	/// Tiles at `zoom` whose area intersects `geometry`.
	///
	/// Tiles that merely touch the geometry's boundary are excluded.
	pub fn tiles_from_geom(&self, geometry: &MultiPolygon<f64>, zoom: u8) -> Vec<Tile> {
		let Some(rect) = geometry.bounding_rect() else {
			return Vec::new();
		};
		self
			.tiles_from_bounds(&Bounds::from(rect), zoom)
			.filter(|tile| {
				let matrix = tile.polygon().relate(geometry);
				matrix.is_intersects() && !matrix.is_touches()
			})
			.collect()
	}
}

impl fmt::Debug for TilePyramid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"TilePyramid({}, metatiling={}, pixelbuffer={}, tile_size={})",
			self.grid, self.metatiling, self.pixelbuffer, self.tile_size
		)
	}
}
