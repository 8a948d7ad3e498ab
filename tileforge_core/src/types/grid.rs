//! Tiling grids and their coordinate reference systems.

use super::Bounds;
use serde::{Deserialize, Serialize};
use std::fmt;

const MERCATOR_EXTENT: f64 = 20_037_508.342_789_244;

/// Coordinate reference system of a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
	#[serde(rename = "EPSG:4326")]
	Epsg4326,
	#[serde(rename = "EPSG:3857")]
	Epsg3857,
}

impl fmt::Display for Crs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Crs::Epsg4326 => "EPSG:4326",
			Crs::Epsg3857 => "EPSG:3857",
		})
	}
}

/// A tiling grid: the extent covered by zoom level 0 and how it is split into root tiles.
///
/// - `Geodetic`: EPSG:4326, `[-180, -90, 180, 90]`, two root tiles side by side.
/// - `Mercator`: EPSG:3857, the square web mercator extent, one root tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grid {
	Geodetic,
	Mercator,
}

impl Grid {
	pub fn crs(&self) -> Crs {
		match self {
			Grid::Geodetic => Crs::Epsg4326,
			Grid::Mercator => Crs::Epsg3857,
		}
	}

	/// Full extent of the grid.
	pub fn bounds(&self) -> Bounds {
		match self {
			Grid::Geodetic => Bounds {
				left: -180.0,
				bottom: -90.0,
				right: 180.0,
				top: 90.0,
			},
			Grid::Mercator => Bounds {
				left: -MERCATOR_EXTENT,
				bottom: -MERCATOR_EXTENT,
				right: MERCATOR_EXTENT,
				top: MERCATOR_EXTENT,
			},
		}
	}

	/// Number of root tiles at zoom 0 as `(width, height)`.
	pub fn shape(&self) -> (u32, u32) {
		match self {
			Grid::Geodetic => (2, 1),
			Grid::Mercator => (1, 1),
		}
	}

	/// Edge length of a single (not metatiled) tile at `zoom` in CRS units.
	pub fn base_tile_size(&self, zoom: u8) -> f64 {
		self.bounds().height() / f64::from(self.shape().1) / 2f64.powi(i32::from(zoom))
	}
}

impl fmt::Display for Grid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Grid::Geodetic => "geodetic",
			Grid::Mercator => "mercator",
		})
	}
}
