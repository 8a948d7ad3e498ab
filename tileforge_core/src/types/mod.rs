//! Contains tile pyramid types: grids, bounds, zoom level ranges, tile indices and tiles.

mod bounds;
pub use bounds::*;

mod grid;
pub use grid::*;

mod tile;
pub use tile::*;

mod tile_index;
pub use tile_index::*;

mod tile_pyramid;
pub use tile_pyramid::*;

mod zoom_levels;
pub use zoom_levels::*;
