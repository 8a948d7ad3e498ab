use crate::{config::Resampling, processor::CatalogSummary};
use anyhow::{Result, bail};
use tileforge_core::{Tile, TilePyramid};

/// Storage backend for process results.
///
/// Tiles passed to `tiles_exist` and `write` are usually process tiles, which may cover
/// several tiles of the output pyramid. `read` is called with output tiles. Implementations
/// must tolerate concurrent calls for different tiles; calls for the same tile are never
/// issued concurrently by the orchestrator.
pub trait Output: Send + Sync + 'static {
	/// Payload produced by the user process and stored by this output.
	type Data: Clone + Send + Sync + 'static;

	/// The output pyramid.
	fn pyramid(&self) -> TilePyramid;

	/// Returns `true` if output for `tile` exists.
	fn tiles_exist(&self, tile: &Tile) -> Result<bool>;

	/// Existence check for many tiles in one call. The result has one entry per tile.
	fn tiles_exist_batch(&self, tiles: &[Tile]) -> Result<Vec<bool>> {
		tiles.iter().map(|tile| self.tiles_exist(tile)).collect()
	}

	fn read(&self, tile: &Tile) -> Result<Self::Data>;

	fn write(&self, tile: &Tile, data: &Self::Data) -> Result<()>;

	/// An empty payload covering `tile`.
	fn empty(&self, tile: &Tile) -> Self::Data;

	fn is_empty(&self, data: &Self::Data) -> bool;

	/// Assembles the payload of `tile` from the payloads of all tiles overlapping it.
	fn extract_subset(&self, sources: &[(Tile, Self::Data)], tile: &Tile) -> Result<Self::Data>;

	/// Derives the payload of `tile` from tiles of a neighbouring zoom level.
	fn interpolate(&self, _sources: &[(Tile, Self::Data)], tile: &Tile, _resampling: Resampling) -> Result<Self::Data> {
		bail!("output does not support deriving tile {tile} from other zoom levels")
	}

	/// Stores end-of-run metadata after a successful run.
	fn write_catalog(&self, _summary: &CatalogSummary) -> Result<()> {
		Ok(())
	}

	/// Releases the output. `error` is set if the run ended with an error.
	fn close(&self, _error: Option<&anyhow::Error>) -> Result<()> {
		Ok(())
	}
}
