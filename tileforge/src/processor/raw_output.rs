use super::Processor;
use crate::{config::ProcessMode, error::ProcessError, traits::Output};
use anyhow::Result;
use tileforge_derive::context;
use tileforge_core::Tile;

impl<O: Output> Processor<O> {
	/// Returns the payload of `tile`, which may belong to the output, the process or the
	/// baselevel pyramid.
	///
	/// All process or output tiles overlapping the buffered bounds of `tile` are combined
	/// through [`Output::extract_subset`]:
	/// - memory mode computes process tiles on demand through the cache,
	/// - readonly mode reads existing output and returns an empty payload if there is none,
	/// - continue mode reads existing output, or computes and writes it if any is missing,
	/// - overwrite mode always computes and writes.
	///
	/// Zoom levels outside of the configured ones yield an empty payload. A tile in another
	/// CRS fails with [`ProcessError::ReprojectionUnsupported`].
	#[context("Failed to get raw output for tile {tile}")]
	pub fn get_raw_output(&self, tile: &Tile) -> Result<O::Data> {
		let output = self.config.output();
		if !self.config.zoom_levels().contains(tile.zoom()) {
			return Ok(output.empty(tile));
		}
		if tile.crs() != self.config.crs() {
			return Err(ProcessError::ReprojectionUnsupported {
				from: self.config.crs(),
				to: tile.crs(),
			}
			.into());
		}

		match self.mode() {
			ProcessMode::Memory => self.compute_and_extract(tile, false),
			ProcessMode::Readonly => self.read_existing(tile),
			ProcessMode::Continue => {
				let tiles = self.overlapping_output_tiles(tile);
				let exists = output.tiles_exist_batch(&tiles)?;
				if !tiles.is_empty() && exists.iter().all(|exists| *exists) {
					self.read_existing(tile)
				} else {
					self.compute_and_extract(tile, true)
				}
			}
			ProcessMode::Overwrite => self.compute_and_extract(tile, true),
		}
	}

	/// Source payload for deriving a zoom level from a neighbouring one.
	///
	/// Only memory mode computes anything; other modes read what the batch run already wrote.
	pub(super) fn baselevel_source(&self, tile: &Tile) -> Result<O::Data> {
		if self.mode() == ProcessMode::Memory {
			self.get_raw_output(tile)
		} else {
			self.read_existing(tile)
		}
	}

	fn overlapping_output_tiles(&self, tile: &Tile) -> Vec<Tile> {
		self
			.config
			.output_pyramid()
			.tiles_from_bounds(&tile.bounds(), tile.zoom())
			.collect()
	}

	/// Assembles `tile` from existing output, or returns an empty payload if none exists.
	fn read_existing(&self, tile: &Tile) -> Result<O::Data> {
		let output = self.config.output();
		let tiles = self.overlapping_output_tiles(tile);
		let exists = output.tiles_exist_batch(&tiles)?;
		let existing: Vec<Tile> = tiles
			.into_iter()
			.zip(exists)
			.filter_map(|(tile, exists)| exists.then_some(tile))
			.collect();

		match existing.as_slice() {
			[] => {
				log::trace!("no output overlaps {tile}");
				Ok(output.empty(tile))
			}
			[single] if single == tile => output.read(tile),
			_ => {
				let sources = existing
					.into_iter()
					.map(|source| -> Result<(Tile, O::Data)> { Ok((source, output.read(&source)?)) })
					.collect::<Result<Vec<_>>>()?;
				output.extract_subset(&sources, tile)
			}
		}
	}

	/// Computes every process tile overlapping `tile` and extracts `tile` from them.
	///
	/// With `write`, freshly computed process tiles are written by whichever caller computed
	/// them.
	fn compute_and_extract(&self, tile: &Tile, write: bool) -> Result<O::Data> {
		let process_tiles: Vec<Tile> = self
			.config
			.process_pyramid()
			.tiles_from_bounds(&tile.bounds(), tile.zoom())
			.collect();

		let mut sources = Vec::with_capacity(process_tiles.len());
		for process_tile in process_tiles {
			let data = self.cache.get_or_compute(process_tile, || {
				let data = self.execute_or_empty(&process_tile)?;
				if write {
					self.write(&process_tile, &data)?;
				}
				Ok(data)
			})?;
			sources.push((process_tile, data));
		}

		match sources.as_slice() {
			[] => Ok(self.config.output().empty(tile)),
			[(source, data)] if source == tile => Ok(data.clone()),
			_ => self.config.output().extract_subset(&sources, tile),
		}
	}
}
