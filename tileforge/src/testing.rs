//! In-memory test doubles for [`Input`] and [`Output`].
//!
//! [`MemoryOutput`] stores `Vec<String>` payloads per output tile and counts the calls it
//! receives; [`MockInput`] records preprocessing results and cleanups. Both are meant
//! for tests of code built on this crate.

use crate::{
	config::Resampling,
	processor::CatalogSummary,
	traits::{Input, Output, PreprocessingTask, PreprocessingValue},
};
use anyhow::{Result, ensure};
use geo::MultiPolygon;
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
use tileforge_core::{Tile, TileIndex, TilePyramid};

/// An [`Output`] keeping sorted lists of labels per output tile.
///
/// Writing a process tile stores its payload for every output tile it covers. Combining
/// payloads merges their labels.
pub struct MemoryOutput {
	pyramid: TilePyramid,
	tiles: Mutex<HashMap<TileIndex, Vec<String>>>,
	writes: AtomicUsize,
	reads: AtomicUsize,
	exist_batch_calls: AtomicUsize,
	closed: Mutex<Vec<Option<String>>>,
	catalog: Mutex<Option<CatalogSummary>>,
}

impl MemoryOutput {
	pub fn new(pyramid: TilePyramid) -> Self {
		MemoryOutput {
			pyramid,
			tiles: Mutex::new(HashMap::new()),
			writes: AtomicUsize::new(0),
			reads: AtomicUsize::new(0),
			exist_batch_calls: AtomicUsize::new(0),
			closed: Mutex::new(Vec::new()),
			catalog: Mutex::new(None),
		}
	}

	/// Pre-populates output tiles with their own index as label.
	pub fn with_existing(self, tiles: impl IntoIterator<Item = TileIndex>) -> Self {
		{
			let mut stored = self.tiles.lock();
			for index in tiles {
				stored.insert(index, vec![format!("existing {index}")]);
			}
		}
		self
	}

	pub fn stored(&self, index: TileIndex) -> Option<Vec<String>> {
		self.tiles.lock().get(&index).cloned()
	}

	/// Number of calls to `write` that stored something.
	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	pub fn reads(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	pub fn exist_batch_calls(&self) -> usize {
		self.exist_batch_calls.load(Ordering::SeqCst)
	}

	/// One entry per `close` call, holding the error message it was called with.
	pub fn closed(&self) -> Vec<Option<String>> {
		self.closed.lock().clone()
	}

	pub fn catalog(&self) -> Option<CatalogSummary> {
		*self.catalog.lock()
	}

	fn output_tiles(&self, tile: &Tile) -> Result<Vec<TileIndex>> {
		if tile.pyramid() == &self.pyramid {
			return Ok(vec![tile.index()]);
		}
		Ok(self.pyramid.intersecting(tile)?.iter().map(Tile::index).collect())
	}
}

fn merge<'a>(payloads: impl Iterator<Item = &'a Vec<String>>) -> Vec<String> {
	let mut labels: Vec<String> = payloads.flatten().cloned().collect();
	labels.sort();
	labels.dedup();
	labels
}

impl Output for MemoryOutput {
	type Data = Vec<String>;

	fn pyramid(&self) -> TilePyramid {
		self.pyramid
	}

	fn tiles_exist(&self, tile: &Tile) -> Result<bool> {
		let indices = self.output_tiles(tile)?;
		let stored = self.tiles.lock();
		Ok(!indices.is_empty() && indices.iter().all(|index| stored.contains_key(index)))
	}

	fn tiles_exist_batch(&self, tiles: &[Tile]) -> Result<Vec<bool>> {
		self.exist_batch_calls.fetch_add(1, Ordering::SeqCst);
		tiles.iter().map(|tile| self.tiles_exist(tile)).collect()
	}

	fn read(&self, tile: &Tile) -> Result<Vec<String>> {
		ensure!(tile.pyramid() == &self.pyramid, "{tile} is not an output tile");
		self.reads.fetch_add(1, Ordering::SeqCst);
		let stored = self.tiles.lock().get(&tile.index()).cloned();
		stored.ok_or_else(|| anyhow::anyhow!("no output for {tile}"))
	}

	fn write(&self, tile: &Tile, data: &Vec<String>) -> Result<()> {
		let indices = self.output_tiles(tile)?;
		self.writes.fetch_add(1, Ordering::SeqCst);
		let mut stored = self.tiles.lock();
		for index in indices {
			stored.insert(index, data.clone());
		}
		Ok(())
	}

	fn empty(&self, _tile: &Tile) -> Vec<String> {
		Vec::new()
	}

	fn is_empty(&self, data: &Vec<String>) -> bool {
		data.is_empty()
	}

	fn extract_subset(&self, sources: &[(Tile, Vec<String>)], _tile: &Tile) -> Result<Vec<String>> {
		Ok(merge(sources.iter().map(|(_, data)| data)))
	}

	fn interpolate(&self, sources: &[(Tile, Vec<String>)], _tile: &Tile, resampling: Resampling) -> Result<Vec<String>> {
		Ok(merge(sources.iter().map(|(_, data)| data))
			.into_iter()
			.map(|label| format!("{resampling:?}({label})"))
			.collect())
	}

	fn write_catalog(&self, summary: &CatalogSummary) -> Result<()> {
		*self.catalog.lock() = Some(*summary);
		Ok(())
	}

	fn close(&self, error: Option<&anyhow::Error>) -> Result<()> {
		self.closed.lock().push(error.map(|err| format!("{err:#}")));
		Ok(())
	}
}

/// An [`Input`] with an optional area and fixed preprocessing results.
pub struct MockInput {
	name: String,
	area: Option<MultiPolygon<f64>>,
	preprocessing: Vec<(String, u64)>,
	received: Mutex<Vec<(String, u64)>>,
	cleanups: AtomicUsize,
}

impl MockInput {
	pub fn new(name: &str) -> Self {
		MockInput {
			name: name.to_string(),
			area: None,
			preprocessing: Vec::new(),
			received: Mutex::new(Vec::new()),
			cleanups: AtomicUsize::new(0),
		}
	}

	#[must_use]
	pub fn with_area(mut self, area: MultiPolygon<f64>) -> Self {
		self.area = Some(area);
		self
	}

	/// Adds a preprocessing task `key` producing `value`.
	#[must_use]
	pub fn with_preprocessing(mut self, key: &str, value: u64) -> Self {
		self.preprocessing.push((key.to_string(), value));
		self
	}

	/// Preprocessing results handed back so far, in arrival order.
	pub fn received(&self) -> Vec<(String, u64)> {
		self.received.lock().clone()
	}

	pub fn cleanups(&self) -> usize {
		self.cleanups.load(Ordering::SeqCst)
	}
}

impl Input for MockInput {
	fn name(&self) -> &str {
		&self.name
	}

	fn area(&self, _zoom: u8) -> Option<MultiPolygon<f64>> {
		self.area.clone()
	}

	fn preprocessing_tasks(&self) -> Vec<PreprocessingTask> {
		self
			.preprocessing
			.iter()
			.map(|(key, value)| {
				let value = *value;
				PreprocessingTask::new(key.clone(), move || -> Result<PreprocessingValue> { Ok(Arc::new(value)) })
			})
			.collect()
	}

	fn set_preprocessing_result(&self, key: &str, value: PreprocessingValue) -> Result<()> {
		let Some(value) = value.downcast_ref::<u64>() else {
			anyhow::bail!("unexpected preprocessing result for {key}");
		};
		self.received.lock().push((key.to_string(), *value));
		Ok(())
	}

	fn cleanup(&self) -> Result<()> {
		self.cleanups.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
