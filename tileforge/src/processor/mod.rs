//! The processor: the entry point combining configuration, cache, batching and executors.
//!
//! A [`Processor`] owns a [`ProcessConfig`], the user's [`TileProcess`] and a
//! [`TileCache`] of process tiles. It offers
//! - tile enumeration ([`Processor::get_process_tiles`], [`Processor::count_tiles`]),
//! - single tile operations ([`Processor::execute`], [`Processor::read`], [`Processor::write`]),
//! - pyramid reconciliation ([`Processor::get_raw_output`]),
//! - batch runs ([`Processor::batch_processor`]),
//! - and the output lifecycle ([`Processor::close`], [`Processor::scoped`]).
//!
//! Every computation of a process tile goes through the cache, so a tile is computed at
//! most once at a time. Only memory mode retains the results.

mod batch;
mod info;
mod lifecycle;
mod raw_output;

pub use batch::BatchOptions;
pub use info::{CatalogSummary, ProcessInfo, WriteInfo};

use crate::{
	config::{BaselevelRole, ProcessConfig, ProcessMode},
	error::ProcessError,
	task::{self, Task, TaskId, TaskOutput},
	traits::{Output, PreprocessingValue, ProcessContext, TileProcess},
};
use anyhow::{Context, Result};
use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Instant,
};
use tileforge_core::{Tile, TileCache};

pub struct Processor<O: Output> {
	config: ProcessConfig<O>,
	process: Box<dyn TileProcess<O::Data>>,
	cache: TileCache<Tile, O::Data>,
	preprocessing_done: AtomicBool,
	closed: AtomicBool,
}

impl<O: Output> Processor<O> {
	pub fn new<P>(config: ProcessConfig<O>, process: P) -> Self
	where
		P: TileProcess<O::Data> + 'static,
	{
		let cache = if config.mode().retains_results() {
			TileCache::new(config.params().cache_size)
		} else {
			TileCache::single_flight_only()
		};
		log::debug!("processor in {} mode, cache {cache:?}", config.mode());
		Processor {
			config,
			process: Box::new(process),
			cache,
			preprocessing_done: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		}
	}

	pub fn config(&self) -> &ProcessConfig<O> {
		&self.config
	}

	pub fn mode(&self) -> ProcessMode {
		self.config.mode()
	}

	/// The cache of computed process tiles.
	pub fn cache(&self) -> &TileCache<Tile, O::Data> {
		&self.cache
	}

	/// Process tiles covering the area of interest at `zoom`, or at all configured zoom
	/// levels (descending) if `zoom` is `None`.
	///
	/// Tiles are enumerated one zoom level at a time; call again to restart.
	pub fn get_process_tiles(&self, zoom: Option<u8>) -> impl Iterator<Item = Tile> + '_ {
		let zooms: Vec<u8> = match zoom {
			Some(zoom) => vec![zoom],
			None => self.config.zoom_levels().descending().collect(),
		};
		zooms
			.into_iter()
			.flat_map(move |zoom| self.config.process_tiles_at(zoom))
	}

	/// Number of process tiles between `min` and `max` (default: the configured zoom levels).
	///
	/// Counts are memoized for the lifetime of the processor.
	pub fn count_tiles(&self, min: Option<u8>, max: Option<u8>) -> u64 {
		let zoom_levels = self.config.zoom_levels();
		let min = min.unwrap_or(zoom_levels.min);
		let max = max.unwrap_or(zoom_levels.max);
		self.config.tile_count(min, max, || {
			(min..=max)
				.map(|zoom| self.config.process_tiles_at(zoom).len() as u64)
				.sum()
		})
	}

	/// Pairs every tile with `true` if it can be skipped because its output exists.
	pub fn skip_tiles<'a, I>(&'a self, tiles: I) -> impl Iterator<Item = Result<(Tile, bool)>> + 'a
	where
		I: IntoIterator<Item = Tile>,
		I::IntoIter: 'a,
	{
		task::skip_tiles(&self.config, tiles)
	}

	/// Runs the user process for one process tile.
	///
	/// Zoom levels outside of the baselevels are derived from neighbouring zoom levels
	/// instead. An empty result is reported as [`ProcessError::NoData`].
	pub fn execute(&self, tile: &Tile) -> Result<O::Data> {
		let mode = self.mode();
		if !mode.can_execute() {
			return Err(ProcessError::InvalidModeOperation {
				operation: "execute",
				mode,
			}
			.into());
		}
		let expected = self.config.process_pyramid();
		if tile.pyramid() != expected {
			return Err(ProcessError::ForeignPyramid {
				tile: tile.index(),
				expected: *expected,
				found: *tile.pyramid(),
			}
			.into());
		}
		if !self.config.zoom_levels().contains(tile.zoom()) {
			return Ok(self.config.output().empty(tile));
		}

		if let Some(role) = self.config.baselevels().and_then(|baselevels| baselevels.role(tile.zoom())) {
			return self.interpolate(tile, role);
		}

		let start = Instant::now();
		log::trace!("executing {tile}");
		let context = ProcessContext::new(*tile, Arc::clone(self.config.inputs()), *self.config.output_pyramid());
		let data = self.process.process(&context)?;
		log::debug!("executed {tile} in {:?}", start.elapsed());
		match data {
			Some(data) if !self.config.output().is_empty(&data) => Ok(data),
			_ => Err(ProcessError::NoData(tile.index()).into()),
		}
	}

	/// Like [`Processor::execute`], but turns "no data" into an empty payload.
	pub fn execute_or_empty(&self, tile: &Tile) -> Result<O::Data> {
		match self.execute(tile) {
			Err(err) if ProcessError::is_nodata(&err) => Ok(self.config.output().empty(tile)),
			result => result,
		}
	}

	fn interpolate(&self, tile: &Tile, role: BaselevelRole) -> Result<O::Data> {
		let pyramid = self
			.config
			.baselevel_pyramid()
			.context("baselevels are configured, but no baselevel pyramid")?;
		let base = pyramid.tile_at(tile.index())?;
		let (sources, resampling) = match role {
			BaselevelRole::Lower(resampling) => (base.children(), resampling),
			BaselevelRole::Higher(resampling) => (base.parent().into_iter().collect(), resampling),
		};

		let output = self.config.output();
		let mut data = Vec::with_capacity(sources.len());
		for source in sources {
			let payload = self.baselevel_source(&source)?;
			if !output.is_empty(&payload) {
				data.push((source, payload));
			}
		}
		if data.is_empty() {
			return Err(ProcessError::NoData(tile.index()).into());
		}
		log::trace!("deriving {tile} from {} tiles using {resampling:?}", data.len());
		output.interpolate(&data, tile, resampling)
	}

	/// Reads output of an output tile.
	pub fn read(&self, tile: &Tile) -> Result<O::Data> {
		let mode = self.mode();
		if !mode.can_read() {
			return Err(ProcessError::InvalidModeOperation { operation: "read", mode }.into());
		}
		self.config.output().read(tile)
	}

	/// Writes `data` of a process tile.
	///
	/// In continue mode existing output is kept. Empty payloads are never written.
	pub fn write(&self, tile: &Tile, data: &O::Data) -> Result<WriteInfo> {
		let mode = self.mode();
		if !mode.can_write() {
			return Err(ProcessError::InvalidModeOperation { operation: "write", mode }.into());
		}
		let output = self.config.output();
		if mode == ProcessMode::Continue && output.tiles_exist(tile)? {
			log::debug!("{tile} exists, not overwritten");
			return Ok(WriteInfo::skipped("output exists, not overwritten"));
		}
		if output.is_empty(data) {
			return Ok(WriteInfo::skipped("output empty"));
		}
		let start = Instant::now();
		output.write(tile, data)?;
		let elapsed = start.elapsed();
		log::debug!("wrote {tile} in {elapsed:?}");
		Ok(WriteInfo {
			written: true,
			message: format!("output written in {elapsed:?}"),
		})
	}

	/// Processes one process tile unless its output exists (continue mode), and writes it.
	pub fn execute_and_write(&self, tile: &Tile) -> Result<ProcessInfo> {
		if self.mode() == ProcessMode::Continue && self.config.output().tiles_exist(tile)? {
			log::debug!("{tile} exists, skipping");
			return Ok(ProcessInfo::skipped(*tile));
		}
		self.process_and_write(tile)
	}

	/// Processes one process tile and writes the result, or keeps it in memory mode.
	///
	/// The write happens inside the cache's single-flight section, so concurrent callers
	/// for the same tile compute and write it once.
	pub(crate) fn process_and_write(&self, tile: &Tile) -> Result<ProcessInfo> {
		let start = Instant::now();
		let writes = !self.mode().retains_results();
		let mut write_info = None;
		let data = self.cache.get_or_compute(*tile, || {
			let data = self.execute_or_empty(tile)?;
			if writes && !self.config.output().is_empty(&data) {
				write_info = Some(self.write(tile, &data)?);
			}
			Ok(data)
		})?;
		let process_message = format!("processed in {:?}", start.elapsed());

		let (written, write_message) = if !writes {
			(false, "kept in memory".to_string())
		} else if self.config.output().is_empty(&data) {
			(false, "output empty, nothing written".to_string())
		} else if let Some(info) = write_info {
			(info.written, info.message)
		} else {
			(false, "written by a concurrent caller".to_string())
		};
		Ok(ProcessInfo {
			tile: *tile,
			processed: true,
			process_message,
			written,
			write_message,
		})
	}

	/// Hands out the preprocessing tasks of all inputs, at most once per processor.
	pub(crate) fn take_preprocessing_tasks(&self) -> Vec<Task> {
		if self.preprocessing_done.swap(true, Ordering::SeqCst) {
			return Vec::new();
		}
		let inputs = self.config.inputs();
		inputs
			.iter()
			.enumerate()
			.flat_map(|(input_index, input)| {
				let name = input.name().to_string();
				input.preprocessing_tasks().into_iter().map(move |task| {
					let (key, func) = task.into_parts();
					let id = TaskId::Preprocessing {
						input: name.clone(),
						key: key.clone(),
					};
					Task::new(id, move || {
						let value = func()?;
						Ok(TaskOutput::Preprocessing {
							input_index,
							key,
							value,
						})
					})
				})
			})
			.collect()
	}

	/// Runs pending preprocessing tasks on the calling thread.
	pub fn run_preprocessing(&self) -> Result<()> {
		for task in self.take_preprocessing_tasks() {
			let result = task.run();
			let id = result.id;
			match result.result.with_context(|| format!("{id} failed"))? {
				TaskOutput::Preprocessing {
					input_index,
					key,
					value,
				} => self.set_preprocessing_result(input_index, &key, value)?,
				TaskOutput::Tile(info) => log::warn!("unexpected tile result {info:?} from {id}"),
			}
		}
		Ok(())
	}

	fn set_preprocessing_result(&self, input_index: usize, key: &str, value: PreprocessingValue) -> Result<()> {
		let input = self
			.config
			.inputs()
			.get(input_index)
			.with_context(|| format!("no input #{input_index} for preprocessing result {key}"))?;
		log::trace!("preprocessing result {key} for input {}", input.name());
		input
			.set_preprocessing_result(key, value)
			.with_context(|| format!("Failed to hand preprocessing result {key} to input {}", input.name()))
	}
}
