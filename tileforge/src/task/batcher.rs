//! Splits a processing run into ordered batches of tasks.
//!
//! A run consists of at most one preprocessing batch, followed by one batch per zoom
//! level. Batches are handed out lazily, so process tiles of a zoom level are only
//! enumerated (and checked for existing output) once the previous batch is done.

use super::{Task, TaskId, TaskOutput};
use crate::{
	config::{ProcessConfig, ProcessMode, ZoomOrder},
	error::ProcessError,
	processor::{ProcessInfo, Processor},
	traits::Output,
};
use anyhow::{Result, ensure};
use itertools::{Either, Itertools};
use std::{fmt, iter, sync::Arc};
use tileforge_core::{Tile, TileIndex, ZoomLevels};

/// Maximum number of tiles per existence query sent to the output.
pub const TILES_EXIST_CHUNK: usize = 256;

/// Checks which tiles can be skipped because their output exists.
///
/// Only `continue` mode skips anything. Existence is queried in chunks of
/// [`TILES_EXIST_CHUNK`] tiles through [`Output::tiles_exist_batch`].
pub fn skip_tiles<'a, O, I>(config: &'a ProcessConfig<O>, tiles: I) -> impl Iterator<Item = Result<(Tile, bool)>> + 'a
where
	O: Output,
	I: IntoIterator<Item = Tile>,
	I::IntoIter: 'a,
{
	let mut tiles = tiles.into_iter();
	let mode = config.mode();
	let chunks = iter::from_fn(move || {
		let chunk: Vec<Tile> = tiles.by_ref().take(TILES_EXIST_CHUNK).collect();
		(!chunk.is_empty()).then_some(chunk)
	});
	chunks.flat_map(move |chunk| -> Vec<Result<(Tile, bool)>> {
		if mode != ProcessMode::Continue {
			return chunk.into_iter().map(|tile| Ok((tile, false))).collect();
		}
		match check_chunk(config, &chunk) {
			Ok(exists) => chunk.into_iter().zip(exists).map(Ok).collect(),
			Err(err) => vec![Err(err)],
		}
	})
}

fn check_chunk<O: Output>(config: &ProcessConfig<O>, chunk: &[Tile]) -> Result<Vec<bool>> {
	let exists = config.output().tiles_exist_batch(chunk)?;
	ensure!(
		exists.len() == chunk.len(),
		"output answered {} existence checks for {} tiles",
		exists.len(),
		chunk.len()
	);
	Ok(exists)
}

/// What a batch contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchKind {
	Preprocessing,
	Zoom(u8),
}

/// Tasks that may be submitted together without breaking the processing order.
pub struct TaskBatch {
	pub kind: BatchKind,
	pub tasks: Vec<Task>,
	/// Tiles that were skipped because their output exists.
	pub skipped: Vec<ProcessInfo>,
}

impl fmt::Debug for TaskBatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskBatch")
			.field("kind", &self.kind)
			.field("tasks", &self.tasks.len())
			.field("skipped", &self.skipped.len())
			.finish()
	}
}

pub type TaskBatches = Box<dyn Iterator<Item = Result<TaskBatch>> + Send>;

/// Builds the task batches of a processor.
pub struct TaskBatcher<O: Output> {
	processor: Arc<Processor<O>>,
}

impl<O: Output> TaskBatcher<O> {
	pub fn new(processor: Arc<Processor<O>>) -> Self {
		TaskBatcher { processor }
	}

	/// Zoom levels of `zooms` in processing order.
	///
	/// With baselevels, the computed zoom levels come first (descending), then the
	/// levels derived from below (descending), then the levels derived from above
	/// (ascending), so every derived level finds its source. Without baselevels the
	/// configured zoom order applies.
	pub fn zoom_order(&self, zooms: ZoomLevels) -> Vec<u8> {
		let config = self.processor.config();
		match config.baselevels() {
			Some(baselevels) => {
				let processed = zooms.descending().filter(|z| baselevels.processed().contains(*z));
				let lower = zooms.descending().filter(|z| *z < baselevels.min);
				let higher = zooms.ascending().filter(|z| *z > baselevels.max);
				processed.chain(lower).chain(higher).collect()
			}
			None => match config.zoom_order() {
				ZoomOrder::Descending => zooms.descending().collect(),
				ZoomOrder::Ascending => zooms.ascending().collect(),
			},
		}
	}

	/// Lazily yields the batches of a run.
	///
	/// `zoom` limits the run to a range of zoom levels (default: all configured levels),
	/// `tile` to a single process tile. Both at once is an error. Preprocessing tasks
	/// that have not run yet form the leading batch.
	pub fn task_batches(&self, zoom: Option<ZoomLevels>, tile: Option<TileIndex>) -> Result<TaskBatches> {
		if zoom.is_some() && tile.is_some() {
			return Err(ProcessError::ConflictingSelection.into());
		}
		let config = self.processor.config();

		let preprocessing = self.processor.take_preprocessing_tasks();
		let leading = (!preprocessing.is_empty()).then(|| {
			log::debug!("submitting {} preprocessing tasks", preprocessing.len());
			Ok(TaskBatch {
				kind: BatchKind::Preprocessing,
				tasks: preprocessing,
				skipped: Vec::new(),
			})
		});

		if let Some(index) = tile {
			let tile = config.process_pyramid().tile_at(index)?;
			let batch = build_batch(&self.processor, index.zoom, vec![tile]);
			return Ok(Box::new(leading.into_iter().chain(iter::once(batch))));
		}

		let configured = config.zoom_levels();
		let zooms = match zoom {
			Some(zoom) => ZoomLevels::new(zoom.min.max(configured.min), zoom.max.min(configured.max)).ok(),
			None => Some(configured),
		};
		let order = zooms.map(|zooms| self.zoom_order(zooms)).unwrap_or_default();

		let processor = Arc::clone(&self.processor);
		let batches = order.into_iter().map(move |zoom| {
			let tiles = processor.config().process_tiles_at(zoom);
			build_batch(&processor, zoom, tiles)
		});
		Ok(Box::new(leading.into_iter().chain(batches)))
	}
}

fn build_batch<O: Output>(processor: &Arc<Processor<O>>, zoom: u8, tiles: Vec<Tile>) -> Result<TaskBatch> {
	let checked = skip_tiles(processor.config(), tiles).collect::<Result<Vec<_>>>()?;
	let (skipped, todo): (Vec<ProcessInfo>, Vec<Tile>) = checked.into_iter().partition_map(|(tile, skip)| {
		if skip {
			Either::Left(ProcessInfo::skipped(tile))
		} else {
			Either::Right(tile)
		}
	});
	log::debug!("zoom {zoom}: submitting {} tiles, skipping {}", todo.len(), skipped.len());

	let tasks = todo
		.into_iter()
		.map(|tile| {
			let processor = Arc::clone(processor);
			Task::new(TaskId::Tile(tile.index()), move || {
				processor.process_and_write(&tile).map(TaskOutput::Tile)
			})
		})
		.collect();

	Ok(TaskBatch {
		kind: BatchKind::Zoom(zoom),
		tasks,
		skipped,
	})
}
