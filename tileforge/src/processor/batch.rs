use super::{ProcessInfo, Processor};
use crate::{
	error::ProcessError,
	executor::{BatchEvent, Executor, submit_batches},
	task::{BatchKind, TaskBatcher, TaskOutput, TaskResult},
	traits::Output,
};
use anyhow::Result;
use futures::{
	StreamExt, future,
	stream::{self, BoxStream},
};
use std::{fmt, sync::Arc};
use tileforge_core::{TileIndex, ZoomLevels};

/// Selects what a batch run processes and how.
#[derive(Clone, Default)]
pub struct BatchOptions {
	/// Limits the run to these zoom levels.
	pub zoom: Option<ZoomLevels>,
	/// Processes only this process tile, synchronously.
	pub tile: Option<TileIndex>,
	/// Overrides the configured number of local workers.
	pub workers: Option<usize>,
	/// Ends the run after the first failed task and cancels the executor.
	pub fail_fast: bool,
	/// Runs tasks on this executor instead of the configured one.
	pub executor: Option<Arc<dyn Executor>>,
}

impl fmt::Debug for BatchOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BatchOptions")
			.field("zoom", &self.zoom)
			.field("tile", &self.tile)
			.field("workers", &self.workers)
			.field("fail_fast", &self.fail_fast)
			.field("executor", &self.executor.is_some())
			.finish()
	}
}

impl<O: Output> Processor<O> {
	/// Processes and writes tiles, yielding one [`ProcessInfo`] per process tile.
	///
	/// With `options.tile` the tile is processed right away. Otherwise all process tiles
	/// of the selected zoom levels are run on an executor, one zoom level after another,
	/// and reported in completion order; skipped tiles are reported too. A failed task
	/// yields an error for that task only, unless `options.fail_fast` is set.
	///
	/// Preprocessing tasks of the inputs run before any tile. Dropping the stream stops
	/// submitting further tasks.
	pub fn batch_processor(self: &Arc<Self>, options: BatchOptions) -> Result<BoxStream<'static, Result<ProcessInfo>>> {
		if options.zoom.is_some() && options.tile.is_some() {
			return Err(ProcessError::ConflictingSelection.into());
		}
		let mode = self.mode();
		if !mode.can_execute() {
			return Err(ProcessError::InvalidModeOperation {
				operation: "batch processing",
				mode,
			}
			.into());
		}

		if let Some(index) = options.tile {
			self.run_preprocessing()?;
			let tile = self.config.process_pyramid().tile_at(index)?;
			let info = self.execute_and_write(&tile);
			return Ok(stream::once(future::ready(info)).boxed());
		}

		let executor = match options.executor {
			Some(executor) => executor,
			None => self.config.params().executor.kind(options.workers).build(),
		};
		let batches = TaskBatcher::new(Arc::clone(self)).task_batches(options.zoom, None)?;
		log::info!(
			"processing {} tiles in {} mode",
			self.count_tiles(options.zoom.map(|z| z.min), options.zoom.map(|z| z.max)),
			mode
		);

		let processor = Arc::clone(self);
		let results = submit_batches(Arc::clone(&executor), batches)
			.filter_map(move |event| future::ready(processor.handle_event(event)))
			.boxed();

		if !options.fail_fast {
			return Ok(results);
		}
		Ok(stream::unfold(Some((results, executor)), |state| async move {
			let (mut results, executor) = state?;
			let item = results.next().await?;
			if let Err(err) = &item {
				log::warn!("stopping after failed task: {err:#}");
				executor.cancel();
				return Some((item, None));
			}
			Some((item, Some((results, executor))))
		})
		.boxed())
	}

	/// Collects all results of a batch run, failing on the first error.
	pub async fn process_all(self: &Arc<Self>, options: BatchOptions) -> Result<Vec<ProcessInfo>> {
		let mut results = self.batch_processor(options)?;
		let mut infos = Vec::new();
		while let Some(info) = results.next().await {
			infos.push(info?);
		}
		Ok(infos)
	}

	fn handle_event(&self, event: BatchEvent) -> Option<Result<ProcessInfo>> {
		match event {
			BatchEvent::Skipped(info) => Some(Ok(info)),
			BatchEvent::Failed(err) => Some(Err(err)),
			BatchEvent::Completed(kind, TaskResult { id, result }) => match result {
				Ok(TaskOutput::Tile(info)) => Some(Ok(info)),
				Ok(TaskOutput::Preprocessing {
					input_index,
					key,
					value,
				}) => self.set_preprocessing_result(input_index, &key, value).err().map(Err),
				Err(err) if kind == BatchKind::Preprocessing => {
					Some(Err(err.context(format!("{id} failed, inputs may be incomplete"))))
				}
				Err(err) => Some(Err(err.context(format!("{id} failed")))),
			},
		}
	}
}
