//! Integration tests for batch runs on the different executors.

mod common;

use anyhow::{Result, bail};
use common::*;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};
use tileforge::{
	BatchOptions, ExecutorKind, ProcessConfig, ProcessContext, ProcessError, ProcessInfo, ProcessMode, Processor,
	config::Baselevels,
	executor::SequentialExecutor,
	task::TaskBatcher,
	testing::{MemoryOutput, MockInput},
	traits::Input,
};
use tileforge_core::{TileIndex, ZoomLevels};

fn sequential() -> BatchOptions {
	BatchOptions {
		executor: Some(Arc::new(SequentialExecutor::new())),
		..BatchOptions::default()
	}
}

#[tokio::test(flavor = "multi_thread")]
async fn processes_zoom_levels_one_after_another() -> Result<()> {
	let calls = Calls::default();
	let processor = labelling(
		params(ProcessMode::Continue, 0, 2),
		MemoryOutput::new(pyramid(1)),
		&calls,
	)?;

	let infos = processor.process_all(sequential()).await?;
	let zooms: Vec<u8> = infos.iter().map(|info| info.tile.zoom()).collect();
	assert_eq!(zooms, [vec![2; 32], vec![1; 8], vec![0; 2]].concat());
	assert!(infos.iter().all(|info| info.processed && info.written));
	assert_eq!(calls.get(), 42);
	assert_eq!(processor.config().output().writes(), 42);
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ascending_zoom_order() -> Result<()> {
	let mut params = params(ProcessMode::Overwrite, 0, 2);
	params.zoom_order = tileforge::config::ZoomOrder::Ascending;
	let processor = labelling(params, MemoryOutput::new(pyramid(1)), &Calls::default())?;

	let zooms: Vec<u8> = processor
		.process_all(sequential())
		.await?
		.iter()
		.map(|info| info.tile.zoom())
		.collect();
	assert_eq!(zooms, [vec![0; 2], vec![1; 8], vec![2; 32]].concat());
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn local_executor_reports_every_tile() -> Result<()> {
	let calls = Calls::default();
	let processor = labelling(
		params(ProcessMode::Overwrite, 0, 2),
		MemoryOutput::new(pyramid(1)),
		&calls,
	)?;
	let options = BatchOptions {
		workers: Some(4),
		..BatchOptions::default()
	};

	let mut tiles: Vec<TileIndex> = processor
		.process_all(options)
		.await?
		.iter()
		.map(|info| info.tile.index())
		.collect();
	tiles.sort();
	tiles.dedup();
	assert_eq!(tiles.len(), 42);
	assert_eq!(calls.get(), 42);
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn distributed_executor_reports_every_tile() -> Result<()> {
	let calls = Calls::default();
	let processor = labelling(
		params(ProcessMode::Overwrite, 1, 2),
		MemoryOutput::new(pyramid(1)),
		&calls,
	)?;
	let options = BatchOptions {
		executor: Some(
			ExecutorKind::Distributed {
				chunk_size: 5,
				max_submitted_tasks: 2,
			}
			.build(),
		),
		..BatchOptions::default()
	};

	let infos = processor.process_all(options).await?;
	assert_eq!(infos.len(), 40);
	assert_eq!(calls.get(), 40);
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_the_stream_stops_later_zoom_levels() -> Result<()> {
	let calls = Calls::default();
	let processor = labelling(
		params(ProcessMode::Overwrite, 0, 2),
		MemoryOutput::new(pyramid(1)),
		&calls,
	)?;
	let options = BatchOptions {
		workers: Some(2),
		..BatchOptions::default()
	};

	let mut results = processor.batch_processor(options)?;
	let first = results.next().await.transpose()?;
	assert_eq!(first.map(|info| info.tile.zoom()), Some(2));
	drop(results);

	tokio::time::sleep(Duration::from_millis(200)).await;
	let calls_after_drop = calls.get();
	let writes_after_drop = processor.config().output().writes();
	assert!(calls_after_drop <= 2, "{calls_after_drop} tiles ran");

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(calls.get(), calls_after_drop);
	assert_eq!(processor.config().output().writes(), writes_after_drop);
	for (zoom, rows, cols) in [(1, 2, 4), (0, 1, 2)] {
		for row in 0..rows {
			for col in 0..cols {
				assert_eq!(processor.config().output().stored(TileIndex::new(zoom, row, col)), None);
			}
		}
	}
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn continue_mode_skips_written_tiles() -> Result<()> {
	let calls = Calls::default();
	let processor = labelling(
		params(ProcessMode::Continue, 0, 1),
		MemoryOutput::new(pyramid(1)),
		&calls,
	)?;

	assert_eq!(processor.process_all(sequential()).await?.len(), 10);
	let second: Vec<ProcessInfo> = processor.process_all(sequential()).await?;
	assert_eq!(second.len(), 10);
	assert!(second.iter().all(|info| !info.processed && !info.written));
	assert_eq!(second[0].process_message, "output already exists");
	assert_eq!(calls.get(), 10);
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn zoom_selection_limits_the_run() -> Result<()> {
	let processor = labelling(
		params(ProcessMode::Overwrite, 0, 4),
		MemoryOutput::new(pyramid(1)),
		&Calls::default(),
	)?;
	let options = BatchOptions {
		zoom: Some(ZoomLevels::new(1, 2)?),
		..sequential()
	};
	assert_eq!(processor.process_all(options).await?.len(), 40);
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn single_tile_runs_synchronously() -> Result<()> {
	let calls = Calls::default();
	let processor = labelling(
		params(ProcessMode::Continue, 0, 2),
		MemoryOutput::new(pyramid(1)),
		&calls,
	)?;
	let options = BatchOptions {
		tile: Some(TileIndex::new(2, 1, 1)),
		..BatchOptions::default()
	};

	let infos = processor.process_all(options).await?;
	assert_eq!(infos.len(), 1);
	assert_eq!(infos[0].tile.index(), TileIndex::new(2, 1, 1));
	assert_eq!(calls.get(), 1);
	assert_eq!(
		processor.config().output().stored(TileIndex::new(2, 1, 1)),
		Some(labels(&["2/1/1"]))
	);
	Ok(())
}

#[test]
fn zoom_and_tile_cannot_be_combined() -> Result<()> {
	let processor = labelling(
		params(ProcessMode::Continue, 0, 2),
		MemoryOutput::new(pyramid(1)),
		&Calls::default(),
	)?;
	let options = BatchOptions {
		zoom: Some(ZoomLevels::single(1)?),
		tile: Some(TileIndex::new(1, 0, 0)),
		..BatchOptions::default()
	};
	let Err(err) = processor.batch_processor(options) else {
		panic!("conflicting selection was accepted");
	};
	assert!(matches!(ProcessError::kind_of(&err), Some(ProcessError::ConflictingSelection)));
	Ok(())
}

#[test]
fn readonly_mode_cannot_run_batches() -> Result<()> {
	let processor = labelling(
		params(ProcessMode::Readonly, 0, 2),
		MemoryOutput::new(pyramid(1)),
		&Calls::default(),
	)?;
	let Err(err) = processor.batch_processor(BatchOptions::default()) else {
		panic!("readonly batch run was accepted");
	};
	assert_eq!(err.to_string(), "batch processing is not allowed in readonly mode");
	Ok(())
}

fn failing(mode: ProcessMode) -> Result<Arc<Processor<MemoryOutput>>> {
	let config = ProcessConfig::new(params(mode, 1, 1), None, vec![], MemoryOutput::new(pyramid(1)))?;
	Ok(Arc::new(Processor::new(
		config,
		|ctx: &ProcessContext| -> Result<Option<Vec<String>>> {
			if ctx.tile().col() % 2 == 1 {
				bail!("broken source data");
			}
			Ok(Some(vec![ctx.tile().to_string()]))
		},
	)))
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_tasks_do_not_abort_siblings() -> Result<()> {
	let processor = failing(ProcessMode::Overwrite)?;
	let results: Vec<Result<ProcessInfo>> = processor.batch_processor(sequential())?.collect().await;
	assert_eq!(results.len(), 8);
	let failed: Vec<String> = results
		.iter()
		.filter_map(|result| result.as_ref().err())
		.map(|err| format!("{err:#}"))
		.collect();
	assert_eq!(failed.len(), 4);
	assert!(failed[0].starts_with("tile 1/0/1 failed: "), "{}", failed[0]);
	assert!(failed[0].ends_with("broken source data"), "{}", failed[0]);
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_fast_stops_after_first_failure() -> Result<()> {
	let processor = failing(ProcessMode::Overwrite)?;
	let executor = Arc::new(SequentialExecutor::new());
	let options = BatchOptions {
		executor: Some(executor.clone()),
		fail_fast: true,
		..BatchOptions::default()
	};

	let results: Vec<Result<ProcessInfo>> = processor.batch_processor(options)?.collect().await;
	assert_eq!(results.len(), 2);
	assert!(results[0].is_ok());
	assert!(results[1].is_err());
	assert!(tileforge::Executor::is_cancelled(executor.as_ref()));
	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn preprocessing_runs_once_before_tiles() -> Result<()> {
	let input = Arc::new(MockInput::new("dem").with_preprocessing("index", 7));
	let inputs: Vec<Arc<dyn Input>> = vec![input.clone()];
	let config = ProcessConfig::new(
		params(ProcessMode::Overwrite, 0, 1),
		None,
		inputs,
		MemoryOutput::new(pyramid(1)),
	)?;
	let seen = input.clone();
	let processor = Arc::new(Processor::new(
		config,
		move |ctx: &ProcessContext| -> Result<Option<Vec<String>>> {
			if seen.received().is_empty() {
				bail!("preprocessing has not finished");
			}
			Ok(Some(vec![ctx.tile().to_string()]))
		},
	));

	assert_eq!(processor.process_all(BatchOptions::default()).await?.len(), 10);
	assert_eq!(processor.process_all(BatchOptions::default()).await?.len(), 10);
	assert_eq!(input.received(), vec![("index".to_string(), 7)]);
	Ok(())
}

#[test]
fn single_tile_runs_preprocessing_first() -> Result<()> {
	let input = Arc::new(MockInput::new("dem").with_preprocessing("index", 3));
	let inputs: Vec<Arc<dyn Input>> = vec![input.clone()];
	let config = ProcessConfig::new(
		params(ProcessMode::Overwrite, 0, 1),
		None,
		inputs,
		MemoryOutput::new(pyramid(1)),
	)?;
	let processor = Arc::new(Processor::new(config, |_: &ProcessContext| -> Result<Option<Vec<String>>> {
		Ok(None)
	}));

	let options = BatchOptions {
		tile: Some(TileIndex::new(0, 0, 0)),
		..BatchOptions::default()
	};
	let infos = futures::executor::block_on(processor.process_all(options))?;
	assert_eq!(infos[0].write_message, "output empty, nothing written");
	assert_eq!(input.received(), vec![("index".to_string(), 3)]);
	Ok(())
}

#[test]
fn baselevels_order_zoom_levels() -> Result<()> {
	let mut params = params(ProcessMode::Continue, 0, 5);
	params.baselevels = Some(Baselevels::new(2, 3));
	let processor = labelling(params, MemoryOutput::new(pyramid(1)), &Calls::default())?;

	let order = TaskBatcher::new(processor).zoom_order(ZoomLevels::new(0, 5)?);
	assert_eq!(order, vec![3, 2, 1, 0, 4, 5]);
	Ok(())
}
