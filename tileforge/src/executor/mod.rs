//! Executors run tasks and report their results in completion order.
//!
//! Three implementations are provided:
//! - [`SequentialExecutor`] runs tasks one by one inside the polling task,
//! - [`LocalExecutor`] runs them on a bounded pool of blocking tokio workers,
//! - [`DistributedExecutor`] groups them into chunks and submits those to a
//!   [`SchedulerBackend`] with a bounded number of chunks in flight.
//!
//! Executors can be cancelled. A cancelled executor submits nothing new, and every
//! result stream it handed out ends at its next poll; tasks already running are abandoned
//! and finish in the background.

mod cancellation;
mod distributed;
mod local;
mod sequential;

pub(crate) use cancellation::Cancellation;
pub use distributed::*;
pub use local::*;
pub use sequential::*;

use crate::{
	processor::ProcessInfo,
	task::{BatchKind, Task, TaskBatch, TaskBatches, TaskResult},
};
use anyhow::Result;
use futures::{
	StreamExt,
	stream::{self, BoxStream},
};
use std::sync::Arc;
use tileforge_core::ConcurrencyLimits;

/// Runs tasks, yielding one [`TaskResult`] per task as tasks complete.
pub trait Executor: Send + Sync {
	/// Submits `tasks` and streams their results in completion order.
	fn as_completed(&self, tasks: Vec<Task>) -> BoxStream<'static, TaskResult>;

	/// Stops submitting tasks and ends all result streams handed out so far.
	fn cancel(&self);

	fn is_cancelled(&self) -> bool;
}

/// Selects and configures one of the built-in executors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorKind {
	Sequential,
	Local { workers: usize },
	Distributed { chunk_size: usize, max_submitted_tasks: usize },
}

impl ExecutorKind {
	pub fn build(self) -> Arc<dyn Executor> {
		match self {
			ExecutorKind::Sequential => Arc::new(SequentialExecutor::new()),
			ExecutorKind::Local { workers } => Arc::new(LocalExecutor::new(workers)),
			ExecutorKind::Distributed {
				chunk_size,
				max_submitted_tasks,
			} => Arc::new(DistributedExecutor::new(
				InProcessBackend,
				ConcurrencyLimits::new(1, chunk_size, max_submitted_tasks),
			)),
		}
	}
}

impl Default for ExecutorKind {
	fn default() -> Self {
		ExecutorKind::Local {
			workers: ConcurrencyLimits::default().workers,
		}
	}
}

/// An event of a batched run.
#[derive(Debug)]
pub enum BatchEvent {
	/// A tile was skipped while building a batch.
	Skipped(ProcessInfo),
	/// A task finished.
	Completed(BatchKind, TaskResult),
	/// A batch could not be built.
	Failed(anyhow::Error),
}

/// Submits batches one after another.
///
/// The tasks of a batch are only submitted once every task of the previous batch has
/// completed, so batches never interleave. Batches are built on tokio's blocking thread
/// pool, since enumerating tiles and checking existing output may block; the stream must
/// be polled from within a tokio runtime.
pub fn submit_batches(executor: Arc<dyn Executor>, batches: TaskBatches) -> BoxStream<'static, BatchEvent> {
	build_in_background(batches)
		.flat_map(move |batch| match batch {
			Ok(batch) => {
				let kind = batch.kind;
				let skipped = stream::iter(batch.skipped).map(BatchEvent::Skipped);
				let completed = executor
					.as_completed(batch.tasks)
					.map(move |result| BatchEvent::Completed(kind, result));
				skipped.chain(completed).boxed()
			}
			Err(err) => stream::once(async move { BatchEvent::Failed(err) }).boxed(),
		})
		.boxed()
}

/// Pulls one batch at a time from `batches` on a blocking thread.
fn build_in_background(batches: TaskBatches) -> BoxStream<'static, Result<TaskBatch>> {
	stream::unfold(Some(batches), |batches| async move {
		let mut batches = batches?;
		let next = tokio::task::spawn_blocking(move || batches.next().map(|batch| (batch, batches))).await;
		match next {
			Ok(Some((batch, batches))) => Some((batch, Some(batches))),
			Ok(None) => None,
			Err(err) => Some((Err(anyhow::Error::new(err).context("Failed to build task batch")), None)),
		}
	})
	.boxed()
}
