use super::{Cancellation, Executor};
use crate::task::{Task, TaskId, TaskResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{
	StreamExt,
	stream::{self, BoxStream},
};
use itertools::Itertools;
use std::sync::Arc;
use tileforge_core::ConcurrencyLimits;

/// Somewhere to run chunks of tasks, such as a cluster scheduler.
#[async_trait]
pub trait SchedulerBackend: Send + Sync + 'static {
	/// Runs every task of `chunk` and returns one result per task.
	///
	/// An error means the chunk as a whole could not be run; all of its tasks are then
	/// reported as failed.
	async fn submit(&self, chunk: Vec<Task>) -> Result<Vec<TaskResult>>;
}

/// Runs submitted chunks on tokio's blocking thread pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessBackend;

#[async_trait]
impl SchedulerBackend for InProcessBackend {
	async fn submit(&self, chunk: Vec<Task>) -> Result<Vec<TaskResult>> {
		let count = chunk.len();
		tokio::task::spawn_blocking(move || chunk.into_iter().map(Task::run).collect())
			.await
			.with_context(|| format!("running a chunk of {count} tasks"))
	}
}

/// Submits tasks to a [`SchedulerBackend`] in chunks of `chunk_size` tasks, keeping at
/// most `max_submitted_tasks` chunks in flight.
pub struct DistributedExecutor<B: SchedulerBackend> {
	backend: Arc<B>,
	limits: ConcurrencyLimits,
	cancellation: Cancellation,
}

impl<B: SchedulerBackend> DistributedExecutor<B> {
	pub fn new(backend: B, limits: ConcurrencyLimits) -> Self {
		DistributedExecutor {
			backend: Arc::new(backend),
			limits,
			cancellation: Cancellation::default(),
		}
	}

	pub fn limits(&self) -> &ConcurrencyLimits {
		&self.limits
	}
}

impl<B: SchedulerBackend> Executor for DistributedExecutor<B> {
	fn as_completed(&self, tasks: Vec<Task>) -> BoxStream<'static, TaskResult> {
		let chunks: Vec<Vec<Task>> = tasks
			.into_iter()
			.chunks(self.limits.chunk_size)
			.into_iter()
			.map(Iterator::collect)
			.collect();
		log::trace!(
			"submitting {} chunks, at most {} at once",
			chunks.len(),
			self.limits.max_submitted_tasks
		);

		let stream = stream::iter(chunks)
			.map({
				let backend = Arc::clone(&self.backend);
				move |chunk| {
					let backend = Arc::clone(&backend);
					async move {
						let ids: Vec<TaskId> = chunk.iter().map(|task| task.id().clone()).collect();
						match backend.submit(chunk).await {
							Ok(results) => results,
							Err(err) => {
								log::warn!("chunk of {} tasks failed: {err:#}", ids.len());
								let message = format!("{err:#}");
								ids.into_iter().map(|id| TaskResult::failed(id, message.clone())).collect()
							}
						}
					}
				}
			})
			.buffer_unordered(self.limits.max_submitted_tasks)
			.flat_map(stream::iter);
		self.cancellation.guard(stream)
	}

	fn cancel(&self) {
		self.cancellation.cancel();
	}

	fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::task::TaskOutput;
	use anyhow::bail;
	use pretty_assertions::assert_eq;
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration,
	};
	use tileforge_core::TileIndex;

	#[derive(Default)]
	struct RecordingBackend {
		running: AtomicUsize,
		peak: AtomicUsize,
		sizes: parking_lot::Mutex<Vec<usize>>,
	}

	#[async_trait]
	impl SchedulerBackend for Arc<RecordingBackend> {
		async fn submit(&self, chunk: Vec<Task>) -> Result<Vec<TaskResult>> {
			let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
			self.peak.fetch_max(now, Ordering::SeqCst);
			self.sizes.lock().push(chunk.len());
			tokio::time::sleep(Duration::from_millis(10)).await;
			self.running.fetch_sub(1, Ordering::SeqCst);
			Ok(chunk.into_iter().map(Task::run).collect())
		}
	}

	struct BrokenBackend;

	#[async_trait]
	impl SchedulerBackend for BrokenBackend {
		async fn submit(&self, _chunk: Vec<Task>) -> Result<Vec<TaskResult>> {
			bail!("scheduler unreachable")
		}
	}

	fn tasks(count: u32) -> Vec<Task> {
		(0..count)
			.map(|col| Task::new(TaskId::Tile(TileIndex::new(5, 0, col)), || -> Result<TaskOutput> { bail!("empty") }))
			.collect()
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn chunks_and_limits_submissions() {
		let backend = Arc::new(RecordingBackend::default());
		let executor = DistributedExecutor::new(Arc::clone(&backend), ConcurrencyLimits::new(1, 4, 2));

		let results: Vec<TaskResult> = executor.as_completed(tasks(18)).collect().await;
		assert_eq!(results.len(), 18);
		assert!(backend.peak.load(Ordering::SeqCst) <= 2);
		let mut sizes = backend.sizes.lock().clone();
		sizes.sort_unstable();
		assert_eq!(sizes, vec![2, 4, 4, 4, 4]);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn failed_submission_fails_every_task() {
		let executor = DistributedExecutor::new(BrokenBackend, ConcurrencyLimits::new(1, 3, 1));
		let results: Vec<TaskResult> = executor.as_completed(tasks(5)).collect().await;
		assert_eq!(results.len(), 5);
		for result in results {
			let message = result.result.unwrap_err().to_string();
			assert!(message.ends_with("failed: scheduler unreachable"), "{message}");
		}
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn in_process_backend_runs_tasks() {
		let executor = DistributedExecutor::new(InProcessBackend, ConcurrencyLimits::new(1, 2, 2));
		let mut ids: Vec<TaskId> = executor.as_completed(tasks(3)).map(|r| r.id).collect().await;
		ids.sort_by_key(ToString::to_string);
		assert_eq!(ids.len(), 3);
		assert_eq!(ids[2], TaskId::Tile(TileIndex::new(5, 0, 2)));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn cancelled_executor_submits_nothing() {
		let backend = Arc::new(RecordingBackend::default());
		let executor = DistributedExecutor::new(Arc::clone(&backend), ConcurrencyLimits::new(1, 4, 2));
		executor.cancel();
		let results: Vec<TaskResult> = executor.as_completed(tasks(8)).collect().await;
		assert!(results.is_empty());
		assert!(backend.sizes.lock().is_empty());
	}
}
