use super::{Cancellation, Executor};
use crate::task::{Task, TaskResult};
use futures::{
	StreamExt,
	stream::{self, BoxStream},
};

/// Runs tasks on tokio's blocking thread pool with at most `workers` tasks at once.
///
/// A failing or panicking task only affects its own result. The result stream must be
/// polled from within a tokio runtime.
pub struct LocalExecutor {
	workers: usize,
	cancellation: Cancellation,
}

impl LocalExecutor {
	pub fn new(workers: usize) -> Self {
		LocalExecutor {
			workers: workers.max(1),
			cancellation: Cancellation::default(),
		}
	}

	pub fn workers(&self) -> usize {
		self.workers
	}
}

impl Executor for LocalExecutor {
	fn as_completed(&self, tasks: Vec<Task>) -> BoxStream<'static, TaskResult> {
		log::trace!("running {} tasks on {} workers", tasks.len(), self.workers);
		let stream = stream::iter(tasks)
			.map(|task| async move {
				let id = task.id().clone();
				match tokio::task::spawn_blocking(move || task.run()).await {
					Ok(result) => result,
					Err(err) => TaskResult::failed(id, err.to_string()),
				}
			})
			.buffer_unordered(self.workers);
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
	use crate::task::{TaskId, TaskOutput};
	use anyhow::{Result, bail};
	use std::{
		sync::{
			Arc,
			atomic::{AtomicUsize, Ordering},
		},
		thread,
		time::{Duration, Instant},
	};
	use tileforge_core::TileIndex;

	fn id(col: u32) -> TaskId {
		TaskId::Tile(TileIndex::new(2, 0, col))
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn bounds_parallelism() {
		let running = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let tasks = (0..12)
			.map(|col| {
				let running = Arc::clone(&running);
				let peak = Arc::clone(&peak);
				Task::new(id(col), move || -> Result<TaskOutput> {
					let now = running.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					thread::sleep(Duration::from_millis(20));
					running.fetch_sub(1, Ordering::SeqCst);
					bail!("done")
				})
			})
			.collect();

		let results: Vec<TaskResult> = LocalExecutor::new(3).as_completed(tasks).collect().await;
		assert_eq!(results.len(), 12);
		assert!(peak.load(Ordering::SeqCst) <= 3);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn isolates_panics() {
		let tasks = vec![
			Task::new(id(0), || panic!("bad tile")),
			Task::new(id(1), || bail!("no data")),
		];
		let mut results: Vec<TaskResult> = LocalExecutor::new(2).as_completed(tasks).collect().await;
		results.sort_by_key(|r| r.id.to_string());
		assert_eq!(results[0].result.as_ref().unwrap_err().to_string(), "task tile 2/0/0 failed: bad tile");
		assert_eq!(results[1].result.as_ref().unwrap_err().to_string(), "no data");
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn cancel_does_not_wait_for_running_tasks() {
		let executor = LocalExecutor::new(1);
		let tasks = vec![Task::new(id(0), || {
			thread::sleep(Duration::from_millis(500));
			bail!("slow")
		})];
		let mut results = executor.as_completed(tasks);
		let start = Instant::now();
		let next = tokio::spawn(async move { results.next().await.is_none() });
		tokio::time::sleep(Duration::from_millis(20)).await;
		executor.cancel();
		assert!(next.await.unwrap());
		assert!(start.elapsed() < Duration::from_millis(400));
	}
}
