use super::{Cancellation, Executor};
use crate::task::{Task, TaskResult};
use futures::{
	StreamExt,
	stream::{self, BoxStream},
};

/// Runs tasks one after another on the task polling the result stream.
///
/// Needs no runtime, so its streams can also be driven by `futures::executor::block_on`.
#[derive(Default)]
pub struct SequentialExecutor {
	cancellation: Cancellation,
}

impl SequentialExecutor {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Executor for SequentialExecutor {
	fn as_completed(&self, tasks: Vec<Task>) -> BoxStream<'static, TaskResult> {
		self.cancellation.guard(stream::iter(tasks).map(Task::run))
	}

	fn cancel(&self) {
		self.cancellation.cancel();
	}

	fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}
}
