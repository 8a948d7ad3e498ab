use crate::{error::ProcessError, processor::ProcessInfo, traits::PreprocessingValue};
use anyhow::Result;
use std::{
	any::Any,
	fmt,
	panic::{AssertUnwindSafe, catch_unwind},
};
use tileforge_core::TileIndex;

/// Identity of a task: a preprocessing key of an input, or a process tile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskId {
	Preprocessing { input: String, key: String },
	Tile(TileIndex),
}

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TaskId::Preprocessing { input, key } => write!(f, "preprocessing {input}:{key}"),
			TaskId::Tile(index) => write!(f, "tile {index}"),
		}
	}
}

/// What a successful task produced.
pub enum TaskOutput {
	Preprocessing {
		input_index: usize,
		key: String,
		value: PreprocessingValue,
	},
	Tile(ProcessInfo),
}

impl fmt::Debug for TaskOutput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TaskOutput::Preprocessing { input_index, key, .. } => {
				write!(f, "Preprocessing(input {input_index}, {key})")
			}
			TaskOutput::Tile(info) => write!(f, "Tile({info:?})"),
		}
	}
}

type TaskFn = Box<dyn FnOnce() -> Result<TaskOutput> + Send>;

/// A unit of work: an identity and a closure over the processor.
///
/// Tasks carry no state besides their closure and report nothing but their result.
pub struct Task {
	id: TaskId,
	func: TaskFn,
}

impl Task {
	pub fn new<F>(id: TaskId, func: F) -> Task
	where
		F: FnOnce() -> Result<TaskOutput> + Send + 'static,
	{
		Task {
			id,
			func: Box::new(func),
		}
	}

	pub fn id(&self) -> &TaskId {
		&self.id
	}

	/// Runs the task. A panic inside the task becomes a failed result.
	pub fn run(self) -> TaskResult {
		let Task { id, func } = self;
		let result = match catch_unwind(AssertUnwindSafe(func)) {
			Ok(result) => result,
			Err(panic) => {
				log::warn!("{id} panicked");
				Err(ProcessError::ComputationFailed {
					task: id.to_string(),
					message: panic_message(panic.as_ref()),
				}
				.into())
			}
		};
		TaskResult { id, result }
	}
}

impl fmt::Debug for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Task({})", self.id)
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"panicked".to_string()
	}
}

/// The outcome of one task, reported in completion order.
#[derive(Debug)]
pub struct TaskResult {
	pub id: TaskId,
	pub result: Result<TaskOutput>,
}

impl TaskResult {
	/// A failed result for a task that never ran to completion.
	pub fn failed(id: TaskId, message: impl Into<String>) -> TaskResult {
		let task = id.to_string();
		TaskResult {
			id,
			result: Err(ProcessError::ComputationFailed {
				task,
				message: message.into(),
			}
			.into()),
		}
	}
}
