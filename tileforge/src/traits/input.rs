use anyhow::Result;
use geo::MultiPolygon;
use std::{any::Any, fmt, sync::Arc};

/// Opaque result of a preprocessing task, handed back to the input that created it.
pub type PreprocessingValue = Arc<dyn Any + Send + Sync>;

/// A unit of work an input needs done once before any tile is processed,
/// e.g. indexing a remote catalogue.
pub struct PreprocessingTask {
	key: String,
	func: Box<dyn FnOnce() -> Result<PreprocessingValue> + Send>,
}

impl PreprocessingTask {
	pub fn new<F>(key: impl Into<String>, func: F) -> Self
	where
		F: FnOnce() -> Result<PreprocessingValue> + Send + 'static,
	{
		PreprocessingTask {
			key: key.into(),
			func: Box::new(func),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn run(self) -> Result<PreprocessingValue> {
		(self.func)()
	}

	pub(crate) fn into_parts(self) -> (String, Box<dyn FnOnce() -> Result<PreprocessingValue> + Send>) {
		(self.key, self.func)
	}
}

impl fmt::Debug for PreprocessingTask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PreprocessingTask({})", self.key)
	}
}

/// A data source the user process reads from.
///
/// The orchestrator never reads input data itself. It only asks for the area an input
/// covers, runs its preprocessing tasks and releases it at the end.
pub trait Input: Send + Sync {
	fn name(&self) -> &str;

	/// Area covered by this input at `zoom` in the process CRS. `None` means unrestricted.
	fn area(&self, _zoom: u8) -> Option<MultiPolygon<f64>> {
		None
	}

	/// Tasks to run once before processing starts. Called at most once per processor.
	fn preprocessing_tasks(&self) -> Vec<PreprocessingTask> {
		Vec::new()
	}

	/// Receives the result of a preprocessing task created by this input.
	fn set_preprocessing_result(&self, _key: &str, _value: PreprocessingValue) -> Result<()> {
		Ok(())
	}

	/// Releases resources held by the input.
	fn cleanup(&self) -> Result<()> {
		Ok(())
	}
}
