use crate::task::TaskResult;
use futures::{
	Stream, StreamExt,
	stream::{self, AbortHandle, Abortable, BoxStream},
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation state shared by the result streams of one executor.
#[derive(Default)]
pub(crate) struct Cancellation {
	cancelled: AtomicBool,
	handles: Mutex<Vec<AbortHandle>>,
}

impl Cancellation {
	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	/// Wraps `stream` so that it ends as soon as the executor is cancelled.
	pub fn guard<S>(&self, stream: S) -> BoxStream<'static, TaskResult>
	where
		S: Stream<Item = TaskResult> + Send + 'static,
	{
		if self.is_cancelled() {
			return stream::empty().boxed();
		}
		let (handle, registration) = AbortHandle::new_pair();
		{
			let mut handles = self.handles.lock();
			handles.retain(|handle| !handle.is_aborted());
			handles.push(handle.clone());
		}
		// cancel() may have run between the check above and the registration
		if self.is_cancelled() {
			handle.abort();
		}
		Abortable::new(stream, registration).boxed()
	}

	pub fn cancel(&self) {
		if self.cancelled.swap(true, Ordering::SeqCst) {
			return;
		}
		let handles = std::mem::take(&mut *self.handles.lock());
		log::debug!("cancelling executor, ending {} result streams", handles.len());
		for handle in handles {
			handle.abort();
		}
	}
}
