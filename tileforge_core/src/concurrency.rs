//! Concurrency limits for tile processing
//!
//! Tile computations are CPU-bound, so the local worker count defaults to the number of
//! logical CPUs. Remote submission is bounded by a chunk size and a window of chunks in
//! flight.
//!
//! # Usage
//!
//! ```
//! use tileforge_core::ConcurrencyLimits;
//!
//! let limits = ConcurrencyLimits::default();
//! assert_eq!(limits.workers, ConcurrencyLimits::cpu_count());
//! assert_eq!(limits.chunk_size, 100);
//! assert_eq!(limits.max_submitted_tasks, 500);
//! ```

/// Default number of tasks grouped into one chunk for a remote scheduler.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default number of chunks that may be in flight on a remote scheduler.
pub const DEFAULT_MAX_SUBMITTED_TASKS: usize = 500;

/// Worker and submission limits used by the executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
	/// Parallel workers of a local pool.
	pub workers: usize,

	/// Tasks per chunk submitted to a remote scheduler.
	pub chunk_size: usize,

	/// Chunks allowed in flight at once on a remote scheduler.
	pub max_submitted_tasks: usize,
}

impl ConcurrencyLimits {
	/// Create concurrency limits with custom values. Zero is raised to one.
	pub fn new(workers: usize, chunk_size: usize, max_submitted_tasks: usize) -> Self {
		Self {
			workers: workers.max(1),
			chunk_size: chunk_size.max(1),
			max_submitted_tasks: max_submitted_tasks.max(1),
		}
	}

	/// Replaces the worker count, keeping the other limits.
	pub fn with_workers(self, workers: Option<usize>) -> Self {
		match workers {
			Some(workers) => Self {
				workers: workers.max(1),
				..self
			},
			None => self,
		}
	}

	/// Get the number of logical CPUs available
	pub fn cpu_count() -> usize {
		num_cpus::get()
	}
}

impl Default for ConcurrencyLimits {
	fn default() -> Self {
		Self {
			workers: num_cpus::get(),
			chunk_size: DEFAULT_CHUNK_SIZE,
			max_submitted_tasks: DEFAULT_MAX_SUBMITTED_TASKS,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_limits() {
		let limits = ConcurrencyLimits::default();
		assert_eq!(limits.workers, num_cpus::get());
		assert_eq!(limits.chunk_size, DEFAULT_CHUNK_SIZE);
		assert_eq!(limits.max_submitted_tasks, DEFAULT_MAX_SUBMITTED_TASKS);
	}

	#[test]
	fn test_limits_minimum_one() {
		let limits = ConcurrencyLimits::new(0, 0, 0);
		assert_eq!(limits, ConcurrencyLimits::new(1, 1, 1));
	}

	#[test]
	fn test_with_workers() {
		let limits = ConcurrencyLimits::new(8, 10, 20);
		assert_eq!(limits.with_workers(None).workers, 8);
		assert_eq!(limits.with_workers(Some(3)), ConcurrencyLimits::new(3, 10, 20));
		assert_eq!(limits.with_workers(Some(0)).workers, 1);
	}
}
