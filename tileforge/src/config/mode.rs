use enumset::{EnumSet, EnumSetType, enum_set};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a processor treats existing output.
///
/// - `Memory`: compute on demand, keep results in the in-memory cache, never write.
/// - `Readonly`: only read existing output, never compute.
/// - `Continue`: compute and write tiles whose output does not exist yet.
/// - `Overwrite`: compute and write every tile.
#[derive(Debug, Default, EnumSetType, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
	Memory,
	Readonly,
	#[default]
	Continue,
	Overwrite,
}

const READING: EnumSet<ProcessMode> = enum_set!(ProcessMode::Readonly | ProcessMode::Continue | ProcessMode::Overwrite);
const WRITING: EnumSet<ProcessMode> = enum_set!(ProcessMode::Continue | ProcessMode::Overwrite);
const EXECUTING: EnumSet<ProcessMode> = enum_set!(ProcessMode::Memory | ProcessMode::Continue | ProcessMode::Overwrite);

impl ProcessMode {
	/// Existing output may be read.
	pub fn can_read(self) -> bool {
		READING.contains(self)
	}

	/// Output may be written.
	pub fn can_write(self) -> bool {
		WRITING.contains(self)
	}

	/// The user process may run.
	pub fn can_execute(self) -> bool {
		EXECUTING.contains(self)
	}

	/// Computed tiles are retained in the LRU cache.
	pub fn retains_results(self) -> bool {
		self == ProcessMode::Memory
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ProcessMode::Memory => "memory",
			ProcessMode::Readonly => "readonly",
			ProcessMode::Continue => "continue",
			ProcessMode::Overwrite => "overwrite",
		}
	}
}

impl fmt::Display for ProcessMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Order in which zoom levels are processed in batch mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomOrder {
	#[default]
	Descending,
	Ascending,
}
