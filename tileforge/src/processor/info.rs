use serde::Serialize;
use std::fmt;
use tileforge_core::{Bounds, Crs, Tile, ZoomLevels};

/// Report about one process tile of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessInfo {
	pub tile: Tile,
	pub processed: bool,
	pub process_message: String,
	pub written: bool,
	pub write_message: String,
}

impl ProcessInfo {
	/// A tile that was not processed because its output exists.
	pub fn skipped(tile: Tile) -> ProcessInfo {
		ProcessInfo {
			tile,
			processed: false,
			process_message: "output already exists".to_string(),
			written: false,
			write_message: "nothing written".to_string(),
		}
	}
}

impl fmt::Debug for ProcessInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"ProcessInfo({}: {}, {})",
			self.tile, self.process_message, self.write_message
		)
	}
}

/// Outcome of [`Processor::write`](super::Processor::write).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteInfo {
	pub written: bool,
	pub message: String,
}

impl WriteInfo {
	pub(crate) fn skipped(message: &str) -> WriteInfo {
		WriteInfo {
			written: false,
			message: message.to_string(),
		}
	}
}

/// End-of-run metadata handed to [`Output::write_catalog`](crate::traits::Output::write_catalog).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CatalogSummary {
	pub zoom_levels: ZoomLevels,
	pub bounds: Bounds,
	pub crs: Crs,
}
