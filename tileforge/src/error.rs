//! Conditions callers may want to tell apart from other failures.
//!
//! They travel inside [`anyhow::Error`] like every other error; use
//! [`ProcessError::kind_of`] or [`ProcessError::is_nodata`] to detect them.

use crate::config::ProcessMode;
use thiserror::Error;
use tileforge_core::{Crs, TileIndex, TilePyramid};

#[derive(Debug, Error)]
pub enum ProcessError {
	/// The user process produced nothing for this tile.
	#[error("tile {0} has no data")]
	NoData(TileIndex),

	#[error("reprojection from {from} to {to} is not implemented")]
	ReprojectionUnsupported { from: Crs, to: Crs },

	#[error("{operation} is not allowed in {mode} mode")]
	InvalidModeOperation { operation: &'static str, mode: ProcessMode },

	#[error("a zoom range and a single tile cannot be selected at the same time")]
	ConflictingSelection,

	#[error("tile {tile} belongs to {found:?}, expected {expected:?}")]
	ForeignPyramid {
		tile: TileIndex,
		expected: TilePyramid,
		found: TilePyramid,
	},

	#[error("task {task} failed: {message}")]
	ComputationFailed { task: String, message: String },
}

impl ProcessError {
	/// Finds a `ProcessError` anywhere in the chain of `err`.
	pub fn kind_of(err: &anyhow::Error) -> Option<&ProcessError> {
		err.chain().find_map(|cause| cause.downcast_ref::<ProcessError>())
	}

	/// Returns `true` if `err` reports an empty tile.
	pub fn is_nodata(err: &anyhow::Error) -> bool {
		matches!(ProcessError::kind_of(err), Some(ProcessError::NoData(_)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::{Context, Result, anyhow};

	#[test]
	fn detects_wrapped_errors() {
		let result: Result<()> = Err(ProcessError::NoData(TileIndex::new(3, 1, 2)).into());
		let err = result.context("Failed to execute tile").unwrap_err();
		assert!(ProcessError::is_nodata(&err));
		assert_eq!(format!("{err:#}"), "Failed to execute tile: tile 3/1/2 has no data");
	}

	#[test]
	fn ignores_other_errors() {
		let err = anyhow!("disk full");
		assert!(ProcessError::kind_of(&err).is_none());
		assert!(!ProcessError::is_nodata(&err));

		let err = anyhow::Error::from(ProcessError::InvalidModeOperation {
			operation: "write",
			mode: ProcessMode::Readonly,
		});
		assert!(matches!(
			ProcessError::kind_of(&err),
			Some(ProcessError::InvalidModeOperation { .. })
		));
		assert_eq!(err.to_string(), "write is not allowed in readonly mode");
	}
}
