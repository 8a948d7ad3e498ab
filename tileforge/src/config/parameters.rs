use super::{Baselevels, ProcessMode, ZoomOrder};
use crate::executor::ExecutorKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tileforge_core::{Bounds, ConcurrencyLimits, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_SUBMITTED_TASKS, TilePyramid, ZoomLevels};

/// Default number of process tiles kept in memory mode.
pub const DEFAULT_CACHE_SIZE: usize = 512;

/// Plain process parameters, as read from a configuration document.
///
/// ```yaml
/// mode: continue
/// zoom_levels: { min: 0, max: 8 }
/// bounds: [-10, 40, 30, 60]
/// pyramid: { grid: geodetic, metatiling: 2, pixelbuffer: 8 }
/// baselevels: { min: 6, max: 8, lower: bilinear }
/// executor: { backend: local, workers: 4 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessParameters {
	#[serde(default)]
	pub mode: ProcessMode,

	pub zoom_levels: ZoomLevels,

	/// Limits processing to these bounds, in units of the process CRS.
	#[serde(default)]
	pub bounds: Option<Bounds>,

	/// The process pyramid.
	pub pyramid: TilePyramid,

	#[serde(default)]
	pub baselevels: Option<Baselevels>,

	#[serde(default)]
	pub zoom_order: ZoomOrder,

	/// Capacity of the tile cache used in memory mode.
	#[serde(default = "default_cache_size")]
	pub cache_size: usize,

	#[serde(default)]
	pub executor: ExecutorParameters,
}

fn default_cache_size() -> usize {
	DEFAULT_CACHE_SIZE
}

impl ProcessParameters {
	/// Parameters with defaults for everything but the zoom levels and the pyramid.
	pub fn new(zoom_levels: ZoomLevels, pyramid: TilePyramid) -> ProcessParameters {
		ProcessParameters {
			mode: ProcessMode::default(),
			zoom_levels,
			bounds: None,
			pyramid,
			baselevels: None,
			zoom_order: ZoomOrder::default(),
			cache_size: DEFAULT_CACHE_SIZE,
			executor: ExecutorParameters::default(),
		}
	}

	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}
}

/// Which executor runs batch tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorBackend {
	Sequential,
	#[default]
	Local,
	Distributed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorParameters {
	#[serde(default)]
	pub backend: ExecutorBackend,

	/// Local worker count, defaults to the number of CPUs.
	#[serde(default)]
	pub workers: Option<usize>,

	#[serde(default = "default_chunk_size")]
	pub chunk_size: usize,

	#[serde(default = "default_max_submitted_tasks")]
	pub max_submitted_tasks: usize,
}

fn default_chunk_size() -> usize {
	DEFAULT_CHUNK_SIZE
}

fn default_max_submitted_tasks() -> usize {
	DEFAULT_MAX_SUBMITTED_TASKS
}

impl Default for ExecutorParameters {
	fn default() -> Self {
		ExecutorParameters {
			backend: ExecutorBackend::default(),
			workers: None,
			chunk_size: DEFAULT_CHUNK_SIZE,
			max_submitted_tasks: DEFAULT_MAX_SUBMITTED_TASKS,
		}
	}
}

impl ExecutorParameters {
	pub fn limits(&self) -> ConcurrencyLimits {
		let defaults = ConcurrencyLimits::default();
		ConcurrencyLimits::new(
			self.workers.unwrap_or(defaults.workers),
			self.chunk_size,
			self.max_submitted_tasks,
		)
	}

	/// The executor described by these parameters. `workers` overrides the configured worker count.
	pub fn kind(&self, workers: Option<usize>) -> ExecutorKind {
		let limits = self.limits().with_workers(workers);
		match self.backend {
			ExecutorBackend::Sequential => ExecutorKind::Sequential,
			ExecutorBackend::Local => ExecutorKind::Local {
				workers: limits.workers,
			},
			ExecutorBackend::Distributed => ExecutorKind::Distributed {
				chunk_size: limits.chunk_size,
				max_submitted_tasks: limits.max_submitted_tasks,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Resampling;
	use pretty_assertions::assert_eq;
	use tileforge_core::Grid;

	#[test]
	fn parse_minimal_parameters() {
		let params = ProcessParameters::from_string(
			"zoom_levels: { min: 0, max: 5 }\npyramid:\n  grid: geodetic\n",
		)
		.unwrap();
		assert_eq!(
			params,
			ProcessParameters::new(
				ZoomLevels::new(0, 5).unwrap(),
				TilePyramid::new(Grid::Geodetic, 1, 0).unwrap()
			)
		);
	}

	#[test]
	fn parse_full_parameters() {
		let yaml = "
mode: overwrite
zoom_levels: { min: 2, max: 9 }
bounds: [-10, 40, 30, 60]
pyramid: { grid: mercator, metatiling: 4, pixelbuffer: 16, tile_size: 512 }
baselevels: { min: 7, max: 9, lower: cubic_spline }
zoom_order: ascending
cache_size: 64
executor: { backend: distributed, chunk_size: 10, max_submitted_tasks: 3 }
";
		let params = ProcessParameters::from_reader(yaml.as_bytes()).unwrap();
		assert_eq!(params.mode, ProcessMode::Overwrite);
		assert_eq!(params.bounds, Some(Bounds::new(-10.0, 40.0, 30.0, 60.0).unwrap()));
		assert_eq!(
			params.pyramid,
			TilePyramid::new(Grid::Mercator, 4, 16).unwrap().with_tile_size(512).unwrap()
		);
		let baselevels = params.baselevels.unwrap();
		assert_eq!(baselevels.lower, Resampling::CubicSpline);
		assert_eq!(baselevels.higher, Resampling::Nearest);
		assert_eq!(params.zoom_order, ZoomOrder::Ascending);
		assert_eq!(params.cache_size, 64);
		assert_eq!(
			params.executor.kind(None),
			ExecutorKind::Distributed {
				chunk_size: 10,
				max_submitted_tasks: 3
			}
		);
	}

	#[test]
	fn rejects_unknown_and_invalid_fields() {
		assert!(ProcessParameters::from_string("zoom_levels: { min: 0, max: 1 }\npyramid: { grid: geodetic }\ncolour: red").is_err());
		assert!(ProcessParameters::from_string("zoom_levels: { min: 3, max: 1 }\npyramid: { grid: geodetic }").is_err());
		assert!(ProcessParameters::from_string("zoom_levels: { min: 0, max: 1 }\npyramid: { grid: geodetic, metatiling: 3 }").is_err());
		assert!(ProcessParameters::from_string("zoom_levels: { min: 0, max: 1 }\npyramid: { grid: geodetic }\nbounds: [5, 0, 1, 1]").is_err());
	}

	#[test]
	fn worker_override() {
		let params = ExecutorParameters {
			workers: Some(6),
			..ExecutorParameters::default()
		};
		assert_eq!(params.kind(None), ExecutorKind::Local { workers: 6 });
		assert_eq!(params.kind(Some(2)), ExecutorKind::Local { workers: 2 });
	}
}
