use super::{Baselevels, ProcessMode, ProcessParameters, ZoomOrder};
use crate::traits::{Input, Output};
use anyhow::{Result, ensure};
use geo::{BooleanOps, BoundingRect, MultiPolygon};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tileforge_derive::context;
use tileforge_core::{Bounds, Crs, Tile, TilePyramid, ZoomLevels};

/// The validated, immutable description of a processing run.
///
/// Besides the parameters it owns the three pyramids involved:
/// - the process pyramid, whose tiles the user process computes,
/// - the output pyramid, defined by the output,
/// - the baselevel pyramid (output grid and pixelbuffer, process metatiling), used to
///   derive zoom levels outside of the baselevels.
///
/// The area of interest per zoom level and tile counts are memoized.
pub struct ProcessConfig<O: Output> {
	params: ProcessParameters,
	process_pyramid: TilePyramid,
	output_pyramid: TilePyramid,
	baselevel_pyramid: Option<TilePyramid>,
	area: MultiPolygon<f64>,
	inputs: Arc<[Arc<dyn Input>]>,
	output: Arc<O>,
	area_at_zoom: Mutex<HashMap<u8, Arc<MultiPolygon<f64>>>>,
	tile_counts: Mutex<HashMap<(u8, u8), u64>>,
}

impl<O: Output> ProcessConfig<O> {
	/// Validates `params` against the output and builds the configuration.
	///
	/// `area` restricts processing to a geometry in the process CRS; without it the whole
	/// grid is used. Configured bounds further clip the area.
	#[context("Failed to create process configuration")]
	pub fn new(
		params: ProcessParameters,
		area: Option<MultiPolygon<f64>>,
		inputs: Vec<Arc<dyn Input>>,
		output: O,
	) -> Result<Self> {
		let process_pyramid = params.pyramid;
		let output_pyramid = output.pyramid();
		ensure!(
			output_pyramid.grid == process_pyramid.grid,
			"output grid ({}) must equal process grid ({})",
			output_pyramid.grid,
			process_pyramid.grid
		);
		ensure!(
			output_pyramid.metatiling <= process_pyramid.metatiling,
			"output metatiling ({}) must be <= process metatiling ({})",
			output_pyramid.metatiling,
			process_pyramid.metatiling
		);
		if let Some(baselevels) = &params.baselevels {
			baselevels.validate(&params.zoom_levels)?;
		}
		if let Some(bounds) = &params.bounds {
			ensure!(
				bounds.width() > 0.0 && bounds.height() > 0.0,
				"bounds {bounds:?} must have a non-zero area"
			);
		}

		let grid = MultiPolygon::new(vec![process_pyramid.grid.bounds().to_polygon()]);
		let mut area = match area {
			Some(area) => area.intersection(&grid),
			None => grid,
		};
		if let Some(bounds) = &params.bounds {
			area = area.intersection(&bounds.to_polygon());
		}

		let baselevel_pyramid = params.baselevels.map(|_| TilePyramid {
			grid: output_pyramid.grid,
			metatiling: process_pyramid.metatiling,
			pixelbuffer: output_pyramid.pixelbuffer,
			tile_size: output_pyramid.tile_size,
		});

		log::debug!(
			"process configuration: mode {}, zoom levels {:?}, process {:?}, output {:?}",
			params.mode,
			params.zoom_levels,
			process_pyramid,
			output_pyramid
		);

		Ok(ProcessConfig {
			params,
			process_pyramid,
			output_pyramid,
			baselevel_pyramid,
			area,
			inputs: inputs.into(),
			output: Arc::new(output),
			area_at_zoom: Mutex::new(HashMap::new()),
			tile_counts: Mutex::new(HashMap::new()),
		})
	}

	pub fn params(&self) -> &ProcessParameters {
		&self.params
	}

	pub fn mode(&self) -> ProcessMode {
		self.params.mode
	}

	pub fn zoom_levels(&self) -> ZoomLevels {
		self.params.zoom_levels
	}

	pub fn zoom_order(&self) -> ZoomOrder {
		self.params.zoom_order
	}

	pub fn baselevels(&self) -> Option<&Baselevels> {
		self.params.baselevels.as_ref()
	}

	pub fn process_pyramid(&self) -> &TilePyramid {
		&self.process_pyramid
	}

	pub fn output_pyramid(&self) -> &TilePyramid {
		&self.output_pyramid
	}

	pub fn baselevel_pyramid(&self) -> Option<&TilePyramid> {
		self.baselevel_pyramid.as_ref()
	}

	pub fn crs(&self) -> Crs {
		self.process_pyramid.grid.crs()
	}

	pub fn inputs(&self) -> &Arc<[Arc<dyn Input>]> {
		&self.inputs
	}

	pub fn output(&self) -> &O {
		&self.output
	}

	/// Area of interest at `zoom`: the configured area clipped to the bounds and to the
	/// union of the input areas. Inputs without an area do not restrict it.
	pub fn area_at_zoom(&self, zoom: u8) -> Arc<MultiPolygon<f64>> {
		if let Some(area) = self.area_at_zoom.lock().get(&zoom) {
			return Arc::clone(area);
		}

		let mut input_areas = Vec::with_capacity(self.inputs.len());
		for input in self.inputs.iter() {
			match input.area(zoom) {
				Some(area) => input_areas.push(area),
				None => {
					input_areas.clear();
					break;
				}
			}
		}
		let restricted = input_areas.len() == self.inputs.len() && !input_areas.is_empty();
		let area = if restricted {
			let union = input_areas
				.into_iter()
				.reduce(|a, b| a.union(&b))
				.unwrap_or_else(|| MultiPolygon::new(Vec::new()));
			self.area.intersection(&union)
		} else {
			self.area.clone()
		};

		let area = Arc::new(area);
		self.area_at_zoom.lock().insert(zoom, Arc::clone(&area));
		area
	}

	/// Bounding box of the area of interest at `zoom`, or `None` if it is empty.
	pub fn bounds_at_zoom(&self, zoom: u8) -> Option<Bounds> {
		self.area_at_zoom(zoom).bounding_rect().map(Bounds::from)
	}

	/// Bounds of the whole run: the configured bounds or the bounding box of the area.
	pub fn bounds(&self) -> Bounds {
		self
			.params
			.bounds
			.or_else(|| self.area.bounding_rect().map(Bounds::from))
			.unwrap_or_else(|| self.process_pyramid.grid.bounds())
	}

	/// Process tiles at `zoom` covering the area of interest, or nothing if `zoom` is not configured.
	pub fn process_tiles_at(&self, zoom: u8) -> Vec<Tile> {
		if !self.params.zoom_levels.contains(zoom) {
			return Vec::new();
		}
		self.process_pyramid.tiles_from_geom(&self.area_at_zoom(zoom), zoom)
	}

	/// Returns the memoized tile count for `(min, max)`, computing it with `count` on first use.
	pub(crate) fn tile_count(&self, min: u8, max: u8, count: impl FnOnce() -> u64) -> u64 {
		if let Some(count) = self.tile_counts.lock().get(&(min, max)) {
			return *count;
		}
		let value = count();
		*self.tile_counts.lock().entry((min, max)).or_insert(value)
	}
}
