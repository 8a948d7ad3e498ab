use super::Input;
use anyhow::Result;
use std::sync::Arc;
use tileforge_core::{Tile, TilePyramid};

/// Everything the user process sees while computing one process tile.
#[derive(Clone)]
pub struct ProcessContext {
	tile: Tile,
	inputs: Arc<[Arc<dyn Input>]>,
	output_pyramid: TilePyramid,
}

impl ProcessContext {
	pub(crate) fn new(tile: Tile, inputs: Arc<[Arc<dyn Input>]>, output_pyramid: TilePyramid) -> Self {
		ProcessContext {
			tile,
			inputs,
			output_pyramid,
		}
	}

	/// The process tile being computed.
	pub fn tile(&self) -> &Tile {
		&self.tile
	}

	pub fn inputs(&self) -> &[Arc<dyn Input>] {
		&self.inputs
	}

	/// Looks up an input by name.
	pub fn input(&self, name: &str) -> Option<&Arc<dyn Input>> {
		self.inputs.iter().find(|input| input.name() == name)
	}

	pub fn output_pyramid(&self) -> &TilePyramid {
		&self.output_pyramid
	}
}

/// The user computation run for every process tile.
///
/// Returning `Ok(None)` marks the tile as empty ("no data"). Any `Fn(&ProcessContext)`
/// with a matching return type implements this trait.
pub trait TileProcess<D>: Send + Sync {
	fn process(&self, context: &ProcessContext) -> Result<Option<D>>;
}

impl<D, F> TileProcess<D> for F
where
	F: Fn(&ProcessContext) -> Result<Option<D>> + Send + Sync,
{
	fn process(&self, context: &ProcessContext) -> Result<Option<D>> {
		self(context)
	}
}
