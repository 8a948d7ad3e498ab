//! Helpers shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
use tileforge::{ProcessConfig, ProcessContext, ProcessMode, ProcessParameters, Processor, testing::MemoryOutput};
use tileforge_core::{Grid, TilePyramid, ZoomLevels};

pub fn pyramid(metatiling: u8) -> TilePyramid {
	TilePyramid::new(Grid::Geodetic, metatiling, 0).unwrap()
}

pub fn params(mode: ProcessMode, min: u8, max: u8) -> ProcessParameters {
	let mut params = ProcessParameters::new(ZoomLevels::new(min, max).unwrap(), pyramid(1));
	params.mode = mode;
	params
}

/// Counts how often the process ran.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
	pub fn get(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}

	pub fn inc(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

/// A processor labelling every process tile with its index.
pub fn labelling(params: ProcessParameters, output: MemoryOutput, calls: &Calls) -> Result<Arc<Processor<MemoryOutput>>> {
	let calls = calls.clone();
	let config = ProcessConfig::new(params, None, vec![], output)?;
	Ok(Arc::new(Processor::new(
		config,
		move |ctx: &ProcessContext| -> Result<Option<Vec<String>>> {
			calls.inc();
			Ok(Some(vec![ctx.tile().to_string()]))
		},
	)))
}

pub fn labels(labels: &[&str]) -> Vec<String> {
	labels.iter().map(ToString::to_string).collect()
}
