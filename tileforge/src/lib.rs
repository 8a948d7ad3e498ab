//! Orchestration of tiled geospatial processing.
//!
//! A [`Processor`] decides which tiles of a process pyramid must be computed, runs a
//! user supplied [`TileProcess`] at most once per tile at a time, writes results through
//! an [`Output`] and assembles tiles of other pyramids from them.
//!
//! ```ignore
//! let params = ProcessParameters::from_string(yaml)?;
//! let config = ProcessConfig::new(params, None, inputs, output)?;
//! let processor = Arc::new(Processor::new(config, |ctx: &ProcessContext| compute(ctx)));
//! let mut results = processor.batch_processor(BatchOptions::default())?;
//! while let Some(info) = results.next().await {
//! 	log::info!("{:?}", info?);
//! }
//! processor.close(None)?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod processor;
pub mod task;
#[cfg(any(test, feature = "test"))]
pub mod testing;
pub mod traits;

pub use config::{ProcessConfig, ProcessMode, ProcessParameters};
pub use error::ProcessError;
pub use executor::{Executor, ExecutorKind};
pub use processor::{BatchOptions, CatalogSummary, ProcessInfo, Processor};
pub use traits::{Input, Output, ProcessContext, TileProcess};
