use super::{CatalogSummary, Processor};
use crate::traits::Output;
use anyhow::{Context, Result, anyhow};
use std::sync::atomic::Ordering;

impl<O: Output> Processor<O> {
	/// Ends the run and releases inputs and output.
	///
	/// `error` is the error the run ended with, if any. After a successful run in a writing
	/// mode the catalog summary is written first. Inputs are always cleaned up, the output
	/// is always closed and the cache is emptied. Only the first call has an effect.
	pub fn close(&self, error: Option<&anyhow::Error>) -> Result<()> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		match error {
			Some(err) => log::debug!("closing processor after error: {err:#}"),
			None => log::debug!("closing processor"),
		}

		let mut failure = None;
		let output = self.config.output();
		if error.is_none() && self.mode().can_write() {
			let summary = CatalogSummary {
				zoom_levels: self.config.zoom_levels(),
				bounds: self.config.bounds(),
				crs: self.config.crs(),
			};
			log::debug!("writing catalog {summary:?}");
			if let Err(err) = output.write_catalog(&summary).context("Failed to write catalog") {
				failure = Some(err);
			}
		}

		for input in self.config.inputs().iter() {
			if let Err(err) = input.cleanup() {
				log::warn!("failed to clean up input {}: {err:#}", input.name());
			}
		}

		if let Err(err) = output.close(error).context("Failed to close output") {
			failure.get_or_insert(err);
		}
		self.cache.clear();

		failure.map_or(Ok(()), Err)
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Runs `f` and closes the processor with its outcome.
	///
	/// An error of `f` takes precedence over an error while closing.
	pub fn scoped<T, F>(&self, f: F) -> Result<T>
	where
		F: FnOnce(&Self) -> Result<T>,
	{
		let result = f(self);
		let closed = self.close(result.as_ref().err());
		match result {
			Ok(value) => closed.map(|()| value),
			Err(err) => {
				if let Err(close_err) = closed {
					log::warn!("{close_err:#}");
				}
				Err(err)
			}
		}
	}
}

impl<O: Output> Drop for Processor<O> {
	fn drop(&mut self) {
		if self.is_closed() {
			return;
		}
		let result = if std::thread::panicking() {
			self.close(Some(&anyhow!("processor dropped while panicking")))
		} else {
			self.close(None)
		};
		if let Err(err) = result {
			log::warn!("{err:#}");
		}
	}
}
