//! Tasks and their ordering into batches.

mod batcher;
pub use batcher::*;

mod definition;
pub use definition::*;
