//! Core building blocks of tileforge: tile pyramids, tile indices and the single-flight tile cache.
//!
//! The orchestration layer in the `tileforge` crate builds on these types; nothing in here
//! knows about process modes, outputs or executors.

pub mod cache;
pub use cache::*;

mod concurrency;
pub use concurrency::*;

pub mod types;
pub use types::*;
