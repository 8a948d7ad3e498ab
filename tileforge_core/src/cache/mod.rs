mod tile_cache;

pub use tile_cache::{CacheStats, SharedError, TileCache};
