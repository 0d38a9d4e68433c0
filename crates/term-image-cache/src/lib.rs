//! Bounded search-term to image-file cache with FIFO eviction
//!
//! Maps normalized search terms to the on-disk paths of previously fetched
//! images. The cache holds paths, not bytes; callers validate that a path
//! still resolves to readable data and invalidate the entry when it does
//! not. When the entry count reaches capacity, a fixed fraction of the
//! oldest-inserted entries is evicted.

mod cache;
mod types;

pub use cache::{normalize, TermImageCache, DEFAULT_CAPACITY};
pub use types::CacheStats;
