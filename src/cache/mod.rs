//! Result Caching
//!
//! Provides caching for:
//! - Per-session query results (local cache, owned by one executor)
//! - Cross-session query results (shared cache, per statement namespace)
//!
//! ## Layers
//!
//! ```text
//! CachingExecutor ── TransactionalCacheManager ── SharedCache (LRU + TTL)
//!        │
//!     Executor ── LocalCache (InFlight | Resolved, output snapshots)
//! ```

pub mod key;
pub mod local;
pub mod shared;
pub mod transactional;

pub use key::{build_cache_key, CacheKey};
pub use local::{CacheSlot, LocalCache, OutputSnapshot};
pub use shared::{CacheStats, SharedCache};
pub use transactional::{TransactionalCache, TransactionalCacheManager};
