// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe hit/miss counters for the response cache.
#[derive(Debug, Default)]
pub struct CacheStats {
	hits: AtomicU64,
	misses: AtomicU64,
}
impl CacheStats {
	/// Returns the number of lookups served from a fresh entry.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups that found no fresh entry.
	pub fn misses(&self) -> u64 {
		self.misses.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}
}
