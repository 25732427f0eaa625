//! TTL-keyed response cache with lazy expiry and per-key single-flight computation.
//!
//! Entries are visible while `now - inserted_at < ttl`; anything older is treated as absent on
//! the next lookup whether or not [`ResponseCache::purge_expired`] has run.
//! [`ResponseCache::get_or_insert_with`] serializes misses for the same key behind a per-key
//! guard, so simultaneous requests for a cold key run the underlying computation once and the
//! rest observe the stored value.

mod stats;

pub use stats::CacheStats;

// self
use crate::{
	_prelude::*,
	clock::Clock,
	config::{self, MAX_DURATION},
	error::ConfigError,
};

/// Cache key derived from a route path plus its full query string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);
impl CacheKey {
	/// Builds the key for `path` and an optional raw query string.
	///
	/// An empty query maps to the bare path, so `/data` and `/data?` share an entry while
	/// `/data?page=1` and `/data?page=2` never collide.
	pub fn new(path: &str, query: Option<&str>) -> Self {
		match query.filter(|query| !query.is_empty()) {
			Some(query) => Self(format!("{path}?{query}")),
			None => Self(path.to_owned()),
		}
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Stored payload plus its freshness metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	/// Cached payload.
	pub value: Value,
	/// Instant the entry was stored.
	pub inserted_at: OffsetDateTime,
	/// Time-to-live measured from `inserted_at`.
	pub ttl: Duration,
}
impl CacheEntry {
	/// Instant the entry stops being visible.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.inserted_at + self.ttl
	}

	/// Returns `true` while the entry is still visible at `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
		now - self.inserted_at < self.ttl
	}
}

/// Outcome of a cache lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup {
	/// A fresh entry was found.
	Hit(Value),
	/// No fresh entry exists.
	Miss,
}
impl CacheLookup {
	/// Returns `true` for [`CacheLookup::Hit`].
	pub fn is_hit(&self) -> bool {
		matches!(self, Self::Hit(_))
	}

	/// Returns the cached value, if any.
	pub fn into_value(self) -> Option<Value> {
		match self {
			Self::Hit(value) => Some(value),
			Self::Miss => None,
		}
	}
}

/// Whether [`ResponseCache::get_or_insert_with`] served a stored value or computed a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
	/// Served from a fresh entry; the computation did not run.
	Hit,
	/// Computed and stored.
	Miss,
}
impl CacheStatus {
	/// Returns a stable label suitable for headers and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheStatus::Hit => "HIT",
			CacheStatus::Miss => "MISS",
		}
	}
}

type EntryMap = Arc<RwLock<HashMap<CacheKey, CacheEntry>>>;
type FlightMap = Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>;

/// Thread-safe in-memory response cache.
#[derive(Clone)]
pub struct ResponseCache {
	entries: EntryMap,
	flights: FlightMap,
	default_ttl: Duration,
	clock: Arc<dyn Clock>,
	stats: Arc<CacheStats>,
}
impl ResponseCache {
	/// Default time-to-live for stored responses.
	pub const DEFAULT_TTL: Duration = Duration::seconds(60);

	/// Creates an empty cache whose convenience helpers use `default_ttl`.
	///
	/// The default TTL must be positive and no longer than [`MAX_DURATION`].
	pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
		config::validate_duration("cache.ttl", default_ttl)?;

		Ok(Self {
			entries: Default::default(),
			flights: Default::default(),
			default_ttl,
			clock,
			stats: Default::default(),
		})
	}

	/// TTL applied by [`ResponseCache::get_or_insert_with`] callers that do not override it.
	pub fn default_ttl(&self) -> Duration {
		self.default_ttl
	}

	/// Shared hit/miss counters.
	pub fn stats(&self) -> &CacheStats {
		&self.stats
	}

	/// Looks up `key` at the cache clock instant.
	pub fn get(&self, key: &CacheKey) -> CacheLookup {
		self.get_at(key, self.clock.now())
	}

	/// Looks up `key` as if the current instant were `now`.
	///
	/// A stale entry is reported as a miss and dropped.
	pub fn get_at(&self, key: &CacheKey, now: OffsetDateTime) -> CacheLookup {
		let lookup = self.lookup_at(key, now);

		match lookup {
			CacheLookup::Hit(_) => self.stats.record_hit(),
			CacheLookup::Miss => self.stats.record_miss(),
		}

		lookup
	}

	fn lookup_at(&self, key: &CacheKey, now: OffsetDateTime) -> CacheLookup {
		let found = self
			.entries
			.read()
			.get(key)
			.map(|entry| entry.is_fresh_at(now).then(|| entry.value.clone()));

		match found {
			Some(Some(value)) => CacheLookup::Hit(value),
			Some(None) => {
				self.evict_if_stale(key, now);

				CacheLookup::Miss
			},
			None => CacheLookup::Miss,
		}
	}

	/// Stores `value` under `key` at the cache clock instant.
	pub fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
		self.put_at(key, value, ttl, self.clock.now());
	}

	/// Stores `value` under `key` as if the current instant were `now`.
	///
	/// Non-positive TTLs would never be visible, so they are ignored. Longer TTLs are capped at
	/// [`MAX_DURATION`].
	pub fn put_at(&self, key: CacheKey, value: Value, ttl: Duration, now: OffsetDateTime) {
		if !ttl.is_positive() {
			return;
		}

		let ttl = ttl.min(MAX_DURATION);

		self.entries.write().insert(key, CacheEntry { value, inserted_at: now, ttl });
	}

	/// Returns the fresh value for `key`, or runs `compute` and stores its result.
	///
	/// Concurrent callers for the same key wait on a shared guard; the first one computes and
	/// the rest re-check the cache once it is released. A failed computation stores nothing and
	/// its error is returned to that caller only. Each call records exactly one hit or miss, and
	/// only callers that run `compute` count as misses.
	pub async fn get_or_insert_with<F, Fut>(
		&self,
		key: CacheKey,
		ttl: Duration,
		compute: F,
	) -> Result<(Value, CacheStatus)>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Value>>,
	{
		if let CacheLookup::Hit(value) = self.lookup_at(&key, self.clock.now()) {
			self.stats.record_hit();

			return Ok((value, CacheStatus::Hit));
		}

		let guard = self.flight_guard(&key);
		let result = {
			let _singleflight = guard.lock().await;

			// A leader may have filled the entry while this caller waited.
			match self.lookup_at(&key, self.clock.now()) {
				CacheLookup::Hit(value) => {
					self.stats.record_hit();

					Ok((value, CacheStatus::Hit))
				},
				CacheLookup::Miss => {
					self.stats.record_miss();

					compute().await.map(|value| {
						self.put(key.clone(), value.clone(), ttl);

						(value, CacheStatus::Miss)
					})
				},
			}
		};

		self.release_flight_guard(&key, &guard);

		result
	}

	/// Removes every stale entry at `now`, returning how many were dropped.
	pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|_, entry| entry.is_fresh_at(now));

		before - entries.len()
	}

	/// Removes stale entries using the cache clock.
	pub fn purge_expired(&self) -> usize {
		self.purge_expired_at(self.clock.now())
	}

	/// Number of stored entries, including stale ones not yet purged.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn evict_if_stale(&self, key: &CacheKey, now: OffsetDateTime) {
		let mut entries = self.entries.write();

		if entries.get(key).is_some_and(|entry| !entry.is_fresh_at(now)) {
			entries.remove(key);
		}
	}

	fn flight_guard(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		let mut flights = self.flights.lock();

		flights.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_flight_guard(&self, key: &CacheKey, guard: &Arc<AsyncMutex<()>>) {
		let mut flights = self.flights.lock();

		// Only the map and this caller hold the guard, so no one else is queued on it.
		if Arc::strong_count(guard) == 2 {
			flights.remove(key);
		}
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseCache")
			.field("entries", &self.len())
			.field("default_ttl", &self.default_ttl)
			.field("stats", &self.stats)
			.finish()
	}
}
