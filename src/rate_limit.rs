//! Fixed-window request budgeting keyed by caller.
//!
//! Each [`ClientKey`] owns one [`RateWindow`]. The first request after a window elapses opens a
//! fresh window with a count of one; later requests in the same window increment the count and
//! are allowed while it stays within the configured maximum. Denied requests still count, so a
//! client hammering a closed window never reopens it early. All records live behind a single
//! lock, which serializes increments and rules out lost updates.
//!
//! Window boundaries are not smoothed: a client can spend its full budget at the end of one
//! window and again at the start of the next.

// self
use crate::{
	_prelude::*,
	auth::ClientKey,
	clock::Clock,
	config,
	error::ConfigError,
};

/// Counter state for a single client key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateWindow {
	/// Instant the current window opened.
	pub started_at: OffsetDateTime,
	/// Requests observed since `started_at`, including denied ones.
	pub count: u32,
}
impl RateWindow {
	fn open(now: OffsetDateTime) -> Self {
		Self { started_at: now, count: 1 }
	}

	/// Instant the window closes.
	pub fn resets_at(&self, length: Duration) -> OffsetDateTime {
		self.started_at + length
	}

	/// Returns `true` once `now` reaches the end of the window.
	pub fn is_elapsed_at(&self, length: Duration, now: OffsetDateTime) -> bool {
		now >= self.resets_at(length)
	}
}

/// Result of asking the limiter whether a request may proceed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed; carries the remaining budget.
	Allow(RateLimitQuota),
	/// The request is over budget until the window resets.
	Deny(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow(_))
	}

	/// Converts a denial into [`Error::RateLimited`].
	pub fn into_result(self) -> Result<RateLimitQuota> {
		match self {
			Self::Allow(quota) => Ok(quota),
			Self::Deny(directive) => Err(Error::RateLimited(directive)),
		}
	}
}

/// Budget snapshot reported alongside an allowed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitQuota {
	/// Maximum requests per window.
	pub limit: u32,
	/// Requests still allowed in the current window.
	pub remaining: u32,
	/// Instant the current window closes.
	pub reset_at: OffsetDateTime,
}

/// Advises callers when to retry after a [`RateLimitDecision::Deny`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left in the current window.
	pub retry_after: Duration,
	/// Maximum requests per window.
	pub limit: u32,
}
impl RetryDirective {
	/// Retry hint in whole seconds, rounded up so callers never retry early.
	pub fn retry_after_secs(&self) -> i64 {
		let secs = self.retry_after.whole_seconds();

		if self.retry_after.subsec_nanoseconds() > 0 { secs + 1 } else { secs }
	}
}

/// Per-client fixed-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
	window: Duration,
	max_requests: u32,
	clock: Arc<dyn Clock>,
	records: Arc<Mutex<HashMap<ClientKey, RateWindow>>>,
}
impl RateLimiter {
	/// Default window length.
	pub const DEFAULT_WINDOW: Duration = Duration::minutes(15);
	/// Default maximum number of requests per window.
	pub const DEFAULT_MAX_REQUESTS: u32 = 100;

	/// Creates a limiter allowing `max_requests` per `window` for each client key.
	///
	/// The window must be positive and no longer than [`config::MAX_DURATION`], and the maximum must be
	/// non-zero.
	pub fn new(
		window: Duration,
		max_requests: u32,
		clock: Arc<dyn Clock>,
	) -> Result<Self, ConfigError> {
		config::validate_duration("rate_limit.window", window)?;

		if max_requests == 0 {
			return Err(ConfigError::ZeroRateLimit);
		}

		Ok(Self { window, max_requests, clock, records: Default::default() })
	}

	/// Window length.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Maximum requests per window.
	pub fn max_requests(&self) -> u32 {
		self.max_requests
	}

	/// Records a request from `key` at the current clock instant.
	pub fn check(&self, key: &ClientKey) -> RateLimitDecision {
		self.check_at(key, self.clock.now())
	}

	/// Records a request from `key` as if the current instant were `now`.
	pub fn check_at(&self, key: &ClientKey, now: OffsetDateTime) -> RateLimitDecision {
		let window = {
			let mut records = self.records.lock();

			match records.get_mut(key) {
				Some(record) if !record.is_elapsed_at(self.window, now) => {
					record.count = record.count.saturating_add(1);

					*record
				},
				_ => {
					let record = RateWindow::open(now);

					records.insert(key.clone(), record);

					record
				},
			}
		};
		let reset_at = window.resets_at(self.window);

		if window.count <= self.max_requests {
			RateLimitDecision::Allow(RateLimitQuota {
				limit: self.max_requests,
				remaining: self.max_requests - window.count,
				reset_at,
			})
		} else {
			RateLimitDecision::Deny(RetryDirective {
				earliest_retry_at: reset_at,
				retry_after: reset_at - now,
				limit: self.max_requests,
			})
		}
	}

	/// Boolean form of [`RateLimiter::check`].
	pub fn allow(&self, key: &ClientKey) -> bool {
		self.check(key).is_allowed()
	}

	/// Returns the current record for `key`, if any.
	pub fn window_for(&self, key: &ClientKey) -> Option<RateWindow> {
		self.records.lock().get(key).copied()
	}

	/// Drops records whose window has elapsed at `now`, returning how many were removed.
	pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
		let mut records = self.records.lock();
		let before = records.len();

		records.retain(|_, record| !record.is_elapsed_at(self.window, now));

		before - records.len()
	}

	/// Drops elapsed records using the limiter clock.
	pub fn purge_expired(&self) -> usize {
		self.purge_expired_at(self.clock.now())
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("window", &self.window)
			.field("max_requests", &self.max_requests)
			.field("tracked_clients", &self.records.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::SystemClock;

	const START: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	fn limiter(max: u32) -> RateLimiter {
		RateLimiter::new(Duration::minutes(15), max, Arc::new(SystemClock))
			.expect("Limiter fixture should be valid.")
	}

	fn client(value: &str) -> ClientKey {
		ClientKey::new(value).expect("Client fixture should be valid.")
	}

	#[test]
	fn allows_up_to_max_then_denies_with_remaining_window() {
		let limiter = limiter(3);
		let key = client("10.0.0.1");

		for expected_remaining in [2, 1, 0] {
			let decision = limiter.check_at(&key, START + Duration::minutes(1));

			assert_eq!(
				decision,
				RateLimitDecision::Allow(RateLimitQuota {
					limit: 3,
					remaining: expected_remaining,
					reset_at: START + Duration::minutes(16),
				})
			);
		}

		let denied = limiter.check_at(&key, START + Duration::minutes(5));

		assert_eq!(
			denied,
			RateLimitDecision::Deny(RetryDirective {
				earliest_retry_at: START + Duration::minutes(16),
				retry_after: Duration::minutes(11),
				limit: 3,
			})
		);
	}

	#[test]
	fn window_resets_after_length_elapses() {
		let limiter = limiter(1);
		let key = client("10.0.0.2");

		assert!(limiter.check_at(&key, START).is_allowed());
		assert!(!limiter.check_at(&key, START + Duration::minutes(14)).is_allowed());
		assert!(limiter.check_at(&key, START + Duration::minutes(15)).is_allowed());
		assert_eq!(
			limiter.window_for(&key),
			Some(RateWindow { started_at: START + Duration::minutes(15), count: 1 })
		);
	}

	#[test]
	fn clients_are_independent() {
		let limiter = limiter(1);

		assert!(limiter.check_at(&client("a"), START).is_allowed());
		assert!(limiter.check_at(&client("b"), START).is_allowed());
		assert!(!limiter.check_at(&client("a"), START).is_allowed());
	}

	#[test]
	fn denied_requests_keep_counting() {
		let limiter = limiter(1);
		let key = client("10.0.0.3");

		for _ in 0..4 {
			limiter.check_at(&key, START);
		}

		assert_eq!(limiter.window_for(&key).map(|window| window.count), Some(4));
	}

	#[test]
	fn retry_hint_rounds_up_partial_seconds() {
		let directive = RetryDirective {
			earliest_retry_at: START,
			retry_after: Duration::milliseconds(1_500),
			limit: 1,
		};

		assert_eq!(directive.retry_after_secs(), 2);
		assert!(matches!(
			RateLimitDecision::Deny(directive).into_result(),
			Err(Error::RateLimited(_))
		));
	}

	#[test]
	fn constructor_rejects_unusable_settings() {
		let clock = || Arc::new(SystemClock) as Arc<dyn Clock>;

		assert!(matches!(
			RateLimiter::new(Duration::minutes(15), 0, clock()),
			Err(ConfigError::ZeroRateLimit)
		));
		assert!(matches!(
			RateLimiter::new(Duration::ZERO, 10, clock()),
			Err(ConfigError::DurationOutOfRange { setting: "rate_limit.window", .. })
		));
		assert!(matches!(
			RateLimiter::new(Duration::MAX, 10, clock()),
			Err(ConfigError::DurationOutOfRange { .. })
		));
		assert!(RateLimiter::new(config::MAX_DURATION, 10, clock()).is_ok());
	}

	#[test]
	fn purge_drops_only_elapsed_windows() {
		let limiter = limiter(5);

		limiter.check_at(&client("old"), START);
		limiter.check_at(&client("new"), START + Duration::minutes(10));

		assert_eq!(limiter.purge_expired_at(START + Duration::minutes(20)), 1);
		assert!(limiter.window_for(&client("old")).is_none());
		assert!(limiter.window_for(&client("new")).is_some());
	}
}
