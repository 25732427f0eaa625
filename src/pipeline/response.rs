//! Terminal responses produced by the pipeline.

// self
use crate::{
	_prelude::*,
	rate_limit::{RateLimitQuota, RetryDirective},
};

/// Status, headers, and JSON body handed back to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: BTreeMap<String, String>,
	/// JSON body.
	pub body: Value,
}
impl GatewayResponse {
	/// Creates a response with the given status and body.
	pub fn json(status: u16, body: Value) -> Self {
		Self { status, headers: BTreeMap::new(), body }
	}

	/// Creates a `200` response.
	pub fn ok(body: Value) -> Self {
		Self::json(200, body)
	}

	/// Maps an error to its fixed status and `{ "error": message }` body.
	///
	/// This is the only path from an [`Error`] to the wire, so internal detail never leaks.
	pub fn from_error(error: &Error) -> Self {
		let response =
			Self::json(error.status(), serde_json::json!({ "error": error.public_message() }));

		match error {
			Error::RateLimited(directive) => response.with_retry_headers(directive),
			_ => response,
		}
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_owned(), value.into());

		self
	}

	/// Attaches `RateLimit-*` headers for an allowed request observed at `now`.
	pub fn with_quota_headers(self, quota: &RateLimitQuota, now: OffsetDateTime) -> Self {
		self.with_header("RateLimit-Limit", quota.limit.to_string())
			.with_header("RateLimit-Remaining", quota.remaining.to_string())
			.with_header("RateLimit-Reset", ceil_seconds(quota.reset_at - now).to_string())
	}

	/// Case-sensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).map(String::as_str)
	}

	fn with_retry_headers(self, directive: &RetryDirective) -> Self {
		let retry_after = directive.retry_after_secs().to_string();

		self.with_header("Retry-After", retry_after.clone())
			.with_header("RateLimit-Limit", directive.limit.to_string())
			.with_header("RateLimit-Remaining", "0")
			.with_header("RateLimit-Reset", retry_after)
	}
}

fn ceil_seconds(delta: Duration) -> i64 {
	let secs = delta.whole_seconds().max(0);

	if delta.is_positive() && delta.subsec_nanoseconds() > 0 { secs + 1 } else { secs }
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const NOW: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	#[test]
	fn errors_map_to_public_bodies() {
		let response = GatewayResponse::from_error(&Error::Forbidden {
			required: "admin".into(),
			actual: "viewer".into(),
		});

		assert_eq!(response.status, 403);
		assert_eq!(response.body, serde_json::json!({ "error": "Access denied" }));
		assert!(response.headers.is_empty());
	}

	#[test]
	fn rate_limited_responses_carry_retry_headers() {
		let response = GatewayResponse::from_error(&Error::RateLimited(RetryDirective {
			earliest_retry_at: NOW + Duration::seconds(90),
			retry_after: Duration::milliseconds(89_100),
			limit: 100,
		}));

		assert_eq!(response.status, 429);
		assert_eq!(response.header("Retry-After"), Some("90"));
		assert_eq!(response.header("RateLimit-Remaining"), Some("0"));
		assert_eq!(
			response.body,
			serde_json::json!({ "error": "Too many requests, please try again later." })
		);
	}

	#[test]
	fn quota_headers_report_remaining_budget() {
		let response = GatewayResponse::ok(Value::Null).with_quota_headers(
			&RateLimitQuota { limit: 100, remaining: 99, reset_at: NOW + Duration::minutes(15) },
			NOW,
		);

		assert_eq!(response.header("RateLimit-Limit"), Some("100"));
		assert_eq!(response.header("RateLimit-Remaining"), Some("99"));
		assert_eq!(response.header("RateLimit-Reset"), Some("900"));
	}
}
