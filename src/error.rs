//! Gateway-level error types shared across pipeline stages, configuration, and identifiers.

// self
use crate::{_prelude::*, rate_limit::RetryDirective};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Terminal failure raised by a pipeline stage.
///
/// Every variant maps to a fixed status code and caller-facing message through
/// [`Error::status`] and [`Error::public_message`]; the `Display` output is meant for logs only.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Response payload could not be encoded.
	#[error("Response payload could not be encoded.")]
	Encoding(#[from] serde_json::Error),

	/// Login requested for a username the identity registry does not know.
	#[error("Subject is not registered: {username}.")]
	UnknownSubject {
		/// Username supplied by the caller.
		username: String,
	},
	/// Protected route called without a bearer token.
	#[error("Bearer token is missing.")]
	MissingToken,
	/// Token is malformed or its signature does not verify.
	#[error("Token is invalid: {reason}.")]
	InvalidToken {
		/// Which check rejected the token.
		reason: &'static str,
	},
	/// Token signature verified but its expiry has passed.
	#[error("Token expired at {expired_at}.")]
	ExpiredToken {
		/// Expiry instant embedded in the claim.
		expired_at: OffsetDateTime,
	},
	/// Verified role does not satisfy the route's requirement.
	#[error("Role `{actual}` lacks access; `{required}` is required.")]
	Forbidden {
		/// Role the route requires.
		required: String,
		/// Role carried by the verified claim.
		actual: String,
	},
	/// Client exceeded its request budget for the current window.
	#[error("Rate limit exceeded; retry in {}s.", .0.retry_after_secs())]
	RateLimited(RetryDirective),
	/// Dispatch requested while no backend targets are configured.
	#[error("No backend targets are configured.")]
	NoBackends,
	/// Request body could not be parsed for the route.
	#[error("Malformed request: {reason}.")]
	MalformedRequest {
		/// Parser-supplied description.
		reason: String,
	},
	/// No route matches the request method and path.
	#[error("No route for {method} {path}.")]
	RouteNotFound {
		/// Request method.
		method: String,
		/// Request path.
		path: String,
	},
}
impl Error {
	/// HTTP status code surfaced to the caller.
	pub const fn status(&self) -> u16 {
		match self {
			Error::Config(_) | Error::Encoding(_) => 500,
			Error::UnknownSubject { .. } | Error::RouteNotFound { .. } => 404,
			Error::MissingToken => 401,
			Error::InvalidToken { .. } | Error::ExpiredToken { .. } | Error::Forbidden { .. } =>
				403,
			Error::RateLimited(_) => 429,
			Error::NoBackends => 503,
			Error::MalformedRequest { .. } => 400,
		}
	}

	/// Fixed caller-facing message; never includes internal detail.
	///
	/// Expired and invalid tokens share a message so callers cannot probe which check failed.
	pub const fn public_message(&self) -> &'static str {
		match self {
			Error::Config(_) | Error::Encoding(_) => "Internal server error",
			Error::UnknownSubject { .. } => "User not found",
			Error::MissingToken => "Token required",
			Error::InvalidToken { .. } | Error::ExpiredToken { .. } => "Invalid token",
			Error::Forbidden { .. } => "Access denied",
			Error::RateLimited(_) => "Too many requests, please try again later.",
			Error::NoBackends => "No backend servers available",
			Error::MalformedRequest { .. } => "Malformed request",
			Error::RouteNotFound { .. } => "Not found",
		}
	}

	/// Stable label suitable for span or metric fields.
	pub const fn label(&self) -> &'static str {
		match self {
			Error::Config(_) => "config",
			Error::Encoding(_) => "encoding",
			Error::UnknownSubject { .. } => "unknown_subject",
			Error::MissingToken => "missing_token",
			Error::InvalidToken { .. } => "invalid_token",
			Error::ExpiredToken { .. } => "expired_token",
			Error::Forbidden { .. } => "forbidden",
			Error::RateLimited(_) => "rate_limited",
			Error::NoBackends => "no_backends",
			Error::MalformedRequest { .. } => "malformed_request",
			Error::RouteNotFound { .. } => "route_not_found",
		}
	}
}

/// Configuration and validation failures raised while assembling the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// JSON configuration could not be parsed.
	#[error("Configuration is not valid JSON at `{}`.", .source.path())]
	Parse {
		/// Structured parsing failure including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Signing secret is empty.
	#[error("Signing secret cannot be empty.")]
	EmptySigningSecret,
	/// A duration setting was non-positive or too large to add to a timestamp safely.
	#[error("The {setting} setting must be positive and at most {max}.")]
	DurationOutOfRange {
		/// Setting name.
		setting: &'static str,
		/// Largest accepted value.
		max: Duration,
	},
	/// Rate-limit maximum was zero.
	#[error("The rate-limit maximum must allow at least one request per window.")]
	ZeroRateLimit,
	/// Backend target uses a scheme other than http/https.
	#[error("Backend target must use http or https: {url}.")]
	UnsupportedBackendScheme {
		/// Rejected target URL.
		url: String,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(source: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { source }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn public_mapping_hides_internal_detail() {
		let forbidden = Error::Forbidden { required: "admin".into(), actual: "viewer".into() };

		assert_eq!(forbidden.status(), 403);
		assert_eq!(forbidden.public_message(), "Access denied");
		assert!(forbidden.to_string().contains("viewer"));

		let unknown = Error::UnknownSubject { username: "mallory".into() };

		assert_eq!(unknown.status(), 404);
		assert!(!unknown.public_message().contains("mallory"));
	}

	#[test]
	fn expired_and_invalid_tokens_look_identical_to_callers() {
		let invalid = Error::InvalidToken { reason: "signature mismatch" };
		let expired = Error::ExpiredToken { expired_at: OffsetDateTime::UNIX_EPOCH };

		assert_eq!(invalid.status(), expired.status());
		assert_eq!(invalid.public_message(), expired.public_message());
		assert_ne!(invalid.label(), expired.label());
	}

	#[test]
	fn config_error_converts_into_gateway_error_with_source() {
		let parse_failure = serde_path_to_error::deserialize::<_, u32>(
			&mut serde_json::Deserializer::from_str("\"nope\""),
		)
		.expect_err("A string should not deserialize into an integer.");
		let gateway_error: Error = ConfigError::from(parse_failure).into();

		assert!(matches!(gateway_error, Error::Config(ConfigError::Parse { .. })));
		assert_eq!(gateway_error.status(), 500);
		assert!(StdError::source(&gateway_error).is_some());
	}
}
