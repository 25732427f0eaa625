//! Gateway configuration: rate-limit window, cache TTL, signing secret, and backend targets.
//!
//! Configuration is loaded once at startup, either programmatically through
//! [`GatewayConfig::builder`] or from JSON via [`GatewayConfig::from_json_str`], and is immutable
//! afterwards. Both paths run the same validation.

// self
use crate::{
	_prelude::*,
	auth::{SigningKey, TokenService},
	cache::ResponseCache,
	dispatch::BackendTarget,
	error::ConfigError,
	rate_limit::RateLimiter,
};

/// Upper bound for every duration setting; keeps timestamp arithmetic in range.
pub const MAX_DURATION: Duration = Duration::days(366);

/// Fixed-window rate-limit settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
	/// Window length.
	pub window: Duration,
	/// Maximum requests per client within one window.
	pub max_requests: u32,
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self { window: RateLimiter::DEFAULT_WINDOW, max_requests: RateLimiter::DEFAULT_MAX_REQUESTS }
	}
}

/// Response cache settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
	/// Time-to-live for cached responses.
	pub ttl: Duration,
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self { ttl: ResponseCache::DEFAULT_TTL }
	}
}

/// Token signing settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
	/// HMAC secret used to sign and verify tokens.
	pub signing_key: SigningKey,
	/// Lifetime embedded in issued claims.
	pub token_lifetime: Duration,
}

/// Validated gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
	/// Rate-limit settings.
	pub rate_limit: RateLimitConfig,
	/// Cache settings.
	pub cache: CacheConfig,
	/// Token settings.
	pub auth: AuthConfig,
	/// Dispatch targets in rotation order; may be empty.
	pub backends: Vec<BackendTarget>,
}
impl GatewayConfig {
	/// Creates a builder seeded with the provided signing key and default settings.
	pub fn builder(signing_key: SigningKey) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(signing_key)
	}

	/// Parses and validates a JSON document.
	///
	/// ```json
	/// {
	///   "rate_limit": { "window_secs": 900, "max_requests": 100 },
	///   "cache": { "ttl_secs": 60 },
	///   "auth": { "signing_secret": "change-me", "token_lifetime_secs": 3600 },
	///   "backends": ["http://backend1.example.com", "http://backend2.example.com"]
	/// }
	/// ```
	///
	/// Only `auth.signing_secret` is required; other settings fall back to their defaults.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let document: ConfigDocument =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_str(raw))?;

		document.into_builder().build()
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	rate_limit: RateLimitConfig,
	cache: CacheConfig,
	signing_key: SigningKey,
	token_lifetime: Duration,
	backends: Vec<Url>,
}
impl GatewayConfigBuilder {
	fn new(signing_key: SigningKey) -> Self {
		Self {
			rate_limit: RateLimitConfig::default(),
			cache: CacheConfig::default(),
			signing_key,
			token_lifetime: TokenService::DEFAULT_LIFETIME,
			backends: Vec::new(),
		}
	}

	/// Sets the rate-limit window and per-window maximum.
	pub fn rate_limit(mut self, window: Duration, max_requests: u32) -> Self {
		self.rate_limit = RateLimitConfig { window, max_requests };

		self
	}

	/// Sets the cache TTL.
	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache = CacheConfig { ttl };

		self
	}

	/// Sets the lifetime of issued tokens.
	pub fn token_lifetime(mut self, lifetime: Duration) -> Self {
		self.token_lifetime = lifetime;

		self
	}

	/// Appends a backend target.
	pub fn backend(mut self, url: Url) -> Self {
		self.backends.push(url);

		self
	}

	/// Appends several backend targets, preserving order.
	pub fn backends(mut self, urls: impl IntoIterator<Item = Url>) -> Self {
		self.backends.extend(urls);

		self
	}

	/// Validates the settings and produces a [`GatewayConfig`].
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		if self.signing_key.is_empty() {
			return Err(ConfigError::EmptySigningSecret);
		}
		if self.rate_limit.max_requests == 0 {
			return Err(ConfigError::ZeroRateLimit);
		}

		validate_duration("rate_limit.window", self.rate_limit.window)?;
		validate_duration("cache.ttl", self.cache.ttl)?;
		validate_duration("auth.token_lifetime", self.token_lifetime)?;

		let backends = self
			.backends
			.into_iter()
			.map(|url| match url.scheme() {
				"http" | "https" => Ok(BackendTarget::new(url)),
				_ => Err(ConfigError::UnsupportedBackendScheme { url: url.to_string() }),
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(GatewayConfig {
			rate_limit: self.rate_limit,
			cache: self.cache,
			auth: AuthConfig { signing_key: self.signing_key, token_lifetime: self.token_lifetime },
			backends,
		})
	}
}

pub(crate) fn validate_duration(setting: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() && value <= MAX_DURATION {
		Ok(())
	} else {
		Err(ConfigError::DurationOutOfRange { setting, max: MAX_DURATION })
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
	#[serde(default)]
	rate_limit: Option<RateLimitDocument>,
	#[serde(default)]
	cache: Option<CacheDocument>,
	auth: AuthDocument,
	#[serde(default)]
	backends: Vec<Url>,
}
impl ConfigDocument {
	fn into_builder(self) -> GatewayConfigBuilder {
		let mut builder = GatewayConfig::builder(SigningKey::new(self.auth.signing_secret))
			.backends(self.backends);

		if let Some(rate_limit) = self.rate_limit {
			let defaults = RateLimitConfig::default();

			builder = builder.rate_limit(
				rate_limit.window_secs.map_or(defaults.window, Duration::seconds),
				rate_limit.max_requests.unwrap_or(defaults.max_requests),
			);
		}
		if let Some(ttl_secs) = self.cache.and_then(|cache| cache.ttl_secs) {
			builder = builder.cache_ttl(Duration::seconds(ttl_secs));
		}
		if let Some(lifetime_secs) = self.auth.token_lifetime_secs {
			builder = builder.token_lifetime(Duration::seconds(lifetime_secs));
		}

		builder
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RateLimitDocument {
	window_secs: Option<i64>,
	max_requests: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheDocument {
	ttl_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthDocument {
	signing_secret: String,
	token_lifetime_secs: Option<i64>,
}
