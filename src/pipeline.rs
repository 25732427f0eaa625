//! Request pipeline composing rate limiting, authentication, caching, and dispatch.
//!
//! Every request is rate limited first since that is the cheapest rejection. The resolved
//! route then decides the remaining stages: login issues a token, protected routes verify the
//! bearer token and check its role, cached routes go through the response cache, and dispatch
//! routes select a backend target. Each stage either passes control on or short-circuits with a
//! terminal response; no stage retries another. A request abandoned by the transport keeps
//! whatever state its stages already changed, such as its rate-limit increment.

pub mod request;
pub mod response;
pub mod route;

pub use request::*;
pub use response::*;
pub use route::*;

// self
use crate::{
	_prelude::*,
	auth::{self, IdentityRegistry, Role, TokenService},
	cache::{CacheKey, CacheStatus, ResponseCache},
	clock::{Clock, SystemClock},
	config::GatewayConfig,
	error::ConfigError,
	dispatch::TargetSelector,
	obs::{self, Stage, StageOutcome, StageSpan},
	rate_limit::{RateLimitQuota, RateLimiter},
};

#[derive(Debug, Deserialize)]
struct LoginRequest {
	username: String,
}

/// Counts of stale state dropped by [`Pipeline::purge_expired`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
	/// Cache entries removed.
	pub cache_entries: usize,
	/// Rate windows removed.
	pub rate_windows: usize,
}

/// Owns every stateful stage and routes requests through them.
///
/// Cloning is cheap and clones share state, so one instance can be handed to every
/// connection handler.
#[derive(Clone)]
pub struct Pipeline {
	limiter: RateLimiter,
	tokens: TokenService,
	cache: ResponseCache,
	selector: Arc<TargetSelector>,
	routes: Arc<RouteTable>,
	clock: Arc<dyn Clock>,
}
impl Pipeline {
	/// Assembles a pipeline from configuration using the system clock.
	pub fn from_config(
		config: &GatewayConfig,
		registry: Arc<dyn IdentityRegistry>,
	) -> Result<Self, ConfigError> {
		Self::with_clock(config, registry, Arc::new(SystemClock))
	}

	/// Assembles a pipeline whose stages all observe `clock`.
	///
	/// Each stage re-validates its settings, so a hand-assembled [`GatewayConfig`] that skipped
	/// the builder is rejected here.
	pub fn with_clock(
		config: &GatewayConfig,
		registry: Arc<dyn IdentityRegistry>,
		clock: Arc<dyn Clock>,
	) -> Result<Self, ConfigError> {
		let limiter = RateLimiter::new(
			config.rate_limit.window,
			config.rate_limit.max_requests,
			clock.clone(),
		)?;
		let tokens = TokenService::new(config.auth.signing_key.clone(), registry, clock.clone())?
			.with_lifetime(config.auth.token_lifetime)?;
		let cache = ResponseCache::new(config.cache.ttl, clock.clone())?;
		let selector = Arc::new(TargetSelector::new(config.backends.iter().cloned()));

		Ok(Self { limiter, tokens, cache, selector, routes: Default::default(), clock })
	}

	/// Replaces the route table.
	pub fn with_routes(mut self, routes: RouteTable) -> Self {
		self.routes = Arc::new(routes);

		self
	}

	/// Rate-limit stage.
	pub fn limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Token stage.
	pub fn tokens(&self) -> &TokenService {
		&self.tokens
	}

	/// Cache stage.
	pub fn cache(&self) -> &ResponseCache {
		&self.cache
	}

	/// Dispatch stage.
	pub fn selector(&self) -> &TargetSelector {
		&self.selector
	}

	/// Processes a request and always produces a terminal response.
	///
	/// Allowed requests carry `RateLimit-*` headers; rejections use the fixed error mapping.
	pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
		let now = self.clock.now();
		let route = self.routes.resolve(&request.method, &request.path);
		let quota = match self.rate_limit_stage(&request, route, now) {
			Ok(quota) => quota,
			Err(e) => return GatewayResponse::from_error(&e),
		};
		let response = match route {
			Some(route) => self.dispatch_route(route, &request).await,
			None => observe(
				Stage::Route,
				None,
				Err(Error::RouteNotFound {
					method: request.method.to_string(),
					path: request.path.clone(),
				}),
			),
		};

		match response {
			Ok(response) => response.with_quota_headers(&quota, now),
			Err(e) => GatewayResponse::from_error(&e).with_quota_headers(&quota, now),
		}
	}

	/// Drops expired cache entries and elapsed rate windows.
	pub fn purge_expired(&self) -> PurgeReport {
		PurgeReport {
			cache_entries: self.cache.purge_expired(),
			rate_windows: self.limiter.purge_expired(),
		}
	}

	fn rate_limit_stage(
		&self,
		request: &GatewayRequest,
		route: Option<&Route>,
		now: OffsetDateTime,
	) -> Result<RateLimitQuota> {
		StageSpan::new(Stage::RateLimit, route).in_scope(|| {
			observe(
				Stage::RateLimit,
				route,
				self.limiter.check_at(&request.client, now).into_result(),
			)
		})
	}

	async fn dispatch_route(
		&self,
		route: &Route,
		request: &GatewayRequest,
	) -> Result<GatewayResponse> {
		match &route.kind {
			RouteKind::Index =>
				Ok(GatewayResponse::ok(serde_json::json!({ "message": "Welcome to the secure API!" }))),
			RouteKind::Login => self.login_stage(route, request),
			RouteKind::Protected { required } => self.authenticate_stage(route, request, required),
			RouteKind::Cached => self.cache_stage(route, request).await,
			RouteKind::Dispatch => self.dispatch_stage(route),
		}
	}

	fn login_stage(&self, route: &Route, request: &GatewayRequest) -> Result<GatewayResponse> {
		StageSpan::new(Stage::Login, Some(route)).in_scope(|| {
			let result = parse_login(&request.body)
				.and_then(|login| self.tokens.login(&login.username))
				.map(|token| GatewayResponse::ok(serde_json::json!({ "token": token.expose() })));

			observe(Stage::Login, Some(route), result)
		})
	}

	fn authenticate_stage(
		&self,
		route: &Route,
		request: &GatewayRequest,
		required: &Role,
	) -> Result<GatewayResponse> {
		StageSpan::new(Stage::Authenticate, Some(route)).in_scope(|| {
			let token = request.header("authorization").and_then(auth::bearer_token);
			let result = self
				.tokens
				.verify(token)
				.and_then(|claim| auth::authorize(&claim, required))
				.map(|()| {
					GatewayResponse::ok(serde_json::json!({ "message": welcome_message(required) }))
				});

			observe(Stage::Authenticate, Some(route), result)
		})
	}

	async fn cache_stage(
		&self,
		route: &Route,
		request: &GatewayRequest,
	) -> Result<GatewayResponse> {
		let span = StageSpan::new(Stage::Cache, Some(route));
		let key = CacheKey::new(&request.path, request.query.as_deref());
		let result = span
			.wrap(self.cache.get_or_insert_with(key, self.cache.default_ttl(), || async {
				cached_payload(self.clock.now())
			}))
			.await;

		match result {
			Ok((body, status)) => {
				obs::record_stage_outcome(Stage::Cache, Some(route), match status {
					CacheStatus::Hit => StageOutcome::Hit,
					CacheStatus::Miss => StageOutcome::Miss,
				});

				Ok(GatewayResponse::ok(body).with_header("X-Cache", status.as_str()))
			},
			Err(e) => observe(Stage::Cache, Some(route), Err(e)),
		}
	}

	fn dispatch_stage(&self, route: &Route) -> Result<GatewayResponse> {
		StageSpan::new(Stage::Dispatch, Some(route)).in_scope(|| {
			let result = self.selector.next().map(|target| {
				GatewayResponse::ok(serde_json::json!({
					"message": "Request forwarded to server",
					"server": target.to_string(),
				}))
			});

			observe(Stage::Dispatch, Some(route), result)
		})
	}
}
impl Debug for Pipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pipeline")
			.field("limiter", &self.limiter)
			.field("tokens", &self.tokens)
			.field("cache", &self.cache)
			.field("selector", &self.selector)
			.field("routes", &self.routes)
			.finish()
	}
}

fn observe<T>(stage: Stage, route: Option<&Route>, result: Result<T>) -> Result<T> {
	match &result {
		Ok(_) => obs::record_stage_outcome(stage, route, StageOutcome::Pass),
		Err(e) => {
			obs::record_stage_outcome(stage, route, StageOutcome::Reject);
			obs::record_rejection(stage, route, e);
		},
	}

	result
}

fn parse_login(body: &[u8]) -> Result<LoginRequest> {
	serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(body)).map_err(|e| {
		Error::MalformedRequest { reason: format!("{} at `{}`", e.inner(), e.path()) }
	})
}

fn cached_payload(now: OffsetDateTime) -> Result<Value> {
	#[derive(Serialize)]
	struct CachedData {
		message: &'static str,
		#[serde(with = "time::serde::rfc3339")]
		timestamp: OffsetDateTime,
	}

	Ok(serde_json::to_value(CachedData { message: "This is cached data.", timestamp: now })?)
}

fn welcome_message(role: &Role) -> String {
	let mut chars = role.chars();

	match chars.next() {
		Some(first) => format!("Welcome, {}{}!", first.to_uppercase(), chars.as_str()),
		None => "Welcome!".into(),
	}
}
