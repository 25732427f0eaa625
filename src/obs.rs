//! Optional observability helpers for pipeline stages.
//!
//! # Feature Flags
//!
//! - `tracing` (default) runs each stage inside an `edge_gateway.stage` span carrying the stage,
//!   the resolved route name, and the route method. Rejections emit a `warn` event.
//! - `metrics` increments `edge_gateway_stage_total` once per stage outcome, labeled by stage,
//!   route name, and outcome.
//!
//! Requests that resolve to no route are labeled `unmatched`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, pipeline::Route};

/// Route label used in spans and metrics; `unmatched` when resolution found nothing.
pub fn route_label(route: Option<&Route>) -> &'static str {
	route.map_or("unmatched", |route| route.name)
}

/// Pipeline stages observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Per-client request budgeting.
	RateLimit,
	/// Token issuance at login.
	Login,
	/// Token verification and role checks.
	Authenticate,
	/// Response cache lookup.
	Cache,
	/// Backend target selection.
	Dispatch,
	/// Route resolution.
	Route,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::RateLimit => "rate_limit",
			Stage::Login => "login",
			Stage::Authenticate => "authenticate",
			Stage::Cache => "cache",
			Stage::Dispatch => "dispatch",
			Stage::Route => "route",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Stage passed control to the next one.
	Pass,
	/// Cache stage served a stored response.
	Hit,
	/// Cache stage ran the handler.
	Miss,
	/// Stage short-circuited with a terminal response.
	Reject,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Pass => "pass",
			StageOutcome::Hit => "hit",
			StageOutcome::Miss => "miss",
			StageOutcome::Reject => "reject",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
