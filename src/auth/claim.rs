//! Identity claims embedded in signed tokens.

// self
use crate::{
	_prelude::*,
	auth::{Role, SubjectId},
};

/// Lifecycle status of a claim at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
	/// Issued-at lies in the future.
	Pending,
	/// Claim is currently valid.
	Active,
	/// Claim reached its expiry instant.
	Expired,
}

/// Verified identity and role payload.
///
/// Field names follow the registered JWT claim names so tokens stay readable by standard
/// tooling. Instants are serialized as unix seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
	/// Subject identifier from the identity registry.
	pub sub: SubjectId,
	/// Role granted to the subject.
	pub role: Role,
	/// Issued-at instant.
	#[serde(with = "time::serde::timestamp")]
	pub iat: OffsetDateTime,
	/// Expiry instant.
	#[serde(with = "time::serde::timestamp")]
	pub exp: OffsetDateTime,
}
impl Claim {
	/// Builds a claim issued at `issued_at` that lives for `lifetime`.
	///
	/// Instants are truncated to whole seconds to match their wire precision.
	pub fn new(sub: SubjectId, role: Role, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		let iat = truncate_to_seconds(issued_at);

		Self { sub, role, iat, exp: iat + lifetime }
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> ClaimStatus {
		if instant < self.iat {
			return ClaimStatus::Pending;
		}
		if instant >= self.exp {
			return ClaimStatus::Expired;
		}

		ClaimStatus::Active
	}

	/// Returns `true` if the claim has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), ClaimStatus::Expired)
	}

	/// Returns `true` when the claim's role matches `required`.
	pub fn has_role(&self, required: &Role) -> bool {
		&self.role == required
	}
}

fn truncate_to_seconds(instant: OffsetDateTime) -> OffsetDateTime {
	instant.replace_nanosecond(0).unwrap_or(instant)
}
