//! Identity registry contract consumed by login, plus an in-memory implementation.

// self
use crate::{
	_prelude::*,
	auth::{Role, SubjectId, Username},
};

/// Registered identity resolved from a username.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	/// Subject identifier embedded in issued claims.
	pub id: SubjectId,
	/// Login name.
	pub username: Username,
	/// Role granted to the identity.
	pub role: Role,
}

/// Lookup contract backing the token service's login path.
pub trait IdentityRegistry
where
	Self: Send + Sync,
{
	/// Resolves a username, returning `None` when it is not registered.
	fn lookup(&self, username: &str) -> Option<Identity>;
}

/// Thread-safe registry that keeps identities in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry(Arc<RwLock<HashMap<Username, Identity>>>);
impl MemoryRegistry {
	/// Seeds the registry with the stock `admin`, `editor`, and `viewer` users.
	pub fn with_default_users() -> Self {
		let registry = Self::default();

		for (id, name) in [(1, "admin"), (2, "editor"), (3, "viewer")] {
			// Fixed literals always pass identifier validation.
			if let (Ok(username), Ok(role)) = (Username::new(name), Role::new(name)) {
				registry.insert(Identity { id: SubjectId(id), username, role });
			}
		}

		registry
	}

	/// Adds or replaces an identity, returning the previous entry for that username.
	pub fn insert(&self, identity: Identity) -> Option<Identity> {
		self.0.write().insert(identity.username.clone(), identity)
	}

	/// Number of registered identities.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no identities are registered.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl IdentityRegistry for MemoryRegistry {
	fn lookup(&self, username: &str) -> Option<Identity> {
		self.0.read().get(username).cloned()
	}
}
