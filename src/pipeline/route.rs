//! Route table mapping method + path to the stages a request passes through.

// self
use crate::{_prelude::*, auth::Role, pipeline::Method};

/// Stage composition applied to a route after rate limiting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteKind {
	/// Public landing route.
	Index,
	/// Issues a token for the posted username.
	Login,
	/// Requires a verified token carrying `required`.
	Protected {
		/// Role the verified claim must carry.
		required: Role,
	},
	/// Served through the response cache.
	Cached,
	/// Selects a backend target.
	Dispatch,
}

/// Single routing entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
	/// Stable label used in spans and metrics.
	pub name: &'static str,
	/// Method the route answers.
	pub method: Method,
	/// Exact path the route answers.
	pub path: &'static str,
	/// Stage composition.
	pub kind: RouteKind,
}

/// Ordered collection of routes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable(Vec<Route>);
impl RouteTable {
	/// Creates a table from explicit routes.
	pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
		Self(routes.into_iter().collect())
	}

	/// Finds the route for `method` + `path`, ignoring one trailing slash.
	pub fn resolve(&self, method: &Method, path: &str) -> Option<&Route> {
		let path = match path.strip_suffix('/') {
			Some(trimmed) if !trimmed.is_empty() => trimmed,
			_ => path,
		};

		self.0.iter().find(|route| &route.method == method && route.path == path)
	}

	/// Routes in declaration order.
	pub fn routes(&self) -> &[Route] {
		&self.0
	}
}
impl Default for RouteTable {
	/// `GET /`, `POST /login`, `GET /protected` (admin), `GET /data` (cached), `GET /balance`.
	fn default() -> Self {
		Self::new([
			Route { name: "index", method: Method::Get, path: "/", kind: RouteKind::Index },
			Route { name: "login", method: Method::Post, path: "/login", kind: RouteKind::Login },
			Route {
				name: "protected",
				method: Method::Get,
				path: "/protected",
				kind: RouteKind::Protected { required: Role::admin() },
			},
			Route { name: "data", method: Method::Get, path: "/data", kind: RouteKind::Cached },
			Route {
				name: "balance",
				method: Method::Get,
				path: "/balance",
				kind: RouteKind::Dispatch,
			},
		])
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn resolves_by_method_and_path() {
		let table = RouteTable::default();

		assert_eq!(table.resolve(&Method::Post, "/login").map(|route| route.name), Some("login"));
		assert_eq!(table.resolve(&Method::Get, "/data/").map(|route| route.name), Some("data"));
		assert_eq!(table.resolve(&Method::Get, "/").map(|route| route.name), Some("index"));
		assert!(table.resolve(&Method::Get, "/login").is_none());
		assert!(table.resolve(&Method::Get, "/missing").is_none());
	}
}
