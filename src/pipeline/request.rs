//! Transport-agnostic request model handed to the pipeline.

// self
use crate::{_prelude::*, auth::ClientKey};

/// Request method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `DELETE`.
	Delete,
	/// `HEAD`.
	Head,
	/// `OPTIONS`.
	Options,
	/// Any other method, stored upper-cased.
	Other(String),
}
impl Method {
	/// Returns the canonical upper-case method name.
	pub fn as_str(&self) -> &str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
			Method::Head => "HEAD",
			Method::Options => "OPTIONS",
			Method::Other(name) => name,
		}
	}
}
impl From<&str> for Method {
	fn from(value: &str) -> Self {
		match value.to_ascii_uppercase().as_str() {
			"GET" => Method::Get,
			"POST" => Method::Post,
			"PUT" => Method::Put,
			"PATCH" => Method::Patch,
			"DELETE" => Method::Delete,
			"HEAD" => Method::Head,
			"OPTIONS" => Method::Options,
			other => Method::Other(other.to_owned()),
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parsed inbound request.
///
/// Header names are stored lower-cased so lookups are case-insensitive.
#[derive(Clone, Debug)]
pub struct GatewayRequest {
	/// Request method.
	pub method: Method,
	/// Path without the query string.
	pub path: String,
	/// Raw query string without the leading `?`.
	pub query: Option<String>,
	/// Header map keyed by lower-cased name.
	pub headers: BTreeMap<String, String>,
	/// Raw request body.
	pub body: Vec<u8>,
	/// Caller-identifying attribute used for rate limiting.
	pub client: ClientKey,
}
impl GatewayRequest {
	/// Creates a request for `target` (path plus optional `?query`) from `client`.
	pub fn new(method: impl Into<Method>, target: &str, client: ClientKey) -> Self {
		let (path, query) = match target.split_once('?') {
			Some((path, query)) => (path, Some(query.to_owned())),
			None => (target, None),
		};

		Self {
			method: method.into(),
			path: path.to_owned(),
			query,
			headers: BTreeMap::new(),
			body: Vec::new(),
			client,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(target: &str, client: ClientKey) -> Self {
		Self::new(Method::Get, target, client)
	}

	/// Shorthand for a `POST` request.
	pub fn post(target: &str, client: ClientKey) -> Self {
		Self::new(Method::Post, target, client)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Adds an `Authorization: Bearer <token>` header.
	pub fn with_bearer(self, token: &str) -> Self {
		self.with_header("authorization", format!("Bearer {token}"))
	}

	/// Replaces the raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `body` as the JSON payload and sets the content type.
	pub fn with_json(self, body: &Value) -> Self {
		self.with_header("content-type", "application/json").with_body(body.to_string())
	}

	/// Case-insensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn client() -> ClientKey {
		ClientKey::new("127.0.0.1").expect("Client fixture should be valid.")
	}

	#[test]
	fn target_splits_path_and_query() {
		let request = GatewayRequest::get("/data?page=2&sort=asc", client());

		assert_eq!(request.path, "/data");
		assert_eq!(request.query.as_deref(), Some("page=2&sort=asc"));
		assert_eq!(GatewayRequest::get("/data", client()).query, None);
	}

	#[test]
	fn headers_are_case_insensitive() {
		let request = GatewayRequest::get("/protected", client()).with_header("Authorization", "x");

		assert_eq!(request.header("AUTHORIZATION"), Some("x"));
		assert_eq!(request.with_bearer("abc").header("authorization"), Some("Bearer abc"));
	}

	#[test]
	fn methods_parse_case_insensitively() {
		assert_eq!(Method::from("post"), Method::Post);
		assert_eq!(Method::from("purge"), Method::Other("PURGE".into()));
		assert_eq!(Method::Other("PURGE".into()).to_string(), "PURGE");
	}
}
