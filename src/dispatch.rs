//! Round-robin backend selection.
//!
//! The selector only picks a target; forwarding the request is the host's concern. Rotation is
//! purely positional: every configured target stays in rotation regardless of reachability.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::_prelude::*;

/// Backend a dispatch route can be forwarded to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendTarget(Url);
impl BackendTarget {
	/// Wraps a backend URL.
	pub fn new(url: Url) -> Self {
		Self(url)
	}

	/// Returns the target URL.
	pub fn url(&self) -> &Url {
		&self.0
	}

	/// Target rendered without the trailing slash `Url` adds to bare origins.
	pub fn origin_str(&self) -> &str {
		let raw = self.0.as_str();

		if self.0.path() == "/" && self.0.query().is_none() && self.0.fragment().is_none() {
			raw.trim_end_matches('/')
		} else {
			raw
		}
	}
}
impl Display for BackendTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.origin_str())
	}
}

/// Cyclic chooser over a fixed target list.
#[derive(Debug)]
pub struct TargetSelector {
	targets: Arc<[BackendTarget]>,
	cursor: AtomicUsize,
}
impl TargetSelector {
	/// Creates a selector whose cursor starts at the first target.
	pub fn new(targets: impl IntoIterator<Item = BackendTarget>) -> Self {
		Self { targets: targets.into_iter().collect(), cursor: AtomicUsize::new(0) }
	}

	/// Configured targets in rotation order.
	pub fn targets(&self) -> &[BackendTarget] {
		&self.targets
	}

	/// Returns the target under the cursor and advances the cursor by one.
	///
	/// The cursor always stays within `0..len`, so it never wraps through `usize::MAX`.
	pub fn next(&self) -> Result<&BackendTarget> {
		let len = self.targets.len();

		if len == 0 {
			return Err(Error::NoBackends);
		}

		let index = self
			.cursor
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| Some((cursor + 1) % len))
			.unwrap_or_else(|current| current);

		Ok(&self.targets[index % len])
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	fn target(raw: &str) -> BackendTarget {
		BackendTarget::new(Url::parse(raw).expect("Backend fixture should parse."))
	}

	fn selector() -> TargetSelector {
		TargetSelector::new([
			target("http://backend1.example.com"),
			target("http://backend2.example.com"),
			target("http://backend3.example.com"),
		])
	}

	#[test]
	fn rotates_in_list_order_and_wraps() {
		let selector = selector();
		let picked: Vec<String> = (0..4)
			.map(|_| selector.next().expect("Non-empty selector should yield a target.").to_string())
			.collect();

		assert_eq!(
			picked,
			[
				"http://backend1.example.com",
				"http://backend2.example.com",
				"http://backend3.example.com",
				"http://backend1.example.com",
			]
		);
	}

	#[test]
	fn empty_list_reports_no_backends() {
		let selector = TargetSelector::new([]);

		assert!(matches!(selector.next(), Err(Error::NoBackends)));
	}

	#[test]
	fn concurrent_selection_loses_no_advances() {
		let selector = Arc::new(selector());
		let handles: Vec<_> = (0..6)
			.map(|_| {
				let selector = selector.clone();

				std::thread::spawn(move || {
					(0..100)
						.map(|_| {
							selector
								.next()
								.expect("Non-empty selector should yield a target.")
								.to_string()
						})
						.collect::<Vec<_>>()
				})
			})
			.collect();
		let mut counts = HashMap::<String, usize>::new();

		for handle in handles {
			for picked in handle.join().expect("Selector thread should not panic.") {
				*counts.entry(picked).or_default() += 1;
			}
		}

		assert_eq!(counts.len(), 3);
		assert!(counts.values().all(|count| *count == 200));
	}

	#[test]
	fn display_keeps_paths_but_trims_bare_origins() {
		assert_eq!(target("http://backend1.example.com").to_string(), "http://backend1.example.com");
		assert_eq!(target("https://api.example.com/v1/").to_string(), "https://api.example.com/v1/");
	}
}
