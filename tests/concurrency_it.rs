// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
};
// crates.io
use serde_json::json;
use time::{Duration, OffsetDateTime, macros};
// self
use edge_gateway::{
	auth::{ClientKey, MemoryRegistry, SigningKey},
	cache::{CacheKey, CacheStatus, ResponseCache},
	clock::ManualClock,
	config::GatewayConfig,
	pipeline::{GatewayRequest, Pipeline},
	rate_limit::RateLimiter,
	url::Url,
};

const START: OffsetDateTime = macros::datetime!(2025-06-01 09:00 UTC);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_compute_once() {
	let cache = ResponseCache::new(ResponseCache::DEFAULT_TTL, Arc::new(ManualClock::new(START)))
		.expect("Cache fixture should be valid.");
	let computations = Arc::new(AtomicUsize::new(0));
	let mut handles = Vec::new();

	for _ in 0..16 {
		let cache = cache.clone();
		let computations = computations.clone();

		handles.push(tokio::spawn(async move {
			cache
				.get_or_insert_with(CacheKey::new("/data", None), Duration::seconds(60), || async {
					computations.fetch_add(1, Ordering::SeqCst);
					tokio::time::sleep(std::time::Duration::from_millis(20)).await;

					Ok(json!({ "message": "This is cached data." }))
				})
				.await
				.expect("Cached computation should succeed.")
		}));
	}

	let mut misses = 0;

	for handle in handles {
		let (value, status) = handle.await.expect("Cache task should not panic.");

		assert_eq!(value, json!({ "message": "This is cached data." }));

		if status == CacheStatus::Miss {
			misses += 1;
		}
	}

	assert_eq!(computations.load(Ordering::SeqCst), 1, "Only one caller should compute.");
	assert_eq!(misses, 1);
	assert_eq!(cache.len(), 1);
	assert_eq!(cache.stats().hits(), 15, "Callers served by another computation are hits.");
	assert_eq!(cache.stats().misses(), 1, "Only the computing caller is a miss.");
}

#[test]
fn concurrent_checks_lose_no_updates() {
	let limiter = RateLimiter::new(Duration::minutes(15), 1_000, Arc::new(ManualClock::new(START)))
		.expect("Limiter fixture should be valid.");
	let key = ClientKey::new("10.0.0.1").expect("Client fixture should be valid.");

	thread::scope(|scope| {
		for _ in 0..8 {
			scope.spawn(|| {
				for _ in 0..50 {
					assert!(limiter.allow(&key), "Requests within budget should be allowed.");
				}
			});
		}
	});

	let window = limiter.window_for(&key).expect("Window should be recorded.");

	assert_eq!(window.count, 400);
	assert_eq!(window.started_at, START);
}

#[test]
fn concurrent_denials_admit_exactly_the_budget() {
	let limiter = RateLimiter::new(Duration::minutes(15), 100, Arc::new(ManualClock::new(START)))
		.expect("Limiter fixture should be valid.");
	let key = ClientKey::new("10.0.0.2").expect("Client fixture should be valid.");
	let allowed = AtomicUsize::new(0);

	thread::scope(|scope| {
		for _ in 0..8 {
			scope.spawn(|| {
				for _ in 0..25 {
					if limiter.allow(&key) {
						allowed.fetch_add(1, Ordering::Relaxed);
					}
				}
			});
		}
	});

	assert_eq!(allowed.load(Ordering::Relaxed), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatch_spreads_evenly() {
	let config = GatewayConfig::builder(SigningKey::new("concurrency-secret"))
		.backends(["http://backend1.example.com", "http://backend2.example.com"].map(|raw| {
			Url::parse(raw).expect("Backend fixture URL should parse.")
		}))
		.build()
		.expect("Config fixture should validate.");
	let pipeline = Pipeline::with_clock(
		&config,
		Arc::new(MemoryRegistry::with_default_users()),
		Arc::new(ManualClock::new(START)),
	)
	.expect("Pipeline fixture should assemble.");
	let mut handles = Vec::new();

	for i in 0..40 {
		let pipeline = pipeline.clone();

		handles.push(tokio::spawn(async move {
			let client = ClientKey::new(format!("10.0.1.{i}")).expect("Client should be valid.");

			pipeline.handle(GatewayRequest::get("/balance", client)).await
		}));
	}

	let mut counts = HashMap::<String, usize>::new();

	for handle in handles {
		let response = handle.await.expect("Dispatch task should not panic.");
		let server =
			response.body["server"].as_str().expect("Dispatch should name a server.").to_owned();

		*counts.entry(server).or_default() += 1;
	}

	assert_eq!(counts.get("http://backend1.example.com"), Some(&20));
	assert_eq!(counts.get("http://backend2.example.com"), Some(&20));
}
