// self
use crate::{_prelude::*, obs::Stage, pipeline::Route};

/// Stage future wrapped in its span; the bare future when the `tracing` feature is off.
#[cfg(feature = "tracing")]
pub type StageFuture<F> = tracing::instrument::Instrumented<F>;
/// Stage future wrapped in its span; the bare future when the `tracing` feature is off.
#[cfg(not(feature = "tracing"))]
pub type StageFuture<F> = F;

/// `edge_gateway.stage` span covering one stage of one request.
///
/// Fields are `stage`, `route` (the route name, or `unmatched`), and `method`.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Opens the span for `stage` while serving `route`.
	pub fn new(stage: Stage, route: Option<&Route>) -> Self {
		#[cfg(feature = "tracing")]
		{
			let method = route.map_or("-", |route| route.method.as_str());
			let span = tracing::info_span!(
				"edge_gateway.stage",
				stage = stage.as_str(),
				route = crate::obs::route_label(route),
				method,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, route);

			Self {}
		}
	}

	/// Runs a synchronous stage body inside the span.
	pub fn in_scope<T>(&self, body: impl FnOnce() -> T) -> T {
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(body)
		}
		#[cfg(not(feature = "tracing"))]
		{
			body()
		}
	}

	/// Wraps an async stage so every poll runs inside the span.
	pub fn wrap<Fut>(&self, stage: Fut) -> StageFuture<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			stage.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			stage
		}
	}
}

/// Emits a `warn` event describing why a stage rejected a request.
///
/// Only the error label and status are logged; token material never reaches the event.
pub fn record_rejection(stage: Stage, route: Option<&Route>, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			stage = stage.as_str(),
			route = crate::obs::route_label(route),
			error = error.label(),
			status = error.status(),
			"request rejected"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, route, error);
	}
}
