// self
use crate::{
	obs::{Stage, StageOutcome},
	pipeline::Route,
};

/// Increments `edge_gateway_stage_total{stage, route, outcome}` when the `metrics` feature is on.
///
/// Route names come from the route table, so label cardinality stays bounded.
pub fn record_stage_outcome(stage: Stage, route: Option<&Route>, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"edge_gateway_stage_total",
			"stage" => stage.as_str(),
			"route" => crate::obs::route_label(route),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, route, outcome);
	}
}
