// self
use crate::obs::{CallKind, CallOutcome};

/// Counts one pipeline call outcome as `lms_client_call_total{call, outcome}`.
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"lms_client_call_total",
		"call" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Counts a 401 surfaced directly because its endpoint is exempt from refresh.
pub fn record_exempt_unauthorized() {
	#[cfg(feature = "metrics")]
	metrics::counter!("lms_client_exempt_unauthorized_total").increment(1);
}
