// self
use crate::{_prelude::*, obs::CallKind, request::PendingRequest};

/// Resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// `lms_client.call` span wrapped around one pipeline call.
///
/// Request-level spans also carry `method`, `path` and `attempt`, so a replay can be matched
/// with the first dispatch that queued it.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Span for a call that is not tied to a single caller request.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					"lms_client.call",
					call = kind.as_str(),
					stage,
					method = tracing::field::Empty,
					path = tracing::field::Empty,
					attempt = tracing::field::Empty,
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Span for dispatching `pending`, tagged with its method, path, and attempt.
	pub fn for_request(kind: CallKind, stage: &'static str, pending: &PendingRequest) -> Self {
		let this = Self::new(kind, stage);

		#[cfg(feature = "tracing")]
		{
			this.span.record("method", pending.request.method.as_str());
			this.span.record("path", pending.request.path.as_str());
			this.span.record("attempt", pending.attempt().as_str());
		}
		#[cfg(not(feature = "tracing"))]
		let _ = pending;

		this
	}

	/// Instruments a future; no guard is held across `.await`.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
