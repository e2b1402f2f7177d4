//! Optional observability helpers for the request pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `lms_client.call` with the `call`
//!   (pipeline stage kind) and `stage` (call site) fields. Request and replay spans add `method`,
//!   `path` and `attempt`.
//! - Enable `metrics` to increment the `lms_client_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`, and
//!   `lms_client_exempt_unauthorized_total` for 401s surfaced from refresh-exempt endpoints.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline call kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// First dispatch of a caller request.
	Request,
	/// Refresh-token call driven by the coordinator.
	Refresh,
	/// Replay of a request after a successful refresh.
	Replay,
	/// Session validation read.
	Session,
	/// Identity-changing account operation.
	Account,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Request => "request",
			CallKind::Refresh => "refresh",
			CallKind::Replay => "replay",
			CallKind::Session => "session",
			CallKind::Account => "account",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a pipeline helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome label.
	pub fn of<T>(result: &Result<T>) -> Self {
		if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure }
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
