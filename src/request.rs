//! Outbound request values and the one-retry attempt marker.

// self
use crate::_prelude::*;

/// HTTP methods used by the LMS API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical upper-case method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// An outbound API call: method, base-relative path, and optional JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL, e.g. `/api/v1/courses`.
	pub path: String,
	/// Optional JSON payload.
	pub body: Option<Value>,
}
impl ApiRequest {
	/// Creates a request without a body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), body: None }
	}

	/// Attaches a JSON payload.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}
}
impl Display for ApiRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {}", self.method, self.path)
	}
}

/// How many times a request has been issued relative to a refresh cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Attempt {
	/// Original dispatch; a 401 may start or join a refresh cycle.
	#[default]
	First,
	/// Replay after a refresh; a 401 here is final.
	Retry,
}
impl Attempt {
	/// Returns a stable label suitable for span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Attempt::First => "first",
			Attempt::Retry => "retry",
		}
	}
}

/// A request paired with its attempt marker.
///
/// Only [`PendingRequest::into_retry`] moves a request to [`Attempt::Retry`], and it refuses to
/// do so twice, which bounds every request to a single refresh-triggered replay.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRequest {
	/// The underlying request.
	pub request: ApiRequest,
	attempt: Attempt,
}
impl PendingRequest {
	/// Wraps a request for its first dispatch.
	pub fn new(request: ApiRequest) -> Self {
		Self { request, attempt: Attempt::First }
	}

	/// Returns the attempt marker.
	pub fn attempt(&self) -> Attempt {
		self.attempt
	}

	/// Promotes a first attempt to a retry; returns `None` when the request was already retried.
	pub fn into_retry(self) -> Option<Self> {
		match self.attempt {
			Attempt::First => Some(Self { request: self.request, attempt: Attempt::Retry }),
			Attempt::Retry => None,
		}
	}
}
