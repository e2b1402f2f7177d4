//! Client-level error types shared across the request pipeline, session cache, and account API.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Server answered with a non-2xx status.
	///
	/// Covers field-level validation failures and credential rejections on endpoints that are
	/// exempt from session refresh; the body is preserved verbatim for form display.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Response body did not match the expected shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Request payload could not be serialized to JSON.
	#[error("Request body could not be serialized to JSON.")]
	Encode(#[source] serde_json::Error),
	/// Transport failure (DNS, TCP, TLS, unreachable host).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The refresh cycle failed; the user must log in again.
	#[error("Session expired: {reason}.")]
	SessionExpired {
		/// Failure reported by the refresh call.
		reason: String,
	},
	/// The request was queued behind a refresh cycle whose driver went away before settling.
	#[error("Refresh cycle was abandoned before the queued request could be replayed.")]
	RefreshAbandoned,
}
impl Error {
	/// Returns the HTTP status carried by [`Error::Api`], if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(err) => Some(err.status),
			_ => None,
		}
	}

	/// Returns `true` for a 401 surfaced by the server.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Api(err) if err.is_unauthorized())
	}
}

/// Non-2xx response with its status and parsed body.
#[derive(Clone, Debug, PartialEq, ThisError)]
#[error("Request failed with HTTP status {status}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Parsed response body: JSON when possible, a string for other text, `null` when empty.
	pub body: Value,
}
impl ApiError {
	/// Creates an error from a status and an already-parsed body.
	pub fn new(status: u16, body: Value) -> Self {
		Self { status, body }
	}

	/// Returns `true` when the server answered 401.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Returns the body's `message` field when the server supplied one.
	pub fn message(&self) -> Option<&str> {
		match &self.body {
			Value::Object(map) => map.get("message").and_then(Value::as_str),
			Value::String(text) if !text.is_empty() => Some(text),
			_ => None,
		}
	}

	/// Returns the body's `errors` object, keyed by field name, when present.
	pub fn field_errors(&self) -> Option<&serde_json::Map<String, Value>> {
		self.body.get("errors").and_then(Value::as_object)
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Base URL uses a scheme other than http or https.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// Base URL cannot have paths joined onto it.
	#[error("Base URL cannot be used as a base: {url}.")]
	CannotBeBase {
		/// Offending URL.
		url: String,
	},
	/// Endpoint path is not absolute.
	#[error("The {endpoint} endpoint path must start with `/`: {path}.")]
	RelativeEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
	},
	/// Request path could not be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Path that failed to join.
		path: String,
	},
	/// Session freshness window must be positive.
	#[error("The session freshness window must be positive.")]
	NonPositiveSessionTtl,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {reason}.")]
	HttpClientBuild {
		/// Builder failure summary.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl Display) -> Self {
		Self::HttpClientBuild { reason: src.to_string() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Response payload failed to deserialize into the requested type.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// JSON parsed but did not match the target shape; the path names the failing field.
	#[error("Response body does not match the expected shape at `{path}`.")]
	Shape {
		/// Dotted path to the failing field.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
}
impl From<serde_path_to_error::Error<serde_json::Error>> for DecodeError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Shape { path, source: e.into_inner() }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn api_error_exposes_message_and_field_errors() {
		let err = ApiError::new(
			422,
			json!({ "message": "Validation failed", "errors": { "email": "Email is taken" } }),
		);

		assert_eq!(err.message(), Some("Validation failed"));
		assert_eq!(
			err.field_errors().and_then(|map| map.get("email")).and_then(Value::as_str),
			Some("Email is taken")
		);
		assert!(!err.is_unauthorized());
	}

	#[test]
	fn error_status_only_for_api_variant() {
		let api: Error = ApiError::new(401, Value::Null).into();

		assert_eq!(api.status(), Some(401));
		assert!(api.is_unauthorized());
		assert_eq!(Error::RefreshAbandoned.status(), None);
	}

	#[test]
	fn decode_error_keeps_field_path() {
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Payload {
			inner: Inner,
		}
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Inner {
			count: u32,
		}

		let raw = r#"{"inner":{"count":"many"}}"#;
		let de = &mut serde_json::Deserializer::from_str(raw);
		let err = serde_path_to_error::deserialize::<_, Payload>(de)
			.expect_err("String count must fail to decode.");
		let DecodeError::Shape { path, .. } = DecodeError::from(err);

		assert_eq!(path, "inner.count");
	}
}
