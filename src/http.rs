//! Transport primitives for LMS API calls.
//!
//! [`ApiTransport`] is the pipeline's only dependency on an HTTP stack. The default
//! [`ReqwestTransport`] keeps a cookie jar so the session cookies set by login and refresh
//! responses ride along on every later call; fakes implementing the trait let tests script
//! status sequences without a network.

// self
use crate::{_prelude::*, error::TransportError, request::Method};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing credentialed API calls.
///
/// Implementations must attach whatever credentials the stack keeps (cookies for the LMS API)
/// and return every HTTP response as a [`HttpReply`], including non-2xx ones. Only failures
/// where no response arrived map to [`TransportError`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes a single call without retries.
	fn send(&self, call: HttpCall) -> TransportFuture<'_>;
}

/// Fully-resolved call handed to a transport.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpCall {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Optional JSON payload.
	pub body: Option<Value>,
}

/// Raw response captured by a transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Creates a reply from a status and body bytes.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Parses the body as JSON, falling back to a string for other text and `null` when empty.
	pub fn body_value(&self) -> Value {
		if self.body.iter().all(u8::is_ascii_whitespace) {
			return Value::Null;
		}

		serde_json::from_slice(&self.body)
			.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
	}
}

/// Reqwest-backed transport with a cookie store, so credentials behave like a browser's
/// `withCredentials` requests.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with a fresh cookie jar.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The client should enable `cookie_store` (or a custom cookie provider), otherwise session
	/// cookies set by the server are never sent back.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, call: HttpCall) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match call.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = client
				.request(method, call.url)
				.header(reqwest::header::ACCEPT, "application/json");

			if let Some(body) = call.body {
				let payload = serde_json::to_vec(&body)
					.map_err(|e| TransportError::Io(std::io::Error::other(e)))?;

				builder = builder
					.header(reqwest::header::CONTENT_TYPE, "application/json")
					.body(payload);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(HttpReply { status, body })
		})
	}
}
