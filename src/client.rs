//! Credentialed API client with transparent session refresh.
//!
//! [`ApiClient`] resolves base-relative paths, dispatches them through an [`ApiTransport`], and
//! turns every non-2xx answer into [`ApiError`]. A 401 on a first attempt to a non-exempt path is
//! handed to the shared [`RefreshCoordinator`], which refreshes once and replays the request.

// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ApiError,
	http::{ApiTransport, HttpCall},
	notify::SessionEvents,
	obs::{self, CallKind, CallOutcome, CallSpan},
	refresh::{BackendFuture, RefreshBackend, RefreshCoordinator},
	request::{ApiRequest, Method, PendingRequest},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// REST client for the LMS API.
///
/// Clones share the transport (and therefore the cookie jar), configuration, and refresh
/// coordinator, so concurrent requests from any clone join the same refresh cycle.
pub struct ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client over a caller-provided transport and coordinator.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		coordinator: Arc<RefreshCoordinator>,
	) -> Self {
		Self { transport: transport.into(), config: Arc::new(config), coordinator }
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Shared refresh coordinator.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Subscriber hub for session-expired announcements.
	pub fn events(&self) -> &SessionEvents {
		self.coordinator.events()
	}

	/// Issues `method path` with an optional JSON body and returns the parsed response body.
	pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
		let mut request = ApiRequest::new(method, path);

		request.body = body;

		self.execute(request).await
	}

	/// `GET path`.
	pub async fn get(&self, path: &str) -> Result<Value> {
		self.request(Method::Get, path, None).await
	}

	/// `POST path` with a JSON body.
	pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
		self.request(Method::Post, path, Some(body)).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
		self.request(Method::Put, path, Some(body)).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch(&self, path: &str, body: Value) -> Result<Value> {
		self.request(Method::Patch, path, Some(body)).await
	}

	/// `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<Value> {
		self.request(Method::Delete, path, None).await
	}

	/// `GET path`, decoding the response into `R`.
	pub async fn get_json<R>(&self, path: &str) -> Result<R>
	where
		R: DeserializeOwned,
	{
		decode(self.get(path).await?)
	}

	/// Sends a serializable body and decodes the response into `R`.
	pub async fn send_json<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		let body = serde_json::to_value(body).map_err(Error::Encode)?;

		decode(self.request(method, path, Some(body)).await?)
	}

	/// Executes a prepared request through the full pipeline.
	pub async fn execute(&self, request: ApiRequest) -> Result<Value> {
		const KIND: CallKind = CallKind::Request;

		let pending = PendingRequest::new(request);
		let span = CallSpan::for_request(KIND, "execute", &pending);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = match self.config.resolve(&pending.request.path) {
					Ok(url) => url,
					Err(err) => return Err(Error::from(err)),
				};

				match self.send(&pending.request, url.clone()).await {
					Err(err) if err.is_unauthorized() && self.config.skips_refresh(&url) => {
						obs::record_exempt_unauthorized();

						Err(err)
					},
					Err(err) if err.is_unauthorized() => match pending.into_retry() {
						Some(retry) => self.coordinator.recover(self, retry).await,
						None => Err(err),
					},
					other => other,
				}
			})
			.await;

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}

	/// Sends a single HTTP call with no refresh handling.
	async fn dispatch(&self, request: &ApiRequest) -> Result<Value> {
		let url = self.config.resolve(&request.path)?;

		self.send(request, url).await
	}

	async fn send(&self, request: &ApiRequest, url: Url) -> Result<Value> {
		let call = HttpCall { method: request.method, url, body: request.body.clone() };
		let reply = self.transport.send(call).await?;
		let body = reply.body_value();

		if reply.is_success() {
			Ok(body)
		} else {
			#[cfg(feature = "tracing")]
			tracing::debug!(request = %request, status = reply.status, "request rejected");

			Err(ApiError::new(reply.status, body).into())
		}
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client with its own cookie-enabled reqwest transport, coordinator, and
	/// event hub.
	pub fn new(config: ClientConfig) -> Result<Self> {
		let transport = ReqwestTransport::new()?;
		let coordinator = Arc::new(RefreshCoordinator::new(SessionEvents::default()));

		Ok(Self::with_transport(config, transport, coordinator))
	}
}
impl<T> RefreshBackend for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn refresh(&self) -> BackendFuture<'_, ()> {
		Box::pin(async move {
			let request = ApiRequest::new(Method::Post, self.config.endpoints.refresh.as_str());

			self.dispatch(&request).await.map(|_| ())
		})
	}

	fn replay(&self, pending: PendingRequest) -> BackendFuture<'_, Value> {
		Box::pin(async move {
			const KIND: CallKind = CallKind::Replay;

			obs::record_call_outcome(KIND, CallOutcome::Attempt);

			let result = CallSpan::for_request(KIND, "replay", &pending)
				.instrument(self.dispatch(&pending.request))
				.await;

			obs::record_call_outcome(KIND, CallOutcome::of(&result));

			result
		})
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

/// Decodes a JSON value into `R`, naming the failing field path on mismatch.
pub(crate) fn decode<R>(value: Value) -> Result<R>
where
	R: DeserializeOwned,
{
	serde_path_to_error::deserialize(value).map_err(|e| Error::Decode(e.into()))
}
