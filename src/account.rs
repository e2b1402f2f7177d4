//! Account and credential operations that change the current identity.
//!
//! Every successful call here invalidates the [`SessionCache`] so role-gated views re-read the
//! identity. Logout invalidates unconditionally.

// self
use crate::{
	_prelude::*,
	client::ApiClient,
	http::ApiTransport,
	obs::{self, CallKind, CallOutcome, CallSpan},
	request::Method,
	session::SessionCache,
};

/// Email + password credentials.
#[derive(Clone, Serialize)]
pub struct Credentials {
	/// Login email.
	pub email: String,
	/// Plain-text password; sent only over the configured transport.
	pub password: String,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Identity-changing operations bound to a client and its session cache.
pub struct AccountApi<T>
where
	T: ?Sized + ApiTransport,
{
	client: ApiClient<T>,
	sessions: Arc<SessionCache<T>>,
}
impl<T> AccountApi<T>
where
	T: ?Sized + ApiTransport,
{
	/// Binds the account API to `client` and the cache it must invalidate.
	pub fn new(client: ApiClient<T>, sessions: Arc<SessionCache<T>>) -> Self {
		Self { client, sessions }
	}

	/// Session cache invalidated by these operations.
	pub fn sessions(&self) -> &Arc<SessionCache<T>> {
		&self.sessions
	}

	/// Logs in with email + password.
	///
	/// The server may answer with a two-factor challenge instead of a session; the body is
	/// returned as-is so the caller can branch on it. Wrong credentials surface as
	/// [`Error::Api`] and never start a refresh.
	pub async fn login(&self, credentials: &Credentials) -> Result<Value> {
		let body = serde_json::to_value(credentials).map_err(Error::Encode)?;

		self.mutate("login", Method::Post, &self.client.config().endpoints.login, Some(body)).await
	}

	/// Completes a two-factor login with the one-time code.
	pub async fn login_two_factor(&self, email: &str, code: &str) -> Result<Value> {
		let body = serde_json::json!({ "email": email, "token": code });

		self.mutate(
			"login_two_factor",
			Method::Post,
			&self.client.config().endpoints.two_factor_login,
			Some(body),
		)
		.await
	}

	/// Registers a new account.
	pub async fn register(&self, payload: Value) -> Result<Value> {
		self.mutate("register", Method::Post, &self.client.config().endpoints.register, Some(payload))
			.await
	}

	/// Ends the session on the server; the local cache is cleared even if the call fails.
	pub async fn logout(&self) -> Result<()> {
		let result = self
			.mutate("logout", Method::Post, &self.client.config().endpoints.logout, None)
			.await;

		self.sessions.invalidate();

		result.map(|_| ())
	}

	/// Updates profile fields.
	pub async fn update_profile(&self, changes: Value) -> Result<Value> {
		self.mutate(
			"update_profile",
			Method::Patch,
			&self.client.config().endpoints.profile,
			Some(changes),
		)
		.await
	}

	/// Replaces the avatar.
	pub async fn update_avatar(&self, avatar: Value) -> Result<Value> {
		self.mutate("update_avatar", Method::Put, &self.client.config().endpoints.avatar, Some(avatar))
			.await
	}

	/// Enables or disables two-factor authentication.
	pub async fn set_two_factor(&self, enabled: bool) -> Result<Value> {
		self.mutate(
			"set_two_factor",
			Method::Patch,
			&self.client.config().endpoints.two_factor_toggle,
			Some(serde_json::json!({ "enabled": enabled })),
		)
		.await
	}

	/// URL that starts the Google OAuth login redirect.
	pub fn google_login_url(&self) -> Result<Url> {
		let config = self.client.config();

		config.resolve(&config.endpoints.google_oauth).map_err(Error::from)
	}

	async fn mutate(
		&self,
		stage: &'static str,
		method: Method,
		path: &str,
		body: Option<Value>,
	) -> Result<Value> {
		const KIND: CallKind = CallKind::Account;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result =
			CallSpan::new(KIND, stage).instrument(self.client.request(method, path, body)).await;

		if result.is_ok() {
			self.sessions.invalidate();
		}

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}
}
impl<T> Debug for AccountApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccountApi").field("client", &self.client).finish()
	}
}
