//! Client configuration: API base URL, endpoint paths, refresh skip list, and session freshness.

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated client configuration. Build it with [`ClientConfig::builder`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Authentication and account endpoint paths.
	pub endpoints: Endpoints,
	/// How long a fetched session stays fresh.
	pub session_ttl: Duration,
	extra_skip: Vec<String>,
}
impl ClientConfig {
	/// Default session freshness window.
	pub const DEFAULT_SESSION_TTL: Duration = Duration::minutes(5);

	/// Starts a builder rooted at `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves a request path into an absolute URL.
	///
	/// Paths are relative to the base URL even when they start with `/`, so a base such as
	/// `https://host/lms/` keeps its `/lms` prefix. Absolute URLs pass through unchanged.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let joined = match Url::parse(path) {
			Ok(url) => Ok(url),
			Err(_) => self.base_url.join(path.trim_start_matches('/')),
		};

		joined.map_err(|_| ConfigError::InvalidPath { path: path.to_owned() })
	}

	/// Returns `true` when a 401 from `url` must never start a refresh cycle.
	///
	/// The refresh endpoint itself is exempt so a failing refresh cannot recurse, and the
	/// credential endpoints are exempt because their 401/400 answers mean wrong credentials.
	/// Exempt paths are resolved the same way requests are, so the comparison is made on the URL
	/// actually sent. Query strings and trailing slashes are ignored.
	pub fn skips_refresh(&self, url: &Url) -> bool {
		let path = url.path().trim_end_matches('/');

		self.endpoints
			.refresh_exempt()
			.into_iter()
			.chain(self.extra_skip.iter().map(String::as_str))
			.filter_map(|exempt| self.resolve(exempt).ok())
			.any(|exempt| exempt.origin() == url.origin() && exempt.path().trim_end_matches('/') == path)
	}
}

/// Endpoint paths used by the pipeline and the account API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// `POST`, no body; success means new session cookies were set.
	pub refresh: String,
	/// `GET`; returns the current identity or 401.
	pub validate: String,
	/// `POST` credentials.
	pub login: String,
	/// `POST` registration payload.
	pub register: String,
	/// `POST` second-factor code.
	pub two_factor_login: String,
	/// `POST`; clears session cookies.
	pub logout: String,
	/// `PATCH` profile fields.
	pub profile: String,
	/// `PUT` avatar payload.
	pub avatar: String,
	/// `PATCH` two-factor enable flag.
	pub two_factor_toggle: String,
	/// `GET` redirect into Google OAuth.
	pub google_oauth: String,
}
impl Endpoints {
	fn refresh_exempt(&self) -> [&str; 4] {
		[
			self.refresh.as_str(),
			self.login.as_str(),
			self.register.as_str(),
			self.two_factor_login.as_str(),
		]
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let named = [
			("refresh", &self.refresh),
			("validate", &self.validate),
			("login", &self.login),
			("register", &self.register),
			("two_factor_login", &self.two_factor_login),
			("logout", &self.logout),
			("profile", &self.profile),
			("avatar", &self.avatar),
			("two_factor_toggle", &self.two_factor_toggle),
			("google_oauth", &self.google_oauth),
		];

		for (endpoint, path) in named {
			if !path.starts_with('/') {
				return Err(ConfigError::RelativeEndpoint { endpoint, path: path.clone() });
			}
		}

		Ok(())
	}
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			refresh: "/api/v1/auth/refresh-token".into(),
			validate: "/api/v1/auth/validate-token".into(),
			login: "/api/v1/auth/login".into(),
			register: "/api/v1/auth/register".into(),
			two_factor_login: "/api/v1/auth/verify-2fa".into(),
			logout: "/api/v1/auth/logout".into(),
			profile: "/api/v1/users/profile".into(),
			avatar: "/api/v1/users/avatar".into(),
			two_factor_toggle: "/api/v1/auth/2fa/toggle".into(),
			google_oauth: "/api/v1/auth/google".into(),
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Base URL for every request.
	pub base_url: Url,
	/// Endpoint paths.
	pub endpoints: Endpoints,
	/// Session freshness window.
	pub session_ttl: Duration,
	/// Additional paths that must never trigger a refresh.
	pub extra_skip: Vec<String>,
}
impl ClientConfigBuilder {
	/// Creates a builder with default endpoints and a five minute session window.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: Endpoints::default(),
			session_ttl: ClientConfig::DEFAULT_SESSION_TTL,
			extra_skip: Vec::new(),
		}
	}

	/// Replaces the endpoint table.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the session freshness window.
	pub fn session_ttl(mut self, ttl: Duration) -> Self {
		self.session_ttl = ttl;

		self
	}

	/// Adds a path whose 401 responses must surface directly.
	pub fn skip_refresh_for(mut self, path: impl Into<String>) -> Self {
		self.extra_skip.push(path.into());

		self
	}

	/// Validates and produces the configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let Self { mut base_url, endpoints, session_ttl, extra_skip } = self;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: base_url.to_string() });
		}
		if base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeBase { url: base_url.to_string() });
		}
		if !session_ttl.is_positive() {
			return Err(ConfigError::NonPositiveSessionTtl);
		}
		// A base without a trailing slash would lose its last segment on join.
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		endpoints.validate()?;

		for path in &extra_skip {
			if !path.starts_with('/') {
				return Err(ConfigError::RelativeEndpoint { endpoint: "skip", path: path.clone() });
			}
		}

		Ok(ClientConfig { base_url, endpoints, session_ttl, extra_skip })
	}
}
