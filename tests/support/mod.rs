#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::Notify;
// self
use lms_session_client::{
	account::AccountApi,
	client::ApiClient,
	config::{ClientConfig, Endpoints},
	error::TransportError,
	http::{ApiTransport, HttpCall, HttpReply, TransportFuture},
	notify::SessionEvents,
	refresh::RefreshCoordinator,
	request::Method,
	session::{Clock, SessionCache},
	url::Url,
};

pub const BASE_URL: &str = "https://lms.test";
pub const PASSWORD: &str = "correct-horse";

/// In-process stand-in for the LMS API that tracks whether the session cookie is fresh.
#[derive(Default)]
pub struct ScriptedTransport {
	pub state: Mutex<ServerState>,
	pub refresh_gate: Option<Arc<Notify>>,
	pub validate_gate: Option<Arc<Notify>>,
	pub refresh_calls: AtomicUsize,
}
impl ScriptedTransport {
	pub fn logged_in() -> Self {
		let transport = Self::default();

		transport.state.lock().fresh = true;

		transport
	}

	pub fn expired() -> Self {
		let transport = Self::default();

		transport.state.lock().refresh_succeeds = true;

		transport
	}

	pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
		self.refresh_gate = Some(gate);

		self
	}

	/// Holds validation replies until `gate` is notified; the call is logged before it waits.
	pub fn with_validate_gate(mut self, gate: Arc<Notify>) -> Self {
		self.validate_gate = Some(gate);

		self
	}

	pub fn calls(&self) -> Vec<String> {
		self.state.lock().calls.clone()
	}

	pub fn count(&self, call: &str) -> usize {
		self.state.lock().calls.iter().filter(|logged| *logged == call).count()
	}

	pub fn refreshes(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	fn respond(&self, call: &HttpCall) -> Result<HttpReply, TransportError> {
		let endpoints = Endpoints::default();
		let path = call.url.path().to_owned();
		let mut state = self.state.lock();

		state.calls.push(format!("{} {}", call.method, path));

		if state.unreachable.contains(&path) {
			return Err(TransportError::network(std::io::Error::new(
				std::io::ErrorKind::ConnectionRefused,
				"connection refused",
			)));
		}
		if let Some((_, (status, body))) = state.overrides.iter().find(|(p, _)| *p == path) {
			return Ok(reply(*status, body.clone()));
		}
		if path == endpoints.login || path == endpoints.two_factor_login {
			let field = |name: &str| {
				call.body.as_ref().and_then(|body| body.get(name)).and_then(Value::as_str)
			};
			let (password, token) = (field("password"), field("token"));

			return Ok(if password == Some(PASSWORD) || token == Some("123456") {
				state.fresh = true;

				reply(200, json!({ "message": "Logged in" }))
			} else {
				reply(401, json!({ "message": "Invalid email or password" }))
			});
		}
		if path == endpoints.register {
			return Ok(reply(400, json!({ "errors": { "email": "Email already registered" } })));
		}
		if path == endpoints.logout {
			state.fresh = false;

			return Ok(reply(200, json!({ "message": "Logged out" })));
		}
		if !state.fresh || state.always_unauthorized.contains(&path) {
			return Ok(reply(401, json!({ "message": "Access token expired" })));
		}
		if path == endpoints.validate {
			return Ok(reply(200, state.identity.clone()));
		}

		Ok(reply(200, json!({ "path": path })))
	}
}
impl ApiTransport for ScriptedTransport {
	fn send(&self, call: HttpCall) -> TransportFuture<'_> {
		Box::pin(async move {
			if call.method == Method::Post && call.url.path() == Endpoints::default().refresh {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.state.lock().calls.push(format!("POST {}", call.url.path()));

				if let Some(gate) = self.refresh_gate.clone() {
					gate.notified().await;
				}

				let mut state = self.state.lock();

				return Ok(if state.refresh_succeeds {
					state.fresh = true;

					reply(200, Value::Null)
				} else {
					reply(401, json!({ "message": "Refresh token expired" }))
				});
			}

			let reply = self.respond(&call);

			if call.url.path() == Endpoints::default().validate {
				if let Some(gate) = self.validate_gate.clone() {
					gate.notified().await;
				}
			}

			reply
		})
	}
}

pub struct ServerState {
	pub fresh: bool,
	pub refresh_succeeds: bool,
	pub calls: Vec<String>,
	pub always_unauthorized: Vec<String>,
	pub unreachable: Vec<String>,
	pub overrides: Vec<(String, (u16, Value))>,
	pub identity: Value,
}
impl Default for ServerState {
	fn default() -> Self {
		Self {
			fresh: false,
			refresh_succeeds: false,
			calls: Vec::new(),
			always_unauthorized: Vec::new(),
			unreachable: Vec::new(),
			overrides: Vec::new(),
			identity: json!({
				"user": {
					"_id": "u-42",
					"name": "Grace Hopper",
					"email": "grace@lms.test",
					"role": "department_teacher",
					"department": "Computer Science"
				}
			}),
		}
	}
}

fn reply(status: u16, body: Value) -> HttpReply {
	let bytes = if body.is_null() { Vec::new() } else { body.to_string().into_bytes() };

	HttpReply::new(status, bytes)
}

/// Clock that only moves when told to.
pub struct ManualClock(Mutex<OffsetDateTime>);
impl ManualClock {
	pub fn new() -> Self {
		Self(Mutex::new(OffsetDateTime::now_utc()))
	}

	pub fn advance(&self, by: time::Duration) {
		*self.0.lock() += by;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

pub struct Stack {
	pub transport: Arc<ScriptedTransport>,
	pub client: ApiClient<ScriptedTransport>,
	pub sessions: Arc<SessionCache<ScriptedTransport>>,
	pub account: AccountApi<ScriptedTransport>,
	pub events: SessionEvents,
	pub clock: Arc<ManualClock>,
}

pub fn config() -> ClientConfig {
	ClientConfig::builder(Url::parse(BASE_URL).expect("Test base URL should parse."))
		.build()
		.expect("Test configuration should build.")
}

pub fn stack(transport: ScriptedTransport) -> Stack {
	let transport = Arc::new(transport);
	let events = SessionEvents::default();
	let coordinator = Arc::new(RefreshCoordinator::new(events.clone()));
	let client = ApiClient::with_transport(config(), transport.clone(), coordinator);
	let clock = Arc::new(ManualClock::new());
	let sessions = Arc::new(SessionCache::with_clock(client.clone(), clock.clone()));
	let account = AccountApi::new(client.clone(), sessions.clone());

	Stack { transport, client, sessions, account, events, clock }
}

/// Counts session-expired notifications delivered to a subscriber.
pub fn count_expiry(events: &SessionEvents) -> Arc<AtomicUsize> {
	let hits = Arc::new(AtomicUsize::new(0));
	let counter = hits.clone();

	events.on_session_expired(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	hits
}

/// Opens `gate` once `queued` requests wait behind the in-flight refresh.
pub async fn release_when_queued(
	coordinator: &RefreshCoordinator,
	gate: &Notify,
	queued: usize,
) {
	while coordinator.pending() < queued {
		tokio::task::yield_now().await;
	}

	gate.notify_one();
}
