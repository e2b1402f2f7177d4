//! Cached "who am I" reads backed by the validation endpoint.
//!
//! [`SessionCache::get_session`] returns `Ok(None)` when the user is not logged in. A 401 from
//! the validation endpoint goes through the regular refresh pipeline first, so an expired access
//! cookie is renewed transparently; only an unrecoverable session reads as `None`. Other
//! failures (5xx, network, malformed payloads) are returned as errors and never cached, which
//! keeps "not logged in" distinguishable from "server unreachable".

mod identity;

pub use identity::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	client::{self, ApiClient},
	http::ApiTransport,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// Fixed key the current session is cached under.
pub const SESSION_CACHE_KEY: &str = "current session";

/// Source of "now" for freshness checks.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock [`Clock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Single-entry cache of the current [`Session`].
pub struct SessionCache<T>
where
	T: ?Sized + ApiTransport,
{
	client: ApiClient<T>,
	ttl: Duration,
	clock: Arc<dyn Clock>,
	entry: RwLock<Option<CachedSession>>,
	fetch_guard: AsyncMutex<()>,
	generation: AtomicU64,
}
impl<T> SessionCache<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a cache using the client's configured freshness window and the system clock.
	pub fn new(client: ApiClient<T>) -> Self {
		Self::with_clock(client, Arc::new(SystemClock))
	}

	/// Creates a cache driven by a caller-provided clock.
	pub fn with_clock(client: ApiClient<T>, clock: Arc<dyn Clock>) -> Self {
		let ttl = client.config().session_ttl;

		Self {
			client,
			ttl,
			clock,
			entry: RwLock::new(None),
			fetch_guard: AsyncMutex::new(()),
			generation: AtomicU64::new(0),
		}
	}

	/// Freshness window applied to cached entries.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the current session, or `None` when not logged in.
	///
	/// Fresh entries are served without I/O. Concurrent callers that find the entry stale share
	/// a single validation call.
	pub async fn get_session(&self) -> Result<Option<Session>> {
		if let Some(hit) = self.fresh() {
			return Ok(hit);
		}

		let _singleflight = self.fetch_guard.lock().await;

		if let Some(hit) = self.fresh() {
			return Ok(hit);
		}

		let generation = self.generation.load(Ordering::Acquire);
		let fetched = self.fetch().await?;
		let mut entry = self.entry.write();

		// An invalidation during the fetch makes this result stale; hand it back uncached.
		if self.generation.load(Ordering::Acquire) == generation {
			*entry = Some(CachedSession { session: fetched.clone(), fetched_at: self.clock.now() });
		}

		Ok(fetched)
	}

	/// Returns the cached value regardless of freshness, without I/O.
	pub fn peek(&self) -> Option<Option<Session>> {
		self.entry.read().as_ref().map(|cached| cached.session.clone())
	}

	/// Drops the cached entry so the next read refetches.
	pub fn invalidate(&self) {
		self.generation.fetch_add(1, Ordering::AcqRel);
		*self.entry.write() = None;

		#[cfg(feature = "tracing")]
		tracing::debug!(key = SESSION_CACHE_KEY, "session cache invalidated");
	}

	fn fresh(&self) -> Option<Option<Session>> {
		let now = self.clock.now();

		self.entry
			.read()
			.as_ref()
			.filter(|cached| now - cached.fetched_at < self.ttl)
			.map(|cached| cached.session.clone())
	}

	async fn fetch(&self) -> Result<Option<Session>> {
		const KIND: CallKind = CallKind::Session;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let path = self.client.config().endpoints.validate.as_str();
		let result = CallSpan::new(KIND, "validate_session")
			.instrument(async move {
				match self.client.get(path).await {
					Ok(body) => decode_session(body).map(Some),
					Err(err) if err.is_unauthorized() => Ok(None),
					Err(Error::SessionExpired { .. }) => Ok(None),
					Err(err) => Err(err),
				}
			})
			.await;

		obs::record_call_outcome(KIND, CallOutcome::of(&result));

		result
	}
}
impl<T> Debug for SessionCache<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionCache")
			.field("key", &SESSION_CACHE_KEY)
			.field("ttl", &self.ttl)
			.field("cached", &self.entry.read().is_some())
			.finish()
	}
}

struct CachedSession {
	session: Option<Session>,
	fetched_at: OffsetDateTime,
}

/// Accepts both a bare identity object and one wrapped as `{ "user": { .. } }`.
fn decode_session(body: Value) -> Result<Session> {
	match body {
		Value::Object(mut map) if map.get("user").is_some_and(Value::is_object) =>
			client::decode(map.remove("user").unwrap_or_default()),
		other => client::decode(other),
	}
}
