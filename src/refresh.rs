//! Refresh coordination for requests that fail with 401.
//!
//! [`RefreshCoordinator`] guarantees that at most one refresh call is outstanding at a time.
//! The first request to hit a 401 while the coordinator is idle becomes the cycle leader and
//! issues the refresh; every request that 401s while that call is in flight is queued. When the
//! refresh settles, the queue is detached and the coordinator returns to idle in a single
//! critical section, so a later 401 can start a fresh cycle. The detached queue is then drained:
//!
//! - on success the leader's request and every queued request are replayed once, started in FIFO
//!   enqueue order, and each waiter receives its own replay's outcome;
//! - on failure every waiter receives [`Error::SessionExpired`] and the session-expired event is
//!   emitted exactly once for the cycle.
//!
//! Replays carry [`Attempt::Retry`](crate::request::Attempt::Retry); a second 401 is returned to
//! the caller and never re-enters the coordinator.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use futures_util::future;
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	notify::{SessionEvents, SessionExpired},
	obs::{self, CallKind, CallOutcome, CallSpan},
	request::{Attempt, PendingRequest},
};

/// Boxed future returned by [`RefreshBackend`] operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Operations the coordinator needs from the HTTP client.
pub trait RefreshBackend
where
	Self: Send + Sync,
{
	/// Calls the refresh endpoint; `Ok` means new session credentials are in place.
	fn refresh(&self) -> BackendFuture<'_, ()>;

	/// Dispatches a request once more without entering the refresh path again.
	fn replay(&self, pending: PendingRequest) -> BackendFuture<'_, Value>;
}

/// Single-refresh coordinator shared by every client clone.
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
	events: SessionEvents,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator that announces expiry through `events`.
	pub fn new(events: SessionEvents) -> Self {
		Self { state: Default::default(), events, metrics: Default::default() }
	}

	/// Subscriber hub used for session-expired announcements.
	pub fn events(&self) -> &SessionEvents {
		&self.events
	}

	/// Cycle counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Number of requests waiting for the in-flight refresh.
	pub fn pending(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Recovers a request that failed with 401 on its first attempt.
	///
	/// Starts a refresh cycle when idle, otherwise joins the one in flight. `retry` must already
	/// be promoted with [`PendingRequest::into_retry`].
	pub async fn recover(
		&self,
		backend: &dyn RefreshBackend,
		retry: PendingRequest,
	) -> Result<Value> {
		debug_assert_eq!(retry.attempt(), Attempt::Retry);

		let role = {
			let mut state = self.state.lock();

			if state.refreshing {
				let (reply, receiver) = oneshot::channel();

				state.queue.push_back(Waiter { pending: retry, reply });

				Role::Follower(receiver)
			} else {
				state.refreshing = true;

				Role::Leader(retry)
			}
		};

		match role {
			Role::Follower(receiver) => {
				self.metrics.record_queued();

				#[cfg(feature = "tracing")]
				tracing::debug!("request queued behind in-flight refresh");

				receiver.await.unwrap_or_else(|_| Err(Error::RefreshAbandoned))
			},
			Role::Leader(retry) => self.lead(backend, retry).await,
		}
	}

	async fn lead(&self, backend: &dyn RefreshBackend, own: PendingRequest) -> Result<Value> {
		const KIND: CallKind = CallKind::Refresh;

		let cycle = CycleGuard { coordinator: self, armed: true };
		let span = CallSpan::new(KIND, "refresh_cycle");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.metrics.record_attempt();

		let refreshed = span.instrument(backend.refresh()).await;
		let waiters = cycle.settle();

		obs::record_call_outcome(KIND, CallOutcome::of(&refreshed));

		match refreshed {
			Ok(()) => {
				self.metrics.record_success();

				span.instrument(self.replay_all(backend, own, waiters)).await
			},
			Err(err) => {
				self.metrics.record_failure();

				let reason = err.to_string();

				#[cfg(feature = "tracing")]
				tracing::warn!(
					error = %reason,
					queued = waiters.len(),
					"refresh failed; rejecting queued requests"
				);

				for Waiter { reply, .. } in waiters {
					let _ = reply.send(Err(Error::SessionExpired { reason: reason.clone() }));
				}

				self.events.emit(&SessionExpired::default());

				Err(Error::SessionExpired { reason })
			},
		}
	}

	async fn replay_all(
		&self,
		backend: &dyn RefreshBackend,
		own: PendingRequest,
		waiters: VecDeque<Waiter>,
	) -> Result<Value> {
		self.metrics.record_replays(waiters.len() as u64 + 1);

		// `join`/`join_all` poll in order, so dispatch starts in FIFO enqueue order.
		let queued = waiters.into_iter().map(|Waiter { pending, reply }| async move {
			let _ = reply.send(backend.replay(pending).await);
		});
		let (own_outcome, _) = future::join(backend.replay(own), future::join_all(queued)).await;

		own_outcome
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &state.refreshing)
			.field("pending", &state.queue.len())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[derive(Default)]
struct RefreshState {
	refreshing: bool,
	queue: VecDeque<Waiter>,
}

struct Waiter {
	pending: PendingRequest,
	reply: oneshot::Sender<Result<Value>>,
}

enum Role {
	Leader(PendingRequest),
	Follower(oneshot::Receiver<Result<Value>>),
}

/// Resets the coordinator if the leader is dropped before the refresh settles; dropping the
/// detached senders fails every waiter with [`Error::RefreshAbandoned`].
struct CycleGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	armed: bool,
}
impl CycleGuard<'_> {
	fn settle(mut self) -> VecDeque<Waiter> {
		self.armed = false;

		self.detach()
	}

	fn detach(&self) -> VecDeque<Waiter> {
		let mut state = self.coordinator.state.lock();

		state.refreshing = false;

		mem::take(&mut state.queue)
	}
}
impl Drop for CycleGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			let abandoned = self.detach();

			#[cfg(feature = "tracing")]
			tracing::warn!(queued = abandoned.len(), "refresh cycle abandoned");

			drop(abandoned);
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration as StdDuration,
	};
	// crates.io
	use serde_json::json;
	use tokio::sync::Notify;
	// self
	use super::*;
	use crate::{
		error::ApiError,
		request::{ApiRequest, Method},
	};

	#[derive(Default)]
	struct FakeBackend {
		refresh_calls: AtomicUsize,
		refresh_fails: bool,
		gate: Notify,
		replayed: Mutex<Vec<String>>,
		still_unauthorized: Vec<String>,
	}
	impl FakeBackend {
		fn failing() -> Self {
			Self { refresh_fails: true, ..Default::default() }
		}
	}
	impl RefreshBackend for FakeBackend {
		fn refresh(&self) -> BackendFuture<'_, ()> {
			Box::pin(async move {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.gate.notified().await;

				if self.refresh_fails {
					Err(ApiError::new(401, json!({ "message": "Refresh token expired" })).into())
				} else {
					Ok(())
				}
			})
		}

		fn replay(&self, pending: PendingRequest) -> BackendFuture<'_, Value> {
			Box::pin(async move {
				assert_eq!(pending.attempt(), Attempt::Retry);

				let path = pending.request.path.clone();

				self.replayed.lock().push(path.clone());

				if self.still_unauthorized.contains(&path) {
					Err(ApiError::new(401, Value::Null).into())
				} else {
					Ok(json!({ "path": path }))
				}
			})
		}
	}

	fn retry(path: &str) -> PendingRequest {
		PendingRequest::new(ApiRequest::new(Method::Get, path))
			.into_retry()
			.expect("Fresh request should be promotable to a retry.")
	}

	async fn release_when_queued(
		coordinator: &RefreshCoordinator,
		backend: &FakeBackend,
		queued: usize,
	) {
		while coordinator.pending() < queued {
			tokio::task::yield_now().await;
		}

		backend.gate.notify_one();
	}

	#[tokio::test]
	async fn concurrent_unauthorized_requests_share_one_refresh() {
		let coordinator = RefreshCoordinator::new(SessionEvents::default());
		let backend = FakeBackend::default();
		let (a, b, c, ()) = tokio::join!(
			coordinator.recover(&backend, retry("/a")),
			coordinator.recover(&backend, retry("/b")),
			coordinator.recover(&backend, retry("/c")),
			release_when_queued(&coordinator, &backend, 2),
		);

		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
		assert_eq!(a.expect("Leader replay should succeed."), json!({ "path": "/a" }));
		assert_eq!(b.expect("Queued replay should succeed."), json!({ "path": "/b" }));
		assert_eq!(c.expect("Queued replay should succeed."), json!({ "path": "/c" }));
		assert_eq!(*backend.replayed.lock(), vec!["/a", "/b", "/c"]);
		assert!(!coordinator.is_refreshing());
		assert_eq!(coordinator.pending(), 0);
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert_eq!(coordinator.metrics().queued(), 2);
		assert_eq!(coordinator.metrics().replays(), 3);
	}

	#[tokio::test]
	async fn failed_refresh_rejects_all_and_notifies_once() {
		let events = SessionEvents::default();
		let notified = Arc::new(AtomicUsize::new(0));
		let counter = notified.clone();

		events.on_session_expired(move |event| {
			assert_eq!(event, &SessionExpired::default());
			counter.fetch_add(1, Ordering::SeqCst);
		});

		let coordinator = RefreshCoordinator::new(events);
		let backend = FakeBackend::failing();
		let (a, b, c, ()) = tokio::join!(
			coordinator.recover(&backend, retry("/a")),
			coordinator.recover(&backend, retry("/b")),
			coordinator.recover(&backend, retry("/c")),
			release_when_queued(&coordinator, &backend, 2),
		);

		for outcome in [a, b, c] {
			assert!(matches!(outcome, Err(Error::SessionExpired { .. })));
		}

		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
		assert_eq!(notified.load(Ordering::SeqCst), 1);
		assert!(backend.replayed.lock().is_empty());
		assert!(!coordinator.is_refreshing());
		assert_eq!(coordinator.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn replay_that_fails_again_is_not_retried() {
		let coordinator = RefreshCoordinator::new(SessionEvents::default());
		let backend = FakeBackend { still_unauthorized: vec!["/a".into()], ..Default::default() };

		backend.gate.notify_one();

		let outcome = coordinator.recover(&backend, retry("/a")).await;

		assert!(matches!(outcome, Err(ref err) if err.is_unauthorized()));
		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
		assert_eq!(*backend.replayed.lock(), vec!["/a"]);
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn sequential_cycles_each_refresh_once() {
		let coordinator = RefreshCoordinator::new(SessionEvents::default());
		let backend = FakeBackend::default();

		backend.gate.notify_one();
		coordinator.recover(&backend, retry("/a")).await.expect("First cycle should succeed.");
		backend.gate.notify_one();
		coordinator.recover(&backend, retry("/b")).await.expect("Second cycle should succeed.");

		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn dropped_leader_abandons_queued_requests() {
		let coordinator = RefreshCoordinator::new(SessionEvents::default());
		let backend = FakeBackend::default();
		let leader = tokio::time::timeout(
			StdDuration::from_millis(20),
			coordinator.recover(&backend, retry("/a")),
		);
		let (timed_out, follower) =
			tokio::join!(leader, coordinator.recover(&backend, retry("/b")));

		assert!(timed_out.is_err());
		assert!(matches!(follower, Err(Error::RefreshAbandoned)));
		assert!(!coordinator.is_refreshing());
		assert_eq!(coordinator.pending(), 0);
	}
}
