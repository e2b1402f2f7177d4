//! Session-expiry notifications.
//!
//! The pipeline announces a failed refresh cycle exactly once through [`SessionEvents`]; UI
//! layers subscribe with [`SessionEvents::on_session_expired`] to show a "log in again" prompt
//! or route to the login screen. When nobody is subscribed the event is logged and dropped.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Message used for refresh-cycle failures.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

type Handler = Arc<dyn Fn(&SessionExpired) + Send + Sync>;

/// Event delivered when the session can no longer be refreshed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionExpired {
	/// User-facing message.
	pub message: String,
}
impl Default for SessionExpired {
	fn default() -> Self {
		Self { message: SESSION_EXPIRED_MESSAGE.into() }
	}
}

/// Identifier returned by [`SessionEvents::on_session_expired`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(u64);

/// Shared subscriber list; clones observe the same handlers.
#[derive(Clone, Default)]
pub struct SessionEvents(Arc<EventsInner>);
impl SessionEvents {
	/// Registers a handler; handlers run in subscription order.
	pub fn on_session_expired<F>(&self, handler: F) -> Subscription
	where
		F: 'static + Fn(&SessionExpired) + Send + Sync,
	{
		let id = Subscription(self.0.next_id.fetch_add(1, Ordering::Relaxed));

		self.0.handlers.write().insert(id, Arc::new(handler));

		id
	}

	/// Removes a handler; returns `false` if it was already gone.
	pub fn unsubscribe(&self, subscription: Subscription) -> bool {
		self.0.handlers.write().remove(&subscription).is_some()
	}

	/// Number of live subscribers.
	pub fn subscribers(&self) -> usize {
		self.0.handlers.read().len()
	}

	/// Delivers `event` to every subscriber.
	pub fn emit(&self, event: &SessionExpired) {
		// Snapshot so handlers may subscribe or unsubscribe without deadlocking.
		let handlers = self.0.handlers.read().values().cloned().collect::<Vec<_>>();

		if handlers.is_empty() {
			#[cfg(feature = "tracing")]
			tracing::warn!(message = %event.message, "session expired with no subscribers");

			return;
		}

		for handler in handlers {
			handler(event);
		}
	}
}
impl Debug for SessionEvents {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionEvents").field("subscribers", &self.subscribers()).finish()
	}
}

#[derive(Default)]
struct EventsInner {
	next_id: AtomicU64,
	handlers: RwLock<BTreeMap<Subscription, Handler>>,
}
