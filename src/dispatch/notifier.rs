//! Lifecycle event fan-out to registered observers.
//!
//! Observers are plain synchronous callbacks filtered by event type and
//! invoked in registration order; their failures are logged and never abort
//! the emitting transition.

use super::router::CallbackError;

/// Result type for observer callbacks.
pub type ObserverResult = std::result::Result<(), CallbackError>;

/// Session lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionEvent {
    /// Session reached the connected state.
    Connected = 0,
    /// The connection was closed (by the peer, a failure, or a stop).
    ConnectionClosed = 1,
    /// A reconnect attempt is being scheduled.
    Reconnecting = 2,
    /// Reconnect attempts are exhausted; the session is closed for good.
    Failed = 3,
}

impl SessionEvent {
    /// All lifecycle events, in code order.
    pub const ALL: [SessionEvent; 4] = [
        SessionEvent::Connected,
        SessionEvent::ConnectionClosed,
        SessionEvent::Reconnecting,
        SessionEvent::Failed,
    ];

    /// Stable event code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Set of lifecycle events an observer is interested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter(u8);

impl EventFilter {
    /// Filter matching exactly the given events.
    pub fn of(events: &[SessionEvent]) -> Self {
        Self(events.iter().fold(0, |mask, ev| mask | 1 << ev.code()))
    }

    /// Filter matching every lifecycle event.
    pub fn all() -> Self {
        Self(u8::MAX)
    }

    /// Check whether an event is in the filter.
    #[inline]
    pub fn contains(&self, event: SessionEvent) -> bool {
        self.0 & (1 << event.code()) != 0
    }
}

type BoxedObserver = Box<dyn Fn(SessionEvent) -> ObserverResult + Send + Sync>;

/// Fan-out of lifecycle events, independent of message content.
#[derive(Default)]
pub struct EventNotifier {
    registrations: Vec<(EventFilter, BoxedObserver)>,
}

impl EventNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for the given lifecycle events.
    pub fn register<F>(&mut self, events: &[SessionEvent], observer: F)
    where
        F: Fn(SessionEvent) -> ObserverResult + Send + Sync + 'static,
    {
        self.registrations
            .push((EventFilter::of(events), Box::new(observer)));
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Check if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Invoke all observers whose filter contains `event`, in registration
    /// order.
    pub fn emit(&self, event: SessionEvent) {
        for (idx, (filter, observer)) in self.registrations.iter().enumerate() {
            if !filter.contains(event) {
                continue;
            }
            if let Err(e) = observer(event) {
                tracing::error!(observer = idx, ?event, "event observer failed: {}", e);
            }
        }
    }
}
