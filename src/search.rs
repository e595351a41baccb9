//! Debounced event search with stale-response suppression.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventFilter, EventService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// Hands out increasing request ids; only the newest is current.
///
/// A response is applied only if the id it was issued under is still
/// current, so an older request finishing late cannot overwrite a newer one.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
}

impl RequestTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding all earlier ones.
    pub fn begin(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    #[must_use]
    pub fn is_current(&self, id: RequestId) -> bool {
        self.latest.load(Ordering::Acquire) == id.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    Idle,
    /// Input received; waiting for typing to pause.
    Waiting { query: String },
    Loading { query: String },
    Ready { query: String, events: Vec<Event> },
    Failed { query: String, message: String },
}

/// Search-as-you-type over the event listing.
///
/// Each [`submit`](Self::submit) supersedes the previous one. A query is sent
/// only once `delay` passes without newer input; results are published on a
/// `watch` channel. Dropping the search cancels whatever is in flight.
pub struct DebouncedSearch {
    events: EventService,
    base: EventFilter,
    delay: Duration,
    tracker: Arc<RequestTracker>,
    state: Arc<watch::Sender<SearchState>>,
    shutdown: CancellationToken,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for DebouncedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedSearch")
            .field("delay", &self.delay)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl DebouncedSearch {
    /// `base` supplies the non-text filters (category, dates, prices).
    #[must_use]
    pub fn new(events: EventService, base: EventFilter, delay: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            events,
            base,
            delay,
            tracker: Arc::new(RequestTracker::new()),
            state: Arc::new(state),
            shutdown: CancellationToken::new(),
            in_flight: Mutex::new(None),
        }
    }

    /// Replace the pending query. Must be called from within a Tokio runtime.
    pub fn submit(&self, query: impl Into<String>) {
        let query = query.into().trim().to_string();
        let id = self.tracker.begin();
        let cancel = self.shutdown.child_token();
        if let Some(previous) = self.in_flight.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        self.state.send_replace(SearchState::Waiting {
            query: query.clone(),
        });

        let run = SearchRun {
            events: self.events.clone(),
            filter: self.base.clone().with_search(query.clone()),
            delay: self.delay,
            tracker: Arc::clone(&self.tracker),
            state: Arc::clone(&self.state),
            cancel,
            id,
            query,
        };
        tokio::spawn(run.execute());
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct SearchRun {
    events: EventService,
    filter: EventFilter,
    delay: Duration,
    tracker: Arc<RequestTracker>,
    state: Arc<watch::Sender<SearchState>>,
    cancel: CancellationToken,
    id: RequestId,
    query: String,
}

impl SearchRun {
    async fn execute(self) {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return,
            () = tokio::time::sleep(self.delay) => {}
        }
        if !self.tracker.is_current(self.id) {
            return;
        }

        self.state.send_replace(SearchState::Loading {
            query: self.query.clone(),
        });
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return,
            result = self.events.list(&self.filter) => result,
        };

        if self.cancel.is_cancelled() || !self.tracker.is_current(self.id) {
            tracing::debug!(query = %self.query, "Discarding stale search results");
            return;
        }
        let next = match result {
            Ok(page) => SearchState::Ready {
                query: self.query,
                events: page.items,
            },
            Err(e) => {
                tracing::warn!(query = %self.query, error = %e, "Event search failed");
                SearchState::Failed {
                    query: self.query,
                    message: e.user_message(),
                }
            }
        };
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_request_is_current() {
        let tracker = RequestTracker::new();
        let first = tracker.begin();
        assert!(tracker.is_current(first));
        let second = tracker.begin();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn tracker_is_shared_across_threads() {
        let tracker = Arc::new(RequestTracker::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || (0..100).map(|_| tracker.begin()).last())
            })
            .collect();
        let mut last_ids: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        last_ids.sort();
        assert_eq!(last_ids.len(), 4);
        assert!(tracker.is_current(*last_ids.last().unwrap()));
    }
}
