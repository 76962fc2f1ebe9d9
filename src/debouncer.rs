use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::RadioError;
use crate::events::RadioEvent;
use crate::models::{SearchResults, Track};
use crate::service::RadioService;
use crate::settings::Settings;
use crate::utils::normalize_query;

#[derive(Default)]
struct ActiveSearch {
    latest_id: u64,
    query: String,
    token: Option<CancellationToken>,
}

struct DebouncerInner {
    service: Arc<dyn RadioService>,
    window: Duration,
    active: Mutex<ActiveSearch>,
    results_tx: watch::Sender<SearchResults>,
    event_sender: broadcast::Sender<RadioEvent>,
}

/// Turns keystrokes into at most one relevant catalog search.
///
/// Every input restarts the debounce window and supersedes whatever search
/// was pending or in flight; only the response to the latest request id is
/// ever published.
pub struct SearchDebouncer {
    inner: Arc<DebouncerInner>,
}

impl SearchDebouncer {
    pub fn new(
        service: Arc<dyn RadioService>,
        settings: &Settings,
        event_sender: broadcast::Sender<RadioEvent>,
    ) -> Self {
        let (results_tx, _) = watch::channel(SearchResults::default());
        Self {
            inner: Arc::new(DebouncerInner {
                service,
                window: settings.search_debounce,
                active: Mutex::new(ActiveSearch::default()),
                results_tx,
                event_sender,
            }),
        }
    }

    /// Records the latest search box value. Empty (or whitespace-only) input
    /// clears the results immediately without touching the network.
    /// Must be called from within a tokio runtime.
    pub fn on_input(&self, raw: &str) {
        let query = normalize_query(raw);
        let mut active = self.inner.active();
        if let Some(previous) = active.token.take() {
            trace!(id = active.latest_id, "Superseding pending search.");
            previous.cancel();
        }
        active.latest_id = active.latest_id.wrapping_add(1);
        active.query = query.clone();

        if query.is_empty() {
            self.inner.results_tx.send_replace(SearchResults::default());
            let _ = self.inner.event_sender.send(RadioEvent::SearchCleared);
            debug!("Search input cleared.");
            return;
        }

        let id = active.latest_id;
        let token = CancellationToken::new();
        active.token = Some(token.clone());
        drop(active);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.debounce_and_search(id, query, token));
    }

    /// Same as an empty input.
    pub fn clear(&self) {
        self.on_input("");
    }

    /// The normalised value of the latest input.
    pub fn current_query(&self) -> String {
        self.inner.active().query.clone()
    }

    /// True while a search is waiting out the debounce window or in flight.
    pub fn is_pending(&self) -> bool {
        self.inner.active().token.is_some()
    }

    pub fn results(&self) -> SearchResults {
        self.inner.results_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.inner.results_tx.subscribe()
    }
}

impl DebouncerInner {
    fn active(&self) -> MutexGuard<'_, ActiveSearch> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn debounce_and_search(
        self: Arc<Self>,
        id: u64,
        query: String,
        token: CancellationToken,
    ) {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = sleep(self.window) => {}
        }

        debug!(id, %query, "Issuing catalog search.");
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                trace!(id, "In-flight search cancelled.");
                return;
            }
            result = self.service.search(&query) => result,
        };
        if let Err(e) = self.publish(id, query, result) {
            debug!(id, error = %e, "Discarding search results.");
        }
    }

    /// Publishes the response to search `id` unless a newer input superseded it.
    fn publish(
        &self,
        id: u64,
        query: String,
        result: Result<Vec<Track>, RadioError>,
    ) -> Result<(), RadioError> {
        let mut active = self.active();
        if active.latest_id != id {
            trace!(id, latest = active.latest_id, "Search superseded.");
            return Err(RadioError::StaleResponse);
        }
        active.token = None;

        match result {
            Ok(tracks) => {
                debug!(id, %query, results = tracks.len(), "Search completed.");
                let results = tracks.len();
                self.results_tx
                    .send_replace(SearchResults::completed(query.clone(), tracks));
                let _ = self
                    .event_sender
                    .send(RadioEvent::SearchCompleted { query, results });
            }
            Err(e) => {
                warn!(id, %query, error = %e, "Search failed.");
                self.results_tx
                    .send_replace(SearchResults::failed(query.clone()));
                let _ = self.event_sender.send(RadioEvent::SearchFailed { query });
            }
        }
        Ok(())
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        if let Some(token) = self.inner.active().token.take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for SearchDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchDebouncer")
            .field("window", &self.inner.window)
            .field("query", &self.current_query())
            .finish()
    }
}
