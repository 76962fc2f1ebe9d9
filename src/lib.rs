mod clock;
pub use clock::{PlaybackClock, MIN_DELAY};
mod debouncer;
pub use debouncer::SearchDebouncer;
mod error;
pub use error::RadioError;
mod events;
pub use events::RadioEvent;
pub mod models;
pub use models::{Artist, NowPlaying, PlaybackSnapshot, SearchResults, Track};
mod service;
pub use service::{HttpRadioService, RadioService};
mod session;
pub use session::SessionGate;
mod settings;
pub use settings::{Settings, SETTINGS};
mod state;
pub use state::SyncState;
mod submitter;
pub use submitter::RequestSubmitter;
mod synchronizer;
pub use synchronizer::NowPlayingSynchronizer;
mod utils;
pub use utils::normalize_query;

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// One listener's view of the radio for the lifetime of a page session:
/// what is playing, what is queued, catalog search and song requests.
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To enable logs, you'll need to
/// initialize a tracing subscriber in your application.
///
/// Example using `tracing_subscriber`:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG)
///     .finish();
///
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
///
/// - `DEBUG`: every poll, search and stale response that was discarded
/// - `INFO`: lifecycle, track changes, submitted requests
/// - `WARN`: failed polls, searches and submits
pub struct RadioClient {
    service: Arc<dyn RadioService>,
    login_url: String,
    event_sender: broadcast::Sender<RadioEvent>,
    session: SessionGate,
    synchronizer: NowPlayingSynchronizer,
    search: SearchDebouncer,
    submitter: RequestSubmitter,
}

impl RadioClient {
    /// Client talking HTTP to `settings.api_url`.
    pub fn new(settings: &Settings) -> Result<Self, RadioError> {
        let service = HttpRadioService::new(settings, None)?;
        Ok(Self::with_service(Arc::new(service), settings))
    }

    /// Client configured from the environment (see [`Settings::from_env`]).
    pub fn from_env() -> Result<Self, RadioError> {
        Self::new(&SETTINGS)
    }

    /// Client over any [`RadioService`] implementation.
    pub fn with_service(service: Arc<dyn RadioService>, settings: &Settings) -> Self {
        let (event_sender, _) = broadcast::channel(settings.event_buffer_capacity.max(1));
        let session = SessionGate::new();
        let synchronizer =
            NowPlayingSynchronizer::new(Arc::clone(&service), settings, event_sender.clone());
        let search = SearchDebouncer::new(Arc::clone(&service), settings, event_sender.clone());
        let submitter =
            RequestSubmitter::new(Arc::clone(&service), session.clone(), event_sender.clone());

        Self {
            service,
            login_url: settings.login_url(),
            event_sender,
            session,
            synchronizer,
            search,
            submitter,
        }
    }

    /// Starts now-playing sync, then resolves the session and, when
    /// privileged, loads the listener's existing requests. Returns whether
    /// the session is privileged.
    pub async fn start(&self) -> bool {
        info!("Starting radio client.");
        self.synchronizer.start();

        let privileged = self.session.resolve(self.service.as_ref()).await;
        let _ = self
            .event_sender
            .send(RadioEvent::SessionResolved { privileged });

        if privileged {
            match self.submitter.hydrate().await {
                Ok(count) => debug!(count, "Loaded existing requests."),
                Err(e) => warn!(error = %e, "Could not load existing requests."),
            }
        }
        privileged
    }

    /// Stops now-playing sync and drops any pending or in-flight search.
    /// Safe to call repeatedly.
    pub fn stop(&self) {
        self.synchronizer.stop();
        self.search.clear();
        info!("Radio client stopped.");
    }

    /// Host hook for page visibility changes.
    pub fn on_visibility_change(&self, visible: bool) {
        if visible {
            self.synchronizer.reactivate();
        } else {
            debug!("Page hidden, timers may be delayed until it is shown again.");
        }
    }

    /// Feeds the latest search box value into the debouncer.
    pub fn search_input(&self, query: &str) {
        self.search.on_input(query);
    }

    /// Requests `track` for the shared queue. Fails with
    /// [`RadioError::DuplicateRequest`] for a track already requested this
    /// session and with [`RadioError::Unauthorized`] when not signed in.
    pub async fn request(&self, track: &Track) -> Result<Track, RadioError> {
        self.submitter.submit(track).await
    }

    /// The latest now-playing snapshot, with its receive time.
    pub fn now_playing(&self) -> PlaybackSnapshot {
        self.synchronizer.snapshot()
    }

    /// Upcoming tracks in server order.
    pub fn queue(&self) -> Vec<Track> {
        self.synchronizer.queue()
    }

    /// Results of the latest completed search.
    pub fn search_results(&self) -> SearchResults {
        self.search.results()
    }

    /// Whether the session check found a signed-in listener.
    pub fn is_privileged(&self) -> bool {
        self.session.is_privileged()
    }

    /// Where to send the listener when a privileged action needs a sign-in.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Get a receiver for radio events
    pub fn event_receiver(&self) -> broadcast::Receiver<RadioEvent> {
        self.event_sender.subscribe()
    }

    /// Watch channel that always holds the current now-playing snapshot.
    pub fn subscribe_now_playing(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.synchronizer.subscribe_snapshot()
    }

    /// The now-playing synchronizer, for state and queue subscriptions.
    pub fn synchronizer(&self) -> &NowPlayingSynchronizer {
        &self.synchronizer
    }

    /// The search debouncer.
    pub fn search(&self) -> &SearchDebouncer {
        &self.search
    }

    /// The request submitter and its RequestedSet.
    pub fn submitter(&self) -> &RequestSubmitter {
        &self.submitter
    }

    /// The session gate.
    pub fn session(&self) -> &SessionGate {
        &self.session
    }
}

impl std::fmt::Debug for RadioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioClient")
            .field("login_url", &self.login_url)
            .field("synchronizer", &self.synchronizer)
            .field("session", &self.session)
            .finish()
    }
}
