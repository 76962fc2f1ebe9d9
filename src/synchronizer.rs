use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::clock::PlaybackClock;
use crate::error::RadioError;
use crate::events::RadioEvent;
use crate::models::{NowPlaying, PlaybackSnapshot, Track};
use crate::service::RadioService;
use crate::settings::Settings;
use crate::state::SyncState;

#[derive(Default)]
struct Lifecycle {
    generation: u64,
    cancel: Option<CancellationToken>,
}

struct SyncInner {
    service: Arc<dyn RadioService>,
    clock: PlaybackClock,
    failure_retry_delay: Duration,
    lifecycle: Mutex<Lifecycle>,
    latest_queue_request: AtomicU64,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    queue_tx: watch::Sender<Vec<Track>>,
    state_tx: watch::Sender<SyncState>,
    event_sender: broadcast::Sender<RadioEvent>,
    wake: Notify,
}

/// Keeps the "what is playing now" view in step with the server.
///
/// Every cycle fetches now-playing, then arms a single one-shot timer for when
/// the current track should end (see [`PlaybackClock`]). The queue is
/// refreshed alongside in its own task so a slow `/queue` never holds back
/// the now-playing display.
/// Because each cycle re-anchors on the server's reported position, drift
/// does not accumulate the way it would with a fixed polling interval.
///
/// Each `start`/`stop` advances a generation counter; responses fetched under
/// an older generation are dropped without touching state. Queue responses
/// additionally carry a request id and only the latest one is applied.
pub struct NowPlayingSynchronizer {
    inner: Arc<SyncInner>,
}

impl NowPlayingSynchronizer {
    pub fn new(
        service: Arc<dyn RadioService>,
        settings: &Settings,
        event_sender: broadcast::Sender<RadioEvent>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(PlaybackSnapshot::nothing_playing());
        let (queue_tx, _) = watch::channel(Vec::new());
        let (state_tx, _) = watch::channel(SyncState::Idle);
        let clock = PlaybackClock::new(settings.resync_min_delay);
        // The sentinel has no duration, so the clock floors it.
        let failure_retry_delay = clock
            .next_delay(&Track::sentinel(), 0)
            .max(settings.failure_retry_delay);

        Self {
            inner: Arc::new(SyncInner {
                service,
                clock,
                failure_retry_delay,
                lifecycle: Mutex::new(Lifecycle::default()),
                latest_queue_request: AtomicU64::new(0),
                snapshot_tx,
                queue_tx,
                state_tx,
                event_sender,
                wake: Notify::new(),
            }),
        }
    }

    /// Starts the poll loop with an immediate fetch. No-op while already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut lifecycle = self.inner.lifecycle();
        if lifecycle.cancel.is_some() {
            debug!("Synchronizer already running, start ignored.");
            return;
        }
        lifecycle.generation = lifecycle.generation.wrapping_add(1);
        let generation = lifecycle.generation;
        let token = CancellationToken::new();
        lifecycle.cancel = Some(token.clone());
        self.inner.state_tx.send_replace(SyncState::Polling);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.run(generation, token));
        info!(generation, "Now-playing synchronizer started.");
    }

    /// Cancels the pending timer and any in-flight fetch. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle();
        lifecycle.generation = lifecycle.generation.wrapping_add(1);
        if let Some(token) = lifecycle.cancel.take() {
            token.cancel();
            info!(
                generation = lifecycle.generation,
                "Now-playing synchronizer stopped."
            );
        }
        // Running tasks observe the token and exit on their own.
        self.inner.state_tx.send_replace(SyncState::Idle);
    }

    /// The host page became visible again: drop the pending timer and resync now.
    /// Does nothing while a fetch is already in flight or when stopped.
    pub fn reactivate(&self) {
        match self.state() {
            SyncState::Scheduled { .. } => {
                info!("Page reactivated, resynchronising now-playing.");
                self.inner.wake.notify_waiters();
            }
            SyncState::Polling => trace!("Reactivation while polling, nothing to do."),
            SyncState::Idle => debug!("Reactivation ignored, synchronizer is stopped."),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state_tx.borrow()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lifecycle().generation
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn now_playing(&self) -> NowPlaying {
        self.inner.snapshot_tx.borrow().now_playing.clone()
    }

    pub fn queue(&self) -> Vec<Track> {
        self.inner.queue_tx.borrow().clone()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn subscribe_queue(&self) -> watch::Receiver<Vec<Track>> {
        self.inner.queue_tx.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.inner.state_tx.subscribe()
    }
}

impl SyncInner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` only if `generation` is still current, holding the lifecycle
    /// lock so a concurrent `stop` cannot interleave.
    fn if_current<R>(&self, generation: u64, f: impl FnOnce() -> R) -> Result<R, RadioError> {
        let lifecycle = self.lifecycle();
        if lifecycle.generation != generation {
            return Err(RadioError::StaleResponse);
        }
        let out = f();
        drop(lifecycle);
        Ok(out)
    }

    async fn run(self: Arc<Self>, generation: u64, cancel: CancellationToken) {
        loop {
            if let Err(e) =
                self.if_current(generation, || self.state_tx.send_replace(SyncState::Polling))
            {
                debug!(generation, error = %e, "Poll loop superseded.");
                break;
            }

            let request = self.latest_queue_request.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(Arc::clone(&self).refresh_queue(generation, request, cancel.clone()));

            trace!(generation, "Polling now-playing.");
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.service.now_playing() => polled,
            };

            let delay = match self.if_current(generation, || self.apply_now_playing(polled)) {
                Ok(delay) => delay,
                Err(e) => {
                    debug!(generation, error = %e, "Discarding now-playing response.");
                    break;
                }
            };

            // Register interest before announcing Scheduled so a reactivation
            // right after the announcement is not lost.
            let woken = self.wake.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();

            let scheduled = SyncState::Scheduled { delay };
            if self
                .if_current(generation, || self.state_tx.send_replace(scheduled))
                .is_err()
            {
                break;
            }
            debug!(generation, ?delay, "Next now-playing resync scheduled.");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = &mut woken => debug!(generation, "Resync timer cut short by reactivation."),
                _ = sleep(delay) => trace!(generation, "Resync timer fired."),
            }
        }
        debug!(generation, "Now-playing loop exited.");
    }

    async fn refresh_queue(
        self: Arc<Self>,
        generation: u64,
        request: u64,
        cancel: CancellationToken,
    ) {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = self.service.queue() => result,
        };
        if let Err(e) = self.apply_queue_if_latest(generation, request, result) {
            debug!(generation, request, error = %e, "Discarding queue response.");
        }
    }

    fn apply_queue_if_latest(
        &self,
        generation: u64,
        request: u64,
        result: Result<Vec<Track>, RadioError>,
    ) -> Result<(), RadioError> {
        self.if_current(generation, || {
            if self.latest_queue_request.load(Ordering::SeqCst) != request {
                return Err(RadioError::StaleResponse);
            }
            self.apply_queue(result);
            Ok(())
        })
        .and_then(|applied| applied)
    }

    /// Publishes a now-playing result and returns the delay before the next poll.
    fn apply_now_playing(&self, polled: Result<Option<NowPlaying>, RadioError>) -> Duration {
        let (now_playing, delay) = match polled {
            Ok(Some(np)) => {
                let delay = self.clock.next_delay(&np.track, np.position_ms);
                (np, delay)
            }
            Ok(None) => {
                debug!("Server reports nothing on air.");
                (NowPlaying::nothing_playing(), self.failure_retry_delay)
            }
            Err(e) => {
                warn!(error = %e, "Now-playing poll failed, showing nothing playing.");
                let _ = self.event_sender.send(RadioEvent::PlaybackUnavailable);
                (NowPlaying::nothing_playing(), self.failure_retry_delay)
            }
        };

        let previous = self
            .snapshot_tx
            .send_replace(PlaybackSnapshot::new(now_playing.clone()));
        if previous.now_playing.track != now_playing.track {
            info!(
                track_id = %now_playing.track.track_id,
                title = %now_playing.track.title,
                "Now playing changed."
            );
            let _ = self
                .event_sender
                .send(RadioEvent::NowPlayingChanged(now_playing));
        }

        delay
    }

    fn apply_queue(&self, result: Result<Vec<Track>, RadioError>) {
        let queue = result.unwrap_or_else(|e| {
            warn!(error = %e, "Queue refresh failed, clearing queue.");
            Vec::new()
        });
        let changed = self.queue_tx.send_if_modified(|current| {
            if *current != queue {
                *current = queue.clone();
                true
            } else {
                false
            }
        });
        if changed {
            debug!(len = queue.len(), "Queue refreshed.");
            let _ = self.event_sender.send(RadioEvent::QueueChanged(queue));
        }
    }
}

impl Drop for NowPlayingSynchronizer {
    fn drop(&mut self) {
        if let Some(token) = self.inner.lifecycle().cancel.take() {
            debug!("Dropping synchronizer, cancelling poll loop.");
            token.cancel();
        }
    }
}

impl std::fmt::Debug for NowPlayingSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NowPlayingSynchronizer")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}
