use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::RadioError;
use crate::events::RadioEvent;
use crate::models::Track;
use crate::service::RadioService;
use crate::session::SessionGate;

#[derive(Default)]
struct RequestLedger {
    // Only grows during a session, except on reset()
    requested: HashSet<String>,
    in_flight: HashSet<String>,
}

/// Submits song requests, skipping the network for tracks this session has
/// already asked for. The server still decides what counts as a duplicate.
pub struct RequestSubmitter {
    service: Arc<dyn RadioService>,
    gate: SessionGate,
    ledger: Arc<Mutex<RequestLedger>>,
    event_sender: broadcast::Sender<RadioEvent>,
}

/// Releases the in-flight mark even if the submit future is dropped.
struct InFlight {
    ledger: Arc<Mutex<RequestLedger>>,
    track_id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.ledger).in_flight.remove(&self.track_id);
    }
}

fn lock(ledger: &Mutex<RequestLedger>) -> MutexGuard<'_, RequestLedger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RequestSubmitter {
    pub fn new(
        service: Arc<dyn RadioService>,
        gate: SessionGate,
        event_sender: broadcast::Sender<RadioEvent>,
    ) -> Self {
        Self {
            service,
            gate,
            ledger: Arc::new(Mutex::new(RequestLedger::default())),
            event_sender,
        }
    }

    /// Requests `track`. Returns the server's copy of the track (with its
    /// updated vote count) when it sends one, otherwise `track` unchanged.
    ///
    /// Fails with [`RadioError::DuplicateRequest`] without a network call when
    /// the track was already requested (or is being requested right now), and
    /// with [`RadioError::Unauthorized`] when no privileged session is known.
    /// Failures leave the requested set untouched and are never retried.
    pub async fn submit(&self, track: &Track) -> Result<Track, RadioError> {
        let track_id = track.track_id.clone();
        let _in_flight = {
            let mut ledger = lock(&self.ledger);
            if ledger.requested.contains(&track_id) || ledger.in_flight.contains(&track_id) {
                debug!(%track_id, "Track already requested, skipping submit.");
                return Err(RadioError::DuplicateRequest(track_id));
            }
            if !self.gate.is_privileged() {
                debug!(%track_id, "Submit refused, no privileged session.");
                return Err(RadioError::Unauthorized);
            }
            ledger.in_flight.insert(track_id.clone());
            InFlight {
                ledger: Arc::clone(&self.ledger),
                track_id: track_id.clone(),
            }
        };

        match self.service.submit_request(&track_id).await {
            Ok(updated) => {
                lock(&self.ledger).requested.insert(track_id.clone());
                let updated = updated.unwrap_or_else(|| track.clone());
                info!(%track_id, votes = updated.votes, "Song request submitted.");
                let _ = self
                    .event_sender
                    .send(RadioEvent::RequestSubmitted(updated.clone()));
                Ok(updated)
            }
            Err(e) => {
                warn!(%track_id, error = %e, "Song request failed.");
                Err(e)
            }
        }
    }

    /// Seeds the requested set from the listener's requests on the server.
    /// Returns how many track ids were added.
    pub async fn hydrate(&self) -> Result<usize, RadioError> {
        if !self.gate.is_privileged() {
            return Err(RadioError::Unauthorized);
        }
        let tracks = self.service.my_requests().await?;
        let mut ledger = lock(&self.ledger);
        let before = ledger.requested.len();
        ledger
            .requested
            .extend(tracks.into_iter().map(|t| t.track_id));
        let added = ledger.requested.len() - before;
        debug!(added, "Requested set hydrated.");
        Ok(added)
    }

    pub fn is_requested(&self, track_id: &str) -> bool {
        lock(&self.ledger).requested.contains(track_id)
    }

    pub fn requested_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.ledger).requested.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Forgets every request. The only way the requested set ever shrinks.
    pub fn reset(&self) {
        lock(&self.ledger).requested.clear();
        debug!("Requested set reset.");
    }
}

impl std::fmt::Debug for RequestSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSubmitter")
            .field("requested", &lock(&self.ledger).requested.len())
            .field("gate", &self.gate)
            .finish()
    }
}
