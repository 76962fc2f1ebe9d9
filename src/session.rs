use std::sync::Arc;

use tokio::sync::{watch, OnceCell};
use tracing::{info, warn};

use crate::service::RadioService;

struct GateInner {
    privileged_tx: watch::Sender<bool>,
    resolved: OnceCell<bool>,
}

/// Single answer to "may this listener submit requests and see their own
/// queue". Unprivileged until the session check has come back.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGate {
    pub fn new() -> Self {
        let (privileged_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(GateInner {
                privileged_tx,
                resolved: OnceCell::new(),
            }),
        }
    }

    pub fn is_privileged(&self) -> bool {
        *self.inner.privileged_tx.borrow()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.initialized()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.privileged_tx.subscribe()
    }

    /// Asks the service whether the session is valid. Runs the check at most
    /// once; later calls return the first answer. Any failure resolves to
    /// unprivileged.
    pub async fn resolve(&self, service: &dyn RadioService) -> bool {
        *self
            .inner
            .resolved
            .get_or_init(|| async {
                let privileged = match service.is_authenticated().await {
                    Ok(privileged) => privileged,
                    Err(e) => {
                        warn!(error = %e, "Session check failed, staying unprivileged.");
                        false
                    }
                };
                self.inner.privileged_tx.send_replace(privileged);
                info!(privileged, "Session resolved.");
                privileged
            })
            .await
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("privileged", &self.is_privileged())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
