use crate::error::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

type Attempt = Shared<BoxFuture<'static, Result<()>>>;

/// Connected flag plus single-flight bookkeeping for `Producer::connect`.
///
/// Callers arriving while an attempt is pending await the same shared future,
/// so two transports are never opened for one producer.
#[derive(Default)]
pub(crate) struct ConnectGate {
    connected: Arc<AtomicBool>,
    in_flight: Mutex<Option<Attempt>>,
}

impl ConnectGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Handle for transport callbacks that must clear the flag asynchronously.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub async fn connect<F>(&self, start: F) -> Result<()>
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>>,
    {
        if self.is_connected() {
            return Ok(());
        }

        let attempt = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let connected = self.connected.clone();
                    let opening = start();
                    let attempt = async move {
                        let outcome = opening.await;
                        if outcome.is_ok() {
                            connected.store(true, Ordering::SeqCst);
                        }
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = attempt.clone().await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&attempt)) {
            *slot = None;
        }
        outcome
    }

    /// Waits for a pending attempt, if any, discarding its outcome.
    pub async fn settle(&self) {
        let pending = self.in_flight.lock().await.clone();
        if let Some(attempt) = pending {
            let _ = attempt.await;
        }
    }
}
