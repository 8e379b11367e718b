//! # Dispatcher
//!
//! Fans inbound events out to per-update tasks. Different users'
//! conversations run concurrently; ordering within one user's
//! conversation is the upstream transport's contract. Shutdown closes the
//! intake and drains every in-flight update before returning.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use domains::InboundEvent;

use crate::engine::Engine;

pub struct Dispatcher {
    tx: mpsc::Sender<InboundEvent>,
    stop: watch::Sender<()>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Starts the intake loop. `buffer` bounds how many undelivered
    /// events may queue before `submit` applies backpressure.
    pub fn spawn(engine: Arc<Engine>, buffer: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<InboundEvent>(buffer);
        let (stop, mut stop_rx) = watch::channel(());
        let worker = tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            let mut closing = false;
            loop {
                tokio::select! {
                    // The stop signal closes the intake even while the
                    // transport still holds sender clones; `recv` then
                    // yields whatever was already queued and ends.
                    _ = stop_rx.changed(), if !closing => {
                        rx.close();
                        closing = true;
                    }
                    maybe = rx.recv() => {
                        let Some(event) = maybe else { break };
                        let engine = engine.clone();
                        in_flight.spawn(async move { engine.handle_update(event).await });

                        // Reap whatever already finished; never blocks intake.
                        while let Some(finished) = in_flight.try_join_next() {
                            if let Err(err) = finished {
                                warn!(error = %err, "update task aborted");
                            }
                        }
                    }
                }
            }

            info!(remaining = in_flight.len(), "intake closed; draining in-flight updates");
            while let Some(finished) = in_flight.join_next().await {
                if let Err(err) = finished {
                    warn!(error = %err, "update task aborted during drain");
                }
            }
        });
        Self { tx, stop, worker }
    }

    /// Hands one event to the engine. Returns `false` once shutdown has
    /// begun and the intake no longer accepts events.
    pub async fn submit(&self, event: InboundEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// A cloneable intake handle for the transport side.
    pub fn sender(&self) -> mpsc::Sender<InboundEvent> {
        self.tx.clone()
    }

    /// Graceful drain: stop accepting, finish what is running, return.
    /// Safe to call while `sender` clones are still alive; they start
    /// failing as soon as the worker picks up the signal.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        drop(self.tx);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "dispatch worker aborted");
        }
    }
}
