//! Shared handle to the now-playing state.
//!
//! Producers call [`NowPlaying::submit`] (or [`NowPlaying::submit_json`] at
//! the HTTP boundary) from any task. Submissions are only queued; the
//! single refresh loop applies them in arrival order with
//! [`NowPlaying::consume`]. The store and the queue share one lock so
//! arbitration always sees the state the queue will be applied to.

use crate::dimming::DimmingScheduler;
use crate::payload::{IngestError, Payload};
use crate::state::{StateStore, StatusSnapshot};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

struct Shared {
    store: StateStore,
    pending: VecDeque<Payload>,
}

/// Cloneable handle; every clone talks to the same store.
#[derive(Clone)]
pub struct NowPlaying {
    shared: Arc<Mutex<Shared>>,
    queued: Arc<Notify>,
    dimming: DimmingScheduler,
}

impl NowPlaying {
    pub fn new(dimming: DimmingScheduler) -> Self {
        Self::starting_at(dimming, Utc::now())
    }

    pub fn starting_at(dimming: DimmingScheduler, now: DateTime<Utc>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                store: StateStore::new(now),
                pending: VecDeque::new(),
            })),
            queued: Arc::new(Notify::new()),
            dimming,
        }
    }

    pub async fn submit(&self, payload: Payload) -> Result<(), IngestError> {
        self.submit_at(payload, Utc::now()).await
    }

    /// Queue a payload for the refresh loop.
    ///
    /// Fails with [`IngestError::ClientMismatch`] while another client owns
    /// the display and is still inside its grace period. Nothing in the
    /// store changes here.
    pub async fn submit_at(&self, payload: Payload, now: DateTime<Utc>) -> Result<(), IngestError> {
        {
            let mut shared = self.shared.lock().await;
            if !shared.store.accepts_client(&payload.npclient, now) {
                tracing::debug!(
                    owner = %shared.store.npclient,
                    incoming = %payload.npclient,
                    "Client mismatch, rejecting payload"
                );
                return Err(IngestError::ClientMismatch {
                    owner: shared.store.npclient.clone(),
                    incoming: payload.npclient,
                });
            }
            shared.pending.push_back(payload);
        }
        self.queued.notify_one();
        Ok(())
    }

    /// Ingestion boundary: take a raw JSON body, answer with an HTTP status
    /// and a `{"message": ...}` body.
    pub async fn submit_json(&self, body: &str) -> (u16, Value) {
        self.submit_json_at(body, Utc::now()).await
    }

    pub async fn submit_json_at(&self, body: &str, now: DateTime<Utc>) -> (u16, Value) {
        let result = match Payload::from_json(body) {
            Ok(payload) => self.submit_at(payload, now).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => (200, json!({ "message": "Payload received successfully" })),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected payload");
                (e.status_code(), json!({ "message": e.message() }))
            }
        }
    }

    pub async fn consume(&self) -> bool {
        self.consume_at(Utc::now()).await
    }

    /// Apply the oldest pending payload. Returns `true` only when the store
    /// actually changed; an empty queue or a repeat of the last applied
    /// payload is a no-op.
    pub async fn consume_at(&self, now: DateTime<Utc>) -> bool {
        let mut shared = self.shared.lock().await;
        let Some(payload) = shared.pending.pop_front() else {
            return false;
        };
        let previous_owner = shared.store.npclient.clone();
        let incoming = payload.npclient.clone();
        let changed = shared.store.apply(payload, now);
        if changed {
            if !previous_owner.is_empty() && previous_owner != incoming {
                tracing::info!(from = %previous_owner, to = %incoming, "Display switched client");
            }
            tracing::debug!(
                title = %shared.store.title,
                state = %shared.store.player_state,
                npclient = %shared.store.npclient,
                "Applied payload"
            );
        }
        changed
    }

    pub async fn elapsed(&self) -> String {
        self.elapsed_at(Utc::now()).await
    }

    /// Live elapsed estimate, clamped to the track duration.
    pub async fn elapsed_at(&self, now: DateTime<Utc>) -> String {
        self.shared.lock().await.store.elapsed(now)
    }

    pub fn fraction(&self) -> f64 {
        self.fraction_at(Utc::now())
    }

    /// Night-dimming fraction at `now` for the configured location.
    pub fn fraction_at(&self, now: DateTime<Utc>) -> f64 {
        self.dimming.fraction(&now)
    }

    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> StatusSnapshot {
        self.shared.lock().await.store.snapshot(now)
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.snapshot_at(Utc::now()).await
    }

    /// Supply the current album's track list.
    pub async fn set_tracks(&self, tracks: Vec<String>) {
        self.shared.lock().await.store.set_tracks(tracks);
    }

    /// Run `f` against the store under the lock.
    pub async fn read<R>(&self, f: impl FnOnce(&StateStore) -> R) -> R {
        f(&self.shared.lock().await.store)
    }

    pub async fn pending_len(&self) -> usize {
        self.shared.lock().await.pending.len()
    }

    /// Resolves once a payload has been queued since the last wake-up.
    pub async fn payload_queued(&self) {
        self.queued.notified().await;
    }
}
