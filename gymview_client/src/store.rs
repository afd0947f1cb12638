//! Session store: the single source of truth for one training run.
//!
//! The store is an explicitly constructed container: callers build one,
//! inject the backend collaborator, and share it as `Arc<SessionStore>`.
//! It mediates between caller intent (start/stop) and the push channel,
//! folds the channel's events into bounded history/metrics, and republishes
//! a revision counter so consumers know when to take a fresh snapshot.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::api::TrainingApi;
use crate::channel::{ChannelConfig, ChannelEvent, UpdateChannel};
use crate::error::ClientError;
use crate::metrics::{MetricsSnapshot, RollingBuffer, RollingMetrics};
use crate::protocol::{TrainingConfig, TrainingStatus, TrainingUpdate};
use crate::settings::Settings;

/// Client-side state container for an in-progress or completed training run.
pub struct SessionStore {
    api: Arc<dyn TrainingApi>,
    ws_endpoint: String,
    channel_config: ChannelConfig,
    history_capacity: usize,
    inner: RwLock<StoreInner>,
    channel: Mutex<Option<UpdateChannel>>,
    revision: watch::Sender<u64>,
}

struct StoreInner {
    session_id: Option<String>,
    is_running: bool,
    config: Option<TrainingConfig>,
    started_at: Option<DateTime<Utc>>,
    connection_lost: bool,
    history: RollingBuffer<TrainingUpdate>,
    metrics: RollingMetrics,
    value_function: Option<HashMap<String, f64>>,
    policy: Option<HashMap<String, i64>>,
}

impl StoreInner {
    fn empty(capacity: usize) -> Self {
        Self {
            session_id: None,
            is_running: false,
            config: None,
            started_at: None,
            connection_lost: false,
            history: RollingBuffer::new(capacity),
            metrics: RollingMetrics::new(capacity),
            value_function: None,
            policy: None,
        }
    }
}

/// Immutable view of the store, cloned out for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub session_id: Option<String>,
    pub is_running: bool,
    pub config: Option<TrainingConfig>,
    pub started_at: Option<DateTime<Utc>>,
    pub connection_lost: bool,
    pub history_len: usize,
    pub latest: Option<TrainingUpdate>,
    pub metrics: MetricsSnapshot,
    pub value_function: Option<HashMap<String, f64>>,
    pub policy: Option<HashMap<String, i64>>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn TrainingApi>, settings: &Settings) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            api,
            ws_endpoint: settings.backend.ws_url.clone(),
            channel_config: settings.channel.to_channel_config(),
            history_capacity: settings.store.history_capacity,
            inner: RwLock::new(StoreInner::empty(settings.store.history_capacity)),
            channel: Mutex::new(None),
            revision,
        }
    }

    /// Start a new training session.
    ///
    /// On success the store is reset to an empty run, the returned session
    /// identifier recorded, and the push channel opened; the caller gets the
    /// identifier back. On failure nothing changes and the error propagates.
    #[instrument(skip_all, fields(environment = %config.environment, algorithm = %config.algorithm))]
    pub async fn start_session(
        self: &Arc<Self>,
        config: TrainingConfig,
    ) -> Result<String, ClientError> {
        let started = match self.api.start_training(&config).await {
            Ok(started) => started,
            Err(err) => {
                error!("failed to start training session: {err}");
                return Err(err);
            }
        };
        info!(
            "training session {} started (status: {})",
            started.session_id, started.status
        );

        {
            let mut inner = self.inner.write();
            *inner = StoreInner::empty(self.history_capacity);
            inner.session_id = Some(started.session_id.clone());
            inner.is_running = true;
            inner.config = Some(config);
            inner.started_at = Some(Utc::now());
        }

        let (channel, events) = UpdateChannel::open(
            &self.ws_endpoint,
            &started.session_id,
            self.channel_config.clone(),
        );
        *self.channel.lock() = Some(channel);

        let store = Arc::clone(self);
        tokio::spawn(async move { store.fold_events(events).await });

        self.bump_revision();
        Ok(started.session_id)
    }

    /// Stop the active session.
    ///
    /// A no-op without a session. The stop request is best-effort: a remote
    /// failure is logged and local teardown proceeds regardless.
    #[instrument(skip(self))]
    pub async fn stop_session(&self) {
        let session_id = self.inner.read().session_id.clone();
        let Some(session_id) = session_id else {
            debug!("stop requested with no active session");
            return;
        };

        if let Err(err) = self.api.stop_training(&session_id).await {
            warn!("stop request for session {session_id} failed: {err}; tearing down locally");
        }

        let channel = self.channel.lock().take();
        if let Some(channel) = channel {
            channel.disconnect().await;
        }

        self.inner.write().is_running = false;
        self.bump_revision();
    }

    /// Fold one update into history, metrics, and snapshot state.
    ///
    /// The sole mutation entry point for in-flight data; safe to call at any
    /// time, including after a stop has been requested but before the
    /// channel fully closes.
    pub fn add_update(&self, update: TrainingUpdate) {
        {
            let mut inner = self.inner.write();
            inner.metrics.record(&update);
            if let Some(vf) = update.value_function.as_ref().filter(|m| !m.is_empty()) {
                inner.value_function = Some(vf.clone());
            }
            if let Some(policy) = update.policy.as_ref().filter(|m| !m.is_empty()) {
                inner.policy = Some(policy.clone());
            }
            inner.history.push(update);
        }
        self.bump_revision();
    }

    /// Apply one channel event to the store.
    pub fn apply_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Update(update) => self.add_update(*update),
            ChannelEvent::Completed => {
                info!("training run completed");
                self.inner.write().is_running = false;
                self.bump_revision();
            }
            ChannelEvent::ConnectionLost => {
                warn!("update channel lost after exhausting reconnect attempts");
                self.inner.write().connection_lost = true;
                self.bump_revision();
            }
        }
    }

    /// Empty history and metrics; session identity is untouched.
    pub fn clear_updates(&self) {
        {
            let mut inner = self.inner.write();
            inner.history.clear();
            inner.metrics.clear();
        }
        self.bump_revision();
    }

    /// Reset everything to the empty state, dropping the channel reference.
    ///
    /// Does not close an open channel; stop the session first.
    pub fn reset(&self) {
        *self.inner.write() = StoreInner::empty(self.history_capacity);
        drop(self.channel.lock().take());
        self.bump_revision();
    }

    /// Fetch the backend's view of the active session.
    pub async fn status(&self) -> Result<TrainingStatus, ClientError> {
        let session_id = self
            .inner
            .read()
            .session_id
            .clone()
            .ok_or(ClientError::NoSession)?;
        self.api.training_status(&session_id).await
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.read().session_id.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().is_running
    }

    /// Revision counter bumped on every mutation; await changes on it and
    /// then take a fresh [`snapshot`](Self::snapshot).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        StoreSnapshot {
            session_id: inner.session_id.clone(),
            is_running: inner.is_running,
            config: inner.config.clone(),
            started_at: inner.started_at,
            connection_lost: inner.connection_lost,
            history_len: inner.history.len(),
            latest: inner.history.back().cloned(),
            metrics: inner.metrics.snapshot(),
            value_function: inner.value_function.clone(),
            policy: inner.policy.clone(),
        }
    }

    /// Full copy of the rolling history, oldest first.
    pub fn history_snapshot(&self) -> Vec<TrainingUpdate> {
        self.inner.read().history.to_vec()
    }

    async fn fold_events(self: Arc<Self>, mut events: mpsc::Receiver<ChannelEvent>) {
        while let Some(event) = events.recv().await {
            self.apply_event(event);
        }
        debug!("update event queue drained");
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}
