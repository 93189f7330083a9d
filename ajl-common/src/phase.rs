//! Current workshop phase: shared store and background poller
//!
//! [`PhaseStore`] is the single in-process copy of the phase. It is written
//! only by successful reads from a [`PhaseSource`], so a failed read keeps
//! whatever value was last known. [`PhasePoller`] drives those reads on an
//! interval and whenever the client signals it became visible again.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::Phase;
use crate::db::workshop_state;
use crate::Result;

/// Somewhere the authoritative phase can be read from
#[async_trait]
pub trait PhaseSource: Send + Sync {
    async fn fetch_phase(&self) -> Result<Phase>;
}

/// Reads the `workshop_state` row directly
#[derive(Clone)]
pub struct DatabasePhaseSource {
    pool: SqlitePool,
}

impl DatabasePhaseSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhaseSource for DatabasePhaseSource {
    async fn fetch_phase(&self) -> Result<Phase> {
        workshop_state::read_phase(&self.pool).await
    }
}

#[derive(Deserialize)]
struct PhaseBody {
    phase: Phase,
}

/// Reads `GET {base_url}/api/workshop-state` from a running service
#[derive(Clone)]
pub struct HttpPhaseSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPhaseSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn state_url(&self) -> String {
        format!("{}/api/workshop-state", self.base_url)
    }
}

#[async_trait]
impl PhaseSource for HttpPhaseSource {
    async fn fetch_phase(&self) -> Result<Phase> {
        let body: PhaseBody = self
            .client
            .get(self.state_url())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.phase)
    }
}

/// Shared, observable current phase
#[derive(Clone)]
pub struct PhaseStore {
    tx: Arc<watch::Sender<Phase>>,
}

impl Default for PhaseStore {
    fn default() -> Self {
        Self::new(Phase::default())
    }
}

impl PhaseStore {
    pub fn new(initial: Phase) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Phase {
        *self.tx.borrow()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Store a phase; returns whether it differed from the previous one
    pub fn set(&self, phase: Phase) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        })
    }

    /// Read from `source` and store the result
    ///
    /// Safe to call any number of times. On error the stored phase is left
    /// as it was and the error is returned to the caller.
    pub async fn refresh(&self, source: &dyn PhaseSource) -> Result<Phase> {
        let phase = source.fetch_phase().await?;
        if self.set(phase) {
            info!(phase = %phase, "Workshop phase changed");
        }
        Ok(phase)
    }
}

/// Background refresher for a [`PhaseStore`]
pub struct PhasePoller;

impl PhasePoller {
    /// Start polling; the first read happens immediately
    ///
    /// Each message on `visibility` triggers an extra read. The task stops
    /// when the returned handle is shut down or dropped.
    pub fn spawn(
        store: PhaseStore,
        source: Arc<dyn PhaseSource>,
        interval: Duration,
        mut visibility: mpsc::Receiver<()>,
    ) -> PhasePollerHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut visibility_open = true;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Phase poller cancelled");
                        break;
                    }
                    _ = ticker.tick() => {}
                    signal = visibility.recv(), if visibility_open => {
                        if signal.is_none() {
                            visibility_open = false;
                            continue;
                        }
                        debug!("Visibility signal, refreshing phase");
                    }
                }

                if let Err(e) = store.refresh(source.as_ref()).await {
                    warn!("Phase refresh failed, keeping {}: {}", store.current(), e);
                }
            }
        });

        PhasePollerHandle {
            token,
            task: Some(task),
        }
    }
}

pub struct PhasePollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PhasePollerHandle {
    /// Stop polling and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PhasePollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedSource {
        phase: Mutex<Option<Phase>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(phase: Option<Phase>) -> Arc<Self> {
            Arc::new(Self {
                phase: Mutex::new(phase),
                calls: AtomicUsize::new(0),
            })
        }

        fn set(&self, phase: Option<Phase>) {
            *self.phase.lock().unwrap() = phase;
        }
    }

    #[async_trait]
    impl PhaseSource for ScriptedSource {
        async fn fetch_phase(&self) -> Result<Phase> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.phase
                .lock()
                .unwrap()
                .ok_or_else(|| Error::Internal("datastore unreachable".to_string()))
        }
    }

    #[test]
    fn test_set_reports_change() {
        let store = PhaseStore::default();
        assert_eq!(store.current(), Phase::EvidenceCollection);
        assert!(!store.set(Phase::EvidenceCollection));
        assert!(store.set(Phase::Storyboard));
        assert_eq!(store.current(), Phase::Storyboard);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let store = PhaseStore::default();
        let source = ScriptedSource::new(Some(Phase::Categories));
        assert_eq!(store.refresh(source.as_ref()).await.unwrap(), Phase::Categories);
        assert_eq!(store.refresh(source.as_ref()).await.unwrap(), Phase::Categories);
        assert_eq!(store.current(), Phase::Categories);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_phase() {
        let store = PhaseStore::new(Phase::Storyboard);
        let source = ScriptedSource::new(None);
        assert!(store.refresh(source.as_ref()).await.is_err());
        assert_eq!(store.current(), Phase::Storyboard);
    }

    #[tokio::test]
    async fn test_poller_reads_immediately_and_on_visibility() {
        let store = PhaseStore::default();
        let source = ScriptedSource::new(Some(Phase::Categories));
        let (visible_tx, visible_rx) = mpsc::channel(4);
        let mut changes = store.subscribe();

        let handle = PhasePoller::spawn(
            store.clone(),
            source.clone(),
            Duration::from_secs(3600),
            visible_rx,
        );

        tokio::time::timeout(Duration::from_secs(5), changes.changed())
            .await
            .expect("initial read")
            .unwrap();
        assert_eq!(store.current(), Phase::Categories);

        source.set(Some(Phase::PublicContribution));
        visible_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), changes.changed())
            .await
            .expect("read after visibility signal")
            .unwrap();
        assert_eq!(store.current(), Phase::PublicContribution);
        assert!(source.calls.load(Ordering::SeqCst) >= 2);

        assert!(handle.is_running());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_polling() {
        let store = PhaseStore::default();
        let source = ScriptedSource::new(Some(Phase::Categories));
        let (_tx, rx) = mpsc::channel(1);
        let handle = PhasePoller::spawn(store, source.clone(), Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_drop = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn test_http_source_url() {
        let source = HttpPhaseSource::new(reqwest::Client::new(), "http://localhost:5740/");
        assert_eq!(source.state_url(), "http://localhost:5740/api/workshop-state");
    }
}
