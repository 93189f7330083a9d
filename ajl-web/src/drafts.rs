//! Open wizard drafts held in memory
//!
//! A session owns at most one draft. Drafts nobody has touched for
//! [`DRAFT_IDLE_TIMEOUT`] are dropped by a background sweeper.

use ajl_common::wizard::SubmissionWizard;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

pub const DRAFT_IDLE_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);
pub const DRAFT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A wizard and when its owner last used it
#[derive(Debug)]
pub struct WizardSession {
    pub wizard: SubmissionWizard,
    pub last_touched: Instant,
}

impl WizardSession {
    pub fn new(wizard: SubmissionWizard) -> Self {
        Self {
            wizard,
            last_touched: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }
}

/// One open draft; the owner is readable without taking the draft's lock
#[derive(Debug, Clone)]
pub struct OpenDraft {
    pub owner: Uuid,
    pub session: Arc<Mutex<WizardSession>>,
}

/// Open drafts keyed by draft id; each draft is locked on its own
#[derive(Debug, Clone, Default)]
pub struct WizardSessions {
    drafts: Arc<RwLock<HashMap<Uuid, OpenDraft>>>,
}

impl WizardSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &Uuid) -> Option<OpenDraft> {
        self.drafts.read().await.get(id).cloned()
    }

    /// The draft `owner` already has open, or a new one from `create`
    ///
    /// Returns the draft id and whether it was created by this call.
    pub async fn open_for(
        &self,
        owner: Uuid,
        create: impl FnOnce() -> SubmissionWizard,
    ) -> (Uuid, Arc<Mutex<WizardSession>>, bool) {
        let mut drafts = self.drafts.write().await;
        if let Some((id, draft)) = drafts.iter().find(|(_, draft)| draft.owner == owner) {
            return (*id, draft.session.clone(), false);
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(WizardSession::new(create())));
        drafts.insert(
            id,
            OpenDraft {
                owner,
                session: session.clone(),
            },
        );
        (id, session, true)
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.drafts.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }

    /// Drop drafts untouched for longer than `max_idle`; returns how many went
    ///
    /// A draft whose lock is held is in use and stays.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut drafts = self.drafts.write().await;
        let before = drafts.len();
        drafts.retain(|id, draft| match draft.session.try_lock() {
            Ok(session) if session.last_touched.elapsed() > max_idle => {
                debug!(draft = %id, "Evicting idle draft");
                false
            }
            _ => true,
        });
        before - drafts.len()
    }
}

/// Background task that runs [`WizardSessions::evict_idle`] on an interval
pub struct DraftSweeper {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DraftSweeper {
    pub fn spawn(drafts: WizardSessions, interval: Duration, max_idle: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("Draft sweeper cancelled");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let evicted = drafts.evict_idle(max_idle).await;
                if evicted > 0 {
                    info!(evicted, "Dropped idle drafts");
                }
            }
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Stop sweeping and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DraftSweeper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_draft_per_owner() {
        let drafts = WizardSessions::new();
        let owner = Uuid::new_v4();

        let (first, _, created) = drafts.open_for(owner, SubmissionWizard::new).await;
        assert!(created);
        for _ in 0..5 {
            let (again, _, created) = drafts.open_for(owner, SubmissionWizard::new).await;
            assert_eq!(again, first);
            assert!(!created);
        }
        assert_eq!(drafts.len().await, 1);

        let (other, _, created) = drafts.open_for(Uuid::new_v4(), SubmissionWizard::new).await;
        assert!(created);
        assert_ne!(other, first);
        assert_eq!(drafts.len().await, 2);

        assert!(drafts.remove(&first).await);
        let (fresh, _, created) = drafts.open_for(owner, SubmissionWizard::new).await;
        assert!(created);
        assert_ne!(fresh, first);
    }

    #[tokio::test]
    async fn test_idle_drafts_are_evicted() {
        let drafts = WizardSessions::new();
        let (stale, stale_session, _) = drafts.open_for(Uuid::new_v4(), SubmissionWizard::new).await;
        let (busy, busy_session, _) = drafts.open_for(Uuid::new_v4(), SubmissionWizard::new).await;
        let (fresh, _, _) = drafts.open_for(Uuid::new_v4(), SubmissionWizard::new).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        drafts.get(&fresh).await.unwrap().session.lock().await.touch();
        let _held = busy_session.lock().await;

        assert_eq!(drafts.evict_idle(Duration::from_millis(20)).await, 1);
        assert!(drafts.get(&stale).await.is_none());
        assert!(drafts.get(&busy).await.is_some());
        assert!(drafts.get(&fresh).await.is_some());
        drop(stale_session);
    }

    #[tokio::test]
    async fn test_sweeper_runs_until_shutdown() {
        let drafts = WizardSessions::new();
        drafts.open_for(Uuid::new_v4(), SubmissionWizard::new).await;

        let sweeper = DraftSweeper::spawn(drafts.clone(), Duration::from_millis(10), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(drafts.is_empty().await);
        sweeper.shutdown().await;
    }
}
