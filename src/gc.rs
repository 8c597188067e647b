//! Background sweep that reaps expired documents. Purely a space
//! reclamation job: reads already treat lapsed documents as absent.

use std::time::Duration;

use anyhow::Result;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::service::unix_now;
use crate::store::{DocKey, DocumentRepo};

pub(crate) struct GcWorker;

pub(crate) enum GcWorkerMsg {
    Sweep,
}

pub(crate) struct GcWorkerInit {
    pub(crate) repo: DocumentRepo,
    pub(crate) interval: Duration,
}

pub(crate) struct GcWorkerState {
    repo: DocumentRepo,
    interval: Duration,
}

/// One sweep's transient bookkeeping, kept only long enough to log it.
struct SweepStats {
    started_at: i64,
    ids_reaped: Vec<DocKey>,
}

impl Actor for GcWorker {
    type Msg = GcWorkerMsg;
    type State = GcWorkerState;
    type Arguments = GcWorkerInit;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let GcWorkerInit { repo, interval } = args;
        Ok(GcWorkerState { repo, interval })
    }
    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        myself.send_after(state.interval, || GcWorkerMsg::Sweep);
        Ok(())
    }
    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            GcWorkerMsg::Sweep => {
                match state.sweep().await {
                    Ok(stats) => {
                        if !stats.ids_reaped.is_empty() {
                            debug!(
                                target: "gc",
                                started_at = stats.started_at,
                                reaped = stats.ids_reaped.len(),
                                "sweep finished"
                            );
                        }
                    }
                    Err(error) => {
                        // the store being unavailable must not take the
                        // process down; the next tick gets a fresh chance
                        warn!(target: "gc", %error, "sweep abandoned");
                    }
                }
                // Arm the next tick only once this sweep is over, so sweeps
                // never overlap and never queue behind a slow one.
                myself.send_after(state.interval, || GcWorkerMsg::Sweep);
            }
        }
        Ok(())
    }
}

impl GcWorkerState {
    async fn sweep(&self) -> Result<SweepStats> {
        let repo = self.repo.clone();
        spawn_blocking(move || {
            let started_at = unix_now();
            let mut stats = SweepStats {
                started_at,
                ids_reaped: vec![],
            };
            for id in repo.list_expired(started_at)? {
                // false means a client delete or an earlier sweep got there
                // first, which is fine
                if repo.delete(id)? {
                    stats.ids_reaped.push(id);
                }
            }
            Ok(stats)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use ractor::Actor;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::time::sleep;

    use crate::service::unix_now;
    use crate::store::{ContentType, DocumentRepo};

    use super::{GcWorker, GcWorkerInit};

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_reaps_only_expired_documents() -> Result<()> {
        let tmp_dir = tempdir()?;
        let keyspace = fjall::Config::new(tmp_dir.path()).temporary(true).open()?;
        let repo = DocumentRepo::new(keyspace)?;

        let now = unix_now();
        let expired = repo.create(&json!({"old": true}), ContentType::Json, now - 60, Some(1), None)?;
        let fresh = repo.create(&json!({"new": true}), ContentType::Json, now, Some(3600), None)?;
        let immortal = repo.create(&json!({"keep": true}), ContentType::Json, now, None, None)?;

        let (worker, handle) = Actor::spawn(
            None,
            GcWorker,
            GcWorkerInit {
                repo: repo.clone(),
                interval: Duration::from_millis(50),
            },
        )
        .await?;

        sleep(Duration::from_millis(300)).await;
        worker.stop(None);
        handle.await?;

        assert!(repo.find_one(expired.id)?.is_none());
        assert!(repo.find_one(fresh.id)?.is_some());
        assert!(repo.find_one(immortal.id)?.is_some());
        assert!(repo.list_expired(unix_now())?.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_tolerates_concurrently_deleted_ids() -> Result<()> {
        let tmp_dir = tempdir()?;
        let keyspace = fjall::Config::new(tmp_dir.path()).temporary(true).open()?;
        let repo = DocumentRepo::new(keyspace)?;

        let now = unix_now();
        let doc = repo.create(&json!({"old": true}), ContentType::Json, now - 60, Some(1), None)?;

        let (worker, handle) = Actor::spawn(
            None,
            GcWorker,
            GcWorkerInit {
                repo: repo.clone(),
                interval: Duration::from_millis(50),
            },
        )
        .await?;
        // a client beats the sweep to the delete
        repo.delete(doc.id)?;

        sleep(Duration::from_millis(300)).await;
        worker.stop(None);
        handle.await?;

        assert!(repo.find_one(doc.id)?.is_none());
        Ok(())
    }
}
