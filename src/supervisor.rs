use std::thread;
use std::time::Duration;

use anyhow::Result;
use fjall::GarbageCollection;
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tracing::info;

use crate::config::RuntimeConfig;
use crate::gc::{GcWorker, GcWorkerInit, GcWorkerMsg};

pub(crate) struct Supervisor;

pub(crate) enum SupervisorMsg {
    KeyspaceMaint,
}

pub(crate) struct SupervisorState {
    config: RuntimeConfig,
    myself: ActorRef<SupervisorMsg>,
}

impl Actor for Supervisor {
    type Msg = SupervisorMsg;
    type State = SupervisorState;
    type Arguments = RuntimeConfig;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        config: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(SupervisorState { config, myself })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        info!(target: "lifecycle", "started");

        if state.config.init.gc.interval_secs > 0 {
            state.spawn_gc_worker().await?;
        } else {
            // collection is opt-in; a non-positive interval means documents
            // are only ever removed explicitly
            info!(target: "gc", "garbage collection disabled");
        }

        myself.send_interval(Duration::from_secs(24 * 60 * 60), || {
            SupervisorMsg::KeyspaceMaint
        });
        state.maintain_keyspace();

        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        _message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.maintain_keyspace();
        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        use SupervisionEvent::*;

        let is_true = |x| -> bool { x };

        match message {
            ActorStarted(_) => {}
            ActorTerminated(_, _, _) => {}
            ActorFailed(actor_cell, error) => {
                if actor_cell
                    .is_message_type_of::<GcWorkerMsg>()
                    .is_some_and(is_true)
                {
                    info!(target: "supervision", %error, "gc worker crashed, restarting...");
                    state.spawn_gc_worker().await?;
                }
            }
            ProcessGroupChanged(_) => {}
            #[cfg(feature = "cluster")]
            PidLifecycleEvent(_) => {}
        }

        Ok(())
    }
}

impl SupervisorState {
    fn maintain_keyspace(&self) {
        let keyspace = self.config.keyspace.clone();
        thread::spawn(move || {
            let documents = keyspace
                .open_partition("documents", Default::default())
                .expect("failed to open documents partition");
            documents
                .gc_with_staleness_threshold(0.5)
                .expect("failed to garbage collect documents");
        });
    }
    async fn spawn_gc_worker(&self) -> Result<()> {
        Actor::spawn_linked(
            None,
            GcWorker,
            GcWorkerInit {
                repo: self.config.repo.clone(),
                interval: Duration::from_secs(self.config.init.gc.interval_secs as u64),
            },
            self.myself.get_cell(),
        )
        .await?;
        Ok(())
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

    use crate::config::{Config, RuntimeConfig};
    use crate::service::unix_now;
    use crate::store::ContentType;

    use super::Supervisor;

    fn runtime_config(dir: &std::path::Path, interval_secs: i64) -> Result<RuntimeConfig> {
        let keyspace = fjall::Config::new(dir).temporary(true).open()?;
        let mut init = Config::default();
        init.gc.interval_secs = interval_secs;
        RuntimeConfig::new(init, keyspace)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_collection_never_reaps() -> Result<()> {
        let tmp_dir = tempdir()?;
        let config = runtime_config(tmp_dir.path(), 0)?;
        let lapsed = config.repo.create(
            &json!({"old": true}),
            ContentType::Json,
            unix_now() - 60,
            Some(1),
            None,
        )?;

        let (supervisor, handle) = Actor::spawn(None, Supervisor, config.clone()).await?;
        sleep(Duration::from_millis(300)).await;
        supervisor.stop(None);
        handle.await?;

        // still physically present; only explicit removal applies
        assert!(config.repo.find_one(lapsed.id)?.is_some());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enabled_collection_reaps_lapsed_documents() -> Result<()> {
        let tmp_dir = tempdir()?;
        let config = runtime_config(tmp_dir.path(), 1)?;
        let lapsed = config.repo.create(
            &json!({"old": true}),
            ContentType::Json,
            unix_now() - 60,
            Some(1),
            None,
        )?;

        let (supervisor, handle) = Actor::spawn(None, Supervisor, config.clone()).await?;
        sleep(Duration::from_millis(1500)).await;
        supervisor.stop(None);
        handle.await?;

        assert!(config.repo.find_one(lapsed.id)?.is_none());
        Ok(())
    }
}
