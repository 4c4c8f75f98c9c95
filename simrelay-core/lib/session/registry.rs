//! Maps session ids to their controllers.

use std::{collections::{BTreeMap, HashMap}, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc::Receiver, Mutex, RwLock};
use uuid::Uuid;

use super::{SessionController, StopReason, ViewerChannel, ViewerEnvelope};
use crate::{
    codec::ControlCommand,
    config::RelayConfig,
    worker::{ProcessLauncher, RunMetadata, WorkerLauncher},
    SimrelayError, SimrelayResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// All live viewer sessions.
///
/// Registry mutations are serialized by the map lock. Operations on one session are serialized by
/// that session's own lock, so a slow stop in one session never blocks another.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionController>>>>,
    config: RelayConfig,
    launcher: Arc<dyn WorkerLauncher>,
}

/// A session as listed by the summaries endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub id: String,

    /// Whether a worker is running
    pub running: bool,

    /// Id of the current run
    pub run_id: Option<String>,

    /// Entry point of the current run
    pub entry: Option<String>,

    /// Last frame received from the current or last run
    pub last_frame: Option<u64>,

    /// Runs started in this session
    pub runs_started: u64,

    /// When the viewer connected, RFC 3339
    pub connected_at: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SessionRegistry {
    /// Creates an empty registry that launches workers with `launcher`.
    pub fn new(config: RelayConfig, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            launcher,
        }
    }

    /// Creates an empty registry that runs workers as interpreter processes.
    pub fn with_process_launcher(config: RelayConfig) -> Self {
        let launcher = Arc::new(ProcessLauncher::new(config.clone()));
        Self::new(config, launcher)
    }

    /// The relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Registers a new session with a generated id.
    ///
    /// Returns the id and the receiving end of the session's event queue.
    pub async fn connect(&self) -> SimrelayResult<(String, Receiver<ViewerEnvelope>)> {
        let id = format!("session-{}", Uuid::new_v4());
        let rx = self.attach(&id).await?;
        Ok((id, rx))
    }

    /// Registers a session under a caller-chosen id.
    pub async fn attach(&self, id: &str) -> SimrelayResult<Receiver<ViewerEnvelope>> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(SimrelayError::SessionAlreadyExists(id.to_string()));
        }

        let max_sessions = self.config.get_max_sessions();
        if sessions.len() >= max_sessions {
            return Err(SimrelayError::SessionLimitReached(max_sessions));
        }

        let (viewer, rx) = ViewerChannel::new(id, self.config.get_viewer_queue_capacity());
        let controller =
            SessionController::new(id, self.config.clone(), self.launcher.clone(), viewer);
        sessions.insert(id.to_string(), Arc::new(Mutex::new(controller)));

        tracing::info!("session {id} connected ({} active)", sessions.len());
        Ok(rx)
    }

    /// Starts a run in a session, replacing any running one.
    pub async fn start_run(
        &self,
        id: &str,
        files: BTreeMap<String, String>,
        level: Option<Value>,
    ) -> SimrelayResult<RunMetadata> {
        let session = self.get(id).await?;
        let mut session = session.lock().await;
        session.start(files, level).await
    }

    /// Stops a session's run. Returns `false` if nothing was running.
    pub async fn stop_run(&self, id: &str) -> SimrelayResult<bool> {
        let session = self.get(id).await?;
        let mut session = session.lock().await;
        Ok(session.stop().await)
    }

    /// Records the latest control command of a session. Returns `false` when idle.
    pub async fn submit_input(&self, id: &str, command: ControlCommand) -> SimrelayResult<bool> {
        let session = self.get(id).await?;
        let mut session = session.lock().await;
        Ok(session.submit_command(command).await)
    }

    /// Re-pushes the latest snapshot of a session. Returns `false` when idle.
    pub async fn request_refresh(&self, id: &str) -> SimrelayResult<bool> {
        let session = self.get(id).await?;
        let mut session = session.lock().await;
        Ok(session.force_refresh().await)
    }

    /// Removes a session and tears down its run. Returns `false` for unknown ids.
    pub async fn disconnect(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        let Some(session) = removed else {
            return false;
        };

        session.lock().await.teardown(StopReason::Disconnected).await;
        tracing::info!("session {id} disconnected");
        true
    }

    /// Describes every session.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let session = session.lock().await;
            let run = session.current_run();
            summaries.push(SessionSummary {
                id: session.id().to_string(),
                running: run.is_some(),
                run_id: run.map(|r| r.run_id.clone()),
                entry: run.map(|r| r.entry.clone()),
                last_frame: session.last_frame(),
                runs_started: session.runs_started(),
                connected_at: session.connected_at().to_rfc3339(),
            });
        }

        summaries.sort_by(|a, b| a.connected_at.cmp(&b.connected_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Tears down every session.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        if sessions.is_empty() {
            return;
        }

        tracing::info!("shutting down {} session(s)", sessions.len());
        for (_, session) in sessions {
            session.lock().await.teardown(StopReason::Shutdown).await;
        }
    }

    async fn get(&self, id: &str) -> SimrelayResult<Arc<Mutex<SessionController>>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SimrelayError::SessionNotFound(id.to_string()))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
