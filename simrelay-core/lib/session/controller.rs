//! Per-session state machine.
//!
//! A session is either Idle (no worker) or Running (exactly one worker driven by a relay task).

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    relay::{LatestFrame, Relay},
    RunOutcome, StopReason, ViewerChannel, ViewerEvent,
};
use crate::{
    codec::{ControlCommand, Snapshot},
    config::RelayConfig,
    sandbox::SourceBundle,
    worker::{RunMetadata, WorkerLauncher},
    FailureKind, FailureReport, SimrelayResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Owns at most one running worker for one viewer.
pub struct SessionController {
    id: String,
    config: RelayConfig,
    launcher: Arc<dyn WorkerLauncher>,
    viewer: ViewerChannel,
    commands: watch::Sender<ControlCommand>,
    latest: watch::Receiver<LatestFrame>,
    level: Option<Value>,
    active: Option<ActiveRun>,
    connected_at: DateTime<Utc>,
    runs_started: u64,
}

struct ActiveRun {
    metadata: RunMetadata,
    cancel: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SessionController {
    /// Creates an idle session that pushes its events into `viewer`.
    pub fn new(
        id: impl Into<String>,
        config: RelayConfig,
        launcher: Arc<dyn WorkerLauncher>,
        viewer: ViewerChannel,
    ) -> Self {
        let (commands, _) = watch::channel(ControlCommand::default());
        let (_, latest) = watch::channel(None);

        Self {
            id: id.into(),
            config,
            launcher,
            viewer,
            commands,
            latest,
            level: None,
            active: None,
            connected_at: Utc::now(),
            runs_started: 0,
        }
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether a worker is currently running.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Describes the current run, if any.
    pub fn current_run(&self) -> Option<&RunMetadata> {
        self.active
            .as_ref()
            .filter(|run| !run.handle.is_finished())
            .map(|run| &run.metadata)
    }

    /// The most recent frame counter received in the current or last run.
    pub fn last_frame(&self) -> Option<u64> {
        self.latest.borrow().as_ref().map(|(frame, _)| *frame)
    }

    /// The latest control command.
    pub fn command(&self) -> ControlCommand {
        *self.commands.borrow()
    }

    /// Level or context metadata of the last run request.
    pub fn level(&self) -> Option<&Value> {
        self.level.as_ref()
    }

    /// When the viewer connected.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// How many runs this session started.
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    /// Starts a run of `files`, replacing any running one.
    ///
    /// On success a `run_started` event is pushed. If the bundle is rejected or the worker cannot
    /// be started, an `error` event of kind `load` is pushed, the session stays idle and the error
    /// is returned.
    pub async fn start(
        &mut self,
        files: BTreeMap<String, String>,
        level: Option<Value>,
    ) -> SimrelayResult<RunMetadata> {
        self.stop_with(StopReason::Replaced).await;

        let run_id = format!("run-{}", Uuid::new_v4());
        self.level = level;
        self.commands.send_replace(ControlCommand::default());

        let launched = match SourceBundle::new(files) {
            Ok(bundle) => self.launcher.launch(&run_id, &bundle).await,
            Err(e) => Err(e),
        };

        let launched = match launched {
            Ok(launched) => launched,
            Err(e) => {
                tracing::warn!("session {}: could not start run {run_id}: {e}", self.id);
                let report = FailureReport::new(FailureKind::Load, e.to_string());
                self.viewer.emit(ViewerEvent::error(&run_id, report)).await;
                return Err(e);
            }
        };

        let metadata = launched.metadata.clone();
        self.viewer
            .emit(ViewerEvent::RunStarted {
                metadata: metadata.clone(),
                level: self.level.clone(),
            })
            .await;

        let (latest_tx, latest_rx) = watch::channel(None);
        self.latest = latest_rx;

        let cancel = CancellationToken::new();
        let relay = Relay {
            run_id: run_id.clone(),
            worker: launched.worker,
            viewer: self.viewer.clone(),
            commands: self.commands.subscribe(),
            latest: latest_tx,
            cancel: cancel.clone(),
            config: self.config.clone(),
        };

        self.active = Some(ActiveRun {
            metadata: metadata.clone(),
            cancel,
            handle: tokio::spawn(relay.run()),
        });
        self.runs_started += 1;

        tracing::info!(
            "session {}: started run {run_id} (entry {})",
            self.id,
            metadata.entry
        );
        Ok(metadata)
    }

    /// Stops the running worker. Returns `false` if nothing was running.
    ///
    /// Returns once the worker process is gone and its scope removed.
    pub async fn stop(&mut self) -> bool {
        self.stop_with(StopReason::Requested).await
    }

    /// Stops the running worker for the given reason.
    ///
    /// A `run_stopped` event is pushed for `requested` and `replaced`, and only if this call is
    /// what ended the run.
    pub async fn stop_with(&mut self, reason: StopReason) -> bool {
        self.reap().await;
        let Some(run) = self.active.take() else {
            return false;
        };

        run.cancel.cancel();
        let outcome = match run.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("session {}: relay task failed: {e}", self.id);
                RunOutcome::Cancelled
            }
        };

        let announce = matches!(reason, StopReason::Requested | StopReason::Replaced);
        if outcome == RunOutcome::Cancelled && announce {
            self.viewer
                .emit(ViewerEvent::RunStopped {
                    run_id: run.metadata.run_id.clone(),
                    reason,
                })
                .await;
        }

        tracing::info!(
            "session {}: stopped run {} ({reason})",
            self.id,
            run.metadata.run_id
        );
        true
    }

    /// Records the latest control command. Returns `false` when idle.
    pub async fn submit_command(&mut self, command: ControlCommand) -> bool {
        self.reap().await;
        if self.active.is_none() {
            return false;
        }

        self.commands.send_replace(command);
        true
    }

    /// Re-pushes the most recent frame, marked as a replay, without advancing the program.
    ///
    /// Pushes a loading placeholder if no frame has arrived yet. Returns `false` when idle.
    pub async fn force_refresh(&mut self) -> bool {
        self.reap().await;
        let Some(run) = &self.active else {
            return false;
        };

        let snapshot = match self.latest.borrow().as_ref() {
            Some((frame, state)) => Snapshot::encode(*frame, state),
            None => Snapshot::loading(),
        };

        self.viewer
            .emit(ViewerEvent::Snapshot {
                run_id: run.metadata.run_id.clone(),
                snapshot,
                replay: true,
            })
            .await;
        true
    }

    /// Stops any running worker because the viewer went away.
    pub async fn teardown(&mut self, reason: StopReason) {
        self.stop_with(reason).await;
    }

    /// Drops a run whose relay task already finished.
    async fn reap(&mut self) {
        if !self
            .active
            .as_ref()
            .is_some_and(|run| run.handle.is_finished())
        {
            return;
        }

        if let Some(run) = self.active.take() {
            match run.handle.await {
                Ok(outcome) => tracing::debug!(
                    "session {}: run {} ended: {outcome:?}",
                    self.id,
                    run.metadata.run_id
                ),
                Err(e) => tracing::error!("session {}: relay task failed: {e}", self.id),
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for SessionController {
    fn drop(&mut self) {
        // Relay tasks own their workers; cancelling lets them shut down and clean up.
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    use super::*;
    use crate::{
        codec::ProgramState,
        session::ViewerEnvelope,
        worker::scripted::{ScriptedLauncher, Step},
        SimrelayError,
    };

    fn config() -> RelayConfig {
        RelayConfig::builder()
            .poll_interval(Duration::from_millis(20))
            .gate_timeout(Duration::from_millis(10))
            .stop_grace(Duration::from_millis(10))
            .max_push_fps(1000)
            .build()
    }

    fn controller(
        config: RelayConfig,
        launcher: Arc<ScriptedLauncher>,
    ) -> (SessionController, Receiver<ViewerEnvelope>) {
        let (viewer, rx) = ViewerChannel::new("session-test", 1024);
        (
            SessionController::new("session-test", config, launcher, viewer),
            rx,
        )
    }

    fn snake_files() -> BTreeMap<String, String> {
        BTreeMap::from([("snake.py".to_string(), "print('hi')\n".to_string())])
    }

    fn state(value: Value) -> ProgramState {
        match value {
            Value::Object(map) => map.into(),
            _ => panic!("state must be an object"),
        }
    }

    fn run_id_of(event: &ViewerEvent) -> &str {
        match event {
            ViewerEvent::Snapshot { run_id, .. }
            | ViewerEvent::RunStopped { run_id, .. }
            | ViewerEvent::Error { run_id, .. }
            | ViewerEvent::Output { run_id, .. } => run_id,
            ViewerEvent::RunStarted { metadata, .. } => &metadata.run_id,
        }
    }

    fn drain(rx: &mut Receiver<ViewerEnvelope>) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    /// Receives events until one matches `done`, returning everything received.
    async fn recv_until(
        rx: &mut Receiver<ViewerEnvelope>,
        done: impl Fn(&ViewerEvent) -> bool,
    ) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        loop {
            let envelope = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for viewer event")
                .expect("viewer channel closed");
            let matched = done(&envelope.event);
            events.push(envelope.event);
            if matched {
                return events;
            }
        }
    }

    fn is_stopped(event: &ViewerEvent) -> bool {
        matches!(event, ViewerEvent::RunStopped { .. })
    }

    fn is_snapshot(event: &ViewerEvent) -> bool {
        matches!(event, ViewerEvent::Snapshot { .. })
    }

    #[tokio::test]
    async fn test_controller_start_pushes_run_started_then_snapshots() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher.clone());

        let metadata = session.start(snake_files(), Some(json!({"level": 2}))).await?;
        assert!(metadata.run_id.starts_with("run-"));
        assert_eq!(metadata.entry, "snake.py");
        assert!(session.is_running());
        assert_eq!(session.runs_started(), 1);

        let events = recv_until(&mut rx, is_snapshot).await;
        match &events[0] {
            ViewerEvent::RunStarted { metadata: m, level } => {
                assert_eq!(m, &metadata);
                assert_eq!(level, &Some(json!({"level": 2})));
            }
            other => panic!("expected run_started, got {other:?}"),
        }

        assert!(session.stop().await);
        assert!(!session.is_running());
        assert!(launcher.record(0).is_shut_down());
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_stop_when_idle_returns_false() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher);

        assert!(!session.stop().await);
        assert!(!session.submit_command(ControlCommand::Up).await);
        assert!(!session.force_refresh().await);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_controller_replacement_event_order() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher);

        let first = session.start(snake_files(), None).await?;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = session.start(snake_files(), None).await?;
        tokio::time::sleep(Duration::from_millis(30)).await;
        session.stop().await;

        let events = drain(&mut rx);
        let stops: Vec<_> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| is_stopped(e))
            .collect();
        assert_eq!(stops.len(), 2);

        let (replaced_at, replaced) = stops[0];
        assert_eq!(
            replaced,
            &ViewerEvent::RunStopped {
                run_id: first.run_id.clone(),
                reason: StopReason::Replaced,
            }
        );

        match &events[replaced_at + 1] {
            ViewerEvent::RunStarted { metadata, .. } => assert_eq!(metadata.run_id, second.run_id),
            other => panic!("expected run_started, got {other:?}"),
        }

        assert!(events[..replaced_at]
            .iter()
            .all(|e| run_id_of(e) == first.run_id));
        assert!(events[replaced_at + 1..]
            .iter()
            .all(|e| run_id_of(e) == second.run_id));
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_stall_reports_error_then_run_stopped() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![Step::Frame(1, ProgramState::new()), Step::Hang]);

        let mut config = config();
        config.set_poll_interval(Duration::from_millis(10));
        config.set_stall_limit(3);
        let (mut session, mut rx) = controller(config, launcher.clone());

        let run = session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, is_stopped).await;

        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["run_started", "snapshot", "error", "run_stopped"]);
        assert_eq!(events[2].failure_kind(), Some(FailureKind::Stall));
        assert_eq!(
            events[3],
            ViewerEvent::RunStopped {
                run_id: run.run_id,
                reason: StopReason::Stalled,
            }
        );

        assert!(launcher.record(0).is_shut_down());
        assert!(!session.is_running());
        assert!(!session.stop().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_delivers_default_command_without_input() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher.clone());

        session.start(snake_files(), None).await?;
        for _ in 0..3 {
            recv_until(&mut rx, is_snapshot).await;
        }
        session.stop().await;

        let commands = launcher.record(0).commands();
        assert!(commands.len() >= 3);
        assert!(commands.iter().all(|c| *c == ControlCommand::Right));
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_delivers_latest_command_and_resets_on_start() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher.clone());

        session.start(snake_files(), None).await?;
        recv_until(&mut rx, is_snapshot).await;
        assert!(session.submit_command(ControlCommand::Down).await);
        assert!(session.submit_command(ControlCommand::Up).await);
        assert_eq!(session.command(), ControlCommand::Up);

        // Let a few more frames through so the command is delivered.
        for _ in 0..3 {
            recv_until(&mut rx, is_snapshot).await;
        }

        let commands = launcher.record(0).commands();
        assert_eq!(commands.last(), Some(&ControlCommand::Up));

        session.start(snake_files(), None).await?;
        assert_eq!(session.command(), ControlCommand::Right);
        session.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_refresh_before_first_frame_sends_loading() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![Step::Hang]);
        let (mut session, mut rx) = controller(config(), launcher);

        session.start(snake_files(), None).await?;
        assert!(session.force_refresh().await);

        let events = recv_until(&mut rx, is_snapshot).await;
        match events.last() {
            Some(ViewerEvent::Snapshot {
                snapshot, replay, ..
            }) => {
                assert!(*replay);
                assert_eq!(snapshot, &Snapshot::loading());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }

        session.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_refresh_replays_latest_frame() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![
            Step::Frame(1, state(json!({"score": 3}))),
            Step::Frame(2, state(json!({"score": 7}))),
            Step::Hang,
        ]);
        let (mut session, mut rx) = controller(config(), launcher.clone());

        session.start(snake_files(), None).await?;
        recv_until(&mut rx, |e| {
            matches!(e, ViewerEvent::Snapshot { snapshot, .. } if snapshot.frame == 2)
        })
        .await;
        assert_eq!(session.last_frame(), Some(2));
        let delivered = launcher.record(0).commands().len();

        assert!(session.force_refresh().await);
        let events = recv_until(&mut rx, is_snapshot).await;
        match events.last() {
            Some(ViewerEvent::Snapshot {
                snapshot, replay, ..
            }) => {
                assert!(*replay);
                assert_eq!(snapshot.frame, 2);
                assert_eq!(snapshot.score, 7);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }

        // A refresh never advances the program.
        assert_eq!(launcher.record(0).commands().len(), delivered);
        session.stop().await;
        Ok(())
    }

    fn relayed_frames(events: &[ViewerEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                ViewerEvent::Snapshot {
                    snapshot,
                    replay: false,
                    ..
                } => Some(snapshot.frame),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_controller_held_frame_is_pushed_when_worker_goes_quiet() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![
            Step::Frame(1, state(json!({"score": 1}))),
            Step::Frame(2, state(json!({"score": 2}))),
            Step::Hang,
        ]);

        let mut config = config();
        config.set_max_push_fps(30);
        let (mut session, mut rx) = controller(config, launcher);

        session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, |e| {
            matches!(e, ViewerEvent::Snapshot { snapshot, .. } if snapshot.frame == 2)
        })
        .await;

        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["run_started", "snapshot", "snapshot"]);
        assert_eq!(relayed_frames(&events), [1, 2]);

        session.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_held_frame_precedes_stall_error() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![
            Step::Frame(1, ProgramState::new()),
            Step::Frame(2, ProgramState::new()),
            Step::Hang,
        ]);

        let mut config = config();
        config.set_poll_interval(Duration::from_millis(10));
        config.set_stall_limit(3);
        config.set_max_push_fps(1);
        let (mut session, mut rx) = controller(config, launcher);

        session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, is_stopped).await;

        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            ["run_started", "snapshot", "snapshot", "error", "run_stopped"]
        );
        assert_eq!(relayed_frames(&events), [1, 2]);
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_discards_non_increasing_frames() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![
            Step::Frame(2, state(json!({"score": 2}))),
            Step::Frame(1, state(json!({"score": 1}))),
            Step::Frame(2, state(json!({"score": 20}))),
            Step::Frame(3, state(json!({"score": 3}))),
            Step::Hang,
        ]);
        let (mut session, mut rx) = controller(config(), launcher);

        session.start(snake_files(), None).await?;
        let mut events = recv_until(&mut rx, |e| {
            matches!(e, ViewerEvent::Snapshot { snapshot, .. } if snapshot.frame == 3)
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        events.extend(drain(&mut rx));

        assert_eq!(relayed_frames(&events), [2, 3]);
        assert!(events.iter().all(|e| match e {
            ViewerEvent::Snapshot { snapshot, .. } => snapshot.score != 1 && snapshot.score != 20,
            _ => true,
        }));
        assert_eq!(session.last_frame(), Some(3));

        session.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_rejects_bundle_without_entry_point() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher.clone());

        let files = BTreeMap::from([
            ("a.py".to_string(), "x = 1\n".to_string()),
            ("b.py".to_string(), "y = 2\n".to_string()),
        ]);
        let result = session.start(files, None).await;
        assert!(matches!(result, Err(SimrelayError::NoEntryPoint(_))));
        assert!(!session.is_running());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].failure_kind(), Some(FailureKind::Load));
    }

    #[tokio::test]
    async fn test_controller_invalid_bundle_replaces_running_run() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher.clone());

        let first = session.start(snake_files(), None).await?;
        recv_until(&mut rx, is_snapshot).await;

        let files = BTreeMap::from([("../escape.py".to_string(), String::new())]);
        let result = session.start(files, None).await;
        assert!(matches!(result, Err(SimrelayError::InvalidBundle(_))));
        assert!(!session.is_running());
        assert!(launcher.record(0).is_shut_down());

        let events = drain(&mut rx);
        let tail: Vec<_> = events.iter().filter(|e| !is_snapshot(e)).collect();
        assert_eq!(
            tail[0],
            &ViewerEvent::RunStopped {
                run_id: first.run_id,
                reason: StopReason::Replaced,
            }
        );
        assert_eq!(tail[1].failure_kind(), Some(FailureKind::Load));
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_empty_bundle_runs_placeholder() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, _rx) = controller(config(), launcher);

        let metadata = session.start(BTreeMap::new(), None).await?;
        assert!(metadata.placeholder);
        session.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_frame_limit_flushes_and_stops() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let mut config = config();
        config.set_max_frames(Some(3));
        let (mut session, mut rx) = controller(config, launcher.clone());

        let run = session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, is_stopped).await;

        let frames: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ViewerEvent::Snapshot { snapshot, .. } => Some(snapshot.frame),
                _ => None,
            })
            .collect();
        assert_eq!(frames.last(), Some(&3));
        assert_eq!(
            events.last(),
            Some(&ViewerEvent::RunStopped {
                run_id: run.run_id,
                reason: StopReason::FrameLimit,
            })
        );
        assert!(launcher.record(0).is_shut_down());
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_forwards_output_and_exits_quietly() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![
            Step::Output("hello".to_string()),
            Step::Frame(1, ProgramState::new()),
            Step::Exit(0),
        ]);
        let (mut session, mut rx) = controller(config(), launcher.clone());

        session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, is_snapshot).await;
        assert!(events.iter().any(|e| matches!(
            e,
            ViewerEvent::Output { line, .. } if line == "hello"
        )));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!session.is_running());
        assert!(launcher.record(0).is_shut_down());

        let rest = drain(&mut rx);
        assert!(rest.iter().all(|e| !is_stopped(e) && e.failure_kind().is_none()));
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_worker_error_is_pushed_once() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let mut report = FailureReport::new(FailureKind::Runtime, "division by zero");
        report.exception = Some("ZeroDivisionError".to_string());
        report.filename = Some("snake.py".to_string());
        report.line = Some(4);
        launcher.push_script(vec![
            Step::Frame(1, ProgramState::new()),
            Step::Error(report.clone()),
        ]);
        let (mut session, mut rx) = controller(config(), launcher);

        let run = session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, |e| e.failure_kind().is_some()).await;
        assert_eq!(
            events.last(),
            Some(&ViewerEvent::error(&run.run_id, report))
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!session.is_running());
        assert!(drain(&mut rx).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_unexpected_exit_is_a_channel_error() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push_script(vec![Step::Frame(1, ProgramState::new()), Step::Exit(2)]);
        let (mut session, mut rx) = controller(config(), launcher);

        session.start(snake_files(), None).await?;
        let events = recv_until(&mut rx, |e| e.failure_kind().is_some()).await;
        match events.last() {
            Some(ViewerEvent::Error { report, .. }) => {
                assert_eq!(report.kind, FailureKind::Channel);
                assert!(report.message.contains("exit code 2"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_teardown_is_silent() -> anyhow::Result<()> {
        let launcher = Arc::new(ScriptedLauncher::new());
        let (mut session, mut rx) = controller(config(), launcher.clone());

        session.start(snake_files(), None).await?;
        recv_until(&mut rx, is_snapshot).await;
        session.teardown(StopReason::Disconnected).await;

        assert!(launcher.record(0).is_shut_down());
        assert!(drain(&mut rx).iter().all(|e| !is_stopped(e)));
        Ok(())
    }
}
