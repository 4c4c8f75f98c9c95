//! The relay task of a running session.

use tokio::{
    sync::watch,
    time::{timeout_at, Instant},
};
use tokio_util::sync::CancellationToken;

use super::{StopReason, ViewerChannel, ViewerEvent};
use crate::{
    codec::{ControlCommand, ProgramState, Snapshot},
    config::RelayConfig,
    worker::{Worker, WorkerEvent, WorkerExit, WorkerMessage},
    FailureKind, FailureReport,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How a run ended, as seen by its relay task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The worker exited on its own without reporting an error
    Exited(WorkerExit),

    /// The run failed and an error event was pushed
    Failed(FailureKind),

    /// The worker stopped reaching the frame gate
    Stalled,

    /// The run reached the frame limit
    FrameLimit,

    /// The controller cancelled the run
    Cancelled,
}

/// The latest frame received from the worker.
pub(crate) type LatestFrame = Option<(u64, ProgramState)>;

pub(crate) struct Relay {
    pub run_id: String,
    pub worker: Box<dyn Worker>,
    pub viewer: ViewerChannel,
    pub commands: watch::Receiver<ControlCommand>,
    pub latest: watch::Sender<LatestFrame>,
    pub cancel: CancellationToken,
    pub config: RelayConfig,
}

/// Result of one poll of the worker.
enum Poll {
    Message(WorkerMessage),
    FlushDue,
    Elapsed,
    Closed,
}

/// Per-run counters.
#[derive(Default)]
struct Progress {
    last_frame: u64,
    relayed: u64,
    idle_polls: u32,
    last_push: Option<Instant>,
    held: Option<Snapshot>,
    input_closed: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Relay {
    /// Pumps the worker until it ends or the run is cancelled, then shuts the worker down.
    ///
    /// The worker is always shut down and its scope removed before this returns.
    pub async fn run(mut self) -> RunOutcome {
        let cancel = self.cancel.clone();
        let mut progress = Progress::default();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => RunOutcome::Cancelled,
            outcome = self.pump(&mut progress) => outcome,
        };

        let grace = self.config.get_stop_grace();
        if let Err(e) = self.worker.shutdown(grace).await {
            tracing::error!("failed to shut down worker for run {}: {e}", self.run_id);
        }

        match outcome {
            RunOutcome::Stalled => {
                let waited = self.config.get_poll_interval() * self.config.get_stall_limit();
                let report = FailureReport::new(
                    FailureKind::Stall,
                    format!(
                        "the program did not reach get_user_direction() for {:.1}s and was stopped",
                        waited.as_secs_f64()
                    ),
                );
                self.flush_held(&mut progress).await;
                self.viewer.emit(ViewerEvent::error(&self.run_id, report)).await;
                self.stopped(StopReason::Stalled).await;
            }
            RunOutcome::FrameLimit => {
                self.flush_held(&mut progress).await;
                self.stopped(StopReason::FrameLimit).await;
            }
            RunOutcome::Exited(_) => self.flush_held(&mut progress).await,
            RunOutcome::Failed(_) | RunOutcome::Cancelled => {}
        }

        tracing::info!("relay for run {} finished: {outcome:?}", self.run_id);
        outcome
    }

    async fn pump(&mut self, progress: &mut Progress) -> RunOutcome {
        let poll = self.config.get_poll_interval();
        let stall_limit = self.config.get_stall_limit();

        let mut deadline = Instant::now() + poll;
        loop {
            let flush_at = match progress.held {
                Some(_) => progress.last_push.map(|at| at + self.config.push_interval()),
                None => None,
            };

            let message = match self.next_message(deadline, flush_at).await {
                Poll::Message(message) => message,
                Poll::Closed => return self.on_closed(progress).await,
                Poll::FlushDue => {
                    self.release_held(progress);
                    continue;
                }
                Poll::Elapsed => {
                    deadline = Instant::now() + poll;
                    progress.idle_polls += 1;
                    if progress.idle_polls >= stall_limit {
                        tracing::warn!(
                            "run {} stalled after {} empty polls",
                            self.run_id,
                            progress.idle_polls
                        );
                        return RunOutcome::Stalled;
                    }
                    continue;
                }
            };

            deadline = Instant::now() + poll;
            progress.idle_polls = 0;
            match message {
                WorkerMessage::Frame { frame, state } => {
                    if frame <= progress.last_frame {
                        tracing::debug!(
                            "run {}: discarding frame {frame} (last relayed {})",
                            self.run_id,
                            progress.last_frame
                        );
                        continue;
                    }

                    progress.last_frame = frame;
                    progress.relayed += 1;
                    self.push_frame(progress, frame, state).await;
                    self.deliver_command(progress).await;

                    if let Some(max_frames) = self.config.get_max_frames() {
                        if progress.relayed >= max_frames {
                            return RunOutcome::FrameLimit;
                        }
                    }
                }
                WorkerMessage::Error(report) => {
                    let kind = report.kind;
                    tracing::info!("run {} failed: {}", self.run_id, report.summary());
                    self.flush_held(progress).await;
                    self.viewer.emit(ViewerEvent::error(&self.run_id, report)).await;
                    return RunOutcome::Failed(kind);
                }
            }
        }
    }

    /// Waits until `deadline` for a protocol message, forwarding program output meanwhile.
    ///
    /// Returns early with [`Poll::FlushDue`] once `flush_at` passes.
    async fn next_message(&mut self, deadline: Instant, flush_at: Option<Instant>) -> Poll {
        let wake = flush_at.map_or(deadline, |at| at.min(deadline));
        loop {
            match timeout_at(wake, self.worker.recv()).await {
                Ok(Some(WorkerEvent::Message(message))) => return Poll::Message(message),
                Ok(Some(WorkerEvent::Output(line))) => {
                    if self.config.get_forward_output() {
                        self.viewer.offer(ViewerEvent::Output {
                            run_id: self.run_id.clone(),
                            line,
                        });
                    }
                }
                Ok(None) => return Poll::Closed,
                Err(_) if wake < deadline => return Poll::FlushDue,
                Err(_) => return Poll::Elapsed,
            }
        }
    }

    async fn push_frame(&mut self, progress: &mut Progress, frame: u64, state: ProgramState) {
        let snapshot = Snapshot::encode(frame, &state);
        self.latest.send_replace(Some((frame, state)));

        let due = progress
            .last_push
            .map_or(true, |at| at.elapsed() >= self.config.push_interval());

        if snapshot.is_terminal() {
            progress.held = None;
            progress.last_push = Some(Instant::now());
            self.viewer.emit(self.snapshot_event(snapshot)).await;
        } else if due {
            progress.held = None;
            progress.last_push = Some(Instant::now());
            self.viewer.offer(self.snapshot_event(snapshot));
        } else {
            progress.held = Some(snapshot);
        }
    }

    async fn deliver_command(&mut self, progress: &mut Progress) {
        if progress.input_closed {
            return;
        }

        let command = *self.commands.borrow();
        if let Err(e) = self.worker.send_command(command).await {
            // The worker may simply have exited after this frame; its exit status decides.
            tracing::debug!("run {}: could not deliver command: {e}", self.run_id);
            progress.input_closed = true;
        }
    }

    async fn on_closed(&mut self, progress: &mut Progress) -> RunOutcome {
        let exit = self.worker.wait_exit().await;
        if !matches!(&exit, Ok(status) if status.success()) {
            self.flush_held(progress).await;
        }

        match exit {
            Ok(exit) if exit.success() => {
                tracing::info!("run {} exited", self.run_id);
                RunOutcome::Exited(exit)
            }
            Ok(exit) => {
                let report = FailureReport::new(
                    FailureKind::Channel,
                    format!("the program ended unexpectedly ({exit})"),
                );
                self.viewer.emit(ViewerEvent::error(&self.run_id, report)).await;
                RunOutcome::Failed(FailureKind::Channel)
            }
            Err(e) => {
                let report = FailureReport::new(
                    FailureKind::Channel,
                    format!("lost contact with the program: {e}"),
                );
                self.viewer.emit(ViewerEvent::error(&self.run_id, report)).await;
                RunOutcome::Failed(FailureKind::Channel)
            }
        }
    }

    /// Offers the held snapshot once its push interval has passed.
    fn release_held(&self, progress: &mut Progress) {
        if let Some(snapshot) = progress.held.take() {
            progress.last_push = Some(Instant::now());
            self.viewer.offer(self.snapshot_event(snapshot));
        }
    }

    /// Emits the held snapshot ahead of an error or the end of the run.
    async fn flush_held(&mut self, progress: &mut Progress) {
        if let Some(snapshot) = progress.held.take() {
            progress.last_push = Some(Instant::now());
            let event = self.snapshot_event(snapshot);
            self.viewer.emit(event).await;
        }
    }

    async fn stopped(&mut self, reason: StopReason) {
        self.viewer
            .emit(ViewerEvent::RunStopped {
                run_id: self.run_id.clone(),
                reason,
            })
            .await;
    }

    fn snapshot_event(&self, snapshot: Snapshot) -> ViewerEvent {
        ViewerEvent::Snapshot {
            run_id: self.run_id.clone(),
            snapshot,
            replay: false,
        }
    }
}
