//! In-process workers that follow a fixed script, for deterministic session tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use super::{LaunchedWorker, RunMetadata, Worker, WorkerEvent, WorkerExit, WorkerLauncher, WorkerMessage};
use crate::{
    codec::{ControlCommand, ProgramState},
    sandbox::SourceBundle,
    FailureReport, SimrelayResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One step of a worker script.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Emit a frame with the given counter and state
    Frame(u64, ProgramState),

    /// Emit frames forever, one every interval, continuing the counter
    FramesEvery(Duration, ProgramState),

    /// Emit a program output line
    Output(String),

    /// Emit a terminal error report
    Error(FailureReport),

    /// Never produce anything again
    Hang,

    /// Close the streams and exit with the given code
    Exit(i32),
}

/// What a scripted worker observed, shared with the test.
#[derive(Debug, Default)]
pub(crate) struct ScriptRecord {
    pub commands: Mutex<Vec<ControlCommand>>,
    pub shut_down: AtomicBool,
}

pub(crate) struct ScriptedWorker {
    run_id: String,
    steps: VecDeque<Step>,
    last_frame: u64,
    exit: Option<WorkerExit>,
    record: Arc<ScriptRecord>,
}

/// Hands out scripts in launch order. Without a queued script a worker emits frames forever.
#[derive(Default)]
pub(crate) struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    records: Mutex<Vec<Arc<ScriptRecord>>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ScriptRecord {
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, steps: Vec<Step>) {
        self.scripts.lock().unwrap().push_back(steps);
    }

    pub fn record(&self, index: usize) -> Arc<ScriptRecord> {
        self.records.lock().unwrap()[index].clone()
    }

    pub fn launched(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl WorkerLauncher for ScriptedLauncher {
    async fn launch(&self, run_id: &str, bundle: &SourceBundle) -> SimrelayResult<LaunchedWorker> {
        let entry = if bundle.is_empty() {
            "placeholder".to_string()
        } else {
            bundle.entry_point()?
        };

        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
            vec![Step::FramesEvery(
                Duration::from_millis(5),
                ProgramState::new(),
            )]
        });

        let record = Arc::new(ScriptRecord::default());
        self.records.lock().unwrap().push(record.clone());

        Ok(LaunchedWorker {
            worker: Box::new(ScriptedWorker {
                run_id: run_id.to_string(),
                steps: steps.into(),
                last_frame: 0,
                exit: None,
                record,
            }),
            metadata: RunMetadata {
                run_id: run_id.to_string(),
                entry,
                files: bundle.names(),
                stubs: Vec::new(),
                placeholder: bundle.is_empty(),
            },
        })
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn recv(&mut self) -> Option<WorkerEvent> {
        loop {
            if self.exit.is_some() {
                return None;
            }

            let Some(step) = self.steps.pop_front() else {
                self.exit = Some(WorkerExit::with_code(0));
                return None;
            };

            match step {
                Step::Frame(frame, state) => {
                    self.last_frame = frame;
                    return Some(WorkerEvent::Message(WorkerMessage::Frame { frame, state }));
                }
                Step::FramesEvery(interval, state) => {
                    // Re-queued before sleeping so a cancelled receive does not lose it.
                    self.steps
                        .push_front(Step::FramesEvery(interval, state.clone()));
                    tokio::time::sleep(interval).await;
                    self.last_frame += 1;
                    return Some(WorkerEvent::Message(WorkerMessage::Frame {
                        frame: self.last_frame,
                        state,
                    }));
                }
                Step::Output(line) => return Some(WorkerEvent::Output(line)),
                Step::Error(report) => {
                    self.steps.push_front(Step::Exit(1));
                    return Some(WorkerEvent::Message(WorkerMessage::Error(report)));
                }
                Step::Hang => {
                    self.steps.push_front(Step::Hang);
                    std::future::pending::<()>().await;
                }
                Step::Exit(code) => {
                    self.exit = Some(WorkerExit::with_code(code));
                    return None;
                }
            }
        }
    }

    async fn send_command(&mut self, command: ControlCommand) -> SimrelayResult<()> {
        self.record.commands.lock().unwrap().push(command);
        Ok(())
    }

    async fn wait_exit(&mut self) -> SimrelayResult<WorkerExit> {
        Ok(self.exit.unwrap_or_default())
    }

    async fn shutdown(&mut self, _grace: Duration) -> SimrelayResult<WorkerExit> {
        self.record.shut_down.store(true, Ordering::SeqCst);
        let exit = *self.exit.get_or_insert(WorkerExit {
            code: None,
            signal: Some(15),
        });
        Ok(exit)
    }
}
