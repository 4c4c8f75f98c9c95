//! Runs real programs through interpreter worker processes.
//!
//! Every test is skipped when no `python3` interpreter is installed.

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use simrelay_core::{
    config::RelayConfig,
    session::{SessionRegistry, StopReason, ViewerEnvelope, ViewerEvent},
    FailureKind,
};
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_syntax_error_is_a_single_load_error() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    relay.start(&[("snake.py", "def broken(:\n    pass\n")]).await?;

    let events = relay.recv_until(is_error).await;
    assert_eq!(events[0].name(), "run_started");
    match events.last() {
        Some(ViewerEvent::Error { report, .. }) => {
            assert_eq!(report.kind, FailureKind::Load);
            assert_eq!(report.exception.as_deref(), Some("SyntaxError"));
            assert_eq!(report.filename.as_deref(), Some("snake.py"));
            assert_eq!(report.line, Some(1));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(events.len(), 2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(relay.drain().is_empty());
    assert!(relay.scopes()?.is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_missing_support_module_is_stubbed() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
from game_utils import *

score = 0
while True:
    get_user_direction()
";
    let metadata = relay.start(&[("snake.py", program)]).await?;
    assert_eq!(metadata.stubs, vec!["game_utils.py".to_string()]);

    let events = relay.recv_until(is_snapshot).await;
    assert!(events.iter().all(|e| !is_error(e)));
    match events.last() {
        Some(ViewerEvent::Snapshot { snapshot, .. }) => {
            assert_eq!(snapshot.frame, 1);
            let status = snapshot.status.as_ref().expect("status text");
            assert!(!status.title.is_empty());
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    assert!(relay.stop().await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_gate_returns_default_command_without_input() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
score = 0
for _ in range(3):
    if get_user_direction() == RIGHT:
        score += 1
game_over = True
get_user_direction()
";
    relay.start(&[("snake.py", program)]).await?;

    let events = relay
        .recv_until(|e| matches!(e, ViewerEvent::Snapshot { snapshot, .. } if snapshot.is_terminal()))
        .await;
    match events.last() {
        Some(ViewerEvent::Snapshot { snapshot, .. }) => {
            assert_eq!(snapshot.frame, 4);
            assert_eq!(snapshot.score, 3);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    // The program ends on its own; that is silent.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(relay.drain().iter().all(|e| !is_error(e) && !is_stopped(e)));
    assert!(relay.scopes()?.is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_submitted_command_reaches_program() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
score = 0
while get_user_direction() != UP:
    pass
score = 1
game_over = True
get_user_direction()
";
    relay.start(&[("snake.py", program)]).await?;
    relay.recv_until(is_snapshot).await;
    relay
        .registry
        .submit_input(&relay.id, "up".parse()?)
        .await?;

    let events = relay
        .recv_until(|e| matches!(e, ViewerEvent::Snapshot { snapshot, .. } if snapshot.is_terminal()))
        .await;
    assert!(matches!(
        events.last(),
        Some(ViewerEvent::Snapshot { snapshot, .. }) if snapshot.score == 1
    ));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_runtime_error_reports_location() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
tick = 0
while True:
    get_user_direction()
    tick += 1
    if tick == 2:
        print(1 / 0)
";
    relay.start(&[("snake.py", program)]).await?;

    let events = relay.recv_until(is_error).await;
    match events.last() {
        Some(ViewerEvent::Error { report, message, .. }) => {
            assert_eq!(report.kind, FailureKind::Runtime);
            assert_eq!(report.exception.as_deref(), Some("ZeroDivisionError"));
            assert_eq!(report.filename.as_deref(), Some("snake.py"));
            assert_eq!(report.line, Some(6));
            assert!(message.contains("ZeroDivisionError"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_program_that_never_reaches_gate_is_stopped() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| {
        c.poll_interval(Duration::from_millis(100))
            .stall_limit(5)
            .stop_grace(Duration::from_millis(100))
    })
    .await?
    else {
        return Ok(());
    };

    relay.start(&[("snake.py", "while True:\n    pass\n")]).await?;

    let events = relay.recv_until(is_stopped).await;
    let names: Vec<_> = events.iter().map(|e| e.name()).collect();
    assert_eq!(names, ["run_started", "error", "run_stopped"]);
    assert_eq!(events[1].failure_kind(), Some(FailureKind::Stall));
    assert!(matches!(
        events[2],
        ViewerEvent::RunStopped {
            reason: StopReason::Stalled,
            ..
        }
    ));
    assert!(relay.scopes()?.is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_replacing_a_run_removes_previous_scope() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "while True:\n    get_user_direction()\n";
    let first = relay.start(&[("snake.py", program)]).await?;
    relay.recv_until(is_snapshot).await;
    assert_eq!(relay.scopes()?.len(), 1);

    let second = relay.start(&[("main.py", program)]).await?;
    assert_eq!(second.entry, "main.py");
    assert_eq!(relay.scopes()?.len(), 1);

    let events = relay
        .recv_until(|e| matches!(e, ViewerEvent::Snapshot { run_id, .. } if *run_id == second.run_id))
        .await;
    let started = events
        .iter()
        .position(|e| e.name() == "run_started")
        .expect("run_started");
    assert_eq!(
        events[..started].iter().filter(|e| is_stopped(e)).count(),
        1
    );
    assert!(events[started..].iter().all(|e| match e {
        ViewerEvent::Snapshot { run_id, .. } => *run_id == second.run_id,
        _ => true,
    }));
    assert_ne!(first.run_id, second.run_id);

    assert!(relay.stop().await?);
    assert!(relay.scopes()?.is_empty());
    assert!(!relay.stop().await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_empty_bundle_runs_placeholder() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let metadata = relay.start(&[]).await?;
    assert!(metadata.placeholder);

    let events = relay.recv_until(is_snapshot).await;
    match events.last() {
        Some(ViewerEvent::Snapshot { snapshot, .. }) => {
            assert!(snapshot.is_terminal());
            let status = snapshot.status.as_ref().expect("status text");
            assert_eq!(status.title, "Missing program");
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_program_output_is_forwarded() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "print('hello from the program')\nwhile True:\n    get_user_direction()\n";
    relay.start(&[("snake.py", program)]).await?;

    relay
        .recv_until(|e| matches!(e, ViewerEvent::Output { line, .. } if line == "hello from the program"))
        .await;
    relay.stop().await?;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_disconnect_tears_down_worker() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    relay
        .start(&[("snake.py", "while True:\n    get_user_direction()\n")])
        .await?;
    relay.recv_until(is_snapshot).await;

    assert!(relay.registry.disconnect(&relay.id).await);
    assert!(relay.scopes()?.is_empty());
    assert!(relay.registry.is_empty().await);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_program_importing_pygame_runs_headless() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
import pygame

pygame.init()
screen = pygame.display.set_mode((600, 400))
pygame.display.set_caption('snake')
clock = pygame.time.Clock()
score = 4
while True:
    for event in pygame.event.get():
        pass
    get_user_direction()
    clock.tick(10)
";
    relay.start(&[("snake.py", program)]).await?;

    let events = relay.recv_until(|e| is_snapshot(e) || is_error(e)).await;
    match events.last() {
        Some(ViewerEvent::Snapshot { snapshot, .. }) => assert_eq!(snapshot.score, 4),
        other => panic!("expected snapshot, got {other:?}"),
    }

    assert!(relay.stop().await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_oversized_state_drops_largest_globals() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
blob = 'x' * (8 * 1024 * 1024)
score = 9
while True:
    get_user_direction()
";
    relay.start(&[("snake.py", program)]).await?;

    let events = relay.recv_until(|e| is_snapshot(e) || is_error(e)).await;
    match events.last() {
        Some(ViewerEvent::Snapshot { snapshot, .. }) => assert_eq!(snapshot.score, 9),
        other => panic!("expected snapshot, got {other:?}"),
    }

    assert!(relay.stop().await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unterminated_output_flood_is_truncated() -> anyhow::Result<()> {
    let Some(mut relay) = Relay::new(|c| c).await? else {
        return Ok(());
    };

    let program = "\
import sys

for _ in range(64):
    sys.stderr.write('e' * (1024 * 1024))
sys.stderr.write('\\n')
print('still here')
while True:
    get_user_direction()
";
    relay.start(&[("snake.py", program)]).await?;

    let events = relay
        .recv_until(|e| matches!(e, ViewerEvent::Output { line, .. } if line == "still here"))
        .await;
    let flooded = events
        .iter()
        .find_map(|e| match e {
            ViewerEvent::Output { line, .. } if line.starts_with('e') => Some(line),
            _ => None,
        })
        .expect("flooded output line");
    assert!(flooded.ends_with(" [truncated]"));
    assert!(flooded.len() < 64 * 1024);
    assert!(events.iter().all(|e| !is_error(e)));

    relay.stop().await?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A registry with one connected session and its own scratch directory.
struct Relay {
    registry: SessionRegistry,
    id: String,
    rx: Receiver<ViewerEnvelope>,
    scratch: TempDir,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Relay {
    async fn new(
        configure: impl FnOnce(RelayConfigBuilder) -> RelayConfigBuilder,
    ) -> anyhow::Result<Option<Self>> {
        let Some(python) = python() else {
            eprintln!("python3 not found, skipping");
            return Ok(None);
        };

        let scratch = TempDir::new()?;
        let builder = RelayConfigBuilder {
            python,
            scratch: scratch.path().to_path_buf(),
            poll_interval: Duration::from_millis(200),
            stall_limit: 25,
            stop_grace: Duration::from_millis(200),
        };
        let options = configure(builder);

        let config = RelayConfig::builder()
            .python_exe(options.python)
            .scratch_dir(options.scratch)
            .poll_interval(options.poll_interval)
            .stall_limit(options.stall_limit)
            .stop_grace(options.stop_grace)
            .max_push_fps(1000)
            .build();
        config.validate()?;

        let registry = SessionRegistry::with_process_launcher(config);
        let (id, rx) = registry.connect().await?;
        Ok(Some(Self {
            registry,
            id,
            rx,
            scratch,
        }))
    }

    async fn start(
        &mut self,
        files: &[(&str, &str)],
    ) -> anyhow::Result<simrelay_core::worker::RunMetadata> {
        let files: BTreeMap<String, String> = files
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();
        Ok(self.registry.start_run(&self.id, files, None).await?)
    }

    async fn stop(&mut self) -> anyhow::Result<bool> {
        Ok(self.registry.stop_run(&self.id).await?)
    }

    async fn recv_until(&mut self, done: impl Fn(&ViewerEvent) -> bool) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        loop {
            let envelope = tokio::time::timeout(Duration::from_secs(15), self.rx.recv())
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

    fn drain(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    /// Run scopes currently present in the scratch directory.
    fn scopes(&self) -> anyhow::Result<Vec<PathBuf>> {
        Ok(std::fs::read_dir(self.scratch.path())?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?)
    }
}

/// Overridable knobs for a test relay.
struct RelayConfigBuilder {
    python: PathBuf,
    scratch: PathBuf,
    poll_interval: Duration,
    stall_limit: u32,
    stop_grace: Duration,
}

impl RelayConfigBuilder {
    fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn stall_limit(mut self, limit: u32) -> Self {
        self.stall_limit = limit;
        self
    }

    fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn python() -> Option<PathBuf> {
    which::which("python3").ok()
}

fn is_snapshot(event: &ViewerEvent) -> bool {
    matches!(event, ViewerEvent::Snapshot { .. })
}

fn is_error(event: &ViewerEvent) -> bool {
    matches!(event, ViewerEvent::Error { .. })
}

fn is_stopped(event: &ViewerEvent) -> bool {
    matches!(event, ViewerEvent::RunStopped { .. })
}
