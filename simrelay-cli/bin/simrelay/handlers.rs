use std::{net::IpAddr, path::PathBuf, time::Duration};

use simrelay_cli::{check_interpreter, relay_config, serve, AnsiStyles, SimrelayArgs, SimrelayCliResult};
use simrelay_core::{
    codec::{ControlCommand, Snapshot},
    sandbox::SourceBundle,
    session::{SessionRegistry, ViewerEvent},
};
use simrelay_utils::{CHECKMARK, CROSS, OUTPUT_BAR};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const LOCAL_SESSION_ID: &str = "local";

const IDLE_CHECK_INTERVAL: Duration = Duration::from_millis(250);

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

pub fn log_level(args: &SimrelayArgs) {
    let level = if args.trace {
        Some("trace")
    } else if args.debug {
        Some("debug")
    } else if args.info {
        Some("info")
    } else if args.warn {
        Some("warn")
    } else if args.error {
        Some("error")
    } else {
        None
    };

    // Only override RUST_LOG when a level flag is given.
    if let Some(level) = level {
        std::env::set_var(
            "RUST_LOG",
            format!("simrelay_core={level},simrelay_server={level},simrelay={level}"),
        );
    }
}

pub async fn serve_subcommand(
    host: Option<IpAddr>,
    port: Option<u16>,
    python: Option<PathBuf>,
    max_sessions: Option<usize>,
    max_frames: Option<u64>,
) -> SimrelayCliResult<()> {
    let relay = relay_config(python, max_sessions, max_frames)?;
    serve(host, port, relay).await
}

pub async fn run_subcommand(
    path: PathBuf,
    python: Option<PathBuf>,
    max_frames: Option<u64>,
    input: Option<ControlCommand>,
    quiet: bool,
) -> SimrelayCliResult<()> {
    let mut config = relay_config(python, None, max_frames)?;
    config.set_forward_output(!quiet);
    check_interpreter(&config)?;

    let bundle = SourceBundle::from_dir(&path)?;
    let files = bundle
        .files()
        .iter()
        .map(|(name, source)| (name.clone(), source.clone()))
        .collect();

    let registry = SessionRegistry::with_process_launcher(config);
    let mut events = registry.attach(LOCAL_SESSION_ID).await?;

    let metadata = registry.start_run(LOCAL_SESSION_ID, files, None).await?;
    if let Some(command) = input {
        registry.submit_input(LOCAL_SESSION_ID, command).await?;
    }

    println!(
        "{} Running {} from {}",
        &*CHECKMARK,
        metadata.entry.literal(),
        path.display()
    );
    if !metadata.stubs.is_empty() {
        println!("  stubbed: {}", metadata.stubs.join(", ").placeholder());
    }

    let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);
    let mut failed = false;
    loop {
        tokio::select! {
            envelope = events.recv() => {
                let Some(envelope) = envelope else { break };
                match envelope.event {
                    ViewerEvent::Snapshot { snapshot, .. } => print_snapshot(&snapshot),
                    ViewerEvent::Output { line, .. } => println!("{} {line}", &*OUTPUT_BAR),
                    ViewerEvent::Error { message, report, .. } => {
                        failed = true;
                        println!("{} {}", &*CROSS, message.error());
                        if let Some(traceback) = report.traceback {
                            for line in traceback.lines() {
                                println!("{} {line}", &*OUTPUT_BAR);
                            }
                        }
                    }
                    ViewerEvent::RunStopped { reason, .. } => {
                        println!("{} Run stopped ({reason})", &*CHECKMARK);
                        break;
                    }
                    ViewerEvent::RunStarted { .. } => {}
                }
            }
            _ = idle_check.tick() => {
                // A program that ends on its own leaves the session idle without a final event.
                if !registry.summaries().await.iter().any(|s| s.running) {
                    while let Ok(envelope) = events.try_recv() {
                        if let ViewerEvent::Snapshot { snapshot, .. } = envelope.event {
                            print_snapshot(&snapshot);
                        }
                    }
                    if !failed {
                        println!("{} Program finished", &*CHECKMARK);
                    }
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                registry.stop_run(LOCAL_SESSION_ID).await?;
                println!("{} Run stopped (interrupted)", &*CHECKMARK);
                break;
            }
        }
    }

    registry.shutdown().await;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn print_snapshot(snapshot: &Snapshot) {
    let entities = snapshot
        .entities
        .iter()
        .map(|e| format!("{}:{}", e.name, e.cells.len()))
        .collect::<Vec<_>>()
        .join(" ");

    let mut line = format!(
        "frame {:>5}  score {:>4}  {}x{}  {}",
        snapshot.frame, snapshot.score, snapshot.grid.width, snapshot.grid.height, entities
    );

    if let Some(status) = &snapshot.status {
        line.push_str(&format!("  [{}: {}]", status.title, status.body));
    }

    if snapshot.is_terminal() {
        line.push_str(&format!("  {}", "game over".header()));
    }

    println!("{line}");
}
