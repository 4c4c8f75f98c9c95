mod handlers;

use clap::{CommandFactory, Parser};
use simrelay_cli::{AnsiStyles, SimrelayArgs, SimrelayCliResult, SimrelaySubcommand};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> SimrelayCliResult<()> {
    dotenvy::dotenv().ok();
    let args = SimrelayArgs::parse();

    handlers::log_level(&args);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    if args.version {
        println!("{}", format!("v{}", env!("CARGO_PKG_VERSION")).literal());
        return Ok(());
    }

    match args.subcommand {
        Some(SimrelaySubcommand::Serve {
            host,
            port,
            python,
            max_sessions,
            max_frames,
        }) => {
            handlers::serve_subcommand(host, port, python, max_sessions, max_frames).await?;
        }
        Some(SimrelaySubcommand::Run {
            path,
            python,
            max_frames,
            input,
            quiet,
        }) => {
            handlers::run_subcommand(path, python, max_frames, input, quiet).await?;
        }
        None => {
            SimrelayArgs::command().print_help()?;
        }
    }

    Ok(())
}
