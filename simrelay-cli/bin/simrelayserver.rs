use clap::Parser;
use simrelay_cli::{relay_config, serve, SimrelayCliResult, SimrelayserverArgs};

//--------------------------------------------------------------------------------------------------
// Functions: Main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
pub async fn main() -> SimrelayCliResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = SimrelayserverArgs::parse();
    let relay = relay_config(args.python, args.max_sessions, args.max_frames)?;

    serve(args.host, Some(args.port), relay).await
}
