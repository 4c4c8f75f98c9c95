use std::{net::IpAddr, path::PathBuf};

use clap::Parser;
use simrelay_utils::DEFAULT_SERVER_PORT;

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Arguments for the simrelayserver command
#[derive(Debug, Parser)]
#[command(name = "simrelayserver", author, styles=styles::styles())]
pub struct SimrelayserverArgs {
    /// Address to listen on
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port number to listen on
    #[arg(short, long, default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Interpreter used to run programs
    #[arg(long)]
    pub python: Option<PathBuf>,

    /// Maximum concurrent sessions
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Stop each run after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,
}
