use std::{net::IpAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use simrelay_core::codec::ControlCommand;

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runs simulation programs and relays their state to viewers
#[derive(Debug, Parser)]
#[command(name = "simrelay", author, styles=styles::styles())]
pub struct SimrelayArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<SimrelaySubcommand>,

    /// Show version
    #[arg(short = 'V', long, global = true)]
    pub version: bool,

    /// Show logs with error level
    #[arg(long, global = true)]
    pub error: bool,

    /// Show logs with warn level
    #[arg(long, global = true)]
    pub warn: bool,

    /// Show logs with info level
    #[arg(long, global = true)]
    pub info: bool,

    /// Show logs with debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show logs with trace level
    #[arg(long, global = true)]
    pub trace: bool,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum SimrelaySubcommand {
    /// Start the viewer server
    #[command(name = "serve")]
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interpreter used to run programs
        #[arg(long)]
        python: Option<PathBuf>,

        /// Maximum concurrent sessions
        #[arg(long)]
        max_sessions: Option<usize>,

        /// Stop each run after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Run a program directory locally and print its frames
    #[command(name = "run")]
    Run {
        /// Directory holding the program's source files
        #[arg(required = true)]
        path: PathBuf,

        /// Interpreter used to run the program
        #[arg(long)]
        python: Option<PathBuf>,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,

        /// Control command to hold for the whole run
        #[arg(short, long)]
        input: Option<ControlCommand>,

        /// Do not print program output
        #[arg(short, long)]
        quiet: bool,
    },
}
