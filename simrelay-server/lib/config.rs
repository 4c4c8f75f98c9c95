//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use getset::Getters;
use simrelay_core::config::RelayConfig;
use simrelay_utils::DEFAULT_SERVER_PORT;

use crate::ServerResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Address the server binds to when no host is given.
pub const LOCALHOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings of a running server.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Config {
    /// Address to listen on
    addr: SocketAddr,

    /// Settings handed to every session
    relay: RelayConfig,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Config {
    /// Creates a configuration, validating the relay settings.
    pub fn new(host: Option<IpAddr>, port: Option<u16>, relay: RelayConfig) -> ServerResult<Self> {
        relay.validate()?;

        let addr = SocketAddr::new(
            host.unwrap_or(LOCALHOST_IP),
            port.unwrap_or(DEFAULT_SERVER_PORT),
        );

        Ok(Self { addr, relay })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
