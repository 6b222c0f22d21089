//! Point-to-point price sync with a single peer store
//!
//! Each node listens on one directional TCP channel and pushes to the peer's
//! listener on the other. Ports are fixed by role.

mod agent;
pub mod wire;

pub use agent::{PushOutcome, SyncAgent};

use std::fmt;

/// Listening port of the `server` node
pub const SERVER_LISTEN_PORT: u16 = 5556;

/// Listening port of the `client` node
pub const CLIENT_LISTEN_PORT: u16 = 5557;

/// Statically assigned role of a node in the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// Port this node listens on
    pub fn listen_port(self) -> u16 {
        match self {
            Role::Server => SERVER_LISTEN_PORT,
            Role::Client => CLIENT_LISTEN_PORT,
        }
    }

    /// Port the peer listens on
    pub fn peer_port(self) -> u16 {
        match self {
            Role::Server => CLIENT_LISTEN_PORT,
            Role::Client => SERVER_LISTEN_PORT,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// Addresses used by the sync agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub role: Role,
    /// Interface the inbound listener binds to
    pub bind_host: String,
    pub listen_port: u16,
    pub peer_host: String,
    pub peer_port: u16,
}

impl SyncConfig {
    /// Role-derived ports, listening on all interfaces
    pub fn for_role(role: Role, peer_host: impl Into<String>) -> Self {
        Self {
            role,
            bind_host: "0.0.0.0".to_string(),
            listen_port: role.listen_port(),
            peer_host: peer_host.into(),
            peer_port: role.peer_port(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.listen_port)
    }

    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.peer_host, self.peer_port)
    }
}
