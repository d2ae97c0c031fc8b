use serde::{Deserialize, Serialize};
use std::fmt;

/// Local port forwarding (-L)
/// Maps a local port to a remote host:port through SSH
/// Example: -L 22222:10.0.0.5:3389
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalForwarding {
    /// Local port to listen on
    pub local_port: u16,
    /// Remote host to connect to, resolved by the SSH server
    pub remote_host: String,
    /// Remote port to connect to
    pub remote_port: u16,
    /// Bind address (default: "127.0.0.1"), must be a literal IP
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

impl LocalForwarding {
    pub fn new(local_port: u16, remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            local_port,
            remote_host: remote_host.into(),
            remote_port,
            bind_address: default_bind_address(),
        }
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    /// `bind:port:host:hostport`, the OpenSSH `-L` spelling
    pub fn to_spec(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.bind_address, self.local_port, self.remote_host, self.remote_port
        )
    }
}

impl fmt::Display for LocalForwarding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} → {}:{}",
            self.bind_address, self.local_port, self.remote_host, self.remote_port
        )
    }
}
