//! The seam between the forwarding engine and an SSH client library.
//!
//! [`SshBackend`] turns a connected socket into a session; [`SshTransport`]
//! is that session. A transport is not safe for concurrent calls: the engine
//! only ever touches it through `&mut self`, first during bootstrap and then
//! from inside the [`TransportActor`](super::transport_actor::TransportActor).

use crate::models::{ForwarderSettings, OfferedMethods};
use crate::utils::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use tokio::net::TcpStream;

/// Backend-assigned handle for one direct-tcpip channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a non-blocking channel write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// This many bytes were accepted; may be fewer than offered
    Written(usize),
    /// Nothing accepted yet, try again
    WouldBlock,
}

/// Result of a non-blocking channel read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    Data(Vec<u8>),
    /// No data buffered right now
    WouldBlock,
    /// The remote side sent EOF or closed the channel
    Eof,
}

#[async_trait]
pub trait SshBackend: Send + Sync + 'static {
    type Transport: SshTransport;

    /// Run the SSH handshake over an already connected socket
    async fn handshake(
        &self,
        stream: TcpStream,
        settings: &ForwarderSettings,
    ) -> Result<Self::Transport, TransportError>;

    /// Release process-wide library state after the session is gone
    fn release(&self) {}
}

#[async_trait]
pub trait SshTransport: Send + 'static {
    /// Raw SSH encoding of the server host key seen during the handshake
    fn host_key(&self) -> &[u8];

    /// True once the server accepted the `none` method or a real one
    fn is_authenticated(&self) -> bool {
        false
    }

    async fn auth_methods(&mut self, username: &str) -> Result<OfferedMethods, TransportError>;

    async fn auth_password(&mut self, username: &str, password: &str) -> Result<bool, TransportError>;

    async fn auth_public_key(
        &mut self,
        username: &str,
        private_key: &str,
        passphrase: &str,
    ) -> Result<bool, TransportError>;

    async fn open_direct_tcpip(
        &mut self,
        remote_host: &str,
        remote_port: u16,
        origin_host: &str,
        origin_port: u16,
    ) -> Result<ChannelId, TransportError>;

    async fn write(&mut self, channel: ChannelId, data: &[u8]) -> Result<WriteStatus, TransportError>;

    /// Return at most `max` buffered bytes without waiting for more
    async fn read(&mut self, channel: ChannelId, max: usize) -> Result<ReadStatus, TransportError>;

    async fn send_eof(&mut self, channel: ChannelId) -> Result<(), TransportError>;

    /// Close and forget a channel. Unknown ids are ignored.
    async fn free_channel(&mut self, channel: ChannelId);

    async fn disconnect(&mut self, description: &str);
}
