use crate::models::ForwardEvent;
use crate::services::log_service::EventLog;
use crate::services::transport::{ChannelId, SshBackend, SshTransport};
use socket2::Socket;
use std::net::Shutdown;
use tokio::net::TcpListener;

/// One thing the coordinator actually released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    ListenerClosed,
    ChannelsFreed(usize),
    SessionDisconnected,
    SocketClosed,
    BackendReleased,
}

impl ShutdownStep {
    fn describe(&self) -> String {
        match self {
            Self::ListenerClosed => "listener closed".to_string(),
            Self::ChannelsFreed(n) => format!("{} channels freed", n),
            Self::SessionDisconnected => "session disconnected".to_string(),
            Self::SocketClosed => "socket closed".to_string(),
            Self::BackendReleased => "backend released".to_string(),
        }
    }
}

/// Registry of everything a run has created, torn down in a fixed order.
///
/// Each setup stage registers its resource as soon as it exists. Whatever
/// was never registered is skipped, and running [`shutdown`](Self::shutdown)
/// twice releases nothing the second time.
pub struct ShutdownCoordinator<T> {
    listener: Option<TcpListener>,
    channels: Vec<ChannelId>,
    transport: Option<T>,
    /// Second handle on the outbound connection; the session owns the first
    socket: Option<Socket>,
    backend_released: bool,
}

impl<T> Default for ShutdownCoordinator<T> {
    fn default() -> Self {
        Self {
            listener: None,
            channels: Vec::new(),
            transport: None,
            socket: None,
            backend_released: false,
        }
    }
}

impl<T: SshTransport> ShutdownCoordinator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_socket(&mut self, socket: Socket) {
        self.socket = Some(socket);
    }

    pub fn register_transport(&mut self, transport: T) {
        self.transport = Some(transport);
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    pub fn take_transport(&mut self) -> Option<T> {
        self.transport.take()
    }

    pub fn register_listener(&mut self, listener: TcpListener) {
        self.listener = Some(listener);
    }

    pub fn take_listener(&mut self) -> Option<TcpListener> {
        self.listener.take()
    }

    pub fn register_channels(&mut self, channels: &[ChannelId]) {
        self.channels.extend_from_slice(channels);
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Close the listener, free channels, disconnect the session, close the
    /// socket and release the backend, in that order.
    pub async fn shutdown<B>(&mut self, backend: &B, log: &EventLog) -> Vec<ShutdownStep>
    where
        B: SshBackend<Transport = T>,
    {
        let mut steps = Vec::new();

        if self.listener.take().is_some() {
            steps.push(ShutdownStep::ListenerClosed);
        }

        let channels = std::mem::take(&mut self.channels);
        if !channels.is_empty() {
            match self.transport.as_mut() {
                Some(transport) => {
                    for channel in &channels {
                        transport.free_channel(*channel).await;
                    }
                    steps.push(ShutdownStep::ChannelsFreed(channels.len()));
                }
                None => {
                    tracing::warn!("{} channels registered without a session", channels.len());
                }
            }
        }

        if let Some(mut transport) = self.transport.take() {
            transport.disconnect("Port forwarding finished").await;
            drop(transport);
            steps.push(ShutdownStep::SessionDisconnected);
        }

        if let Some(socket) = self.socket.take() {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                tracing::debug!("Outbound socket already down: {}", e);
            }
            drop(socket);
            steps.push(ShutdownStep::SocketClosed);
        }

        if !self.backend_released {
            backend.release();
            self.backend_released = true;
            steps.push(ShutdownStep::BackendReleased);
        }

        for step in &steps {
            log.debug(ForwardEvent::ShutdownStep {
                step: step.describe(),
            });
        }
        steps
    }
}
