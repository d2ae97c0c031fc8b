use crate::models::ForwardEvent;
use crate::services::acceptor::{AcceptTicket, AcceptedConnection};
use crate::services::log_service::EventLog;
use crate::services::transport::{ChannelId, ReadStatus, WriteStatus};
use crate::services::transport_actor::TransportHandle;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bytes relayed by one worker
#[derive(Debug, Clone, Default)]
pub struct TrafficCounter {
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
}

impl TrafficCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local → channel
    pub fn add_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Channel → local
    pub fn add_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> (u64, u64) {
        (
            self.bytes_sent.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        )
    }
}

/// Why a worker reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// No connection arrived: accept timeout, cancellation or accept error
    NeverAccepted,
    Cancelled,
    /// The local peer closed its side (zero-length read)
    LocalClosed,
    /// The channel reported EOF or close
    RemoteClosed,
    LocalError(String),
    ChannelError(String),
}

impl CloseReason {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::LocalError(_) | Self::ChannelError(_))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverAccepted => write!(f, "no connection accepted"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::LocalClosed => write!(f, "local peer closed"),
            Self::RemoteClosed => write!(f, "remote closed"),
            Self::LocalError(e) => write!(f, "local socket error: {}", e),
            Self::ChannelError(e) => write!(f, "channel error: {}", e),
        }
    }
}

/// What a worker reports once it has finished
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub index: usize,
    pub channel: ChannelId,
    pub peer: Option<SocketAddr>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub reason: CloseReason,
}

enum WorkerState {
    WaitingForAcceptance,
    Relaying(AcceptedConnection),
    Closed {
        connection: Option<AcceptedConnection>,
        reason: CloseReason,
    },
}

/// Everything one worker needs, fixed for its lifetime
pub struct WorkerContext {
    pub index: usize,
    pub channel: ChannelId,
    pub transport: TransportHandle,
    pub tickets: mpsc::Sender<AcceptTicket>,
    pub buffer_size: usize,
    pub relay_poll_interval: Duration,
    pub cancel: CancellationToken,
    pub log: Arc<EventLog>,
}

/// Relays one accepted local connection over one channel.
pub struct ForwardingWorker {
    index: usize,
    channel: ChannelId,
    transport: TransportHandle,
    tickets: Option<mpsc::Sender<AcceptTicket>>,
    buffer_size: usize,
    relay_poll_interval: Duration,
    cancel: CancellationToken,
    log: Arc<EventLog>,
    traffic: TrafficCounter,
}

impl ForwardingWorker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            index: ctx.index,
            channel: ctx.channel,
            transport: ctx.transport,
            tickets: Some(ctx.tickets),
            buffer_size: ctx.buffer_size.max(1),
            relay_poll_interval: ctx.relay_poll_interval.max(Duration::from_millis(1)),
            cancel: ctx.cancel,
            log: ctx.log,
            traffic: TrafficCounter::new(),
        }
    }

    pub fn spawn(self) -> JoinHandle<WorkerOutcome> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> WorkerOutcome {
        let mut state = WorkerState::WaitingForAcceptance;

        loop {
            state = match state {
                WorkerState::WaitingForAcceptance => self.wait_for_connection().await,
                WorkerState::Relaying(mut connection) => {
                    let reason = self.relay(&mut connection.stream).await;
                    WorkerState::Closed {
                        connection: Some(connection),
                        reason,
                    }
                }
                WorkerState::Closed { connection, reason } => {
                    return self.close(connection, reason).await;
                }
            };
        }
    }

    async fn wait_for_connection(&mut self) -> WorkerState {
        let closed = |reason| WorkerState::Closed {
            connection: None,
            reason,
        };

        // One ticket per worker; dropping the sender lets the acceptor
        // notice when every worker has been served.
        let Some(tickets) = self.tickets.take() else {
            return closed(CloseReason::NeverAccepted);
        };
        let (ticket, delivery) = AcceptTicket::new(self.index);
        if tickets.send(ticket).await.is_err() {
            return closed(CloseReason::NeverAccepted);
        }
        drop(tickets);

        tokio::select! {
            _ = self.cancel.cancelled() => closed(CloseReason::Cancelled),
            delivered = delivery => match delivered {
                Ok(connection) => WorkerState::Relaying(connection),
                Err(_) => closed(CloseReason::NeverAccepted),
            },
        }
    }

    async fn relay(&self, stream: &mut TcpStream) -> CloseReason {
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            if self.cancel.is_cancelled() {
                return CloseReason::Cancelled;
            }

            match tokio::time::timeout(self.relay_poll_interval, stream.read(&mut buf)).await {
                // Local side idle
                Err(_) => {}
                Ok(Ok(0)) => return CloseReason::LocalClosed,
                Ok(Ok(n)) => {
                    if let Some(reason) = self.send_to_channel(stream, &buf[..n]).await {
                        return reason;
                    }
                }
                Ok(Err(e)) => return CloseReason::LocalError(e.to_string()),
            }

            if let Some(reason) = self.drain_channel(stream).await {
                return reason;
            }
        }
    }

    /// Write all of `data` to the channel. While the channel's window is
    /// shut the worker keeps draining the other direction and backs off
    /// for one relay poll interval between attempts.
    async fn send_to_channel(&self, stream: &mut TcpStream, data: &[u8]) -> Option<CloseReason> {
        let mut offset = 0;
        while offset < data.len() {
            match self.transport.write(self.channel, &data[offset..]).await {
                Ok(WriteStatus::Written(n)) => {
                    offset += n;
                    self.traffic.add_sent(n as u64);
                }
                Ok(WriteStatus::WouldBlock) => {
                    if let Some(reason) = self.drain_channel(stream).await {
                        return Some(reason);
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Some(CloseReason::Cancelled),
                        _ = tokio::time::sleep(self.relay_poll_interval) => {}
                    }
                }
                Err(e) => return Some(CloseReason::ChannelError(e.to_string())),
            }
        }
        None
    }

    /// Copy everything the channel has buffered into the local socket
    async fn drain_channel(&self, stream: &mut TcpStream) -> Option<CloseReason> {
        loop {
            match self.transport.read(self.channel, self.buffer_size).await {
                Ok(ReadStatus::Data(data)) => {
                    if let Err(e) = stream.write_all(&data).await {
                        return Some(CloseReason::LocalError(e.to_string()));
                    }
                    self.traffic.add_received(data.len() as u64);
                }
                Ok(ReadStatus::WouldBlock) => return None,
                Ok(ReadStatus::Eof) => return Some(CloseReason::RemoteClosed),
                Err(e) => return Some(CloseReason::ChannelError(e.to_string())),
            }
        }
    }

    async fn close(self, connection: Option<AcceptedConnection>, reason: CloseReason) -> WorkerOutcome {
        let peer = connection.as_ref().map(|c| c.peer);

        if let Some(mut connection) = connection {
            if let Err(e) = self.transport.send_eof(self.channel).await {
                tracing::debug!("Worker {}: EOF on channel {} not sent: {}", self.index, self.channel, e);
            }
            let _ = connection.stream.shutdown().await;
        }

        let (bytes_sent, bytes_received) = self.traffic.get_stats();
        let event = ForwardEvent::WorkerClosed {
            worker: self.index,
            bytes_sent,
            bytes_received,
        };
        if reason.is_error() {
            self.log.warn(event, reason.to_string());
        } else if peer.is_some() {
            self.log.info(event);
        } else {
            self.log.debug(event);
        }

        WorkerOutcome {
            index: self.index,
            channel: self.channel,
            peer,
            bytes_sent,
            bytes_received,
            reason,
        }
    }
}
