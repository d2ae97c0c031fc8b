use crate::models::ForwardEvent;
use crate::services::log_service::EventLog;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A local connection handed to one worker
#[derive(Debug)]
pub struct AcceptedConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

/// An idle worker's request for its one connection
pub struct AcceptTicket {
    pub worker: usize,
    deliver: oneshot::Sender<AcceptedConnection>,
}

impl AcceptTicket {
    pub fn new(worker: usize) -> (Self, oneshot::Receiver<AcceptedConnection>) {
        let (deliver, receive) = oneshot::channel();
        (Self { worker, deliver }, receive)
    }
}

/// Where the acceptor takes local connections from
#[async_trait]
pub trait ConnectionSource: Send + 'static {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl ConnectionSource for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// The only task that accepts on the shared listener.
///
/// Idle workers queue tickets; each accepted connection goes to the worker
/// at the head of the queue. Accepting stops on cancellation, when the
/// optional accept timeout elapses, or once every worker has been served.
/// Dropping unserved tickets is how waiting workers learn to close.
pub struct ListenerAcceptor<L = TcpListener> {
    listener: L,
    tickets: mpsc::Receiver<AcceptTicket>,
    poll_interval: Duration,
    deadline: Option<Instant>,
    cancel: CancellationToken,
    log: Arc<EventLog>,
}

impl<L: ConnectionSource> ListenerAcceptor<L> {
    pub fn new(
        listener: L,
        tickets: mpsc::Receiver<AcceptTicket>,
        poll_interval: Duration,
        accept_timeout: Option<Duration>,
        cancel: CancellationToken,
        log: Arc<EventLog>,
    ) -> Self {
        Self {
            listener,
            tickets,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            deadline: accept_timeout.map(|t| Instant::now() + t),
            cancel,
            log,
        }
    }

    /// Run on its own task; the listener comes back through the join handle
    pub fn spawn(self) -> JoinHandle<L> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> L {
        let mut served = 0usize;

        while let Some(ticket) = self.next_ticket().await {
            if !self.serve(ticket).await {
                break;
            }
            served += 1;
        }

        tracing::debug!("Acceptor stopping after {} connections", served);
        self.listener
    }

    async fn next_ticket(&mut self) -> Option<AcceptTicket> {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => None,
            _ = expired => {
                tracing::info!("Accept timeout elapsed");
                None
            }
            ticket = self.tickets.recv() => ticket,
        }
    }

    /// Accept one connection for `ticket`. Returns `false` when accepting
    /// should stop altogether.
    async fn serve(&mut self, ticket: AcceptTicket) -> bool {
        loop {
            let wait = match self.deadline {
                Some(at) => {
                    let left = at.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        tracing::info!("Accept timeout elapsed");
                        return false;
                    }
                    left.min(self.poll_interval)
                }
                None => self.poll_interval,
            };

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => return false,
                attempt = tokio::time::timeout(wait, self.listener.accept()) => attempt,
            };

            match attempt {
                // Nothing pending yet
                Err(_) => continue,
                Ok(Ok((stream, peer))) => {
                    self.log.info(ForwardEvent::ConnectionAccepted {
                        worker: ticket.worker,
                        peer: peer.to_string(),
                    });
                    if ticket.deliver.send(AcceptedConnection { stream, peer }).is_err() {
                        tracing::warn!("Worker {} went away before its connection arrived", ticket.worker);
                    }
                    return true;
                }
                // Dropping the ticket closes the waiting worker
                Ok(Err(e)) => {
                    tracing::warn!("Accept for worker {} failed: {}", ticket.worker, e);
                    return true;
                }
            }
        }
    }
}
