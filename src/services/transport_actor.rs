//! Single owner of the SSH session while forwarding runs.
//!
//! Workers never see the transport. They hold a cloneable
//! [`TransportHandle`] and send one request per channel read or write; the
//! actor serves requests strictly one at a time, so no two channel calls can
//! overlap. When every handle is dropped the actor hands the transport back
//! through its join handle for shutdown.

use crate::services::transport::{ChannelId, ReadStatus, SshTransport, WriteStatus};
use crate::utils::error::TransportError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<Result<T, TransportError>>;

enum TransportRequest {
    Write {
        channel: ChannelId,
        data: Vec<u8>,
        reply: Reply<WriteStatus>,
    },
    Read {
        channel: ChannelId,
        max: usize,
        reply: Reply<ReadStatus>,
    },
    SendEof {
        channel: ChannelId,
        reply: Reply<()>,
    },
}

pub struct TransportActor<T> {
    transport: T,
    requests: mpsc::Receiver<TransportRequest>,
    served: u64,
}

impl<T: SshTransport> TransportActor<T> {
    /// Move `transport` into a new task; `queue_depth` bounds pending requests
    pub fn spawn(transport: T, queue_depth: usize) -> (TransportHandle, JoinHandle<T>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let actor = Self {
            transport,
            requests: rx,
            served: 0,
        };
        (TransportHandle { requests: tx }, tokio::spawn(actor.run()))
    }

    async fn run(mut self) -> T {
        while let Some(request) = self.requests.recv().await {
            self.served += 1;
            match request {
                TransportRequest::Write {
                    channel,
                    data,
                    reply,
                } => {
                    let result = self.transport.write(channel, &data).await;
                    let _ = reply.send(result);
                }
                TransportRequest::Read {
                    channel,
                    max,
                    reply,
                } => {
                    let result = self.transport.read(channel, max).await;
                    let _ = reply.send(result);
                }
                TransportRequest::SendEof { channel, reply } => {
                    let result = self.transport.send_eof(channel).await;
                    let _ = reply.send(result);
                }
            }
        }

        tracing::debug!("Transport actor stopping after {} requests", self.served);
        self.transport
    }
}

/// Cloneable request side of a [`TransportActor`]
#[derive(Clone)]
pub struct TransportHandle {
    requests: mpsc::Sender<TransportRequest>,
}

impl TransportHandle {
    async fn call<R>(
        &self,
        build: impl FnOnce(Reply<R>) -> TransportRequest,
    ) -> Result<R, TransportError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| TransportError::Closed)?;
        response.await.map_err(|_| TransportError::Closed)?
    }

    /// One non-blocking write attempt
    pub async fn write(&self, channel: ChannelId, data: &[u8]) -> Result<WriteStatus, TransportError> {
        let data = data.to_vec();
        self.call(|reply| TransportRequest::Write {
            channel,
            data,
            reply,
        })
        .await
    }

    pub async fn read(&self, channel: ChannelId, max: usize) -> Result<ReadStatus, TransportError> {
        self.call(|reply| TransportRequest::Read {
            channel,
            max,
            reply,
        })
        .await
    }

    pub async fn send_eof(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.call(|reply| TransportRequest::SendEof { channel, reply })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OfferedMethods;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Accepts at most three bytes per write and reports WouldBlock on
    /// every other call.
    #[derive(Default)]
    struct Trickle {
        written: HashMap<ChannelId, Vec<u8>>,
        calls: usize,
    }

    #[async_trait]
    impl SshTransport for Trickle {
        fn host_key(&self) -> &[u8] {
            &[]
        }

        async fn auth_methods(&mut self, _: &str) -> Result<OfferedMethods, TransportError> {
            Ok(OfferedMethods::default())
        }

        async fn auth_password(&mut self, _: &str, _: &str) -> Result<bool, TransportError> {
            Ok(false)
        }

        async fn auth_public_key(&mut self, _: &str, _: &str, _: &str) -> Result<bool, TransportError> {
            Ok(false)
        }

        async fn open_direct_tcpip(&mut self, _: &str, _: u16, _: &str, _: u16) -> Result<ChannelId, TransportError> {
            Ok(ChannelId(1))
        }

        async fn write(&mut self, channel: ChannelId, data: &[u8]) -> Result<WriteStatus, TransportError> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Ok(WriteStatus::WouldBlock);
            }
            let n = data.len().min(3);
            self.written.entry(channel).or_default().extend_from_slice(&data[..n]);
            Ok(WriteStatus::Written(n))
        }

        async fn read(&mut self, channel: ChannelId, _: usize) -> Result<ReadStatus, TransportError> {
            if channel == ChannelId(9) {
                return Err(TransportError::UnknownChannel(channel));
            }
            Ok(ReadStatus::WouldBlock)
        }

        async fn send_eof(&mut self, _: ChannelId) -> Result<(), TransportError> {
            Ok(())
        }

        async fn free_channel(&mut self, _: ChannelId) {}

        async fn disconnect(&mut self, _: &str) {}
    }

    #[tokio::test]
    async fn test_write_statuses_pass_through_unchanged() {
        let (handle, task) = TransportActor::spawn(Trickle::default(), 4);

        assert_eq!(
            handle.write(ChannelId(1), b"hello").await.unwrap(),
            WriteStatus::Written(3)
        );
        assert_eq!(
            handle.write(ChannelId(1), b"lo").await.unwrap(),
            WriteStatus::WouldBlock
        );
        assert_eq!(
            handle.write(ChannelId(1), b"lo").await.unwrap(),
            WriteStatus::Written(2)
        );
        drop(handle);

        let transport = task.await.unwrap();
        assert_eq!(transport.written[&ChannelId(1)], b"hello");
        assert_eq!(transport.calls, 3);
    }

    #[tokio::test]
    async fn test_errors_are_returned_to_caller() {
        let (handle, task) = TransportActor::spawn(Trickle::default(), 4);

        let err = handle.read(ChannelId(9), 16).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownChannel(ChannelId(9))));
        assert_eq!(handle.read(ChannelId(1), 16).await.unwrap(), ReadStatus::WouldBlock);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_actor_reports_closed() {
        let (handle, task) = TransportActor::spawn(Trickle::default(), 1);
        task.abort();
        let _ = task.await;

        let err = handle.send_eof(ChannelId(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
