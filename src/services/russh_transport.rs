use crate::models::{ForwarderSettings, OfferedMethods};
use crate::services::transport::{ChannelId, ReadStatus, SshBackend, SshTransport, WriteStatus};
use crate::utils::error::TransportError;
use async_trait::async_trait;
use futures::FutureExt;
use russh::client::{self, AuthResult, Handle, Msg};
// Note: In russh 0.55.0, key types are re-exported in russh::keys
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, ChannelMsg, Disconnect, MethodKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;

/// [`SshBackend`] built on russh
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshBackend;

#[async_trait]
impl SshBackend for RusshBackend {
    type Transport = RusshTransport;

    async fn handshake(
        &self,
        stream: TcpStream,
        settings: &ForwarderSettings,
    ) -> Result<RusshTransport, TransportError> {
        let config = client::Config {
            inactivity_timeout: settings.inactivity_timeout(),
            keepalive_interval: settings.keepalive_interval(),
            ..<client::Config as Default>::default()
        };

        let handler = HostKeyCapture::default();
        let captured = handler.host_key.clone();

        let handle = client::connect_stream(Arc::new(config), stream, handler).await?;

        let host_key = captured
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| TransportError::Key("server presented no host key".to_string()))?;

        Ok(RusshTransport {
            handle,
            host_key,
            channels: HashMap::new(),
            next_channel: 0,
            authenticated: false,
        })
    }
}

/// Client handler that records the server key for later verification.
/// The user decides on the fingerprints after the handshake, before any
/// credentials are sent.
#[derive(Clone, Default)]
pub struct HostKeyCapture {
    host_key: Arc<Mutex<Option<Vec<u8>>>>,
}

impl client::Handler for HostKeyCapture {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl std::future::Future<Output = std::result::Result<bool, Self::Error>> + Send {
        let encoded = server_public_key.to_bytes();
        let slot = self.host_key.clone();

        async move {
            match encoded {
                Ok(blob) => {
                    tracing::debug!("Server presented a {} byte host key", blob.len());
                    if let Ok(mut slot) = slot.lock() {
                        *slot = Some(blob);
                    }
                    Ok(true)
                }
                Err(e) => {
                    tracing::error!("Could not encode server host key: {}", e);
                    Ok(false)
                }
            }
        }
    }
}

struct ChannelSlot {
    channel: Channel<Msg>,
    /// Data received but not yet handed to the worker
    pending: Vec<u8>,
    eof: bool,
}

/// An authenticated (or authenticating) russh session
pub struct RusshTransport {
    handle: Handle<HostKeyCapture>,
    host_key: Vec<u8>,
    channels: HashMap<ChannelId, ChannelSlot>,
    next_channel: u32,
    authenticated: bool,
}

impl RusshTransport {
    fn slot(&mut self, channel: ChannelId) -> Result<&mut ChannelSlot, TransportError> {
        self.channels
            .get_mut(&channel)
            .ok_or(TransportError::UnknownChannel(channel))
    }
}

#[async_trait]
impl SshTransport for RusshTransport {
    fn host_key(&self) -> &[u8] {
        &self.host_key
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn auth_methods(&mut self, username: &str) -> Result<OfferedMethods, TransportError> {
        match self.handle.authenticate_none(username).await? {
            AuthResult::Success => {
                tracing::warn!("Server accepted 'none' authentication for {}", username);
                self.authenticated = true;
                Ok(OfferedMethods::default())
            }
            AuthResult::Failure {
                remaining_methods, ..
            } => Ok(OfferedMethods {
                password: remaining_methods.contains(&MethodKind::Password),
                public_key: remaining_methods.contains(&MethodKind::PublicKey),
            }),
        }
    }

    async fn auth_password(&mut self, username: &str, password: &str) -> Result<bool, TransportError> {
        let auth_res = self.handle.authenticate_password(username, password).await?;

        // In russh 0.55.0, AuthResult is an enum, not a bool
        self.authenticated = matches!(auth_res, AuthResult::Success);
        Ok(self.authenticated)
    }

    async fn auth_public_key(
        &mut self,
        username: &str,
        private_key: &str,
        passphrase: &str,
    ) -> Result<bool, TransportError> {
        let passphrase = (!passphrase.is_empty()).then_some(passphrase);
        let key = russh::keys::decode_secret_key(private_key.trim(), passphrase)
            .map_err(|e| TransportError::Key(format!("Failed to load key: {}", e)))?;

        let hash_alg = if key.algorithm().is_rsa() {
            self.handle.best_supported_rsa_hash().await?.flatten()
        } else {
            None
        };

        let key_with_alg = PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);
        let auth_res = self
            .handle
            .authenticate_publickey(username, key_with_alg)
            .await?;

        self.authenticated = matches!(auth_res, AuthResult::Success);
        Ok(self.authenticated)
    }

    async fn open_direct_tcpip(
        &mut self,
        remote_host: &str,
        remote_port: u16,
        origin_host: &str,
        origin_port: u16,
    ) -> Result<ChannelId, TransportError> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(
                remote_host,
                remote_port as u32,
                origin_host,
                origin_port as u32,
            )
            .await?;

        self.next_channel += 1;
        let id = ChannelId(self.next_channel);
        self.channels.insert(
            id,
            ChannelSlot {
                channel,
                pending: Vec::new(),
                eof: false,
            },
        );
        Ok(id)
    }

    async fn write(&mut self, channel: ChannelId, data: &[u8]) -> Result<WriteStatus, TransportError> {
        if data.is_empty() {
            return Ok(WriteStatus::Written(0));
        }
        let slot = self.slot(channel)?;
        // Never more than the remote window allows, so `data` cannot wait
        let room = slot.channel.writable_packet_size().await;
        if room == 0 {
            return Ok(WriteStatus::WouldBlock);
        }
        let n = data.len().min(room);
        slot.channel.data(&data[..n]).await?;
        Ok(WriteStatus::Written(n))
    }

    async fn read(&mut self, channel: ChannelId, max: usize) -> Result<ReadStatus, TransportError> {
        let slot = self.slot(channel)?;

        while slot.pending.len() < max && !slot.eof {
            match slot.channel.wait().now_or_never() {
                None => break,
                Some(Some(ChannelMsg::Data { ref data })) => {
                    slot.pending.extend_from_slice(data);
                }
                Some(Some(ChannelMsg::Eof)) | Some(Some(ChannelMsg::Close)) | Some(None) => {
                    slot.eof = true;
                }
                Some(Some(_)) => {}
            }
        }

        if !slot.pending.is_empty() {
            let n = slot.pending.len().min(max);
            return Ok(ReadStatus::Data(slot.pending.drain(..n).collect()));
        }
        if slot.eof {
            Ok(ReadStatus::Eof)
        } else {
            Ok(ReadStatus::WouldBlock)
        }
    }

    async fn send_eof(&mut self, channel: ChannelId) -> Result<(), TransportError> {
        let slot = self.slot(channel)?;
        slot.channel.eof().await?;
        Ok(())
    }

    async fn free_channel(&mut self, channel: ChannelId) {
        if let Some(slot) = self.channels.remove(&channel) {
            if let Err(e) = slot.channel.close().await {
                tracing::debug!("Closing channel {} failed: {}", channel, e);
            }
        }
    }

    async fn disconnect(&mut self, description: &str) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, description, "English")
            .await
        {
            tracing::debug!("Disconnect failed: {}", e);
        }
        tracing::info!("Disconnected from SSH server");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::client::Handler;
    use russh::keys::ssh_key::rand_core::OsRng;
    use russh::keys::{Algorithm, PrivateKey};

    #[tokio::test]
    async fn test_host_key_capture_records_key() {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let public = key.public_key().clone();

        let mut handler = HostKeyCapture::default();
        let accepted = handler.check_server_key(&public).await.unwrap();

        assert!(accepted);
        let stored = handler.host_key.lock().unwrap().clone().unwrap();
        assert_eq!(stored, public.to_bytes().unwrap());
    }
}
