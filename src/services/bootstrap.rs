use crate::models::{AuthMethod, ForwardEvent, ForwardRequest, ForwarderSettings, HostKeyFingerprints};
use crate::services::log_service::EventLog;
use crate::services::observer::ForwardObserver;
use crate::services::resolver::{HostResolver, ResolvedHost};
use crate::services::shutdown::ShutdownCoordinator;
use crate::services::transport::{SshBackend, SshTransport};
use crate::utils::error::{ForwardError, Result};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpSocket, TcpStream};

/// Resolve, connect, handshake, verify the host key and authenticate.
///
/// On success the authenticated transport is registered with `resources`.
/// On failure everything created so far is registered there too, so the
/// caller's shutdown releases it.
pub struct SessionBootstrap<'a, B: SshBackend> {
    backend: &'a B,
    request: &'a ForwardRequest,
    settings: &'a ForwarderSettings,
    observer: Arc<dyn ForwardObserver>,
    log: &'a EventLog,
}

impl<'a, B: SshBackend> SessionBootstrap<'a, B> {
    pub fn new(
        backend: &'a B,
        request: &'a ForwardRequest,
        settings: &'a ForwarderSettings,
        observer: Arc<dyn ForwardObserver>,
        log: &'a EventLog,
    ) -> Self {
        Self {
            backend,
            request,
            settings,
            observer,
            log,
        }
    }

    pub async fn establish(&self, resources: &mut ShutdownCoordinator<B::Transport>) -> Result<()> {
        let resolved = match HostResolver::resolve(&self.request.host, self.request.port).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.log.error(ForwardEvent::ResolveFailed, e.to_string());
                return Err(e);
            }
        };
        self.log.info(ForwardEvent::Resolved {
            address: resolved.address.ip().to_string(),
            ipv6: resolved.is_ipv6(),
        });

        let stream = match connect(&resolved).await {
            Ok(stream) => stream,
            Err(e) => {
                self.log.error(ForwardEvent::ConnectFailed, e.to_string());
                return Err(e);
            }
        };
        self.log.info(ForwardEvent::Connected);
        let handle = SockRef::from(&stream).try_clone().map_err(ForwardError::Socket)?;
        resources.register_socket(handle);

        let transport = match self.backend.handshake(stream, self.settings).await {
            Ok(transport) => transport,
            Err(e) => {
                self.log.error(ForwardEvent::HandshakeFailed, e.to_string());
                return Err(ForwardError::Handshake(e));
            }
        };
        self.log.info(ForwardEvent::Handshake);

        let fingerprints = HostKeyFingerprints::from_host_key(transport.host_key());
        resources.register_transport(transport);

        self.log.info(ForwardEvent::HostKeyPresented {
            sha256: fingerprints.sha256.clone(),
        });
        if !self.verify(fingerprints).await {
            self.log.warn(ForwardEvent::HostKeyRejected, "user declined the server host key");
            return Err(ForwardError::CertificateRejected);
        }

        let transport = resources
            .transport_mut()
            .ok_or_else(|| ForwardError::ConfigError("session missing after handshake".to_string()))?;
        self.authenticate(transport).await
    }

    async fn verify(&self, fingerprints: HostKeyFingerprints) -> bool {
        let observer = self.observer.clone();
        match tokio::task::spawn_blocking(move || observer.verify_host_key(&fingerprints)).await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("Host key verification callback panicked: {}", e);
                false
            }
        }
    }

    async fn authenticate(&self, transport: &mut B::Transport) -> Result<()> {
        let username = &self.request.username;
        let credentials = &self.request.credentials;

        let offered = transport.auth_methods(username).await.map_err(ForwardError::Handshake)?;
        if transport.is_authenticated() {
            self.log.info(ForwardEvent::AuthSucceeded {
                method: "none".to_string(),
            });
            return Ok(());
        }
        self.log.debug(ForwardEvent::AuthMethodsListed {
            methods: offered.to_string(),
        });

        let Some(method) = credentials.select_method(offered) else {
            self.log.error(
                ForwardEvent::NoAuthMethod,
                format!("server offers '{}' for {}", offered, username),
            );
            return Err(ForwardError::NoAuthMethodAvailable);
        };

        let outcome = match method {
            AuthMethod::Password => transport
                .auth_password(username, &credentials.password)
                .await
                .map_err(|e| ForwardError::AuthPasswordFailed(e.to_string()))
                .and_then(|accepted| {
                    accepted
                        .then_some(())
                        .ok_or_else(|| ForwardError::AuthPasswordFailed("server rejected the password".to_string()))
                }),
            AuthMethod::PublicKey => transport
                .auth_public_key(username, &credentials.private_key, &credentials.passphrase)
                .await
                .map_err(|e| ForwardError::AuthPublicKeyFailed(e.to_string()))
                .and_then(|accepted| {
                    accepted
                        .then_some(())
                        .ok_or_else(|| ForwardError::AuthPublicKeyFailed("server rejected the key".to_string()))
                }),
        };

        match outcome {
            Ok(()) => {
                self.log.info(ForwardEvent::AuthSucceeded {
                    method: method.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                self.log.error(
                    ForwardEvent::AuthFailed {
                        method: method.to_string(),
                    },
                    e.to_string(),
                );
                Err(e)
            }
        }
    }
}

/// TCP connect with `TCP_NODELAY` (and `SO_NOSIGPIPE` on Apple targets) set
/// before the handshake starts.
async fn connect(resolved: &ResolvedHost) -> Result<TcpStream> {
    let address: SocketAddr = resolved.address;
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
        .map_err(ForwardError::Socket)?;
    socket.set_nodelay(true).map_err(ForwardError::Socket)?;
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    socket.set_nosigpipe(true).map_err(ForwardError::Socket)?;
    socket.set_nonblocking(true).map_err(ForwardError::Socket)?;

    let socket = TcpSocket::from_std_stream(socket.into());
    socket
        .connect(address)
        .await
        .map_err(|source| ForwardError::Connect { address, source })
}
