use crate::models::{ForwardEvent, ForwarderSettings, LocalForwarding};
use crate::services::log_service::EventLog;
use crate::services::transport::{ChannelId, SshTransport};
use crate::utils::error::{ForwardError, Result};
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket};

/// Local listener and the fixed set of direct-tcpip channels behind it.
pub struct ChannelPool;

impl ChannelPool {
    /// Bind and listen on the forwarding's local address.
    ///
    /// The bind address must be a literal IP (-5); bind or listen errors,
    /// address-in-use included, map to -6.
    pub fn bind_listener(
        forwarding: &LocalForwarding,
        settings: &ForwarderSettings,
        log: &EventLog,
    ) -> Result<TcpListener> {
        let ip: IpAddr = match forwarding.bind_address.trim().parse() {
            Ok(ip) => ip,
            Err(_) => {
                let err = ForwardError::InvalidListenAddress(forwarding.bind_address.clone());
                log.error(ForwardEvent::ListenFailed, err.to_string());
                return Err(err);
            }
        };
        let address = SocketAddr::new(ip, forwarding.local_port);

        let listener = listen(address, settings.listen_backlog).map_err(|source| {
            let err = ForwardError::ListenSetup {
                address: address.to_string(),
                source,
            };
            log.error(ForwardEvent::ListenFailed, err.to_string());
            err
        })?;

        let bound = listener.local_addr().unwrap_or(address);
        log.info(ForwardEvent::Listening {
            address: bound.to_string(),
        });
        Ok(listener)
    }

    /// Open exactly `count` channels to the remote destination, announcing
    /// `origin` as the originator. On any failure the channels opened so far
    /// are freed before the error is returned.
    pub async fn open_channels<T: SshTransport>(
        transport: &mut T,
        forwarding: &LocalForwarding,
        origin: SocketAddr,
        count: usize,
        log: &EventLog,
    ) -> Result<Vec<ChannelId>> {
        let origin_host = origin.ip().to_string();
        let mut opened = Vec::with_capacity(count);

        for index in 0..count {
            let result = transport
                .open_direct_tcpip(
                    &forwarding.remote_host,
                    forwarding.remote_port,
                    &origin_host,
                    origin.port(),
                )
                .await;

            match result {
                Ok(channel) => {
                    log.debug(ForwardEvent::ChannelOpened { index });
                    opened.push(channel);
                }
                Err(source) => {
                    log.error(ForwardEvent::ChannelOpenFailed { index }, source.to_string());
                    for channel in opened.drain(..) {
                        transport.free_channel(channel).await;
                    }
                    return Err(ForwardError::ChannelOpen { index, source });
                }
            }
        }

        Ok(opened)
    }
}

fn listen(address: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if address.is_ipv6() {
        TcpSocket::new_v6()?
    } else {
        TcpSocket::new_v4()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(address)?;
    socket.listen(backlog.max(1))
}
