// Services module
pub mod acceptor;
pub mod bootstrap;
pub mod channel_pool;
pub mod config_service;
pub mod forwarder;
pub mod key_service;
pub mod log_service;
pub mod observer;
pub mod resolver;
pub mod russh_transport;
pub mod shutdown;
pub mod transport;
pub mod transport_actor;
pub mod worker;

pub use forwarder::{forward_blocking, ForwardReport, PortForwarder};
pub use observer::{CallbackObserver, ForwardObserver};
pub use transport::{ChannelId, ReadStatus, SshBackend, SshTransport, WriteStatus};
