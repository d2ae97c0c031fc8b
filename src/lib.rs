//! Local SSH port forwarding: one listener, one SSH session and a fixed
//! pool of direct-tcpip channels, each serving a single local connection.

pub mod models;
pub mod services;
pub mod utils;

pub use models::{Credentials, ForwardRequest, ForwarderSettings, HostKeyFingerprints, LocalForwarding};
pub use services::{forward_blocking, CallbackObserver, ForwardObserver, PortForwarder};
pub use utils::error::{ForwardError, ResultCode, TransportError};
