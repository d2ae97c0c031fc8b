pub mod auth;
pub mod connection;
pub mod fingerprint;
pub mod forwarding;
pub mod log;
pub mod settings;

// Re-export main types
pub use auth::{AuthMethod, Credentials, OfferedMethods};
pub use connection::ForwardRequest;
pub use fingerprint::HostKeyFingerprints;
pub use forwarding::LocalForwarding;
pub use log::{ForwardEvent, ForwardLog, LogLevel};
pub use settings::ForwarderSettings;
