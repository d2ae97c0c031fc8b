use crate::services::transport::ChannelId;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Numeric outcome of a forwarding run, as reported to the embedding app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    /// Normal completion, including an accept timeout with nothing forwarded
    Success = 0,
    /// Resolve, connect, socket or handshake failure
    SetupFailed = -1,
    PasswordAuthFailed = -2,
    PublicKeyAuthFailed = -3,
    NoAuthMethod = -4,
    InvalidListenAddress = -5,
    BindFailed = -6,
    /// The worker runtime could not be created (formerly folded into -4)
    RuntimeUnavailable = -7,
    CertificateRejected = -8,
    ChannelOpenFailed = -10,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code.as_i32()
    }
}

/// Failures reported by an SSH backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("Private key error: {0}")]
    Key(String),

    #[error("Channel {0} is not open")]
    UnknownChannel(ChannelId),

    #[error("Channel open refused: {0}")]
    Refused(String),

    #[error("Transport is no longer running")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Unable to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("Failed to open socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH handshake failed: {0}")]
    Handshake(#[source] TransportError),

    #[error("Host key was rejected")]
    CertificateRejected,

    #[error("No supported authentication method available")]
    NoAuthMethodAvailable,

    #[error("Password authentication failed: {0}")]
    AuthPasswordFailed(String),

    #[error("Public key authentication failed: {0}")]
    AuthPublicKeyFailed(String),

    #[error("Invalid local listen address: {0}")]
    InvalidListenAddress(String),

    #[error("Failed to listen on {address}: {source}")]
    ListenSetup {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not open direct-tcpip channel {index}: {source}")]
    ChannelOpen {
        index: usize,
        #[source]
        source: TransportError,
    },

    #[error("Failed to start forwarding runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Invalid SSH key: {0}")]
    InvalidKey(String),

    #[error("Key file already exists: {0}")]
    KeyFileExists(String),

    #[error("Key file not found: {0}")]
    KeyFileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ForwardError>;

impl ForwardError {
    /// Result code the embedding app maps to a user-facing message
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Resolve { .. }
            | Self::Socket(_)
            | Self::Connect { .. }
            | Self::Handshake(_)
            | Self::ConfigError(_)
            | Self::IoError(_)
            | Self::ParseError(_)
            | Self::SerializeError(_)
            | Self::KeyGenerationFailed(_)
            | Self::KeyFileExists(_)
            | Self::KeyFileNotFound(_) => ResultCode::SetupFailed,
            Self::InvalidKey(_) => ResultCode::PublicKeyAuthFailed,
            Self::CertificateRejected => ResultCode::CertificateRejected,
            Self::NoAuthMethodAvailable => ResultCode::NoAuthMethod,
            Self::AuthPasswordFailed(_) => ResultCode::PasswordAuthFailed,
            Self::AuthPublicKeyFailed(_) => ResultCode::PublicKeyAuthFailed,
            Self::InvalidListenAddress(_) => ResultCode::InvalidListenAddress,
            Self::ListenSetup { .. } => ResultCode::BindFailed,
            Self::ChannelOpen { .. } => ResultCode::ChannelOpenFailed,
            Self::Runtime(_) => ResultCode::RuntimeUnavailable,
        }
    }

    /// True when the app should show its "wrong password" prompt
    pub fn is_wrong_password(&self) -> bool {
        matches!(self, Self::AuthPasswordFailed(_) | Self::NoAuthMethodAvailable)
    }

    /// Message key for the embedding app's string table
    pub fn user_message_key(&self) -> &'static str {
        match self {
            _ if self.is_wrong_password() => "SSH_PASSWORD_AUTHENTICATION_FAILED_TITLE",
            Self::AuthPublicKeyFailed(_) => "SSH_KEY_AUTHENTICATION_FAILED_TITLE",
            Self::CertificateRejected => "SSH_CERTIFICATE_REJECTED_TITLE",
            Self::InvalidListenAddress(_) | Self::ListenSetup { .. } => "SSH_LOCAL_PORT_UNAVAILABLE_TITLE",
            _ => "SSH_TUNNEL_SETUP_FAILED_TITLE",
        }
    }

    /// Returns a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolve { host, .. } => format!("Could not find host {}", host),
            Self::Connect { address, .. } => format!("Could not reach SSH server at {}", address),
            Self::CertificateRejected => "The SSH server's host key was not accepted".to_string(),
            Self::AuthPasswordFailed(_) => "Wrong SSH username or password".to_string(),
            Self::AuthPublicKeyFailed(_) => "The SSH server rejected the private key".to_string(),
            Self::ListenSetup { address, .. } => format!("Local address {} is unavailable", address),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes_are_stable() {
        assert_eq!(ResultCode::Success.as_i32(), 0);
        assert_eq!(ResultCode::SetupFailed.as_i32(), -1);
        assert_eq!(ResultCode::PasswordAuthFailed.as_i32(), -2);
        assert_eq!(ResultCode::PublicKeyAuthFailed.as_i32(), -3);
        assert_eq!(ResultCode::NoAuthMethod.as_i32(), -4);
        assert_eq!(ResultCode::InvalidListenAddress.as_i32(), -5);
        assert_eq!(ResultCode::BindFailed.as_i32(), -6);
        assert_eq!(ResultCode::RuntimeUnavailable.as_i32(), -7);
        assert_eq!(ResultCode::CertificateRejected.as_i32(), -8);
        assert_eq!(ResultCode::ChannelOpenFailed.as_i32(), -10);
    }

    #[test]
    fn test_error_codes() {
        let err = ForwardError::AuthPasswordFailed("denied".into());
        assert_eq!(err.code(), ResultCode::PasswordAuthFailed);
        assert!(err.is_wrong_password());

        let err = ForwardError::ChannelOpen {
            index: 3,
            source: TransportError::Refused("administratively prohibited".into()),
        };
        assert_eq!(err.code(), ResultCode::ChannelOpenFailed);
        assert!(!err.is_wrong_password());

        assert_eq!(ForwardError::CertificateRejected.code(), ResultCode::CertificateRejected);
        assert_eq!(
            ForwardError::Runtime(std::io::Error::other("no threads")).code(),
            ResultCode::RuntimeUnavailable
        );
    }

    #[test]
    fn test_user_message_keys() {
        assert_eq!(
            ForwardError::NoAuthMethodAvailable.user_message_key(),
            "SSH_PASSWORD_AUTHENTICATION_FAILED_TITLE"
        );
        assert_eq!(
            ForwardError::CertificateRejected.user_message_key(),
            "SSH_CERTIFICATE_REJECTED_TITLE"
        );
    }
}
