use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in a forwarding run's event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardLog {
    /// Unique log entry ID
    pub id: Uuid,

    /// Forwarding run this entry belongs to
    pub run_id: Uuid,

    pub level: LogLevel,

    pub event: ForwardEvent,

    /// Optional message
    pub message: Option<String>,

    pub timestamp: DateTime<Utc>,

    /// Additional metadata (JSON-serializable)
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// What happened, stage by stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ForwardEvent {
    Resolved { address: String, ipv6: bool },
    ResolveFailed,
    Connected,
    ConnectFailed,
    Handshake,
    HandshakeFailed,
    HostKeyPresented { sha256: String },
    HostKeyRejected,
    AuthMethodsListed { methods: String },
    AuthSucceeded { method: String },
    AuthFailed { method: String },
    NoAuthMethod,
    Listening { address: String },
    ListenFailed,
    ChannelOpened { index: usize },
    ChannelOpenFailed { index: usize },
    WorkersStarted { count: usize },
    ConnectionAccepted { worker: usize, peer: String },
    WorkerClosed { worker: usize, bytes_sent: u64, bytes_received: u64 },
    ShutdownStep { step: String },
    Finished { code: i32 },
}

impl ForwardLog {
    pub fn new(run_id: Uuid, level: LogLevel, event: ForwardEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            level,
            event,
            message: None,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Format for display
    pub fn format(&self) -> String {
        let timestamp = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        let level = match self.level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };

        let msg_part = self
            .message
            .as_ref()
            .map(|m| format!(" - {}", m))
            .unwrap_or_default();

        format!("[{}] {} | {}{}", timestamp, level, self.event.describe(), msg_part)
    }
}

impl ForwardEvent {
    pub fn describe(&self) -> String {
        match self {
            Self::Resolved { address, ipv6 } => {
                format!("Resolved to {} ({})", address, if *ipv6 { "ipv6" } else { "ipv4" })
            }
            Self::ResolveFailed => "Resolution failed".to_string(),
            Self::Connected => "Connected".to_string(),
            Self::ConnectFailed => "Connection failed".to_string(),
            Self::Handshake => "SSH handshake complete".to_string(),
            Self::HandshakeFailed => "SSH handshake failed".to_string(),
            Self::HostKeyPresented { sha256 } => format!("Host key SHA256 {}", sha256),
            Self::HostKeyRejected => "Host key rejected".to_string(),
            Self::AuthMethodsListed { methods } => format!("Authentication methods: {}", methods),
            Self::AuthSucceeded { method } => format!("Authenticated by {}", method),
            Self::AuthFailed { method } => format!("Authentication by {} failed", method),
            Self::NoAuthMethod => "No supported authentication method".to_string(),
            Self::Listening { address } => format!("Listening on {}", address),
            Self::ListenFailed => "Listen failed".to_string(),
            Self::ChannelOpened { index } => format!("Channel {} open", index),
            Self::ChannelOpenFailed { index } => format!("Channel {} failed to open", index),
            Self::WorkersStarted { count } => format!("{} workers started", count),
            Self::ConnectionAccepted { worker, peer } => {
                format!("Worker {} accepted {}", worker, peer)
            }
            Self::WorkerClosed {
                worker,
                bytes_sent,
                bytes_received,
            } => format!(
                "Worker {} closed: sent {}, received {}",
                worker,
                format_bytes(*bytes_sent),
                format_bytes(*bytes_received)
            ),
            Self::ShutdownStep { step } => format!("Shutdown: {}", step),
            Self::Finished { code } => format!("Forwarding finished with {}", code),
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}
