use super::{Credentials, LocalForwarding};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything one forwarding run needs: the SSH server, who to log in as,
/// and the single local → remote mapping to serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRequest {
    /// Identifies the run in logs
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// SSH host name or literal address
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Username
    pub username: String,

    /// Password and/or key material, supplied at run time
    #[serde(skip)]
    pub credentials: Credentials,

    /// Local listener and remote destination
    pub forwarding: LocalForwarding,
}

fn default_ssh_port() -> u16 {
    22
}

impl ForwardRequest {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        forwarding: LocalForwarding,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            port: default_ssh_port(),
            username: username.into(),
            credentials: Credentials::default(),
            forwarding,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = password.into();
        self
    }

    pub fn with_private_key(mut self, key: impl Into<String>, passphrase: impl Into<String>) -> Self {
        self.credentials.private_key = key.into();
        self.credentials.passphrase = passphrase.into();
        self
    }

    /// Get a display string for the connection
    pub fn display_name(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ForwardRequest {
        ForwardRequest::new("example.com", "user", LocalForwarding::new(22222, "10.0.0.5", 3389))
    }

    #[test]
    fn test_request_builder() {
        let req = request().with_port(2222).with_password("pw");
        assert_eq!(req.host, "example.com");
        assert_eq!(req.port, 2222);
        assert_eq!(req.username, "user");
        assert!(req.credentials.has_password());
        assert!(!req.credentials.has_private_key());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(request().display_name(), "user@example.com:22");
    }

    #[test]
    fn test_serialization_skips_credentials() {
        let req = request().with_private_key("PRIVATE", "phrase");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"host\":\"example.com\""));
        assert!(!json.contains("PRIVATE"));
        assert!(!json.contains("phrase"));

        let back: ForwardRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.port, 22);
        assert_eq!(back.forwarding.remote_port, 3389);
        assert!(!back.credentials.has_private_key());
    }
}
