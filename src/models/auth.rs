use serde::{Deserialize, Serialize};
use std::fmt;

/// SSH authentication method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Password,
    PublicKey,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password => write!(f, "password"),
            Self::PublicKey => write!(f, "publickey"),
        }
    }
}

/// Authentication methods the server offers for a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferedMethods {
    pub password: bool,
    pub public_key: bool,
}

impl OfferedMethods {
    pub fn all() -> Self {
        Self {
            password: true,
            public_key: true,
        }
    }

    /// Parse a comma separated `userauth` list such as `publickey,password`
    pub fn from_list(list: &str) -> Self {
        let mut offered = Self::default();
        for name in list.split(',').map(str::trim) {
            match name {
                "password" => offered.password = true,
                "publickey" => offered.public_key = true,
                _ => {}
            }
        }
        offered
    }
}

impl fmt::Display for OfferedMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.public_key, "publickey"),
            (self.password, "password"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        write!(f, "{}", names.join(","))
    }
}

/// Secrets supplied by the embedding app. Never serialized or logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub password: String,
    /// OpenSSH/PEM private key text
    pub private_key: String,
    pub passphrase: String,
}

impl Credentials {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn private_key(key: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            private_key: key.into(),
            passphrase: passphrase.into(),
            ..Self::default()
        }
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    pub fn has_private_key(&self) -> bool {
        !self.private_key.is_empty()
    }

    /// Password first, then public key; a method is only chosen when the
    /// server offers it and the matching secret is non-empty.
    pub fn select_method(&self, offered: OfferedMethods) -> Option<AuthMethod> {
        if offered.password && self.has_password() {
            Some(AuthMethod::Password)
        } else if offered.public_key && self.has_private_key() {
            Some(AuthMethod::PublicKey)
        } else {
            None
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &if self.has_password() { "<set>" } else { "<empty>" })
            .field("private_key", &if self.has_private_key() { "<set>" } else { "<empty>" })
            .finish_non_exhaustive()
    }
}
