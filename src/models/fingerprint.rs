use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Host key digests shown to the user before authenticating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyFingerprints {
    /// Uppercase colon separated hex, 20 bytes
    pub sha1: String,
    /// Uppercase colon separated hex, 32 bytes
    pub sha256: String,
    /// OpenSSH style `SHA256:<base64>` of the same digest
    pub openssh_sha256: String,
}

impl HostKeyFingerprints {
    /// Hash the raw SSH wire encoding of the server's host key
    pub fn from_host_key(key_blob: &[u8]) -> Self {
        let sha1 = Sha1::digest(key_blob);
        let sha256 = Sha256::digest(key_blob);

        Self {
            sha1: to_colon_hex(&sha1),
            sha256: to_colon_hex(&sha256),
            openssh_sha256: format!("SHA256:{}", STANDARD_NO_PAD.encode(sha256)),
        }
    }

    /// Text for a confirmation dialog
    pub fn prompt_text(&self) -> String {
        format!("SHA1: {}\n\nSHA256: {}\n", self.sha1, self.sha256)
    }
}

/// `[0xde, 0xad]` → `DE:AD`
pub fn to_colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_hex() {
        assert_eq!(to_colon_hex(&[0x00, 0x0f, 0xab, 0xff]), "00:0F:AB:FF");
        assert_eq!(to_colon_hex(&[]), "");
    }

    #[test]
    fn test_fingerprint_lengths() {
        let fp = HostKeyFingerprints::from_host_key(b"ssh-ed25519 test key blob");
        // 20 bytes → 20 pairs + 19 colons
        assert_eq!(fp.sha1.len(), 59);
        assert_eq!(fp.sha256.len(), 95);
        assert!(fp.sha1.chars().all(|c| c == ':' || c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(fp.openssh_sha256.starts_with("SHA256:"));
    }

    #[test]
    fn test_known_digest() {
        // sha1("abc") = a9993e36...
        let fp = HostKeyFingerprints::from_host_key(b"abc");
        assert!(fp.sha1.starts_with("A9:99:3E:36"));
        // sha256("abc") = ba7816bf...
        assert!(fp.sha256.starts_with("BA:78:16:BF"));
        assert!(fp.prompt_text().contains("SHA1: A9:99"));
    }
}
