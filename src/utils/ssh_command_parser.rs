use crate::models::{ForwardRequest, LocalForwarding};
use crate::utils::error::{ForwardError, Result};
use std::path::PathBuf;

/// An OpenSSH command line reduced to what one local forwarding run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub forwarding: LocalForwarding,
    /// `-i` private key path; the caller reads the key material
    pub identity_file: Option<PathBuf>,
}

impl ParsedCommand {
    /// Build a request without credentials
    pub fn into_request(self) -> ForwardRequest {
        ForwardRequest::new(self.host, self.username, self.forwarding).with_port(self.port)
    }
}

/// Parse OpenSSH style arguments into a forwarding run
///
/// Supports commands like:
/// - `ssh -L 13306:10.0.0.5:3306 user@jump.example.com`
/// - `ssh -N -p 2222 -i ~/.ssh/id_ed25519 -L 0.0.0.0:22222:10.0.0.5:3389 admin@gw`
/// - `ssh -L [::1]:8080:[fd00::5]:80 user@host`
pub struct SshCommandParser;

impl SshCommandParser {
    /// Parse a full SSH command string
    pub fn parse_command(command: &str) -> Result<ParsedCommand> {
        let parts: Vec<&str> = command.split_whitespace().collect();

        if parts.is_empty() || parts[0] != "ssh" {
            return Err(ForwardError::ConfigError(
                "Command must start with 'ssh'".to_string(),
            ));
        }

        Self::parse_args(&parts[1..])
    }

    /// Parse SSH command arguments
    pub fn parse_args(args: &[&str]) -> Result<ParsedCommand> {
        let mut forwarding: Option<LocalForwarding> = None;
        let mut username = String::new();
        let mut host = String::new();
        let mut port = 22u16;
        let mut identity_file: Option<PathBuf> = None;

        let mut i = 0;
        while i < args.len() {
            let arg = args[i];

            match arg {
                "-L" => {
                    let value = Self::option_value(args, &mut i, "-L")?;
                    if forwarding.is_some() {
                        return Err(ForwardError::ConfigError(
                            "Only one -L forwarding is supported per run".to_string(),
                        ));
                    }
                    forwarding = Some(Self::parse_local_forward(value)?);
                }
                "-R" | "-D" => {
                    return Err(ForwardError::ConfigError(format!(
                        "{} forwarding is not supported, use -L",
                        arg
                    )));
                }
                "-p" => {
                    let value = Self::option_value(args, &mut i, "-p")?;
                    port = value
                        .parse()
                        .map_err(|_| ForwardError::ConfigError(format!("Invalid port: {}", value)))?;
                }
                "-i" => {
                    let value = Self::option_value(args, &mut i, "-i")?;
                    identity_file = Some(PathBuf::from(value));
                }
                "-l" => {
                    username = Self::option_value(args, &mut i, "-l")?.to_string();
                }
                "-o" => {
                    let value = Self::option_value(args, &mut i, "-o")?;
                    tracing::warn!("Ignoring ssh option: {}", value);
                }
                // Flags that don't change local forwarding
                "-N" | "-f" | "-C" | "-q" | "-T" | "-v" | "-vv" | "-vvv" => {}
                arg if arg.starts_with('-') => {
                    tracing::warn!("Ignoring unknown option: {}", arg);
                }
                arg if arg.contains('@') => {
                    let (user, host_part) = arg.rsplit_once('@').unwrap_or(("", arg));
                    if user.is_empty() || host_part.is_empty() {
                        return Err(ForwardError::ConfigError(format!(
                            "Invalid user@host format: {}",
                            arg
                        )));
                    }
                    username = user.to_string();
                    host = host_part.to_string();
                }
                arg => {
                    if host.is_empty() {
                        host = arg.to_string();
                    }
                }
            }

            i += 1;
        }

        if host.is_empty() {
            return Err(ForwardError::ConfigError("Host is required".to_string()));
        }

        let forwarding = forwarding.ok_or_else(|| {
            ForwardError::ConfigError("A -L [bind:]port:host:hostport forwarding is required".to_string())
        })?;

        // Default username to current user or "root"
        if username.is_empty() {
            username = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "root".to_string());
        }

        Ok(ParsedCommand {
            host,
            port,
            username,
            forwarding,
            identity_file,
        })
    }

    fn option_value<'a>(args: &[&'a str], i: &mut usize, flag: &str) -> Result<&'a str> {
        *i += 1;
        args.get(*i)
            .copied()
            .ok_or_else(|| ForwardError::ConfigError(format!("{} requires an argument", flag)))
    }

    /// Parse `[bind_address:]port:host:hostport`; IPv6 parts go in brackets
    pub fn parse_local_forward(arg: &str) -> Result<LocalForwarding> {
        let parts = split_forward_spec(arg)
            .ok_or_else(|| ForwardError::ConfigError(format!("Invalid local forward format: {}", arg)))?;

        let parse_port = |value: &str, what: &str| -> Result<u16> {
            value
                .parse()
                .map_err(|_| ForwardError::ConfigError(format!("Invalid {} port: {}", what, value)))
        };

        match parts.as_slice() {
            [local_port, remote_host, remote_port] => Ok(LocalForwarding::new(
                parse_port(local_port, "local")?,
                remote_host.clone(),
                parse_port(remote_port, "remote")?,
            )),
            [bind_address, local_port, remote_host, remote_port] => Ok(LocalForwarding::new(
                parse_port(local_port, "local")?,
                remote_host.clone(),
                parse_port(remote_port, "remote")?,
            )
            .with_bind_address(bind_address.clone())),
            _ => Err(ForwardError::ConfigError(format!(
                "Invalid local forward format: {}",
                arg
            ))),
        }
    }

    /// Render a parsed command back into an equivalent SSH command
    pub fn to_command(parsed: &ParsedCommand) -> String {
        let mut cmd = String::from("ssh -N");

        if parsed.port != 22 {
            cmd.push_str(&format!(" -p {}", parsed.port));
        }

        if let Some(path) = &parsed.identity_file {
            cmd.push_str(&format!(" -i {}", path.display()));
        }

        let fwd = &parsed.forwarding;
        cmd.push_str(&format!(
            " -L {}:{}:{}:{}",
            bracket(&fwd.bind_address),
            fwd.local_port,
            bracket(&fwd.remote_host),
            fwd.remote_port
        ));

        cmd.push_str(&format!(" {}@{}", parsed.username, parsed.host));
        cmd
    }
}

/// Split on ':' outside `[...]`, dropping the brackets
fn split_forward_spec(spec: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for c in spec.chars() {
        match c {
            '[' if !in_brackets && current.is_empty() => in_brackets = true,
            ']' if in_brackets => in_brackets = false,
            ':' if !in_brackets => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if in_brackets {
        return None;
    }
    parts.push(current);

    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

fn bracket(host: &str) -> String {
    if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}
