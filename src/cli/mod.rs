pub mod commands;

pub use commands::Cli;

use anyhow::{bail, Context};
use console::style;
use ssh_port_forwarder::models::{ForwardRequest, ForwarderSettings, HostKeyFingerprints};
use ssh_port_forwarder::services::config_service::ConfigService;
use ssh_port_forwarder::services::key_service::{KeyService, KeyType};
use ssh_port_forwarder::services::russh_transport::RusshBackend;
use ssh_port_forwarder::utils::ssh_command_parser::{ParsedCommand, SshCommandParser};
use ssh_port_forwarder::{ForwardError, ForwardObserver, PortForwarder, ResultCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Observer for an interactive terminal
pub struct TerminalObserver {
    accept_host_key: bool,
}

impl ForwardObserver for TerminalObserver {
    fn verify_host_key(&self, fingerprints: &HostKeyFingerprints) -> bool {
        println!("{}", style("Server host key").bold());
        println!("  SHA1:   {}", fingerprints.sha1);
        println!("  SHA256: {}", fingerprints.sha256);
        println!("  {}", style(&fingerprints.openssh_sha256).dim());

        if self.accept_host_key {
            return true;
        }

        dialoguer::Confirm::new()
            .with_prompt("Trust this host key?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    fn forwarding_ready(&self) {
        println!("{}", style("Forwarding ready, press Ctrl-C to stop").green());
    }

    fn forwarding_failed(&self, error: &ForwardError) {
        eprintln!("{} {}", style("Error:").red().bold(), error.user_message());
    }
}

/// Turn the command line into a request plus the key path to read
fn parse_target(cli: &Cli) -> anyhow::Result<ParsedCommand> {
    if let Some(command) = &cli.command {
        return Ok(SshCommandParser::parse_command(command)?);
    }

    let Some(spec) = &cli.local else {
        bail!("-L [bind_address:]port:host:hostport is required");
    };
    let Some(destination) = &cli.destination else {
        bail!("a user@host destination is required");
    };

    let port = cli.port.to_string();
    let mut args = vec!["-L", spec.as_str(), "-p", port.as_str(), destination.as_str()];
    let identity = cli.identity.as_ref().map(|p| p.display().to_string());
    if let Some(identity) = &identity {
        args.extend(["-i", identity.as_str()]);
    }
    Ok(SshCommandParser::parse_args(&args)?)
}

fn build_request(cli: &Cli, parsed: ParsedCommand) -> anyhow::Result<ForwardRequest> {
    let identity_file = parsed.identity_file.clone();
    let mut request = parsed.into_request();

    if let Some(path) = identity_file {
        let key = std::fs::read_to_string(&path)
            .with_context(|| format!("reading private key {}", path.display()))?;
        let passphrase = match &cli.passphrase_env {
            Some(var) => std::env::var(var).with_context(|| format!("reading ${}", var))?,
            None => String::new(),
        };
        request = request.with_private_key(key, passphrase);
    }

    let password = match &cli.password_env {
        Some(var) => Some(std::env::var(var).with_context(|| format!("reading ${}", var))?),
        None if !request.credentials.has_private_key() => Some(
            dialoguer::Password::new()
                .with_prompt(format!("Password for {}", request.display_name()))
                .allow_empty_password(true)
                .interact()?,
        ),
        None => None,
    };
    if let Some(password) = password {
        request = request.with_password(password);
    }

    Ok(request)
}

fn load_settings(cli: &Cli) -> anyhow::Result<ForwarderSettings> {
    let service = match &cli.config_dir {
        Some(dir) => ConfigService::with_dir(dir.clone())?,
        None => ConfigService::new()?,
    };
    let mut settings = service.load_settings()?;

    if let Some(count) = cli.channels {
        settings = settings.with_channel_count(count);
    }
    if let Some(secs) = cli.accept_timeout {
        settings = settings.with_accept_timeout(Duration::from_secs(secs));
    }
    settings.validate()?;
    Ok(settings)
}

async fn generate_key(cli: &Cli, path: &Path) -> anyhow::Result<ResultCode> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("{} is not a key file path", path.display());
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let passphrase = match &cli.passphrase_env {
        Some(var) => Some(std::env::var(var).with_context(|| format!("reading ${}", var))?),
        None => None,
    };
    let key_type = if cli.ed25519 { KeyType::Ed25519 } else { KeyType::default() };

    let info = KeyService::new(dir)?
        .generate_key(name, key_type, passphrase.as_deref())
        .await?;

    println!("{} {}", style("Generated").green(), info.key_type);
    println!("  Private key: {}", info.path.display());
    println!("  Public key:  {}", info.public_key_path.display());
    println!("  {}", style(&info.fingerprint).dim());
    Ok(ResultCode::Success)
}

/// Run one forwarding from the command line; returns the result code
pub async fn run(cli: Cli) -> anyhow::Result<ResultCode> {
    if let Some(path) = &cli.generate_key {
        return generate_key(&cli, path).await;
    }

    let parsed = parse_target(&cli)?;
    let settings = load_settings(&cli)?;
    let request = build_request(&cli, parsed)?;

    println!(
        "{} {} via {}",
        style("Forwarding").cyan(),
        request.forwarding,
        request.display_name()
    );

    let observer = Arc::new(TerminalObserver {
        accept_host_key: cli.accept_host_key,
    });
    let forwarder = PortForwarder::new(RusshBackend, request, settings, observer);

    let cancel = forwarder.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            cancel.cancel();
        }
    });

    let report = forwarder.run_with_report().await;
    for outcome in &report.outcomes {
        if let Some(peer) = outcome.peer {
            tracing::debug!(
                "Worker {} served {}: {} sent, {} received ({})",
                outcome.index,
                peer,
                outcome.bytes_sent,
                outcome.bytes_received,
                outcome.reason
            );
        }
    }

    Ok(report.code)
}
