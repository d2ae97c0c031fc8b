use clap::Parser;
use std::path::PathBuf;

/// SSH Port Forwarder - serve one local port through an SSH server
#[derive(Parser, Debug)]
#[command(name = "ssh-port-forwarder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Local forwarding: [bind_address:]port:host:hostport
    #[arg(short = 'L', long = "local", value_name = "SPEC")]
    pub local: Option<String>,

    /// SSH server port
    #[arg(short, long, default_value = "22")]
    pub port: u16,

    /// Private key file for public key authentication
    #[arg(short, long, value_name = "FILE")]
    pub identity: Option<PathBuf>,

    /// Destination as user@host
    #[arg(value_name = "DESTINATION", required_unless_present_any = ["command", "generate_key"])]
    pub destination: Option<String>,

    /// A whole OpenSSH command line, e.g. "ssh -L 8080:web:80 admin@gw"
    #[arg(short, long, conflicts_with_all = ["local", "destination"])]
    pub command: Option<String>,

    /// Write a new ECDSA P-521 key pair to FILE and FILE.pub, then exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["local", "destination", "command"])]
    pub generate_key: Option<PathBuf>,

    /// Generate an Ed25519 key instead
    #[arg(long, requires = "generate_key")]
    pub ed25519: bool,

    /// Read the SSH password from this environment variable
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,

    /// Read the key passphrase from this environment variable
    #[arg(long, value_name = "VAR")]
    pub passphrase_env: Option<String>,

    /// Trust the server host key without asking
    #[arg(long)]
    pub accept_host_key: bool,

    /// Number of direct-tcpip channels (one local connection each)
    #[arg(short = 'n', long)]
    pub channels: Option<usize>,

    /// Stop waiting for connections after this many seconds
    #[arg(long, value_name = "SECS")]
    pub accept_timeout: Option<u64>,

    /// Settings directory (defaults to the platform config dir)
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log level, e.g. "debug"
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}
