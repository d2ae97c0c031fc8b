mod cli;

use clap::Parser;
use cli::Cli;
use ssh_port_forwarder::utils::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.log_level {
        Some(level) => logger::init_with_level(level),
        None => logger::init(),
    }

    tracing::info!("SSH Port Forwarder - Starting...");

    let code = cli::run(cli).await?;
    if !code.is_success() {
        std::process::exit(code.as_i32());
    }

    Ok(())
}
