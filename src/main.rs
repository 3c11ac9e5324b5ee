// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! resona binary: configuration, logging, and server startup.

use anyhow::Result;
use clap::Parser;

use resona::{Config, Server};

/// Soulseek search and download backend, powered by a local slskd daemon.
#[derive(Parser, Debug)]
#[command(name = "resona", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Address to bind to. Use 0.0.0.0 to allow network access.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Base URL of the slskd daemon (overrides SLSKD_URL).
    #[arg(long)]
    slskd_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::load();
    if let Some(url) = cli.slskd_url {
        config.slskd_url = url;
    }

    tracing::info!(
        slskd_url = %config.slskd_url,
        data_path = %config.data_path.display(),
        "Starting resona"
    );

    let server = Server::new(&config)
        .with_port(cli.port)
        .with_bind_address(cli.bind);

    // Connect to Soulseek in the background; startup must not block on
    // the daemon being reachable. Requests fail fast with 503 until the
    // session is ready.
    let state = server.state();
    tokio::spawn(async move {
        if let Err(e) = state.session.login().await {
            tracing::error!(error = %format!("{:#}", e), "Soulseek login failed");
        }
    });

    server.start().await
}
