//! flaskr server binary.
//!
//! `serve` (the default) starts the axum HTTP server with structured logging
//! and graceful shutdown on SIGTERM/SIGINT. `init-db` recreates the database
//! tables from the bundled schema script and exits.

use clap::Parser;
use flaskr_server::cli::{Cli, Commands};
use flaskr_server::config::{self, Config};
use flaskr_server::{app, init_db, AppState};
use std::net::SocketAddr;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so command output on stdout stays clean.
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(Some(cli.config.as_path())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    tracing::info!(path = %cli.config.display(), "resolved configuration path");

    let state = AppState::from_config(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::InitDb => match init_db(&state) {
            Ok(()) => {
                println!("Initialized the database.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("failed to initialize database: {}", e);
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::Serve => match serve(&config, state).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("server error: {}", e);
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn serve(config: &Config, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(
        %addr,
        database = %state.db_settings.path.display(),
        "starting flaskr server"
    );

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("flaskr server shut down");
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
