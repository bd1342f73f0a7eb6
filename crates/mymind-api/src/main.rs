//! MyMind CLI and server entry point.
//!
//! Binary name: `mymind`
//!
//! Parses CLI arguments, initializes tracing, database and services, then
//! dispatches to the command handler or starts the HTTP/WebSocket server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use mymind_core::effects::worker::{DirectoryEffects, EffectWorker, RetryPolicy};
use mymind_infra::config::load_global_config;
use mymind_infra::data_dir::resolve_data_dir;
use mymind_infra::mailer::LogMailer;
use mymind_observe::tracing_setup::default_filter_for;
use mymind_observe::{init_tracing, shutdown_tracing, LogFormat, TracingOptions};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        default_filter: default_filter_for(cli.verbose),
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        otel: cli.otel,
    };
    if let Err(e) = init_tracing(&options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Neither of these needs the database.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "mymind", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Watch {
        server,
        token,
        interval_ms,
    } = &cli.command
    {
        let interval = match interval_ms {
            Some(ms) => Duration::from_millis(*ms),
            None => load_global_config(&resolve_data_dir()).await.chat.poll_interval(),
        };
        return cli::watch::watch(server.clone(), token.clone(), interval).await;
    }

    let (state, effects_rx) = AppState::init().await?;

    match cli.command {
        Commands::User { action } => {
            cli::user::handle_user_command(action, &state, cli.json).await?;
        }

        Commands::Therapists => {
            cli::therapists::list_therapists(&state, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let shutdown = CancellationToken::new();

            let handler = DirectoryEffects::new(
                state.users.clone(),
                LogMailer::new(),
                state.config.plans.clone(),
            );
            let worker = EffectWorker::new(handler, RetryPolicy::from_config(&state.config.effects));
            let worker_handle = tokio::spawn(worker.run(effects_rx, shutdown.clone()));

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, data_dir = %state.data_dir.display(), "server listening");

            println!(
                "  {} MyMind listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            shutdown.cancel();
            if let Err(e) = worker_handle.await {
                tracing::warn!("effect worker task failed: {e}");
            }
            println!("\n  Server stopped.");
        }

        Commands::Completions { .. } | Commands::Watch { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
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
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
