use std::sync::Arc;

use assist_core::AssistConfig;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use assist_server::router::AppState;
use assist_server::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "assist.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (GEMINI_API_KEY etc.)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match AssistConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let state = match AppState::from_config(config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to start assistant: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        println!(
            "✅ Catalog loaded: {} dealerships, {} services",
            state.catalog.dealership_count(),
            state.catalog.services().len()
        );
        println!("✅ Renderer: {}", state.orchestrator.renderer_name());

        if let Some(backend) = &state.backend {
            match backend.health().await {
                Ok(code) if (200..300).contains(&code) => {
                    println!("✅ Backend reachable at {} (HTTP {})", backend.base_url(), code)
                }
                Ok(code) => {
                    println!("❌ Backend at {} returned HTTP {}", backend.base_url(), code);
                    std::process::exit(1);
                }
                Err(e) => {
                    println!("❌ Backend at {} unreachable: {}", backend.base_url(), e);
                    std::process::exit(1);
                }
            }
        }

        println!("✅ Assistant health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Idle session eviction, only when a TTL is configured
    if state.config.sessions.idle_ttl_minutes.is_some() {
        tokio::spawn(assist_server::subsystems::sweeper::run_session_sweeper(
            state.orchestrator.store().clone(),
            state.orchestrator.gate().clone(),
            state.config.sessions.clone(),
            tx.subscribe(),
        ));
    }

    if state.config.http.enabled {
        let http_state = state.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                assist_server::http::start_http_server(http_state, http_shutdown).await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = state.config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}
