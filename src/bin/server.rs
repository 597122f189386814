//! Parlor REST API Server
//!
//! Run with: cargo run --bin parlor-server -- --db-path ./data/parlor.mdb

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parlor::api::router;
use parlor::config::USAGE;
use parlor::{ChatContext, Command, Config};

#[tokio::main]
async fn main() {
    let command = Config::from_env().and_then(|c| c.apply_args(std::env::args().skip(1)));
    let config = match command {
        Ok(Command::Serve(config)) => config,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(config.log_filter.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ctx = match ChatContext::from_config(&config) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!(error = %e, "failed to initialize message store");
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!("parlor-server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let served = axum::serve(listener, router(ctx.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = served {
        error!(error = %e, "server error");
    }

    if let Err(e) = ctx.shutdown() {
        error!(error = %e, "failed to flush message store");
    }
    info!("shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
