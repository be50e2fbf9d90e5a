use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use lokube_api::{ApiState, create_router};
use lokube_k8s::{PodCacheSet, client_from};

/// Loki-compatible log query API served straight from the Kubernetes API.
#[derive(Parser, Debug)]
#[command(name = "lokube")]
#[command(author, version, about)]
struct Cli {
    /// Kubernetes client configuration file.
    #[arg(short = 'c', long = "k8s-config", value_name = "PATH")]
    k8s_config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short = 'd', long)]
    debug: bool,

    /// Restrict lokube to the given namespace. Can be repeated.
    #[arg(short = 'n', long = "namespace", value_name = "NAMESPACE")]
    namespaces: Vec<String>,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3001")]
    listen: SocketAddr,
}

fn setup_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    info!("lokube server is starting");

    let client = client_from(cli.k8s_config.as_deref())
        .await
        .context("failed to load Kubernetes configuration")?;

    let cancel = CancellationToken::new();
    let cache = Arc::new(PodCacheSet::new(client.clone(), &cli.namespaces));
    cache.spawn(&cancel);

    let state = Arc::new(ApiState { client, cache });
    let router = create_router(state);

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(addr = %cli.listen, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cancel.cancel();
    info!("lokube server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
