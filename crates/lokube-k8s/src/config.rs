//! Kubernetes client configuration discovery.

use std::path::Path;

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::info;

/// Builds a client from an explicit kubeconfig path, or discovers one:
/// the file named by `KUBECONFIG` if it exists, in-cluster configuration
/// otherwise.
pub async fn client_from(path: Option<&Path>) -> Result<Client> {
    let config = match path {
        Some(path) => config_from_path(path).await?,
        None => discover_config().await?,
    };
    Client::try_from(config).context("failed to build Kubernetes client")
}

async fn config_from_path(path: &Path) -> Result<Config> {
    info!(path = %path.display(), "loading kubeconfig");
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to read kubeconfig at {}", path.display()))?;
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("failed to interpret kubeconfig")
}

async fn discover_config() -> Result<Config> {
    if let Some(path) = std::env::var_os("KUBECONFIG") {
        let path = Path::new(&path);
        if path.exists() {
            return config_from_path(path).await;
        }
    }
    info!("no kubeconfig found, using in-cluster configuration");
    Config::incluster().context("failed to load in-cluster configuration")
}
