//! kindling provisioner
//!
//! Provisions every node container of a cluster described by a TOML config.
//!
//! Nodes are created by the simulated provider, which exercises the full
//! provisioning flow (ordering, naming, concurrent creation, fixups) without
//! starting real containers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kindling_config::ClusterConfig;
use kindling_provisioner::provider::proxy_from_env;
use kindling_provisioner::simulated::SimulatedProvider;
use kindling_provisioner::{provision_nodes, LogStatus, ProvisionerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Label key attached to every node of a cluster.
const CLUSTER_LABEL_KEY: &str = "io.k8s.sigs.kind.cluster";

#[derive(Debug, Parser)]
#[command(name = "kindling-provisioner", version, about = "Provision cluster node containers")]
struct Cli {
    /// Path to the cluster config (TOML). Defaults to a single control-plane node.
    #[arg(long, env = "KINDLING_CONFIG")]
    config: Option<PathBuf>,

    /// Cluster name, used as the node name prefix.
    #[arg(long, env = "KINDLING_CLUSTER_NAME", default_value = "kind")]
    name: String,

    /// Label to tag every node with. Defaults to `io.k8s.sigs.kind.cluster=<name>`.
    #[arg(long, env = "KINDLING_CLUSTER_LABEL")]
    label: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "KINDLING_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "KINDLING_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cluster = match &cli.config {
        Some(path) => ClusterConfig::from_path(path)
            .with_context(|| format!("loading cluster config {}", path.display()))?,
        None => {
            let mut cluster = ClusterConfig::default();
            cluster.apply_defaults();
            cluster
        }
    };
    let settings = ProvisionerConfig::from_env()?;
    let label = cli
        .label
        .clone()
        .unwrap_or_else(|| format!("{CLUSTER_LABEL_KEY}={}", cli.name));

    info!(
        cluster = %cli.name,
        label = %label,
        entries = cluster.nodes.len(),
        image_load_policy = ?settings.image_load_policy,
        "Configuration loaded"
    );

    let provider = Arc::new(SimulatedProvider::new().with_proxy(proxy_from_env()));
    let mut nodes = provision_nodes(provider, &LogStatus, &cluster, &cli.name, &label, &settings)
        .await
        .context("provisioning nodes")?;

    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    for node in &nodes {
        println!("{}\t{}", node.name, node.role);
    }

    info!(count = nodes.len(), "Provisioning complete");
    Ok(())
}
