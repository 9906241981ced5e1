//! Concurrent node provisioning.
//!
//! Every node spec gets its own task that creates the node and runs the
//! fixup pipeline on it. Outcomes are collected until either all nodes are
//! ready or the first error arrives.
//!
//! ## Failure semantics
//!
//! - The first error to arrive is returned and no nodes are returned with it.
//! - Sibling tasks are not cancelled and already created nodes are not torn
//!   down; cleanup belongs to the caller.
//! - The outcome channel holds one slot per task, so tasks that finish after
//!   the collector has returned never block.

use std::sync::Arc;

use kindling_config::{ClusterConfig, Role};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::ProvisionerConfig;
use crate::error::ProvisionError;
use crate::fixup::FixupPipeline;
use crate::provider::{CreateRequest, NodeHandle, NodeProvider};
use crate::role_order::RoleOrder;
use crate::spec::{build_node_specs, NodeSpec};
use crate::status::{Phase, StatusSink};

/// A created and fixed-up node. The caller owns it from here on.
#[derive(Debug, Clone)]
pub struct ProvisionedNode {
    pub name: String,
    pub role: Role,
    pub handle: Arc<dyn NodeHandle>,
}

/// Creates node specs concurrently.
pub struct Orchestrator {
    provider: Arc<dyn NodeProvider>,
    pipeline: FixupPipeline,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn NodeProvider>, config: &ProvisionerConfig) -> Self {
        Self {
            provider,
            pipeline: FixupPipeline::new(config),
        }
    }

    /// Create and fix up every spec, tagging each node with `cluster_label`.
    ///
    /// Returns all nodes in arrival order (not spec order), or the first
    /// error.
    pub async fn create_nodes(
        &self,
        specs: Vec<NodeSpec>,
        cluster_label: &str,
    ) -> Result<Vec<ProvisionedNode>, ProvisionError> {
        let expected = specs.len();
        if expected == 0 {
            return Ok(Vec::new());
        }

        info!(count = expected, "Creating node containers");

        let (tx, mut rx) = mpsc::channel(expected);
        for spec in specs {
            let tx = tx.clone();
            let provider = Arc::clone(&self.provider);
            let pipeline = self.pipeline.clone();
            let cluster_label = cluster_label.to_string();

            tokio::spawn(async move {
                let outcome =
                    provision_node(provider.as_ref(), &pipeline, spec, &cluster_label).await;
                // One slot per task: this only fails once the collector is gone.
                let _ = tx.try_send(outcome);
            });
        }
        drop(tx);

        let mut nodes = Vec::with_capacity(expected);
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(node) => {
                    debug!(
                        node = %node.name,
                        ready = nodes.len() + 1,
                        total = expected,
                        "Node ready"
                    );
                    nodes.push(node);
                    if nodes.len() == expected {
                        info!(count = expected, "All nodes ready");
                        return Ok(nodes);
                    }
                }
                Err(err) => {
                    error!(
                        node = err.node_name().unwrap_or_default(),
                        reason = err.reason_code(),
                        error = %err,
                        "Node provisioning failed"
                    );
                    return Err(err);
                }
            }
        }

        // Every sender is gone without reporting, e.g. a task panicked.
        Err(ProvisionError::Aborted {
            expected,
            received: nodes.len(),
        })
    }
}

/// Create one node and run its fixups.
async fn provision_node(
    provider: &dyn NodeProvider,
    pipeline: &FixupPipeline,
    spec: NodeSpec,
    cluster_label: &str,
) -> Result<ProvisionedNode, ProvisionError> {
    let NodeSpec {
        name,
        role,
        image,
        extra_mounts,
    } = spec;

    let req = CreateRequest {
        name,
        image,
        cluster_label: cluster_label.to_string(),
        extra_mounts,
    };

    debug!(node = %req.name, role = %role, "Creating node");
    let created = match &role {
        Role::ExternalLoadBalancer => provider.create_load_balancer(&req).await,
        Role::ExternalEtcd => provider.create_external_etcd(&req).await,
        Role::ControlPlane => provider.create_control_plane(&req).await,
        Role::Worker => provider.create_worker(&req).await,
        Role::Unknown(_) => {
            return Err(ProvisionError::InvalidRole {
                node: req.name,
                role: role.clone(),
            })
        }
    };

    let handle = created.map_err(|source| ProvisionError::Creation {
        node: req.name.clone(),
        source,
    })?;

    pipeline.run(provider, handle.as_ref()).await?;

    Ok(ProvisionedNode {
        name: req.name,
        role,
        handle,
    })
}

/// Provision every node of a cluster.
///
/// Validates `config`, orders and names the nodes, then creates them all
/// concurrently. Progress is reported to `status`.
pub async fn provision_nodes(
    provider: Arc<dyn NodeProvider>,
    status: &dyn StatusSink,
    config: &ClusterConfig,
    cluster_name: &str,
    cluster_label: &str,
    settings: &ProvisionerConfig,
) -> Result<Vec<ProvisionedNode>, ProvisionError> {
    config.validate()?;

    let order = RoleOrder::new(&settings.role_order);
    let specs = build_node_specs(config, cluster_name, &order)?;

    let phase = Phase::start(status, format!("Preparing nodes {}", "📦".repeat(specs.len())));
    let nodes = Orchestrator::new(provider, settings)
        .create_nodes(specs, cluster_label)
        .await?;
    phase.end(true);

    Ok(nodes)
}
