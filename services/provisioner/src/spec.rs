//! Turning a cluster config into a flat list of node specs.
//!
//! The pipeline is: expand replicas, stable-sort by role, then assign names.
//! Naming happens last so that name suffixes follow the final provisioning
//! order rather than the declaration order.

use std::collections::{HashMap, HashSet};

use kindling_config::{ClusterConfig, ConfigError, Mount, NodeConfig, Role};

use crate::role_order::{sort_by_role, RoleOrder};

/// A fully resolved description of one node to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Unique node name within the provisioning run.
    pub name: String,
    /// Role that selects the create operation.
    pub role: Role,
    /// Node image reference.
    pub image: String,
    /// Extra host mounts, copied from the config entry.
    pub extra_mounts: Vec<Mount>,
}

/// Flatten replica-counted entries into one entry per node.
///
/// Each entry with replica count `r` yields `r` independent copies, in
/// declaration order, with `replicas` cleared.
pub fn expand_replicas(nodes: &[NodeConfig]) -> Result<Vec<NodeConfig>, ConfigError> {
    let mut out = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        let replicas = node.replica_count();
        if replicas < 0 {
            return Err(ConfigError::InvalidReplicas {
                index,
                role: node.role.to_string(),
                replicas,
            });
        }
        for _ in 0..replicas {
            let mut copy = node.clone();
            copy.replicas = None;
            out.push(copy);
        }
    }
    Ok(out)
}

/// Assigns node names of the form `<cluster>-<role>` and
/// `<cluster>-<role><n>` with `n` starting at 2.
///
/// Create one namer per provisioning run. Names never repeat within a namer:
/// if a generated name was already handed out (an unknown role such as
/// `worker2` can collide with the second `worker`), the role's counter
/// advances until the name is free.
#[derive(Debug)]
pub struct NodeNamer {
    cluster_name: String,
    counts: HashMap<Role, usize>,
    issued: HashSet<String>,
}

impl NodeNamer {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            counts: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    /// Name the next node of `role`.
    pub fn name(&mut self, role: &Role) -> String {
        let count = self.counts.entry(role.clone()).or_insert(0);
        loop {
            *count += 1;
            let name = if *count == 1 {
                format!("{}-{}", self.cluster_name, role)
            } else {
                format!("{}-{}{}", self.cluster_name, role, count)
            };
            if self.issued.insert(name.clone()) {
                return name;
            }
        }
    }
}

/// Build the ordered, named list of node specs for a cluster.
pub fn build_node_specs(
    config: &ClusterConfig,
    cluster_name: &str,
    order: &RoleOrder,
) -> Result<Vec<NodeSpec>, ConfigError> {
    let mut specs: Vec<NodeSpec> = expand_replicas(&config.nodes)?
        .into_iter()
        .map(|node| NodeSpec {
            name: String::new(),
            role: node.role,
            image: node.image,
            extra_mounts: node.extra_mounts,
        })
        .collect();
    sort_by_role(&mut specs, order);

    let mut namer = NodeNamer::new(cluster_name);
    for spec in &mut specs {
        spec.name = namer.name(&spec.role);
    }
    Ok(specs)
}
