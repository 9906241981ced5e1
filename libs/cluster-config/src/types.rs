//! Cluster configuration types.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::role::Role;

/// Node image used when a cluster config does not declare any nodes.
pub const DEFAULT_NODE_IMAGE: &str = "kindest/node:latest";

/// Mount propagation mode for an extra mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountPropagation {
    /// No propagation (private).
    #[default]
    None,
    /// Mounts created on the host propagate into the container.
    HostToContainer,
    /// Mounts propagate in both directions.
    Bidirectional,
}

/// An additional host path mounted into a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Path inside the node.
    pub container_path: String,

    /// Path on the host.
    pub host_path: String,

    /// Mount read-only.
    #[serde(default)]
    pub read_only: bool,

    /// Apply an SELinux relabel to the host path.
    #[serde(default)]
    pub selinux_relabel: bool,

    /// Propagation mode between host and node.
    #[serde(default)]
    pub propagation: MountPropagation,
}

/// One entry of a cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Role of the node(s) described by this entry.
    pub role: Role,

    /// Node image reference.
    pub image: String,

    /// Extra mounts for every node created from this entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_mounts: Vec<Mount>,

    /// Number of identical nodes to create. Unset means one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl NodeConfig {
    /// Create a single-node entry.
    pub fn new(role: impl Into<Role>, image: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            image: image.into(),
            extra_mounts: Vec::new(),
            replicas: None,
        }
    }

    /// Set the replica count.
    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Add an extra mount.
    pub fn with_mount(mut self, mount: Mount) -> Self {
        self.extra_mounts.push(mount);
        self
    }

    /// The effective replica count (one when unset).
    pub fn replica_count(&self) -> i32 {
        self.replicas.unwrap_or(1)
    }
}

/// A declarative cluster description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Node entries, in declaration order.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl ClusterConfig {
    /// Create a config from a list of node entries.
    pub fn new(nodes: Vec<NodeConfig>) -> Self {
        Self { nodes }
    }

    /// Parse a TOML document.
    ///
    /// A document without any `[[nodes]]` gets the default single
    /// control-plane node.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: ClusterConfig = toml::from_str(raw)?;
        config.apply_defaults();
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Fill in the default node list when none is declared.
    pub fn apply_defaults(&mut self) {
        if self.nodes.is_empty() {
            self.nodes
                .push(NodeConfig::new(Role::ControlPlane, DEFAULT_NODE_IMAGE));
        }
    }

    /// Validate every node entry.
    ///
    /// Unknown roles are accepted here; they are rejected when a node of
    /// that role is dispatched for creation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(replicas) = node.replicas {
                if replicas < 0 {
                    return Err(ConfigError::InvalidReplicas {
                        index,
                        role: node.role.to_string(),
                        replicas,
                    });
                }
            }
            if node.image.trim().is_empty() {
                return Err(ConfigError::MissingImage { index });
            }
        }
        Ok(())
    }
}
