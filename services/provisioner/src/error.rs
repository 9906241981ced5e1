//! Provisioning errors.

use std::fmt;
use std::time::Duration;

use kindling_config::{ConfigError, Role};
use thiserror::Error;

/// A step of the post-creation fixup pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupStep {
    FixMounts,
    SetProxy,
    SignalStart,
    WaitForDocker,
    LoadImages,
}

impl FixupStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixupStep::FixMounts => "fix_mounts",
            FixupStep::SetProxy => "set_proxy",
            FixupStep::SignalStart => "signal_start",
            FixupStep::WaitForDocker => "wait_for_docker",
            FixupStep::LoadImages => "load_images",
        }
    }
}

impl fmt::Display for FixupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a provisioning run.
///
/// Every per-node variant carries the name of the node it happened on.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The cluster configuration is invalid.
    #[error("invalid cluster config: {0}")]
    Config(#[from] ConfigError),

    /// The node's role has no creation behaviour.
    #[error("unknown node role: {role} (node {node})")]
    InvalidRole { node: String, role: Role },

    /// The provider failed to create the node.
    #[error("failed to create node {node}: {source:#}")]
    Creation {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// A fatal fixup step failed.
    #[error("failed to {step} for node {node}: {source:#}")]
    Fixup {
        node: String,
        step: FixupStep,
        #[source]
        source: anyhow::Error,
    },

    /// The node's container runtime did not become ready in time.
    #[error("timed out after {timeout:?} waiting for docker to be ready on node {node}")]
    NodeNotReady { node: String, timeout: Duration },

    /// Image preload failed and the image load policy requires it.
    #[error("failed to load images into node {node}: {source:#}")]
    ImageLoad {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    /// Every creation task went away before all outcomes were delivered.
    #[error("provisioning aborted: received {received} of {expected} node outcomes")]
    Aborted { expected: usize, received: usize },
}

impl ProvisionError {
    /// Get the standardized reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ProvisionError::Config(_) => "config_invalid",
            ProvisionError::InvalidRole { .. } => "invalid_role",
            ProvisionError::Creation { .. } => "creation_failed",
            ProvisionError::Fixup { .. } => "fixup_failed",
            ProvisionError::NodeNotReady { .. } => "node_not_ready",
            ProvisionError::ImageLoad { .. } => "image_load_failed",
            ProvisionError::Aborted { .. } => "aborted",
        }
    }

    /// Name of the node this error is attributed to, if any.
    pub fn node_name(&self) -> Option<&str> {
        match self {
            ProvisionError::InvalidRole { node, .. }
            | ProvisionError::Creation { node, .. }
            | ProvisionError::Fixup { node, .. }
            | ProvisionError::NodeNotReady { node, .. }
            | ProvisionError::ImageLoad { node, .. } => Some(node),
            ProvisionError::Config(_) | ProvisionError::Aborted { .. } => None,
        }
    }
}
