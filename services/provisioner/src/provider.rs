//! Node provider interface.
//!
//! The provider abstracts the runtime that actually hosts nodes:
//! - Creating a node container for each role
//! - Per-node fixups on the created container
//! - Probing the node's inner container runtime
//!
//! A simulated implementation is provided in [`crate::simulated`].

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use kindling_config::Mount;

/// Environment variables that make nodes need proxy settings.
const PROXY_ENV_VARS: [&str; 4] = ["HTTP_PROXY", "HTTPS_PROXY", "http_proxy", "https_proxy"];

/// Arguments for creating one node.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Node name.
    pub name: String,

    /// Node image reference.
    pub image: String,

    /// Label attached to every node of the cluster.
    pub cluster_label: String,

    /// Extra host mounts.
    pub extra_mounts: Vec<Mount>,
}

/// A created node container.
#[async_trait]
pub trait NodeHandle: Send + Sync {
    /// Node name.
    fn name(&self) -> &str;

    /// Correct mounts that cannot be configured when the container is created.
    async fn fix_mounts(&self) -> Result<()>;

    /// Inject proxy settings into the node.
    async fn set_proxy(&self) -> Result<()>;

    /// Signal the node's init process to continue booting.
    async fn signal_start(&self) -> Result<()>;

    /// Probe once whether the node's inner container runtime is ready.
    async fn docker_ready(&self) -> bool;

    /// Preload cached images into the node's container runtime.
    async fn load_images(&self) -> Result<()>;
}

/// Creates node containers, one operation per role.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    async fn create_load_balancer(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>>;

    async fn create_external_etcd(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>>;

    async fn create_control_plane(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>>;

    async fn create_worker(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>>;

    /// Whether nodes need proxy settings. Evaluated once per node.
    fn need_proxy(&self) -> bool {
        proxy_from_env()
    }
}

/// Returns true if any proxy environment variable is set and non-empty.
pub fn proxy_from_env() -> bool {
    proxy_from_lookup(|key| std::env::var_os(key).map(|value| !value.is_empty()))
}

/// Returns true if `lookup` reports any proxy variable as set and
/// non-empty. `lookup` yields `None` for unset variables and otherwise
/// whether the value is non-empty.
pub fn proxy_from_lookup<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<bool>,
{
    PROXY_ENV_VARS
        .into_iter()
        .any(|key| lookup(key).unwrap_or(false))
}

impl fmt::Debug for dyn NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn proxy_with(vars: &[(&str, &str)]) -> bool {
        proxy_from_lookup(|key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| !value.is_empty())
        })
    }

    #[test]
    fn test_no_proxy_vars() {
        assert!(!proxy_with(&[]));
        assert!(!proxy_with(&[("NO_PROXY", "localhost")]));
    }

    #[rstest]
    #[case("HTTP_PROXY")]
    #[case("HTTPS_PROXY")]
    #[case("http_proxy")]
    #[case("https_proxy")]
    fn test_any_proxy_var_set(#[case] key: &str) {
        assert!(proxy_with(&[(key, "http://proxy.local:3128")]));
    }

    #[test]
    fn test_empty_proxy_vars_ignored() {
        assert!(!proxy_with(&[("HTTP_PROXY", ""), ("https_proxy", "")]));
        assert!(proxy_with(&[("HTTP_PROXY", ""), ("https_proxy", "http://p:1")]));
    }
}
