//! Post-creation node fixups.
//!
//! A freshly created node is paused in its entrypoint. Before it is usable:
//!
//! 1. mounts that could not be set at creation time are corrected
//! 2. proxy settings are injected, if the host uses a proxy
//! 3. the init process is signalled to continue booting
//! 4. the inner container runtime is polled until ready (bounded)
//! 5. cached images are preloaded
//!
//! Steps 1-4 are fatal. Step 5 is governed by [`ImageLoadPolicy`].

use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::config::{ImageLoadPolicy, ProvisionerConfig};
use crate::error::{FixupStep, ProvisionError};
use crate::provider::{NodeHandle, NodeProvider};

/// The ordered fixup steps for one node.
#[derive(Debug, Clone)]
pub struct FixupPipeline {
    image_load_policy: ImageLoadPolicy,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl FixupPipeline {
    pub fn new(config: &ProvisionerConfig) -> Self {
        Self {
            image_load_policy: config.image_load_policy,
            ready_timeout: config.ready_timeout,
            poll_interval: config.poll_interval,
        }
    }

    /// Run every step against `node`, stopping at the first fatal failure.
    pub async fn run(
        &self,
        provider: &dyn NodeProvider,
        node: &dyn NodeHandle,
    ) -> Result<(), ProvisionError> {
        let name = node.name();

        debug!(node = %name, step = %FixupStep::FixMounts, "Running fixup step");
        node.fix_mounts()
            .await
            .map_err(|source| fixup_error(name, FixupStep::FixMounts, source))?;

        if provider.need_proxy() {
            debug!(node = %name, step = %FixupStep::SetProxy, "Running fixup step");
            node.set_proxy()
                .await
                .map_err(|source| fixup_error(name, FixupStep::SetProxy, source))?;
        }

        debug!(node = %name, step = %FixupStep::SignalStart, "Running fixup step");
        node.signal_start()
            .await
            .map_err(|source| fixup_error(name, FixupStep::SignalStart, source))?;

        debug!(node = %name, step = %FixupStep::WaitForDocker, "Running fixup step");
        let deadline = Instant::now() + self.ready_timeout;
        if !wait_for_docker(node, deadline, self.poll_interval).await {
            warn!(
                node = %name,
                timeout_secs = self.ready_timeout.as_secs(),
                "Timed out waiting for docker"
            );
            return Err(ProvisionError::NodeNotReady {
                node: name.to_string(),
                timeout: self.ready_timeout,
            });
        }

        debug!(node = %name, step = %FixupStep::LoadImages, "Running fixup step");
        if let Err(source) = node.load_images().await {
            match self.image_load_policy {
                ImageLoadPolicy::BestEffort => {
                    warn!(node = %name, error = %source, "Failed to load images, continuing");
                }
                ImageLoadPolicy::Required => {
                    return Err(ProvisionError::ImageLoad {
                        node: name.to_string(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}

fn fixup_error(node: &str, step: FixupStep, source: anyhow::Error) -> ProvisionError {
    warn!(node = %node, step = %step, error = %source, "Fixup step failed");
    ProvisionError::Fixup {
        node: node.to_string(),
        step,
        source,
    }
}

/// Poll the node's container runtime until it reports ready or `deadline`
/// passes. A probe that hangs is cut off at the deadline.
pub async fn wait_for_docker(
    node: &dyn NodeHandle,
    deadline: Instant,
    interval: Duration,
) -> bool {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }

        match timeout(deadline - now, node.docker_ready()).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(_) => return false,
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
