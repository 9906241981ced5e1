//! Simulated node provider.
//!
//! Nodes are plain in-memory records; no containers are started. Used for
//! dry runs of the binary and by tests, which can script failures per node.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use kindling_config::Role;
use tracing::{debug, info};

use crate::error::FixupStep;
use crate::provider::{CreateRequest, NodeHandle, NodeProvider};

/// A scripted failure for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    /// The create call fails.
    Creation,
    /// The given fixup step fails.
    Step(FixupStep),
    /// The container runtime never reports ready.
    NeverReady,
}

/// What the provider has done so far.
#[derive(Debug, Default)]
struct Record {
    created: Mutex<Vec<(Role, String)>>,
    images_loaded: AtomicUsize,
    boot_counter: AtomicU64,
}

impl Record {
    /// The creation log. A panic while holding the lock leaves the log
    /// intact, so poisoning is ignored rather than hiding entries.
    fn created(&self) -> MutexGuard<'_, Vec<(Role, String)>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated provider for testing and dry runs.
pub struct SimulatedProvider {
    need_proxy: bool,
    create_delay: Duration,
    node_delays: HashMap<String, Duration>,
    failures: HashMap<String, SimulatedFailure>,
    record: Arc<Record>,
}

impl SimulatedProvider {
    /// Create a provider whose nodes always succeed.
    pub fn new() -> Self {
        Self {
            need_proxy: false,
            create_delay: Duration::from_millis(100),
            node_delays: HashMap::new(),
            failures: HashMap::new(),
            record: Arc::new(Record::default()),
        }
    }

    /// Report that nodes need proxy settings.
    pub fn with_proxy(mut self, need_proxy: bool) -> Self {
        self.need_proxy = need_proxy;
        self
    }

    /// Delay every create call.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Delay the create call for one node, overriding the default delay.
    pub fn with_node_delay(mut self, node: impl Into<String>, delay: Duration) -> Self {
        self.node_delays.insert(node.into(), delay);
        self
    }

    /// Script a failure for one node.
    pub fn with_failure(mut self, node: impl Into<String>, failure: SimulatedFailure) -> Self {
        self.failures.insert(node.into(), failure);
        self
    }

    /// Roles and names of every node created so far, in creation order.
    pub fn created(&self) -> Vec<(Role, String)> {
        self.record.created().clone()
    }

    /// Names of every node created so far.
    pub fn created_names(&self) -> HashSet<String> {
        self.created().into_iter().map(|(_, name)| name).collect()
    }

    /// Number of nodes that got as far as image loading.
    pub fn images_loaded(&self) -> usize {
        self.record.images_loaded.load(Ordering::SeqCst)
    }

    async fn create(&self, role: Role, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        let delay = self
            .node_delays
            .get(&req.name)
            .copied()
            .unwrap_or(self.create_delay);
        tokio::time::sleep(delay).await;

        let failure = self.failures.get(&req.name).copied();
        if failure == Some(SimulatedFailure::Creation) {
            bail!("simulated creation failure");
        }

        let counter = self.record.boot_counter.fetch_add(1, Ordering::SeqCst);
        let boot_id = format!("boot_{:016x}", counter);

        info!(
            node = %req.name,
            role = %role,
            image = %req.image,
            label = %req.cluster_label,
            mounts = req.extra_mounts.len(),
            boot_id = %boot_id,
            "[SIM] Created node"
        );

        self.record.created().push((role, req.name.clone()));

        Ok(Arc::new(SimulatedNode {
            name: req.name.clone(),
            boot_id,
            failure,
            record: Arc::clone(&self.record),
        }))
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeProvider for SimulatedProvider {
    async fn create_load_balancer(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.create(Role::ExternalLoadBalancer, req).await
    }

    async fn create_external_etcd(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.create(Role::ExternalEtcd, req).await
    }

    async fn create_control_plane(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.create(Role::ControlPlane, req).await
    }

    async fn create_worker(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.create(Role::Worker, req).await
    }

    fn need_proxy(&self) -> bool {
        self.need_proxy
    }
}

/// A node created by [`SimulatedProvider`].
struct SimulatedNode {
    name: String,
    boot_id: String,
    failure: Option<SimulatedFailure>,
    record: Arc<Record>,
}

impl SimulatedNode {
    fn step(&self, step: FixupStep) -> Result<()> {
        debug!(node = %self.name, boot_id = %self.boot_id, step = %step, "[SIM] Fixup step");
        if self.failure == Some(SimulatedFailure::Step(step)) {
            bail!("simulated {step} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl NodeHandle for SimulatedNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fix_mounts(&self) -> Result<()> {
        self.step(FixupStep::FixMounts)
    }

    async fn set_proxy(&self) -> Result<()> {
        self.step(FixupStep::SetProxy)
    }

    async fn signal_start(&self) -> Result<()> {
        self.step(FixupStep::SignalStart)
    }

    async fn docker_ready(&self) -> bool {
        self.failure != Some(SimulatedFailure::NeverReady)
            && self.failure != Some(SimulatedFailure::Step(FixupStep::WaitForDocker))
    }

    async fn load_images(&self) -> Result<()> {
        self.step(FixupStep::LoadImages)?;
        self.record.images_loaded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
