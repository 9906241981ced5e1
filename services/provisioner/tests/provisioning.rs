//! Integration tests for the provisioning flow.
//!
//! These tests drive the full path from a cluster config to ready nodes:
//! 1. Replicas are expanded, sorted by role, and named
//! 2. One task per node creates it through the provider
//! 3. Each node runs the fixup pipeline
//!
//! Uses SimulatedProvider and paused tokio time, so the 30 second readiness
//! deadline elapses instantly.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use kindling_config::{ClusterConfig, NodeConfig, Role};
use kindling_provisioner::simulated::{SimulatedFailure, SimulatedProvider};
use kindling_provisioner::{
    build_node_specs, provision_nodes, ChannelStatus, CreateRequest, FixupStep, ImageLoadPolicy,
    NodeHandle, NodeProvider, NoopStatus, Orchestrator, ProvisionError, ProvisionerConfig,
    RoleOrder, StatusEvent,
};
use rstest::rstest;
use tokio::sync::mpsc;
use tokio::time::Instant;

const LABEL: &str = "io.k8s.sigs.kind.cluster=kind";

fn workers(count: i32) -> ClusterConfig {
    ClusterConfig::new(vec![
        NodeConfig::new(Role::Worker, "kindest/node:latest").with_replicas(count),
    ])
}

/// Records create calls as they are issued and panics for selected nodes.
/// Everything else is delegated to a [`SimulatedProvider`].
struct RecordingProvider {
    inner: SimulatedProvider,
    requested: Mutex<Vec<String>>,
    panic_on: HashSet<String>,
}

impl RecordingProvider {
    fn new() -> Self {
        Self {
            inner: SimulatedProvider::new(),
            requested: Mutex::new(Vec::new()),
            panic_on: HashSet::new(),
        }
    }

    fn panicking_on(mut self, node: &str) -> Self {
        self.panic_on.insert(node.to_string());
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn record(&self, req: &CreateRequest) {
        self.requested.lock().unwrap().push(req.name.clone());
        if self.panic_on.contains(&req.name) {
            panic!("provider crashed creating {}", req.name);
        }
    }
}

#[async_trait]
impl NodeProvider for RecordingProvider {
    async fn create_load_balancer(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.record(req);
        self.inner.create_load_balancer(req).await
    }

    async fn create_external_etcd(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.record(req);
        self.inner.create_external_etcd(req).await
    }

    async fn create_control_plane(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.record(req);
        self.inner.create_control_plane(req).await
    }

    async fn create_worker(&self, req: &CreateRequest) -> Result<Arc<dyn NodeHandle>> {
        self.record(req);
        self.inner.create_worker(req).await
    }

    fn need_proxy(&self) -> bool {
        false
    }
}

async fn provision(
    provider: Arc<SimulatedProvider>,
    config: &ClusterConfig,
) -> Result<Vec<kindling_provisioner::ProvisionedNode>, ProvisionError> {
    provision_nodes(
        provider,
        &NoopStatus,
        config,
        "kind",
        LABEL,
        &ProvisionerConfig::default(),
    )
    .await
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(5)]
#[case(50)]
#[tokio::test(start_paused = true)]
async fn test_all_nodes_succeed(#[case] count: i32) {
    let provider = Arc::new(SimulatedProvider::new());

    let nodes = provision(provider.clone(), &workers(count)).await.unwrap();

    assert_eq!(nodes.len(), count as usize);
    let names: HashSet<_> = nodes.iter().map(|n| n.name.clone()).collect();
    assert_eq!(names.len(), count as usize);
    assert_eq!(names, provider.created_names());
    assert_eq!(provider.images_loaded(), count as usize);
}

#[tokio::test(start_paused = true)]
async fn test_three_workers_names() {
    let provider = Arc::new(SimulatedProvider::new());

    let nodes = provision(provider, &workers(3)).await.unwrap();

    let names: HashSet<_> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        names,
        HashSet::from(["kind-worker", "kind-worker2", "kind-worker3"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_mixed_cluster() {
    let provider = Arc::new(SimulatedProvider::new().with_proxy(true));
    let config = ClusterConfig::new(vec![
        NodeConfig::new(Role::Worker, "img").with_replicas(2),
        NodeConfig::new(Role::ControlPlane, "img").with_replicas(3),
        NodeConfig::new(Role::ExternalEtcd, "img"),
        NodeConfig::new(Role::ExternalLoadBalancer, "img"),
    ]);

    let nodes = provision(provider.clone(), &config).await.unwrap();

    let got: HashSet<_> = nodes
        .iter()
        .map(|n| (n.name.clone(), n.role.clone()))
        .collect();
    let expected: HashSet<_> = [
        ("kind-external-load-balancer", Role::ExternalLoadBalancer),
        ("kind-external-etcd", Role::ExternalEtcd),
        ("kind-control-plane", Role::ControlPlane),
        ("kind-control-plane2", Role::ControlPlane),
        ("kind-control-plane3", Role::ControlPlane),
        ("kind-worker", Role::Worker),
        ("kind-worker2", Role::Worker),
    ]
    .into_iter()
    .map(|(name, role)| (name.to_string(), role))
    .collect();
    assert_eq!(got, expected);
}

#[tokio::test(start_paused = true)]
async fn test_single_failure_returns_early_without_partial_result() {
    // The failing node fails straight away; everyone else takes a minute.
    let provider = Arc::new(
        SimulatedProvider::new()
            .with_create_delay(Duration::from_secs(60))
            .with_node_delay("kind-worker3", Duration::ZERO)
            .with_failure("kind-worker3", SimulatedFailure::Creation),
    );
    let started = Instant::now();

    let err = provision(provider.clone(), &workers(5)).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(60));
    match err {
        ProvisionError::Creation { node, .. } => assert_eq!(node, "kind-worker3"),
        other => panic!("unexpected error: {other}"),
    }

    // Stragglers keep running to completion instead of blocking on delivery.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(provider.created().len(), 4);
    assert_eq!(provider.images_loaded(), 4);
}

#[rstest]
#[case(FixupStep::FixMounts)]
#[case(FixupStep::SetProxy)]
#[case(FixupStep::SignalStart)]
#[tokio::test(start_paused = true)]
async fn test_fixup_failure_names_node(#[case] step: FixupStep) {
    let provider = Arc::new(
        SimulatedProvider::new()
            .with_proxy(true)
            .with_failure("kind-worker2", SimulatedFailure::Step(step)),
    );

    let err = provision(provider, &workers(3)).await.unwrap_err();

    match err {
        ProvisionError::Fixup {
            node,
            step: failed,
            ..
        } => {
            assert_eq!(node, "kind-worker2");
            assert_eq!(failed, step);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_readiness_timeout() {
    let create_delay = Duration::from_millis(100);
    let provider = Arc::new(
        SimulatedProvider::new()
            .with_create_delay(create_delay)
            .with_failure("kind-worker", SimulatedFailure::NeverReady),
    );
    let started = Instant::now();

    let err = provision(provider, &workers(2)).await.unwrap_err();

    match err {
        ProvisionError::NodeNotReady { node, timeout } => {
            assert_eq!(node, "kind-worker");
            assert_eq!(timeout, Duration::from_secs(30));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(started.elapsed() >= create_delay + Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_role_never_creates() {
    let provider = Arc::new(SimulatedProvider::new());
    let config = ClusterConfig::new(vec![NodeConfig::new(Role::from("edge"), "img")]);

    let err = provision(provider.clone(), &config).await.unwrap_err();

    match err {
        ProvisionError::InvalidRole { node, role } => {
            assert_eq!(node, "kind-edge");
            assert_eq!(role.as_str(), "edge");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(provider.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_image_load_policy() {
    let failing = || {
        Arc::new(
            SimulatedProvider::new()
                .with_failure("kind-worker", SimulatedFailure::Step(FixupStep::LoadImages)),
        )
    };

    let nodes = provision(failing(), &workers(2)).await.unwrap();
    assert_eq!(nodes.len(), 2);

    let settings = ProvisionerConfig {
        image_load_policy: ImageLoadPolicy::Required,
        ..Default::default()
    };
    let err = provision_nodes(failing(), &NoopStatus, &workers(2), "kind", LABEL, &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::ImageLoad { ref node, .. } if node == "kind-worker"));
}

#[tokio::test(start_paused = true)]
async fn test_status_phase_reported() {
    let (tx, mut rx) = mpsc::channel(16);
    let status = ChannelStatus::new(tx);
    let provider = Arc::new(SimulatedProvider::new());

    provision_nodes(
        provider,
        &status,
        &workers(2),
        "kind",
        LABEL,
        &ProvisionerConfig::default(),
    )
    .await
    .unwrap();

    let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        StatusEvent::Started { label, .. } if label == "Preparing nodes 📦📦"
    ));
    assert!(matches!(&events[1], StatusEvent::Ended { success: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_status_phase_failure_reported() {
    let (tx, mut rx) = mpsc::channel(16);
    let status = ChannelStatus::new(tx);
    let provider =
        Arc::new(SimulatedProvider::new().with_failure("kind-worker", SimulatedFailure::Creation));

    provision_nodes(
        provider,
        &status,
        &workers(1),
        "kind",
        LABEL,
        &ProvisionerConfig::default(),
    )
    .await
    .unwrap_err();

    let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert!(matches!(events.last(), Some(StatusEvent::Ended { success: false, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_orchestrator_with_custom_role_order() {
    let provider = Arc::new(SimulatedProvider::new());
    let config = ClusterConfig::new(vec![
        NodeConfig::new(Role::ControlPlane, "img"),
        NodeConfig::new(Role::Worker, "img"),
    ]);
    let order = RoleOrder::new(&[Role::Worker, Role::ControlPlane]);
    let specs = build_node_specs(&config, "dev", &order).unwrap();
    assert_eq!(specs[0].name, "dev-worker");

    let nodes = Orchestrator::new(provider, &ProvisionerConfig::default())
        .create_nodes(specs, "io.k8s.sigs.kind.cluster=dev")
        .await
        .unwrap();
    assert_eq!(nodes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_role_order_setting_drives_creation_order() {
    let config = ClusterConfig::new(vec![
        NodeConfig::new(Role::ControlPlane, "img"),
        NodeConfig::new(Role::Worker, "img").with_replicas(2),
    ]);

    let provider = Arc::new(RecordingProvider::new());
    provision_nodes(
        provider.clone(),
        &NoopStatus,
        &config,
        "dev",
        LABEL,
        &ProvisionerConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        provider.requested(),
        vec!["dev-control-plane", "dev-worker", "dev-worker2"]
    );

    let settings = ProvisionerConfig::from_lookup(|key| {
        Ok((key == "KINDLING_ROLE_ORDER").then(|| "worker,control-plane".to_string()))
    })
    .unwrap();
    let provider = Arc::new(RecordingProvider::new());
    let nodes = provision_nodes(provider.clone(), &NoopStatus, &config, "dev", LABEL, &settings)
        .await
        .unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(
        provider.requested(),
        vec!["dev-worker", "dev-worker2", "dev-control-plane"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_all_tasks_panicking_aborts() {
    let provider = Arc::new(
        RecordingProvider::new()
            .panicking_on("kind-worker")
            .panicking_on("kind-worker2")
            .panicking_on("kind-worker3"),
    );

    let err = provision_nodes(
        provider.clone(),
        &NoopStatus,
        &workers(3),
        "kind",
        LABEL,
        &ProvisionerConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::Aborted {
            expected: 3,
            received: 0
        }
    ));
    assert_eq!(provider.requested().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_one_panicking_task_aborts_after_siblings_finish() {
    let provider = Arc::new(RecordingProvider::new().panicking_on("kind-worker2"));

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        provision_nodes(
            provider.clone(),
            &NoopStatus,
            &workers(3),
            "kind",
            LABEL,
            &ProvisionerConfig::default(),
        ),
    )
    .await
    .expect("collector must not hang when a task panics");

    assert!(matches!(
        result,
        Err(ProvisionError::Aborted {
            expected: 3,
            received: 2
        })
    ));
    assert_eq!(provider.inner.created().len(), 2);
}
