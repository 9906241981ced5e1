//! kindling provisioner library.
//!
//! Turns a declarative cluster configuration into a set of running, ready
//! node containers.
//!
//! ## Flow
//!
//! ```text
//! ClusterConfig
//!   -> expand replicas        (spec)
//!   -> stable sort by role    (role_order)
//!   -> assign names           (spec)
//!   -> one task per node      (orchestrator)
//!        create by role       (provider)
//!        fix mounts, proxy, start, wait for docker, load images  (fixup)
//!   -> all nodes, or the first error
//! ```
//!
//! ## Modules
//!
//! - `config`: run settings (role order, image load policy, readiness timing)
//! - `error`: provisioning errors and fixup step names
//! - `role_order`: role priority and the stable node sort
//! - `spec`: replica expansion, node naming, node spec building
//! - `orchestrator`: concurrent fan-out/fan-in of node creation
//! - `fixup`: ordered post-creation steps
//! - `provider`: the node runtime interface
//! - `simulated`: in-memory provider for dry runs and tests
//! - `status`: progress side channel

pub mod config;
pub mod error;
pub mod fixup;
pub mod orchestrator;
pub mod provider;
pub mod role_order;
pub mod simulated;
pub mod spec;
pub mod status;

// Re-export commonly used types
pub use config::{ImageLoadPolicy, ProvisionerConfig};
pub use error::{FixupStep, ProvisionError};
pub use orchestrator::{provision_nodes, Orchestrator, ProvisionedNode};
pub use provider::{CreateRequest, NodeHandle, NodeProvider};
pub use role_order::{sort_by_role, RoleOrder};
pub use spec::{build_node_specs, expand_replicas, NodeNamer, NodeSpec};
pub use status::{ChannelStatus, LogStatus, NoopStatus, Phase, StatusEvent, StatusSink};
