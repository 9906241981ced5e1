//! # kindling-config
//!
//! Declarative cluster configuration for kindling.
//!
//! A cluster is described as an ordered list of node entries. Each entry
//! names a role, the node image to boot, optional extra host mounts, and an
//! optional replica count:
//!
//! ```toml
//! [[nodes]]
//! role = "control-plane"
//! image = "kindest/node:v1.14.2"
//!
//! [[nodes]]
//! role = "worker"
//! image = "kindest/node:v1.14.2"
//! replicas = 3
//! ```
//!
//! Insertion order is meaningful: it is the tie-breaker when nodes are later
//! sorted by role for provisioning.
//!
//! Unrecognised role strings parse as [`Role::Unknown`] instead of failing, so
//! that the decision about what to do with them stays with the provisioner.

mod error;
mod role;
mod types;

pub use error::ConfigError;
pub use role::*;
pub use types::*;
