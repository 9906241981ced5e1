//! Node roles.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire value for the external load balancer role.
pub const EXTERNAL_LOAD_BALANCER_ROLE: &str = "external-load-balancer";

/// Wire value for the external etcd role.
pub const EXTERNAL_ETCD_ROLE: &str = "external-etcd";

/// Wire value for the control-plane role.
pub const CONTROL_PLANE_ROLE: &str = "control-plane";

/// Wire value for the worker role.
pub const WORKER_ROLE: &str = "worker";

/// The functional kind of a cluster node.
///
/// The four known roles form a closed set. Any other string is carried
/// verbatim in [`Role::Unknown`] so that parsing never fails; callers decide
/// how to treat it (the provisioner rejects it at dispatch time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    ExternalLoadBalancer,
    ExternalEtcd,
    ControlPlane,
    Worker,
    Unknown(String),
}

impl Role {
    /// The known roles, in their default provisioning order.
    pub const KNOWN: [Role; 4] = [
        Role::ExternalLoadBalancer,
        Role::ExternalEtcd,
        Role::ControlPlane,
        Role::Worker,
    ];

    /// Returns the wire representation of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Role::ExternalLoadBalancer => EXTERNAL_LOAD_BALANCER_ROLE,
            Role::ExternalEtcd => EXTERNAL_ETCD_ROLE,
            Role::ControlPlane => CONTROL_PLANE_ROLE,
            Role::Worker => WORKER_ROLE,
            Role::Unknown(other) => other,
        }
    }

    /// Returns true if this is one of the four recognised roles.
    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown(_))
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            EXTERNAL_LOAD_BALANCER_ROLE => Role::ExternalLoadBalancer,
            EXTERNAL_ETCD_ROLE => Role::ExternalEtcd,
            CONTROL_PLANE_ROLE => Role::ControlPlane,
            WORKER_ROLE => Role::Worker,
            other => Role::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match Role::from(value.as_str()) {
            Role::Unknown(_) => Role::Unknown(value),
            known => known,
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::from(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
