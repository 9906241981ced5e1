//! Configuration for provisioning runs.

use std::env::VarError;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use kindling_config::Role;

/// How long a node's container runtime has to become ready.
pub const DOCKER_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between readiness probes.
pub const DOCKER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What to do when preloading images into a node fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageLoadPolicy {
    /// Log the failure and keep the node.
    #[default]
    BestEffort,
    /// Fail the node, and with it the provisioning run.
    Required,
}

impl FromStr for ImageLoadPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best-effort" => Ok(ImageLoadPolicy::BestEffort),
            "required" => Ok(ImageLoadPolicy::Required),
            other => bail!("unknown image load policy: {other} (expected best-effort or required)"),
        }
    }
}

/// Provisioning run configuration.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Role priority used to order and name nodes.
    pub role_order: Vec<Role>,

    /// Handling of image preload failures.
    pub image_load_policy: ImageLoadPolicy,

    /// Deadline for a node's container runtime to report ready.
    pub ready_timeout: Duration,

    /// Interval between readiness probes.
    pub poll_interval: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            role_order: Role::KNOWN.to_vec(),
            image_load_policy: ImageLoadPolicy::default(),
            ready_timeout: DOCKER_READY_TIMEOUT,
            poll_interval: DOCKER_POLL_INTERVAL,
        }
    }
}

impl ProvisionerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env_var(key, std::env::var(key)))
    }

    /// Load configuration from `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("KINDLING_IMAGE_LOAD_POLICY")? {
            config.image_load_policy = raw.parse()?;
        }

        if let Some(raw) = lookup("KINDLING_ROLE_ORDER")? {
            config.role_order = parse_role_order(&raw)?;
        }

        Ok(config)
    }
}

/// Map the result of reading `key` from the environment: unset is `None`,
/// a value that is not valid unicode is an error.
fn env_var(key: &str, value: Result<String, VarError>) -> Result<Option<String>> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => bail!("{key} is not valid unicode: {raw:?}"),
    }
}

/// Parse a comma-separated role list.
pub fn parse_role_order(raw: &str) -> Result<Vec<Role>> {
    let roles: Vec<Role> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Role::from)
        .collect();

    if roles.is_empty() {
        bail!("role order is empty");
    }
    if let Some(unknown) = roles.iter().find(|role| !role.is_known()) {
        bail!("unknown role in role order: {unknown}");
    }
    Ok(roles)
}
