//! Role ordering for node provisioning.
//!
//! The order only decides the sequence in which nodes are named and listed.
//! It does not stage creation: all nodes are launched at the same time.

use std::collections::HashMap;

use kindling_config::Role;

use crate::spec::NodeSpec;

/// Rank assigned to roles that do not appear in the order.
const UNKNOWN_ROLE_RANK: usize = 10_000;

/// A total, stable ordering over node roles.
#[derive(Debug, Clone)]
pub struct RoleOrder {
    ranks: HashMap<Role, usize>,
    unknown_rank: usize,
}

impl RoleOrder {
    /// Build an order from a priority list. The first role ranks 0.
    ///
    /// A role listed twice keeps its first position.
    pub fn new(order: &[Role]) -> Self {
        let mut ranks = HashMap::with_capacity(order.len());
        for (rank, role) in order.iter().enumerate() {
            ranks.entry(role.clone()).or_insert(rank);
        }
        Self {
            ranks,
            unknown_rank: UNKNOWN_ROLE_RANK.max(order.len()),
        }
    }

    /// Rank of a role. Roles not in the order sort after every listed role.
    pub fn rank(&self, role: &Role) -> usize {
        self.ranks.get(role).copied().unwrap_or(self.unknown_rank)
    }

    /// Stable sort of node specs by role rank.
    pub fn sort(&self, specs: &mut [NodeSpec]) {
        specs.sort_by_key(|spec| self.rank(&spec.role));
    }
}

impl Default for RoleOrder {
    fn default() -> Self {
        Self::new(&Role::KNOWN)
    }
}

/// Stable-sort `specs` using `order`.
pub fn sort_by_role(specs: &mut [NodeSpec], order: &RoleOrder) {
    order.sort(specs);
}
