//! Capability registry for privileged entry points.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Capabilities checked at the start of every mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Grants and revokes roles, rescues stray assets, replaces the router
    Admin,
    /// Backend configuration, adapter registration, shortfall recording
    ConfigManager,
    /// Moves capital between backends
    CollateralExchanger,
    /// Sets withdrawal fees
    FeeManager,
    /// The share unit; sole caller of Auto and Solver routing
    PooledVault,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::ConfigManager => "config-manager",
            Role::CollateralExchanger => "collateral-exchanger",
            Role::FeeManager => "fee-manager",
            Role::PooledVault => "pooled-vault",
        };
        f.write_str(name)
    }
}

/// Principal sets keyed by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl AccessControl {
    /// A registry where `admin` holds [`Role::Admin`].
    pub fn with_admin(admin: Address) -> Self {
        let mut access = Self::default();
        access.grant(Role::Admin, admin);
        access
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|members| members.contains(&account))
    }

    /// Fail with `Unauthorized` unless `caller` holds `role`.
    pub fn ensure(&self, role: Role, caller: Address) -> Result<(), AccessError> {
        if self.has_role(role, caller) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized { role, caller })
        }
    }

    /// Admin-only grant.
    pub fn grant_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<(), AccessError> {
        self.ensure(Role::Admin, caller)?;
        if account.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        self.grant(role, account);
        Ok(())
    }

    /// Admin-only revoke.
    pub fn revoke_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<(), AccessError> {
        self.ensure(Role::Admin, caller)?;
        if let Some(members) = self.members.get_mut(&role) {
            members.remove(&account);
        }
        Ok(())
    }

    /// Accounts holding `role`, in address order.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn grant(&mut self, role: Role, account: Address) {
        self.members.entry(role).or_default().insert(account);
    }
}
