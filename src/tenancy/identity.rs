use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Claims;

pub type TenantId = Uuid;

/// Caller role within a tenant. Declaration order is the authorization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    #[serde(alias = "staff")]
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "member" => Some(Role::Member),
            "teacher" | "staff" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tenant every query of a request is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: TenantId,
}

impl TenantScope {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }
}

/// Authenticated caller, built from verified JWT claims and immutable for the request
#[derive(Debug, Clone, Serialize)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub roles: BTreeSet<Role>,
    pub tenant_memberships: HashMap<TenantId, Role>,
    pub active_tenant: Option<TenantId>,
}

impl CallerIdentity {
    pub fn role_in(&self, tenant_id: &TenantId) -> Option<Role> {
        self.tenant_memberships.get(tenant_id).copied()
    }
}

impl From<Claims> for CallerIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.into_iter().collect(),
            tenant_memberships: claims.tenants,
            active_tenant: claims.tenant_id,
        }
    }
}
