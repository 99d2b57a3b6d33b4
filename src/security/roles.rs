//! Role checks for authoring actions.
//!
//! Role storage lives outside paperflow. The lifecycle only asks one question
//! through [`Permissions`]: does this actor hold at least this role?

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RolesConfig;
use crate::error::{PfError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(PfError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// Permission collaborator consulted before every lifecycle mutation.
pub trait Permissions: Send + Sync {
    fn role_of(&self, actor: &str) -> Role;

    /// Fails with `Authorization` unless `actor` holds `min` or higher.
    fn require_role(&self, actor: &str, min: Role) -> Result<()> {
        let role = self.role_of(actor);
        if role >= min {
            Ok(())
        } else {
            tracing::warn!(actor, %role, required = %min, "permission denied");
            Err(PfError::Authorization(format!(
                "{actor} has role {role}, {min} required"
            )))
        }
    }
}

/// Config-backed role table. Anyone not listed is a plain user.
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    admins: BTreeSet<String>,
    superadmins: BTreeSet<String>,
}

impl RoleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &RolesConfig) -> Self {
        Self {
            admins: config.admins.iter().map(|s| s.trim().to_string()).collect(),
            superadmins: config
                .superadmins
                .iter()
                .map(|s| s.trim().to_string())
                .collect(),
        }
    }

    #[must_use]
    pub fn with_admin(mut self, actor: impl Into<String>) -> Self {
        self.admins.insert(actor.into());
        self
    }

    #[must_use]
    pub fn with_superadmin(mut self, actor: impl Into<String>) -> Self {
        self.superadmins.insert(actor.into());
        self
    }
}

impl Permissions for RoleTable {
    fn role_of(&self, actor: &str) -> Role {
        if self.superadmins.contains(actor) {
            Role::Superadmin
        } else if self.admins.contains(actor) {
            Role::Admin
        } else {
            Role::User
        }
    }
}
