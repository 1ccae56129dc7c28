//! The identity resolved from an access token.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Closed set of account roles known to the upload pipeline.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Member,
    Store,
    Seat,
    Manager,
    System,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl Role {
    /// Upper-case name used both in storage keys and in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Store => "STORE",
            Role::Seat => "SEAT",
            Role::Manager => "MANAGER",
            Role::System => "SYSTEM",
        }
    }

    /// Roles that represent an individually-owned account. Their uploads are
    /// namespaced by caller id; administrative roles share one namespace.
    pub fn is_caller_scoped(&self) -> bool {
        matches!(self, Role::Member | Role::Store | Role::Seat)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MEMBER" => Ok(Role::Member),
            "STORE" => Ok(Role::Store),
            "SEAT" => Ok(Role::Seat),
            "MANAGER" => Ok(Role::Manager),
            "SYSTEM" => Ok(Role::System),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A caller whose token has been resolved by the auth collaborator.
///
/// Immutable for the lifetime of a request. Everything the pipeline derives
/// about ownership (key scope, record owner) is computed from one instance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedCaller {
    pub id: String,
    pub username: String,
    pub role: Role,
    /// Owning store, only meaningful for `Role::Store` callers.
    pub store_id: Option<String>,
}

impl AuthenticatedCaller {
    /// Leading key segment(s): `ROLE/{id}` for caller-scoped roles, `ROLE` otherwise.
    pub fn scope(&self) -> String {
        if self.role.is_caller_scoped() {
            format!("{}/{}", self.role, self.id)
        } else {
            self.role.as_str().to_string()
        }
    }

    /// Owner recorded on metadata: the store for store accounts, the caller otherwise.
    ///
    /// Returns `None` only for a store caller with no store attached.
    pub fn owner_id(&self) -> Option<&str> {
        match self.role {
            Role::Store => self.store_id.as_deref().filter(|s| !s.trim().is_empty()),
            _ => Some(self.id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthenticatedCaller {
        AuthenticatedCaller {
            id: "42".into(),
            username: "alice".into(),
            role,
            store_id: Some("store-7".into()),
        }
    }

    #[test]
    fn caller_scoped_roles_include_the_id() {
        assert_eq!(caller(Role::Member).scope(), "MEMBER/42");
        assert_eq!(caller(Role::Store).scope(), "STORE/42");
        assert_eq!(caller(Role::Seat).scope(), "SEAT/42");
    }

    #[test]
    fn privileged_roles_use_the_role_alone() {
        assert_eq!(caller(Role::Manager).scope(), "MANAGER");
        assert_eq!(caller(Role::System).scope(), "SYSTEM");
    }

    #[test]
    fn store_owner_is_the_store() {
        assert_eq!(caller(Role::Store).owner_id(), Some("store-7"));
        assert_eq!(caller(Role::Member).owner_id(), Some("42"));
        assert_eq!(caller(Role::Manager).owner_id(), Some("42"));
    }

    #[test]
    fn store_without_store_id_has_no_owner() {
        let mut c = caller(Role::Store);
        c.store_id = None;
        assert_eq!(c.owner_id(), None);
        c.store_id = Some("  ".into());
        assert_eq!(c.owner_id(), None);
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("member".parse::<Role>(), Ok(Role::Member));
        assert_eq!(" SEAT ".parse::<Role>(), Ok(Role::Seat));
        assert!("ADMIN".parse::<Role>().is_err());
    }
}
