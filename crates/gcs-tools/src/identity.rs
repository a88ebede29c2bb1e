//! Caller identity as reported by the auth gateway.

use std::fmt;
use std::str::FromStr;

/// The role granted to an authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Regular agent: object operations inside its own namespace.
    Agent,
    /// Administrative agent: may also manage buckets and read IAM policy.
    AgentAdmin,
}

impl Role {
    /// The wire name used by the auth gateway.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::AgentAdmin => "agent-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not one we recognize.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Role::Agent),
            "agent-admin" => Ok(Role::AgentAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// An authenticated caller, valid for a single tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id; also the caller's sandbox prefix.
    pub user_id: String,
    /// Role granted by the gateway.
    pub role: Role,
}

impl Identity {
    /// Create a new identity.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Returns true if this caller holds the administrative role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::AgentAdmin
    }
}
