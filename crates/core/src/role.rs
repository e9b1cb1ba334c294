//! Audience roles and authenticated principals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AssistantError;

/// The audience an answer is written for.
///
/// The set is closed: every consumer (prompt templates, store scoping)
/// matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Candidate, Role::Recruiter, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(Role::Candidate),
            "recruiter" => Ok(Role::Recruiter),
            "admin" => Ok(Role::Admin),
            other => Err(AssistantError::InvalidInput(format!(
                "invalid role '{other}', expected one of: candidate, recruiter, admin"
            ))),
        }
    }
}

/// An authenticated actor, resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user identifier
    pub id: String,

    /// Role pinned by the credential issuer, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: None }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_roles() {
        assert_eq!("candidate".parse::<Role>().unwrap(), Role::Candidate);
        assert_eq!("recruiter".parse::<Role>().unwrap(), Role::Recruiter);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn unknown_role_is_invalid_input() {
        let err = "guest".parse::<Role>().unwrap_err();
        assert!(matches!(err, AssistantError::InvalidInput(_)));
        assert!(err.to_string().contains("guest"));
    }

    #[test]
    fn role_parsing_is_case_sensitive() {
        assert!("Candidate".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Recruiter).unwrap();
        assert_eq!(json, "\"recruiter\"");
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
