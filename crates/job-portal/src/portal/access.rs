use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::EntityKind;

/// Roles recognized by the portal: the tenant roles plus the public customer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    HrManager,
    Recruiter,
    JobSeeker,
    Customer,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::HrManager => "hr-manager",
            Role::Recruiter => "recruiter",
            Role::JobSeeker => "job-seeker",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts `hr-manager`, `hr_manager`, and `HR Manager` spellings alike.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '_' => '-',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "hr-manager" => Ok(Role::HrManager),
            "recruiter" => Ok(Role::Recruiter),
            "job-seeker" => Ok(Role::JobSeeker),
            "customer" => Ok(Role::Customer),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const fn label(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
}

impl Actor {
    pub const fn new(role: Role) -> Self {
        Self { role }
    }
}

/// Role/entity/operation permission table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn allows(&self, role: Role, entity: EntityKind, operation: Operation) -> bool {
        use EntityKind as E;
        use Operation as Op;

        match role {
            Role::HrManager => true,
            Role::Recruiter => match operation {
                Op::Read => true,
                Op::Create | Op::Delete => entity == E::Job,
                Op::Update => matches!(
                    entity,
                    E::Job | E::Recruiter | E::Organization | E::Application
                ),
            },
            Role::JobSeeker => match operation {
                Op::Read => true,
                Op::Create => matches!(entity, E::JobSeeker | E::Application),
                Op::Update => matches!(entity, E::User | E::JobSeeker | E::Application),
                Op::Delete => false,
            },
            Role::Customer => match operation {
                Op::Read => matches!(entity, E::Job | E::Organization | E::Application),
                Op::Create => entity == E::Application,
                Op::Update => matches!(entity, E::User | E::JobSeeker),
                Op::Delete => false,
            },
        }
    }

    pub fn authorize(
        &self,
        actor: &Actor,
        entity: EntityKind,
        operation: Operation,
    ) -> Result<(), AccessDenied> {
        if self.allows(actor.role, entity, operation) {
            Ok(())
        } else {
            Err(AccessDenied {
                role: actor.role,
                entity,
                operation,
            })
        }
    }
}

/// Carries the fixed message shown to callers lacking a permission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("You don't have permissions to {} this resource", .operation.label())]
pub struct AccessDenied {
    pub role: Role,
    pub entity: EntityKind,
    pub operation: Operation,
}
