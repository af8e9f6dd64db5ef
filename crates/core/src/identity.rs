//! Actors, roles, and the capability matrix that gates every workflow operation.
//!
//! Authorization is checked inside the operations themselves. Presentation
//! layers may hide controls by role, but that is never the enforcement point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Leader,
    Checker,
    Worker,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Leader, Role::Checker, Role::Worker];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Leader => "leader",
            Self::Checker => "checker",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "leader" => Ok(Self::Leader),
            "checker" => Ok(Self::Checker),
            "worker" => Ok(Self::Worker),
            other => Err(DomainError::Validation(format!(
                "unknown role `{other}` (expected admin|leader|checker|worker)"
            ))),
        }
    }
}

/// Operations that require an explicit role grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreatePayment,
    ReviewPayment,
    ViewPayments,
    CreateJob,
    UpdateJob,
    UpdateJobStatus,
    AssignJob,
    AssignResource,
    ViewJobs,
}

impl Capability {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Self::ReviewPayment => &[Role::Admin],
            Self::CreatePayment => &[Role::Admin, Role::Leader],
            Self::ViewPayments => &[Role::Admin, Role::Leader, Role::Checker],
            Self::CreateJob | Self::UpdateJob | Self::AssignJob | Self::AssignResource => {
                &[Role::Admin, Role::Leader, Role::Checker]
            }
            Self::UpdateJobStatus | Self::ViewJobs => &Role::ALL,
        }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::CreatePayment => "submit payment requests",
            Self::ReviewPayment => "approve or reject payment requests",
            Self::ViewPayments => "view payment requests",
            Self::CreateJob => "create jobs",
            Self::UpdateJob => "edit jobs",
            Self::UpdateJobStatus => "update job status",
            Self::AssignJob => "assign jobs",
            Self::AssignResource => "assign resources",
            Self::ViewJobs => "view jobs",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn can(&self, capability: Capability) -> bool {
        capability.permits(self.role)
    }

    pub fn authorize(&self, capability: Capability) -> Result<(), DomainError> {
        if self.can(capability) {
            return Ok(());
        }

        Err(DomainError::Unauthorized { role: self.role, capability })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: ActorId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_archived: bool,
}

impl Account {
    fn demo(id: &str, name: &str, email: &str, role: Role) -> Self {
        Self {
            id: ActorId(id.to_string()),
            name: name.to_string(),
            email: email.to_string(),
            role,
            is_active: true,
            is_archived: false,
        }
    }

    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.is_archived
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Known accounts. Lookups skip accounts that cannot sign in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl Default for AccountDirectory {
    fn default() -> Self {
        Self::demo()
    }
}

impl AccountDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn demo() -> Self {
        Self::new(vec![
            Account::demo("1", "Admin User", "admin@example.com", Role::Admin),
            Account::demo("2", "Team Leader", "leader@example.com", Role::Leader),
            Account::demo("3", "Quality Checker", "checker@example.com", Role::Checker),
            Account::demo("4", "Field Worker", "worker@example.com", Role::Worker),
        ])
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn find_by_email(&self, email: &str) -> Option<&Account> {
        let email = email.trim();
        self.accounts
            .iter()
            .filter(|account| account.can_sign_in())
            .find(|account| account.email.eq_ignore_ascii_case(email))
    }

    pub fn find_by_id(&self, id: &ActorId) -> Option<&Account> {
        self.accounts
            .iter()
            .filter(|account| account.can_sign_in())
            .find(|account| &account.id == id)
    }

    pub fn find_by_role(&self, role: Role) -> Option<&Account> {
        self.accounts
            .iter()
            .filter(|account| account.can_sign_in())
            .find(|account| account.role == role)
    }
}
