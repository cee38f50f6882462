use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Clerk,
    Customer,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "CLERK" => Ok(Role::Clerk),
            "CUSTOMER" => Ok(Role::Customer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "ADMIN",
            Role::Clerk => "CLERK",
            Role::Customer => "CUSTOMER",
        };
        f.write_str(s)
    }
}

/// Authenticated caller of a core operation.
///
/// Resolved by the transport layer and passed explicitly; the core never
/// looks up who is calling on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Counter staff: may sell seats and see every order
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Clerk)
    }

    /// Customers only see their own orders
    pub fn can_view_orders_of(&self, customer_id: &str) -> bool {
        self.is_staff() || self.subject == customer_id
    }
}
