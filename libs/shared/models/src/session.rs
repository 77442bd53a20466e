use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Staff of the receiving hospital.
    Hospital,
    /// Staff of an originating establishment (EESS).
    Establishment,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Hospital => write!(f, "hospital"),
            Role::Establishment => write!(f, "establishment"),
        }
    }
}

/// The signed-in user, passed explicitly into every service call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub establishment_id: String,
    pub establishment_name: Option<String>,
    pub role: Role,
}

impl Session {
    pub fn is_hospital(&self) -> bool {
        self.role == Role::Hospital
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role != role {
            return Err(AppError::Forbidden(format!(
                "Operation requires the {} role",
                role
            )));
        }
        Ok(())
    }

    /// Label shown next to the user's name, e.g. `Ana Pérez | C.S. Lima (000001001)`.
    pub fn display_label(&self) -> String {
        match &self.establishment_name {
            Some(est) => format!("{} | {} ({})", self.name, est, self.establishment_id),
            None => format!("{} ({})", self.name, self.establishment_id),
        }
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub establishment_id: String,
    pub establishment_name: Option<String>,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn into_session(self) -> Session {
        Session {
            user_id: self.sub,
            name: self.name,
            email: self.email,
            establishment_id: self.establishment_id,
            establishment_name: self.establishment_name,
            role: self.role,
        }
    }
}
