//! Authentication and authorization module
//!
//! Sessions are persisted rows; clients hold a signed JWT naming the session.

mod jwt;
mod password;
pub(crate) mod session;

pub use jwt::{create_token, decode_token, SessionToken};
pub use password::{hash_password, verify_password};
pub use session::{MaybeSession, Session, SessionRecord};

use serde::{Deserialize, Serialize};

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    /// Submits proposals on behalf of organizations
    #[serde(rename = "VENDOR")]
    Vendor,
    /// Posts and evaluates opportunities
    #[serde(rename = "GOV", alias = "GOVERNMENT")]
    Government,
    /// Government user with marketplace-wide rights
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Vendor => "VENDOR",
            UserType::Government => "GOV",
            UserType::Admin => "ADMIN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "VENDOR" => Some(UserType::Vendor),
            "GOV" | "GOVERNMENT" => Some(UserType::Government),
            "ADMIN" => Some(UserType::Admin),
            _ => None,
        }
    }

    /// Admins and government users sit on the buyer side
    pub fn is_public_sector(&self) -> bool {
        matches!(self, UserType::Government | UserType::Admin)
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
