//! User accounts

use crate::auth::UserType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    /// Deactivated by the user themselves
    #[serde(rename = "INACTIVE_USER")]
    InactiveByUser,
    /// Deactivated by an administrator
    #[serde(rename = "INACTIVE_ADMIN")]
    InactiveByAdmin,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::InactiveByUser => "INACTIVE_USER",
            UserStatus::InactiveByAdmin => "INACTIVE_ADMIN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(UserStatus::Active),
            "INACTIVE_USER" => Some(UserStatus::InactiveByUser),
            "INACTIVE_ADMIN" => Some(UserStatus::InactiveByAdmin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub user_type: UserType,
    pub status: UserStatus,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_terms_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn has_accepted_terms(&self) -> bool {
        self.accepted_terms_at.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 100, message = "Please enter your name."))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email."))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters."))]
    pub password: String,
    #[validate(length(max = 100, message = "Job title is too long."))]
    pub job_title: Option<String>,
    pub user_type: UserType,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100, message = "Please enter your name."))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email."))]
    pub email: String,
    #[validate(length(max = 100, message = "Job title is too long."))]
    pub job_title: Option<String>,
}

/// `PUT /users/{id}` actions
#[derive(Debug, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "camelCase")]
pub enum UserAction {
    UpdateProfile(UpdateProfile),
    AcceptTerms,
    Reactivate,
    UpdateAdminPermissions(bool),
}
