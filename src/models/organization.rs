//! Vendor organizations and their memberships

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Sprint With Us needs at least this many active members
pub const SWU_MIN_TEAM_MEMBERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    pub contact_email: String,
    pub active: bool,
    pub possess_all_capabilities: bool,
    /// Team With Us service areas the organization can staff
    pub service_areas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_swu_terms_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_twu_terms_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// `active_members` counts active affiliations of any membership type
    pub fn meets_swu_qualification(&self, active_members: usize) -> bool {
        active_members >= SWU_MIN_TEAM_MEMBERS
            && self.accepted_swu_terms_at.is_some()
            && self.possess_all_capabilities
    }

    pub fn meets_twu_qualification(&self) -> bool {
        !self.service_areas.is_empty() && self.accepted_twu_terms_at.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationBody {
    #[validate(length(min = 1, max = 200, message = "Please enter a legal name."))]
    pub legal_name: String,
    #[validate(url(message = "Please enter a valid URL."))]
    pub website_url: Option<String>,
    #[validate(email(message = "Please enter a valid email."))]
    pub contact_email: String,
    #[serde(default)]
    pub possess_all_capabilities: bool,
    #[serde(default)]
    #[validate(length(max = 20, message = "Too many service areas."))]
    pub service_areas: Vec<String>,
    #[serde(default)]
    pub accept_swu_terms: bool,
    #[serde(default)]
    pub accept_twu_terms: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipType {
    Owner,
    Admin,
    Member,
}

impl MembershipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipType::Owner => "OWNER",
            MembershipType::Admin => "ADMIN",
            MembershipType::Member => "MEMBER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "OWNER" => Some(MembershipType::Owner),
            "ADMIN" => Some(MembershipType::Admin),
            "MEMBER" => Some(MembershipType::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Pending,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Pending => "PENDING",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(MembershipStatus::Active),
            "PENDING" => Some(MembershipStatus::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub membership_type: MembershipType,
    pub membership_status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Affiliation {
    pub fn is_active(&self) -> bool {
        self.membership_status == MembershipStatus::Active
    }

    /// Active owner or admin
    pub fn can_manage(&self) -> bool {
        self.is_active()
            && matches!(self.membership_type, MembershipType::Owner | MembershipType::Admin)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAffiliation {
    pub organization_id: Uuid,
    #[validate(email(message = "Please enter a valid email."))]
    pub user_email: String,
    #[serde(default = "default_membership")]
    pub membership_type: MembershipType,
}

fn default_membership() -> MembershipType {
    MembershipType::Member
}

/// `PUT /affiliations/{id}` actions
#[derive(Debug, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "camelCase")]
pub enum AffiliationAction {
    Approve,
    UpdateAdminStatus(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organization() -> Organization {
        let now = Utc::now();
        Organization {
            id: Uuid::new_v4(),
            legal_name: "Acme Digital".into(),
            website_url: None,
            contact_email: "hello@acme.test".into(),
            active: true,
            possess_all_capabilities: true,
            service_areas: vec![],
            accepted_swu_terms_at: Some(now),
            accepted_twu_terms_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_swu_qualification_needs_team() {
        let org = organization();
        assert!(!org.meets_swu_qualification(1));
        assert!(org.meets_swu_qualification(2));

        let mut lacking = organization();
        lacking.possess_all_capabilities = false;
        assert!(!lacking.meets_swu_qualification(5));
    }

    #[test]
    fn test_twu_qualification_needs_terms_and_area() {
        let mut org = organization();
        assert!(!org.meets_twu_qualification());
        org.service_areas.push("FULL_STACK_DEVELOPER".into());
        assert!(!org.meets_twu_qualification());
        org.accepted_twu_terms_at = Some(Utc::now());
        assert!(org.meets_twu_qualification());
    }

    #[test]
    fn test_pending_admin_cannot_manage() {
        let now = Utc::now();
        let mut affiliation = Affiliation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            membership_type: MembershipType::Admin,
            membership_status: MembershipStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        assert!(!affiliation.can_manage());
        affiliation.membership_status = MembershipStatus::Active;
        assert!(affiliation.can_manage());
    }
}
