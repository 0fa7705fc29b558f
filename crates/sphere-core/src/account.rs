//! # Accounts
//!
//! Users and organizations share one identifier space at the API boundary.
//! [`Account`] is a tagged union with an explicit `kind` discriminant, so
//! callers never guess which shape came back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::CredentialKind;
use crate::error::ValidationError;
use crate::identity::{DocumentId, OrganizationId, UserId, WalletAddress};

const MAX_NAME_LEN: usize = 200;

/// Organization category, as used by the organization directory filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganizationType {
    Business,
    Education,
    Other,
}

impl OrganizationType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "Business",
            Self::Education => "Education",
            Self::Other => "Other",
        }
    }
}

impl std::str::FromStr for OrganizationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Business" => Ok(Self::Business),
            "Education" => Ok(Self::Education),
            "Other" => Ok(Self::Other),
            other => Err(ValidationError::InvalidEnum {
                field: "organization_type",
                value: other.to_string(),
            }),
        }
    }
}

/// An award listed on an organization profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accolade {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// A person holding credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub workplace: Option<String>,
    pub wallet_address: Option<WalletAddress>,
    /// Verified certificates, in verification order.
    #[serde(default)]
    pub certificates: Vec<DocumentId>,
    /// Verified degrees, in verification order.
    #[serde(default)]
    pub degrees: Vec<DocumentId>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Append a verified document to the matching credential list.
    ///
    /// Returns `false` if the document was already listed.
    pub fn append_credential(&mut self, kind: CredentialKind, document: DocumentId) -> bool {
        let list = match kind {
            CredentialKind::Certificate => &mut self.certificates,
            CredentialKind::Degree => &mut self.degrees,
        };
        if list.contains(&document) {
            return false;
        }
        list.push(document);
        true
    }

    /// Whether the document appears in either credential list.
    pub fn holds_credential(&self, document: &DocumentId) -> bool {
        self.certificates.contains(document) || self.degrees.contains(document)
    }
}

/// An issuing organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub id: OrganizationId,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    /// Address that receives fees on acceptance.
    pub wallet_address: WalletAddress,
    pub organization_type: OrganizationType,
    pub established_since: Option<i32>,
    pub num_workers: Option<u32>,
    #[serde(default)]
    pub accolades: Vec<Accolade>,
    pub created_at: DateTime<Utc>,
}

/// Either kind of account, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Account {
    User(UserProfile),
    Organization(OrganizationProfile),
}

impl Account {
    /// The account's identifier, untyped.
    pub fn id(&self) -> Uuid {
        match self {
            Self::User(u) => *u.id.as_uuid(),
            Self::Organization(o) => *o.id.as_uuid(),
        }
    }

    /// Discriminant as a string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Organization(_) => "organization",
        }
    }

    /// Contact email.
    pub fn email(&self) -> &str {
        match self {
            Self::User(u) => &u.email,
            Self::Organization(o) => &o.email,
        }
    }

    /// Wallet address, if the account has one.
    pub fn wallet_address(&self) -> Option<&WalletAddress> {
        match self {
            Self::User(u) => u.wallet_address.as_ref(),
            Self::Organization(o) => Some(&o.wallet_address),
        }
    }

    pub fn as_user(&self) -> Option<&UserProfile> {
        match self {
            Self::User(u) => Some(u),
            Self::Organization(_) => None,
        }
    }

    pub fn as_organization(&self) -> Option<&OrganizationProfile> {
        match self {
            Self::Organization(o) => Some(o),
            Self::User(_) => None,
        }
    }
}

// ── Registration ─────────────────────────────────────────────────────

/// Registration payload for a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// Registration payload for an organization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub wallet_address: String,
    pub organization_type: OrganizationType,
    #[serde(default)]
    pub established_since: Option<i32>,
    #[serde(default)]
    pub num_workers: Option<u32>,
    #[serde(default)]
    pub accolades: Vec<Accolade>,
}

fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name",
            max: MAX_NAME_LEN,
        });
    }
    Ok(name.to_string())
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidEmail(raw.to_string()));
    }
    Ok(email)
}

impl NewUser {
    /// Validate and build the profile.
    pub fn into_profile(self) -> Result<UserProfile, ValidationError> {
        let wallet_address = self
            .wallet_address
            .as_deref()
            .map(WalletAddress::parse)
            .transpose()?;
        Ok(UserProfile {
            id: UserId::new(),
            name: validate_name(&self.name)?,
            email: validate_email(&self.email)?,
            photo_url: self.photo_url,
            workplace: self.workplace.filter(|w| !w.trim().is_empty()),
            wallet_address,
            certificates: Vec::new(),
            degrees: Vec::new(),
            created_at: Utc::now(),
        })
    }
}

impl NewOrganization {
    /// Validate and build the profile.
    pub fn into_profile(self) -> Result<OrganizationProfile, ValidationError> {
        for accolade in &self.accolades {
            if accolade.title.trim().is_empty() {
                return Err(ValidationError::MissingField("accolades[].title"));
            }
        }
        Ok(OrganizationProfile {
            id: OrganizationId::new(),
            name: validate_name(&self.name)?,
            email: validate_email(&self.email)?,
            photo_url: self.photo_url,
            wallet_address: WalletAddress::parse(&self.wallet_address)?,
            organization_type: self.organization_type,
            established_since: self.established_since,
            num_workers: self.num_workers,
            accolades: self.accolades,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_payload() -> serde_json::Value {
        serde_json::json!({
            "name": "Riverside University",
            "email": "registrar@riverside.edu",
            "wallet_address": "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "organization_type": "Education",
            "established_since": 1891,
            "accolades": [{"title": "Top 50", "year": 2023}]
        })
    }

    #[test]
    fn organization_registration_accepts_structured_accolades() {
        let req: NewOrganization = serde_json::from_value(org_payload()).unwrap();
        let org = req.into_profile().unwrap();
        assert_eq!(org.accolades.len(), 1);
        assert_eq!(org.accolades[0].year, Some(2023));
        assert_eq!(
            org.wallet_address.as_str(),
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }

    #[test]
    fn organization_type_outside_enum_fails_deserialization() {
        let mut payload = org_payload();
        payload["organization_type"] = "Government".into();
        assert!(serde_json::from_value::<NewOrganization>(payload).is_err());
    }

    #[test]
    fn account_serializes_with_kind_tag() {
        let req: NewOrganization = serde_json::from_value(org_payload()).unwrap();
        let account = Account::Organization(req.into_profile().unwrap());
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["kind"], "organization");
        assert_eq!(json["organization_type"], "Education");

        let back: Account = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), "organization");
    }

    #[test]
    fn user_registration_validates_email() {
        let bad = NewUser {
            name: "Ada".into(),
            email: "ada-at-example".into(),
            photo_url: None,
            workplace: None,
            wallet_address: None,
        };
        assert!(matches!(
            bad.into_profile(),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn append_credential_is_idempotent_per_kind() {
        let mut user = NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            photo_url: None,
            workplace: Some("  ".into()),
            wallet_address: None,
        }
        .into_profile()
        .unwrap();
        assert!(user.workplace.is_none());

        let doc = DocumentId::new();
        assert!(user.append_credential(CredentialKind::Degree, doc));
        assert!(!user.append_credential(CredentialKind::Degree, doc));
        assert_eq!(user.degrees, vec![doc]);
        assert!(user.certificates.is_empty());
        assert!(user.holds_credential(&doc));
    }
}
