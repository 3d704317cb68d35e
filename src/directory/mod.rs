//! Directory-service user lookups and identifier classification.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::CloudCli;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._%+-]*@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("email pattern")
});

/// How a raw tag entry is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Email,
    Guid,
    Unknown,
}

/// Classify a raw directory identifier. Pure, no lookups.
pub fn classify_entry(entry: &str) -> EntryKind {
    if EMAIL_PATTERN.is_match(entry) {
        EntryKind::Email
    } else if is_guid(entry) {
        EntryKind::Guid
    } else {
        EntryKind::Unknown
    }
}

/// True for the canonical 36-character GUID form.
pub fn is_guid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}

/// Account status derived from a directory profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Inactive,
    Unknown,
    NotFound,
}

/// Directory user profile as returned by `ad user show`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub account_enabled: Option<bool>,
}

impl UserProfile {
    /// `Active` when enabled, or when a principal name is present without
    /// explicit disablement; `Inactive` when explicitly disabled.
    pub fn derived_status(&self) -> UserStatus {
        match self.account_enabled {
            Some(true) => UserStatus::Active,
            Some(false) => UserStatus::Inactive,
            None if self.user_principal_name.is_some() => UserStatus::Active,
            None => UserStatus::Unknown,
        }
    }
}

/// A resolved (or sentinel) user reference attached to an expanded tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUserRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub mail: Option<String>,
    pub status: UserStatus,
}

impl DirectoryUserRef {
    pub fn from_profile(profile: UserProfile) -> Self {
        let status = profile.derived_status();
        Self {
            display_name: profile.display_name,
            id: Some(profile.id),
            mail: profile.mail.or(profile.user_principal_name),
            status,
        }
    }

    /// Sentinel record for an entry that could not be resolved. Carries the
    /// raw entry in `mail` so the output keeps the input's cardinality.
    pub fn placeholder(entry: &str) -> Self {
        Self {
            display_name: None,
            id: None,
            mail: Some(entry.to_string()),
            status: UserStatus::NotFound,
        }
    }
}

/// Outcome of a single user lookup. `Failed` is recoverable; callers decide
/// whether to substitute a sentinel or escalate.
#[derive(Debug)]
pub enum LookupOutcome {
    Found(DirectoryUserRef),
    NotFound,
    Failed(String),
}

/// User-by-identifier lookups against the directory service.
pub struct DirectoryClient {
    cli: Arc<dyn CloudCli>,
}

impl DirectoryClient {
    pub fn new(cli: Arc<dyn CloudCli>) -> Self {
        Self { cli }
    }

    /// Look up a user by object ID, UPN or email. One call per entry, no
    /// batching, no retry.
    pub async fn find_user(&self, identifier: &str) -> LookupOutcome {
        match self
            .cli
            .invoke(&["ad", "user", "show", "--id", identifier])
            .await
        {
            Ok(value) => match serde_json::from_value::<UserProfile>(value) {
                Ok(profile) => LookupOutcome::Found(DirectoryUserRef::from_profile(profile)),
                Err(e) => LookupOutcome::Failed(format!("unexpected profile shape: {e}")),
            },
            Err(e) if e.is_not_found() => LookupOutcome::NotFound,
            Err(e) => LookupOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeCli;
    use serde_json::json;

    #[test]
    fn test_classify_email() {
        assert_eq!(classify_entry("jack@daniels.com"), EntryKind::Email);
        assert_eq!(classify_entry("first.last@corp.example.org"), EntryKind::Email);
    }

    #[test]
    fn test_classify_guid() {
        assert_eq!(
            classify_entry("3e351e3f-5d20-4c74-bb7b-d0b9b5f9c301"),
            EntryKind::Guid
        );
        // Braced and un-hyphenated forms are not the 36-character shape.
        assert_eq!(
            classify_entry("{3e351e3f-5d20-4c74-bb7b-d0b9b5f9c301}"),
            EntryKind::Unknown
        );
        assert_eq!(
            classify_entry("3e351e3f5d204c74bb7bd0b9b5f9c301"),
            EntryKind::Unknown
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_entry("John Smith"), EntryKind::Unknown);
        assert_eq!(classify_entry(""), EntryKind::Unknown);
        assert_eq!(classify_entry("not-an-email@"), EntryKind::Unknown);
    }

    #[test]
    fn test_derived_status() {
        let base = UserProfile {
            id: "1".into(),
            display_name: None,
            mail: None,
            user_principal_name: None,
            account_enabled: None,
        };

        let enabled = UserProfile {
            account_enabled: Some(true),
            ..base.clone()
        };
        assert_eq!(enabled.derived_status(), UserStatus::Active);

        let disabled = UserProfile {
            account_enabled: Some(false),
            user_principal_name: Some("u@corp.com".into()),
            ..base.clone()
        };
        assert_eq!(disabled.derived_status(), UserStatus::Inactive);

        let upn_only = UserProfile {
            user_principal_name: Some("u@corp.com".into()),
            ..base.clone()
        };
        assert_eq!(upn_only.derived_status(), UserStatus::Active);

        assert_eq!(base.derived_status(), UserStatus::Unknown);
    }

    #[tokio::test]
    async fn test_find_user_not_found() {
        let cli = Arc::new(FakeCli::new().fail(
            "ad user show",
            "Resource 'ghost@corp.com' does not exist or one of its queried \
             reference-property objects are not present.",
        ));
        let directory = DirectoryClient::new(cli);

        assert!(matches!(
            directory.find_user("ghost@corp.com").await,
            LookupOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_find_user_unexpected_shape_is_failure() {
        // A profile without an `id` is not a valid directory answer.
        let cli = Arc::new(FakeCli::new().respond("ad user show", json!({"value": []})));
        let directory = DirectoryClient::new(cli);

        assert!(matches!(
            directory.find_user("jack@daniels.com").await,
            LookupOutcome::Failed(_)
        ));
    }
}
