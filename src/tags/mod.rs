//! Steward tag expansion.
//!
//! Replaces configured comma-separated tag values on a resource group with
//! arrays of resolved directory user records. Per-entry failures are
//! swallowed into sentinel records so the output always keeps the input's
//! entry order and count.

use serde_json::Value;
use tracing::warn;

use crate::directory::{classify_entry, DirectoryClient, DirectoryUserRef, EntryKind, LookupOutcome};

/// Expand the named steward tags in place. Returns how many tag keys were
/// expanded. Tags absent from the group are skipped silently.
pub async fn expand_tags(
    directory: &DirectoryClient,
    resource_group: &mut Value,
    tag_keys: &[String],
) -> usize {
    let mut expanded = 0;

    for key in tag_keys {
        let raw = match resource_group
            .get("tags")
            .and_then(|tags| tags.get(key))
            .and_then(Value::as_str)
        {
            Some(raw) => raw.to_string(),
            None => continue,
        };

        let users = expand_entries(directory, &raw).await;
        if let Some(tags) = resource_group.get_mut("tags").and_then(Value::as_object_mut) {
            tags.insert(
                key.clone(),
                serde_json::to_value(&users).unwrap_or(Value::Null),
            );
            expanded += 1;
        }
    }

    expanded
}

/// Resolve one comma-separated tag value into user records, one record per
/// entry. Unrecognized entries never trigger a lookup call.
pub async fn expand_entries(directory: &DirectoryClient, raw: &str) -> Vec<DirectoryUserRef> {
    let mut resolved = Vec::new();

    for entry in raw.split(',').map(str::trim) {
        match classify_entry(entry) {
            EntryKind::Unknown => resolved.push(DirectoryUserRef::placeholder(entry)),
            EntryKind::Email | EntryKind::Guid => match directory.find_user(entry).await {
                LookupOutcome::Found(user) => resolved.push(user),
                LookupOutcome::NotFound => resolved.push(DirectoryUserRef::placeholder(entry)),
                LookupOutcome::Failed(reason) => {
                    warn!("Lookup for '{entry}' failed, recording placeholder: {reason}");
                    resolved.push(DirectoryUserRef::placeholder(entry));
                }
            },
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserStatus;
    use crate::provider::testing::FakeCli;
    use serde_json::json;
    use std::sync::Arc;

    fn directory_with(cli: FakeCli) -> DirectoryClient {
        DirectoryClient::new(Arc::new(cli))
    }

    #[tokio::test]
    async fn test_unrecognized_entries_keep_order_and_count() {
        // No lookups are scripted: unrecognized entries must not reach the
        // directory at all.
        let directory = directory_with(FakeCli::new());

        let users = expand_entries(&directory, "John Smith, Some Team ,x").await;

        assert_eq!(users.len(), 3);
        assert_eq!(users[0].mail.as_deref(), Some("John Smith"));
        assert_eq!(users[1].mail.as_deref(), Some("Some Team"));
        assert_eq!(users[2].mail.as_deref(), Some("x"));
        assert!(users.iter().all(|u| u.status == UserStatus::NotFound));
    }

    #[tokio::test]
    async fn test_expansion_resolves_steward_email() {
        let cli = FakeCli::new().respond(
            "ad user show --id jack@daniels.com",
            json!({
                "id": "3e351e3f-5d20-4c74-bb7b-d0b9b5f9c301",
                "displayName": "Jack Daniels",
                "mail": "jack@daniels.com",
                "userPrincipalName": "jack@daniels.com",
                "accountEnabled": true
            }),
        );
        let directory = directory_with(cli);

        let mut group = json!({
            "name": "domain-staging",
            "tags": {"business_steward": "jack@daniels.com", "costcenter": "42"}
        });

        let expanded =
            expand_tags(&directory, &mut group, &["business_steward".to_string()]).await;

        assert_eq!(expanded, 1);
        let stewards = group["tags"]["business_steward"].as_array().unwrap();
        assert_eq!(stewards.len(), 1);
        assert_eq!(stewards[0]["mail"], "jack@daniels.com");
        assert_eq!(stewards[0]["status"], "Active");
        // Unconfigured tags are left alone.
        assert_eq!(group["tags"]["costcenter"], "42");
    }

    #[tokio::test]
    async fn test_expansion_records_not_found_sentinel() {
        let cli = FakeCli::new().fail(
            "ad user show --id jack@daniels.com",
            "Request_ResourceNotFound: Resource 'jack@daniels.com' does not exist.",
        );
        let directory = directory_with(cli);

        let mut group = json!({
            "name": "domain-staging",
            "tags": {"business_steward": "jack@daniels.com"}
        });

        expand_tags(&directory, &mut group, &["business_steward".to_string()]).await;

        let stewards = group["tags"]["business_steward"].as_array().unwrap();
        assert_eq!(stewards.len(), 1);
        assert_eq!(stewards[0]["mail"], "jack@daniels.com");
        assert_eq!(stewards[0]["status"], "NotFound");
    }

    #[tokio::test]
    async fn test_lookup_failure_is_swallowed_per_entry() {
        // First entry errors out (not a not-found), second resolves; both
        // must appear, in order.
        let cli = FakeCli::new()
            .fail("ad user show --id broken@corp.com", "ERROR: upstream 500")
            .respond(
                "ad user show --id ok@corp.com",
                json!({"id": "u-2", "userPrincipalName": "ok@corp.com"}),
            );
        let directory = directory_with(cli);

        let users = expand_entries(&directory, "broken@corp.com,ok@corp.com").await;

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].status, UserStatus::NotFound);
        assert_eq!(users[1].status, UserStatus::Active);
    }

    #[tokio::test]
    async fn test_missing_tag_key_is_skipped() {
        let directory = directory_with(FakeCli::new());
        let mut group = json!({"name": "rg", "tags": {}});

        let expanded =
            expand_tags(&directory, &mut group, &["business_steward".to_string()]).await;

        assert_eq!(expanded, 0);
    }
}
