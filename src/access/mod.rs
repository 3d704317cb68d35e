//! Role assignment listing and principal name resolution.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::directory::is_guid;
use crate::error::{AppError, ProviderError};
use crate::provider::CloudCli;

/// Identity type referenced by an access-control assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PrincipalType {
    User,
    ServicePrincipal,
    Group,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A role assignment as listed for a scope. Opaque identifiers in
/// `principal_name` and `created_by` are resolved to display names when
/// possible; resolution failure leaves them unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub principal_id: String,
    #[serde(default)]
    pub principal_name: String,
    #[serde(default)]
    pub principal_type: PrincipalType,
    #[serde(default)]
    pub role_definition_name: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_on: String,
}

/// Resolves role assignments for a scope, preserving source order.
pub struct AccessResolver {
    cli: Arc<dyn CloudCli>,
}

impl AccessResolver {
    pub fn new(cli: Arc<dyn CloudCli>) -> Self {
        Self { cli }
    }

    /// Fetch assignments for a scope (`--resource-group <name>` or
    /// `--scope /subscriptions/<id>`) and resolve GUID-shaped principal
    /// references. No deduplication, no sorting beyond the source order.
    pub async fn resolve_role_assignments(
        &self,
        scope_args: &[&str],
    ) -> Result<Vec<RoleAssignment>, AppError> {
        let mut args = vec!["role", "assignment", "list", "--include-inherited"];
        args.extend_from_slice(scope_args);

        let raw = self.cli.invoke(&args).await?;
        let mut assignments: Vec<RoleAssignment> = serde_json::from_value(raw)
            .map_err(|e| ProviderError::unexpected_shape("role assignment list", e))?;

        for assignment in &mut assignments {
            if is_guid(&assignment.principal_name) {
                if let Some(name) = self
                    .resolve_principal(assignment.principal_type, &assignment.principal_name)
                    .await
                {
                    assignment.principal_name = name;
                }
            }

            if is_guid(&assignment.created_by) {
                if let Some(name) = self.resolve_creator(&assignment.created_by).await {
                    assignment.created_by = name;
                }
            }
        }

        Ok(assignments)
    }

    /// Display name for a principal, routed by type. Service principals and
    /// groups never pass through the user lookup.
    async fn resolve_principal(&self, kind: PrincipalType, id: &str) -> Option<String> {
        let args: [&str; 5] = match kind {
            PrincipalType::User => ["ad", "user", "show", "--id", id],
            PrincipalType::ServicePrincipal => ["ad", "sp", "show", "--id", id],
            PrincipalType::Group => ["ad", "group", "show", "--group", id],
            PrincipalType::Unknown => return None,
        };

        match self.cli.invoke(&args).await {
            Ok(value) => value
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!("Could not resolve {kind:?} '{id}', leaving identifier unresolved: {e}");
                None
            }
        }
    }

    /// `createdBy` carries no type information; try the user lookup first,
    /// then fall back to service principal.
    async fn resolve_creator(&self, id: &str) -> Option<String> {
        if let Ok(value) = self.cli.invoke(&["ad", "user", "show", "--id", id]).await {
            if let Some(name) = value.get("displayName").and_then(Value::as_str) {
                return Some(name.to_string());
            }
        }

        match self.cli.invoke(&["ad", "sp", "show", "--id", id]).await {
            Ok(value) => value
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!("Could not resolve creator '{id}': {e}");
                None
            }
        }
    }
}
