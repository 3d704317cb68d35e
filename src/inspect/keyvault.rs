//! Key Vault inspection: list vaults and secret names, and pull the
//! database admin password into the shared connection settings.

use serde_json::Value;
use tracing::warn;

use crate::config::PostgresConfig;
use crate::error::{AppError, ProviderError};
use crate::output;
use crate::provider::CloudCli;

use super::InspectionContext;

/// Secret names in a vault, without values.
async fn secret_names(cli: &dyn CloudCli, vault: &str) -> Result<Vec<String>, ProviderError> {
    let listing = cli
        .invoke(&["keyvault", "secret", "list", "--vault-name", vault])
        .await?;
    let secrets = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("keyvault secret list", "expected a JSON array")
    })?;

    Ok(secrets
        .iter()
        .filter_map(|s| s.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Inspect vaults in the context's resource group. When the configured
/// password secret exists, its value is stored for the connectivity probe;
/// secret values are never printed.
pub async fn inspect(
    cli: &dyn CloudCli,
    ctx: &mut InspectionContext,
    cfg: &PostgresConfig,
) -> Result<(), AppError> {
    let group = ctx
        .group_name()
        .ok_or_else(|| AppError::Config("key vault inspection needs a resource group".into()))?
        .to_string();

    let listing = cli
        .invoke(&["keyvault", "list", "--resource-group", &group])
        .await?;
    let vaults = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("keyvault list", "expected a JSON array")
    })?;

    if vaults.is_empty() {
        println!("No key vaults in resource group '{group}'.");
        return Ok(());
    }

    for vault in vaults {
        let vault_name = match vault.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => continue,
        };

        let names = secret_names(cli, vault_name).await?;
        let rows: Vec<Vec<String>> = names.iter().map(|n| vec![n.clone()]).collect();
        output::print_table(&format!("Vault '{vault_name}' secrets"), &["NAME"], &rows);

        if ctx.postgres.password.is_none() && names.iter().any(|n| n == &cfg.password_secret) {
            match cli
                .invoke(&[
                    "keyvault",
                    "secret",
                    "show",
                    "--vault-name",
                    vault_name,
                    "--name",
                    &cfg.password_secret,
                ])
                .await
            {
                Ok(secret) => {
                    ctx.postgres.password = secret
                        .get("value")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                Err(e) => warn!(
                    "Could not read secret '{}' from vault '{vault_name}': {e}",
                    cfg.password_secret
                ),
            }
        }
    }

    if ctx.postgres.password.is_none() {
        warn!(
            "Secret '{}' not found in any vault; the connectivity probe will run without a password",
            cfg.password_secret
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeCli;
    use serde_json::json;

    fn ctx() -> InspectionContext {
        let mut ctx = InspectionContext::new(None);
        ctx.resource_group = Some(json!({"name": "domain-staging"}));
        ctx
    }

    fn cfg() -> PostgresConfig {
        PostgresConfig {
            port: 5432,
            default_database: "postgres".into(),
            sslmode: "require".into(),
            password_secret: "postgres-admin-password".into(),
        }
    }

    #[tokio::test]
    async fn test_password_secret_feeds_connection_settings() {
        let cli = FakeCli::new()
            .respond("keyvault list", json!([{"name": "kv-domain-staging"}]))
            .respond(
                "keyvault secret list",
                json!([{"name": "api-key"}, {"name": "postgres-admin-password"}]),
            )
            .respond(
                "keyvault secret show",
                json!({"name": "postgres-admin-password", "value": "s3cret"}),
            );

        let mut ctx = ctx();
        inspect(&cli, &mut ctx, &cfg()).await.unwrap();

        assert_eq!(ctx.postgres.password.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_missing_secret_is_not_an_error() {
        let cli = FakeCli::new()
            .respond("keyvault list", json!([{"name": "kv-domain-staging"}]))
            .respond("keyvault secret list", json!([{"name": "api-key"}]));

        let mut ctx = ctx();
        inspect(&cli, &mut ctx, &cfg()).await.unwrap();

        assert!(ctx.postgres.password.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_secret_is_swallowed() {
        let cli = FakeCli::new()
            .respond("keyvault list", json!([{"name": "kv"}]))
            .respond(
                "keyvault secret list",
                json!([{"name": "postgres-admin-password"}]),
            )
            .fail("keyvault secret show", "ERROR: caller is not authorized");

        let mut ctx = ctx();
        inspect(&cli, &mut ctx, &cfg()).await.unwrap();

        assert!(ctx.postgres.password.is_none());
    }
}
