//! Function App inspection: apps in the resource group and their
//! application settings.

use serde_json::Value;

use crate::error::{AppError, ProviderError};
use crate::output;
use crate::provider::CloudCli;

use super::InspectionContext;

/// Setting names whose values are replaced with `***` in the output.
const SENSITIVE_MARKERS: [&str; 4] = ["password", "secret", "key", "connectionstring"];

fn mask_setting(name: &str, value: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    if SENSITIVE_MARKERS.iter().any(|m| lowered.contains(m)) {
        "***".to_string()
    } else {
        value.to_string()
    }
}

/// List Function Apps in the context's resource group and print each app's
/// settings, with credential-looking values masked.
pub async fn inspect(cli: &dyn CloudCli, ctx: &InspectionContext) -> Result<(), AppError> {
    let group = ctx
        .group_name()
        .ok_or_else(|| AppError::Config("function app inspection needs a resource group".into()))?
        .to_string();

    let listing = cli
        .invoke(&["functionapp", "list", "--resource-group", &group])
        .await?;
    let apps = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("functionapp list", "expected a JSON array")
    })?;

    if apps.is_empty() {
        println!("No function apps in resource group '{group}'.");
        return Ok(());
    }

    for app in apps {
        let app_name = match app.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => continue,
        };
        let state = app.get("state").and_then(Value::as_str).unwrap_or("?");
        println!("\nFunction app '{app_name}' ({state})");

        let settings = cli
            .invoke(&[
                "functionapp",
                "config",
                "appsettings",
                "list",
                "--name",
                app_name,
                "--resource-group",
                &group,
            ])
            .await?;
        let settings = settings.as_array().ok_or_else(|| {
            ProviderError::unexpected_shape(
                "functionapp config appsettings list",
                "expected a JSON array",
            )
        })?;

        let rows: Vec<Vec<String>> = settings
            .iter()
            .filter_map(|s| {
                let name = s.get("name").and_then(Value::as_str)?;
                let value = s.get("value").and_then(Value::as_str).unwrap_or("");
                Some(vec![name.to_string(), mask_setting(name, value)])
            })
            .collect();
        output::print_table(&format!("'{app_name}' settings"), &["NAME", "VALUE"], &rows);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_setting_hides_credentials() {
        assert_eq!(mask_setting("DbPassword", "hunter2"), "***");
        assert_eq!(mask_setting("STORAGE_CONNECTIONSTRING", "Def=1"), "***");
        assert_eq!(mask_setting("FUNCTIONS_WORKER_RUNTIME", "dotnet"), "dotnet");
    }
}
