//! Networking around the database server: private endpoints, their network
//! interfaces, private DNS zones, and network security groups.

use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, ProviderError};
use crate::output;
use crate::provider::CloudCli;

use super::{InspectionContext, ServerRef};

/// Whether a private endpoint belongs to the given server.
///
/// Matches when any private-link connection targets the server's resource ID
/// (case-insensitive, the provider is inconsistent about casing) or when the
/// endpoint's name carries the server name.
pub fn endpoint_matches_server(endpoint: &Value, server: &ServerRef) -> bool {
    let by_id = endpoint
        .get("privateLinkServiceConnections")
        .and_then(Value::as_array)
        .map(|connections| {
            connections.iter().any(|conn| {
                conn.get("privateLinkServiceId")
                    .and_then(Value::as_str)
                    .is_some_and(|id| id.eq_ignore_ascii_case(&server.id))
            })
        })
        .unwrap_or(false);

    let by_name = endpoint
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| name.to_ascii_lowercase().contains(&server.name.to_ascii_lowercase()));

    by_id || by_name
}

/// Private IP of a network interface. The provider has emitted both
/// `privateIPAddress` and `privateIpAddress` over time, so both are checked.
pub fn nic_private_ip(nic: &Value) -> Option<String> {
    nic.get("ipConfigurations")
        .and_then(Value::as_array)
        .and_then(|configs| configs.first())
        .and_then(|config| {
            config
                .get("privateIPAddress")
                .or_else(|| config.get("privateIpAddress"))
        })
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Print the server's private endpoints, their interfaces' private IPs, the
/// group's private DNS zones, and its network security groups.
pub async fn inspect(
    cli: &dyn CloudCli,
    ctx: &InspectionContext,
    max_depth: usize,
) -> Result<(), AppError> {
    let group = ctx
        .group_name()
        .ok_or_else(|| AppError::Config("network inspection needs a resource group".into()))?
        .to_string();

    inspect_private_endpoints(cli, ctx, &group, max_depth).await?;
    inspect_dns_zones(cli, &group).await?;
    inspect_security_groups(cli, &group).await?;

    Ok(())
}

async fn inspect_private_endpoints(
    cli: &dyn CloudCli,
    ctx: &InspectionContext,
    group: &str,
    max_depth: usize,
) -> Result<(), AppError> {
    let listing = cli
        .invoke(&["network", "private-endpoint", "list", "--resource-group", group])
        .await?;
    let endpoints = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("network private-endpoint list", "expected a JSON array")
    })?;

    let matching: Vec<&Value> = match &ctx.server {
        Some(server) => endpoints
            .iter()
            .filter(|e| endpoint_matches_server(e, server))
            .collect(),
        None => {
            warn!("No database server resolved, listing all private endpoints");
            endpoints.iter().collect()
        }
    };

    if matching.is_empty() {
        println!("No matching private endpoints in resource group '{group}'.");
        return Ok(());
    }

    for endpoint in matching {
        let name = endpoint.get("name").and_then(Value::as_str).unwrap_or("?");
        output::print_json(&format!("Private endpoint '{name}'"), endpoint, max_depth);

        let nic_ids: Vec<String> = endpoint
            .get("networkInterfaces")
            .and_then(Value::as_array)
            .map(|nics| {
                nics.iter()
                    .filter_map(|nic| nic.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        for nic_id in nic_ids {
            match cli.invoke(&["network", "nic", "show", "--ids", &nic_id]).await {
                Ok(nic) => {
                    let nic_name = nic.get("name").and_then(Value::as_str).unwrap_or("?");
                    let ip = nic_private_ip(&nic).unwrap_or_else(|| "-".into());
                    println!("Interface '{nic_name}': private IP {ip}");
                }
                Err(e) => warn!("Could not show interface '{nic_id}': {e}"),
            }
        }
    }

    Ok(())
}

async fn inspect_dns_zones(cli: &dyn CloudCli, group: &str) -> Result<(), AppError> {
    let listing = cli
        .invoke(&["network", "private-dns", "zone", "list", "--resource-group", group])
        .await?;
    let zones = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("network private-dns zone list", "expected a JSON array")
    })?;

    for zone in zones {
        let zone_name = match zone.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => continue,
        };

        let records = cli
            .invoke(&[
                "network",
                "private-dns",
                "record-set",
                "a",
                "list",
                "--resource-group",
                group,
                "--zone-name",
                zone_name,
            ])
            .await?;

        let rows: Vec<Vec<String>> = records
            .as_array()
            .map(|sets| {
                sets.iter()
                    .map(|set| {
                        let addrs = set
                            .get("aRecords")
                            .and_then(Value::as_array)
                            .map(|recs| {
                                recs.iter()
                                    .filter_map(|r| r.get("ipv4Address").and_then(Value::as_str))
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            })
                            .unwrap_or_default();
                        vec![
                            set.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                            addrs,
                        ]
                    })
                    .collect()
            })
            .unwrap_or_default();

        output::print_table(&format!("DNS zone '{zone_name}'"), &["RECORD", "ADDRESSES"], &rows);
    }

    Ok(())
}

async fn inspect_security_groups(cli: &dyn CloudCli, group: &str) -> Result<(), AppError> {
    let listing = cli
        .invoke(&["network", "nsg", "list", "--resource-group", group])
        .await?;
    let nsgs = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("network nsg list", "expected a JSON array")
    })?;

    let rows: Vec<Vec<String>> = nsgs
        .iter()
        .map(|nsg| {
            let rule_count = nsg
                .get("securityRules")
                .and_then(Value::as_array)
                .map(|r| r.len())
                .unwrap_or(0);
            vec![
                nsg.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                nsg.get("location").and_then(Value::as_str).unwrap_or("").to_string(),
                rule_count.to_string(),
            ]
        })
        .collect();

    output::print_table("Network security groups", &["NAME", "LOCATION", "RULES"], &rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server() -> ServerRef {
        ServerRef {
            name: "domain-staging-db".into(),
            id: "/subscriptions/s-1/resourceGroups/domain-staging/providers/Microsoft.DBforPostgreSQL/flexibleServers/domain-staging-db".into(),
            fqdn: None,
            admin_login: None,
        }
    }

    #[test]
    fn test_endpoint_matches_by_link_id_case_insensitive() {
        let endpoint = json!({
            "name": "pe-database",
            "privateLinkServiceConnections": [{
                "privateLinkServiceId": "/SUBSCRIPTIONS/S-1/resourceGroups/domain-staging/providers/Microsoft.DBforPostgreSQL/flexibleServers/DOMAIN-STAGING-DB"
            }]
        });

        assert!(endpoint_matches_server(&endpoint, &server()));
    }

    #[test]
    fn test_endpoint_matches_by_name_substring() {
        let endpoint = json!({
            "name": "pe-domain-staging-db-01",
            "privateLinkServiceConnections": []
        });

        assert!(endpoint_matches_server(&endpoint, &server()));
    }

    #[test]
    fn test_unrelated_endpoint_does_not_match() {
        let endpoint = json!({
            "name": "pe-storage",
            "privateLinkServiceConnections": [{
                "privateLinkServiceId": "/subscriptions/s-1/providers/Microsoft.Storage/storageAccounts/blobs"
            }]
        });

        assert!(!endpoint_matches_server(&endpoint, &server()));
    }

    #[test]
    fn test_nic_private_ip_handles_both_casings() {
        let upper = json!({"ipConfigurations": [{"privateIPAddress": "10.0.1.4"}]});
        let lower = json!({"ipConfigurations": [{"privateIpAddress": "10.0.1.5"}]});
        let none = json!({"ipConfigurations": []});

        assert_eq!(nic_private_ip(&upper).as_deref(), Some("10.0.1.4"));
        assert_eq!(nic_private_ip(&lower).as_deref(), Some("10.0.1.5"));
        assert!(nic_private_ip(&none).is_none());
    }
}
