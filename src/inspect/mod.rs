//! Resource inspection steps and the context they share.
//!
//! Inspectors run sequentially; later steps read state earlier steps put in
//! the [`InspectionContext`] (the networking step assumes the database
//! server lookup already ran), so the driver's top-to-bottom order matters.

pub mod functionapp;
pub mod keyvault;
pub mod network;
pub mod postgres;

use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::CloudCli;
use crate::session::Session;

/// Database server reference resolved by the postgres inspector.
#[derive(Debug, Clone)]
pub struct ServerRef {
    pub name: String,
    pub id: String,
    pub fqdn: Option<String>,
    pub admin_login: Option<String>,
}

/// Connection settings accumulated across steps and consumed by the final
/// connectivity probe.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub sslmode: Option<String>,
}

/// State passed by reference through every inspection step.
pub struct InspectionContext {
    /// `None` when session establishment failed non-fatally; inspectors
    /// still run, relying on whatever context the CLI already holds.
    pub session: Option<Session>,
    pub resource_group: Option<Value>,
    pub server: Option<ServerRef>,
    pub postgres: ConnectionSettings,
}

impl InspectionContext {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session,
            resource_group: None,
            server: None,
            postgres: ConnectionSettings::default(),
        }
    }

    /// Name of the resource group located earlier in the run.
    pub fn group_name(&self) -> Option<&str> {
        self.resource_group
            .as_ref()
            .and_then(|g| g.get("name"))
            .and_then(Value::as_str)
    }
}

/// Locate a resource group by name in the subscription's group list.
///
/// A name absent from the provider's response is an `Ok(None)`, reported by
/// the caller as "not found" with no JSON payload; it is never an error.
pub async fn find_resource_group(
    cli: &dyn CloudCli,
    name: &str,
) -> Result<Option<Value>, ProviderError> {
    let listing = cli.invoke(&["group", "list"]).await?;
    let groups = listing
        .as_array()
        .ok_or_else(|| ProviderError::unexpected_shape("group list", "expected a JSON array"))?;

    Ok(groups
        .iter()
        .find(|group| group.get("name").and_then(Value::as_str) == Some(name))
        .cloned())
}
