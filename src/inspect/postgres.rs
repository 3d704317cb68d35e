//! PostgreSQL flexible-server inspection and the final connectivity probe.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::PostgresConfig;
use crate::error::{AppError, ProviderError};
use crate::output;
use crate::provider::CloudCli;

use super::{InspectionContext, ServerRef};

/// Probe subprocess budget. Unreachable hosts otherwise hang for minutes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Inspect the flexible server in the context's resource group: details,
/// server parameters, firewall rules. Stores the server reference and the
/// connection settings for the steps that follow.
pub async fn inspect(
    cli: &dyn CloudCli,
    ctx: &mut InspectionContext,
    cfg: &PostgresConfig,
    database: Option<&str>,
    max_depth: usize,
) -> Result<(), AppError> {
    let group = ctx
        .group_name()
        .ok_or_else(|| AppError::Config("postgres inspection needs a resource group".into()))?
        .to_string();

    let listing = cli
        .invoke(&["postgres", "flexible-server", "list", "--resource-group", &group])
        .await?;
    let servers = listing.as_array().ok_or_else(|| {
        ProviderError::unexpected_shape("postgres flexible-server list", "expected a JSON array")
    })?;

    let server = match servers.first() {
        Some(server) => server,
        None => {
            println!("No PostgreSQL flexible servers in resource group '{group}'.");
            return Ok(());
        }
    };
    if servers.len() > 1 {
        info!("{} servers in '{group}', inspecting the first", servers.len());
    }

    let name = server
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::missing_field("postgres flexible-server list", "name"))?
        .to_string();

    ctx.server = Some(ServerRef {
        name: name.clone(),
        id: server
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        fqdn: server
            .get("fullyQualifiedDomainName")
            .and_then(Value::as_str)
            .map(str::to_string),
        admin_login: server
            .get("administratorLogin")
            .and_then(Value::as_str)
            .map(str::to_string),
    });

    output::print_json(&format!("PostgreSQL server '{name}'"), server, max_depth);

    let parameters = cli
        .invoke(&[
            "postgres",
            "flexible-server",
            "parameter",
            "list",
            "--resource-group",
            &group,
            "--server-name",
            &name,
        ])
        .await?;
    print_parameters(&parameters);

    let firewall = cli
        .invoke(&[
            "postgres",
            "flexible-server",
            "firewall-rule",
            "list",
            "--resource-group",
            &group,
            "--name",
            &name,
        ])
        .await?;
    print_firewall_rules(&firewall);

    collect_connection(ctx, cfg, database);

    Ok(())
}

fn print_parameters(parameters: &Value) {
    let rows: Vec<Vec<String>> = parameters
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|p| {
                    vec![
                        json_str(p, "name"),
                        json_str(p, "value"),
                        json_str(p, "source"),
                    ]
                })
                .collect()
        })
        .unwrap_or_default();
    output::print_table("Server parameters", &["NAME", "VALUE", "SOURCE"], &rows);
}

fn print_firewall_rules(rules: &Value) {
    let rows: Vec<Vec<String>> = rules
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|r| {
                    vec![
                        json_str(r, "name"),
                        json_str(r, "startIpAddress"),
                        json_str(r, "endIpAddress"),
                    ]
                })
                .collect()
        })
        .unwrap_or_default();
    output::print_table("Firewall rules", &["NAME", "START", "END"], &rows);
}

fn json_str(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Fill the context's connection settings from the resolved server and
/// configuration defaults. The Key Vault step supplies the password later.
fn collect_connection(ctx: &mut InspectionContext, cfg: &PostgresConfig, database: Option<&str>) {
    let server = match &ctx.server {
        Some(server) => server,
        None => return,
    };

    ctx.postgres.host = server.fqdn.clone();
    ctx.postgres.port = Some(cfg.port);
    ctx.postgres.database = Some(database.unwrap_or(&cfg.default_database).to_string());
    ctx.postgres.user = server.admin_login.clone();
    ctx.postgres.sslmode = Some(cfg.sslmode.clone());
}

/// Publish the collected settings as `POSTGRES_*` environment variables for
/// the probe and for whatever the operator runs after us.
pub fn export_env(settings: &super::ConnectionSettings) {
    let pairs = [
        ("POSTGRES_HOST", settings.host.clone()),
        ("POSTGRES_PORT", settings.port.map(|p| p.to_string())),
        ("POSTGRES_DATABASE", settings.database.clone()),
        ("POSTGRES_USER", settings.user.clone()),
        ("POSTGRES_PASSWORD", settings.password.clone()),
        ("POSTGRES_SSLMODE", settings.sslmode.clone()),
    ];

    for (key, value) in pairs {
        if let Some(value) = value {
            std::env::set_var(key, value);
        }
    }
}

/// Known connectivity failure classes, each reported with its own message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    Unreachable,
    AuthFailed,
    Fatal,
    Unknown,
}

/// Classify psql stderr into a failure class. Auth markers win over the
/// generic FATAL prefix psql puts on most errors.
pub fn classify_probe_failure(stderr: &str) -> ProbeFailure {
    let stderr = stderr.to_ascii_lowercase();

    if stderr.contains("could not connect")
        || stderr.contains("connection refused")
        || stderr.contains("timeout expired")
        || stderr.contains("no route to host")
        || stderr.contains("could not translate host name")
    {
        ProbeFailure::Unreachable
    } else if stderr.contains("authentication failed") || stderr.contains("no pg_hba.conf entry") {
        ProbeFailure::AuthFailed
    } else if stderr.contains("syntax error") || stderr.contains("fatal") {
        ProbeFailure::Fatal
    } else {
        ProbeFailure::Unknown
    }
}

/// Run `SELECT 1` against the collected connection settings and report the
/// outcome. Failures are reported per class and never raised above this
/// step.
pub async fn connectivity_probe(settings: &super::ConnectionSettings) {
    let (host, database, user) = match (&settings.host, &settings.database, &settings.user) {
        (Some(host), Some(database), Some(user)) => (host, database, user),
        _ => {
            warn!("Skipping connectivity probe: connection settings are incomplete");
            return;
        }
    };

    info!("Probing PostgreSQL connectivity to {host}/{database}");

    let mut cmd = Command::new("psql");
    cmd.args(["--command", "SELECT 1;", "--tuples-only", "--quiet"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("PGHOST", host)
        .env("PGDATABASE", database)
        .env("PGUSER", user)
        .env("PGCONNECT_TIMEOUT", "10");

    if let Some(port) = settings.port {
        cmd.env("PGPORT", port.to_string());
    }
    if let Some(password) = &settings.password {
        cmd.env("PGPASSWORD", password);
    }
    if let Some(sslmode) = &settings.sslmode {
        cmd.env("PGSSLMODE", sslmode);
    }

    let output = match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
        Err(_) => {
            println!("Connectivity: UNREACHABLE ({host} did not answer within {PROBE_TIMEOUT:?})");
            return;
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("Connectivity: SKIPPED (psql not found on PATH)");
            return;
        }
        Ok(Err(e)) => {
            println!("Connectivity: UNKNOWN FAILURE (could not run psql: {e})");
            return;
        }
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        println!("Connectivity: OK ({user}@{host}/{database})");
        return;
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    match classify_probe_failure(&stderr) {
        ProbeFailure::Unreachable => {
            println!("Connectivity: UNREACHABLE ({})", stderr.trim())
        }
        ProbeFailure::AuthFailed => {
            println!("Connectivity: AUTHENTICATION FAILED ({})", stderr.trim())
        }
        ProbeFailure::Fatal => println!("Connectivity: FATAL ({})", stderr.trim()),
        ProbeFailure::Unknown => {
            println!("Connectivity: UNKNOWN FAILURE ({})", stderr.trim())
        }
    }
}
