//! Command-line interface.

use clap::Parser;

/// Inspect the Azure footprint of a project environment: session, resource
/// group tags, PostgreSQL server, secrets, networking, function apps, and
/// role assignments.
#[derive(Parser, Debug)]
#[command(name = "azinspect", version, about)]
pub struct Cli {
    /// Project identifier, combined with the environment into the resource
    /// group name (`<project>-<environment>`).
    #[arg(short, long)]
    pub project: Option<String>,

    /// Environment identifier (e.g. test, staging, prod).
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Resource group name, taking precedence over project/environment.
    #[arg(short = 'g', long)]
    pub resource_group: Option<String>,

    /// Database name for connection settings and the connectivity probe.
    #[arg(short, long)]
    pub database: Option<String>,

    /// Expand steward tags on the resource group.
    #[arg(long)]
    pub tags: bool,

    /// Inspect the PostgreSQL flexible server.
    #[arg(long)]
    pub postgres: bool,

    /// Inspect key vaults and fetch the admin password secret.
    #[arg(long)]
    pub keyvault: bool,

    /// Inspect private endpoints, DNS zones, and security groups.
    #[arg(long)]
    pub network: bool,

    /// Inspect function apps and their settings.
    #[arg(long)]
    pub functionapp: bool,

    /// Resolve role assignments for the resource group.
    #[arg(long)]
    pub access: bool,

    /// Export POSTGRES_* variables and probe database connectivity.
    #[arg(long)]
    pub probe: bool,

    /// Depth at which printed JSON payloads are clipped.
    #[arg(long, default_value_t = 4)]
    pub max_depth: usize,

    /// Log at info level regardless of configuration.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log at debug level, including every provider invocation.
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// The resource group to inspect: the explicit flag, or
    /// `<project>-<environment>` when both are given.
    pub fn resource_group_name(&self) -> Option<String> {
        if let Some(group) = &self.resource_group {
            return Some(group.clone());
        }
        match (&self.project, &self.environment) {
            (Some(project), Some(environment)) => Some(format!("{project}-{environment}")),
            _ => None,
        }
    }

    fn any_step_selected(&self) -> bool {
        self.tags
            || self.postgres
            || self.keyvault
            || self.network
            || self.functionapp
            || self.access
            || self.probe
    }

    /// With no step flags given, every step runs.
    fn step(&self, selected: bool) -> bool {
        selected || !self.any_step_selected()
    }

    pub fn step_tags(&self) -> bool {
        self.step(self.tags)
    }

    pub fn step_postgres(&self) -> bool {
        self.step(self.postgres)
    }

    pub fn step_keyvault(&self) -> bool {
        self.step(self.keyvault)
    }

    pub fn step_network(&self) -> bool {
        self.step(self.network)
    }

    pub fn step_functionapp(&self) -> bool {
        self.step(self.functionapp)
    }

    pub fn step_access(&self) -> bool {
        self.step(self.access)
    }

    pub fn step_probe(&self) -> bool {
        self.step(self.probe)
    }
}
