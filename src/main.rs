//! azinspect: inspect the Azure footprint of a project environment.
//!
//! Authenticates once through the Azure CLI, locates the resource group,
//! then runs the selected inspection steps in order. Step failures abort
//! that step only; authentication and configuration failures end the run.

mod access;
mod cli;
mod config;
mod directory;
mod error;
mod inspect;
mod output;
mod provider;
mod session;
mod tags;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::access::AccessResolver;
use crate::cli::Cli;
use crate::config::Config;
use crate::directory::DirectoryClient;
use crate::error::AppError;
use crate::inspect::InspectionContext;
use crate::provider::{AzCli, CloudCli};
use crate::session::SessionManager;

fn main() {
    dotenvy::dotenv().ok();

    let args = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(&config, &args)) {
        error!("Run aborted: {e}");
        std::process::exit(1);
    }
}

fn init_logging(args: &Cli, config: &Config) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        config.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(config: &Config, args: &Cli) -> Result<(), AppError> {
    let group_name = args.resource_group_name().ok_or_else(|| {
        AppError::Config(
            "no resource group: pass --resource-group, or --project with --environment".into(),
        )
    })?;

    let cli: Arc<dyn CloudCli> = Arc::new(AzCli::new(
        config.provider.binary.clone(),
        Duration::from_secs(config.provider.timeout_seconds),
    ));

    let manager = SessionManager::new(cli.clone(), config.provider.token_audience.clone());
    let session = establish_session(&manager).await?;

    let mut ctx = InspectionContext::new(session);
    if ctx.session.is_none() {
        warn!("Proceeding without an established session; provider calls may fail");
    }
    ctx.resource_group = match inspect::find_resource_group(cli.as_ref(), &group_name).await? {
        Some(group) => Some(group),
        None => {
            println!("Resource group '{group_name}' not found.");
            return Ok(());
        }
    };

    if args.step_tags() {
        let directory = DirectoryClient::new(cli.clone());
        if let Some(group) = ctx.resource_group.as_mut() {
            tags::expand_tags(&directory, group, &config.tags.steward_keys).await;
        }
    }

    if let Some(group) = &ctx.resource_group {
        output::print_json(&format!("Resource group '{group_name}'"), group, args.max_depth);
    }

    if args.step_postgres() {
        report(
            "postgres",
            inspect::postgres::inspect(
                cli.as_ref(),
                &mut ctx,
                &config.postgres,
                args.database.as_deref(),
                args.max_depth,
            )
            .await,
        )?;
    }

    if args.step_keyvault() {
        report(
            "keyvault",
            inspect::keyvault::inspect(cli.as_ref(), &mut ctx, &config.postgres).await,
        )?;
    }

    if args.step_network() {
        report(
            "network",
            inspect::network::inspect(cli.as_ref(), &ctx, args.max_depth).await,
        )?;
    }

    if args.step_functionapp() {
        report(
            "functionapp",
            inspect::functionapp::inspect(cli.as_ref(), &ctx).await,
        )?;
    }

    if args.step_access() {
        let resolver = AccessResolver::new(cli.clone());
        let outcome = resolver
            .resolve_role_assignments(&["--resource-group", &group_name])
            .await
            .map(|assignments| print_role_assignments(&assignments));
        report("access", outcome)?;
    }

    if args.step_probe() {
        inspect::postgres::export_env(&ctx.postgres);
        inspect::postgres::connectivity_probe(&ctx.postgres).await;
    }

    Ok(())
}

/// Session establishment follows the same step rules as the inspectors: a
/// malformed token payload or an unparsable expiry aborts only this step,
/// while authentication failures stay fatal.
async fn establish_session(
    manager: &SessionManager,
) -> Result<Option<session::Session>, AppError> {
    match manager.ensure_session().await {
        Ok(session) => Ok(Some(session)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!("Step 'session' aborted: {e}");
            Ok(None)
        }
    }
}

/// Step errors are logged and skipped; fatal errors end the run.
fn report(step: &str, result: Result<(), AppError>) -> Result<(), AppError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!("Step '{step}' aborted: {e}");
            Ok(())
        }
    }
}

fn print_role_assignments(assignments: &[access::RoleAssignment]) {
    let rows: Vec<Vec<String>> = assignments
        .iter()
        .map(|a| {
            vec![
                a.principal_name.clone(),
                format!("{:?}", a.principal_type),
                a.role_definition_name.clone(),
                a.created_by.clone(),
                a.updated_on.clone(),
            ]
        })
        .collect();
    output::print_table(
        "Role assignments",
        &["PRINCIPAL", "TYPE", "ROLE", "CREATED BY", "UPDATED"],
        &rows,
    );
}
