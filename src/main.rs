// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::sync::Arc;

mod api;
mod cli;
mod client;
mod commands;
mod config;
mod coverage;
mod error;
mod lock;
mod output;
mod session;
mod types;

use api::HttpTransport;
use cli::{Cli, Commands};
use client::FortiClient;
use commands::{CommandArgs, CommandRegistry};
use config::{ConfigManager, FortiManagerSettings};
use lock::StoreLock;
use output::OutputFormat;
use session::{FileSessionStore, MemorySessionStore, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { instance }) => {
            exit_on_failure("init", handle_init_command(&instance));
        }
        Some(Commands::Test { instance }) => {
            exit_on_failure("test-module", handle_test_command(instance).await);
        }
        Some(Commands::Login { instance }) => {
            exit_on_failure("login", handle_login_command(&instance).await);
        }
        Some(Commands::Commands) => {
            for name in CommandRegistry::load().names() {
                println!("{name}");
            }
        }
        Some(Commands::Run {
            command,
            args,
            instance,
            output,
        }) => {
            let result = handle_run_command(&command, &args, &instance, output).await;
            exit_on_failure(&command, result);
        }
        Some(Commands::Coverage(args)) => {
            exit_on_failure("coverage", coverage::run(&args).await);
        }
        None => {
            // No command provided, show help with version (same as --help)
            let mut cmd = Cli::command();
            cmd.print_long_help()?;
            std::process::exit(0);
        }
    }

    Ok(())
}

fn exit_on_failure(command: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::error!("{e:?}");
        eprintln!("{}", failure_message(command, &e));
        std::process::exit(1);
    }
}

fn failure_message(command: &str, error: &anyhow::Error) -> String {
    format!("Failed to execute {command} command.\nError:\n{error:#}")
}

fn handle_init_command(instance: &str) -> Result<()> {
    let config_path = ConfigManager::new().init_instance(instance)?;

    println!("Initialised instance '{instance}'");
    println!("Edit {} to point at your FortiManager", config_path.display());
    println!("  (or export FORTIMANAGER_URL, FORTIMANAGER_USERNAME and FORTIMANAGER_PASSWORD)");
    Ok(())
}

fn connect(settings: &FortiManagerSettings, store: Arc<dyn SessionStore>) -> Result<FortiClient> {
    let transport = HttpTransport::from_settings(settings)?;
    Ok(FortiClient::new(settings, Arc::new(transport), store))
}

/// Client bound to an instance's persisted session. The lock is held for
/// the lifetime of the returned guard.
fn open_instance(instance: &str) -> Result<(FortiClient, StoreLock)> {
    let config_manager = ConfigManager::new();
    let settings = config_manager.load_settings(instance)?;

    let store_path = config_manager.session_store_path(instance);
    let lock = StoreLock::acquire(&store_path)?;
    let store = Arc::new(FileSessionStore::new(store_path));

    Ok((connect(&settings, store)?, lock))
}

async fn handle_test_command(instance: Option<String>) -> Result<()> {
    let registry = CommandRegistry::load();

    let output = match instance {
        Some(instance) => {
            let (client, _lock) = open_instance(&instance)?;
            registry.execute("test-module", &client, &CommandArgs::new()).await?
        }
        None => {
            let settings = ConfigManager::settings_from_env()?;
            let client = connect(&settings, Arc::new(MemorySessionStore::new()))?;
            registry.execute("test-module", &client, &CommandArgs::new()).await?
        }
    };

    println!("{}", output::render(&output, OutputFormat::Table)?);
    Ok(())
}

async fn handle_login_command(instance: &str) -> Result<()> {
    let (client, _lock) = open_instance(instance)?;
    client.get_token(true).await?;

    println!("Logged in to instance '{instance}' (ADOM {})", client.adom());
    Ok(())
}

async fn handle_run_command(
    command: &str,
    raw_args: &[String],
    instance: &str,
    format: OutputFormat,
) -> Result<()> {
    let registry = CommandRegistry::load();
    if registry.get(command).is_none() {
        return Err(anyhow::anyhow!(
            "Unknown command '{}'. Run 'fmctl commands' to list them",
            command
        ));
    }

    let args = CommandArgs::parse(raw_args)?;
    let (client, _lock) = open_instance(instance)?;

    let output = registry.execute(command, &client, &args).await?;
    println!("{}", output::render(&output, format)?);
    Ok(())
}
