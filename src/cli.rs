// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "fmctl")]
#[command(about = "Command-line client for the FortiManager JSON-RPC API.\nManages devices, addresses, services and firewall policy packages with a persisted login session.")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = concat!("Command-line client for the FortiManager JSON-RPC API.\nRun 'fmctl commands' to list the available commands and 'fmctl run <command> key=value...' to execute one.\n\nVersion: ", env!("CARGO_PKG_VERSION")))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialise a new instance with a config template
    Init {
        /// Instance name
        #[arg(long)]
        instance: String,
    },
    /// Check connectivity and credentials
    Test {
        /// Instance name (falls back to FORTIMANAGER_* environment variables when not specified)
        #[arg(long)]
        instance: Option<String>,
    },
    /// Log in and store a fresh session token
    Login {
        /// Instance name
        #[arg(long, default_value = "default")]
        instance: String,
    },
    /// List every command accepted by 'run'
    Commands,
    /// Execute a FortiManager command
    Run {
        /// Command name, e.g. fortimanager-address-list
        command: String,
        /// Command arguments as key=value pairs
        args: Vec<String>,
        /// Instance name
        #[arg(long, default_value = "default")]
        instance: String,
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
    /// Build a minimal coverage report and upload it to cloud storage
    Coverage(CoverageArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CoverageArgs {
    /// Name of the storage bucket
    #[arg(short, long, default_value = "marketplace-dist-dev")]
    pub bucket_name: String,
    /// Path to the coverage report in JSON format
    #[arg(short = 'f', long, default_value = "coverage.json")]
    pub source_file_name: String,
    /// Filename of the minimal coverage report
    #[arg(short, long, default_value = "coverage_data.json")]
    pub minimal_file_name: String,
    /// Destination directory inside the bucket
    #[arg(short, long, default_value = "code-coverage")]
    pub destination_blob_dir: String,
    /// OAuth access token for the storage API
    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
    /// Base URL of the storage API
    #[arg(long, default_value = "https://storage.googleapis.com")]
    pub storage_url: String,
}
