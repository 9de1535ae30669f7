/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! sshca CLI - operator interface for the SSH certificate authority engine.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::Context;

/// sshca - SSH certificate authority
#[derive(Parser)]
#[command(name = "sshca")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (can also be set via SSHCA_CONFIG)
    #[arg(short, long, env = "SSHCA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory identity of the operator
    #[arg(long, env = "SSHCA_REALNAME", global = true, default_value = "")]
    realname: String,

    /// Directory password of the operator
    #[arg(long, env = "SSHCA_PASSWORD", global = true, default_value = "", hide_env_values = true)]
    password: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the datastore schema
    Migrate,

    /// Show one user's key record, or every record with `all`
    Status {
        /// Username, or `all`
        target: String,
    },

    /// Move a key to ACTIVE so it can be signed
    Activate { username: String },

    /// Move a key to REVOKED and journal it
    Revoke { username: String },

    /// Remove a user record
    Delete { username: String },

    /// Set the validity applied to a user's future certificates
    SetExpiry {
        username: String,
        /// Validity such as `12h` or `7d`
        expiry: String,
    },

    /// Manage custom principals
    Principals {
        #[command(subcommand)]
        command: PrincipalCommands,
    },

    /// Write the current key revocation list
    Krl {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the CA public key
    Ca,

    /// Probe every configured peer
    ClusterStatus,

    /// Liveness answer of this node
    Ping,

    /// Service name and version
    Health,

    /// Check the operator credentials against the directory
    TestAuth,

    /// Print a default configuration file
    Config,
}

#[derive(Subcommand)]
enum PrincipalCommands {
    /// Stored custom principals of a user
    Get { username: String },
    /// Append principals (comma-separated)
    Add { username: String, principals: String },
    /// Remove principals (comma-separated)
    Remove { username: String, principals: String },
    /// Replace the whole list (comma-separated)
    Update { username: String, principals: String },
    /// Reset the list to the username
    Purge { username: String },
    /// Users holding any of the given principals (all users when empty)
    Search {
        #[arg(default_value = "")]
        filter: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    sshca::init_logging(Some(if cli.verbose { "debug" } else { "info" }));

    let command = match cli.command {
        Commands::Config => return commands::service::print_default_config(),
        command => command,
    };

    let ctx = Context::load(cli.config.as_deref(), &cli.realname, &cli.password)?;

    match command {
        Commands::Migrate => commands::admin::migrate(&ctx).await?,
        Commands::Status { target } => commands::admin::status(&ctx, &target).await?,
        Commands::Activate { username } => {
            commands::admin::action(&ctx, &username, sshca::engine::AdminAction::Activate).await?
        }
        Commands::Revoke { username } => {
            commands::admin::action(&ctx, &username, sshca::engine::AdminAction::Revoke).await?
        }
        Commands::Delete { username } => {
            commands::admin::action(&ctx, &username, sshca::engine::AdminAction::Delete).await?
        }
        Commands::SetExpiry { username, expiry } => {
            commands::admin::set_expiry(&ctx, &username, &expiry).await?
        }
        Commands::Principals { command } => match command {
            PrincipalCommands::Get { username } => {
                commands::principals::get(&ctx, &username).await?
            }
            PrincipalCommands::Add {
                username,
                principals,
            } => commands::principals::edit(&ctx, &username, "add", &principals).await?,
            PrincipalCommands::Remove {
                username,
                principals,
            } => commands::principals::edit(&ctx, &username, "remove", &principals).await?,
            PrincipalCommands::Update {
                username,
                principals,
            } => commands::principals::edit(&ctx, &username, "update", &principals).await?,
            PrincipalCommands::Purge { username } => {
                commands::principals::edit(&ctx, &username, "purge", "").await?
            }
            PrincipalCommands::Search { filter } => {
                commands::principals::search(&ctx, &filter).await?
            }
        },
        Commands::Krl { output } => commands::service::krl(&ctx, output.as_deref()).await?,
        Commands::Ca => commands::service::ca(&ctx).await?,
        Commands::ClusterStatus => commands::service::cluster_status(&ctx).await?,
        Commands::Ping => println!("{}", ctx.engine.ping()),
        Commands::Health => commands::service::health(&ctx)?,
        Commands::TestAuth => commands::service::test_auth(&ctx).await?,
        Commands::Config => commands::service::print_default_config()?,
    }

    Ok(())
}
