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


//! Key lifecycle commands.

use super::{print_json, Context};
use anyhow::{Context as _, Result};
use sshca::engine::{AdminAction, FieldUpdate, StatusTarget};
use sshca::validation::validate_expiry;
use tracing::info;

pub async fn migrate(ctx: &Context) -> Result<()> {
    ctx.engine
        .run_migrations()
        .await
        .context("Failed to run migrations")?;
    info!("Datastore schema is up to date");
    Ok(())
}

pub async fn status(ctx: &Context, target: &str) -> Result<()> {
    let report = ctx
        .engine
        .admin_status(&ctx.credentials, &StatusTarget::parse(target))
        .await?;
    print_json(&report)
}

pub async fn action(ctx: &Context, username: &str, action: AdminAction) -> Result<()> {
    let message = ctx
        .engine
        .admin_action(&ctx.credentials, username, action)
        .await
        .with_context(|| format!("Failed to {} {}", action.name(), username))?;
    println!("{}", message);
    Ok(())
}

pub async fn set_expiry(ctx: &Context, username: &str, expiry: &str) -> Result<()> {
    let policy = validate_expiry(expiry)?;
    let message = ctx
        .engine
        .admin_update(&ctx.credentials, username, FieldUpdate::SetExpiry(policy))
        .await?;
    println!("{}", message);
    Ok(())
}
