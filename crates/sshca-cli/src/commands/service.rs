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


//! Revocation list, CA key and node commands.

use super::{print_json, Context};
use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub async fn krl(ctx: &Context, output: Option<&Path>) -> Result<()> {
    let bytes = ctx
        .engine
        .current_krl()
        .await
        .context("Failed to produce revocation list")?;

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Revocation list written");
        }
        None => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

pub async fn ca(ctx: &Context) -> Result<()> {
    let key = ctx.engine.ca_public_key().await?;
    std::io::stdout().write_all(&key)?;
    Ok(())
}

pub async fn cluster_status(ctx: &Context) -> Result<()> {
    print_json(&ctx.engine.cluster_status().await)
}

pub fn health(ctx: &Context) -> Result<()> {
    print_json(&ctx.engine.health())
}

pub async fn test_auth(ctx: &Context) -> Result<()> {
    println!("{}", ctx.engine.test_auth(&ctx.credentials).await?);
    Ok(())
}

pub fn print_default_config() -> Result<()> {
    let toml = sshca::config::generate_default_config_toml()
        .context("Failed to render default configuration")?;
    print!("{}", toml);
    Ok(())
}
