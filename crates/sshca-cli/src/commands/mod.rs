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


//! Subcommand implementations.

use anyhow::{Context as _, Result};
use serde::Serialize;
use sshca::auth::Credentials;
use sshca::{ConfigLoader, Engine};
use std::path::Path;
use tracing::debug;

pub mod admin;
pub mod principals;
pub mod service;

/// Loaded configuration, engine and operator credentials.
pub struct Context {
    pub engine: Engine,
    pub credentials: Credentials,
}

impl Context {
    pub fn load(config: Option<&Path>, realname: &str, password: &str) -> Result<Self> {
        let config = ConfigLoader::new()
            .load_config(config)
            .context("Failed to load configuration")?;
        debug!(database = %config.database.url, krl = %config.main.krl.display(), "Configuration loaded");

        let engine = Engine::from_config(&config).context("Failed to initialise engine")?;
        Ok(Self {
            engine,
            credentials: Credentials::new(realname, password),
        })
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
