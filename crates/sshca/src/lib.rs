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

//! # sshca
//!
//! A certificate authority engine for SSH user keys.
//!
//! Users submit a public key, an administrator activates it, and the owner
//! can then obtain short-lived certificates signed by the CA. Revoked keys
//! are journaled and compiled into a key revocation list (KRL) that SSH
//! servers can fetch.
//!
//! The crate is organised leaves-first:
//!
//! - [`authority`]: wraps the external `ssh-keygen` signing tool
//! - [`directory`]: LDAP-style identity provider and the [`auth::AuthGate`]
//! - [`database`] / [`dal`]: the `users` and `revocation` tables
//! - [`principals`]: merges custom principals with directory-group principals
//! - [`krl`]: cached KRL generation keyed by the latest revocation timestamp
//! - [`cluster`]: liveness probing of peer nodes
//! - [`engine`]: the lifecycle engine tying everything together
//!
//! Transport (HTTP routing) lives outside this crate; every
//! operation is exposed as an async method on [`engine::Engine`].

pub mod audit;
pub mod auth;
pub mod authority;
pub mod cluster;
pub mod config;
pub mod dal;
pub mod database;
pub mod directory;
pub mod engine;
pub mod error;
pub mod krl;
pub mod models;
pub mod principals;
pub mod validation;

pub use config::{ConfigLoader, SshcaConfig};
pub use database::Database;
pub use engine::Engine;
pub use error::CaError;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crate version, reported by the health operation and the probe user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (or `info`) is used.
/// Calling this more than once is harmless, which lets every test fixture
/// call it unconditionally.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
