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

//! Directory service client.
//!
//! Authentication binds as the acting user. Group lookups bind separately
//! with a service account, so a user's own bind never needs search rights.

#[cfg(feature = "ldap")]
mod ldap;

#[cfg(feature = "ldap")]
pub use ldap::LdapDirectory;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),

    #[error("directory unreachable: {0}")]
    Unreachable(String),

    #[error("directory operation timed out after {0}s")]
    Timeout(u64),

    #[error("directory search failed: {0}")]
    Search(String),
}

/// Identity provider used by the auth gate.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Verifies `password` by binding as `realname`.
    async fn authenticate(&self, realname: &str, password: &str) -> Result<(), DirectoryError>;

    /// Group identifiers `realname` is a member of.
    async fn groups(&self, realname: &str) -> Result<Vec<String>, DirectoryError>;
}
