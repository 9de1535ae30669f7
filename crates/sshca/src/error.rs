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

//! Crate-level error taxonomy.
//!
//! Component errors ([`StoreError`], [`SigningError`], [`DirectoryError`],
//! [`ValidationError`]) are folded into [`CaError`] at the engine boundary.
//! Callers only ever see one of the seven kinds below.

use crate::authority::SigningError;
use crate::database::StoreError;
use crate::directory::DirectoryError;
use crate::validation::ValidationError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum CaError {
    /// Malformed input, rejected before touching the datastore or directory.
    #[error("Error: {0}")]
    Validation(#[from] ValidationError),

    /// Bad credentials, or the directory could not be reached.
    #[error("Error: {0}")]
    Authentication(String),

    /// Authenticated, but not a member of the admin group.
    #[error("Error: {0}")]
    Authorization(String),

    /// The username has no record.
    #[error("Error: {0}")]
    NotFound(String),

    /// `(username, realname)` or `(username, key)` does not match the stored record.
    #[error("Error: {0}")]
    Conflict(String),

    /// The datastore is unreachable or misconfigured.
    #[error("Error: {0}")]
    Unavailable(String),

    /// The signing tool failed. Details are logged, never returned.
    #[error("Error: signing key")]
    Signing(#[source] SigningError),
}

impl CaError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CaError::Validation(_) => "validation",
            CaError::Authentication(_) => "authentication",
            CaError::Authorization(_) => "authorization",
            CaError::NotFound(_) => "not_found",
            CaError::Conflict(_) => "conflict",
            CaError::Unavailable(_) => "unavailable",
            CaError::Signing(_) => "signing",
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            CaError::Validation(ValidationError::UnprocessableKey) => 422,
            CaError::Validation(_) => 400,
            CaError::Authentication(_) => 401,
            CaError::Authorization(_) => 403,
            CaError::NotFound(_) => 404,
            CaError::Conflict(_) => 409,
            CaError::Unavailable(_) => 503,
            CaError::Signing(_) => 500,
        }
    }
}

impl From<StoreError> for CaError {
    fn from(err: StoreError) -> Self {
        CaError::Unavailable(err.to_string())
    }
}

impl From<SigningError> for CaError {
    fn from(err: SigningError) -> Self {
        tracing::error!(error = %err, "Signing tool invocation failed");
        CaError::Signing(err)
    }
}

impl From<DirectoryError> for CaError {
    fn from(err: DirectoryError) -> Self {
        CaError::Authentication(err.to_string())
    }
}
