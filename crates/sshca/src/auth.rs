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

//! Authentication and authorization gate in front of engine operations.
//!
//! Without a configured directory every check is permitted.

use crate::audit;
use crate::directory::Directory;
use crate::error::CaError;
use crate::validation::ValidationError;
use std::sync::Arc;

/// Credentials presented with a request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub realname: String,
    pub password: String,
}

impl Credentials {
    pub fn new(realname: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            realname: realname.into(),
            password: password.into(),
        }
    }
}

/// Outcome of a successful check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Lower-cased realname.
    pub realname: String,
    /// Directory groups, looked up only when they are needed.
    pub groups: Vec<String>,
}

#[derive(Clone)]
pub struct AuthGate {
    directory: Option<Arc<dyn Directory>>,
    admin_group: String,
}

impl AuthGate {
    pub fn new(directory: Option<Arc<dyn Directory>>, admin_group: impl Into<String>) -> Self {
        Self {
            directory,
            admin_group: admin_group.into(),
        }
    }

    /// A gate that permits everything.
    pub fn disabled() -> Self {
        Self::new(None, String::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Verifies the credentials against the directory.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, CaError> {
        let Some(directory) = &self.directory else {
            return Ok(Identity {
                realname: credentials.realname.to_lowercase(),
                groups: Vec::new(),
            });
        };

        if credentials.realname.is_empty() {
            return Err(ValidationError::MissingField("realname").into());
        }
        if credentials.password.is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }

        if let Err(e) = directory
            .authenticate(&credentials.realname, &credentials.password)
            .await
        {
            audit::log_authentication_failed(&credentials.realname, &e.to_string());
            return Err(e.into());
        }

        Ok(Identity {
            realname: credentials.realname.to_lowercase(),
            groups: Vec::new(),
        })
    }

    /// Authenticates and fetches the caller's directory groups.
    pub async fn authenticate_with_groups(
        &self,
        credentials: &Credentials,
    ) -> Result<Identity, CaError> {
        let mut identity = self.authenticate(credentials).await?;
        identity.groups = self.groups(&credentials.realname).await?;
        Ok(identity)
    }

    /// Directory groups of `realname`; empty when the directory is disabled.
    pub async fn groups(&self, realname: &str) -> Result<Vec<String>, CaError> {
        match &self.directory {
            Some(directory) => directory.groups(realname).await.map_err(|e| {
                audit::log_authentication_failed(realname, &e.to_string());
                CaError::from(e)
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Authenticates and requires membership of the admin group.
    pub async fn authorize_admin(&self, credentials: &Credentials) -> Result<Identity, CaError> {
        let identity = self.authenticate_with_groups(credentials).await?;
        if self.directory.is_some() && !identity.groups.iter().any(|g| g == &self.admin_group) {
            audit::log_authorization_failed(&credentials.realname, &self.admin_group);
            return Err(CaError::Authorization(format!(
                "user {} is not an admin.",
                credentials.realname
            )));
        }
        Ok(identity)
    }
}
