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

//! Request and response types of engine operations.

use crate::auth::Credentials;
use crate::models::{ExpiryPolicy, KeyState, KeyStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key submission or sign request from the key owner.
#[derive(Debug, Clone, Default)]
pub struct KeyRequest {
    pub username: String,
    pub credentials: Credentials,
    pub public_key: String,
}

impl KeyRequest {
    pub fn new(
        username: impl Into<String>,
        realname: impl Into<String>,
        password: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            credentials: Credentials::new(realname, password),
            public_key: public_key.into(),
        }
    }
}

/// Result of a sign request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Certificate(Vec<u8>),
    /// The key is not ACTIVE; nothing was signed.
    Status(KeyState),
}

impl SignOutcome {
    pub fn certificate(&self) -> Option<&[u8]> {
        match self {
            SignOutcome::Certificate(cert) => Some(cert),
            SignOutcome::Status(_) => None,
        }
    }
}

impl fmt::Display for SignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignOutcome::Certificate(cert) => f.write_str(&String::from_utf8_lossy(cert)),
            SignOutcome::Status(state) => write!(f, "Status: {}", state),
        }
    }
}

/// Target of an admin status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTarget {
    User(String),
    All,
}

impl StatusTarget {
    /// `all` addresses every record; anything else is a username.
    pub fn parse(value: &str) -> Self {
        if value == "all" {
            StatusTarget::All
        } else {
            StatusTarget::User(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatusReport {
    One(KeyStatus),
    All(BTreeMap<String, KeyStatus>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Activate,
    Revoke,
    Delete,
}

impl AdminAction {
    pub fn name(self) -> &'static str {
        match self {
            AdminAction::Activate => "activate",
            AdminAction::Revoke => "revoke",
            AdminAction::Delete => "delete",
        }
    }
}

/// Admin update of a single record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    SetExpiry(ExpiryPolicy),
    SetPrincipals(Vec<String>),
}

/// Result of a principal edit: the merged set now in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalsOutcome {
    pub username: String,
    pub principals: Vec<String>,
}

impl fmt::Display for PrincipalsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK: {} principals are '{}'",
            self.username,
            self.principals.join(",")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub name: String,
    pub version: String,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            name: "sshca".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}
