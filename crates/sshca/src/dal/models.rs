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

//! Diesel row types. Conversion to domain models happens here so the rest of
//! the crate never sees nullable columns or raw state codes.

use crate::database::schema::{revocation, users};
use crate::database::StoreError;
use crate::models::{ExpiryPolicy, KeyState, RevocationEntry, UserKeyRecord};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub name: String,
    pub realname: String,
    pub state: i32,
    pub expiration: i64,
    pub ssh_key_hash: Option<String>,
    pub ssh_key: Option<String>,
    pub expiry: Option<String>,
    pub principals: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub name: String,
    pub realname: String,
    pub state: i32,
    pub expiration: i64,
    pub ssh_key_hash: Option<String>,
    pub ssh_key: Option<String>,
    pub expiry: Option<String>,
    pub principals: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = revocation)]
pub struct RevocationRow {
    pub ssh_key: String,
    pub revocation_date: i64,
    pub username: String,
}

impl TryFrom<UserRow> for UserKeyRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let state = KeyState::from_code(row.state).ok_or_else(|| {
            StoreError::Query(format!("user {} has unknown state {}", row.name, row.state))
        })?;
        let expiry = row
            .expiry
            .as_deref()
            .and_then(ExpiryPolicy::parse)
            .unwrap_or_default();

        Ok(UserKeyRecord {
            username: row.name,
            realname: row.realname,
            state,
            expiration: row.expiration,
            ssh_key_hash: row.ssh_key_hash.unwrap_or_default(),
            ssh_key: row.ssh_key.unwrap_or_default(),
            expiry,
            custom_principals: row.principals.unwrap_or_default(),
        })
    }
}

impl From<RevocationRow> for RevocationEntry {
    fn from(row: RevocationRow) -> Self {
        RevocationEntry {
            ssh_key: row.ssh_key,
            revoked_at: row.revocation_date,
            username: row.username,
        }
    }
}
