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

//! User key DAL.
//!
//! Operations that check and then mutate a row run inside a single
//! transaction so concurrent requests cannot interleave between the check
//! and the write.

use super::models::{NewUserRow, UserRow};
use super::revocations::journal_revocation;
use super::DAL;
use crate::database::schema::users;
use crate::database::{write_transaction, StoreError};
use crate::models::{ExpiryPolicy, KeyState, UserKeyRecord};
use diesel::prelude::*;

/// Result of a key submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    Updated,
    /// A record exists with a different realname; nothing was written.
    RealnameMismatch,
}

/// Result of revoking an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevokeOutcome {
    /// False when the key was already present in the journal.
    pub journaled: bool,
}

#[derive(Clone)]
pub struct UserKeyDAL<'a> {
    dal: &'a DAL,
}

impl<'a> UserKeyDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn get(&self, username: &str) -> Result<Option<UserKeyRecord>, StoreError> {
        let username = username.to_string();
        let row: Option<UserRow> = self
            .dal
            .database
            .interact(move |conn| {
                users::table
                    .find(username)
                    .select(UserRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await?;
        row.map(UserKeyRecord::try_from).transpose()
    }

    /// Looks a record up by its (case-insensitive) realname.
    pub async fn get_by_realname(
        &self,
        realname: &str,
    ) -> Result<Option<UserKeyRecord>, StoreError> {
        let realname = realname.to_lowercase();
        let row: Option<UserRow> = self
            .dal
            .database
            .interact(move |conn| {
                users::table
                    .filter(users::realname.eq(realname))
                    .select(UserRow::as_select())
                    .order(users::name.asc())
                    .first(conn)
                    .optional()
            })
            .await?;
        row.map(UserKeyRecord::try_from).transpose()
    }

    /// All records ordered by username.
    pub async fn list(&self) -> Result<Vec<UserKeyRecord>, StoreError> {
        let rows: Vec<UserRow> = self
            .dal
            .database
            .interact(|conn| {
                users::table
                    .select(UserRow::as_select())
                    .order(users::name.asc())
                    .load(conn)
            })
            .await?;
        rows.into_iter().map(UserKeyRecord::try_from).collect()
    }

    /// Creates a PENDING record, or replaces the key of an existing one and
    /// resets it to PENDING if the realname matches.
    pub async fn submit(
        &self,
        username: &str,
        realname: &str,
        ssh_key: &str,
        fingerprint: &str,
    ) -> Result<SubmitOutcome, StoreError> {
        let username = username.to_string();
        let realname = realname.to_lowercase();
        let ssh_key = ssh_key.to_string();
        let fingerprint = fingerprint.to_string();

        self.dal
            .database
            .interact(move |conn| {
                write_transaction(conn, |conn| {
                    let stored: Option<String> = users::table
                        .find(&username)
                        .select(users::realname)
                        .first(conn)
                        .optional()?;

                    match stored {
                        None => {
                            diesel::insert_into(users::table)
                                .values(NewUserRow {
                                    name: username.clone(),
                                    realname: realname.clone(),
                                    state: KeyState::Pending.code(),
                                    expiration: 0,
                                    ssh_key_hash: Some(fingerprint.clone()),
                                    ssh_key: Some(ssh_key.clone()),
                                    expiry: Some(ExpiryPolicy::default().to_string()),
                                    principals: Some(String::new()),
                                })
                                .execute(conn)?;
                            Ok(SubmitOutcome::Created)
                        }
                        Some(stored) if stored.to_lowercase() != realname => {
                            Ok(SubmitOutcome::RealnameMismatch)
                        }
                        Some(_) => {
                            diesel::update(users::table.find(&username))
                                .set((
                                    users::ssh_key.eq(Some(ssh_key.clone())),
                                    users::ssh_key_hash.eq(Some(fingerprint.clone())),
                                    users::state.eq(KeyState::Pending.code()),
                                    users::expiration.eq(0i64),
                                ))
                                .execute(conn)?;
                            Ok(SubmitOutcome::Updated)
                        }
                    }
                })
            })
            .await
    }

    /// Moves a record to ACTIVE. Returns the previous state, or `None` if
    /// the user does not exist.
    pub async fn activate(&self, username: &str) -> Result<Option<KeyState>, StoreError> {
        let username = username.to_string();
        let previous: Option<i32> = self
            .dal
            .database
            .interact(move |conn| {
                write_transaction(conn, |conn| {
                    let state: Option<i32> = users::table
                        .find(&username)
                        .select(users::state)
                        .first(conn)
                        .optional()?;
                    if matches!(state, Some(s) if s != KeyState::Active.code()) {
                        diesel::update(users::table.find(&username))
                            .set(users::state.eq(KeyState::Active.code()))
                            .execute(conn)?;
                    }
                    Ok(state)
                })
            })
            .await?;

        previous
            .map(|code| {
                KeyState::from_code(code)
                    .ok_or_else(|| StoreError::Query(format!("unknown state {}", code)))
            })
            .transpose()
    }

    /// Moves a record to REVOKED and journals its current key.
    /// Returns `None` if the user does not exist.
    pub async fn revoke(&self, username: &str) -> Result<Option<RevokeOutcome>, StoreError> {
        let username = username.to_string();
        self.dal
            .database
            .interact(move |conn| {
                write_transaction(conn, |conn| {
                    let key: Option<Option<String>> = users::table
                        .find(&username)
                        .select(users::ssh_key)
                        .first(conn)
                        .optional()?;
                    let Some(key) = key else {
                        return Ok(None);
                    };

                    diesel::update(users::table.find(&username))
                        .set(users::state.eq(KeyState::Revoked.code()))
                        .execute(conn)?;

                    let journaled = match key.as_deref() {
                        Some(key) if !key.is_empty() => journal_revocation(conn, key, &username)?,
                        _ => false,
                    };
                    Ok(Some(RevokeOutcome { journaled }))
                })
            })
            .await
    }

    /// Removes the record. The revocation journal is left untouched.
    pub async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        let username = username.to_string();
        let deleted = self
            .dal
            .database
            .interact(move |conn| diesel::delete(users::table.find(username)).execute(conn))
            .await?;
        Ok(deleted > 0)
    }

    /// Records the end of validity (epoch seconds) of the latest certificate.
    pub async fn set_expiration(&self, username: &str, expiration: i64) -> Result<bool, StoreError> {
        let username = username.to_string();
        let updated = self
            .dal
            .database
            .interact(move |conn| {
                diesel::update(users::table.find(username))
                    .set(users::expiration.eq(expiration))
                    .execute(conn)
            })
            .await?;
        Ok(updated > 0)
    }

    pub async fn set_expiry(&self, username: &str, policy: ExpiryPolicy) -> Result<bool, StoreError> {
        let username = username.to_string();
        let updated = self
            .dal
            .database
            .interact(move |conn| {
                diesel::update(users::table.find(username))
                    .set(users::expiry.eq(Some(policy.to_string())))
                    .execute(conn)
            })
            .await?;
        Ok(updated > 0)
    }

    /// Stores the custom principal list (comma-separated).
    pub async fn set_principals(&self, username: &str, principals: &str) -> Result<bool, StoreError> {
        let username = username.to_string();
        let principals = principals.to_string();
        let updated = self
            .dal
            .database
            .interact(move |conn| {
                diesel::update(users::table.find(username))
                    .set(users::principals.eq(Some(principals)))
                    .execute(conn)
            })
            .await?;
        Ok(updated > 0)
    }
}
