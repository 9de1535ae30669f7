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

//! Revocation journal DAL.
//!
//! The journal is append-only: entries are inserted by [`journal_revocation`]
//! and never updated or deleted.

use super::models::RevocationRow;
use super::DAL;
use crate::database::schema::revocation;
use crate::database::{write_transaction, AnyConnection, StoreError};
use crate::models::RevocationEntry;
use chrono::Utc;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Appends `ssh_key` to the journal unless it is already present.
///
/// Must run inside [`write_transaction`]. The timestamp is forced strictly
/// greater than the current maximum so every new entry changes the KRL cache
/// key. Returns whether a row was inserted; losing an insert race to another
/// revocation of the same key counts as already journaled.
pub(crate) fn journal_revocation(
    conn: &mut AnyConnection,
    ssh_key: &str,
    username: &str,
) -> QueryResult<bool> {
    let existing: i64 = revocation::table
        .filter(revocation::ssh_key.eq(ssh_key))
        .count()
        .get_result(conn)?;
    if existing > 0 {
        return Ok(false);
    }

    let latest: Option<i64> = revocation::table
        .select(max(revocation::revocation_date))
        .first(conn)?;
    let now = Utc::now().timestamp_micros();
    let revocation_date = match latest {
        Some(latest) if latest >= now => latest + 1,
        _ => now,
    };

    let row = RevocationRow {
        ssh_key: ssh_key.to_string(),
        revocation_date,
        username: username.to_string(),
    };
    // savepoint, so a concurrent insert of the same key leaves the outer transaction usable
    let inserted = conn.transaction(|conn| {
        diesel::insert_into(revocation::table)
            .values(&row)
            .execute(conn)
    });
    match inserted {
        Ok(_) => Ok(true),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Data access layer for the revocation journal.
#[derive(Clone)]
pub struct RevocationDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RevocationDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Appends an entry if the key is not already journaled.
    pub async fn record(&self, ssh_key: &str, username: &str) -> Result<bool, StoreError> {
        let ssh_key = ssh_key.to_string();
        let username = username.to_string();
        self.dal
            .database
            .interact(move |conn| {
                write_transaction(conn, |conn| journal_revocation(conn, &ssh_key, &username))
            })
            .await
    }

    /// Latest revocation timestamp (epoch microseconds), if any entry exists.
    pub async fn latest_timestamp(&self) -> Result<Option<i64>, StoreError> {
        self.dal
            .database
            .interact(|conn| {
                revocation::table
                    .select(max(revocation::revocation_date))
                    .first(conn)
            })
            .await
    }

    /// Every journaled entry, oldest first.
    pub async fn list(&self) -> Result<Vec<RevocationEntry>, StoreError> {
        let rows: Vec<RevocationRow> = self
            .dal
            .database
            .interact(|conn| {
                revocation::table
                    .select(RevocationRow::as_select())
                    .order(revocation::revocation_date.asc())
                    .load(conn)
            })
            .await?;
        Ok(rows.into_iter().map(RevocationEntry::from).collect())
    }

    pub async fn count_for_key(&self, ssh_key: &str) -> Result<i64, StoreError> {
        let ssh_key = ssh_key.to_string();
        self.dal
            .database
            .interact(move |conn| {
                revocation::table
                    .filter(revocation::ssh_key.eq(ssh_key))
                    .count()
                    .get_result(conn)
            })
            .await
    }
}
