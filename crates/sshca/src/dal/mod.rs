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

//! Data access layer for the key store.
//!
//! Queries are written once against [`AnyConnection`](crate::database::AnyConnection)
//! and run through [`Database::interact`], so each DAL call opens and closes
//! its own connection.

pub mod models;
mod revocations;
mod users;

pub use revocations::RevocationDAL;
pub use users::{RevokeOutcome, SubmitOutcome, UserKeyDAL};

use crate::database::Database;

/// Entry point to the per-table DALs.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn users(&self) -> UserKeyDAL<'_> {
        UserKeyDAL::new(self)
    }

    pub fn revocations(&self) -> RevocationDAL<'_> {
        RevocationDAL::new(self)
    }
}
