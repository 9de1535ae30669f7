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

//! Revocation list cache.
//!
//! A KRL is rebuilt from the revocation journal only when the journal's
//! latest timestamp changes. The build lands in `<krl>.<timestamp>`, is
//! copied over the well-known `<krl>` path with an atomic rename, and every
//! older `<krl>.<timestamp>` file is removed. The file name is a pure
//! function of the timestamp, so two nodes or requests racing on the same
//! regeneration produce the same bytes.

use crate::audit;
use crate::authority::{SigningAuthority, SigningError};
use crate::dal::DAL;
use crate::error::CaError;
use crate::models::RevocationEntry;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct RevocationCache {
    krl: PathBuf,
    authority: Arc<dyn SigningAuthority>,
}

impl RevocationCache {
    pub fn new(krl: impl Into<PathBuf>, authority: Arc<dyn SigningAuthority>) -> Self {
        Self {
            krl: krl.into(),
            authority,
        }
    }

    /// Well-known path of the current KRL.
    pub fn path(&self) -> &Path {
        &self.krl
    }

    fn directory(&self) -> PathBuf {
        match self.krl.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn file_name(&self) -> String {
        self.krl
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Cache file for a given latest revocation timestamp.
    pub fn versioned_path(&self, revoked_at: i64) -> PathBuf {
        self.directory()
            .join(format!("{}.{}", self.file_name(), revoked_at))
    }

    /// Returns the KRL reflecting every journaled revocation.
    pub async fn current_krl(&self, dal: &DAL) -> Result<Vec<u8>, CaError> {
        let Some(latest) = dal.revocations().latest_timestamp().await? else {
            self.ensure_static_krl().await?;
            return Ok(tokio::fs::read(&self.krl).await.map_err(SigningError::Io)?);
        };

        let versioned = self.versioned_path(latest);
        if tokio::fs::try_exists(&versioned)
            .await
            .map_err(SigningError::Io)?
        {
            debug!(path = %versioned.display(), "Serving cached KRL");
        } else {
            let entries = dal.revocations().list().await?;
            self.regenerate(&versioned, &entries).await?;
            audit::log_krl_regenerated(latest, entries.len(), &versioned.display().to_string());
        }

        self.prune(&versioned);
        Ok(tokio::fs::read(&versioned).await.map_err(SigningError::Io)?)
    }

    /// Materialises an empty KRL at the well-known path if it does not exist.
    pub async fn ensure_static_krl(&self) -> Result<(), SigningError> {
        if tokio::fs::try_exists(&self.krl).await? {
            return Ok(());
        }
        let staging = NamedTempFile::new_in(self.directory())?;
        self.authority.generate_empty_krl(staging.path()).await?;
        staging
            .persist(&self.krl)
            .map_err(|e| SigningError::Io(e.error))?;
        debug!(path = %self.krl.display(), "Created empty KRL");
        Ok(())
    }

    /// Builds `versioned` from the journal and installs it as the current KRL.
    async fn regenerate(
        &self,
        versioned: &Path,
        entries: &[RevocationEntry],
    ) -> Result<(), SigningError> {
        let dir = self.directory();
        let staging = NamedTempFile::new_in(&dir)?;
        self.authority.generate_empty_krl(staging.path()).await?;

        let keys = TempDir::new()?;
        for (idx, entry) in entries.iter().enumerate() {
            let key_file = keys.path().join(format!("revoked-{}.pub", idx));
            tokio::fs::write(&key_file, entry.ssh_key.as_bytes()).await?;
            self.authority.revoke_key(staging.path(), &key_file).await?;
        }

        staging
            .persist(versioned)
            .map_err(|e| SigningError::Io(e.error))?;

        let bytes = tokio::fs::read(versioned).await?;
        let mut current = NamedTempFile::new_in(&dir)?;
        current.write_all(&bytes)?;
        current.flush()?;
        current
            .persist(&self.krl)
            .map_err(|e| SigningError::Io(e.error))?;
        Ok(())
    }

    /// Removes every cached `<krl>.<timestamp>` file except `keep`.
    fn prune(&self, keep: &Path) {
        let prefix = format!("{}.", self.file_name());
        let Ok(entries) = std::fs::read_dir(self.directory()) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path == keep {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_cache_file = name
                .strip_prefix(&prefix)
                .is_some_and(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()));
            if is_cache_file {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to prune stale KRL");
                }
            }
        }
    }
}
