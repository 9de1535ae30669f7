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

use super::{Directory, DirectoryError};
use crate::config::LdapConfig;
use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// LDAP result code for a failed simple bind.
const INVALID_CREDENTIALS: u32 = 49;

/// [`Directory`] backed by an LDAP server.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    config: LdapConfig,
}

impl LdapDirectory {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Bounds `fut` by the configured timeout.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Result<T, DirectoryError> {
        tokio::time::timeout(self.timeout(), fut)
            .await
            .map_err(|_| DirectoryError::Timeout(self.config.timeout_secs))?
    }

    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout());
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url())
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    async fn bind(ldap: &mut Ldap, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let result = ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        match result.rc {
            0 => Ok(()),
            INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials(dn.to_string())),
            rc => Err(DirectoryError::Unreachable(format!(
                "bind failed with rc={}: {}",
                rc, result.text
            ))),
        }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn authenticate(&self, realname: &str, password: &str) -> Result<(), DirectoryError> {
        // An empty password would be an anonymous bind and always succeed.
        if password.is_empty() {
            return Err(DirectoryError::InvalidCredentials(realname.to_string()));
        }

        self.bounded(async {
            let mut ldap = self.connect().await?;
            let outcome = Self::bind(&mut ldap, realname, password).await;
            if let Err(e) = ldap.unbind().await {
                debug!(error = %e, "LDAP unbind failed");
            }
            outcome
        })
        .await
    }

    async fn groups(&self, realname: &str) -> Result<Vec<String>, DirectoryError> {
        self.bounded(async {
            let mut ldap = self.connect().await?;
            Self::bind(&mut ldap, &self.config.service_dn, &self.config.service_password).await?;

            let filter = format!("({}={})", self.config.filterstr, ldap_escape(realname));
            let (entries, _) = ldap
                .search(
                    &self.config.bind_dn,
                    Scope::Subtree,
                    &filter,
                    vec![self.config.memberof_attribute.as_str()],
                )
                .await
                .map_err(|e| DirectoryError::Search(e.to_string()))?
                .success()
                .map_err(|e| DirectoryError::Search(e.to_string()))?;

            if let Err(e) = ldap.unbind().await {
                debug!(error = %e, "LDAP unbind failed");
            }

            let mut groups = Vec::new();
            for entry in entries {
                let entry = SearchEntry::construct(entry);
                if let Some(values) = entry.attrs.get(&self.config.memberof_attribute) {
                    groups.extend(values.iter().cloned());
                }
            }
            if groups.is_empty() {
                warn!(realname = %realname, "No directory groups found");
            }
            Ok(groups)
        })
        .await
    }
}
