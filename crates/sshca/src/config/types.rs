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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshcaConfig {
    pub main: MainConfig,
    pub database: DatabaseConfig,
    /// Directory integration. Absent means every auth check is permitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap: Option<LdapConfig>,
    /// Directory group identifier to the principals it grants.
    #[serde(default)]
    pub principals: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    /// CA private key. The public key is expected next to it as `<ca>.pub`.
    pub ca: PathBuf,
    /// Well-known path of the current KRL.
    pub krl: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub admin_db_failover: bool,
    /// Peer base URLs. Empty means standalone.
    #[serde(default)]
    pub cluster: Vec<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_ssh_keygen")]
    pub ssh_keygen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// `ldap://` / `ldaps://` URL, or a bare host name.
    pub host: String,
    /// Search base for user lookups.
    pub bind_dn: String,
    /// Admin group identifier, as it appears in the membership attribute.
    pub admin_cn: String,
    /// Attribute holding the user's realname, e.g. `userPrincipalName`.
    pub filterstr: String,
    pub service_dn: String,
    pub service_password: String,
    #[serde(default = "default_memberof_attribute")]
    pub memberof_attribute: String,
    #[serde(default = "default_ldap_timeout")]
    pub timeout_secs: u64,
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_ssh_keygen() -> String {
    "ssh-keygen".to_string()
}

pub(crate) fn default_memberof_attribute() -> String {
    "memberOf".to_string()
}

pub(crate) fn default_ldap_timeout() -> u64 {
    5
}

impl MainConfig {
    /// Peers to probe. A node without a cluster list probes only itself.
    pub fn peers(&self) -> Vec<String> {
        if self.cluster.is_empty() {
            vec![format!("http://localhost:{}", self.port)]
        } else {
            self.cluster.clone()
        }
    }
}

impl LdapConfig {
    /// Connection URL, adding the `ldap://` scheme to a bare host.
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("ldap://{}", self.host)
        }
    }
}
