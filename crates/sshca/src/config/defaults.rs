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

use crate::config::types::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

impl Default for SshcaConfig {
    fn default() -> Self {
        Self {
            main: MainConfig::default(),
            database: DatabaseConfig::default(),
            ldap: None,
            principals: BTreeMap::new(),
        }
    }
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            ca: PathBuf::from("/etc/sshca/ca"),
            krl: PathBuf::from("/etc/sshca/revoked-keys"),
            port: default_port(),
            admin_db_failover: false,
            cluster: Vec::new(),
            debug: false,
            ssh_keygen: default_ssh_keygen(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "${SSHCA_DATABASE_URL:-sqlite:///var/lib/sshca/sshca.db}".to_string(),
        }
    }
}

/// Generate a complete default configuration as TOML string
pub fn generate_default_config_toml() -> Result<String, toml::ser::Error> {
    let config = SshcaConfig::default();
    toml::to_string_pretty(&config)
}
