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

use crate::config::{types::*, ValidationError};
use crate::database::BackendType;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for SshcaConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = self.main.validate() {
            errors.push(e);
        }
        if let Err(e) = self.database.validate() {
            errors.push(e);
        }
        if let Some(Err(e)) = self.ldap.as_ref().map(Validate::validate) {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for MainConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.ca.as_os_str().is_empty() {
            return Err(ValidationError::InvalidPath {
                path: "main.ca must not be empty".to_string(),
            });
        }
        if self.krl.as_os_str().is_empty() || self.krl.file_name().is_none() {
            return Err(ValidationError::InvalidPath {
                path: self.krl.display().to_string(),
            });
        }
        for peer in &self.cluster {
            match Url::parse(peer) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ValidationError::InvalidPeerUrl { url: peer.clone() });
                }
            }
        }
        Ok(())
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if BackendType::from_url(&self.url).is_none() {
            return Err(ValidationError::InvalidDatabaseUrl {
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

impl Validate for LdapConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout {
                timeout: self.timeout_secs,
            });
        }
        Ok(())
    }
}
