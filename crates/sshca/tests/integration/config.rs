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

//! Wiring an engine from a configuration file.

use serial_test::serial;
use sshca::engine::{AdminAction, KeyRequest};
use sshca::{ConfigLoader, Engine};
use tempfile::TempDir;

fn write_config(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let path = dir.path().join("sshca.toml");
    let content = format!(
        r#"
[main]
ca = "{dir}/ca"
krl = "{dir}/revoked-keys"
port = 8443
ssh_keygen = "/nonexistent/ssh-keygen"

[database]
url = "${{SSHCA_TEST_DATABASE_URL:-sqlite://{dir}/fallback.db}}"

[principals]
"CN=deployers,OU=Groups,DC=example,DC=com" = ["deploy", "bad principal"]
{extra}
"#,
        dir = dir.path().display(),
        extra = extra
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
#[serial]
async fn test_engine_from_config_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("configured.db");
    std::env::set_var("SSHCA_TEST_DATABASE_URL", db.display().to_string());

    let path = write_config(&dir, "");
    let config = ConfigLoader::new().load_config(Some(&path)).unwrap();
    std::env::remove_var("SSHCA_TEST_DATABASE_URL");

    assert_eq!(config.database.url, db.display().to_string());
    assert_eq!(config.main.peers(), vec!["http://localhost:8443".to_string()]);
    assert!(config.ldap.is_none());

    let engine = Engine::from_config(&config).unwrap();
    engine.run_migrations().await.unwrap();
    assert!(db.exists());

    std::fs::write(dir.path().join("ca.pub"), "ssh-ed25519 AAAACA ca\n").unwrap();
    assert_eq!(
        engine.ca_public_key().await.unwrap(),
        b"ssh-ed25519 AAAACA ca\n"
    );
    assert!(!engine.gate().is_enabled());

    // The configured signing tool does not exist, so no key can be fingerprinted.
    let request = KeyRequest::new("bob", "bob@example.com", "", "ssh-ed25519 AAAA bob");
    let err = engine.submit_key(&request).await.unwrap_err();
    assert_eq!(err.http_status(), 422);

    let err = engine
        .admin_action(&Default::default(), "bob", AdminAction::Activate)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
#[serial]
async fn test_env_default_is_used_when_unset() {
    let dir = TempDir::new().unwrap();
    std::env::remove_var("SSHCA_TEST_DATABASE_URL");

    let path = write_config(&dir, "");
    let config = ConfigLoader::new().load_config(Some(&path)).unwrap();
    assert_eq!(
        config.database.url,
        format!("sqlite://{}/fallback.db", dir.path().display())
    );
}

#[cfg(feature = "ldap")]
#[tokio::test]
#[serial]
async fn test_directory_section_enables_auth_gate() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[ldap]
host = "ldap.example.com"
bind_dn = "OU=People,DC=example,DC=com"
admin_cn = "CN=ssh-admins,OU=Groups,DC=example,DC=com"
filterstr = "userPrincipalName"
service_dn = "CN=svc-sshca,DC=example,DC=com"
service_password = "secret"
"#,
    );
    let config = ConfigLoader::new().load_config(Some(&path)).unwrap();
    let ldap = config.ldap.as_ref().unwrap();
    assert_eq!(ldap.url(), "ldap://ldap.example.com");
    assert_eq!(ldap.memberof_attribute, "memberOf");

    let engine = Engine::from_config(&config).unwrap();
    assert!(engine.gate().is_enabled());

    let err = engine.test_auth(&Default::default()).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}
