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

//! Signing authority abstraction.
//!
//! The cryptography is delegated to an external tool. [`SigningAuthority`]
//! is the seam the engine talks to; [`SshKeygenAuthority`] drives
//! `ssh-keygen`, and tests substitute their own implementation.

use crate::models::ExpiryPolicy;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors raised while driving the signing tool.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The tool could not be started at all.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}: {stderr}")]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool succeeded but its output could not be used.
    #[error("unexpected output from signing tool: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output captured from one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Capability interface to the external signer.
#[async_trait]
pub trait SigningAuthority: Send + Sync {
    /// Fingerprint of a public key file, e.g. `256 SHA512:... user@host (ED25519)`.
    async fn fingerprint(&self, key_file: &Path) -> Result<String, SigningError>;

    /// Signs `key_file` and returns the certificate contents.
    async fn sign_user_key(
        &self,
        key_file: &Path,
        identity: &str,
        validity: &ExpiryPolicy,
        principals: &[String],
    ) -> Result<Vec<u8>, SigningError>;

    /// Creates (or truncates to) an empty revocation list at `krl`.
    async fn generate_empty_krl(&self, krl: &Path) -> Result<(), SigningError>;

    /// Adds the public key in `key_file` to the revocation list at `krl`.
    async fn revoke_key(&self, krl: &Path, key_file: &Path) -> Result<(), SigningError>;

    /// Path of the CA public key.
    fn ca_public_key_path(&self) -> PathBuf;
}

/// Where `ssh-keygen -s` writes the certificate for `key_file`:
/// `id.pub` becomes `id-cert.pub`.
pub fn certificate_path(key_file: &Path) -> PathBuf {
    let file_name = key_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(".pub").unwrap_or(&file_name);
    key_file.with_file_name(format!("{}-cert.pub", stem))
}

/// [`SigningAuthority`] backed by the `ssh-keygen` binary.
#[derive(Debug, Clone)]
pub struct SshKeygenAuthority {
    program: String,
    ca_key: PathBuf,
}

impl SshKeygenAuthority {
    pub fn new(program: impl Into<String>, ca_key: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ca_key: ca_key.into(),
        }
    }

    async fn run(&self, args: &[&OsStr]) -> Result<ToolOutput, SigningError> {
        debug!(program = %self.program, ?args, "Invoking signing tool");
        let output: ToolOutput = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|source| SigningError::Spawn {
                program: self.program.clone(),
                source,
            })?
            .into();

        if !output.success {
            return Err(SigningError::ExitStatus {
                program: self.program.clone(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl SigningAuthority for SshKeygenAuthority {
    async fn fingerprint(&self, key_file: &Path) -> Result<String, SigningError> {
        let output = self
            .run(&[
                OsStr::new("-l"),
                OsStr::new("-E"),
                OsStr::new("sha512"),
                OsStr::new("-f"),
                key_file.as_os_str(),
            ])
            .await?;

        let fingerprint = output.stdout.trim();
        if fingerprint.is_empty() {
            return Err(SigningError::Output("empty fingerprint".to_string()));
        }
        Ok(fingerprint.to_string())
    }

    async fn sign_user_key(
        &self,
        key_file: &Path,
        identity: &str,
        validity: &ExpiryPolicy,
        principals: &[String],
    ) -> Result<Vec<u8>, SigningError> {
        let validity = validity.to_string();
        let principals = principals.join(",");
        self.run(&[
            OsStr::new("-s"),
            self.ca_key.as_os_str(),
            OsStr::new("-I"),
            OsStr::new(identity),
            OsStr::new("-V"),
            OsStr::new(&validity),
            OsStr::new("-n"),
            OsStr::new(&principals),
            key_file.as_os_str(),
        ])
        .await?;

        let cert_path = certificate_path(key_file);
        tokio::fs::read(&cert_path).await.map_err(|e| {
            SigningError::Output(format!("certificate {} unreadable: {}", cert_path.display(), e))
        })
    }

    async fn generate_empty_krl(&self, krl: &Path) -> Result<(), SigningError> {
        self.run(&[OsStr::new("-k"), OsStr::new("-f"), krl.as_os_str()])
            .await?;
        Ok(())
    }

    async fn revoke_key(&self, krl: &Path, key_file: &Path) -> Result<(), SigningError> {
        self.run(&[
            OsStr::new("-k"),
            OsStr::new("-f"),
            krl.as_os_str(),
            OsStr::new("-u"),
            OsStr::new("-s"),
            self.ca_key.as_os_str(),
            key_file.as_os_str(),
        ])
        .await?;
        Ok(())
    }

    fn ca_public_key_path(&self) -> PathBuf {
        let mut path = self.ca_key.clone().into_os_string();
        path.push(".pub");
        PathBuf::from(path)
    }
}
