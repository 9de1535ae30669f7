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

//! Domain model for a user's SSH key record.
//!
//! There is exactly one key per username. The record is created PENDING by
//! a key submission and only moves between states through the lifecycle
//! engine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyState {
    Active,
    Revoked,
    Pending,
}

impl KeyState {
    /// Integer encoding stored in the `users.state` column.
    pub fn code(self) -> i32 {
        match self {
            KeyState::Active => 0,
            KeyState::Revoked => 1,
            KeyState::Pending => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(KeyState::Active),
            1 => Some(KeyState::Revoked),
            2 => Some(KeyState::Pending),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyState::Active => "ACTIVE",
            KeyState::Revoked => "REVOKED",
            KeyState::Pending => "PENDING",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of an [`ExpiryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryUnit {
    Hours,
    Days,
}

/// Certificate validity applied when a user's key is signed, e.g. `+12h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpiryPolicy {
    pub amount: u32,
    pub unit: ExpiryUnit,
}

impl ExpiryPolicy {
    pub const fn hours(amount: u32) -> Self {
        Self {
            amount,
            unit: ExpiryUnit::Hours,
        }
    }

    pub const fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: ExpiryUnit::Days,
        }
    }

    /// Parses `12h`, `30d`, or the stored form with a leading `+`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.strip_prefix('+').unwrap_or(value);
        let (digits, unit) = match value.char_indices().last()? {
            (idx, 'h') => (&value[..idx], ExpiryUnit::Hours),
            (idx, 'd') => (&value[..idx], ExpiryUnit::Days),
            _ => return None,
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let amount = digits.parse().ok()?;
        let policy = Self { amount, unit };
        policy.expires_at(Utc::now())?;
        Some(policy)
    }

    /// Validity interval, or `None` when it does not fit a `Duration`.
    pub fn duration(&self) -> Option<Duration> {
        match self.unit {
            ExpiryUnit::Hours => Duration::try_hours(self.amount as i64),
            ExpiryUnit::Days => Duration::try_days(self.amount as i64),
        }
    }

    /// Expiration of a certificate issued at `issued`, or `None` when it
    /// falls outside the representable date range.
    pub fn expires_at(&self, issued: DateTime<Utc>) -> Option<DateTime<Utc>> {
        issued.checked_add_signed(self.duration()?)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::hours(12)
    }
}

/// Renders the validity interval the signing tool expects (`+12h`).
impl fmt::Display for ExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            ExpiryUnit::Hours => 'h',
            ExpiryUnit::Days => 'd',
        };
        write!(f, "+{}{}", self.amount, unit)
    }
}

/// A stored user key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKeyRecord {
    pub username: String,
    /// Lower-cased directory identity.
    pub realname: String,
    pub state: KeyState,
    /// Epoch seconds of the last signature's end of validity, 0 if never signed.
    pub expiration: i64,
    pub ssh_key_hash: String,
    pub ssh_key: String,
    pub expiry: ExpiryPolicy,
    /// Comma-separated custom principals, possibly empty.
    pub custom_principals: String,
}

impl UserKeyRecord {
    pub fn is_signable(&self) -> bool {
        self.state == KeyState::Active
    }

    pub fn realname_matches(&self, realname: &str) -> bool {
        self.realname == realname.to_lowercase()
    }

    pub fn expiration_display(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.expiration, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Parsed form of a stored key fingerprint (`256 SHA512:abc... (ED25519)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFingerprint {
    pub bits: u32,
    pub hash: String,
    pub auth_type: String,
    pub rate: &'static str,
}

impl KeyFingerprint {
    pub fn parse(fingerprint: &str) -> Self {
        let mut parts = fingerprint.split_whitespace();
        let bits = parts.next().and_then(|b| b.parse().ok()).unwrap_or(0);
        let hash = parts.next().unwrap_or(fingerprint).to_string();
        let auth_type = fingerprint
            .rsplit('(')
            .next()
            .and_then(|tail| tail.split(')').next())
            .unwrap_or("Unknown")
            .to_string();
        let rate = Self::rate(&auth_type, bits);

        Self {
            bits,
            hash,
            auth_type,
            rate,
        }
    }

    fn rate(auth_type: &str, bits: u32) -> &'static str {
        match auth_type {
            "DSA" => "VERY LOW",
            "RSA" if bits >= 4096 => "HIGH",
            "ECDSA" if bits >= 256 => "HIGH",
            "RSA" if bits >= 2048 => "MEDIUM",
            "RSA" => "LOW",
            "ED25519" if bits >= 256 => "VERY HIGH",
            _ => "UNKNOWN",
        }
    }
}

/// Status view of a record, with principals already resolved.
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub username: String,
    pub realname: String,
    pub status: KeyState,
    pub expiration: String,
    pub ssh_key_hash: KeyFingerprint,
    pub expiry: String,
    pub principals: Vec<String>,
}

impl KeyStatus {
    pub fn new(record: &UserKeyRecord, principals: Vec<String>) -> Self {
        Self {
            username: record.username.clone(),
            realname: record.realname.clone(),
            status: record.state,
            expiration: record.expiration_display(),
            ssh_key_hash: KeyFingerprint::parse(&record.ssh_key_hash),
            expiry: record.expiry.to_string(),
            principals,
        }
    }
}
