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

//! Security audit logging for SIEM integration.
//!
//! Every state change of a user key, every certificate issued and every
//! failed auth check is logged here with a stable `event_type` and
//! structured fields. Revocations, forced signatures and auth failures are
//! logged at `warn`.

/// Event types.
pub mod events {
    /// New key submitted, record created PENDING.
    pub const KEY_SUBMITTED: &str = "key.submitted";
    /// Existing key replaced, record reset to PENDING.
    pub const KEY_UPDATED: &str = "key.updated";
    /// Submission or signature refused on realname/key mismatch.
    pub const KEY_MISMATCH: &str = "key.mismatch";
    pub const KEY_ACTIVATED: &str = "key.activated";
    pub const KEY_REVOKED: &str = "key.revoked";
    pub const KEY_DELETED: &str = "key.deleted";

    /// Certificate issued from a stored record.
    pub const CERT_ISSUED: &str = "cert.issued";
    /// Certificate issued without the datastore (admin failover).
    pub const CERT_FORCED: &str = "cert.forced";
    /// Sign request answered with the record state instead of a certificate.
    pub const CERT_REFUSED: &str = "cert.refused";

    pub const POLICY_EXPIRY_CHANGED: &str = "policy.expiry.changed";
    pub const POLICY_PRINCIPALS_CHANGED: &str = "policy.principals.changed";

    pub const AUTHENTICATION_FAILED: &str = "auth.authentication.failed";
    pub const AUTHORIZATION_FAILED: &str = "auth.authorization.failed";

    pub const KRL_REGENERATED: &str = "krl.regenerated";
}

pub fn log_key_submitted(username: &str, realname: &str, fingerprint: &str) {
    tracing::info!(
        event_type = events::KEY_SUBMITTED,
        username = %username,
        realname = %realname,
        fingerprint = %fingerprint,
        "Key submitted, pending activation"
    );
}

pub fn log_key_updated(username: &str, realname: &str, fingerprint: &str) {
    tracing::info!(
        event_type = events::KEY_UPDATED,
        username = %username,
        realname = %realname,
        fingerprint = %fingerprint,
        "Key replaced, pending activation"
    );
}

/// Log a realname or key mismatch against the stored record.
pub fn log_key_mismatch(username: &str, realname: &str, reason: &str) {
    tracing::warn!(
        event_type = events::KEY_MISMATCH,
        username = %username,
        realname = %realname,
        reason = %reason,
        "Request does not match stored record"
    );
}

pub fn log_key_activated(username: &str, actor: &str) {
    tracing::info!(
        event_type = events::KEY_ACTIVATED,
        username = %username,
        actor = %actor,
        "Key activated"
    );
}

pub fn log_key_revoked(username: &str, actor: &str, journaled: bool) {
    tracing::warn!(
        event_type = events::KEY_REVOKED,
        username = %username,
        actor = %actor,
        journaled,
        "Key revoked"
    );
}

pub fn log_key_deleted(username: &str, actor: &str) {
    tracing::info!(
        event_type = events::KEY_DELETED,
        username = %username,
        actor = %actor,
        "Key record deleted"
    );
}

pub fn log_certificate_issued(username: &str, fingerprint: &str, validity: &str, principals: &[String]) {
    tracing::info!(
        event_type = events::CERT_ISSUED,
        username = %username,
        fingerprint = %fingerprint,
        validity = %validity,
        principals = %principals.join(","),
        "Certificate issued"
    );
}

pub fn log_certificate_forced(username: &str, actor: &str, fingerprint: &str) {
    tracing::warn!(
        event_type = events::CERT_FORCED,
        username = %username,
        actor = %actor,
        fingerprint = %fingerprint,
        "Certificate issued without datastore (admin failover)"
    );
}

pub fn log_certificate_refused(username: &str, state: &str) {
    tracing::info!(
        event_type = events::CERT_REFUSED,
        username = %username,
        state = %state,
        "Sign request refused, key not active"
    );
}

pub fn log_expiry_changed(username: &str, actor: &str, expiry: &str) {
    tracing::info!(
        event_type = events::POLICY_EXPIRY_CHANGED,
        username = %username,
        actor = %actor,
        expiry = %expiry,
        "Expiry policy changed"
    );
}

pub fn log_principals_changed(username: &str, actor: &str, action: &str, principals: &str) {
    tracing::info!(
        event_type = events::POLICY_PRINCIPALS_CHANGED,
        username = %username,
        actor = %actor,
        action = %action,
        principals = %principals,
        "Custom principals changed"
    );
}

pub fn log_authentication_failed(realname: &str, error: &str) {
    tracing::warn!(
        event_type = events::AUTHENTICATION_FAILED,
        realname = %realname,
        error = %error,
        "Authentication failed"
    );
}

pub fn log_authorization_failed(realname: &str, required_group: &str) {
    tracing::warn!(
        event_type = events::AUTHORIZATION_FAILED,
        realname = %realname,
        required_group = %required_group,
        "Authorization failed, not an admin"
    );
}

pub fn log_krl_regenerated(revoked_at: i64, entries: usize, path: &str) {
    tracing::info!(
        event_type = events::KRL_REGENERATED,
        revoked_at,
        entries,
        path = %path,
        "Revocation list regenerated"
    );
}
