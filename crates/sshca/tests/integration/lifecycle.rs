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

//! End-to-end key lifecycle: submit, activate, sign, revoke, delete.

use crate::fixtures::*;
use sshca::auth::Credentials;
use sshca::engine::{AdminAction, FieldUpdate, KeyRequest, SignOutcome, StatusReport, StatusTarget};
use sshca::models::{ExpiryPolicy, KeyState};
use sshca::validation::ValidationError;
use sshca::CaError;

fn bob(key: &str) -> KeyRequest {
    KeyRequest::new("bob", "bob@example.com", "bob-pw", key)
}

async fn directory_ca() -> TestCa {
    TestCa::builder()
        .directory(example_directory())
        .mapping(example_mapping())
        .build()
        .await
}

#[tokio::test]
async fn test_full_lifecycle() {
    let ca = directory_ca().await;
    let admin = admin_credentials();

    let msg = ca.engine.submit_key(&bob(BOB_KEY)).await.unwrap();
    assert_eq!(msg, "Create user=bob. Pending request.");

    let outcome = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap();
    assert_eq!(outcome, SignOutcome::Status(KeyState::Pending));
    assert_eq!(outcome.to_string(), "Status: PENDING");
    assert!(ca.authority.signed().is_empty());

    let msg = ca
        .engine
        .admin_action(&admin, "bob", AdminAction::Activate)
        .await
        .unwrap();
    assert_eq!(msg, "Active user=bob. SSH Key active but need to be signed.");

    let outcome = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap();
    assert_eq!(
        outcome.certificate().unwrap(),
        b"CERT bob +12h bob,deploy,ci\n"
    );
    let calls = ca.authority.signed();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].principals, vec!["bob", "deploy", "ci"]);

    let status = ca
        .engine
        .status(&Credentials::new("bob@example.com", "bob-pw"))
        .await
        .unwrap();
    assert_eq!(status.status, KeyState::Active);
    assert_ne!(status.expiration, "1970-01-01 00:00:00");
    assert_eq!(status.ssh_key_hash.auth_type, "ED25519");
    assert_eq!(status.ssh_key_hash.rate, "VERY HIGH");

    let msg = ca
        .engine
        .admin_action(&admin, "bob", AdminAction::Revoke)
        .await
        .unwrap();
    assert_eq!(msg, "Revoke user=bob.");

    let outcome = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap();
    assert_eq!(outcome, SignOutcome::Status(KeyState::Revoked));

    let krl = String::from_utf8(ca.engine.current_krl().await.unwrap()).unwrap();
    assert!(krl.contains(BOB_KEY));
}

#[tokio::test]
async fn test_resubmission_resets_to_pending() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;

    let msg = ca.engine.submit_key(&bob(BOB_NEW_KEY)).await.unwrap();
    assert_eq!(msg, "Update user=bob. Pending request.");

    let record = ca.engine.dal().users().get("bob").await.unwrap().unwrap();
    assert_eq!(record.state, KeyState::Pending);
    assert_eq!(record.ssh_key, BOB_NEW_KEY);
    assert_eq!(record.expiration, 0);
}

#[tokio::test]
async fn test_realname_mismatch_does_not_mutate() {
    let ca = directory_ca().await;
    ca.engine.submit_key(&bob(BOB_KEY)).await.unwrap();

    let intruder = KeyRequest::new("bob", "alice@example.com", "alice-pw", ALICE_KEY);
    let err = ca.engine.submit_key(&intruder).await.unwrap_err();
    assert!(matches!(err, CaError::Conflict(_)));
    assert_eq!(err.to_string(), "Error: (username, realname) couple mismatch.");

    let record = ca.engine.dal().users().get("bob").await.unwrap().unwrap();
    assert_eq!(record.realname, "bob@example.com");
    assert_eq!(record.ssh_key, BOB_KEY);

    let err = ca.engine.sign(&intruder, false).await.unwrap_err();
    assert!(matches!(err, CaError::Conflict(_)));
}

#[tokio::test]
async fn test_sign_rejects_other_key() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;

    let err = ca.engine.sign(&bob(BOB_NEW_KEY), false).await.unwrap_err();
    assert_eq!(err.http_status(), 409);
    assert!(ca.authority.signed().is_empty());
}

#[tokio::test]
async fn test_sign_unknown_user() {
    let ca = TestCa::new().await;
    let err = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap_err();
    assert_eq!(err.to_string(), "Error: User or Key absent, add your key again.");
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_unprocessable_key_is_not_stored() {
    let ca = TestCa::new().await;
    let err = ca.engine.submit_key(&bob(BAD_KEY)).await.unwrap_err();
    assert!(matches!(
        err,
        CaError::Validation(ValidationError::UnprocessableKey)
    ));
    assert_eq!(err.http_status(), 422);
    assert!(ca.engine.dal().users().get("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_username_is_rejected_before_store() {
    let ca = TestCa::new().await;
    for username in ["Bob", "bob1", "all", ""] {
        let request = KeyRequest::new(username, "bob@example.com", "", BOB_KEY);
        let err = ca.engine.submit_key(&request).await.unwrap_err();
        assert_eq!(err.kind(), "validation", "username {:?}", username);
    }
    assert!(ca.engine.dal().users().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_password_is_authentication_error() {
    let ca = directory_ca().await;
    let request = KeyRequest::new("bob", "bob@example.com", "wrong", BOB_KEY);
    let err = ca.engine.submit_key(&request).await.unwrap_err();
    assert!(matches!(err, CaError::Authentication(_)));
    assert!(ca.engine.dal().users().get("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_operations_require_admin_group() {
    let ca = directory_ca().await;
    ca.engine.submit_key(&bob(BOB_KEY)).await.unwrap();

    let err = ca
        .engine
        .admin_action(
            &Credentials::new("bob@example.com", "bob-pw"),
            "bob",
            AdminAction::Activate,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Error: user bob@example.com is not an admin.");

    let record = ca.engine.dal().users().get("bob").await.unwrap().unwrap();
    assert_eq!(record.state, KeyState::Pending);
}

#[tokio::test]
async fn test_activate_is_idempotent() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;

    let msg = ca
        .engine
        .admin_action(&admin_credentials(), "bob", AdminAction::Activate)
        .await
        .unwrap();
    assert_eq!(msg, "user=bob already active. Nothing done.");
}

#[tokio::test]
async fn test_revoked_key_can_be_reactivated() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;
    ca.engine
        .admin_action(&admin, "bob", AdminAction::Revoke)
        .await
        .unwrap();

    let msg = ca
        .engine
        .admin_action(&admin, "bob", AdminAction::Activate)
        .await
        .unwrap();
    assert_eq!(msg, "Active user=bob. SSH Key active but need to be signed.");
    assert!(ca.engine.sign(&bob(BOB_KEY), false).await.unwrap().certificate().is_some());
}

#[tokio::test]
async fn test_delete_keeps_revocation_journal() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;
    ca.engine
        .admin_action(&admin, "bob", AdminAction::Revoke)
        .await
        .unwrap();

    let msg = ca
        .engine
        .admin_action(&admin, "bob", AdminAction::Delete)
        .await
        .unwrap();
    assert_eq!(msg, "OK");

    let err = ca
        .engine
        .admin_status(&admin, &StatusTarget::User("bob".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, CaError::NotFound(_)));
    assert_eq!(
        ca.engine.dal().revocations().count_for_key(BOB_KEY).await.unwrap(),
        1
    );

    let err = ca
        .engine
        .admin_action(&admin, "bob", AdminAction::Delete)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Error: User does not exists.");
}

#[tokio::test]
async fn test_expiry_policy_applies_to_next_certificate() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;

    let msg = ca
        .engine
        .admin_update(
            &admin_credentials(),
            "bob",
            FieldUpdate::SetExpiry(ExpiryPolicy::days(7)),
        )
        .await
        .unwrap();
    assert_eq!(msg, "OK: expiry=+7d for bob");

    let cert = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap();
    assert_eq!(cert.certificate().unwrap(), b"CERT bob +7d bob\n");
}

#[tokio::test]
async fn test_unrepresentable_expiry_is_refused() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;

    let err = ca
        .engine
        .admin_update(
            &admin_credentials(),
            "bob",
            FieldUpdate::SetExpiry(ExpiryPolicy::days(4_000_000_000)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CaError::Validation(ValidationError::InvalidExpiry(ref v)) if v == "+4000000000d"
    ));

    let record = ca.engine.dal().users().get("bob").await.unwrap().unwrap();
    assert_eq!(record.expiry, ExpiryPolicy::default());

    let cert = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap();
    assert_eq!(cert.certificate().unwrap(), b"CERT bob +12h bob\n");
}

#[tokio::test]
async fn test_stored_unrepresentable_expiry_does_not_break_signing() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;
    assert!(ca
        .engine
        .dal()
        .users()
        .set_expiry("bob", ExpiryPolicy::days(4_000_000_000))
        .await
        .unwrap());

    let cert = ca.engine.sign(&bob(BOB_KEY), false).await.unwrap();
    assert_eq!(cert.certificate().unwrap(), b"CERT bob +12h bob\n");

    let record = ca.engine.dal().users().get("bob").await.unwrap().unwrap();
    assert!(record.expiration > chrono::Utc::now().timestamp());
}

#[tokio::test]
async fn test_admin_status_all() {
    let ca = TestCa::new().await;
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;
    ca.engine
        .submit_key(&KeyRequest::new("alice", "alice@example.com", "", ALICE_KEY))
        .await
        .unwrap();

    let report = ca
        .engine
        .admin_status(&admin_credentials(), &StatusTarget::All)
        .await
        .unwrap();
    let StatusReport::All(all) = report else {
        panic!("expected every record");
    };
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["alice", "bob"]);
    assert_eq!(all["alice"].status, KeyState::Pending);
    assert_eq!(all["bob"].status, KeyState::Active);

    let json = serde_json::to_value(&all["bob"]).unwrap();
    assert_eq!(json["status"], "ACTIVE");
    assert_eq!(json["expiry"], "+12h");
    assert_eq!(json["principals"], serde_json::json!(["bob"]));
}

#[tokio::test]
async fn test_forced_sign_when_store_unavailable() {
    let ca = TestCa::builder()
        .directory(example_directory())
        .unmigrated()
        .admin_db_failover(true)
        .build()
        .await;

    let request = KeyRequest::new("root", "admin@example.com", "admin-pw", BOB_KEY);
    let outcome = ca.engine.sign(&request, true).await.unwrap();
    assert_eq!(outcome.certificate().unwrap(), b"CERT root +12h root\n");

    let err = ca.engine.sign(&request, false).await.unwrap_err();
    assert_eq!(err.to_string(), "Error: Need to create database table users");
    assert_eq!(err.http_status(), 503);
}

#[tokio::test]
async fn test_forced_sign_refused_for_non_admin() {
    let ca = TestCa::builder()
        .directory(example_directory())
        .unmigrated()
        .admin_db_failover(true)
        .build()
        .await;

    let err = ca.engine.sign(&bob(BOB_KEY), true).await.unwrap_err();
    assert!(matches!(err, CaError::Unavailable(_)));
    assert!(ca.authority.signed().is_empty());
}

#[tokio::test]
async fn test_forced_sign_requires_failover() {
    let ca = TestCa::builder()
        .directory(example_directory())
        .unmigrated()
        .build()
        .await;

    let request = KeyRequest::new("root", "admin@example.com", "admin-pw", BOB_KEY);
    let err = ca.engine.sign(&request, true).await.unwrap_err();
    assert!(matches!(err, CaError::Unavailable(_)));
}

#[tokio::test]
async fn test_service_endpoints() {
    let ca = TestCa::new().await;
    assert_eq!(ca.engine.ping(), "pong");
    assert_eq!(ca.engine.health().name, "sshca");
    assert_eq!(ca.engine.health().version, sshca::VERSION);
    assert_eq!(
        ca.engine.ca_public_key().await.unwrap(),
        b"ssh-ed25519 AAAACAKEY ca@example.com\n"
    );
    assert_eq!(
        ca.engine
            .test_auth(&Credentials::new("anyone@example.com", ""))
            .await
            .unwrap(),
        "OK"
    );
}
