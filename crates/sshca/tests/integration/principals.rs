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

use crate::fixtures::*;
use sshca::engine::{FieldUpdate, KeyRequest};
use sshca::principals::PrincipalAction;
use sshca::CaError;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn enrolled_ca() -> TestCa {
    let ca = TestCa::builder()
        .directory(example_directory())
        .mapping(example_mapping())
        .build()
        .await;
    ca.enroll("bob", "bob@example.com", "bob-pw", BOB_KEY).await;
    ca.enroll("alice", "alice@example.com", "alice-pw", ALICE_KEY)
        .await;
    ca
}

#[tokio::test]
async fn test_group_principals_are_not_persisted() {
    let ca = enrolled_ca().await;
    let admin = admin_credentials();

    let outcome = ca
        .engine
        .manage_principals(
            &admin,
            "bob",
            PrincipalAction::Add(strings(&["web", "deploy"])),
        )
        .await
        .unwrap();
    assert_eq!(outcome.principals, strings(&["web", "deploy", "ci"]));
    assert_eq!(outcome.to_string(), "OK: bob principals are 'web,deploy,ci'");

    let stored = ca.engine.get_principals(&admin, "bob").await.unwrap();
    assert_eq!(stored, strings(&["web"]));

    let cert = ca
        .engine
        .sign(
            &KeyRequest::new("bob", "bob@example.com", "bob-pw", BOB_KEY),
            false,
        )
        .await
        .unwrap();
    assert_eq!(cert.certificate().unwrap(), b"CERT bob +12h web,deploy,ci\n");
}

#[tokio::test]
async fn test_remove_and_purge() {
    let ca = enrolled_ca().await;
    let admin = admin_credentials();

    ca.engine
        .manage_principals(&admin, "alice", PrincipalAction::Add(strings(&["web", "db"])))
        .await
        .unwrap();

    let outcome = ca
        .engine
        .manage_principals(&admin, "alice", PrincipalAction::Remove(strings(&["web"])))
        .await
        .unwrap();
    assert_eq!(outcome.principals, strings(&["db"]));

    let outcome = ca
        .engine
        .manage_principals(&admin, "alice", PrincipalAction::Purge)
        .await
        .unwrap();
    assert_eq!(outcome.principals, strings(&["alice"]));
    assert_eq!(
        ca.engine.get_principals(&admin, "alice").await.unwrap(),
        strings(&["alice"])
    );
}

#[tokio::test]
async fn test_removing_everything_falls_back_to_username() {
    let ca = enrolled_ca().await;
    let admin = admin_credentials();

    ca.engine
        .manage_principals(&admin, "alice", PrincipalAction::Update(strings(&["db"])))
        .await
        .unwrap();
    let outcome = ca
        .engine
        .manage_principals(&admin, "alice", PrincipalAction::Remove(strings(&["db"])))
        .await
        .unwrap();
    assert_eq!(outcome.principals, strings(&["alice"]));
}

#[tokio::test]
async fn test_update_through_field_update() {
    let ca = enrolled_ca().await;
    let msg = ca
        .engine
        .admin_update(
            &admin_credentials(),
            "alice",
            FieldUpdate::SetPrincipals(strings(&["a", "b"])),
        )
        .await
        .unwrap();
    assert_eq!(msg, "OK: principals=a,b for alice");
}

#[tokio::test]
async fn test_invalid_principal_edits_are_rejected() {
    let ca = enrolled_ca().await;
    let admin = admin_credentials();

    let err = ca
        .engine
        .manage_principals(&admin, "bob", PrincipalAction::Add(strings(&["no spaces"])))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");

    let err = ca
        .engine
        .manage_principals(&admin, "bob", PrincipalAction::Add(Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");

    let err = ca
        .engine
        .manage_principals(&admin, "carol", PrincipalAction::Purge)
        .await
        .unwrap_err();
    assert!(matches!(err, CaError::NotFound(_)));
}

#[tokio::test]
async fn test_search_principals() {
    let ca = enrolled_ca().await;
    let admin = admin_credentials();
    ca.engine
        .manage_principals(&admin, "alice", PrincipalAction::Update(strings(&["web", "db"])))
        .await
        .unwrap();

    let found = ca.engine.search_principals(&admin, "web,ops").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found["alice"], strings(&["web"]));

    let everyone = ca.engine.search_principals(&admin, "").await.unwrap();
    assert_eq!(everyone["alice"], strings(&["web", "db"]));
    assert_eq!(everyone["bob"], strings(&["bob"]));

    assert!(ca
        .engine
        .search_principals(&admin, "nobody")
        .await
        .unwrap()
        .is_empty());

    let err = ca
        .engine
        .search_principals(&admin, "bad filter")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}
