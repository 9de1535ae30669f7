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
use sshca::engine::{AdminAction, KeyRequest};

fn versioned_files(ca: &TestCa) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(ca.dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("revoked-keys."))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_empty_journal_serves_static_krl() {
    let ca = TestCa::new().await;

    assert_eq!(ca.engine.current_krl().await.unwrap(), b"KRL\n");
    assert_eq!(ca.engine.current_krl().await.unwrap(), b"KRL\n");
    assert_eq!(ca.authority.krl_builds(), 1);
    assert!(ca.krl_path.exists());
    assert!(versioned_files(&ca).is_empty());
}

#[tokio::test]
async fn test_krl_is_cached_until_journal_changes() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;
    ca.engine
        .admin_action(&admin, "bob", AdminAction::Revoke)
        .await
        .unwrap();

    let first = ca.engine.current_krl().await.unwrap();
    assert_eq!(first, format!("KRL\n{}\n", BOB_KEY).into_bytes());
    let builds = ca.authority.krl_builds();

    let again = ca.engine.current_krl().await.unwrap();
    assert_eq!(again, first);
    assert_eq!(ca.authority.krl_builds(), builds);
    assert_eq!(std::fs::read(&ca.krl_path).unwrap(), first);

    let latest = ca
        .engine
        .dal()
        .revocations()
        .latest_timestamp()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(versioned_files(&ca), vec![format!("revoked-keys.{}", latest)]);
}

#[tokio::test]
async fn test_new_revocation_replaces_cached_krl() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;
    ca.enroll("alice", "alice@example.com", "", ALICE_KEY).await;

    ca.engine
        .admin_action(&admin, "bob", AdminAction::Revoke)
        .await
        .unwrap();
    ca.engine.current_krl().await.unwrap();
    let before = versioned_files(&ca);

    ca.engine
        .admin_action(&admin, "alice", AdminAction::Revoke)
        .await
        .unwrap();
    let krl = String::from_utf8(ca.engine.current_krl().await.unwrap()).unwrap();
    assert!(krl.contains(BOB_KEY));
    assert!(krl.contains(ALICE_KEY));

    let after = versioned_files(&ca);
    assert_eq!(after.len(), 1);
    assert_ne!(after, before);
}

#[tokio::test]
async fn test_revoking_twice_journals_once() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();
    ca.enroll("bob", "bob@example.com", "", BOB_KEY).await;

    for _ in 0..2 {
        ca.engine
            .admin_action(&admin, "bob", AdminAction::Revoke)
            .await
            .unwrap();
    }

    let journal = ca.engine.dal().revocations().list().await.unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].username, "bob");
    assert_eq!(journal[0].ssh_key, BOB_KEY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_revokes_of_one_user_both_succeed() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();

    let mut expected = Vec::new();
    for round in 0..20u8 {
        let username = format!("user{}", (b'a' + round) as char);
        let key = format!("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5{} {}@laptop", username, username);
        ca.enroll(&username, &format!("{}@example.com", username), "", &key)
            .await;

        let (first, second) = tokio::join!(
            ca.engine.admin_action(&admin, &username, AdminAction::Revoke),
            ca.engine.admin_action(&admin, &username, AdminAction::Revoke),
        );
        assert_eq!(first.unwrap(), format!("Revoke user={}.", username));
        assert_eq!(second.unwrap(), format!("Revoke user={}.", username));
        expected.push(key);
    }

    let journal = ca.engine.dal().revocations().list().await.unwrap();
    let mut journaled: Vec<String> = journal.into_iter().map(|e| e.ssh_key).collect();
    journaled.sort();
    expected.sort();
    assert_eq!(journaled, expected);
}

#[tokio::test]
async fn test_revocation_timestamps_strictly_increase() {
    let ca = TestCa::new().await;
    let admin = admin_credentials();
    for (user, key) in [("bob", BOB_KEY), ("alice", ALICE_KEY)] {
        ca.enroll(user, &format!("{}@example.com", user), "", key).await;
        ca.engine
            .admin_action(&admin, user, AdminAction::Revoke)
            .await
            .unwrap();
    }
    // A replaced key is journaled separately once the new one is revoked.
    ca.engine
        .submit_key(&KeyRequest::new("bob", "bob@example.com", "", BOB_NEW_KEY))
        .await
        .unwrap();
    ca.engine
        .admin_action(&admin, "bob", AdminAction::Revoke)
        .await
        .unwrap();

    let journal = ca.engine.dal().revocations().list().await.unwrap();
    assert_eq!(journal.len(), 3);
    assert!(journal.windows(2).all(|w| w[0].revoked_at < w[1].revoked_at));
}
