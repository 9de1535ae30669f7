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
use sshca::cluster::NodeHealth;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `body` with a 200 status to every connection.
async fn http_peer(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

/// An address nothing listens on.
async fn dead_peer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_cluster_status_classifies_peers() {
    let alive = http_peer("pong").await;
    let wrong_body = http_peer("PONG!").await;
    let dead = dead_peer().await;

    let ca = TestCa::builder()
        .peers(vec![alive.clone(), wrong_body.clone(), dead.clone()])
        .build()
        .await;

    let status = ca.engine.cluster_status().await;
    assert_eq!(status.len(), 3);
    assert_eq!(status[&alive].status, NodeHealth::Alive);
    assert_eq!(status[&wrong_body].status, NodeHealth::Dead);
    assert_eq!(status[&dead].status, NodeHealth::Dead);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json[&alive]["status"], "OK");
    assert_eq!(json[&dead]["status"], "KO");
}

#[tokio::test]
async fn test_no_peers_reports_nothing() {
    let ca = TestCa::new().await;
    assert!(ca.engine.cluster_status().await.is_empty());
}
