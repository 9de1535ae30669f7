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

//! Peer liveness probing. Observational only: no quorum, no replication.

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Fixed body a live node answers on `/ping`.
pub const PONG: &str = "pong";

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeHealth {
    #[serde(rename = "OK")]
    Alive,
    #[serde(rename = "KO")]
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub status: NodeHealth,
}

/// Result of one probe round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub alive: Vec<String>,
    pub dead: Vec<String>,
}

impl ProbeReport {
    /// `{peer: {"status": "OK" | "KO"}}`
    pub fn to_status(&self) -> BTreeMap<String, NodeStatus> {
        let alive = self.alive.iter().map(|p| (p, NodeHealth::Alive));
        let dead = self.dead.iter().map(|p| (p, NodeHealth::Dead));
        alive
            .chain(dead)
            .map(|(peer, status)| (peer.clone(), NodeStatus { status }))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ClusterProber {
    client: Client,
    peers: Vec<String>,
}

impl ClusterProber {
    pub fn new(peers: Vec<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(peers, PROBE_TIMEOUT)
    }

    pub fn with_timeout(peers: Vec<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("sshca/{}", crate::VERSION))
            .build()?;
        Ok(Self { client, peers })
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Probes every peer concurrently, once, without retries.
    pub async fn probe(&self) -> ProbeReport {
        let results = join_all(self.peers.iter().map(|peer| self.is_alive(peer))).await;

        let mut report = ProbeReport::default();
        for (peer, alive) in self.peers.iter().zip(results) {
            if alive {
                report.alive.push(peer.clone());
            } else {
                report.dead.push(peer.clone());
            }
        }
        report
    }

    async fn is_alive(&self, peer: &str) -> bool {
        let url = format!("{}/ping", peer.trim_end_matches('/'));
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(peer = %peer, status = %response.status(), "Peer answered with error status");
                return false;
            }
            Err(e) => {
                debug!(peer = %peer, error = %e, "Peer unreachable");
                return false;
            }
        };
        match response.text().await {
            Ok(body) => body == PONG,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Peer body unreadable");
                false
            }
        }
    }
}
