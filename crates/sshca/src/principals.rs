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

//! Principal resolution.
//!
//! Only a user's custom principals are persisted. Principals implied by
//! directory groups are merged in when a record is read or signed, and
//! stripped again (truncated) before a custom list is stored.

use crate::validation::is_valid_principal;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::warn;

/// Validated group identifier → principals mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalMapping {
    groups: BTreeMap<String, Vec<String>>,
}

impl PrincipalMapping {
    /// Builds the mapping, skipping (and logging) principals that are not
    /// well-formed.
    pub fn new(raw: &BTreeMap<String, Vec<String>>) -> Self {
        let mut groups = BTreeMap::new();
        for (group, principals) in raw {
            let valid: Vec<String> = principals
                .iter()
                .filter(|p| {
                    let ok = is_valid_principal(p);
                    if !ok {
                        warn!(group = %group, principal = %p, "Skipping invalid mapped principal");
                    }
                    ok
                })
                .cloned()
                .collect();
            groups.insert(group.clone(), valid);
        }
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Principals granted by the given group memberships, in mapping order,
    /// without duplicates.
    pub fn principals_for(&self, memberships: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for (group, principals) in &self.groups {
            if memberships.iter().any(|m| m == group) {
                out.extend(principals.iter().cloned());
            }
        }
        dedup(out)
    }
}

/// Splits a stored comma-separated list. The empty string is the empty list.
pub fn split_principals(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_principals(principals: &[String]) -> String {
    principals.join(",")
}

/// Removes duplicates, keeping the first occurrence.
fn dedup(principals: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    principals
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Resolves the principals to embed in a certificate: the custom list (or
/// the username when it is empty) followed by every group-mapped principal.
pub fn merge(
    custom: &[String],
    username: &str,
    memberships: &[String],
    mapping: &PrincipalMapping,
) -> Vec<String> {
    let mut merged = if custom.is_empty() {
        vec![username.to_string()]
    } else {
        custom.to_vec()
    };
    merged.extend(mapping.principals_for(memberships));
    dedup(merged)
}

/// Removes principals already implied by group membership, so they are not
/// persisted. A list made only of group principals is kept as is, otherwise
/// it would collapse to the username default on the next merge.
pub fn truncate(
    custom: &[String],
    memberships: &[String],
    mapping: &PrincipalMapping,
) -> Vec<String> {
    let implied: HashSet<String> = mapping.principals_for(memberships).into_iter().collect();
    let remaining: Vec<String> = custom
        .iter()
        .filter(|p| !implied.contains(*p))
        .cloned()
        .collect();
    if remaining.is_empty() {
        dedup(custom.to_vec())
    } else {
        dedup(remaining)
    }
}

/// Stored principals as a list; an empty value renders as `[username]`.
pub fn clean_principals_output(raw: &str, username: &str) -> Vec<String> {
    if raw.is_empty() {
        vec![username.to_string()]
    } else {
        raw.split(',').map(str::to_string).collect()
    }
}

/// Shell-friendly form of [`clean_principals_output`].
pub fn clean_principals_shell(raw: &str, username: &str) -> String {
    if raw.is_empty() {
        username.to_string()
    } else {
        raw.to_string()
    }
}

/// Admin edit of a user's custom principal list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalAction {
    Add(Vec<String>),
    Remove(Vec<String>),
    /// Replace the whole list.
    Update(Vec<String>),
    /// Reset to the username alone.
    Purge,
}

impl PrincipalAction {
    pub fn name(&self) -> &'static str {
        match self {
            PrincipalAction::Add(_) => "add",
            PrincipalAction::Remove(_) => "remove",
            PrincipalAction::Update(_) => "update",
            PrincipalAction::Purge => "purge",
        }
    }

    /// Applies the action to the current custom list.
    pub fn apply(&self, current: &[String], username: &str) -> Vec<String> {
        match self {
            PrincipalAction::Add(extra) => {
                let mut out = current.to_vec();
                out.extend(extra.iter().cloned());
                dedup(out)
            }
            PrincipalAction::Remove(gone) => current
                .iter()
                .filter(|p| !gone.contains(p))
                .cloned()
                .collect(),
            PrincipalAction::Update(list) => dedup(list.clone()),
            PrincipalAction::Purge => vec![username.to_string()],
        }
    }
}

impl fmt::Display for PrincipalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
