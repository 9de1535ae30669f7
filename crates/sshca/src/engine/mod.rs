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

//! Certificate lifecycle engine.
//!
//! Every operation runs to completion on its own task. The datastore and the
//! KRL directory are the only shared resources; each operation opens its own
//! connection and stages public keys in a [`TempDir`] that is removed when
//! the operation returns, whichever branch it returns from.
//!
//! | State   | activate        | revoke             | sign                    |
//! |---------|-----------------|--------------------|-------------------------|
//! | PENDING | → ACTIVE        | → REVOKED, journal | `Status: PENDING`       |
//! | ACTIVE  | nothing done    | → REVOKED, journal | certificate             |
//! | REVOKED | → ACTIVE        | → REVOKED          | `Status: REVOKED`       |

mod types;

pub use types::{
    AdminAction, FieldUpdate, Health, KeyRequest, PrincipalsOutcome, SignOutcome, StatusReport,
    StatusTarget,
};

use crate::audit;
use crate::auth::{AuthGate, Credentials, Identity};
use crate::authority::{SigningAuthority, SshKeygenAuthority};
use crate::cluster::{ClusterProber, NodeStatus, PONG, PROBE_TIMEOUT};
use crate::config::SshcaConfig;
use crate::dal::{SubmitOutcome, DAL};
use crate::database::{Database, StoreError};
use crate::directory::Directory;
use crate::error::CaError;
use crate::krl::RevocationCache;
use crate::models::{ExpiryPolicy, KeyState, KeyStatus, UserKeyRecord};
use crate::principals::{
    clean_principals_output, join_principals, merge, split_principals, truncate,
    PrincipalAction, PrincipalMapping,
};
use crate::validation::{
    parse_principal_filter, validate_principal, validate_realname, validate_username,
    ValidationError,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Validity of a certificate issued while the datastore is down.
pub const FORCED_VALIDITY: ExpiryPolicy = ExpiryPolicy::hours(12);

/// A public key written to a private temporary directory.
struct StagedKey {
    _dir: TempDir,
    path: PathBuf,
}

impl StagedKey {
    fn new(public_key: &str) -> Result<Self, CaError> {
        let dir = TempDir::new()
            .map_err(|e| CaError::Unavailable(format!("unable to stage public key: {}", e)))?;
        let path = dir.path().join("key.pub");
        std::fs::write(&path, format!("{}\n", public_key))
            .map_err(|e| CaError::Unavailable(format!("unable to stage public key: {}", e)))?;
        Ok(Self { _dir: dir, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    database: Database,
    authority: Arc<dyn SigningAuthority>,
    krl_path: PathBuf,
    directory: Option<Arc<dyn Directory>>,
    admin_group: String,
    mapping: PrincipalMapping,
    peers: Vec<String>,
    probe_timeout: Duration,
    admin_db_failover: bool,
}

impl EngineBuilder {
    pub fn new(
        database: Database,
        authority: Arc<dyn SigningAuthority>,
        krl_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            database,
            authority,
            krl_path: krl_path.into(),
            directory: None,
            admin_group: String::new(),
            mapping: PrincipalMapping::default(),
            peers: Vec::new(),
            probe_timeout: PROBE_TIMEOUT,
            admin_db_failover: false,
        }
    }

    pub fn directory(mut self, directory: Arc<dyn Directory>, admin_group: impl Into<String>) -> Self {
        self.directory = Some(directory);
        self.admin_group = admin_group.into();
        self
    }

    pub fn principal_mapping(mut self, mapping: PrincipalMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn admin_db_failover(mut self, enabled: bool) -> Self {
        self.admin_db_failover = enabled;
        self
    }

    pub fn build(self) -> Result<Engine, CaError> {
        let prober = ClusterProber::with_timeout(self.peers, self.probe_timeout)
            .map_err(|e| CaError::Unavailable(format!("unable to build HTTP client: {}", e)))?;

        Ok(Engine {
            dal: DAL::new(self.database),
            krl: RevocationCache::new(self.krl_path, self.authority.clone()),
            authority: self.authority,
            gate: AuthGate::new(self.directory, self.admin_group),
            mapping: self.mapping,
            prober,
            admin_db_failover: self.admin_db_failover,
        })
    }
}

/// The lifecycle engine. Cheap to share behind an `Arc`.
pub struct Engine {
    dal: DAL,
    authority: Arc<dyn SigningAuthority>,
    gate: AuthGate,
    mapping: PrincipalMapping,
    krl: RevocationCache,
    prober: ClusterProber,
    admin_db_failover: bool,
}

impl Engine {
    pub fn builder(
        database: Database,
        authority: Arc<dyn SigningAuthority>,
        krl_path: impl Into<PathBuf>,
    ) -> EngineBuilder {
        EngineBuilder::new(database, authority, krl_path)
    }

    /// Wires every component from a loaded configuration.
    pub fn from_config(config: &SshcaConfig) -> Result<Self, CaError> {
        let database = Database::new(&config.database.url)?;
        let authority: Arc<dyn SigningAuthority> = Arc::new(SshKeygenAuthority::new(
            config.main.ssh_keygen.clone(),
            config.main.ca.clone(),
        ));

        let mut builder = Self::builder(database, authority, config.main.krl.clone())
            .principal_mapping(PrincipalMapping::new(&config.principals))
            .peers(config.main.peers())
            .admin_db_failover(config.main.admin_db_failover);

        if let Some(ldap) = &config.ldap {
            #[cfg(feature = "ldap")]
            {
                let directory = crate::directory::LdapDirectory::new(ldap.clone());
                builder = builder.directory(Arc::new(directory), ldap.admin_cn.clone());
            }
            #[cfg(not(feature = "ldap"))]
            {
                return Err(CaError::Unavailable(format!(
                    "directory {} configured but LDAP support is not compiled in",
                    ldap.host
                )));
            }
        }

        builder.build()
    }

    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Creates or upgrades the datastore schema.
    pub async fn run_migrations(&self) -> Result<(), CaError> {
        Ok(self.dal.database.run_migrations().await?)
    }

    fn require_key(public_key: &str) -> Result<&str, ValidationError> {
        let key = public_key.trim();
        if key.is_empty() {
            return Err(ValidationError::MissingField("pubkey"));
        }
        Ok(key)
    }

    async fn fingerprint(&self, staged: &StagedKey) -> Result<String, CaError> {
        self.authority.fingerprint(staged.path()).await.map_err(|e| {
            debug!(error = %e, "Public key could not be fingerprinted");
            CaError::from(ValidationError::UnprocessableKey)
        })
    }

    fn actor(identity: &Identity) -> &str {
        if identity.realname.is_empty() {
            "local"
        } else {
            &identity.realname
        }
    }

    /// Custom principals merged with those implied by the owner's groups.
    async fn resolve_principals(&self, record: &UserKeyRecord) -> Result<Vec<String>, CaError> {
        let groups = self.gate.groups(&record.realname).await?;
        Ok(merge(
            &split_principals(&record.custom_principals),
            &record.username,
            &groups,
            &self.mapping,
        ))
    }

    async fn key_status(&self, record: &UserKeyRecord) -> Result<KeyStatus, CaError> {
        let principals = self.resolve_principals(record).await?;
        Ok(KeyStatus::new(record, principals))
    }

    async fn require_record(&self, username: &str) -> Result<UserKeyRecord, CaError> {
        self.dal
            .users()
            .get(username)
            .await?
            .ok_or_else(|| CaError::NotFound("User does not exists.".to_string()))
    }

    /// Creates a PENDING record, or replaces the stored key of an existing
    /// one (back to PENDING) when the realname matches.
    pub async fn submit_key(&self, request: &KeyRequest) -> Result<String, CaError> {
        let username = validate_username(&request.username)?;
        let realname = validate_realname(&request.credentials.realname)?;
        let public_key = Self::require_key(&request.public_key)?;

        let staged = StagedKey::new(public_key)?;
        let fingerprint = self.fingerprint(&staged).await?;

        self.gate.authenticate(&request.credentials).await?;

        match self
            .dal
            .users()
            .submit(username, &realname, public_key, &fingerprint)
            .await?
        {
            SubmitOutcome::Created => {
                audit::log_key_submitted(username, &realname, &fingerprint);
                Ok(format!("Create user={}. Pending request.", username))
            }
            SubmitOutcome::Updated => {
                audit::log_key_updated(username, &realname, &fingerprint);
                Ok(format!("Update user={}. Pending request.", username))
            }
            SubmitOutcome::RealnameMismatch => {
                audit::log_key_mismatch(username, &realname, "realname");
                Err(CaError::Conflict(
                    "(username, realname) couple mismatch.".to_string(),
                ))
            }
        }
    }

    /// Signs the owner's key if it is ACTIVE and matches the stored record.
    ///
    /// With `force`, an admin may obtain a short certificate while the
    /// datastore is unreachable, provided `admin_db_failover` is enabled.
    pub async fn sign(&self, request: &KeyRequest, force: bool) -> Result<SignOutcome, CaError> {
        let username = validate_username(&request.username)?;
        let realname = validate_realname(&request.credentials.realname)?;
        let public_key = Self::require_key(&request.public_key)?;
        let staged = StagedKey::new(public_key)?;
        let fingerprint = self.fingerprint(&staged).await?;

        let force_allowed = if force && self.admin_db_failover {
            match self.gate.authorize_admin(&request.credentials).await {
                Ok(_) => true,
                Err(CaError::Authorization(_)) => false,
                Err(e) => return Err(e),
            }
        } else {
            self.gate.authenticate(&request.credentials).await?;
            false
        };

        let record = match self.dal.users().get(username).await {
            Ok(record) => record,
            Err(e @ (StoreError::Connection(_) | StoreError::MissingTable(_))) if force_allowed => {
                warn!(error = %e, username = %username, "Datastore unavailable, forcing signature");
                let principals = vec![username.to_string()];
                let cert = self
                    .authority
                    .sign_user_key(staged.path(), username, &FORCED_VALIDITY, &principals)
                    .await?;
                audit::log_certificate_forced(username, &realname, &fingerprint);
                return Ok(SignOutcome::Certificate(cert));
            }
            Err(e) => return Err(e.into()),
        };

        let Some(record) = record else {
            return Err(CaError::NotFound(
                "User or Key absent, add your key again.".to_string(),
            ));
        };
        if !record.realname_matches(&realname) {
            audit::log_key_mismatch(username, &realname, "realname");
            return Err(CaError::Conflict(
                "(username, realname) couple mismatch.".to_string(),
            ));
        }
        if record.ssh_key.trim() != public_key {
            audit::log_key_mismatch(username, &realname, "public key");
            return Err(CaError::Conflict(
                "public key mismatch, add your key again.".to_string(),
            ));
        }
        if !record.is_signable() {
            audit::log_certificate_refused(username, record.state.as_str());
            return Ok(SignOutcome::Status(record.state));
        }

        let expiration = record
            .expiry
            .expires_at(Utc::now())
            .ok_or_else(|| ValidationError::InvalidExpiry(record.expiry.to_string()))?
            .timestamp();

        let principals = self.resolve_principals(&record).await?;
        let cert = self
            .authority
            .sign_user_key(staged.path(), username, &record.expiry, &principals)
            .await?;

        self.dal.users().set_expiration(username, expiration).await?;
        audit::log_certificate_issued(
            username,
            &fingerprint,
            &record.expiry.to_string(),
            &principals,
        );
        Ok(SignOutcome::Certificate(cert))
    }

    /// Status of the caller's own record, looked up by realname.
    pub async fn status(&self, credentials: &Credentials) -> Result<KeyStatus, CaError> {
        let realname = validate_realname(&credentials.realname)?;
        self.gate.authenticate(credentials).await?;

        let record = self
            .dal
            .users()
            .get_by_realname(&realname)
            .await?
            .ok_or_else(|| CaError::NotFound(format!("no key found for {}.", realname)))?;
        self.key_status(&record).await
    }

    pub async fn admin_status(
        &self,
        credentials: &Credentials,
        target: &StatusTarget,
    ) -> Result<StatusReport, CaError> {
        if let StatusTarget::User(username) = target {
            validate_username(username)?;
        }
        self.gate.authorize_admin(credentials).await?;

        match target {
            StatusTarget::User(username) => {
                let record = self.require_record(username).await?;
                Ok(StatusReport::One(self.key_status(&record).await?))
            }
            StatusTarget::All => {
                let mut all = BTreeMap::new();
                for record in self.dal.users().list().await? {
                    let status = self.key_status(&record).await?;
                    all.insert(record.username.clone(), status);
                }
                Ok(StatusReport::All(all))
            }
        }
    }

    pub async fn admin_action(
        &self,
        credentials: &Credentials,
        username: &str,
        action: AdminAction,
    ) -> Result<String, CaError> {
        let username = validate_username(username)?;
        let identity = self.gate.authorize_admin(credentials).await?;
        let actor = Self::actor(&identity);
        let not_found = || CaError::NotFound("User does not exists.".to_string());

        match action {
            AdminAction::Activate => match self.dal.users().activate(username).await? {
                None => Err(not_found()),
                Some(KeyState::Active) => {
                    Ok(format!("user={} already active. Nothing done.", username))
                }
                Some(_) => {
                    audit::log_key_activated(username, actor);
                    Ok(format!(
                        "Active user={}. SSH Key active but need to be signed.",
                        username
                    ))
                }
            },
            AdminAction::Revoke => match self.dal.users().revoke(username).await? {
                None => Err(not_found()),
                Some(outcome) => {
                    audit::log_key_revoked(username, actor, outcome.journaled);
                    Ok(format!("Revoke user={}.", username))
                }
            },
            AdminAction::Delete => {
                if !self.dal.users().delete(username).await? {
                    return Err(not_found());
                }
                audit::log_key_deleted(username, actor);
                Ok("OK".to_string())
            }
        }
    }

    pub async fn admin_update(
        &self,
        credentials: &Credentials,
        username: &str,
        update: FieldUpdate,
    ) -> Result<String, CaError> {
        match update {
            FieldUpdate::SetExpiry(policy) => {
                let username = validate_username(username)?;
                if policy.expires_at(Utc::now()).is_none() {
                    return Err(ValidationError::InvalidExpiry(policy.to_string()).into());
                }
                let identity = self.gate.authorize_admin(credentials).await?;
                if !self.dal.users().set_expiry(username, policy).await? {
                    return Err(CaError::NotFound("User does not exists.".to_string()));
                }
                audit::log_expiry_changed(username, Self::actor(&identity), &policy.to_string());
                Ok(format!("OK: expiry={} for {}", policy, username))
            }
            FieldUpdate::SetPrincipals(principals) => {
                let outcome = self
                    .manage_principals(credentials, username, PrincipalAction::Update(principals))
                    .await?;
                Ok(format!(
                    "OK: principals={} for {}",
                    outcome.principals.join(","),
                    outcome.username
                ))
            }
        }
    }

    /// Applies an add/remove/update/purge edit to a user's custom principals.
    ///
    /// Principals implied by the owner's directory groups are stripped before
    /// storing; the returned set is the merged one now in effect.
    pub async fn manage_principals(
        &self,
        credentials: &Credentials,
        username: &str,
        action: PrincipalAction,
    ) -> Result<PrincipalsOutcome, CaError> {
        let username = validate_username(username)?;
        match &action {
            PrincipalAction::Add(list) | PrincipalAction::Remove(list) | PrincipalAction::Update(list) => {
                if list.is_empty() {
                    return Err(ValidationError::InvalidPrincipal(String::new()).into());
                }
                for principal in list {
                    validate_principal(principal)?;
                }
            }
            PrincipalAction::Purge => {}
        }
        let identity = self.gate.authorize_admin(credentials).await?;

        let record = self
            .dal
            .users()
            .get(username)
            .await?
            .ok_or_else(|| CaError::NotFound(format!("{} doesn't exist", username)))?;

        let current = split_principals(&record.custom_principals);
        let edited = action.apply(&current, username);
        let groups = self.gate.groups(&record.realname).await?;
        let stored = truncate(&edited, &groups, &self.mapping);
        let stored_raw = join_principals(&stored);

        self.dal.users().set_principals(username, &stored_raw).await?;
        audit::log_principals_changed(username, Self::actor(&identity), action.name(), &stored_raw);

        Ok(PrincipalsOutcome {
            username: username.to_string(),
            principals: merge(&stored, username, &groups, &self.mapping),
        })
    }

    /// Stored custom principals, with the username default applied.
    pub async fn get_principals(
        &self,
        credentials: &Credentials,
        username: &str,
    ) -> Result<Vec<String>, CaError> {
        let username = validate_username(username)?;
        self.gate.authorize_admin(credentials).await?;
        let record = self
            .dal
            .users()
            .get(username)
            .await?
            .ok_or_else(|| {
                CaError::NotFound(format!(
                    "{} doesn't exist or doesn't have principals...",
                    username
                ))
            })?;
        Ok(clean_principals_output(&record.custom_principals, username))
    }

    /// Users holding any of the filter principals, or every user's
    /// principals when the filter is empty.
    pub async fn search_principals(
        &self,
        credentials: &Credentials,
        filter: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, CaError> {
        let wanted = parse_principal_filter(filter)?;
        self.gate.authorize_admin(credentials).await?;
        let records = self.dal.users().list().await?;

        let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in records {
            let held = clean_principals_output(&record.custom_principals, &record.username);
            if wanted.is_empty() {
                result.insert(record.username, held);
                continue;
            }
            let matching: Vec<String> = wanted.iter().filter(|p| held.contains(p)).cloned().collect();
            if !matching.is_empty() {
                result.insert(record.username, matching);
            }
        }
        Ok(result)
    }

    /// Raw CA public key.
    pub async fn ca_public_key(&self) -> Result<Vec<u8>, CaError> {
        let path = self.authority.ca_public_key_path();
        tokio::fs::read(&path).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "CA public key unreadable");
            CaError::Unavailable("CA public key unavailable.".to_string())
        })
    }

    /// Current revocation list, regenerated if the journal moved on.
    pub async fn current_krl(&self) -> Result<Vec<u8>, CaError> {
        self.krl.current_krl(&self.dal).await
    }

    pub async fn cluster_status(&self) -> BTreeMap<String, NodeStatus> {
        let report = self.prober.probe().await;
        info!(
            alive = report.alive.len(),
            dead = report.dead.len(),
            "Cluster probe complete"
        );
        report.to_status()
    }

    pub fn ping(&self) -> &'static str {
        PONG
    }

    pub fn health(&self) -> Health {
        Health::default()
    }

    /// Checks credentials only.
    pub async fn test_auth(&self, credentials: &Credentials) -> Result<String, CaError> {
        self.gate.authenticate(credentials).await?;
        Ok("OK".to_string())
    }
}
