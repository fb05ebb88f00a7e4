//! Share issuance, validation and access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::model::{Share, ShareAccessLog};
use super::password::{hash_password, verify_password, PasswordError};
use super::repository::{AccessLogRepository, NewAccessLog, NewShare, ShareRepository};
use super::scope::{PermissionType, ResourceRef, ResourceType, ShareAction};
use super::token::{generate_token, is_well_formed, redact};
use crate::config::{Config, ShareConfig};
use crate::db::Database;
use crate::sanitize::{is_control, sanitize_filename};
use crate::tree::{ancestry, Ancestry, Directory, DirectoryRepository, FileEntry, FileRepository};
use crate::{Result, VaultError};

/// Longest user agent kept in the access log.
const MAX_USER_AGENT_LENGTH: usize = 512;

/// Longest client address kept in the access log.
const MAX_IP_LENGTH: usize = 64;

/// Upper bound on one page of access logs.
pub const MAX_ACCESS_LOG_PAGE: i64 = 500;

/// Produces a token from a number of random bytes.
pub type TokenSource = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// Parameters for a new share.
#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub resource: ResourceRef,
    pub permission_type: PermissionType,
    /// Plaintext password; empty means none.
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareRequest {
    pub fn new(resource: ResourceRef, permission_type: PermissionType) -> Self {
        Self {
            resource,
            permission_type,
            password: None,
            expires_at: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// The resource behind a share, as it is now.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SharedResource {
    File(FileEntry),
    Directory(Directory),
}

impl SharedResource {
    pub fn id(&self) -> i64 {
        match self {
            SharedResource::File(file) => file.id,
            SharedResource::Directory(directory) => directory.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SharedResource::File(file) => &file.name,
            SharedResource::Directory(directory) => &directory.name,
        }
    }
}

/// A share that passed token, expiry and password checks.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedShare {
    pub share: Share,
    pub resource: SharedResource,
}

impl ValidatedShare {
    pub fn permission_type(&self) -> PermissionType {
        self.share.permission_type
    }

    pub fn resource_ref(&self) -> ResourceRef {
        self.share.resource()
    }

    pub fn can_perform(&self, action: ShareAction) -> bool {
        self.share.can_perform(action)
    }
}

/// An anonymous request against a share token.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub token: String,
    pub password: Option<String>,
    pub action: ShareAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub file_name: Option<String>,
}

impl AccessRequest {
    pub fn new(token: impl Into<String>, action: ShareAction) -> Self {
        Self {
            token: token.into(),
            password: None,
            action,
            ip_address: None,
            user_agent: None,
            file_name: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Issues and checks capability links.
///
/// Reads the directory tree to confirm ownership and location but never
/// writes to it.
#[derive(Clone)]
pub struct ShareService {
    db: Database,
    config: ShareConfig,
    max_depth: usize,
    token_source: TokenSource,
}

impl ShareService {
    /// Create a service with the given share settings.
    pub fn new(db: Database, config: ShareConfig) -> Self {
        Self {
            db,
            config,
            max_depth: Config::default().tree.max_depth,
            token_source: Arc::new(generate_token),
        }
    }

    /// Create a service from the `[shares]` and `[tree]` settings.
    pub fn from_config(db: Database, config: &Config) -> Self {
        Self::new(db, config.shares.clone()).with_max_depth(config.tree.max_depth)
    }

    /// Override the ancestor-walk guard.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Replace the token generator.
    pub fn with_token_source(mut self, source: TokenSource) -> Self {
        self.token_source = source;
        self
    }

    /// Issue a share on a resource `owner_id` owns.
    ///
    /// Ownership is checked before a token is generated. An expiration must
    /// lie in the future.
    pub async fn create_share(&self, owner_id: i64, request: ShareRequest) -> Result<Share> {
        self.owned_resource(owner_id, request.resource).await?;

        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(VaultError::Validation(
                    "expiration must be in the future".to_string(),
                ));
            }
        }

        let password_hash = match request.password.filter(|p| !p.is_empty()) {
            Some(password) => {
                let config = self.config.clone();
                let hash = tokio::task::spawn_blocking(move || hash_password(&password, &config))
                    .await
                    .map_err(|e| VaultError::Internal(format!("hashing task failed: {e}")))??;
                Some(hash)
            }
            None => None,
        };

        let repo = ShareRepository::new(self.db.pool());
        for attempt in 1..=self.config.max_token_attempts {
            let token = (self.token_source)(self.config.token_bytes);
            if repo.token_exists(&token).await? {
                warn!(attempt, "Generated share token already exists, retrying");
                continue;
            }

            let new_share = NewShare {
                owner_id,
                resource_type: request.resource.resource_type,
                resource_id: request.resource.resource_id,
                token,
                permission_type: request.permission_type,
                password_hash: password_hash.clone(),
                expires_at: request.expires_at,
            };
            match repo.create(&new_share).await {
                Ok(share) => {
                    info!(
                        share_id = share.id,
                        owner_id,
                        resource_type = %share.resource_type,
                        resource_id = share.resource_id,
                        permission = %share.permission_type,
                        protected = share.is_password_protected(),
                        token = %redact(&share.token),
                        "Created share"
                    );
                    return Ok(share);
                }
                Err(VaultError::Conflict(_)) => {
                    warn!(attempt, "Share token collided on insert, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(VaultError::Internal(
            "could not generate a unique share token".to_string(),
        ))
    }

    /// Check a token and optional password.
    ///
    /// Unknown, malformed and revoked tokens, and shares whose resource is
    /// gone, all fail with the same not-found error.
    pub async fn validate_access(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> Result<ValidatedShare> {
        let share = self.find_by_token(token).await?;
        self.check_gates(&share, password).await?;
        let resource = self
            .current_resource(&share)
            .await?
            .ok_or_else(share_not_found)?;
        debug!(share_id = share.id, "Validated share");
        Ok(ValidatedShare { share, resource })
    }

    /// Whether `share` authorizes `action`.
    pub fn can_perform(&self, share: &Share, action: ShareAction) -> bool {
        share.can_perform(action)
    }

    /// Validate, check scope, count and log one anonymous access.
    ///
    /// Attempts that fail after the share is identified are logged with
    /// `granted = false`.
    pub async fn access(&self, request: AccessRequest) -> Result<ValidatedShare> {
        let share = self.find_by_token(&request.token).await?;

        let checked = match self.check_gates(&share, request.password.as_deref()).await {
            Ok(()) => self
                .current_resource(&share)
                .await
                .and_then(|resource| resource.ok_or_else(share_not_found)),
            Err(e) => Err(e),
        };
        let checked = checked.and_then(|resource| {
            if share.can_perform(request.action) {
                Ok(resource)
            } else {
                Err(VaultError::Permission(format!(
                    "share does not allow {}",
                    request.action
                )))
            }
        });

        let resource = match checked {
            Ok(resource) => resource,
            Err(e) => {
                self.record_access(&share, &request, false).await;
                debug!(share_id = share.id, action = %request.action, error = %e, "Share access denied");
                return Err(e);
            }
        };

        let access_count = self.increment_access_count(share.id).await?;
        self.record_access(&share, &request, true).await;

        Ok(ValidatedShare {
            share: Share {
                access_count,
                ..share
            },
            resource,
        })
    }

    /// Add one to the share's access counter and return the new value.
    pub async fn increment_access_count(&self, share_id: i64) -> Result<i64> {
        ShareRepository::new(self.db.pool())
            .increment_access_count(share_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("share".to_string()))
    }

    /// Append a granted access to the log. Never fails the caller.
    pub async fn log_access(
        &self,
        share_id: i64,
        action: ShareAction,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        file_name: Option<&str>,
    ) {
        self.append_log(NewAccessLog {
            share_id,
            action,
            ip_address: ip_address.map(|ip| clean_log_field(ip, MAX_IP_LENGTH)),
            user_agent: user_agent.map(|ua| clean_log_field(ua, MAX_USER_AGENT_LENGTH)),
            file_name: file_name.and_then(|name| sanitize_filename(name).ok()),
            granted: true,
        })
        .await;
    }

    /// Delete a share. The token stops working immediately.
    pub async fn revoke(&self, share_id: i64, caller_id: i64) -> Result<()> {
        let share = self.share_owned_by(share_id, caller_id).await?;
        ShareRepository::new(self.db.pool()).delete(share.id).await?;
        info!(
            share_id,
            caller_id,
            token = %redact(&share.token),
            "Revoked share"
        );
        Ok(())
    }

    /// Replace a share's expiration; `None` means it never expires.
    pub async fn update_expiration(
        &self,
        share_id: i64,
        caller_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Share> {
        let share = self.share_owned_by(share_id, caller_id).await?;
        let repo = ShareRepository::new(self.db.pool());
        repo.update_expiration(share.id, expires_at).await?;
        info!(share_id, caller_id, ?expires_at, "Updated share expiration");
        repo.get_by_id(share.id)
            .await?
            .ok_or_else(|| VaultError::NotFound("share".to_string()))
    }

    /// Shares issued by `owner_id`, newest first.
    pub async fn list_shares(
        &self,
        owner_id: i64,
        resource_type: Option<ResourceType>,
    ) -> Result<Vec<Share>> {
        ShareRepository::new(self.db.pool())
            .list_by_owner(owner_id, resource_type)
            .await
    }

    /// Shares `owner_id` has issued on one of their resources, oldest first.
    pub async fn list_resource_shares(
        &self,
        owner_id: i64,
        resource: ResourceRef,
    ) -> Result<Vec<Share>> {
        self.owned_resource(owner_id, resource).await?;
        let shares = ShareRepository::new(self.db.pool())
            .list_by_resource(resource.resource_type, resource.resource_id)
            .await?;
        Ok(shares.into_iter().filter(|s| s.owner_id == owner_id).collect())
    }

    /// One share issued by `owner_id`.
    pub async fn get_share(&self, owner_id: i64, share_id: i64) -> Result<Share> {
        self.share_owned_by(share_id, owner_id).await
    }

    /// Access log for a share, newest first, at most `limit` rows.
    pub async fn get_access_logs(
        &self,
        owner_id: i64,
        share_id: i64,
        limit: i64,
    ) -> Result<Vec<ShareAccessLog>> {
        let share = self.share_owned_by(share_id, owner_id).await?;
        AccessLogRepository::new(self.db.pool())
            .list_by_share(share.id, limit.clamp(1, MAX_ACCESS_LOG_PAGE))
            .await
    }

    /// Confirm `file_id` is reachable through a validated share.
    ///
    /// For a directory share the file must currently sit somewhere below
    /// the shared directory. Anything else looks like a missing file.
    pub async fn authorize_file(&self, validated: &ValidatedShare, file_id: i64) -> Result<FileEntry> {
        let share = &validated.share;
        let not_found = || VaultError::NotFound("file".to_string());

        match share.resource_type {
            ResourceType::File => {
                if share.resource_id != file_id {
                    return Err(not_found());
                }
                match self.current_resource(share).await? {
                    Some(SharedResource::File(file)) => Ok(file),
                    _ => Err(not_found()),
                }
            }
            ResourceType::Directory => {
                let mut conn = self.db.pool().acquire().await?;
                let file = FileRepository::get_by_id(&mut *conn, file_id)
                    .await?
                    .filter(|f| f.owner_id == share.owner_id)
                    .ok_or_else(not_found)?;
                let parent_id = file.parent_id.ok_or_else(not_found)?;
                match ancestry(&mut conn, parent_id, share.resource_id, self.max_depth).await? {
                    Ancestry::Inside => Ok(file),
                    Ancestry::Outside | Ancestry::Undetermined => Err(not_found()),
                }
            }
        }
    }

    /// Confirm `directory_id` is the shared directory or lies below it.
    pub async fn authorize_directory(
        &self,
        validated: &ValidatedShare,
        directory_id: i64,
    ) -> Result<Directory> {
        let share = &validated.share;
        let not_found = || VaultError::NotFound("directory".to_string());
        if share.resource_type != ResourceType::Directory {
            return Err(not_found());
        }

        let mut conn = self.db.pool().acquire().await?;
        let directory = DirectoryRepository::get_by_id(&mut *conn, directory_id)
            .await?
            .filter(|d| d.owner_id == share.owner_id)
            .ok_or_else(not_found)?;
        match ancestry(&mut conn, directory.id, share.resource_id, self.max_depth).await? {
            Ancestry::Inside => Ok(directory),
            Ancestry::Outside | Ancestry::Undetermined => Err(not_found()),
        }
    }

    /// Children of a directory reached through a share, sorted by name.
    ///
    /// `directory_id` of `None` means the shared directory itself.
    pub async fn list_shared(
        &self,
        validated: &ValidatedShare,
        directory_id: Option<i64>,
    ) -> Result<(Vec<Directory>, Vec<FileEntry>)> {
        if !validated.can_perform(ShareAction::View) {
            return Err(VaultError::Permission("share does not allow view".to_string()));
        }
        let directory =
            self.authorize_directory(validated, directory_id.unwrap_or(validated.share.resource_id))
                .await?;

        let owner_id = validated.share.owner_id;
        let directories =
            DirectoryRepository::list_children(self.db.pool(), owner_id, Some(directory.id)).await?;
        let files = FileRepository::list_children(self.db.pool(), owner_id, Some(directory.id)).await?;
        Ok((directories, files))
    }

    async fn find_by_token(&self, token: &str) -> Result<Share> {
        if !is_well_formed(token) {
            return Err(share_not_found());
        }
        ShareRepository::new(self.db.pool())
            .get_by_token(token)
            .await?
            .ok_or_else(share_not_found)
    }

    /// Expiration, then password.
    async fn check_gates(&self, share: &Share, password: Option<&str>) -> Result<()> {
        if share.is_expired() {
            return Err(VaultError::Expired);
        }

        let Some(hash) = share.password_hash.clone() else {
            return Ok(());
        };
        let supplied = password.unwrap_or_default().to_string();
        if supplied.is_empty() {
            return Err(VaultError::Permission("password required".to_string()));
        }

        let verified = tokio::task::spawn_blocking(move || verify_password(&supplied, &hash))
            .await
            .map_err(|e| VaultError::Internal(format!("verification task failed: {e}")))?;
        match verified {
            Ok(()) => Ok(()),
            Err(PasswordError::VerificationFailed) => {
                Err(VaultError::Permission("invalid password".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The shared resource if it still exists and still belongs to the
    /// share's owner.
    async fn current_resource(&self, share: &Share) -> Result<Option<SharedResource>> {
        let resource = match share.resource_type {
            ResourceType::File => FileRepository::get_by_id(self.db.pool(), share.resource_id)
                .await?
                .filter(|f| f.owner_id == share.owner_id)
                .map(SharedResource::File),
            ResourceType::Directory => {
                DirectoryRepository::get_by_id(self.db.pool(), share.resource_id)
                    .await?
                    .filter(|d| d.owner_id == share.owner_id)
                    .map(SharedResource::Directory)
            }
        };
        Ok(resource)
    }

    /// Load a resource and confirm `owner_id` owns it.
    async fn owned_resource(&self, owner_id: i64, resource: ResourceRef) -> Result<()> {
        let owner = match resource.resource_type {
            ResourceType::File => FileRepository::get_by_id(self.db.pool(), resource.resource_id)
                .await?
                .map(|f| f.owner_id),
            ResourceType::Directory => {
                DirectoryRepository::get_by_id(self.db.pool(), resource.resource_id)
                    .await?
                    .map(|d| d.owner_id)
            }
        };
        match owner {
            Some(owner) if owner == owner_id => Ok(()),
            Some(_) => Err(VaultError::Permission(format!(
                "{} belongs to another user",
                resource.resource_type
            ))),
            None => Err(VaultError::NotFound(resource.resource_type.to_string())),
        }
    }

    /// Load a share and confirm `caller_id` owns it and its resource.
    async fn share_owned_by(&self, share_id: i64, caller_id: i64) -> Result<Share> {
        let share = ShareRepository::new(self.db.pool())
            .get_by_id(share_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("share".to_string()))?;
        if share.owner_id != caller_id {
            return Err(VaultError::Permission(
                "share belongs to another user".to_string(),
            ));
        }
        match self.owned_resource(caller_id, share.resource()).await {
            // A deleted resource leaves the share to its issuer.
            Ok(()) | Err(VaultError::NotFound(_)) => Ok(share),
            Err(e) => Err(e),
        }
    }

    async fn record_access(&self, share: &Share, request: &AccessRequest, granted: bool) {
        self.append_log(NewAccessLog {
            share_id: share.id,
            action: request.action,
            ip_address: request
                .ip_address
                .as_deref()
                .map(|ip| clean_log_field(ip, MAX_IP_LENGTH)),
            user_agent: request
                .user_agent
                .as_deref()
                .map(|ua| clean_log_field(ua, MAX_USER_AGENT_LENGTH)),
            file_name: request
                .file_name
                .as_deref()
                .and_then(|name| sanitize_filename(name).ok()),
            granted,
        })
        .await;
    }

    async fn append_log(&self, entry: NewAccessLog) {
        if let Err(e) = AccessLogRepository::new(self.db.pool()).insert(&entry).await {
            warn!(share_id = entry.share_id, error = %e, "Dropped share access log entry");
        }
    }
}

fn share_not_found() -> VaultError {
    VaultError::NotFound("share link".to_string())
}

/// Strip control characters and cap the length of a client-supplied value.
fn clean_log_field(value: &str, max_chars: usize) -> String {
    value
        .chars()
        .filter(|c| !is_control(*c))
        .take(max_chars)
        .collect()
}
