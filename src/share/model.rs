//! Share and access-log records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::scope::{PermissionType, ResourceRef, ResourceType, ShareAction};

/// A capability link.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Share {
    /// Unique share ID.
    pub id: i64,
    /// User who issued the share.
    pub owner_id: i64,
    /// Kind of shared resource.
    #[sqlx(try_from = "String")]
    pub resource_type: ResourceType,
    /// Shared file or directory ID.
    pub resource_id: i64,
    /// Bearer token. Treat as a secret.
    pub token: String,
    /// What the token authorizes.
    #[sqlx(try_from = "String")]
    pub permission_type: PermissionType,
    /// Argon2id PHC string, if password-protected.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Expiration; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Successful accesses so far.
    pub access_count: i64,
    /// Creation timestamp.
    pub created_at: String,
}

impl Share {
    /// Whether the share had expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the share has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// The shared resource.
    pub fn resource(&self) -> ResourceRef {
        ResourceRef {
            resource_type: self.resource_type,
            resource_id: self.resource_id,
        }
    }

    /// Whether this share's scope authorizes `action`.
    pub fn can_perform(&self, action: ShareAction) -> bool {
        self.permission_type.allows(action)
    }
}

/// One attempt to use a share.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShareAccessLog {
    pub id: i64,
    pub share_id: i64,
    pub accessed_at: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[sqlx(try_from = "String")]
    pub action: ShareAction,
    pub file_name: Option<String>,
    /// Whether the attempt was allowed.
    pub granted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn share(expires_at: Option<DateTime<Utc>>, password_hash: Option<&str>) -> Share {
        Share {
            id: 1,
            owner_id: 1,
            resource_type: ResourceType::Directory,
            resource_id: 10,
            token: "t".repeat(43),
            permission_type: PermissionType::Read,
            password_hash: password_hash.map(str::to_string),
            expires_at,
            access_count: 0,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(!share(None, None).is_expired_at(now));
        assert!(share(Some(now - Duration::milliseconds(5)), None).is_expired_at(now));
        assert!(!share(Some(now + Duration::hours(1)), None).is_expired_at(now));
    }

    #[test]
    fn test_serialization_hides_password_hash() {
        let share = share(None, Some("$argon2id$secret"));
        assert!(share.is_password_protected());
        let json = serde_json::to_string(&share).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"permission_type\":\"read\""));
    }

    #[test]
    fn test_scope_and_resource() {
        let share = share(None, None);
        assert!(share.can_perform(ShareAction::View));
        assert!(!share.can_perform(ShareAction::Upload));
        assert_eq!(share.resource(), ResourceRef::directory(10));
    }
}
