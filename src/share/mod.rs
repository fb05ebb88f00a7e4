//! Capability links ("shares").
//!
//! A share grants anonymous, scoped access to one file or directory through
//! an unguessable bearer token. It may carry an expiration and a password.
//! Every check re-reads the shared resource from the tree, so deleting or
//! re-owning a resource invalidates its shares without touching them.

mod model;
mod password;
mod repository;
mod scope;
mod service;
mod token;

pub use model::{Share, ShareAccessLog};
pub use password::{hash_password, verify_password, PasswordError, MAX_PASSWORD_LENGTH};
pub use repository::{AccessLogRepository, NewAccessLog, NewShare, ShareRepository};
pub use scope::{can_perform_raw, PermissionType, ResourceRef, ResourceType, ShareAction};
pub use service::{
    AccessRequest, SharedResource, ShareRequest, ShareService, TokenSource, ValidatedShare,
    MAX_ACCESS_LOG_PAGE,
};
pub use token::{generate_token, is_well_formed, redact};

/// Whether `share` authorizes `action`. Unknown scopes cannot be
/// represented, so this fails closed by construction.
pub fn can_perform(share: &Share, action: ShareAction) -> bool {
    share.can_perform(action)
}
