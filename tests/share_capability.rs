//! Share capability integration tests.

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{create_user, setup, TestVault};
use sharevault::share::generate_token;
use sharevault::{
    AccessRequest, PermissionType, ResourceRef, ResourceType, ShareAction, ShareRequest,
    SharedResource, UploadRequest, VaultError,
};

async fn vault_with_docs() -> (TestVault, i64, i64) {
    let vault = setup().await;
    let owner = create_user(&vault.db, "alice").await;
    let docs = vault.tree.create_directory(owner, None, "docs").await.unwrap();
    (vault, owner, docs.id)
}

#[tokio::test]
async fn test_ownership_checked_before_issuing() {
    let (vault, _owner, docs) = vault_with_docs().await;
    let mallory = create_user(&vault.db, "mallory").await;

    let result = vault
        .shares
        .create_share(
            mallory,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
        )
        .await;
    assert!(matches!(result, Err(VaultError::Permission(_))));

    let missing = vault
        .shares
        .create_share(
            mallory,
            ShareRequest::new(ResourceRef::file(9999), PermissionType::Read),
        )
        .await;
    assert!(matches!(missing, Err(VaultError::NotFound(_))));

    assert!(vault.shares.list_shares(mallory, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hundred_shares_have_distinct_tokens() {
    let (vault, owner, docs) = vault_with_docs().await;

    let mut tokens = HashSet::new();
    for _ in 0..100 {
        let share = vault
            .shares
            .create_share(
                owner,
                ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
            )
            .await
            .unwrap();
        assert_eq!(share.token.len(), 43);
        assert_eq!(share.access_count, 0);
        tokens.insert(share.token);
    }
    assert_eq!(tokens.len(), 100);
}

#[tokio::test]
async fn test_token_collision_is_retried() {
    let (vault, owner, docs) = vault_with_docs().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fixed = "A".repeat(43);
    let shares = vault.shares.clone().with_token_source(Arc::new(move |bytes: usize| {
        if counter.fetch_add(1, Ordering::SeqCst) < 3 {
            fixed.clone()
        } else {
            generate_token(bytes)
        }
    }));
    let request = ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read);

    let first = shares.create_share(owner, request.clone()).await.unwrap();
    let second = shares.create_share(owner, request.clone()).await.unwrap();
    assert_eq!(first.token, "A".repeat(43));
    assert_ne!(second.token, first.token);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let stuck = vault
        .shares
        .clone()
        .with_token_source(Arc::new(|_: usize| "A".repeat(43)));
    let result = stuck.create_share(owner, request).await;
    assert!(matches!(result, Err(VaultError::Internal(_))));
}

#[tokio::test]
async fn test_unknown_and_revoked_tokens_look_the_same() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
        )
        .await
        .unwrap();
    assert!(vault.shares.validate_access(&share.token, None).await.is_ok());

    vault.shares.revoke(share.id, owner).await.unwrap();

    let revoked = vault.shares.validate_access(&share.token, None).await.unwrap_err();
    let unknown = vault
        .shares
        .validate_access(&generate_token(32), None)
        .await
        .unwrap_err();
    let malformed = vault
        .shares
        .validate_access("../../etc/passwd", None)
        .await
        .unwrap_err();

    assert!(matches!(revoked, VaultError::NotFound(_)));
    assert_eq!(revoked.to_string(), unknown.to_string());
    assert_eq!(revoked.to_string(), malformed.to_string());
    assert_eq!(
        revoked.public_message(),
        VaultError::Permission("x".into()).public_message()
    );
}

#[tokio::test]
async fn test_expired_share() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read)
                .with_expiration(Utc::now() + Duration::hours(1)),
        )
        .await
        .unwrap();
    assert!(vault.shares.validate_access(&share.token, None).await.is_ok());

    vault
        .shares
        .update_expiration(share.id, owner, Some(Utc::now() - Duration::milliseconds(5)))
        .await
        .unwrap();
    let err = vault.shares.validate_access(&share.token, None).await.unwrap_err();
    assert!(matches!(err, VaultError::Expired));
    assert!(err.to_string().contains("expired"));

    // Clearing the expiration makes it valid forever.
    let updated = vault
        .shares
        .update_expiration(share.id, owner, None)
        .await
        .unwrap();
    assert!(updated.expires_at.is_none());
    assert!(vault.shares.validate_access(&share.token, None).await.is_ok());
}

#[tokio::test]
async fn test_creation_rejects_past_expiration() {
    let (vault, owner, docs) = vault_with_docs().await;
    let past = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read)
                .with_expiration(Utc::now() - Duration::seconds(1)),
        )
        .await;
    assert!(matches!(past, Err(VaultError::Validation(_))));
}

#[tokio::test]
async fn test_file_shares_accept_every_scope() {
    let (vault, owner, docs) = vault_with_docs().await;
    let file = vault
        .tree
        .upload_file(owner, Some(docs), UploadRequest::new("a.txt", "x"))
        .await
        .unwrap();

    for permission in PermissionType::ALL {
        let share = vault
            .shares
            .create_share(owner, ShareRequest::new(ResourceRef::file(file.id), permission))
            .await
            .unwrap();
        assert_eq!(share.permission_type, permission);

        for action in [ShareAction::View, ShareAction::Download, ShareAction::Upload] {
            assert_eq!(
                vault.shares.can_perform(&share, action),
                permission.allows(action),
                "{permission} / {action}"
            );
        }

        // A file share never names an upload target directory.
        let validated = vault.shares.validate_access(&share.token, None).await.unwrap();
        assert!(matches!(
            vault.shares.authorize_directory(&validated, docs).await,
            Err(VaultError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn test_password_gate() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read)
                .with_password("correct horse"),
        )
        .await
        .unwrap();
    let stored = share.password_hash.as_deref().unwrap();
    assert!(stored.starts_with("$argon2id$"));
    assert!(!stored.contains("correct horse"));

    let shares = &vault.shares;
    assert!(matches!(
        shares.validate_access(&share.token, Some("wrong")).await,
        Err(VaultError::Permission(_))
    ));
    assert!(matches!(
        shares.validate_access(&share.token, Some("")).await,
        Err(VaultError::Permission(_))
    ));
    assert!(matches!(
        shares.validate_access(&share.token, None).await,
        Err(VaultError::Permission(_))
    ));
    let validated = shares
        .validate_access(&share.token, Some("correct horse"))
        .await
        .unwrap();
    assert_eq!(validated.permission_type(), PermissionType::Read);
    assert_eq!(validated.resource_ref(), ResourceRef::directory(docs));
}

#[tokio::test]
async fn test_empty_password_means_unprotected() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read)
                .with_password(""),
        )
        .await
        .unwrap();
    assert!(!share.is_password_protected());
    assert!(vault.shares.validate_access(&share.token, None).await.is_ok());
}

#[tokio::test]
async fn test_deleted_resource_invalidates_share() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
        )
        .await
        .unwrap();

    vault.tree.delete_directory(owner, docs, true).await.unwrap();
    let err = vault.shares.validate_access(&share.token, None).await.unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));

    // The issuer can still clean it up.
    vault.shares.revoke(share.id, owner).await.unwrap();
}

#[tokio::test]
async fn test_only_owner_can_manage_share() {
    let (vault, owner, docs) = vault_with_docs().await;
    let mallory = create_user(&vault.db, "mallory").await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
        )
        .await
        .unwrap();

    assert!(matches!(
        vault.shares.revoke(share.id, mallory).await,
        Err(VaultError::Permission(_))
    ));
    assert!(matches!(
        vault.shares.update_expiration(share.id, mallory, None).await,
        Err(VaultError::Permission(_))
    ));
    assert!(matches!(
        vault.shares.get_access_logs(mallory, share.id, 10).await,
        Err(VaultError::Permission(_))
    ));
    assert!(vault.shares.validate_access(&share.token, None).await.is_ok());
}

#[tokio::test]
async fn test_access_counts_and_logs_attempts() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read)
                .with_password("pw"),
        )
        .await
        .unwrap();

    let granted = vault
        .shares
        .access(
            AccessRequest::new(&share.token, ShareAction::View)
                .with_password("pw")
                .with_client("198.51.100.4", "Mozilla/5.0\r\nX-Injected: 1"),
        )
        .await
        .unwrap();
    assert_eq!(granted.share.access_count, 1);
    assert!(matches!(granted.resource, SharedResource::Directory(ref d) if d.id == docs));

    let wrong_password = vault
        .shares
        .access(AccessRequest::new(&share.token, ShareAction::Download).with_password("nope"))
        .await;
    assert!(matches!(wrong_password, Err(VaultError::Permission(_))));

    let out_of_scope = vault
        .shares
        .access(
            AccessRequest::new(&share.token, ShareAction::Upload)
                .with_password("pw")
                .with_file_name("../../evil.sh"),
        )
        .await;
    assert!(matches!(out_of_scope, Err(VaultError::Permission(_))));

    let logs = vault.shares.get_access_logs(owner, share.id, 10).await.unwrap();
    assert_eq!(logs.len(), 3);
    // Newest first
    assert_eq!(logs[0].action, ShareAction::Upload);
    assert!(!logs[0].granted);
    assert_eq!(logs[0].file_name.as_deref(), Some("evil.sh"));
    assert!(!logs[1].granted);
    assert!(logs[2].granted);
    assert_eq!(logs[2].user_agent.as_deref(), Some("Mozilla/5.0X-Injected: 1"));

    let current = vault.shares.get_share(owner, share.id).await.unwrap();
    assert_eq!(current.access_count, 1);
}

#[tokio::test]
async fn test_log_access_is_best_effort() {
    let (vault, owner, docs) = vault_with_docs().await;
    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
        )
        .await
        .unwrap();

    vault
        .shares
        .log_access(share.id, ShareAction::Download, Some("10.0.0.1"), None, Some("a.txt"))
        .await;
    // Unknown share: the insert fails and is swallowed.
    vault
        .shares
        .log_access(9999, ShareAction::View, None, None, None)
        .await;

    let logs = vault.shares.get_access_logs(owner, share.id, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.1"));
}

#[tokio::test]
async fn test_authorize_file_follows_current_location() {
    let (vault, owner, docs) = vault_with_docs().await;
    let tree = &vault.tree;
    let sub = tree.create_directory(owner, Some(docs), "sub").await.unwrap();
    let other = tree.create_directory(owner, None, "other").await.unwrap();
    let inside = tree
        .upload_file(owner, Some(sub.id), UploadRequest::new("a.txt", "a"))
        .await
        .unwrap();
    let outside = tree
        .upload_file(owner, Some(other.id), UploadRequest::new("b.txt", "b"))
        .await
        .unwrap();

    let share = vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::Read),
        )
        .await
        .unwrap();
    let validated = vault.shares.validate_access(&share.token, None).await.unwrap();

    let file = vault.shares.authorize_file(&validated, inside.id).await.unwrap();
    assert_eq!(file.path, "/docs/sub/a.txt");
    assert!(matches!(
        vault.shares.authorize_file(&validated, outside.id).await,
        Err(VaultError::NotFound(_))
    ));
    assert!(vault.shares.authorize_directory(&validated, sub.id).await.is_ok());
    assert!(vault.shares.authorize_directory(&validated, other.id).await.is_err());

    tree.move_file(owner, inside.id, Some(other.id)).await.unwrap();
    assert!(matches!(
        vault.shares.authorize_file(&validated, inside.id).await,
        Err(VaultError::NotFound(_))
    ));

    let (dirs, files) = vault.shares.list_shared(&validated, None).await.unwrap();
    assert_eq!(dirs.len(), 1);
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_list_shares_filter() {
    let (vault, owner, docs) = vault_with_docs().await;
    let file = vault
        .tree
        .upload_file(owner, None, UploadRequest::new("a.txt", "x"))
        .await
        .unwrap();

    vault
        .shares
        .create_share(
            owner,
            ShareRequest::new(ResourceRef::directory(docs), PermissionType::UploadOnly),
        )
        .await
        .unwrap();
    vault
        .shares
        .create_share(owner, ShareRequest::new(ResourceRef::file(file.id), PermissionType::Read))
        .await
        .unwrap();

    assert_eq!(vault.shares.list_shares(owner, None).await.unwrap().len(), 2);
    let files = vault
        .shares
        .list_shares(owner, Some(ResourceType::File))
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].resource_id, file.id);
}

#[tokio::test]
async fn test_list_resource_shares() {
    let (vault, owner, docs) = vault_with_docs().await;
    let other = vault.tree.create_directory(owner, None, "other").await.unwrap();
    let mallory = create_user(&vault.db, "mallory").await;

    let mut issued = Vec::new();
    for permission in [PermissionType::Read, PermissionType::UploadOnly] {
        let share = vault
            .shares
            .create_share(owner, ShareRequest::new(ResourceRef::directory(docs), permission))
            .await
            .unwrap();
        issued.push(share.id);
    }
    vault
        .shares
        .create_share(owner, ShareRequest::new(ResourceRef::directory(other.id), PermissionType::Read))
        .await
        .unwrap();

    let listed: Vec<i64> = vault
        .shares
        .list_resource_shares(owner, ResourceRef::directory(docs))
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, issued);

    let foreign = vault
        .shares
        .list_resource_shares(mallory, ResourceRef::directory(docs))
        .await;
    assert!(matches!(foreign, Err(VaultError::Permission(_))));
}
