//! Test helpers for sharevault integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use sharevault::config::ShareConfig;
use sharevault::db::{NewUser, UserRepository};
use sharevault::tree::{Directory, FileEntry};
use sharevault::{Database, DirectoryTree, MemoryObjectStore, ObjectStore, ShareService};

/// A database with a tree and share service over an in-memory object store.
pub struct TestVault {
    pub db: Database,
    pub store: Arc<MemoryObjectStore>,
    pub tree: DirectoryTree,
    pub shares: ShareService,
}

/// Share settings with cheap Argon2 parameters.
pub fn fast_share_config() -> ShareConfig {
    ShareConfig {
        password_memory_kib: 1024,
        password_iterations: 1,
        password_parallelism: 1,
        ..Default::default()
    }
}

/// Build a vault on an in-memory database.
pub async fn setup() -> TestVault {
    let db = Database::open_in_memory().await.unwrap();
    build(db)
}

/// Build a vault on an existing database.
pub fn build(db: Database) -> TestVault {
    let store = Arc::new(MemoryObjectStore::new());
    let tree = DirectoryTree::new(db.clone(), store.clone() as Arc<dyn ObjectStore>);
    let shares = ShareService::new(db.clone(), fast_share_config());
    TestVault {
        db,
        store,
        tree,
        shares,
    }
}

/// Create a user and return the user ID.
pub async fn create_user(db: &Database, username: &str) -> i64 {
    UserRepository::new(db.pool())
        .create(&NewUser::new(username))
        .await
        .unwrap()
        .id
}

/// Every directory in the database.
pub async fn all_directories(db: &Database) -> Vec<Directory> {
    sqlx::query_as::<_, Directory>(
        "SELECT id, name, path, owner_id, parent_id, created_at, updated_at
         FROM directories ORDER BY id",
    )
    .fetch_all(db.pool())
    .await
    .unwrap()
}

/// Every file in the database.
pub async fn all_files(db: &Database) -> Vec<FileEntry> {
    sqlx::query_as::<_, FileEntry>(
        "SELECT id, name, path, owner_id, parent_id, size, mime_type, storage_key,
                bucket, checksum, created_at, updated_at
         FROM files ORDER BY id",
    )
    .fetch_all(db.pool())
    .await
    .unwrap()
}

/// Assert that every node's path is its parent's path plus its own name.
pub async fn assert_paths_consistent(db: &Database) {
    let directories = all_directories(db).await;
    let expected = |parent_id: Option<i64>, name: &str| match parent_id {
        None => format!("/{name}"),
        Some(id) => {
            let parent = directories
                .iter()
                .find(|d| d.id == id)
                .unwrap_or_else(|| panic!("missing parent {id}"));
            format!("{}/{name}", parent.path)
        }
    };

    for directory in &directories {
        assert_eq!(
            directory.path,
            expected(directory.parent_id, &directory.name),
            "directory {} has a stale path",
            directory.id
        );
    }
    for file in all_files(db).await {
        assert_eq!(
            file.path,
            expected(file.parent_id, &file.name),
            "file {} has a stale path",
            file.id
        );
    }
}
