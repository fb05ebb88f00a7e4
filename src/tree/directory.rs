//! Directory records and repository.

use serde::Serialize;
use sqlx::SqliteExecutor;

use crate::Result;

const DIRECTORY_COLUMNS: &str = "id, name, path, owner_id, parent_id, created_at, updated_at";

/// A directory in a user's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Directory {
    /// Unique directory ID.
    pub id: i64,
    /// Directory name (a sanitized single component).
    pub name: String,
    /// Materialized path, e.g. `/docs/work`.
    pub path: String,
    /// Owning user.
    pub owner_id: i64,
    /// Parent directory (`None` under the user's root).
    pub parent_id: Option<i64>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last rename/move timestamp.
    pub updated_at: String,
}

/// Data for inserting a directory row.
#[derive(Debug, Clone)]
pub struct NewDirectory {
    /// Sanitized name.
    pub name: String,
    /// Precomputed materialized path.
    pub path: String,
    /// Owning user.
    pub owner_id: i64,
    /// Parent directory.
    pub parent_id: Option<i64>,
}

/// Directory queries. Every function takes an executor so callers can run
/// them on the pool or inside a transaction.
pub struct DirectoryRepository;

impl DirectoryRepository {
    /// Insert a directory row.
    pub async fn create<'e, E: SqliteExecutor<'e>>(
        executor: E,
        directory: &NewDirectory,
    ) -> Result<Directory> {
        let sql = format!(
            "INSERT INTO directories (name, path, owner_id, parent_id)
             VALUES (?, ?, ?, ?) RETURNING {DIRECTORY_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Directory>(&sql)
            .bind(&directory.name)
            .bind(&directory.path)
            .bind(directory.owner_id)
            .bind(directory.parent_id)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    /// Get a directory by ID.
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<Directory>> {
        let sql = format!("SELECT {DIRECTORY_COLUMNS} FROM directories WHERE id = ?");
        let directory = sqlx::query_as::<_, Directory>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(directory)
    }

    /// Child directories of `parent_id` (`None` for root) owned by `owner_id`,
    /// sorted by name.
    pub async fn list_children<'e, E: SqliteExecutor<'e>>(
        executor: E,
        owner_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<Directory>> {
        let sql = format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories
             WHERE owner_id = ? AND parent_id IS ? ORDER BY name ASC, id ASC"
        );
        let directories = sqlx::query_as::<_, Directory>(&sql)
            .bind(owner_id)
            .bind(parent_id)
            .fetch_all(executor)
            .await?;
        Ok(directories)
    }

    /// Direct subdirectories of `parent_id`, regardless of owner.
    pub async fn list_by_parent<'e, E: SqliteExecutor<'e>>(
        executor: E,
        parent_id: i64,
    ) -> Result<Vec<Directory>> {
        let sql = format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories WHERE parent_id = ? ORDER BY id"
        );
        let directories = sqlx::query_as::<_, Directory>(&sql)
            .bind(parent_id)
            .fetch_all(executor)
            .await?;
        Ok(directories)
    }

    /// Set name, path and parent in one statement.
    pub async fn update_location<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
        name: &str,
        path: &str,
        parent_id: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE directories SET name = ?, path = ?, parent_id = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(name)
        .bind(path)
        .bind(parent_id)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rewrite the materialized path only.
    pub async fn update_path<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
        path: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE directories SET path = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(path)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of direct children (directories and files).
    pub async fn count_children<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM directories WHERE parent_id = ?1)
                  + (SELECT COUNT(*) FROM files WHERE parent_id = ?1)",
        )
        .bind(id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Delete a directory row.
    pub async fn delete<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM directories WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("alice"))
            .await
            .unwrap();
        (db, user.id)
    }

    fn new_dir(name: &str, path: &str, owner_id: i64, parent_id: Option<i64>) -> NewDirectory {
        NewDirectory {
            name: name.to_string(),
            path: path.to_string(),
            owner_id,
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, owner) = setup().await;

        let dir = DirectoryRepository::create(db.pool(), &new_dir("docs", "/docs", owner, None))
            .await
            .unwrap();
        assert_eq!(dir.name, "docs");
        assert_eq!(dir.path, "/docs");
        assert!(dir.parent_id.is_none());

        let found = DirectoryRepository::get_by_id(db.pool(), dir.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, dir);
        assert!(DirectoryRepository::get_by_id(db.pool(), 9999)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_children_sorted_by_name() {
        let (db, owner) = setup().await;
        let pool = db.pool();

        let root = DirectoryRepository::create(pool, &new_dir("root", "/root", owner, None))
            .await
            .unwrap();
        for name in ["zeta", "alpha", "mid"] {
            DirectoryRepository::create(
                pool,
                &new_dir(name, &format!("/root/{name}"), owner, Some(root.id)),
            )
            .await
            .unwrap();
        }

        let children = DirectoryRepository::list_children(pool, owner, Some(root.id))
            .await
            .unwrap();
        let names: Vec<_> = children.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);

        let roots = DirectoryRepository::list_children(pool, owner, None)
            .await
            .unwrap();
        assert_eq!(roots.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, owner) = setup().await;
        let pool = db.pool();

        let dir = DirectoryRepository::create(pool, &new_dir("a", "/a", owner, None))
            .await
            .unwrap();
        assert!(
            DirectoryRepository::update_location(pool, dir.id, "b", "/b", None)
                .await
                .unwrap()
        );
        let renamed = DirectoryRepository::get_by_id(pool, dir.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "b");
        assert_eq!(renamed.path, "/b");

        assert_eq!(
            DirectoryRepository::count_children(pool, dir.id)
                .await
                .unwrap(),
            0
        );
        assert!(DirectoryRepository::delete(pool, dir.id).await.unwrap());
        assert!(!DirectoryRepository::delete(pool, dir.id).await.unwrap());
    }
}
