//! List storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use tracing::debug;

use super::model::{List, ListId};
use crate::Result;
use crate::db::{now, parse_timestamp};
use crate::subscriber::SubscriberId;

const LIST_COLUMNS: &str =
    "id, element_id, list_type, name, handle, total_subscribers, created_at, updated_at";

/// Values used to create or rename a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDraft {
    /// Existing list to update, `None` to create a new one.
    pub id: Option<ListId>,
    /// Host content element, if any.
    pub element_id: Option<i64>,
    /// List type handle.
    pub list_type: String,
    /// Display name.
    pub name: String,
    /// Handle, unique within the list type.
    pub handle: String,
}

/// Repository for list lookup and storage.
///
/// Borrows a connection so that every call can take part in the
/// caller's transaction.
pub struct ListRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ListRepository<'c> {
    /// Create a repository over the given connection.
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Get list by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&mut self, id: ListId) -> Result<Option<List>> {
        let row = sqlx::query(&format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(row.as_ref().map(row_to_list))
    }

    /// Get the first list with the given handle, regardless of its type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_handle(&mut self, handle: &str) -> Result<Option<List>> {
        let row = sqlx::query(&format!(
            "SELECT {LIST_COLUMNS} FROM lists WHERE handle = ? ORDER BY id LIMIT 1"
        ))
        .bind(handle.trim())
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.as_ref().map(row_to_list))
    }

    /// Get list by its natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_type_and_handle(
        &mut self,
        list_type: &str,
        handle: &str,
    ) -> Result<Option<List>> {
        let row = sqlx::query(&format!(
            "SELECT {LIST_COLUMNS} FROM lists WHERE list_type = ? AND handle = ?"
        ))
        .bind(list_type.trim())
        .bind(handle.trim())
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.as_ref().map(row_to_list))
    }

    /// Find a list by type and handle, creating it if absent.
    ///
    /// New lists are named after their handle and start with no
    /// subscribers. Returns `None` when the handle is empty, since no
    /// list can be keyed on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_or_create(
        &mut self,
        list_type: &str,
        handle: &str,
        element_id: Option<i64>,
    ) -> Result<Option<List>> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Ok(None);
        }

        if let Some(list) = self.find_by_type_and_handle(list_type, handle).await? {
            return Ok(Some(list));
        }

        let draft = ListDraft {
            id: None,
            element_id,
            list_type: list_type.trim().to_string(),
            name: handle.to_string(),
            handle: handle.to_string(),
        };
        let list = self.save(&draft).await?;
        if let Some(list) = &list {
            debug!("Created list {} ({}:{})", list.id, list.list_type, list.handle);
        }
        Ok(list)
    }

    /// Save a list (insert or update).
    ///
    /// A new list always starts with a zero subscriber count. Returns
    /// `None` when updating a list that no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails, including when the
    /// type and handle collide with another list.
    pub async fn save(&mut self, draft: &ListDraft) -> Result<Option<List>> {
        let timestamp = now();

        let id = if let Some(id) = draft.id {
            let updated = sqlx::query(
                r"
                UPDATE lists SET
                    element_id = ?, list_type = ?, name = ?, handle = ?,
                    updated_at = ?
                WHERE id = ?
                ",
            )
            .bind(draft.element_id)
            .bind(draft.list_type.trim())
            .bind(draft.name.trim())
            .bind(draft.handle.trim())
            .bind(&timestamp)
            .bind(id.0)
            .execute(&mut *self.conn)
            .await?;

            if updated.rows_affected() == 0 {
                return Ok(None);
            }
            id
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO lists (
                    element_id, list_type, name, handle, total_subscribers,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, 0, ?, ?)
                ",
            )
            .bind(draft.element_id)
            .bind(draft.list_type.trim())
            .bind(draft.name.trim())
            .bind(draft.handle.trim())
            .bind(&timestamp)
            .bind(&timestamp)
            .execute(&mut *self.conn)
            .await?;

            ListId::new(result.last_insert_rowid())
        };

        self.find_by_id(id).await
    }

    /// Get all lists ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn all(&mut self) -> Result<Vec<List>> {
        let rows = sqlx::query(&format!(
            "SELECT {LIST_COLUMNS} FROM lists ORDER BY name COLLATE NOCASE ASC, id ASC"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_list).collect())
    }

    /// Get all lists that have at least one subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn with_subscribers(&mut self) -> Result<Vec<List>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {LIST_COLUMNS} FROM lists
            WHERE id IN (SELECT DISTINCT list_id FROM subscriptions)
            ORDER BY name COLLATE NOCASE ASC, id ASC
            "
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_list).collect())
    }

    /// Get the lists a subscriber belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn for_subscriber(&mut self, subscriber_id: SubscriberId) -> Result<Vec<List>> {
        let rows = sqlx::query(
            r"
            SELECT l.id, l.element_id, l.list_type, l.name, l.handle,
                   l.total_subscribers, l.created_at, l.updated_at
            FROM lists l
            JOIN subscriptions s ON s.list_id = l.id
            WHERE s.subscriber_id = ?
            ORDER BY l.name COLLATE NOCASE ASC, l.id ASC
            ",
        )
        .bind(subscriber_id.0)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_list).collect())
    }

    /// Get the IDs of every list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn all_ids(&mut self) -> Result<Vec<ListId>> {
        let rows = sqlx::query("SELECT id FROM lists ORDER BY id")
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.iter().map(|row| ListId::new(row.get("id"))).collect())
    }

    /// Store a recomputed subscriber count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_total_subscribers(&mut self, id: ListId, total: u32) -> Result<()> {
        sqlx::query("UPDATE lists SET total_subscribers = ?, updated_at = ? WHERE id = ?")
            .bind(i64::from(total))
            .bind(now())
            .bind(id.0)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    /// Delete a list. Its memberships are removed by cascade.
    ///
    /// Returns `true` if a list was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&mut self, id: ListId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id.0)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Convert a database row to a List.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_list(row: &SqliteRow) -> List {
    List {
        id: ListId::new(row.get("id")),
        element_id: row.get("element_id"),
        list_type: row.get("list_type"),
        name: row.get("name"),
        handle: row.get("handle"),
        total_subscribers: row.get::<i64, _>("total_subscribers") as u32,
        created_at: parse_timestamp(row.get("created_at")),
        updated_at: parse_timestamp(row.get("updated_at")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::list::SUBSCRIBER_LIST_TYPE;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        let first = repo
            .find_or_create(SUBSCRIBER_LIST_TYPE, "newsletter", None)
            .await
            .unwrap()
            .unwrap();
        let second = repo
            .find_or_create(SUBSCRIBER_LIST_TYPE, "newsletter", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "newsletter");
        assert_eq!(first.total_subscribers, 0);
        assert_eq!(repo.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_or_create_rejects_empty_handle() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        let list = repo
            .find_or_create(SUBSCRIBER_LIST_TYPE, "  ", None)
            .await
            .unwrap();
        assert!(list.is_none());
        assert!(repo.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_handle_different_type() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        let a = repo
            .find_or_create(SUBSCRIBER_LIST_TYPE, "news", None)
            .await
            .unwrap()
            .unwrap();
        let b = repo
            .find_or_create("wishlist", "news", Some(7))
            .await
            .unwrap()
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(b.element_id, Some(7));
        let by_handle = repo.find_by_handle("news").await.unwrap().unwrap();
        assert_eq!(by_handle.id, a.id);
    }

    #[tokio::test]
    async fn test_lookups_return_none_when_missing() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        assert!(repo.find_by_id(ListId(99)).await.unwrap().is_none());
        assert!(repo.find_by_handle("missing").await.unwrap().is_none());
        assert!(
            repo.find_by_type_and_handle(SUBSCRIBER_LIST_TYPE, "missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_save_renames_existing_list() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        let created = repo
            .save(&ListDraft {
                list_type: SUBSCRIBER_LIST_TYPE.to_string(),
                name: "Weekly".to_string(),
                handle: "weekly".to_string(),
                ..ListDraft::default()
            })
            .await
            .unwrap()
            .unwrap();

        let renamed = repo
            .save(&ListDraft {
                id: Some(created.id),
                list_type: SUBSCRIBER_LIST_TYPE.to_string(),
                name: "Weekly Digest".to_string(),
                handle: "weekly".to_string(),
                element_id: None,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.name, "Weekly Digest");
    }

    #[tokio::test]
    async fn test_save_missing_list_returns_none() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        let result = repo
            .save(&ListDraft {
                id: Some(ListId(5)),
                list_type: SUBSCRIBER_LIST_TYPE.to_string(),
                name: "Gone".to_string(),
                handle: "gone".to_string(),
                element_id: None,
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_set_total_and_delete() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ListRepository::new(&mut conn);

        let list = repo
            .find_or_create(SUBSCRIBER_LIST_TYPE, "newsletter", None)
            .await
            .unwrap()
            .unwrap();
        repo.set_total_subscribers(list.id, 3).await.unwrap();
        assert_eq!(
            repo.find_by_id(list.id).await.unwrap().unwrap().total_subscribers,
            3
        );

        assert!(repo.delete(list.id).await.unwrap());
        assert!(!repo.delete(list.id).await.unwrap());
        assert!(repo.all_ids().await.unwrap().is_empty());
    }
}
