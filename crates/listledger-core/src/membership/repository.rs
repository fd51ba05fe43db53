//! Membership storage repository.

use std::collections::BTreeSet;

use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use tracing::debug;

use super::model::Membership;
use crate::db::{now, parse_timestamp};
use crate::list::{ListId, ListRepository};
use crate::subscriber::SubscriberId;
use crate::{Error, Result};

/// Repository for list memberships.
///
/// Borrows a connection so that every call can take part in the
/// caller's transaction.
pub struct MembershipRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MembershipRepository<'c> {
    /// Create a repository over the given connection.
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Add a subscriber to a list.
    ///
    /// Returns `false` if the subscriber already belonged to the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn add(&mut self, list_id: ListId, subscriber_id: SubscriberId) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO subscriptions (list_id, subscriber_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(list_id, subscriber_id) DO NOTHING
            ",
        )
        .bind(list_id.0)
        .bind(subscriber_id.0)
        .bind(now())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a subscriber from a list.
    ///
    /// Returns `true` if at least one row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn remove(&mut self, list_id: ListId, subscriber_id: SubscriberId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE list_id = ? AND subscriber_id = ?")
                .bind(list_id.0)
                .bind(subscriber_id.0)
                .execute(&mut *self.conn)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether a subscriber belongs to a list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&mut self, list_id: ListId, subscriber_id: SubscriberId) -> Result<bool> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM subscriptions
            WHERE list_id = ? AND subscriber_id = ?
            ",
        )
        .bind(list_id.0)
        .bind(subscriber_id.0)
        .fetch_one(&mut *self.conn)
        .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Count the subscribers of a list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub async fn count_for_list(&mut self, list_id: ListId) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM subscriptions WHERE list_id = ?")
            .bind(list_id.0)
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(row.get::<i64, _>("count") as u32)
    }

    /// Get a subscriber's memberships, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn for_subscriber(&mut self, subscriber_id: SubscriberId) -> Result<Vec<Membership>> {
        let rows = sqlx::query(
            r"
            SELECT id, list_id, subscriber_id, created_at
            FROM subscriptions
            WHERE subscriber_id = ?
            ORDER BY id ASC
            ",
        )
        .bind(subscriber_id.0)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_membership).collect())
    }

    /// Get a list's memberships, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn for_list(&mut self, list_id: ListId) -> Result<Vec<Membership>> {
        let rows = sqlx::query(
            r"
            SELECT id, list_id, subscriber_id, created_at
            FROM subscriptions
            WHERE list_id = ?
            ORDER BY id ASC
            ",
        )
        .bind(list_id.0)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_membership).collect())
    }

    /// Get the IDs of the lists a subscriber belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_ids_for_subscriber(
        &mut self,
        subscriber_id: SubscriberId,
    ) -> Result<BTreeSet<ListId>> {
        Ok(self
            .for_subscriber(subscriber_id)
            .await?
            .into_iter()
            .map(|membership| membership.list_id)
            .collect())
    }

    /// Replace every membership of a subscriber with the given lists.
    ///
    /// Each list ID is resolved before anything is written, so an unknown
    /// list leaves the existing memberships untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownList`] if a list does not exist, or an
    /// error if the database query fails.
    pub async fn replace_all_for_subscriber(
        &mut self,
        subscriber_id: SubscriberId,
        list_ids: &BTreeSet<ListId>,
    ) -> Result<()> {
        let mut lists = ListRepository::new(&mut *self.conn);
        for &list_id in list_ids {
            if lists.find_by_id(list_id).await?.is_none() {
                return Err(Error::UnknownList(list_id));
            }
        }

        let removed = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ?")
            .bind(subscriber_id.0)
            .execute(&mut *self.conn)
            .await?;

        for &list_id in list_ids {
            self.add(list_id, subscriber_id).await?;
        }

        debug!(
            "Replaced {} memberships of subscriber {subscriber_id} with {}",
            removed.rows_affected(),
            list_ids.len()
        );
        Ok(())
    }
}

/// Convert a database row to a Membership.
fn row_to_membership(row: &SqliteRow) -> Membership {
    Membership {
        id: row.get("id"),
        list_id: ListId::new(row.get("list_id")),
        subscriber_id: SubscriberId::new(row.get("subscriber_id")),
        created_at: parse_timestamp(row.get("created_at")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::list::SUBSCRIBER_LIST_TYPE;
    use crate::subscriber::{SubscriberIdentity, SubscriberRepository};

    async fn seed(db: &Database, handles: &[&str]) -> (Vec<ListId>, SubscriberId) {
        let mut conn = db.acquire().await.unwrap();
        let mut ids = Vec::new();
        for handle in handles {
            let list = ListRepository::new(&mut conn)
                .find_or_create(SUBSCRIBER_LIST_TYPE, handle, None)
                .await
                .unwrap()
                .unwrap();
            ids.push(list.id);
        }
        let subscriber = SubscriberRepository::new(&mut conn)
            .insert(&SubscriberIdentity::from_email("a@x.com"), None, None)
            .await
            .unwrap();
        (ids, subscriber.id)
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let (lists, subscriber) = seed(&db, &["newsletter"]).await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = MembershipRepository::new(&mut conn);

        assert!(repo.add(lists[0], subscriber).await.unwrap());
        assert!(!repo.add(lists[0], subscriber).await.unwrap());
        assert_eq!(repo.count_for_list(lists[0]).await.unwrap(), 1);
        assert!(repo.exists(lists[0], subscriber).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let db = Database::in_memory().await.unwrap();
        let (lists, subscriber) = seed(&db, &["newsletter"]).await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = MembershipRepository::new(&mut conn);

        assert!(!repo.remove(lists[0], subscriber).await.unwrap());
        repo.add(lists[0], subscriber).await.unwrap();
        assert!(repo.remove(lists[0], subscriber).await.unwrap());
        assert!(!repo.exists(lists[0], subscriber).await.unwrap());
        assert_eq!(repo.count_for_list(lists[0]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_list() {
        let db = Database::in_memory().await.unwrap();
        let (_, subscriber) = seed(&db, &[]).await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = MembershipRepository::new(&mut conn);

        assert!(matches!(
            repo.add(ListId(404), subscriber).await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_all_for_subscriber() {
        let db = Database::in_memory().await.unwrap();
        let (lists, subscriber) = seed(&db, &["a", "b", "c"]).await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = MembershipRepository::new(&mut conn);

        repo.add(lists[0], subscriber).await.unwrap();
        repo.add(lists[1], subscriber).await.unwrap();

        let wanted = BTreeSet::from([lists[1], lists[2]]);
        repo.replace_all_for_subscriber(subscriber, &wanted)
            .await
            .unwrap();

        assert_eq!(repo.list_ids_for_subscriber(subscriber).await.unwrap(), wanted);
    }

    #[tokio::test]
    async fn test_replace_with_unknown_list_keeps_memberships() {
        let db = Database::in_memory().await.unwrap();
        let (lists, subscriber) = seed(&db, &["a", "b"]).await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = MembershipRepository::new(&mut conn);

        repo.add(lists[0], subscriber).await.unwrap();

        let result = repo
            .replace_all_for_subscriber(subscriber, &BTreeSet::from([lists[1], ListId(404)]))
            .await;
        assert!(matches!(result, Err(Error::UnknownList(ListId(404)))));
        assert_eq!(
            repo.list_ids_for_subscriber(subscriber).await.unwrap(),
            BTreeSet::from([lists[0]])
        );
    }

    #[tokio::test]
    async fn test_replace_with_empty_set_clears() {
        let db = Database::in_memory().await.unwrap();
        let (lists, subscriber) = seed(&db, &["a"]).await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = MembershipRepository::new(&mut conn);

        repo.add(lists[0], subscriber).await.unwrap();
        repo.replace_all_for_subscriber(subscriber, &BTreeSet::new())
            .await
            .unwrap();
        assert!(repo.for_subscriber(subscriber).await.unwrap().is_empty());
        assert!(repo.for_list(lists[0]).await.unwrap().is_empty());
    }
}
