//! Subscriber storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use tracing::debug;

use super::model::{Subscriber, SubscriberId, SubscriberIdentity, UserRef, normalize_email};
use crate::db::{now, parse_timestamp};
use crate::list::ListId;
use crate::users::UserDirectory;
use crate::{Error, Result};

const SUBSCRIBER_COLUMNS: &str =
    "id, user_id, email, first_name, last_name, created_at, updated_at";

/// Repository for subscriber lookup and storage.
///
/// Borrows a connection so that every call can take part in the
/// caller's transaction.
pub struct SubscriberRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SubscriberRepository<'c> {
    /// Create a repository over the given connection.
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Get subscriber by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&mut self, id: SubscriberId) -> Result<Option<Subscriber>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.as_ref().map(row_to_subscriber))
    }

    /// Get subscriber by host user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_user(&mut self, user_ref: UserRef) -> Result<Option<Subscriber>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE user_id = ?"
        ))
        .bind(user_ref.0)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.as_ref().map(row_to_subscriber))
    }

    /// Get the oldest subscriber with the given email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&mut self, email: &str) -> Result<Option<Subscriber>> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE email = ? ORDER BY id LIMIT 1"
        ))
        .bind(&email)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.as_ref().map(row_to_subscriber))
    }

    /// Resolve an identity to an existing subscriber without creating one.
    ///
    /// When both fields are set, a record matching both wins; otherwise
    /// the user reference is tried before the email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(&mut self, identity: &SubscriberIdentity) -> Result<Option<Subscriber>> {
        if let (Some(user_ref), Some(email)) = (identity.user_ref, identity.email.as_deref()) {
            let row = sqlx::query(&format!(
                "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE user_id = ? AND email = ?"
            ))
            .bind(user_ref.0)
            .bind(email)
            .fetch_optional(&mut *self.conn)
            .await?;

            if let Some(row) = row {
                return Ok(Some(row_to_subscriber(&row)));
            }
        }

        if let Some(user_ref) = identity.user_ref
            && let Some(subscriber) = self.find_by_user(user_ref).await?
        {
            return Ok(Some(subscriber));
        }

        match identity.email.as_deref() {
            Some(email) => self.find_by_email(email).await,
            None => Ok(None),
        }
    }

    /// Resolve an identity to a subscriber, creating one on first contact.
    ///
    /// A subscriber created from a user reference alone gets its email
    /// from the user directory when the directory knows it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the identity is empty, or an
    /// error if the database query fails.
    pub async fn find_or_create(
        &mut self,
        identity: &SubscriberIdentity,
        users: &dyn UserDirectory,
    ) -> Result<Subscriber> {
        if identity.is_empty() {
            return Err(Error::InvalidIdentity);
        }

        if let Some(subscriber) = self.find(identity).await? {
            return Ok(subscriber);
        }

        let mut identity = identity.clone();
        if identity.email.is_none()
            && let Some(user_ref) = identity.user_ref
        {
            identity.email = users
                .email_for(user_ref)
                .as_deref()
                .and_then(normalize_email);
        }

        let subscriber = self.insert(&identity, None, None).await?;
        debug!("Created subscriber {}", subscriber.id);
        Ok(subscriber)
    }

    /// Insert a new subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the identity is empty, or an
    /// error if the database query fails.
    pub async fn insert(
        &mut self,
        identity: &SubscriberIdentity,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Subscriber> {
        if identity.is_empty() {
            return Err(Error::InvalidIdentity);
        }

        let timestamp = now();
        let result = sqlx::query(
            r"
            INSERT INTO subscribers (user_id, email, first_name, last_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(identity.user_ref.map(|user| user.0))
        .bind(identity.email.as_deref())
        .bind(first_name)
        .bind(last_name)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *self.conn)
        .await?;

        let id = SubscriberId::new(result.last_insert_rowid());
        self.find_by_id(id)
            .await?
            .ok_or(Error::Storage(sqlx::Error::RowNotFound))
    }

    /// Update an existing subscriber's identity and names.
    ///
    /// Returns `None` if the subscriber does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the identity is empty, or an
    /// error if the database query fails.
    pub async fn update(
        &mut self,
        id: SubscriberId,
        identity: &SubscriberIdentity,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Option<Subscriber>> {
        if identity.is_empty() {
            return Err(Error::InvalidIdentity);
        }

        let updated = sqlx::query(
            r"
            UPDATE subscribers SET
                user_id = ?, email = ?, first_name = ?, last_name = ?,
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(identity.user_ref.map(|user| user.0))
        .bind(identity.email.as_deref())
        .bind(first_name)
        .bind(last_name)
        .bind(now())
        .bind(id.0)
        .execute(&mut *self.conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Get all subscribers ordered by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn all(&mut self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers ORDER BY email ASC, id ASC"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_subscriber).collect())
    }

    /// Get the subscribers of a list, oldest membership first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn for_list(&mut self, list_id: ListId) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(
            r"
            SELECT sub.id, sub.user_id, sub.email, sub.first_name, sub.last_name,
                   sub.created_at, sub.updated_at
            FROM subscribers sub
            JOIN subscriptions s ON s.subscriber_id = sub.id
            WHERE s.list_id = ?
            ORDER BY s.id ASC
            ",
        )
        .bind(list_id.0)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.iter().map(row_to_subscriber).collect())
    }

    /// Delete a subscriber. Its memberships are removed by cascade.
    ///
    /// Returns `true` if a subscriber was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&mut self, id: SubscriberId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscribers WHERE id = ?")
            .bind(id.0)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Convert a database row to a Subscriber.
fn row_to_subscriber(row: &SqliteRow) -> Subscriber {
    Subscriber {
        id: SubscriberId::new(row.get("id")),
        user_ref: row.get::<Option<i64>, _>("user_id").map(UserRef::new),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: parse_timestamp(row.get("created_at")),
        updated_at: parse_timestamp(row.get("updated_at")),
    }
}
