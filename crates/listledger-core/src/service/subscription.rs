//! Subscription workflow: subscribe, unsubscribe, membership checks and
//! subscriber count maintenance.
//!
//! Every public write runs in its own transaction. A transaction that is
//! not committed is rolled back when it is dropped, so an error returned
//! with `?` never leaves partial writes behind.

use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info, warn};

use super::request::{SubscribeRequest, SubscriptionQuery, UnsubscribeRequest};
use crate::config::Settings;
use crate::db::Database;
use crate::list::{List, ListDraft, ListId, ListRepository};
use crate::membership::{Membership, MembershipRepository};
use crate::present::ListPicker;
use crate::subscriber::{
    Subscriber, SubscriberDraft, SubscriberId, SubscriberIdentity, SubscriberRepository,
};
use crate::users::{NoUsers, UserDirectory};
use crate::{Error, Result};

/// Coordinates lists, subscribers and memberships.
#[derive(Clone)]
pub struct SubscriptionService {
    db: Database,
    settings: Settings,
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for SubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionService")
            .field("db", &self.db)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SubscriptionService {
    /// Create a service that knows no host users.
    #[must_use]
    pub fn new(db: Database, settings: Settings) -> Self {
        Self {
            db,
            settings,
            users: Arc::new(NoUsers),
        }
    }

    /// Use the given directory to look up emails of host users.
    #[must_use]
    pub fn with_user_directory(mut self, users: impl UserDirectory + 'static) -> Self {
        self.users = Arc::new(users);
        self
    }

    /// Settings the service was created with.
    #[must_use]
    pub const fn settings(&self) -> Settings {
        self.settings
    }

    /// The underlying database.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    // Subscriptions
    // =========================================================================

    /// Subscribe to a list, creating the list and the subscriber on first
    /// contact.
    ///
    /// Returns `false` without writing anything when no list or
    /// subscriber could be produced. With user sync disabled the user
    /// reference is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] before any write if neither an
    /// email nor a usable user reference is given, or a storage error,
    /// in which case the transaction is rolled back.
    pub async fn subscribe(&self, request: &SubscribeRequest) -> Result<bool> {
        let identity = request
            .identity()
            .with_user_sync(self.settings.enable_user_sync)
            .validate()?;

        let mut tx = self.db.begin().await?;

        let Some(list) = ListRepository::new(&mut tx)
            .find_or_create(&request.list_type, &request.list_handle, request.element_id)
            .await?
        else {
            warn!(
                "Subscription declined: no list for {}:{}",
                request.list_type, request.list_handle
            );
            tx.rollback().await?;
            return Ok(false);
        };

        let subscriber = SubscriberRepository::new(&mut tx)
            .find_or_create(&identity, self.users.as_ref())
            .await?;

        let added = MembershipRepository::new(&mut tx)
            .add(list.id, subscriber.id)
            .await?;
        let total = refresh_count_in(&mut tx, list.id).await?;

        tx.commit().await?;

        if added {
            info!(
                "Subscribed {} to {}:{} ({total} subscribers)",
                subscriber.display(),
                list.list_type,
                list.handle
            );
        } else {
            debug!(
                "{} already subscribed to {}:{}",
                subscriber.display(),
                list.list_type,
                list.handle
            );
        }
        Ok(true)
    }

    /// Unsubscribe from a list.
    ///
    /// The subscriber is looked up by user reference when user sync is
    /// enabled and one is given, by email otherwise. Returns `false` when
    /// the list, the subscriber or the membership does not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error, in which case the transaction is rolled
    /// back.
    pub async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<bool> {
        let identity = request.identity();
        let mut tx = self.db.begin().await?;

        let list = {
            let mut lists = ListRepository::new(&mut tx);
            match request.list_id {
                Some(id) => lists.find_by_id(id).await?,
                None => {
                    lists
                        .find_by_type_and_handle(&request.list_type, &request.list_handle)
                        .await?
                }
            }
        };
        let Some(list) = list else {
            debug!("Unsubscribe declined: list not found");
            tx.rollback().await?;
            return Ok(false);
        };

        let subscriber = {
            let mut subscribers = SubscriberRepository::new(&mut tx);
            match (identity.user_ref, identity.email.as_deref()) {
                (Some(user_ref), _) if self.settings.enable_user_sync => {
                    subscribers.find_by_user(user_ref).await?
                }
                (_, Some(email)) => subscribers.find_by_email(email).await?,
                _ => None,
            }
        };
        let Some(subscriber) = subscriber else {
            debug!("Unsubscribe declined: subscriber not found");
            tx.rollback().await?;
            return Ok(false);
        };

        let removed = MembershipRepository::new(&mut tx)
            .remove(list.id, subscriber.id)
            .await?;
        if !removed {
            tx.rollback().await?;
            return Ok(false);
        }

        let total = refresh_count_in(&mut tx, list.id).await?;
        tx.commit().await?;

        info!(
            "Unsubscribed {} from {}:{} ({total} subscribers)",
            subscriber.display(),
            list.list_type,
            list.handle
        );
        Ok(true)
    }

    /// Check whether a subscriber belongs to the list with the given
    /// handle, and type when the query names one. Nothing is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingArgument`] if the handle is empty, if
    /// neither a user reference nor an email is given, or if user sync
    /// is disabled and no email is given.
    pub async fn is_subscribed(&self, query: &SubscriptionQuery) -> Result<bool> {
        if query.list_handle.trim().is_empty() {
            return Err(Error::MissingArgument("list_handle"));
        }

        let identity = query.identity();
        if identity.is_empty() || (!self.settings.enable_user_sync && identity.email.is_none()) {
            return Err(Error::MissingArgument("user_ref or email"));
        }
        let identity = identity.with_user_sync(self.settings.enable_user_sync);

        let mut conn = self.db.acquire().await?;

        let list = {
            let mut lists = ListRepository::new(&mut conn);
            match query.list_type.as_deref() {
                Some(list_type) => {
                    lists
                        .find_by_type_and_handle(list_type, &query.list_handle)
                        .await?
                }
                None => lists.find_by_handle(&query.list_handle).await?,
            }
        };
        let Some(list) = list else {
            return Ok(false);
        };
        let Some(subscriber) = SubscriberRepository::new(&mut conn)
            .find(&identity)
            .await?
        else {
            return Ok(false);
        };

        MembershipRepository::new(&mut conn)
            .exists(list.id, subscriber.id)
            .await
    }

    /// Replace every membership of a subscriber, then refresh the counts
    /// of all lists.
    ///
    /// Returns `false` if the subscriber does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownList`] if any list does not exist, leaving
    /// the previous memberships in place, or a storage error.
    pub async fn replace_subscriptions(
        &self,
        subscriber_id: SubscriberId,
        list_ids: &BTreeSet<ListId>,
    ) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        if SubscriberRepository::new(&mut tx)
            .find_by_id(subscriber_id)
            .await?
            .is_none()
        {
            tx.rollback().await?;
            return Ok(false);
        }

        MembershipRepository::new(&mut tx)
            .replace_all_for_subscriber(subscriber_id, list_ids)
            .await?;
        refresh_all_counts_in(&mut tx).await?;

        tx.commit().await?;
        info!(
            "Subscriber {subscriber_id} now belongs to {} lists",
            list_ids.len()
        );
        Ok(true)
    }

    // Counts
    // =========================================================================

    /// Recompute the subscriber count of one list.
    ///
    /// Returns the new count, or `None` if the list does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn refresh_count(&self, list_id: ListId) -> Result<Option<u32>> {
        let mut tx = self.db.begin().await?;

        if ListRepository::new(&mut tx).find_by_id(list_id).await?.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }
        let total = refresh_count_in(&mut tx, list_id).await?;

        tx.commit().await?;
        Ok(Some(total))
    }

    /// Recompute the subscriber count of every list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn refresh_all_counts(&self) -> Result<()> {
        let mut tx = self.db.begin().await?;
        refresh_all_counts_in(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // Administration
    // =========================================================================

    /// Create or rename a list. New lists start with no subscribers.
    ///
    /// Returns `None` when renaming a list that does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingArgument`] for an empty type or handle, or
    /// a storage error, including when the type and handle are taken.
    pub async fn save_list(&self, draft: &ListDraft) -> Result<Option<List>> {
        if draft.list_type.trim().is_empty() {
            return Err(Error::MissingArgument("list_type"));
        }
        if draft.handle.trim().is_empty() {
            return Err(Error::MissingArgument("list_handle"));
        }

        let mut tx = self.db.begin().await?;
        let list = ListRepository::new(&mut tx).save(draft).await?;
        tx.commit().await?;

        if let Some(list) = &list {
            info!("Saved list {} ({}:{})", list.id, list.list_type, list.handle);
        }
        Ok(list)
    }

    /// Create or update a subscriber together with the complete set of
    /// lists it belongs to.
    ///
    /// Returns `None` when updating a subscriber that does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] for an empty identity,
    /// [`Error::UnknownList`] if any list does not exist, or a storage
    /// error. Nothing is written in any of these cases.
    pub async fn save_subscriber(&self, draft: &SubscriberDraft) -> Result<Option<Subscriber>> {
        let identity = draft.identity.clone().validate()?;
        let first_name = draft.first_name.as_deref();
        let last_name = draft.last_name.as_deref();

        let mut tx = self.db.begin().await?;

        let subscriber = {
            let mut subscribers = SubscriberRepository::new(&mut tx);
            match draft.id {
                Some(id) => {
                    subscribers
                        .update(id, &identity, first_name, last_name)
                        .await?
                }
                None => Some(subscribers.insert(&identity, first_name, last_name).await?),
            }
        };
        let Some(subscriber) = subscriber else {
            tx.rollback().await?;
            return Ok(None);
        };

        MembershipRepository::new(&mut tx)
            .replace_all_for_subscriber(subscriber.id, &draft.list_ids)
            .await?;
        refresh_all_counts_in(&mut tx).await?;

        tx.commit().await?;
        info!(
            "Saved subscriber {} with {} lists",
            subscriber.display(),
            draft.list_ids.len()
        );
        Ok(Some(subscriber))
    }

    /// Delete a subscriber and its memberships, then refresh the counts
    /// of all lists.
    ///
    /// Returns the deleted subscriber, or `None` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_subscriber(&self, id: SubscriberId) -> Result<Option<Subscriber>> {
        let mut tx = self.db.begin().await?;

        let mut subscribers = SubscriberRepository::new(&mut tx);
        let Some(subscriber) = subscribers.find_by_id(id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        subscribers.delete(id).await?;
        refresh_all_counts_in(&mut tx).await?;

        tx.commit().await?;
        info!("Deleted subscriber {}", subscriber.display());
        Ok(Some(subscriber))
    }

    /// Delete a list and its memberships.
    ///
    /// Returns the deleted list, or `None` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_list(&self, id: ListId) -> Result<Option<List>> {
        let mut tx = self.db.begin().await?;

        let mut lists = ListRepository::new(&mut tx);
        let Some(list) = lists.find_by_id(id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        lists.delete(id).await?;

        tx.commit().await?;
        info!("Deleted list {} ({}:{})", list.id, list.list_type, list.handle);
        Ok(Some(list))
    }

    // Queries
    // =========================================================================

    /// Lists a subscriber belongs to, or every list when no identity is
    /// given.
    ///
    /// An identity that matches no subscriber yields no lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn lists(&self, identity: Option<&SubscriberIdentity>) -> Result<Vec<List>> {
        let mut conn = self.db.acquire().await?;

        let Some(identity) = identity else {
            return ListRepository::new(&mut conn).all().await;
        };
        let identity = identity
            .clone()
            .with_user_sync(self.settings.enable_user_sync);
        if identity.is_empty() {
            return Ok(Vec::new());
        }

        match SubscriberRepository::new(&mut conn).find(&identity).await? {
            Some(subscriber) => ListRepository::new(&mut conn).for_subscriber(subscriber.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Lists the subscriber with the given ID belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn lists_for_subscriber(&self, subscriber_id: SubscriberId) -> Result<Vec<List>> {
        let mut conn = self.db.acquire().await?;
        ListRepository::new(&mut conn)
            .for_subscriber(subscriber_id)
            .await
    }

    /// Number of lists [`Self::lists`] returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_count(&self, identity: Option<&SubscriberIdentity>) -> Result<usize> {
        Ok(self.lists(identity).await?.len())
    }

    /// Get list by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_id(&self, id: ListId) -> Result<Option<List>> {
        let mut conn = self.db.acquire().await?;
        ListRepository::new(&mut conn).find_by_id(id).await
    }

    /// Get the first list with the given handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_handle(&self, handle: &str) -> Result<Option<List>> {
        let mut conn = self.db.acquire().await?;
        ListRepository::new(&mut conn).find_by_handle(handle).await
    }

    /// Lists that have at least one subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn lists_with_subscribers(&self) -> Result<Vec<List>> {
        let mut conn = self.db.acquire().await?;
        ListRepository::new(&mut conn).with_subscribers().await
    }

    /// Get subscriber by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn subscriber_by_id(&self, id: SubscriberId) -> Result<Option<Subscriber>> {
        let mut conn = self.db.acquire().await?;
        SubscriberRepository::new(&mut conn).find_by_id(id).await
    }

    /// Every subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn all_subscribers(&self) -> Result<Vec<Subscriber>> {
        let mut conn = self.db.acquire().await?;
        SubscriberRepository::new(&mut conn).all().await
    }

    /// Subscribers of the list with the given type and handle.
    ///
    /// Empty when the list does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingArgument`] for an empty type or handle, or
    /// an error if the database query fails.
    pub async fn subscribers(&self, list_type: &str, list_handle: &str) -> Result<Vec<Subscriber>> {
        if list_type.trim().is_empty() {
            return Err(Error::MissingArgument("list_type"));
        }
        if list_handle.trim().is_empty() {
            return Err(Error::MissingArgument("list_handle"));
        }

        let mut conn = self.db.acquire().await?;
        let Some(list) = ListRepository::new(&mut conn)
            .find_by_type_and_handle(list_type, list_handle)
            .await?
        else {
            return Ok(Vec::new());
        };

        SubscriberRepository::new(&mut conn).for_list(list.id).await
    }

    /// Number of subscribers [`Self::subscribers`] returns.
    ///
    /// # Errors
    ///
    /// Same as [`Self::subscribers`].
    pub async fn subscriber_count(&self, list_type: &str, list_handle: &str) -> Result<usize> {
        Ok(self.subscribers(list_type, list_handle).await?.len())
    }

    /// Memberships of a subscriber, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn memberships(&self, subscriber_id: SubscriberId) -> Result<Vec<Membership>> {
        let mut conn = self.db.acquire().await?;
        MembershipRepository::new(&mut conn)
            .for_subscriber(subscriber_id)
            .await
    }

    /// Memberships of a list, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_memberships(&self, list_id: ListId) -> Result<Vec<Membership>> {
        let mut conn = self.db.acquire().await?;
        MembershipRepository::new(&mut conn).for_list(list_id).await
    }

    /// Picker over every list with the subscriber's lists selected.
    ///
    /// Nothing is selected when no subscriber is given or it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn subscriber_list_picker(
        &self,
        subscriber_id: Option<SubscriberId>,
    ) -> Result<ListPicker> {
        let mut conn = self.db.acquire().await?;

        let selected = match subscriber_id {
            Some(id) => {
                MembershipRepository::new(&mut conn)
                    .list_ids_for_subscriber(id)
                    .await?
            }
            None => BTreeSet::new(),
        };
        let lists = ListRepository::new(&mut conn).all().await?;

        Ok(ListPicker::new(&lists, &selected))
    }
}

/// Store the current membership count of a list and return it.
async fn refresh_count_in(conn: &mut SqliteConnection, list_id: ListId) -> Result<u32> {
    let total = MembershipRepository::new(&mut *conn)
        .count_for_list(list_id)
        .await?;
    ListRepository::new(&mut *conn)
        .set_total_subscribers(list_id, total)
        .await?;
    Ok(total)
}

/// Store the current membership count of every list.
async fn refresh_all_counts_in(conn: &mut SqliteConnection) -> Result<()> {
    let ids = ListRepository::new(&mut *conn).all_ids().await?;
    for id in &ids {
        refresh_count_in(&mut *conn, *id).await?;
    }
    debug!("Refreshed subscriber counts of {} lists", ids.len());
    Ok(())
}
