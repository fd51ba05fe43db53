//! `ListLedger` - mailing list subscription ledger
//!
//! Command-line front end over `listledger-core`. Every command prints
//! its result as JSON on stdout; logs go to stderr.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, IdentityArgs};
use listledger_core::{
    Database, ListDraft, ListId, Settings, SubscribeRequest, SubscriberId, SubscriberIdentity,
    SubscriptionQuery, SubscriptionService, UnsubscribeRequest, UserRef,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listledger=info,listledger_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = Settings::load(&settings_path)
        .await
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    if let Some(enabled) = cli.user_sync_override() {
        settings.enable_user_sync = enabled;
    }

    let db_path = cli.db.clone().unwrap_or_else(default_database_path);
    let db = open_database(&db_path).await?;
    let service = SubscriptionService::new(db.clone(), settings);

    let result = run(&service, cli.command, &settings_path).await;
    db.close().await;
    result
}

/// Execute one command and print its result.
async fn run(
    service: &SubscriptionService,
    command: Command,
    settings_path: &Path,
) -> anyhow::Result<()> {
    match command {
        Command::Subscribe {
            list,
            list_type,
            element,
            identity,
        } => {
            let mut request = SubscribeRequest::new(list).list_type(list_type);
            if let Some(element) = element {
                request = request.element(element);
            }
            if let Some(user) = identity.user {
                request = request.user(UserRef::new(user));
            }
            if let Some(email) = identity.email {
                request = request.email(email);
            }
            let subscribed = service.subscribe(&request).await?;
            print(&serde_json::json!({ "subscribed": subscribed }))
        }

        Command::Unsubscribe {
            list,
            list_id,
            list_type,
            identity,
        } => {
            let mut request = match list_id {
                Some(id) => UnsubscribeRequest::by_id(ListId::new(id)),
                None => UnsubscribeRequest::new(list.unwrap_or_default()).list_type(list_type),
            };
            if let Some(user) = identity.user {
                request = request.user(UserRef::new(user));
            }
            if let Some(email) = identity.email {
                request = request.email(email);
            }
            let unsubscribed = service.unsubscribe(&request).await?;
            print(&serde_json::json!({ "unsubscribed": unsubscribed }))
        }

        Command::Status {
            list,
            list_type,
            identity,
        } => {
            let mut query = SubscriptionQuery::new(list);
            if let Some(list_type) = list_type {
                query = query.list_type(list_type);
            }
            if let Some(user) = identity.user {
                query = query.user(UserRef::new(user));
            }
            if let Some(email) = identity.email {
                query = query.email(email);
            }
            let subscribed = service.is_subscribed(&query).await?;
            print(&serde_json::json!({ "subscribed": subscribed }))
        }

        Command::Lists { identity } => {
            let identity = to_identity(&identity);
            let lists = service.lists(identity.as_ref()).await?;
            print(&lists)
        }

        Command::Subscribers { list, list_type } => {
            let subscribers = service.subscribers(&list_type, &list).await?;
            print(&subscribers)
        }

        Command::CreateList {
            handle,
            name,
            list_type,
            element,
            id,
        } => {
            let draft = ListDraft {
                id: id.map(ListId::new),
                element_id: element,
                list_type,
                name,
                handle,
            };
            let Some(list) = service.save_list(&draft).await? else {
                bail!(
                    "list {} does not exist",
                    draft.id.map_or_else(String::new, |id| id.to_string())
                );
            };
            print(&list)
        }

        Command::SetLists { subscriber, lists } => {
            let id = SubscriberId::new(subscriber);
            let list_ids: BTreeSet<ListId> = lists.into_iter().map(ListId::new).collect();
            if !service.replace_subscriptions(id, &list_ids).await? {
                bail!("subscriber {id} does not exist");
            }
            print(&service.lists_for_subscriber(id).await?)
        }

        Command::DeleteSubscriber { id } => {
            let deleted = service.delete_subscriber(SubscriberId::new(id)).await?;
            print(&serde_json::json!({ "deleted": deleted }))
        }

        Command::DeleteList { id } => {
            let deleted = service.delete_list(ListId::new(id)).await?;
            print(&serde_json::json!({ "deleted": deleted }))
        }

        Command::Picker { subscriber } => {
            let picker = service
                .subscriber_list_picker(subscriber.map(SubscriberId::new))
                .await?;
            print(&picker)
        }

        Command::SaveSettings => {
            let settings = service.settings();
            settings.save(settings_path).await?;
            print(&settings)
        }
    }
}

/// Build an identity from command-line arguments, if any were given.
fn to_identity(args: &IdentityArgs) -> Option<SubscriberIdentity> {
    let identity = SubscriberIdentity::new(args.user.map(UserRef::new), args.email.as_deref());
    (!identity.is_empty()).then_some(identity)
}

/// Open the database, creating its directory first.
async fn open_database(path: &Path) -> anyhow::Result<Database> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let path_str = path
        .to_str()
        .with_context(|| format!("database path {} is not valid UTF-8", path.display()))?;
    let db = Database::new(path_str).await?;

    debug!("Using database {}", path.display());
    Ok(db)
}

/// Print a value as pretty JSON on stdout.
fn print(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("listledger")
        .join("settings.json")
}

fn default_database_path() -> PathBuf {
    let path = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("listledger")
        .join("listledger.db");
    debug!("No database given, using {}", path.display());
    path
}
