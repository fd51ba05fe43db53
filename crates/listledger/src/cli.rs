//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use listledger_core::SUBSCRIBER_LIST_TYPE;

/// Manage mailing lists and their subscribers.
#[derive(Debug, Parser)]
#[command(name = "listledger", version, about)]
pub struct Cli {
    /// Path to the ledger database.
    #[arg(long, env = "LISTLEDGER_DB", value_name = "FILE", global = true)]
    pub db: Option<PathBuf>,

    /// Path to the settings file.
    #[arg(long, env = "LISTLEDGER_SETTINGS", value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Identify subscribers by host user as well as by email.
    #[arg(long, global = true, conflicts_with = "no_user_sync")]
    pub user_sync: bool,

    /// Identify subscribers by email only.
    #[arg(long, global = true)]
    pub no_user_sync: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// User sync setting requested on the command line, if any.
    pub const fn user_sync_override(&self) -> Option<bool> {
        if self.user_sync {
            Some(true)
        } else if self.no_user_sync {
            Some(false)
        } else {
            None
        }
    }
}

/// The subscriber a command acts on.
#[derive(Debug, Args)]
pub struct IdentityArgs {
    /// Host user ID.
    #[arg(long)]
    pub user: Option<i64>,

    /// Email address.
    #[arg(long)]
    pub email: Option<String>,
}

/// Commands, one per ledger operation.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a subscriber to a list, creating either if needed.
    Subscribe {
        /// List handle.
        #[arg(long)]
        list: String,

        /// List type.
        #[arg(long = "type", default_value = SUBSCRIBER_LIST_TYPE)]
        list_type: String,

        /// Host element to attach to a new list.
        #[arg(long)]
        element: Option<i64>,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Remove a subscriber from a list.
    Unsubscribe {
        /// List handle.
        #[arg(long, required_unless_present = "list_id")]
        list: Option<String>,

        /// List ID, used instead of the handle.
        #[arg(long)]
        list_id: Option<i64>,

        /// List type.
        #[arg(long = "type", default_value = SUBSCRIBER_LIST_TYPE)]
        list_type: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Check whether a subscriber belongs to a list.
    Status {
        /// List handle.
        #[arg(long)]
        list: String,

        /// List type. Without it the first list with the handle is used.
        #[arg(long = "type")]
        list_type: Option<String>,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show every list, or the lists of one subscriber.
    Lists {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show the subscribers of a list.
    Subscribers {
        /// List handle.
        #[arg(long)]
        list: String,

        /// List type.
        #[arg(long = "type", default_value = SUBSCRIBER_LIST_TYPE)]
        list_type: String,
    },

    /// Create a list, or rename one with `--id`.
    CreateList {
        /// List handle.
        #[arg(long)]
        handle: String,

        /// Display name.
        #[arg(long, default_value = "")]
        name: String,

        /// List type.
        #[arg(long = "type", default_value = SUBSCRIBER_LIST_TYPE)]
        list_type: String,

        /// Host element the list belongs to.
        #[arg(long)]
        element: Option<i64>,

        /// Existing list to rename.
        #[arg(long)]
        id: Option<i64>,
    },

    /// Replace the lists a subscriber belongs to.
    SetLists {
        /// Subscriber ID.
        subscriber: i64,

        /// List IDs. None clears every membership.
        lists: Vec<i64>,
    },

    /// Delete a subscriber and its memberships.
    DeleteSubscriber {
        /// Subscriber ID.
        id: i64,
    },

    /// Delete a list and its memberships.
    DeleteList {
        /// List ID.
        id: i64,
    },

    /// Show every list with a subscriber's lists selected.
    Picker {
        /// Subscriber ID.
        #[arg(long)]
        subscriber: Option<i64>,
    },

    /// Write the current settings to the settings file.
    SaveSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subscribe() {
        let cli = Cli::try_parse_from([
            "listledger",
            "subscribe",
            "--list",
            "newsletter",
            "--email",
            "a@x.com",
            "--no-user-sync",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(cli.user_sync_override(), Some(false));
        match cli.command {
            Command::Subscribe {
                list,
                list_type,
                identity,
                ..
            } => {
                assert_eq!(list, "newsletter");
                assert_eq!(list_type, SUBSCRIBER_LIST_TYPE);
                assert_eq!(identity.email.as_deref(), Some("a@x.com"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_user_sync_flags_conflict() {
        let result = Cli::try_parse_from([
            "listledger",
            "lists",
            "--user-sync",
            "--no-user-sync",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unsubscribe_needs_a_list() {
        assert!(Cli::try_parse_from(["listledger", "unsubscribe", "--email", "a@x.com"]).is_err());
        assert!(
            Cli::try_parse_from(["listledger", "unsubscribe", "--list-id", "3", "--user", "1"])
                .is_ok()
        );
    }

    #[test]
    fn test_status_type_is_optional() {
        let cli = Cli::try_parse_from([
            "listledger",
            "status",
            "--list",
            "news",
            "--email",
            "a@x.com",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Command::Status { list_type: None, .. }));

        let cli = Cli::try_parse_from([
            "listledger",
            "status",
            "--list",
            "news",
            "--type",
            "wishlist",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Command::Status { list_type: Some(ref t), .. } if t == "wishlist"
        ));
    }

    #[test]
    fn test_set_lists_accepts_empty() {
        let cli = Cli::try_parse_from(["listledger", "set-lists", "4"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Command::SetLists { subscriber: 4, ref lists } if lists.is_empty()
        ));
    }
}
