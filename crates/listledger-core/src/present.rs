//! Presentation helpers for templates and list pickers.
//!
//! Nothing here renders markup; the types serialize to the shape a
//! template expects and the id helpers produce comma separated strings.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::hash::Hash;

use serde::Serialize;

use crate::list::{List, ListId};
use crate::membership::Membership;

/// One choice in a list picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickerOption {
    /// Text shown to the user.
    pub label: String,
    /// List the option selects.
    pub value: ListId,
}

/// The lists a subscriber can be added to, with the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListPicker {
    /// Every list, in display order.
    pub options: Vec<PickerOption>,
    /// Lists currently selected.
    pub selected: Vec<ListId>,
}

impl ListPicker {
    /// Build a picker over `lists` with `selected` checked.
    #[must_use]
    pub fn new(lists: &[List], selected: &BTreeSet<ListId>) -> Self {
        Self {
            options: lists
                .iter()
                .map(|list| PickerOption {
                    label: list.label().to_string(),
                    value: list.id,
                })
                .collect(),
            selected: selected.iter().copied().collect(),
        }
    }

    /// Returns true if the given list is selected.
    #[must_use]
    pub fn is_selected(&self, list_id: ListId) -> bool {
        self.selected.contains(&list_id)
    }
}

/// Comma separated element ids of the given lists.
///
/// Lists without an element are skipped.
#[must_use]
pub fn list_ids(lists: &[List]) -> String {
    join(lists.iter().filter_map(|list| list.element_id))
}

/// Comma separated, de-duplicated subscriber ids of the given memberships.
///
/// These are ledger subscriber ids, not host user references; a
/// subscriber without a user reference still appears.
#[must_use]
pub fn subscriber_ids(memberships: &[Membership]) -> String {
    join(unique(memberships.iter().map(|m| m.subscriber_id)))
}

/// Comma separated, de-duplicated list ids of the given memberships.
#[must_use]
pub fn subscription_ids(memberships: &[Membership]) -> String {
    join(unique(memberships.iter().map(|m| m.list_id)))
}

/// Keep the first occurrence of each value.
fn unique<T: Copy + Eq + Hash>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    values.filter(|value| seen.insert(*value)).collect()
}

fn join<T: Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
