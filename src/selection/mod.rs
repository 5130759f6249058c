use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::TabularStore;

pub mod annotation;
pub mod palette;

use annotation::AnnotationSet;
use palette::selection_color;

/// Named selection groups. Every group set to `true` in `selected_map` is
/// listed in `selections_name`, whose order is the display and color order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected_map: BTreeMap<String, BTreeMap<String, bool>>,
    pub selections_name: Vec<String>,
    pub color_map: BTreeMap<String, String>,
}

impl SelectionState {
    /// Adds `ids` to group `name`, keeping their other memberships. Repeating the
    /// call with the same arguments changes nothing.
    pub fn create_selection<S: AsRef<str>>(&self, name: &str, ids: &[S]) -> SelectionState {
        let mut next = self.clone();
        if name.is_empty() {
            return next;
        }
        for id in ids {
            next.selected_map
                .entry(id.as_ref().to_string())
                .or_default()
                .insert(name.to_string(), true);
        }
        if !next.selections_name.iter().any(|n| n == name) {
            next.selections_name.push(name.to_string());
        }
        if !next.color_map.contains_key(name) {
            let color = selection_color(next.selections_name.len() - 1);
            next.color_map.insert(name.to_string(), color.to_string());
        }
        next
    }

    pub fn remove_selection(&self, name: &str) -> SelectionState {
        let mut next = self.clone();
        next.selections_name.retain(|n| n != name);
        next.color_map.remove(name);
        for groups in next.selected_map.values_mut() {
            groups.remove(name);
        }
        next.selected_map.retain(|_, groups| !groups.is_empty());
        next
    }

    /// Groups the protein belongs to, in display order.
    pub fn groups_of(&self, id: &str) -> Vec<&str> {
        let Some(groups) = self.selected_map.get(id) else {
            return Vec::new();
        };
        self.selections_name
            .iter()
            .filter(|name| groups.get(name.as_str()).copied().unwrap_or(false))
            .map(String::as_str)
            .collect()
    }

    pub fn members_of(&self, name: &str) -> Vec<&str> {
        self.selected_map
            .iter()
            .filter(|(_, groups)| groups.get(name).copied().unwrap_or(false))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.selected_map.values().all(|groups| {
            groups
                .iter()
                .filter(|(_, on)| **on)
                .all(|(name, _)| self.selections_name.contains(name))
        })
    }
}

/// Appends the first protein's comparison label to an auto-generated name that
/// ends in a different parenthetical, e.g. `"Up (A)"` becomes `"Up (A) (B)"`.
/// Names without a trailing parenthetical, or whose parenthetical already
/// matches, are returned unchanged.
pub fn disambiguate_selection_name<S: AsRef<str>>(
    proposed: &str,
    ids: &[S],
    store: &TabularStore,
) -> String {
    let Some(existing) = trailing_parenthetical(proposed) else {
        return proposed.to_string();
    };
    let Some(first) = ids.first() else {
        return proposed.to_string();
    };
    let records = store.get_by_primary_id(first.as_ref());
    let Some(record) = records.first() else {
        return proposed.to_string();
    };
    if record.comparison == existing {
        proposed.to_string()
    } else {
        format!("{} ({})", proposed, record.comparison)
    }
}

fn trailing_parenthetical(name: &str) -> Option<&str> {
    let trimmed = name.trim_end();
    let inner = trimmed.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    Some(&inner[open + 1..])
}

/// Per-dataset selection and annotation state, replaced as a whole on edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotState {
    pub selection: SelectionState,
    pub annotations: AnnotationSet,
}

#[cfg(test)]
#[path = "../../tests/src_inline/selection/tests.rs"]
mod tests;
