//! Per-user template membership lists.
//!
//! `all` keeps insertion order, `fav` is a set kept in insertion order and
//! `recents` is most-recent-first, deduplicated and capped at [`RECENTS_CAP`].
//! `fav` and `recents` never reference an id missing from `all`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const RECENTS_CAP: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLists {
    pub all: Vec<Uuid>,
    pub fav: Vec<Uuid>,
    pub recents: Vec<Uuid>,
}

/// A change to the lists caused by one template mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEdit {
    Created { id: Uuid, favorite: bool },
    /// `favorite` is `None` when the update left the flag alone.
    Touched { id: Uuid, favorite: Option<bool> },
    Removed { id: Uuid },
}

/// Appends `id` unless present. Returns whether the list changed.
pub fn add_unique(list: &mut Vec<Uuid>, id: Uuid) -> bool {
    if list.contains(&id) {
        return false;
    }
    list.push(id);
    true
}

pub fn remove_if_present(list: &mut Vec<Uuid>, id: Uuid) -> bool {
    let before = list.len();
    list.retain(|x| *x != id);
    list.len() != before
}

/// Moves (or inserts) `id` to the front and truncates to `cap`.
pub fn promote_to_front(list: &mut Vec<Uuid>, id: Uuid, cap: usize) {
    remove_if_present(list, id);
    list.insert(0, id);
    list.truncate(cap);
}

impl TemplateLists {
    pub fn apply(&mut self, edit: ListEdit) {
        match edit {
            ListEdit::Created { id, favorite } => {
                add_unique(&mut self.all, id);
                if favorite {
                    add_unique(&mut self.fav, id);
                }
                promote_to_front(&mut self.recents, id, RECENTS_CAP);
            }
            ListEdit::Touched { id, favorite } => {
                add_unique(&mut self.all, id);
                match favorite {
                    Some(true) => {
                        add_unique(&mut self.fav, id);
                    }
                    Some(false) => {
                        remove_if_present(&mut self.fav, id);
                    }
                    None => {}
                }
                promote_to_front(&mut self.recents, id, RECENTS_CAP);
            }
            ListEdit::Removed { id } => {
                remove_if_present(&mut self.all, id);
                remove_if_present(&mut self.fav, id);
                remove_if_present(&mut self.recents, id);
            }
        }
    }

    pub fn counts(&self) -> ListCounts {
        ListCounts {
            templates_count: self.all.len(),
            favorites_count: self.fav.len(),
            recents_count: self.recents.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCounts {
    pub templates_count: usize,
    pub favorites_count: usize,
    pub recents_count: usize,
}
