// Local mirror of the avatars the authority has told us about.

use crate::domain::avatar::Avatar;
use crate::domain::ids::{AvatarId, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    // Insertion sequence; overwrites keep the original slot.
    seq: u64,
    avatar: Avatar,
}

/// Avatar records keyed by `AvatarId`, iterated in first-insertion order.
///
/// The store has no side effects beyond its own map. Callers decide when to
/// re-render or refresh UI after a mutation.
#[derive(Debug, Clone, Default)]
pub struct PresenceStore {
    entries: HashMap<AvatarId, Entry>,
    next_seq: u64,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an unseen avatar or overwrites every field of a known one.
    /// Last write wins; there is no version arbitration.
    pub fn upsert(&mut self, avatar: Avatar) {
        match self.entries.get_mut(&avatar.id) {
            Some(entry) => entry.avatar = avatar,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(avatar.id, Entry { seq, avatar });
            }
        }
    }

    /// Removes the first avatar (in iteration order) owned by `user_id`.
    ///
    /// Returns the removed avatar id. If several entries share the user id only
    /// the earliest one is removed; the authority is expected to prevent that.
    pub fn remove_by_user_id(&mut self, user_id: UserId) -> Option<AvatarId> {
        let avatar_id = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.avatar.user_id == user_id)
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(id, _)| *id)?;
        self.entries.remove(&avatar_id);
        Some(avatar_id)
    }

    pub fn get(&self, avatar_id: AvatarId) -> Option<&Avatar> {
        self.entries.get(&avatar_id).map(|entry| &entry.avatar)
    }

    /// All avatars in first-insertion order.
    pub fn all(&self) -> Vec<&Avatar> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| &entry.avatar).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
