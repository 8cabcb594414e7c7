//! Persistent contact-mapping store.
//!
//! Cross-run learned knowledge lives in a single JSON file:
//!
//! ```json
//! {
//!   "version": 1,
//!   "phone_to_name": {"+15551234567": "Alice"},
//!   "group_chats": {
//!     "chat123": {
//!       "display_name": "Family",
//!       "participants": ["+15551234567"],
//!       "resolved_display_name": "Alice, Bob"
//!     }
//!   }
//! }
//! ```
//!
//! Keys in `phone_to_name` may be any of the four lookup variants, so
//! readers probe all of them. The store is loaded once per run, mutated in
//! memory, and persisted atomically at the end of the run (single-writer
//! assumption). Writes are last-write-wins.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::phone::lookup_variants;

pub const MAPPINGS_SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum MappingsError {
    #[error("failed to write mappings file: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize mappings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to persist mappings file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// One group thread's learned facts. `display_name` is the name the store
/// itself carries; `resolved_display_name` is synthesized from resolved
/// participants when no explicit name exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupChatEntry {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingStore {
    pub version: u32,
    #[serde(default)]
    pub phone_to_name: BTreeMap<String, String>,
    #[serde(default)]
    pub group_chats: BTreeMap<String, GroupChatEntry>,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self {
            version: MAPPINGS_SCHEMA_VERSION,
            phone_to_name: BTreeMap::new(),
            group_chats: BTreeMap::new(),
        }
    }
}

impl MappingStore {
    /// Load the store from `path`. A missing or unreadable file yields an
    /// empty store; learned mappings are an accelerator, never a
    /// prerequisite.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Self>(&raw) {
                Ok(store) => {
                    tracing::debug!(
                        phones = store.phone_to_name.len(),
                        groups = store.group_chats.len(),
                        "loaded contact mappings"
                    );
                    store
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "unparsable mappings file, starting empty");
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable mappings file, starting empty");
                Self::default()
            }
        }
    }

    /// Persist the store atomically: write to a temp file in the target
    /// directory, then rename over the destination.
    pub fn save(&self, path: &Path) -> Result<(), MappingsError> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        tmp.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        tmp.persist(path)?;
        Ok(())
    }

    /// Look up a learned display name, probing the raw identifier and
    /// every normalized variant in order.
    pub fn name_for(&self, identifier: &str) -> Option<&str> {
        lookup_variants(identifier)
            .iter()
            .find_map(|variant| self.phone_to_name.get(variant))
            .map(String::as_str)
    }

    /// Record a learned name under the identifier and all of its variants,
    /// overriding older facts (last-write-wins).
    pub fn learn_name(&mut self, identifier: &str, name: &str) {
        for variant in lookup_variants(identifier) {
            self.phone_to_name.insert(variant, name.to_string());
        }
    }

    pub fn group(&self, canonical_key: &str) -> Option<&GroupChatEntry> {
        self.group_chats.get(canonical_key)
    }

    /// Replace the group-chat table with freshly harvested participant
    /// sets, keeping any previously synthesized display names for groups
    /// the new harvest also knows about.
    pub fn replace_groups(&mut self, groups: BTreeMap<String, GroupChatEntry>) {
        let old = std::mem::replace(&mut self.group_chats, groups);
        for (key, entry) in &mut self.group_chats {
            if entry.resolved_display_name.is_none() {
                if let Some(prior) = old.get(key) {
                    entry.resolved_display_name = prior.resolved_display_name.clone();
                }
            }
        }
    }
}
