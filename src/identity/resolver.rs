//! Display-name resolution for individuals and group threads.

use crate::identity::mappings::MappingStore;
use crate::identity::phone::lookup_variants;

/// How many resolved participant names a synthesized group title carries
/// before collapsing the remainder into a `+N more` suffix.
const GROUP_NAME_LIMIT: usize = 4;

/// Resolve an individual identifier to a learned display name. Direct key
/// lookup first, then the normalized variants in order; `None` when the
/// store knows nothing (callers fall back through the display precedence
/// chain).
pub fn resolve_individual(store: &MappingStore, identifier: &str) -> Option<String> {
    store.name_for(identifier).map(str::to_string)
}

/// Resolve a group thread's display name from the store: an explicit
/// display name wins, then a previously synthesized one, then a fresh
/// synthesis from the entry's participant list.
pub fn resolve_group(store: &MappingStore, canonical_key: &str) -> Option<String> {
    let entry = store.group(canonical_key)?;
    if !entry.display_name.is_empty() {
        return Some(entry.display_name.clone());
    }
    if let Some(name) = &entry.resolved_display_name {
        return Some(name.clone());
    }
    synthesize_group_name(store, &entry.participants)
}

/// Participant identifiers for a group thread, when known.
pub fn group_participants(store: &MappingStore, canonical_key: &str) -> Vec<String> {
    store
        .group(canonical_key)
        .map(|entry| entry.participants.clone())
        .unwrap_or_default()
}

/// Build a group title from its participants' resolved names: up to four
/// joined with a comma, with a `+N more` suffix for the rest. Groups where
/// no participant resolves stay unresolved.
pub fn synthesize_group_name(store: &MappingStore, participants: &[String]) -> Option<String> {
    let resolved: Vec<&str> = participants
        .iter()
        .filter_map(|p| {
            lookup_variants(p)
                .iter()
                .find_map(|variant| store.phone_to_name.get(variant))
                .map(String::as_str)
        })
        .collect();

    if resolved.is_empty() {
        return None;
    }

    let mut name = resolved[..resolved.len().min(GROUP_NAME_LIMIT)].join(", ");
    if resolved.len() > GROUP_NAME_LIMIT {
        name.push_str(&format!(" +{} more", resolved.len() - GROUP_NAME_LIMIT));
    }
    Some(name)
}

/// Precompute `resolved_display_name` for every group that lacks an
/// explicit display name. Run after harvesting fresh participant sets so
/// later lookups are a plain field read.
pub fn refresh_group_display_names(store: &mut MappingStore) {
    let keys: Vec<String> = store
        .group_chats
        .iter()
        .filter(|(_, entry)| entry.display_name.is_empty())
        .map(|(key, _)| key.clone())
        .collect();

    for key in keys {
        let participants = group_participants(store, &key);
        let synthesized = synthesize_group_name(store, &participants);
        if let Some(entry) = store.group_chats.get_mut(&key) {
            entry.resolved_display_name = synthesized;
        }
    }
}

/// Whether a display name still reads as an unresolved raw identifier
/// rather than a person or group name.
pub fn is_unresolved_name(name: &str) -> bool {
    name.starts_with('+') || name.contains('@') || name.starts_with("chat")
}
