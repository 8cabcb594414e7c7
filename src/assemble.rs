//! Conversation assembly: raw store rows into typed contacts and messages.

use std::collections::HashMap;

use crate::decode::decode_attributed_body;
use crate::identity::mappings::MappingStore;
use crate::identity::phone::{clean_phone_number, looks_like_phone};
use crate::identity::resolver;
use crate::model::{Contact, Dataset, Message, contact_id};
use crate::source::MessageRow;

/// Assemble a dataset from raw message rows.
///
/// Per row: content comes from the plain-text column when present, else
/// from decoding the archived body; rows with no recoverable content are
/// dropped entirely. Threads are keyed by the group chat identifier when
/// the row belongs to a group (so every participant's messages land in one
/// contact), else by the individual handle, else by the chat identifier,
/// else by a per-message fallback key so no message is silently lost.
pub fn assemble(rows: Vec<MessageRow>, store: &MappingStore) -> Dataset {
    let mut contacts: Vec<Contact> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut messages: Vec<Message> = Vec::new();

    let total_rows = rows.len();
    let mut decoded_from_blob = 0usize;
    let mut dropped = 0usize;

    for row in rows {
        let content = match row.text.clone() {
            Some(text) => text,
            None => match row
                .attributed_body
                .as_deref()
                .and_then(decode_attributed_body)
            {
                Some(text) => {
                    decoded_from_blob += 1;
                    text
                }
                None => {
                    dropped += 1;
                    continue;
                }
            },
        };

        let is_group = row
            .chat_identifier
            .as_deref()
            .is_some_and(|c| c.starts_with("chat"));
        let canonical_key = if is_group {
            row.chat_identifier.clone().unwrap_or_default()
        } else if let Some(handle) = row.handle.clone() {
            handle
        } else if let Some(chat) = row.chat_identifier.clone() {
            chat
        } else {
            format!("unknown_{}", row.id)
        };

        let slot = match slots.get(&canonical_key) {
            Some(&slot) => {
                // A later row may carry the explicit thread name the first
                // sighting lacked; an explicit name always beats a
                // fallback one.
                if let Some(name) = &row.chat_display_name {
                    let current = &contacts[slot].display_name;
                    if resolver::is_unresolved_name(current) || *current == canonical_key {
                        contacts[slot].display_name = name.clone();
                    }
                }
                slot
            }
            None => {
                let contact = new_contact(&row, is_group, &canonical_key, store);
                contacts.push(contact);
                slots.insert(canonical_key.clone(), contacts.len() - 1);
                contacts.len() - 1
            }
        };

        contacts[slot].message_count += 1;
        messages.push(Message {
            id: row.id,
            contact_id: contacts[slot].id,
            content,
            date: row.date,
            is_from_me: row.is_from_me,
        });
    }

    tracing::info!(
        rows = total_rows,
        messages = messages.len(),
        from_archived_bodies = decoded_from_blob,
        dropped,
        contacts = contacts.len(),
        "assembled dataset"
    );

    let mut dataset = Dataset {
        contacts,
        messages,
        images: Vec::new(),
        statistics: Default::default(),
    };
    dataset.finalize();
    dataset
}

/// Build the contact for a thread's first sighting. Display-name
/// precedence: explicit name on the source row, then a resolver-mapped
/// name, then the cleaned phone form, then the raw identifier.
fn new_contact(
    row: &MessageRow,
    is_group: bool,
    canonical_key: &str,
    store: &MappingStore,
) -> Contact {
    let display_name = if is_group {
        row.chat_display_name
            .clone()
            .or_else(|| resolver::resolve_group(store, canonical_key))
            .unwrap_or_else(|| canonical_key.to_string())
    } else {
        row.chat_display_name
            .clone()
            .or_else(|| resolver::resolve_individual(store, canonical_key))
            .unwrap_or_else(|| {
                if looks_like_phone(canonical_key) {
                    clean_phone_number(canonical_key)
                } else {
                    canonical_key.to_string()
                }
            })
    };

    let participants = if is_group {
        resolver::group_participants(store, canonical_key)
    } else {
        Vec::new()
    };

    Contact {
        id: contact_id(canonical_key),
        canonical_key: canonical_key.to_string(),
        display_name,
        is_group,
        participants,
        message_count: 0,
    }
}
