//! Incremental merge of a fresh extraction into a persisted snapshot.

use std::collections::{HashMap, HashSet};

use crate::model::Dataset;

/// Merge a freshly assembled dataset into the prior snapshot.
///
/// Message identity is the store's id: only ids absent from the prior
/// snapshot are admitted, and they are prepended so the merged list stays
/// most-recent-first. On an id collision the prior record wins, which
/// makes re-running over overlapping windows safe. Contacts are matched
/// by canonical key; message counts and statistics are recomputed from
/// scratch over the merged set. The prior snapshot's `images` (owned by
/// the external attachment pipeline) are carried through untouched.
pub fn merge(prior: Dataset, fresh: Dataset) -> Dataset {
    let mut seen: HashSet<i64> = prior.messages.iter().map(|m| m.id).collect();
    let mut messages: Vec<_> = fresh
        .messages
        .into_iter()
        .filter(|m| seen.insert(m.id))
        .collect();
    let added = messages.len();
    messages.extend(prior.messages);

    let mut contacts = prior.contacts;
    let known: HashSet<&str> = contacts.iter().map(|c| c.canonical_key.as_str()).collect();
    let new_contacts: Vec<_> = fresh
        .contacts
        .into_iter()
        .filter(|c| !known.contains(c.canonical_key.as_str()))
        .collect();
    drop(known);
    let added_contacts = new_contacts.len();
    contacts.extend(new_contacts);

    let mut counts: HashMap<i64, u64> = HashMap::new();
    for message in &messages {
        *counts.entry(message.contact_id).or_default() += 1;
    }
    for contact in &mut contacts {
        contact.message_count = counts.get(&contact.id).copied().unwrap_or(0);
    }

    let images = if prior.images.is_empty() {
        fresh.images
    } else {
        prior.images
    };

    tracing::info!(
        new_messages = added,
        new_contacts = added_contacts,
        total = messages.len(),
        "merged snapshot"
    );

    let mut merged = Dataset {
        contacts,
        messages,
        images,
        statistics: Default::default(),
    };
    merged.finalize();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Contact, Message, contact_id};

    fn contact(key: &str, count: u64) -> Contact {
        Contact {
            id: contact_id(key),
            canonical_key: key.to_string(),
            display_name: key.to_string(),
            is_group: false,
            participants: vec![],
            message_count: count,
        }
    }

    fn message(id: i64, key: &str, date: &str) -> Message {
        Message {
            id,
            contact_id: contact_id(key),
            content: format!("msg {id}"),
            date: date.to_string(),
            is_from_me: false,
        }
    }

    fn dataset(contacts: Vec<Contact>, messages: Vec<Message>) -> Dataset {
        let mut dataset = Dataset {
            contacts,
            messages,
            images: vec![],
            statistics: Default::default(),
        };
        dataset.finalize();
        dataset
    }

    #[test]
    fn merging_a_dataset_into_itself_is_idempotent() {
        let base = dataset(
            vec![contact("+15551111111", 2)],
            vec![
                message(2, "+15551111111", "2025-01-02 10:00:00"),
                message(1, "+15551111111", "2025-01-01 10:00:00"),
            ],
        );

        let once = merge(base.clone(), base.clone());
        assert_eq!(once.messages.len(), 2);
        assert_eq!(once.contacts.len(), 1);

        let twice = merge(once.clone(), base);
        assert_eq!(twice.messages.len(), 2);
        assert_eq!(twice.contacts[0].message_count, 2);
        assert_eq!(twice.statistics.total_messages, 2);
    }

    #[test]
    fn new_messages_are_prepended() {
        let prior = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(1, "+15551111111", "2025-01-01 10:00:00")],
        );
        let fresh = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(2, "+15551111111", "2025-01-02 10:00:00")],
        );

        let merged = merge(prior, fresh);
        assert_eq!(merged.messages[0].id, 2);
        assert_eq!(merged.messages[1].id, 1);
        assert_eq!(merged.contacts[0].message_count, 2);
    }

    #[test]
    fn prior_record_wins_on_id_collision() {
        let prior = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(1, "+15551111111", "2025-01-01 10:00:00")],
        );
        let mut divergent = message(1, "+15551111111", "2025-01-01 10:00:00");
        divergent.content = "rewritten".to_string();
        let fresh = dataset(vec![contact("+15551111111", 1)], vec![divergent]);

        let merged = merge(prior, fresh);
        assert_eq!(merged.messages.len(), 1);
        assert_eq!(merged.messages[0].content, "msg 1");
    }

    #[test]
    fn contacts_union_by_canonical_key() {
        let prior = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(1, "+15551111111", "2025-01-01 10:00:00")],
        );
        let fresh = dataset(
            vec![contact("+15551111111", 1), contact("chat99", 1)],
            vec![
                message(1, "+15551111111", "2025-01-01 10:00:00"),
                message(5, "chat99", "2025-01-03 10:00:00"),
            ],
        );

        let merged = merge(prior, fresh);
        assert_eq!(merged.contacts.len(), 2);
        let keys: Vec<&str> = merged
            .contacts
            .iter()
            .map(|c| c.canonical_key.as_str())
            .collect();
        assert!(keys.contains(&"chat99"));
    }

    #[test]
    fn prior_images_are_preserved() {
        let mut prior = dataset(vec![], vec![]);
        prior.images = vec![serde_json::json!({"url": "img/one.jpg"})];
        prior.finalize();
        let fresh = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(1, "+15551111111", "2025-01-01 10:00:00")],
        );

        let merged = merge(prior, fresh);
        assert_eq!(merged.images.len(), 1);
        assert_eq!(merged.statistics.total_images, Some(1));
    }

    #[test]
    fn statistics_are_recomputed_not_carried() {
        let mut prior = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(1, "+15551111111", "2025-01-01 10:00:00")],
        );
        prior.statistics.total_messages = 999;
        let fresh = dataset(
            vec![contact("+15551111111", 1)],
            vec![message(2, "+15551111111", "2025-01-02 10:00:00")],
        );

        let merged = merge(prior, fresh);
        assert_eq!(merged.statistics.total_messages, 2);
        assert_eq!(merged.statistics.date_range.end, "2025-01-02 10:00:00");
    }
}
