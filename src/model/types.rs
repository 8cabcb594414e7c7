//! Normalized entity structs.
//!
//! Field names serialize in camelCase to stay compatible with snapshots
//! written by earlier versions of the exporter.

use serde::{Deserialize, Serialize};

/// A conversation thread: an individual correspondent or a group chat.
///
/// `id` is derived from `canonical_key` (CRC32 of the key), so the same
/// thread receives the same id in every extraction run. `canonical_key` is
/// the message store's own identifier for the thread (phone number, email
/// address, or `chat…` group token) and is the join key used by merges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub canonical_key: String,
    pub display_name: String,
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    pub message_count: u64,
}

/// A single extracted message. Immutable once created; `content` is never
/// empty (rows with no recoverable text are dropped during assembly).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub contact_id: i64,
    pub content: String,
    /// Local-time `YYYY-MM-DD HH:MM:SS`; empty when the store had no date.
    pub date: String,
    pub is_from_me: bool,
}

/// Start/end of the extracted history, as lexicographically comparable
/// local-time strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Summary metrics over a message set. Recomputed from scratch after every
/// assembly or merge, never carried over from an input dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_messages: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub unique_contacts: u64,
    pub avg_message_length: f64,
    pub date_range: DateRange,
    pub hourly_distribution: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_images: Option<u64>,
}

/// The unit of persistence: one snapshot of the exported history.
///
/// `images` is populated by an external attachment pipeline and carried
/// through untouched; the core never inspects or rewrites its entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub contacts: Vec<Contact>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub images: Vec<serde_json::Value>,
    #[serde(default)]
    pub statistics: Statistics,
}

/// Stable contact id for a canonical thread key.
pub fn contact_id(canonical_key: &str) -> i64 {
    i64::from(crc32fast::hash(canonical_key.as_bytes()))
}

impl Dataset {
    /// Sort contacts most-active-first and recompute statistics over the
    /// current message/contact set.
    pub fn finalize(&mut self) {
        self.contacts
            .sort_by(|a, b| b.message_count.cmp(&a.message_count));
        let mut stats = crate::stats::compute_statistics(&self.messages, &self.contacts);
        if !self.images.is_empty() {
            stats.total_images = Some(self.images.len() as u64);
        }
        self.statistics = stats;
    }

    /// Latest message date in the snapshot, if any message carries one.
    pub fn latest_message_date(&self) -> Option<&str> {
        self.messages
            .iter()
            .map(|m| m.date.as_str())
            .filter(|d| !d.is_empty())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_id_is_stable_across_calls() {
        assert_eq!(contact_id("chat123"), contact_id("chat123"));
        assert_ne!(contact_id("chat123"), contact_id("chat124"));
    }

    #[test]
    fn contact_id_is_non_negative() {
        for key in ["+15551234567", "friend@example.com", "chat000", ""] {
            assert!(contact_id(key) >= 0);
        }
    }

    #[test]
    fn contact_serde_roundtrip_camel_case() {
        let contact = Contact {
            id: contact_id("chat42"),
            canonical_key: "chat42".to_string(),
            display_name: "Family".to_string(),
            is_group: true,
            participants: vec!["+15551234567".to_string()],
            message_count: 3,
        };

        let json = serde_json::to_value(&contact).unwrap();
        assert!(json.get("canonicalKey").is_some());
        assert!(json.get("displayName").is_some());
        assert!(json.get("isGroup").is_some());
        assert!(json.get("messageCount").is_some());

        let back: Contact = serde_json::from_value(json).unwrap();
        assert_eq!(back, contact);
    }

    #[test]
    fn contact_participants_omitted_when_empty() {
        let contact = Contact {
            id: 1,
            canonical_key: "+15551234567".to_string(),
            display_name: "Alice".to_string(),
            is_group: false,
            participants: vec![],
            message_count: 1,
        };

        let json = serde_json::to_value(&contact).unwrap();
        assert!(json.get("participants").is_none());
    }

    #[test]
    fn dataset_tolerates_missing_optional_fields() {
        let dataset: Dataset =
            serde_json::from_str(r#"{"contacts": [], "messages": []}"#).unwrap();
        assert!(dataset.images.is_empty());
        assert_eq!(dataset.statistics.total_messages, 0);
    }

    #[test]
    fn latest_message_date_skips_empty() {
        let mut dataset = Dataset::default();
        dataset.messages.push(Message {
            id: 1,
            contact_id: 7,
            content: "hi".to_string(),
            date: String::new(),
            is_from_me: false,
        });
        assert_eq!(dataset.latest_message_date(), None);

        dataset.messages.push(Message {
            id: 2,
            contact_id: 7,
            content: "later".to_string(),
            date: "2025-03-01 09:00:00".to_string(),
            is_from_me: true,
        });
        dataset.messages.push(Message {
            id: 3,
            contact_id: 7,
            content: "earlier".to_string(),
            date: "2024-12-31 23:59:59".to_string(),
            is_from_me: true,
        });
        assert_eq!(dataset.latest_message_date(), Some("2025-03-01 09:00:00"));
    }
}
