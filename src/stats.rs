//! Summary statistics over an extracted message set.

use chrono::{NaiveDateTime, Timelike};

use crate::model::{Contact, DateRange, Message, Statistics};

/// Timestamp layouts the store and older snapshots have produced.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Aggregate counts, the hour-of-day histogram, date range, and average
/// content length. Pure; unparsable timestamps are skipped and an empty
/// message list yields zeroes throughout.
pub fn compute_statistics(messages: &[Message], contacts: &[Contact]) -> Statistics {
    let total_messages = messages.len() as u64;
    let messages_sent = messages.iter().filter(|m| m.is_from_me).count() as u64;

    let mut hourly_distribution = vec![0u64; 24];
    for message in messages {
        if let Some(ts) = parse_local_timestamp(&message.date) {
            hourly_distribution[ts.hour() as usize] += 1;
        }
    }

    let dates: Vec<&str> = messages
        .iter()
        .map(|m| m.date.as_str())
        .filter(|d| !d.is_empty())
        .collect();
    let date_range = DateRange {
        start: dates.iter().min().map(|d| d.to_string()).unwrap_or_default(),
        end: dates.iter().max().map(|d| d.to_string()).unwrap_or_default(),
    };

    let avg_message_length = if messages.is_empty() {
        0.0
    } else {
        let total_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        total_chars as f64 / messages.len() as f64
    };

    Statistics {
        total_messages,
        messages_sent,
        messages_received: total_messages - messages_sent,
        unique_contacts: contacts.len() as u64,
        avg_message_length,
        date_range,
        hourly_distribution,
        total_images: None,
    }
}

/// Parse a snapshot timestamp in any of the known local-time layouts.
pub fn parse_local_timestamp(date: &str) -> Option<NaiveDateTime> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
}
