//! Read-only access to the local message store.
//!
//! The store is a SQLite database owned by the OS messaging app; this
//! module only ever opens it read-only and runs two queries: the message
//! extraction join and the group-participant harvest. Timestamps in the
//! store count nanoseconds since 2001-01-01 (the platform epoch) and are
//! converted to local time inside the query.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::identity::mappings::GroupChatEntry;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("message store not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("message store access failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One raw row from the message extraction query. Nullable columns stay
/// optional; assembly decides what is usable.
#[derive(Debug, Clone, Default)]
pub struct MessageRow {
    pub id: i64,
    pub text: Option<String>,
    pub attributed_body: Option<Vec<u8>>,
    pub is_from_me: bool,
    /// Local-time `YYYY-MM-DD HH:MM:SS`; empty when the store had no date.
    pub date: String,
    /// Individual correspondent identifier (phone or email).
    pub handle: Option<String>,
    /// Thread identifier; `chat…` prefixed for group threads.
    pub chat_identifier: Option<String>,
    /// Explicit thread display name, when the store carries one.
    pub chat_display_name: Option<String>,
}

const MESSAGE_COLUMNS: &str = "\
    m.ROWID,
    m.text,
    m.attributedBody,
    m.is_from_me,
    datetime(m.date / 1000000000 + strftime('%s', '2001-01-01'), 'unixepoch', 'localtime'),
    h.id,
    c.chat_identifier,
    c.display_name";

const MESSAGE_JOINS: &str = "\
    FROM message m
    LEFT JOIN chat_message_join cmj ON m.ROWID = cmj.message_id
    LEFT JOIN chat c ON cmj.chat_id = c.ROWID
    LEFT JOIN handle h ON m.handle_id = h.ROWID";

#[derive(Debug)]
pub struct ChatDb {
    conn: Connection,
}

impl ChatDb {
    /// The platform's default location for the message store.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join("Library/Messages/chat.db"))
    }

    /// Open the store read-only. The database must already exist; this
    /// never creates or migrates anything.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Fetch up to `limit` message rows, most recent first. With `since`,
    /// only rows strictly newer than that local timestamp are returned
    /// (incremental runs).
    pub fn query_messages(
        &self,
        limit: u64,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<MessageRow>, SourceError> {
        let rows = match since.map(apple_epoch_ns) {
            Some(since_ns) => {
                let sql = format!(
                    "SELECT DISTINCT {MESSAGE_COLUMNS} {MESSAGE_JOINS}
                     WHERE m.date > ?1
                     ORDER BY m.date DESC
                     LIMIT ?2"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let mapped =
                    stmt.query_map(rusqlite::params![since_ns, limit as i64], row_to_message)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT DISTINCT {MESSAGE_COLUMNS} {MESSAGE_JOINS}
                     ORDER BY m.date DESC
                     LIMIT ?1"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let mapped = stmt.query_map(rusqlite::params![limit as i64], row_to_message)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
        };
        tracing::debug!(rows = rows.len(), "queried message store");
        Ok(rows)
    }

    /// Harvest participant identifiers for every group thread. Threads
    /// with no joined handles are skipped.
    pub fn query_group_participants(
        &self,
    ) -> Result<BTreeMap<String, GroupChatEntry>, SourceError> {
        let mut groups = BTreeMap::new();

        let mut chats_stmt = self.conn.prepare(
            "SELECT ROWID, chat_identifier, display_name
             FROM chat
             WHERE chat_identifier LIKE 'chat%'",
        )?;
        let chats = chats_stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut handles_stmt = self.conn.prepare(
            "SELECT h.id
             FROM handle h
             JOIN chat_handle_join chj ON h.ROWID = chj.handle_id
             WHERE chj.chat_id = ?1",
        )?;

        for (chat_rowid, chat_identifier, display_name) in chats {
            let participants = handles_stmt
                .query_map([chat_rowid], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            if participants.is_empty() {
                continue;
            }
            groups.insert(
                chat_identifier,
                GroupChatEntry {
                    display_name: display_name.unwrap_or_default(),
                    participants,
                    resolved_display_name: None,
                },
            );
        }

        tracing::debug!(groups = groups.len(), "harvested group participants");
        Ok(groups)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get::<_, Option<String>>(1)?.filter(|t| !t.is_empty()),
        attributed_body: row.get(2)?,
        is_from_me: row.get::<_, Option<i64>>(3)?.unwrap_or(0) != 0,
        date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        handle: row.get(5)?,
        chat_identifier: row.get(6)?,
        chat_display_name: row
            .get::<_, Option<String>>(7)?
            .filter(|name| !name.is_empty()),
    })
}

/// Nanoseconds since the platform epoch (2001-01-01 local) for a "since"
/// filter, mirroring how the store encodes `message.date`.
fn apple_epoch_ns(ts: NaiveDateTime) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (ts - epoch).num_seconds().saturating_mul(1_000_000_000)
}
