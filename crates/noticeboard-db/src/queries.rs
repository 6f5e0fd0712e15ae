use crate::models::{MessageRow, MutationOutcome, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

/// Storage format for `messages.timestamp`: fixed-width UTC, so ordering the
/// text column orders the instants. Matches the column's SQLite default.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const MESSAGE_COLUMNS: &str = "SELECT m.id, m.text, m.timestamp, m.user_id, u.username
     FROM messages m
     JOIN users u ON m.user_id = u.id";

impl Database {
    // -- Users --

    /// Inserts a user and returns its new id, or `None` if the username is taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)
                 ON CONFLICT(username) DO NOTHING",
                (username, password_hash),
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Messages --

    /// Stores a message owned by `user_id`, stamped with the current time.
    pub fn insert_message(&self, user_id: i64, text: &str) -> Result<MessageRow> {
        let timestamp = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();
        self.with_conn(|conn| insert_message_at(conn, user_id, text, &timestamp))
    }

    /// Every message, newest first.
    pub fn list_messages(&self) -> Result<Vec<MessageRow>> {
        self.with_conn(query_messages)
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id).optional())
    }

    /// Replaces the text of a message owned by `user_id` and returns the
    /// updated row. The timestamp is left alone.
    pub fn update_message_text(
        &self,
        id: i64,
        user_id: i64,
        text: &str,
    ) -> Result<MutationOutcome<MessageRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET text = ?1 WHERE id = ?2 AND user_id = ?3",
                rusqlite::params![text, id, user_id],
            )?;
            if updated == 0 {
                return classify_miss(conn, id, user_id);
            }
            Ok(MutationOutcome::Applied(query_message(conn, id)?))
        })
    }

    /// Deletes a message owned by `user_id`.
    pub fn delete_message(&self, id: i64, user_id: i64) -> Result<MutationOutcome<()>> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id],
            )?;
            if deleted == 0 {
                return classify_miss(conn, id, user_id);
            }
            Ok(MutationOutcome::Applied(()))
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, username, password_hash FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn insert_message_at(
    conn: &Connection,
    user_id: i64,
    text: &str,
    timestamp: &str,
) -> Result<MessageRow> {
    conn.execute(
        "INSERT INTO messages (text, timestamp, user_id) VALUES (?1, ?2, ?3)",
        rusqlite::params![text, timestamp, user_id],
    )?;
    Ok(query_message(conn, conn.last_insert_rowid())?)
}

fn query_messages(conn: &Connection) -> Result<Vec<MessageRow>> {
    // Ties on timestamp fall back to insertion order so the listing stays strict.
    let mut stmt = conn.prepare(&format!(
        "{MESSAGE_COLUMNS} ORDER BY m.timestamp DESC, m.id DESC"
    ))?;

    let rows = stmt
        .query_map([], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_message(conn: &Connection, id: i64) -> std::result::Result<MessageRow, rusqlite::Error> {
    conn.query_row(&format!("{MESSAGE_COLUMNS} WHERE m.id = ?1"), [id], map_message)
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
        username: row.get(4)?,
    })
}

/// A conditional mutation touched nothing: tell "gone" apart from "not yours".
fn classify_miss<T>(conn: &Connection, id: i64, user_id: i64) -> Result<MutationOutcome<T>> {
    let owner: Option<i64> = conn
        .query_row("SELECT user_id FROM messages WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;

    Ok(match owner {
        None => MutationOutcome::NotFound,
        Some(owner) if owner != user_id => MutationOutcome::Forbidden,
        // Owned but unchanged can only mean the row vanished in between.
        Some(_) => MutationOutcome::NotFound,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
