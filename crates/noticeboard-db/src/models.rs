/// Database row types, mapped directly from SQLite rows.
/// Kept apart from the JSON types in noticeboard-types so the storage layer
/// has no HTTP concerns.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    /// PHC-format password hash, never the plaintext.
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    pub user_id: i64,
    /// Joined from `users` at read time.
    pub username: String,
}

/// Result of a mutation that only the owner of a message may perform.
#[derive(Debug, PartialEq, Eq)]
pub enum MutationOutcome<T> {
    Applied(T),
    /// No message with that id.
    NotFound,
    /// The message exists but belongs to another user; nothing was changed.
    Forbidden,
}
