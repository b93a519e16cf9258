use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    Sqlite(String),
    /// JSON (de)serialization of a stored column.
    Json(String),
    /// Stored value outside the expected vocabulary.
    Corrupt {
        table: &'static str,
        column: &'static str,
        value: String,
    },
    /// Row not found.
    NotFound { entity: &'static str, id: String },
    /// Connection mutex poisoned by a panicked writer.
    Poisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(msg) => write!(f, "sqlite error: {msg}"),
            Self::Json(msg) => write!(f, "stored JSON error: {msg}"),
            Self::Corrupt { table, column, value } => {
                write!(f, "corrupt value in {table}.{column}: '{value}'")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} '{id}' not found"),
            Self::Poisoned => write!(f, "store connection poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
