use rusqlite::Connection;

use crate::error::ServiceResult;
use crate::util::now_utc_string;

pub(crate) const DB_SCHEMA_VERSION: &str = "0.1.0";

pub(super) fn configure_connection(connection: &Connection) -> ServiceResult<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> ServiceResult<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS corpus (
          core_index INTEGER PRIMARY KEY CHECK (core_index > 0),
          expression TEXT NOT NULL,
          meaning TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_words (
          user_id TEXT NOT NULL,
          core_index INTEGER NOT NULL,
          expression TEXT NOT NULL,
          meaning TEXT NOT NULL,
          confidence REAL NOT NULL DEFAULT 0 CHECK (confidence >= 0 AND confidence <= 1),
          last_reviewed_at TEXT NOT NULL,
          PRIMARY KEY (user_id, core_index),
          FOREIGN KEY (core_index) REFERENCES corpus(core_index)
        );

        CREATE INDEX IF NOT EXISTS idx_user_words_reviewed ON user_words(user_id, last_reviewed_at);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_opened_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}
