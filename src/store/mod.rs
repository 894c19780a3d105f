//! SQLite-backed vocabulary store: the shared corpus and per-user progress.
//!
//! This is the only stateful boundary in the crate. Allocation and synthesis
//! work on snapshots read from here.

use std::collections::BTreeSet;
use std::path::Path;
#[cfg(test)]
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{
    Connection, ErrorCode, OpenFlags, OptionalExtension, Transaction, TransactionBehavior, params,
};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::model::{CorpusEntry, UserVocabularyEntry};

mod schema;

#[cfg(test)]
pub(crate) use schema::DB_SCHEMA_VERSION;

pub struct VocabularyStore {
    connection: Connection,
}

impl VocabularyStore {
    pub fn open(db_path: &Path) -> ServiceResult<Self> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| {
            ServiceError::UpstreamUnavailable(format!(
                "failed to open vocabulary store {}: {err}",
                db_path.display()
            ))
        })?;

        Self::from_connection(connection)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> ServiceResult<Self> {
        schema::configure_connection(&connection)?;
        schema::ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn metadata(&self, key: &str) -> ServiceResult<Option<String>> {
        let value = self
            .connection
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> ServiceResult<()> {
        self.connection.execute(
            "INSERT INTO metadata(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Upserts corpus rows in one transaction.
    pub fn import_corpus(&mut self, entries: &[CorpusEntry]) -> ServiceResult<usize> {
        let tx = self.connection.transaction()?;

        {
            let mut statement = tx.prepare(
                "
                INSERT INTO corpus(core_index, expression, meaning)
                VALUES(?1, ?2, ?3)
                ON CONFLICT(core_index) DO UPDATE SET
                  expression=excluded.expression,
                  meaning=excluded.meaning
                ",
            )?;

            for entry in entries {
                if entry.index == 0 {
                    return Err(ServiceError::ValidationError(
                        "corpus index must be positive".to_string(),
                    ));
                }
                statement.execute(params![entry.index, &entry.expression, &entry.meaning])?;
            }
        }

        tx.commit()?;
        Ok(entries.len())
    }

    pub fn corpus_count(&self) -> ServiceResult<i64> {
        let count = self
            .connection
            .query_row("SELECT COUNT(*) FROM corpus", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Corpus rows for `indices`, in the order given. Indices the corpus
    /// does not hold are skipped.
    #[cfg(test)]
    pub fn corpus_entries(&self, indices: &[u32]) -> ServiceResult<Vec<CorpusEntry>> {
        read_corpus_entries(&self.connection, indices)
    }

    pub fn user_indices(&self, user_id: &str) -> ServiceResult<BTreeSet<u32>> {
        read_user_indices(&self.connection, user_id)
    }

    /// Inserts all entries or none. Confidence outside `[0, 1]` and
    /// duplicate or dangling indices are rejected.
    #[cfg(test)]
    pub fn insert_user_words(&mut self, entries: &[UserVocabularyEntry]) -> ServiceResult<usize> {
        let tx = self.connection.transaction()?;
        let inserted = write_user_words(&tx, entries)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Takes the write lock up front so the user's index snapshot and the
    /// rows inserted from it cannot interleave with another writer.
    pub fn begin_assignment(&mut self) -> ServiceResult<SlotAssignment<'_>> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| {
                ServiceError::UpstreamUnavailable(format!(
                    "vocabulary store is busy with another assignment: {err}"
                ))
            })?;
        Ok(SlotAssignment { tx })
    }

    #[cfg(test)]
    pub fn set_busy_timeout(&self, timeout: Duration) -> ServiceResult<()> {
        self.connection.busy_timeout(timeout)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn remove_user_word(&self, user_id: &str, index: u32) -> ServiceResult<usize> {
        let removed = self.connection.execute(
            "DELETE FROM user_words WHERE user_id = ?1 AND core_index = ?2",
            params![user_id, index],
        )?;
        Ok(removed)
    }

    /// The user's first `limit` entries by corpus index.
    pub fn top_by_index(
        &self,
        user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<UserVocabularyEntry>> {
        self.load_user_words(
            "
            SELECT core_index, user_id, expression, meaning, confidence, last_reviewed_at
            FROM user_words
            WHERE user_id = ?1
            ORDER BY core_index ASC
            LIMIT ?2
            ",
            user_id,
            limit,
        )
    }

    /// The user's `limit` least recently reviewed entries.
    pub fn least_recently_reviewed(
        &self,
        user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<UserVocabularyEntry>> {
        self.load_user_words(
            "
            SELECT core_index, user_id, expression, meaning, confidence, last_reviewed_at
            FROM user_words
            WHERE user_id = ?1
            ORDER BY last_reviewed_at ASC, core_index ASC
            LIMIT ?2
            ",
            user_id,
            limit,
        )
    }

    fn load_user_words(
        &self,
        sql: &str,
        user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<UserVocabularyEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = self.connection.prepare(sql)?;
        let mut rows = statement.query(params![user_id, limit])?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            let confidence: f64 = row.get(4)?;
            let last_reviewed_at: DateTime<Utc> = row.get(5)?;
            out.push(UserVocabularyEntry {
                index: row.get(0)?,
                user_id: row.get(1)?,
                expression: row.get(2)?,
                meaning: row.get(3)?,
                confidence: clamp_confidence(confidence),
                last_reviewed_at,
            });
        }

        Ok(out)
    }
}

/// One user's slot assignment, held under an immediate transaction.
/// Dropping it without `commit` rolls everything back.
pub struct SlotAssignment<'a> {
    tx: Transaction<'a>,
}

impl SlotAssignment<'_> {
    pub fn user_indices(&self, user_id: &str) -> ServiceResult<BTreeSet<u32>> {
        read_user_indices(&self.tx, user_id)
    }

    pub fn corpus_entries(&self, indices: &[u32]) -> ServiceResult<Vec<CorpusEntry>> {
        read_corpus_entries(&self.tx, indices)
    }

    pub fn insert_user_words(&self, entries: &[UserVocabularyEntry]) -> ServiceResult<usize> {
        write_user_words(&self.tx, entries)
    }

    pub fn commit(self) -> ServiceResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn read_user_indices(connection: &Connection, user_id: &str) -> ServiceResult<BTreeSet<u32>> {
    let mut statement =
        connection.prepare_cached("SELECT core_index FROM user_words WHERE user_id = ?1")?;
    let indices = statement
        .query_map([user_id], |row| row.get::<_, u32>(0))?
        .collect::<Result<BTreeSet<u32>, _>>()?;
    Ok(indices)
}

fn read_corpus_entries(
    connection: &Connection,
    indices: &[u32],
) -> ServiceResult<Vec<CorpusEntry>> {
    let mut statement = connection.prepare_cached(
        "SELECT core_index, expression, meaning FROM corpus WHERE core_index = ?1",
    )?;

    let mut out = Vec::with_capacity(indices.len());
    for &index in indices {
        let entry = statement
            .query_row([index], |row| {
                Ok(CorpusEntry {
                    index: row.get(0)?,
                    expression: row.get(1)?,
                    meaning: row.get(2)?,
                })
            })
            .optional()?;
        if let Some(entry) = entry {
            out.push(entry);
        }
    }

    Ok(out)
}

/// Runs inside the caller's transaction; the caller commits.
fn write_user_words(
    connection: &Connection,
    entries: &[UserVocabularyEntry],
) -> ServiceResult<usize> {
    for entry in entries {
        validate_confidence(entry.confidence)?;
    }

    let mut statement = connection.prepare_cached(
        "
        INSERT INTO user_words(user_id, core_index, expression, meaning, confidence, last_reviewed_at)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6)
        ",
    )?;

    for entry in entries {
        statement
            .execute(params![
                &entry.user_id,
                entry.index,
                &entry.expression,
                &entry.meaning,
                entry.confidence,
                entry.last_reviewed_at,
            ])
            .map_err(|err| insert_error(err, entry))?;
    }

    debug!(inserted = entries.len(), "user words written");
    Ok(entries.len())
}

pub fn validate_confidence(confidence: f64) -> ServiceResult<()> {
    if (0.0..=1.0).contains(&confidence) {
        return Ok(());
    }
    Err(ServiceError::ValidationError(format!(
        "confidence must be within [0, 1], got {confidence}"
    )))
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

fn insert_error(err: rusqlite::Error, entry: &UserVocabularyEntry) -> ServiceError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        return ServiceError::ValidationError(format!(
            "cannot assign index {} to user {}: {err}",
            entry.index, entry.user_id
        ));
    }
    ServiceError::from(err)
}
