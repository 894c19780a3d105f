use anyhow::Result;
use tracing::{info, warn};

use super::{open_store, resolve_user};
use crate::allocator::gap_count;
use crate::cli::StatusArgs;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{StoreStatus, UserProgressSummary};
use crate::store::VocabularyStore;
use crate::util::write_json_stdout;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    info!(path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing; it will be created");
    }

    // Status is also useful before any user exists.
    let user_id = match resolve_user(&args.user) {
        Ok(user_id) => Some(user_id),
        Err(ServiceError::NotFound(_)) => None,
        Err(err) => return Err(err.into()),
    };

    let store = open_store(&args.store)?;
    let mut status = store_status(&store, user_id.as_deref())?;
    status.db_path = db_path.display().to_string();

    info!(
        corpus_total = status.corpus_total,
        schema = %status.db_schema_version.clone().unwrap_or_default(),
        "database status"
    );
    write_json_stdout(&status)
}

pub(crate) fn store_status(
    store: &VocabularyStore,
    user_id: Option<&str>,
) -> ServiceResult<StoreStatus> {
    let user = match user_id {
        Some(user_id) => {
            let indices = store.user_indices(user_id)?;
            Some(UserProgressSummary {
                user_id: user_id.to_string(),
                assigned: indices.len(),
                max_index: indices.iter().next_back().copied().unwrap_or(0),
                gaps: gap_count(&indices),
            })
        }
        None => None,
    };

    Ok(StoreStatus {
        db_path: String::new(),
        db_schema_version: store.metadata("db_schema_version")?,
        corpus_total: store.corpus_count()?,
        corpus_source_sha256: store.metadata("corpus_source_sha256")?,
        corpus_imported_at: store.metadata("corpus_imported_at")?,
        user,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::commands::allocate::allocate_slots;
    use crate::model::CorpusEntry;
    use crate::store::DB_SCHEMA_VERSION;

    #[test]
    fn reports_corpus_and_user_progress() {
        let mut store = VocabularyStore::open_in_memory().unwrap();
        let corpus = (1..=8)
            .map(|index| CorpusEntry {
                index,
                expression: format!("expr-{index}"),
                meaning: format!("meaning-{index}"),
            })
            .collect::<Vec<_>>();
        store.import_corpus(&corpus).unwrap();
        allocate_slots(&mut store, "alice", 5, Utc::now()).unwrap();
        store.remove_user_word("alice", 2).unwrap();

        let status = store_status(&store, Some("alice")).unwrap();
        assert_eq!(status.corpus_total, 8);
        assert_eq!(status.db_schema_version.as_deref(), Some(DB_SCHEMA_VERSION));

        let user = status.user.unwrap();
        assert_eq!(user.assigned, 4);
        assert_eq!(user.max_index, 5);
        assert_eq!(user.gaps, 1);
    }

    #[test]
    fn status_without_user_omits_progress() {
        let store = VocabularyStore::open_in_memory().unwrap();
        let status = store_status(&store, None).unwrap();
        assert!(status.user.is_none());
        assert_eq!(status.corpus_total, 0);
    }
}
