use anyhow::Result;
use serde::Serialize;
use tracing::info;

use super::{open_store, positive_amount, resolve_user};
use crate::cli::ListWordsArgs;
use crate::error::ServiceResult;
use crate::model::WordListing;
use crate::store::VocabularyStore;
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct WordListResponse {
    user_id: String,
    limit: usize,
    returned: usize,
    words: Vec<WordListing>,
}

pub fn run(args: ListWordsArgs) -> Result<()> {
    let user_id = resolve_user(&args.user)?;
    let limit = positive_amount("amount", args.amount)?;
    let store = open_store(&args.store)?;

    let words = list_words(&store, &user_id, limit)?;
    info!(user = %user_id, returned = words.len(), "listed words");

    write_json_stdout(&WordListResponse {
        user_id,
        limit,
        returned: words.len(),
        words,
    })
}

/// Least recently reviewed words first.
pub(crate) fn list_words(
    store: &VocabularyStore,
    user_id: &str,
    limit: usize,
) -> ServiceResult<Vec<WordListing>> {
    let entries = store.least_recently_reviewed(user_id, limit)?;
    Ok(entries.into_iter().map(WordListing::from).collect())
}
