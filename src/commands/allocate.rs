use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{open_store, positive_amount, resolve_user};
use crate::allocator::allocate;
use crate::cli::AllocateSlotsArgs;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{AllocationOutcome, UserVocabularyEntry};
use crate::store::VocabularyStore;
use crate::util::write_json_stdout;

pub fn run(args: AllocateSlotsArgs) -> Result<()> {
    let user_id = resolve_user(&args.user)?;
    let amount = positive_amount("amount", args.amount)?;
    let mut store = open_store(&args.store)?;

    let outcome = allocate_slots(&mut store, &user_id, amount, Utc::now())?;
    write_json_stdout(&outcome)
}

/// Assigns the next `amount` corpus indices to `user_id`.
///
/// The snapshot and the insert share one write transaction. Indices the
/// corpus does not hold are reported as `missing`; if none of the allocated
/// indices exist the corpus is exhausted and nothing is inserted.
pub(crate) fn allocate_slots(
    store: &mut VocabularyStore,
    user_id: &str,
    amount: usize,
    now: DateTime<Utc>,
) -> ServiceResult<AllocationOutcome> {
    let assignment = store.begin_assignment()?;
    let existing = assignment.user_indices(user_id)?;
    let allocated = allocate(&existing, amount);

    info!(
        user = %user_id,
        existing = existing.len(),
        requested = amount,
        first = allocated.first().copied().unwrap_or(0),
        last = allocated.last().copied().unwrap_or(0),
        "allocated slots"
    );

    let corpus_rows = assignment.corpus_entries(&allocated)?;
    if corpus_rows.is_empty() && !allocated.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "corpus has no entries for indices {:?}..={:?}",
            allocated.first(),
            allocated.last()
        )));
    }

    let missing = allocated
        .iter()
        .copied()
        .filter(|index| !corpus_rows.iter().any(|row| row.index == *index))
        .collect::<Vec<u32>>();
    if !missing.is_empty() {
        warn!(
            user = %user_id,
            missing = missing.len(),
            "corpus exhausted; allocating fewer slots than requested"
        );
    }

    let words = corpus_rows
        .iter()
        .map(|row| UserVocabularyEntry::introduce(user_id, row, now))
        .collect::<Vec<_>>();
    let inserted = assignment.insert_user_words(&words)?;
    assignment.commit()?;

    info!(user = %user_id, inserted, "user words inserted");

    Ok(AllocationOutcome {
        user_id: user_id.to_string(),
        requested: amount,
        allocated,
        inserted,
        missing,
    })
}
