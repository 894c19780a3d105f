//! Passage synthesis: batch the vocabulary, drive the backend per batch,
//! and return every passage or none.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::backend::GenerationBackend;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{BATCH_SIZE, GenerationRequest, GenerationResult, Passage, VocabularyWord};

mod policy;
mod prompt;
mod schema;

pub use policy::{Attempt, RepairPolicy};

/// Cooperative cancellation flag, checked between passages only.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub sentence_budget: u32,
    pub proficiency_tag: String,
    pub batch_size: usize,
    pub policy: RepairPolicy,
}

impl SynthesisOptions {
    pub fn new(sentence_budget: u32, proficiency_tag: impl Into<String>) -> Self {
        Self {
            sentence_budget,
            proficiency_tag: proficiency_tag.into(),
            batch_size: BATCH_SIZE,
            policy: RepairPolicy::single_repair(),
        }
    }
}

pub struct Synthesizer<'a, B: GenerationBackend + ?Sized> {
    backend: &'a B,
    options: SynthesisOptions,
}

impl<'a, B: GenerationBackend + ?Sized> Synthesizer<'a, B> {
    pub fn new(backend: &'a B, options: SynthesisOptions) -> Self {
        Self { backend, options }
    }

    /// Generates `passage_count` passages in order. Any failure aborts the
    /// whole request and discards passages already produced.
    pub fn synthesize(
        &self,
        vocabulary: &[VocabularyWord],
        passage_count: usize,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Passage>> {
        let mut passages = Vec::with_capacity(passage_count);

        for passage_index in 0..passage_count {
            if cancel.is_cancelled() {
                warn!(
                    completed = passages.len(),
                    requested = passage_count,
                    "synthesis cancelled; discarding completed passages"
                );
                return Err(ServiceError::Cancelled(format!(
                    "synthesis cancelled before passage {} of {passage_count}",
                    passage_index + 1
                )));
            }

            let words = batch_for(vocabulary, passage_index, self.options.batch_size).to_vec();
            if words.is_empty() {
                debug!(passage = passage_index, "empty batch; backend picks level vocabulary");
            }

            let request = GenerationRequest {
                batch: words,
                sentence_budget: self.options.sentence_budget,
                proficiency_tag: self.options.proficiency_tag.clone(),
            };
            let result = self.generate_result(&request, passage_index)?;

            info!(
                passage = passage_index,
                words = request.batch.len(),
                backend = self.backend.name(),
                "passage generated"
            );
            passages.push(Passage {
                result,
                words: request.batch,
            });
        }

        Ok(passages)
    }

    fn generate_result(
        &self,
        request: &GenerationRequest,
        passage_index: usize,
    ) -> ServiceResult<GenerationResult> {
        let mut number = 1u32;
        let mut last_response: Option<String> = None;
        let mut last_error = String::from("no attempts permitted");

        while let Some(attempt) = self.options.policy.attempt(number) {
            let prompt = match (attempt, last_response.as_deref()) {
                (Attempt::Generate, _) | (Attempt::Reformat, None) => {
                    prompt::generation_prompt(request)
                }
                (Attempt::Reformat, Some(malformed)) => prompt::repair_prompt(malformed),
            };
            debug!(
                passage = passage_index,
                attempt = attempt.as_str(),
                prompt = %prompt,
                "invoking generation backend"
            );

            let raw = self.backend.generate(&prompt)?;
            match schema::parse_generation_result(&raw) {
                Ok(result) => {
                    if attempt == Attempt::Reformat {
                        info!(
                            passage = passage_index,
                            attempt = number,
                            "repair attempt succeeded"
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    warn!(
                        passage = passage_index,
                        attempt = attempt.as_str(),
                        error = %err,
                        "backend response did not match result schema"
                    );
                    last_error = err;
                    last_response = Some(raw);
                }
            }
            number += 1;
        }

        Err(ServiceError::SchemaViolation(format!(
            "passage {} still malformed after {} attempt(s): {last_error}",
            passage_index + 1,
            self.options.policy.max_attempts()
        )))
    }
}

/// The `passage_index`-th fixed-size slice of `vocabulary`; shorter or empty
/// at the tail.
pub fn batch_for(
    vocabulary: &[VocabularyWord],
    passage_index: usize,
    batch_size: usize,
) -> &[VocabularyWord] {
    let start = passage_index.saturating_mul(batch_size).min(vocabulary.len());
    let end = start.saturating_add(batch_size).min(vocabulary.len());
    &vocabulary[start..end]
}
