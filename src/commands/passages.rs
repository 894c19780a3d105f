use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::{open_store, positive_amount, resolve_user};
use crate::backend::{CommandBackend, GenerationBackend, HttpBackend, HttpBackendConfig};
use crate::cli::{BackendArgs, BackendKind, GeneratePassagesArgs};
use crate::error::{ServiceError, ServiceResult};
use crate::model::{PassageResponse, VocabularyWord};
use crate::store::VocabularyStore;
use crate::synthesis::{CancellationToken, SynthesisOptions, Synthesizer};
use crate::util::{now_utc_string, write_json_pretty, write_json_stdout};

pub fn run(args: GeneratePassagesArgs) -> Result<()> {
    let user_id = resolve_user(&args.user)?;
    let amount = positive_amount("amount", args.amount)?;
    let sentences = positive_amount("sentences", args.sentences)?;
    let sentences = u32::try_from(sentences).map_err(|_| {
        ServiceError::ValidationError(format!("sentences is too large: {sentences}"))
    })?;
    let proficiency = args.proficiency.trim();
    if proficiency.is_empty() {
        let message = "proficiency must not be empty".to_string();
        return Err(ServiceError::ValidationError(message).into());
    }

    let store = open_store(&args.store)?;
    let backend = build_backend(&args.backend)?;
    let options = SynthesisOptions::new(sentences, proficiency);

    // The CLI never cancels; a run always completes or fails as a whole.
    let cancel = CancellationToken::new();
    let response = generate_passages(
        &store,
        backend.as_ref(),
        &user_id,
        amount,
        args.vocabulary_limit.max(1),
        options,
        &cancel,
    )?;

    if let Some(output) = args.output.as_deref() {
        write_json_pretty(output, &response)?;
        info!(path = %output.display(), "wrote passages");
    }
    write_json_stdout(&response)
}

pub(crate) fn build_backend(args: &BackendArgs) -> ServiceResult<Box<dyn GenerationBackend>> {
    match args.backend {
        BackendKind::Http => {
            let backend = HttpBackend::new(HttpBackendConfig {
                api_url: args.api_url.clone(),
                api_key: args.api_key.clone(),
                model: args.model.clone(),
                max_tokens: args.max_tokens,
                temperature: args.temperature,
                timeout: Duration::from_millis(args.timeout_ms),
            })?;
            Ok(Box::new(backend))
        }
        BackendKind::Command => Ok(Box::new(CommandBackend::new(
            args.command_bin.clone(),
            args.command_args.clone(),
            Some(args.model.clone()).filter(|model| !model.is_empty()),
        ))),
    }
}

/// Reads the user's first `vocabulary_limit` words by index and synthesizes
/// `amount` passages from them.
pub(crate) fn generate_passages<B: GenerationBackend + ?Sized>(
    store: &VocabularyStore,
    backend: &B,
    user_id: &str,
    amount: usize,
    vocabulary_limit: usize,
    options: SynthesisOptions,
    cancel: &CancellationToken,
) -> ServiceResult<PassageResponse> {
    let entries = store.top_by_index(user_id, vocabulary_limit)?;
    if entries.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "no vocabulary assigned to user {user_id}"
        )));
    }

    let vocabulary = entries.iter().map(|entry| entry.word()).collect::<Vec<VocabularyWord>>();
    info!(
        user = %user_id,
        vocabulary = vocabulary.len(),
        requested = amount,
        backend = backend.name(),
        "starting passage synthesis"
    );

    let sentences = options.sentence_budget;
    let proficiency = options.proficiency_tag.clone();
    let passages = Synthesizer::new(backend, options).synthesize(&vocabulary, amount, cancel)?;

    info!(user = %user_id, passages = passages.len(), "passage synthesis completed");

    Ok(PassageResponse {
        user_id: user_id.to_string(),
        requested: amount,
        sentences,
        proficiency,
        vocabulary_count: vocabulary.len(),
        generated_at: now_utc_string(),
        passages,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::Utc;

    use super::*;
    use crate::commands::allocate::allocate_slots;
    use crate::model::CorpusEntry;

    /// Numbers each passage by call order.
    struct CountingBackend {
        calls: Cell<usize>,
    }

    impl GenerationBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn generate(&self, _prompt: &str) -> ServiceResult<String> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            Ok(format!(
                r#"{{"target":"passage {call}","translation":"t","explanation":"e"}}"#
            ))
        }
    }

    fn store_with_words(user_id: &str, words: usize) -> VocabularyStore {
        let mut store = VocabularyStore::open_in_memory().unwrap();
        let entries = (1..=100)
            .map(|index| CorpusEntry {
                index,
                expression: format!("expr-{index}"),
                meaning: format!("meaning-{index}"),
            })
            .collect::<Vec<_>>();
        store.import_corpus(&entries).unwrap();
        if words > 0 {
            allocate_slots(&mut store, user_id, words, Utc::now()).unwrap();
        }
        store
    }

    #[test]
    fn user_without_vocabulary_is_not_found() {
        let store = store_with_words("alice", 0);
        let backend = CountingBackend { calls: Cell::new(0) };
        let err = generate_passages(
            &store,
            &backend,
            "alice",
            2,
            50,
            SynthesisOptions::new(5, "N4"),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), "not_found");
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn passages_use_top_words_by_index() {
        let store = store_with_words("alice", 25);
        let backend = CountingBackend { calls: Cell::new(0) };
        let response = generate_passages(
            &store,
            &backend,
            "alice",
            3,
            50,
            SynthesisOptions::new(5, "N4"),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(response.passages.len(), 3);
        assert_eq!(response.vocabulary_count, 25);
        assert_eq!(response.passages[0].words[0].expression, "expr-1");
        assert_eq!(response.passages[1].words[0].expression, "expr-11");
        assert_eq!(response.passages[2].words.len(), 5);
        assert_eq!(response.passages[2].result.target, "passage 2");
    }

    #[test]
    fn vocabulary_limit_caps_the_read() {
        let store = store_with_words("alice", 60);
        let backend = CountingBackend { calls: Cell::new(0) };
        let response = generate_passages(
            &store,
            &backend,
            "alice",
            6,
            50,
            SynthesisOptions::new(3, "N5"),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(response.vocabulary_count, 50);
        assert!(response.passages[5].words.is_empty());
        assert_eq!(response.proficiency, "N5");
    }

    #[test]
    fn command_backend_is_built_without_api_key() {
        let args = BackendArgs {
            backend: BackendKind::Command,
            api_url: String::new(),
            model: String::new(),
            api_key: String::new(),
            max_tokens: 100,
            temperature: 1.0,
            timeout_ms: 1000,
            command_bin: "claude".into(),
            command_args: Vec::new(),
        };
        assert_eq!(build_backend(&args).ok().unwrap().name(), "command");

        let http = BackendArgs {
            backend: BackendKind::Http,
            ..args
        };
        assert_eq!(build_backend(&http).err().unwrap().kind(), "validation_error");
    }
}
