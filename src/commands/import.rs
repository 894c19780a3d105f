use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::open_store;
use crate::cli::ImportCorpusArgs;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{CorpusEntry, CorpusImportReport};
use crate::util::{now_utc_string, sha256_hex, write_json_stdout};

pub fn run(args: ImportCorpusArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.source)
        .with_context(|| format!("failed to read corpus source {}", args.source.display()))?;
    let entries = parse_corpus(&raw)?;
    if entries.is_empty() {
        warn!(source = %args.source.display(), "corpus source has no entries");
    }

    let sha256 = sha256_hex(raw.as_bytes());
    let mut store = open_store(&args.store)?;
    let entries_imported = store.import_corpus(&entries)?;
    let imported_at = now_utc_string();

    store.set_metadata("corpus_source", &args.source.display().to_string())?;
    store.set_metadata("corpus_source_sha256", &sha256)?;
    store.set_metadata("corpus_imported_at", &imported_at)?;
    let corpus_total = store.corpus_count()?;

    info!(
        source = %args.source.display(),
        entries_imported,
        corpus_total,
        "corpus imported"
    );

    write_json_stdout(&CorpusImportReport {
        source: args.source.display().to_string(),
        sha256,
        imported_at,
        entries_imported,
        corpus_total,
    })
}

/// Accepts a JSON array of entries or TSV lines `index<TAB>expression<TAB>meaning`.
pub(crate) fn parse_corpus(raw: &str) -> ServiceResult<Vec<CorpusEntry>> {
    let entries = if raw.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<CorpusEntry>>(raw).map_err(|err| {
            ServiceError::ValidationError(format!("invalid corpus json: {err}"))
        })?
    } else {
        parse_tsv(raw)?
    };

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &entries {
        if entry.index == 0 {
            return Err(ServiceError::ValidationError(
                "corpus index must be positive".to_string(),
            ));
        }
        if !seen.insert(entry.index) {
            return Err(ServiceError::ValidationError(format!(
                "duplicate corpus index {}",
                entry.index
            )));
        }
    }

    Ok(entries)
}

fn parse_tsv(raw: &str) -> ServiceResult<Vec<CorpusEntry>> {
    let mut entries = Vec::new();

    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let (Some(index), Some(expression), Some(meaning)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ServiceError::ValidationError(format!(
                "line {}: expected index, expression and meaning separated by tabs",
                line_no + 1
            )));
        };

        let index = index.trim().parse::<u32>().map_err(|err| {
            ServiceError::ValidationError(format!(
                "line {}: invalid index {index:?}: {err}",
                line_no + 1
            ))
        })?;

        entries.push(CorpusEntry {
            index,
            expression: expression.trim().to_string(),
            meaning: meaning.trim().to_string(),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tsv_skipping_comments_and_blanks() {
        let raw = "# core list\n1\t猫\tcat\n\n2\t犬\tdog; hound\r\n";
        let entries = parse_corpus(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].expression, "猫");
        assert_eq!(entries[1].meaning, "dog; hound");
    }

    #[test]
    fn parses_json_array() {
        let raw = r#"[{"index":3,"expression":"本","meaning":"book"}]"#;
        let entries = parse_corpus(raw).unwrap();
        assert_eq!(entries[0].index, 3);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert_eq!(parse_corpus("1\tonly-two").unwrap_err().kind(), "validation_error");
        assert_eq!(parse_corpus("x\ta\tb").unwrap_err().kind(), "validation_error");
        assert_eq!(parse_corpus("-1\ta\tb").unwrap_err().kind(), "validation_error");
    }

    #[test]
    fn rejects_zero_and_duplicate_indices() {
        assert_eq!(parse_corpus("0\ta\tb").unwrap_err().kind(), "validation_error");
        let err = parse_corpus("4\ta\tb\n4\tc\td").unwrap_err();
        assert!(err.message().contains("duplicate corpus index 4"));
    }
}
