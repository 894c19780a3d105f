use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub index: u32,
    pub expression: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVocabularyEntry {
    pub index: u32,
    pub user_id: String,
    pub expression: String,
    pub meaning: String,
    pub confidence: f64,
    pub last_reviewed_at: DateTime<Utc>,
}

impl UserVocabularyEntry {
    pub fn introduce(user_id: &str, entry: &CorpusEntry, now: DateTime<Utc>) -> Self {
        Self {
            index: entry.index,
            user_id: user_id.to_string(),
            expression: entry.expression.clone(),
            meaning: entry.meaning.clone(),
            confidence: 0.0,
            last_reviewed_at: now,
        }
    }

    pub fn word(&self) -> VocabularyWord {
        VocabularyWord {
            expression: self.expression.clone(),
            meaning: self.meaning.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyWord {
    pub expression: String,
    pub meaning: String,
}

pub type VocabularyBatch = Vec<VocabularyWord>;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub batch: VocabularyBatch,
    pub sentence_budget: u32,
    pub proficiency_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationResult {
    #[serde(alias = "japanese")]
    pub target: String,
    #[serde(alias = "english")]
    pub translation: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub result: GenerationResult,
    pub words: VocabularyBatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    pub user_id: String,
    pub requested: usize,
    pub allocated: Vec<u32>,
    pub inserted: usize,
    pub missing: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassageResponse {
    pub user_id: String,
    pub requested: usize,
    pub sentences: u32,
    pub proficiency: String,
    pub vocabulary_count: usize,
    pub generated_at: String,
    pub passages: Vec<Passage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordListing {
    pub index: u32,
    pub expression: String,
    pub meaning: String,
    pub confidence: f64,
    pub last_reviewed_at: DateTime<Utc>,
}

impl From<UserVocabularyEntry> for WordListing {
    fn from(entry: UserVocabularyEntry) -> Self {
        Self {
            index: entry.index,
            expression: entry.expression,
            meaning: entry.meaning,
            confidence: entry.confidence,
            last_reviewed_at: entry.last_reviewed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusImportReport {
    pub source: String,
    pub sha256: String,
    pub imported_at: String,
    pub entries_imported: usize,
    pub corpus_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProgressSummary {
    pub user_id: String,
    pub assigned: usize,
    pub max_index: u32,
    pub gaps: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub db_path: String,
    pub db_schema_version: Option<String>,
    pub corpus_total: i64,
    pub corpus_source_sha256: Option<String>,
    pub corpus_imported_at: Option<String>,
    pub user: Option<UserProgressSummary>,
}
