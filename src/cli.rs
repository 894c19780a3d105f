use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::backend::http::{DEFAULT_API_URL, DEFAULT_MODEL};

#[derive(Parser, Debug)]
#[command(
    name = "vocab-study",
    version,
    about = "Vocabulary slot allocation and reading passage generation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    ImportCorpus(ImportCorpusArgs),
    AllocateSlots(AllocateSlotsArgs),
    GeneratePassages(GeneratePassagesArgs),
    ListWords(ListWordsArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/vocab-study")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_root.join("vocab_study.sqlite"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    /// Learner the operation acts on.
    #[arg(long, env = "VOCAB_USER")]
    pub user: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportCorpusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// TSV (`index<TAB>expression<TAB>meaning`) or JSON array of entries.
    #[arg(long)]
    pub source: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct AllocateSlotsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub user: UserArgs,

    #[arg(long, allow_negative_numbers = true)]
    pub amount: i64,
}

#[derive(Args, Debug, Clone)]
pub struct ListWordsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub user: UserArgs,

    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    pub amount: i64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum BackendKind {
    Http,
    Command,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    #[arg(long, value_enum, default_value_t = BackendKind::Http)]
    pub backend: BackendKind,

    #[arg(long, env = "VOCAB_LLM_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(long, env = "VOCAB_LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "VOCAB_LLM_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    #[arg(long, default_value_t = 20000)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 1.0)]
    pub temperature: f32,

    #[arg(long, default_value_t = 120_000)]
    pub timeout_ms: u64,

    #[arg(long, env = "VOCAB_LLM_BIN", default_value = "claude")]
    pub command_bin: PathBuf,

    #[arg(long = "command-arg")]
    pub command_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GeneratePassagesArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub user: UserArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, allow_negative_numbers = true)]
    pub amount: i64,

    #[arg(long, allow_negative_numbers = true)]
    pub sentences: i64,

    #[arg(long, default_value = "N4")]
    pub proficiency: String,

    #[arg(long, default_value_t = 50)]
    pub vocabulary_limit: usize,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub user: UserArgs,
}
