use std::path::PathBuf;

use annoteval::generation::{DEFAULT_ENDPOINT, DEFAULT_MODEL_ID};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "annoteval",
    version,
    about = "Measure how schema annotations change text-to-SQL accuracy"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Snapshot(SnapshotArgs),
    Annotate(AnnotateArgs),
    Reconcile(ReconcileArgs),
    Evaluate(EvaluateArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub dataset: String,

    #[arg(long, default_value_t = 5)]
    pub sample_rows: usize,

    #[arg(long, default_value_t = 30_000)]
    pub call_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    #[arg(long, env = "ANNOTEVAL_MODEL_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub model_endpoint: String,

    #[arg(long, env = "ANNOTEVAL_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AnnotatorKind {
    Heuristic,
    Model,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum GeneratorKind {
    Replay,
    Chat,
}

#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, value_enum, default_value_t = AnnotatorKind::Heuristic)]
    pub annotator: AnnotatorKind,

    #[arg(long)]
    pub sampling_strategy: Option<String>,

    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    #[arg(long)]
    pub question_sets_path: PathBuf,

    #[arg(long)]
    pub answers_path: PathBuf,

    #[arg(long, default_value_t = false)]
    pub allow_incomplete: bool,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, default_value = ".cache/annoteval")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub benchmark_path: PathBuf,

    /// Reconciled annotations; selects interactive mode.
    #[arg(long, conflicts_with_all = ["question_sets_path", "answers_path"])]
    pub annotations_path: Option<PathBuf>,

    /// Question sets to reconcile with `--answers-path`; selects interactive mode.
    #[arg(long, requires = "answers_path")]
    pub question_sets_path: Option<PathBuf>,

    #[arg(long, requires = "question_sets_path")]
    pub answers_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub allow_incomplete: bool,

    #[arg(long, value_enum, default_value_t = GeneratorKind::Replay)]
    pub generator: GeneratorKind,

    #[arg(long)]
    pub replay_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = AnnotatorKind::Heuristic)]
    pub annotator: AnnotatorKind,

    #[arg(long)]
    pub sampling_strategy: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/annoteval")]
    pub cache_root: PathBuf,

    /// Print the full stored record of one run instead of the run list.
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
