use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Raw,
    Hypothesis,
    Annotated,
}

impl Variant {
    /// Evaluation order, which is also the tie-break order for `best_variant`
    /// (cheapest annotation effort first).
    pub const ALL: [Variant; 3] = [Variant::Raw, Variant::Hypothesis, Variant::Annotated];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Hypothesis => "hypothesis",
            Self::Annotated => "annotated",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub dataset_id: String,
    pub tables: Vec<Table>,
}

impl SchemaSnapshot {
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }
}

pub type SampleRow = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSample {
    pub rows: Vec<SampleRow>,
    pub approximate_row_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleSet {
    pub row_limit: usize,
    pub tables: BTreeMap<String, TableSample>,
}

impl SampleSet {
    pub fn rows_for(&self, table: &str) -> &[SampleRow] {
        self.tables
            .get(table)
            .map(|sample| sample.rows.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHypothesis {
    pub column_name: String,
    pub data_type: String,
    pub sample_values: Vec<String>,
    #[serde(default)]
    pub enum_values_found: Vec<String>,
    pub hypothesis_text: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    YesNo,
    MultipleChoice,
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl UserQuestion {
    pub fn yes_no(text: impl Into<String>) -> Self {
        Self {
            question_text: text.into(),
            question_type: QuestionType::YesNo,
            options: None,
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            question_text: text.into(),
            question_type: QuestionType::FreeText,
            options: None,
        }
    }

    pub fn multiple_choice(text: impl Into<String>, options: &[&str]) -> Self {
        Self {
            question_text: text.into(),
            question_type: QuestionType::MultipleChoice,
            options: Some(options.iter().map(|value| value.to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnQuestions {
    pub column: ColumnHypothesis,
    pub questions: Vec<UserQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuestionSet {
    pub table_name: String,
    pub table_hypothesis: String,
    #[serde(default)]
    pub table_level_questions: Vec<UserQuestion>,
    #[serde(default)]
    pub column_questions: Vec<ColumnQuestions>,
}

impl TableQuestionSet {
    pub fn total_question_count(&self) -> usize {
        self.table_level_questions.len()
            + self
                .column_questions
                .iter()
                .map(|entry| entry.questions.len())
                .sum::<usize>()
    }
}

pub type AnswerMap = BTreeMap<usize, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAnswers {
    #[serde(default)]
    pub table: AnswerMap,
    #[serde(default)]
    pub columns: BTreeMap<String, AnswerMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswers {
    #[serde(default)]
    pub tables: BTreeMap<String, TableAnswers>,
}

impl UserAnswers {
    pub fn for_table(&self, table: &str) -> Option<&TableAnswers> {
        self.tables.get(table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAnnotation {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub description: String,
    #[serde(default)]
    pub business_context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAnnotation {
    pub table_name: String,
    pub description: String,
    pub columns: Vec<ColumnAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaContext {
    pub variant: Variant,
    pub tables: Vec<TableAnnotation>,
}

pub type ResultRow = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkQuestion {
    pub id: String,
    pub natural_language_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<ResultSet>,
    /// Ground truth for description-level scoring when no result set exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_description: Option<String>,
    /// Gold query executed during benchmark loading to fill `expected_result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_query: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: String,
}

fn default_difficulty() -> String {
    "unspecified".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    Rows { result_set: ResultSet },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExecutionOutcome {
    pub generated_query_text: String,
    pub result: ExecutionResult,
}

impl QueryExecutionOutcome {
    pub fn result_set(&self) -> Option<&ResultSet> {
        match &self.result {
            ExecutionResult::Rows { result_set } => Some(result_set),
            ExecutionResult::Error { .. } => None,
        }
    }

    pub fn execution_error(&self) -> Option<&str> {
        match &self.result {
            ExecutionResult::Rows { .. } => None,
            ExecutionResult::Error { message } => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub question_id: String,
    pub variant: Variant,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAccuracy {
    pub variant: Variant,
    pub total_questions: usize,
    pub correct_count: usize,
    pub accuracy_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub verdicts: Vec<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_variant: Option<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementDeltas {
    pub hypothesis_over_raw: Option<f64>,
    pub annotated_over_raw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyAccuracy {
    pub difficulty_level: String,
    pub per_variant: Vec<VariantAccuracy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedSignificance {
    pub hypothesis_vs_raw_p_value: Option<f64>,
    pub annotated_vs_raw_p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled { phase: String },
    ConnectionLost { phase: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HypothesisSource {
    Heuristic,
    Model,
    HeuristicFallback { reason: String },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotatedSource {
    Reconciled,
    HypothesisFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFingerprint {
    pub variant: Variant,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub dataset_id: String,
    pub status: RunStatus,
    pub hypothesis_source: HypothesisSource,
    pub annotated_source: AnnotatedSource,
    pub context_fingerprints: Vec<ContextFingerprint>,
    pub per_variant: Vec<VariantAccuracy>,
    pub per_question: Vec<QuestionOutcome>,
    pub improvement_deltas: ImprovementDeltas,
    pub per_difficulty: Vec<DifficultyAccuracy>,
    pub significance: PairedSignificance,
}

impl EvaluationReport {
    pub fn accuracy_for(&self, variant: Variant) -> Option<&VariantAccuracy> {
        self.per_variant
            .iter()
            .find(|accuracy| accuracy.variant == variant)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub dataset_id: String,
    pub total_questions: usize,
    pub report: EvaluationReport,
}
