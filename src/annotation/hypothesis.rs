use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::{humanize, name_tokens, singular_entity};
use crate::error::CollaboratorError;
use crate::generation::{AnnotationModel, AnnotationProposal, AnnotationRequest, ProposalMode};
use crate::model::{
    Column, ColumnAnnotation, ColumnHypothesis, ColumnQuestions, HypothesisSource, QuestionType,
    SampleRow, SampleSet, SchemaSnapshot, Table, TableAnnotation, TableQuestionSet, UserQuestion,
};
use crate::timeout::CallTimeout;

pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const MIN_SAMPLE_ROWS: usize = 5;
pub const MAX_SAMPLE_ROWS: usize = 1000;
const MAX_REPRESENTATIVE_VALUES: usize = 3;
const MAX_ENUM_DISTINCT_VALUES: usize = 3;

pub const KEY_ROLE_OPTIONS: [&str; 4] = ["primary key", "foreign key", "both", "neither"];

const MONETARY_TOKENS: &[&str] = &[
    "price", "amount", "cost", "payment", "salary", "fee", "balance", "revenue", "total",
];
const COUNT_TOKENS: &[&str] = &["count", "num", "number", "qty", "quantity"];
const TEMPORAL_TOKENS: &[&str] = &["date", "time", "year", "month", "day", "created", "updated", "at"];
const NAME_TOKENS: &[&str] = &["name", "title", "label"];
const CONTACT_TOKENS: &[&str] = &["email", "phone", "address", "url", "website"];
const FLAG_PREFIXES: &[&str] = &["is", "has", "can"];

pub fn clamp_row_limit(requested: usize) -> usize {
    requested.clamp(MIN_SAMPLE_ROWS, MAX_SAMPLE_ROWS)
}

/// Hypotheses plus a record of which path produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypotheses<T> {
    pub items: Vec<T>,
    pub source: HypothesisSource,
}

/// Proposes table and column meanings, through a model when one is configured.
///
/// A failing, timed-out or unparseable model call falls back to the
/// deterministic heuristics below. Credential failures are returned.
#[derive(Clone)]
pub struct HypothesisGenerator {
    model: Option<Arc<dyn AnnotationModel>>,
    timeout: CallTimeout,
    sampling_strategy: Option<String>,
}

impl HypothesisGenerator {
    pub fn heuristic() -> Self {
        Self {
            model: None,
            timeout: CallTimeout::disabled(),
            sampling_strategy: None,
        }
    }

    pub fn with_model(model: Arc<dyn AnnotationModel>, timeout: CallTimeout) -> Self {
        Self {
            model: Some(model),
            timeout,
            sampling_strategy: None,
        }
    }

    pub fn sampling_strategy(mut self, strategy: Option<String>) -> Self {
        self.sampling_strategy = strategy.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn generate_standard(
        &self,
        schema: &SchemaSnapshot,
        samples: &SampleSet,
    ) -> Result<Hypotheses<TableAnnotation>, CollaboratorError> {
        let heuristic = || heuristic_annotations(schema, samples);
        if self.model.is_none() {
            return Ok(Hypotheses {
                items: heuristic(),
                source: HypothesisSource::Heuristic,
            });
        }

        let proposal = self
            .request_model(schema, samples, ProposalMode::Standard)
            .and_then(|proposal| match proposal {
                AnnotationProposal::Tables(tables) => {
                    validate_model_tables(schema, &tables)?;
                    Ok(tables)
                }
                AnnotationProposal::Questions(_) => Err(CollaboratorError::ModelUnavailable(
                    "model returned question sets for a standard request".to_string(),
                )),
            });

        resolve_with_fallback(proposal, heuristic)
    }

    pub fn generate_interactive(
        &self,
        schema: &SchemaSnapshot,
        samples: &SampleSet,
    ) -> Result<Hypotheses<TableQuestionSet>, CollaboratorError> {
        let heuristic = || heuristic_question_sets(schema, samples);
        if self.model.is_none() {
            return Ok(Hypotheses {
                items: heuristic(),
                source: HypothesisSource::Heuristic,
            });
        }

        let proposal = self
            .request_model(schema, samples, ProposalMode::Interactive)
            .and_then(|proposal| match proposal {
                AnnotationProposal::Questions(question_sets) => {
                    validate_model_questions(schema, &question_sets)?;
                    Ok(question_sets)
                }
                AnnotationProposal::Tables(_) => Err(CollaboratorError::ModelUnavailable(
                    "model returned annotations for an interactive request".to_string(),
                )),
            });

        resolve_with_fallback(proposal, heuristic)
    }

    fn request_model(
        &self,
        schema: &SchemaSnapshot,
        samples: &SampleSet,
        mode: ProposalMode,
    ) -> Result<AnnotationProposal, CollaboratorError> {
        let Some(model) = self.model.as_ref().map(Arc::clone) else {
            return Err(CollaboratorError::ModelUnavailable(
                "no annotation model configured".to_string(),
            ));
        };

        info!(model = %model.model_name(), mode = ?mode, "requesting annotation hypotheses");
        let schema = schema.clone();
        let samples = samples.clone();
        let request = AnnotationRequest {
            mode,
            sampling_strategy: self.sampling_strategy.clone(),
        };
        self.timeout.run("annotation hypothesis", move || {
            model.generate_annotation_hypothesis(&schema, &samples, &request)
        })
    }
}

fn resolve_with_fallback<T>(
    proposal: Result<Vec<T>, CollaboratorError>,
    heuristic: impl FnOnce() -> Vec<T>,
) -> Result<Hypotheses<T>, CollaboratorError> {
    match proposal {
        Ok(items) => Ok(Hypotheses {
            items,
            source: HypothesisSource::Model,
        }),
        Err(err @ CollaboratorError::Credential(_)) => Err(err),
        Err(err) => {
            warn!(error = %err, "annotation model failed; using heuristic hypotheses");
            Ok(Hypotheses {
                items: heuristic(),
                source: HypothesisSource::HeuristicFallback {
                    reason: err.to_string(),
                },
            })
        }
    }
}

fn validate_model_tables(
    schema: &SchemaSnapshot,
    tables: &[TableAnnotation],
) -> Result<(), CollaboratorError> {
    let expected = schema
        .tables
        .iter()
        .map(|table| table.name.as_str())
        .collect::<BTreeSet<&str>>();
    let proposed = tables
        .iter()
        .map(|table| table.table_name.as_str())
        .collect::<BTreeSet<&str>>();
    if expected != proposed || tables.len() != schema.tables.len() {
        return Err(unparseable("table set does not match the schema"));
    }

    for annotation in tables {
        let Some(table) = schema
            .tables
            .iter()
            .find(|table| table.name == annotation.table_name)
        else {
            continue;
        };
        let expected_columns = table
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<BTreeSet<&str>>();
        let proposed_columns = annotation
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<BTreeSet<&str>>();
        if expected_columns != proposed_columns {
            return Err(unparseable(&format!(
                "columns of `{}` do not match the schema",
                table.name
            )));
        }
    }

    Ok(())
}

fn validate_model_questions(
    schema: &SchemaSnapshot,
    question_sets: &[TableQuestionSet],
) -> Result<(), CollaboratorError> {
    let expected = schema
        .tables
        .iter()
        .map(|table| table.name.as_str())
        .collect::<BTreeSet<&str>>();
    let proposed = question_sets
        .iter()
        .map(|set| set.table_name.as_str())
        .collect::<BTreeSet<&str>>();
    if expected != proposed || question_sets.len() != schema.tables.len() {
        return Err(unparseable("question sets do not match the schema tables"));
    }

    let questions = question_sets.iter().flat_map(|set| {
        set.table_level_questions
            .iter()
            .chain(set.column_questions.iter().flat_map(|entry| entry.questions.iter()))
    });
    for question in questions {
        let has_options = question
            .options
            .as_ref()
            .map(|options| !options.is_empty())
            .unwrap_or(false);
        if has_options != (question.question_type == QuestionType::MultipleChoice) {
            return Err(unparseable(&format!(
                "question `{}` has inconsistent options",
                question.question_text
            )));
        }
    }

    Ok(())
}

fn unparseable(detail: &str) -> CollaboratorError {
    CollaboratorError::ModelUnavailable(format!("unparseable model proposal: {detail}"))
}

pub fn heuristic_annotations(schema: &SchemaSnapshot, samples: &SampleSet) -> Vec<TableAnnotation> {
    schema
        .tables
        .iter()
        .map(|table| {
            let rows = samples.rows_for(&table.name);
            TableAnnotation {
                table_name: table.name.clone(),
                description: table_hypothesis(table, samples),
                columns: table
                    .columns
                    .iter()
                    .map(|column| ColumnAnnotation {
                        name: column.name.clone(),
                        data_type: column.data_type.clone(),
                        description: column_hypothesis(table, column, rows).hypothesis_text,
                        business_context: String::new(),
                    })
                    .collect(),
            }
        })
        .collect()
}

pub fn heuristic_question_sets(
    schema: &SchemaSnapshot,
    samples: &SampleSet,
) -> Vec<TableQuestionSet> {
    schema
        .tables
        .iter()
        .map(|table| {
            let rows = samples.rows_for(&table.name);
            let table_hypothesis = table_hypothesis(table, samples);
            let table_level_questions = vec![
                UserQuestion::yes_no(format!(
                    "Does this describe `{}` correctly: {}",
                    table.name, table_hypothesis
                )),
                UserQuestion::free_text(format!(
                    "What else should an analyst know about `{}` (purpose, scope, how rows are created)?",
                    table.name
                )),
            ];

            let column_questions = table
                .columns
                .iter()
                .map(|column| {
                    let hypothesis = column_hypothesis(table, column, rows);
                    let questions = column_questions(table, column, &hypothesis);
                    ColumnQuestions {
                        column: hypothesis,
                        questions,
                    }
                })
                .collect();

            TableQuestionSet {
                table_name: table.name.clone(),
                table_hypothesis,
                table_level_questions,
                column_questions,
            }
        })
        .collect()
}

fn table_hypothesis(table: &Table, samples: &SampleSet) -> String {
    let entity = singular_entity(&table.name);
    let row_count = samples
        .tables
        .get(&table.name)
        .map(|sample| sample.approximate_row_count);
    let key = table
        .columns
        .iter()
        .find(|column| is_natural_key(&table.name, &column.name));

    let mut sentence = format!(
        "Stores {} records with {} columns",
        entity,
        table.columns.len()
    );
    if let Some(count) = row_count {
        sentence.push_str(&format!(" (about {count} rows)"));
    }
    if let Some(key) = key {
        sentence.push_str(&format!(", identified by {}", key.name));
    }
    sentence.push('.');
    sentence
}

/// Builds the single-sentence hypothesis and sample profile for one column.
pub fn column_hypothesis(table: &Table, column: &Column, rows: &[SampleRow]) -> ColumnHypothesis {
    let distinct_values = distinct_sample_values(&column.name, rows);
    let sample_values = distinct_values
        .iter()
        .take(MAX_REPRESENTATIVE_VALUES)
        .cloned()
        .collect::<Vec<String>>();
    let enumerable = is_textual_type(&column.data_type)
        && !distinct_values.is_empty()
        && distinct_values.len() <= MAX_ENUM_DISTINCT_VALUES;
    let enum_values_found = if enumerable {
        distinct_values.clone()
    } else {
        Vec::new()
    };

    let hypothesis_text = hypothesis_sentence(table, column, &sample_values, &enum_values_found);

    ColumnHypothesis {
        column_name: column.name.clone(),
        data_type: column.data_type.clone(),
        sample_values,
        enum_values_found,
        hypothesis_text,
    }
}

fn hypothesis_sentence(
    table: &Table,
    column: &Column,
    sample_values: &[String],
    enum_values: &[String],
) -> String {
    let entity = singular_entity(&table.name);
    let human = humanize(&column.name);
    let tokens = name_tokens(&column.name);
    let has_token = |candidates: &[&str]| tokens.iter().any(|token| candidates.contains(&token.as_str()));
    let data_type = column.data_type.to_ascii_uppercase();

    let stem = if is_identifier_like(&column.name) {
        if is_natural_key(&table.name, &column.name) {
            format!("Unique identifier for each {entity} record")
        } else {
            let referenced = tokens
                .iter()
                .filter(|token| token.as_str() != "id")
                .cloned()
                .collect::<Vec<String>>()
                .join(" ");
            if referenced.is_empty() {
                format!("Identifier stored on each {entity} record")
            } else {
                format!("Reference to the {referenced} associated with each {entity}, likely a foreign key")
            }
        }
    } else if !enum_values.is_empty() {
        return format!(
            "Categorical {} attribute of each {} with observed values: {}.",
            human,
            entity,
            enum_values.join(", ")
        );
    } else if tokens
        .first()
        .map(|token| FLAG_PREFIXES.contains(&token.as_str()))
        .unwrap_or(false)
        || data_type.contains("BOOL")
    {
        format!("Flag indicating whether the {entity} {human}")
    } else if has_token(MONETARY_TOKENS) {
        format!("Monetary amount representing the {human} of each {entity}")
    } else if has_token(COUNT_TOKENS) {
        format!("Count or quantity of {human} for each {entity}")
    } else if has_token(TEMPORAL_TOKENS) || data_type.contains("DATE") || data_type.contains("TIME") {
        format!("Temporal value recording the {human} of each {entity}")
    } else if has_token(NAME_TOKENS) {
        format!("Human-readable {human} of each {entity}")
    } else if has_token(CONTACT_TOKENS) {
        format!("Contact detail ({human}) of each {entity}")
    } else if is_numeric_type(&data_type) {
        format!("Numeric {human} measurement for each {entity}")
    } else {
        format!("Descriptive {human} attribute of each {entity}")
    };

    if sample_values.is_empty() {
        format!("{stem}.")
    } else {
        format!("{stem} (e.g. {}).", sample_values.join(", "))
    }
}

fn column_questions(
    table: &Table,
    column: &Column,
    hypothesis: &ColumnHypothesis,
) -> Vec<UserQuestion> {
    let qualified = format!("{}.{}", table.name, column.name);
    let mut questions = Vec::<UserQuestion>::new();

    if hypothesis.enum_values_found.is_empty() {
        questions.push(UserQuestion::yes_no(format!(
            "Is this an accurate description of `{}`: {}",
            qualified, hypothesis.hypothesis_text
        )));
        let data_type = column.data_type.to_ascii_uppercase();
        if is_textual_type(&data_type) || data_type.contains("DATE") || data_type.contains("TIME") {
            questions.push(UserQuestion::free_text(format!(
                "Are there format rules or constraints for `{qualified}` (units, patterns, allowed ranges)?"
            )));
        }
    } else {
        questions.push(UserQuestion::free_text(format!(
            "Column `{}` contains the values {}. What does each value mean?",
            qualified,
            hypothesis.enum_values_found.join(", ")
        )));
    }

    if is_identifier_like(&column.name) {
        questions.push(UserQuestion::multiple_choice(
            format!("What key role does `{qualified}` play?"),
            &KEY_ROLE_OPTIONS,
        ));
        if !is_natural_key(&table.name, &column.name) {
            questions.push(UserQuestion::free_text(format!(
                "Which table or relationship does `{qualified}` reference?"
            )));
        }
    }

    questions
}

/// A column whose name carries an `id` word token (`car_id`, `carID`, `id`).
pub fn is_identifier_like(column_name: &str) -> bool {
    name_tokens(column_name).iter().any(|token| token == "id")
}

/// Matches `id`, `<table>_id` or `<entity>_id` in any casing.
pub fn is_natural_key(table_name: &str, column_name: &str) -> bool {
    let column = name_tokens(column_name).concat();
    if column == "id" {
        return true;
    }

    let table = name_tokens(table_name).concat();
    let entity = singular_entity(table_name).replace(' ', "");
    column == format!("{table}id") || column == format!("{entity}id")
}

fn is_textual_type(data_type: &str) -> bool {
    let upper = data_type.to_ascii_uppercase();
    ["CHAR", "CLOB", "TEXT", "STRING", "ENUM"]
        .iter()
        .any(|marker| upper.contains(marker))
}

fn is_numeric_type(upper_type: &str) -> bool {
    ["INT", "REAL", "FLOA", "DOUB", "NUM", "DEC"]
        .iter()
        .any(|marker| upper_type.contains(marker))
}

fn distinct_sample_values(column_name: &str, rows: &[SampleRow]) -> Vec<String> {
    let mut values = Vec::<String>::new();
    for row in rows {
        let Some(value) = row.get(column_name) else {
            continue;
        };
        let rendered = match value {
            Value::Null => continue,
            Value::String(text) => text.trim().to_string(),
            other => other.to_string(),
        };
        if !rendered.is_empty() && !values.contains(&rendered) {
            values.push(rendered);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::model::TableSample;

    fn cars_table() -> Table {
        Table {
            name: "cars".to_string(),
            columns: vec![
                Column {
                    name: "car_id".to_string(),
                    data_type: "INTEGER".to_string(),
                    nullable: false,
                },
                Column {
                    name: "model".to_string(),
                    data_type: "TEXT".to_string(),
                    nullable: false,
                },
                Column {
                    name: "status".to_string(),
                    data_type: "TEXT".to_string(),
                    nullable: true,
                },
                Column {
                    name: "maker_id".to_string(),
                    data_type: "INTEGER".to_string(),
                    nullable: true,
                },
            ],
        }
    }

    fn cars_samples() -> SampleSet {
        let rows = [
            ("Civic", "sold"),
            ("Model 3", "available"),
            ("Corolla", "pending"),
            ("Accord", "available"),
            ("Golf", "sold"),
        ]
        .iter()
        .enumerate()
        .map(|(index, (model, status))| {
            let mut row = SampleRow::new();
            row.insert("car_id".to_string(), json!(index + 1));
            row.insert("model".to_string(), json!(model));
            row.insert("status".to_string(), json!(status));
            row.insert("maker_id".to_string(), json!(index % 2));
            row
        })
        .collect::<Vec<SampleRow>>();

        let mut tables = BTreeMap::new();
        tables.insert(
            "cars".to_string(),
            TableSample {
                rows,
                approximate_row_count: 42,
            },
        );
        SampleSet {
            row_limit: 5,
            tables,
        }
    }

    fn cars_schema() -> SchemaSnapshot {
        SchemaSnapshot {
            dataset_id: "car_1".to_string(),
            tables: vec![cars_table()],
        }
    }

    struct FailingModel;

    impl AnnotationModel for FailingModel {
        fn model_name(&self) -> &str {
            "failing"
        }

        fn generate_annotation_hypothesis(
            &self,
            _schema: &SchemaSnapshot,
            _samples: &SampleSet,
            _request: &AnnotationRequest,
        ) -> Result<AnnotationProposal, CollaboratorError> {
            Err(CollaboratorError::ModelUnavailable("503 from endpoint".to_string()))
        }
    }

    struct RejectedKeyModel;

    impl AnnotationModel for RejectedKeyModel {
        fn model_name(&self) -> &str {
            "rejected-key"
        }

        fn generate_annotation_hypothesis(
            &self,
            _schema: &SchemaSnapshot,
            _samples: &SampleSet,
            _request: &AnnotationRequest,
        ) -> Result<AnnotationProposal, CollaboratorError> {
            Err(CollaboratorError::Credential("401 invalid api key".to_string()))
        }
    }

    struct WrongTablesModel;

    impl AnnotationModel for WrongTablesModel {
        fn model_name(&self) -> &str {
            "wrong-tables"
        }

        fn generate_annotation_hypothesis(
            &self,
            _schema: &SchemaSnapshot,
            _samples: &SampleSet,
            _request: &AnnotationRequest,
        ) -> Result<AnnotationProposal, CollaboratorError> {
            Ok(AnnotationProposal::Tables(vec![TableAnnotation {
                table_name: "vehicles".to_string(),
                description: "made up".to_string(),
                columns: Vec::new(),
            }]))
        }
    }

    #[test]
    fn clamp_row_limit_bounds_requests() {
        assert_eq!(clamp_row_limit(0), 5);
        assert_eq!(clamp_row_limit(50), 50);
        assert_eq!(clamp_row_limit(50_000), 1000);
    }

    #[test]
    fn enumerable_text_column_reports_values_in_hypothesis() {
        let table = cars_table();
        let samples = cars_samples();
        let hypothesis = column_hypothesis(&table, &table.columns[2], samples.rows_for("cars"));

        assert_eq!(hypothesis.enum_values_found, vec!["sold", "available", "pending"]);
        assert_eq!(hypothesis.sample_values.len(), 3);
        for value in ["sold", "available", "pending"] {
            assert!(hypothesis.hypothesis_text.contains(value));
        }
        assert_eq!(hypothesis.hypothesis_text.matches('.').count(), 1);
    }

    #[test]
    fn high_cardinality_text_column_is_free_form() {
        let table = cars_table();
        let samples = cars_samples();
        let hypothesis = column_hypothesis(&table, &table.columns[1], samples.rows_for("cars"));

        assert!(hypothesis.enum_values_found.is_empty());
        assert_eq!(hypothesis.sample_values, vec!["Civic", "Model 3", "Corolla"]);
    }

    #[test]
    fn identifier_detection_uses_word_tokens() {
        assert!(is_identifier_like("car_id"));
        assert!(is_identifier_like("CarID"));
        assert!(is_identifier_like("id"));
        assert!(!is_identifier_like("paid"));
        assert!(!is_identifier_like("width"));

        assert!(is_natural_key("cars", "car_id"));
        assert!(is_natural_key("cars", "id"));
        assert!(!is_natural_key("cars", "maker_id"));
    }

    #[test]
    fn interactive_questions_follow_column_kind() {
        let question_sets = heuristic_question_sets(&cars_schema(), &cars_samples());
        let set = &question_sets[0];
        assert_eq!(set.table_level_questions.len(), 2);

        let by_name = |name: &str| {
            set.column_questions
                .iter()
                .find(|entry| entry.column.column_name == name)
                .expect("column present")
        };

        let status = by_name("status");
        assert_eq!(status.questions.len(), 1);
        assert_eq!(status.questions[0].question_type, QuestionType::FreeText);

        let model = by_name("model");
        assert_eq!(model.questions[0].question_type, QuestionType::YesNo);
        assert_eq!(model.questions[1].question_type, QuestionType::FreeText);

        let car_id = by_name("car_id");
        let types = car_id
            .questions
            .iter()
            .map(|question| question.question_type)
            .collect::<Vec<QuestionType>>();
        assert_eq!(types, vec![QuestionType::YesNo, QuestionType::MultipleChoice]);

        let maker_id = by_name("maker_id");
        let key_roles = KEY_ROLE_OPTIONS.map(str::to_string);
        assert_eq!(maker_id.questions.len(), 3);
        assert_eq!(maker_id.questions[1].options.as_deref(), Some(&key_roles[..]));
        assert!(maker_id.questions[2].question_text.contains("reference"));
    }

    #[test]
    fn standard_mode_is_deterministic_without_model() {
        let generator = HypothesisGenerator::heuristic();
        let first = generator
            .generate_standard(&cars_schema(), &cars_samples())
            .expect("heuristic hypotheses");
        let second = generator
            .generate_standard(&cars_schema(), &cars_samples())
            .expect("heuristic hypotheses");
        assert_eq!(first, second);
        assert_eq!(first.source, HypothesisSource::Heuristic);
        assert!(first.items[0].description.contains("identified by car_id"));
    }

    #[test]
    fn failing_model_falls_back_to_heuristics() {
        let generator =
            HypothesisGenerator::with_model(Arc::new(FailingModel), CallTimeout::from_millis(1_000));
        let outcome = generator
            .generate_standard(&cars_schema(), &cars_samples())
            .expect("fallback hypotheses");

        assert_eq!(
            outcome.items,
            heuristic_annotations(&cars_schema(), &cars_samples())
        );
        match outcome.source {
            HypothesisSource::HeuristicFallback { reason } => assert!(reason.contains("503")),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn mismatched_model_tables_are_treated_as_unparseable() {
        let generator = HypothesisGenerator::with_model(
            Arc::new(WrongTablesModel),
            CallTimeout::from_millis(1_000),
        );
        let outcome = generator
            .generate_standard(&cars_schema(), &cars_samples())
            .expect("fallback hypotheses");
        assert_eq!(outcome.items[0].table_name, "cars");
        assert!(matches!(
            outcome.source,
            HypothesisSource::HeuristicFallback { .. }
        ));

        let interactive = generator
            .generate_interactive(&cars_schema(), &cars_samples())
            .expect("fallback question sets");
        assert_eq!(interactive.items.len(), 1);
        assert!(matches!(
            interactive.source,
            HypothesisSource::HeuristicFallback { .. }
        ));
    }

    #[test]
    fn rejected_credentials_are_not_masked_by_heuristics() {
        let generator = HypothesisGenerator::with_model(
            Arc::new(RejectedKeyModel),
            CallTimeout::from_millis(1_000),
        );

        let standard = generator.generate_standard(&cars_schema(), &cars_samples());
        assert_eq!(
            standard,
            Err(CollaboratorError::Credential("401 invalid api key".to_string()))
        );

        let interactive = generator.generate_interactive(&cars_schema(), &cars_samples());
        assert!(matches!(interactive, Err(CollaboratorError::Credential(_))));
    }
}
