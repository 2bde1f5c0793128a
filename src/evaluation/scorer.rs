use super::*;

/// Correctness verdict for one executed query before it is tagged with a question and variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub is_correct: bool,
    pub mismatch_reason: Option<String>,
}

impl Score {
    pub fn correct() -> Self {
        Self {
            is_correct: true,
            mismatch_reason: None,
        }
    }

    pub fn incorrect(reason: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            mismatch_reason: Some(reason.into()),
        }
    }
}

/// What an executed result is compared against.
#[derive(Debug, Clone, Copy)]
pub enum Expectation<'a> {
    /// Positional, order-sensitive comparison against a reference result set.
    Result(&'a ResultSet),
    /// Description-level proxy: equality of the generated result description
    /// with the expected text. Weaker than a result comparison; two different
    /// result sets with the same description score the same.
    Description(&'a str),
    Missing,
}

impl<'a> Expectation<'a> {
    pub fn for_question(question: &'a BenchmarkQuestion) -> Self {
        if let Some(expected) = question.expected_result.as_ref() {
            return Self::Result(expected);
        }
        match question
            .expected_description
            .as_deref()
            .filter(|value| !value.trim().is_empty())
        {
            Some(description) => Self::Description(description),
            None => Self::Missing,
        }
    }
}

/// Renders a result set as the natural-language description used in no-reference mode.
pub trait ResultDescriber: Send + Sync {
    fn describe(&self, result: &ResultSet) -> String;
}

/// Deterministic describer: a lone value is rendered bare, anything else row by row.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainResultDescriber;

impl ResultDescriber for PlainResultDescriber {
    fn describe(&self, result: &ResultSet) -> String {
        if result.is_empty() {
            return "no rows".to_string();
        }

        if let [row] = result.rows.as_slice()
            && row.len() == 1
            && let Some(value) = row.values().next()
        {
            return render_value(value);
        }

        let rows = result
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(column, value)| format!("{column}={}", render_value(value)))
                    .collect::<Vec<String>>()
                    .join(", ")
            })
            .collect::<Vec<String>>();
        let noun = if rows.len() == 1 { "row" } else { "rows" };
        format!("{} {}: {}", rows.len(), noun, rows.join("; "))
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

pub fn score_outcome(
    outcome: &QueryExecutionOutcome,
    expectation: Expectation<'_>,
    describer: &dyn ResultDescriber,
) -> Score {
    let actual = match &outcome.result {
        ExecutionResult::Rows { result_set } => result_set,
        ExecutionResult::Error { message } => return Score::incorrect(message.clone()),
    };

    match expectation {
        Expectation::Result(expected) => compare_result_sets(actual, expected),
        Expectation::Description(expected) => compare_descriptions(actual, expected, describer),
        Expectation::Missing => Score::incorrect("no expected result available"),
    }
}

/// Row count first, then row `i` against row `i`; reordered rows do not match.
pub fn compare_result_sets(actual: &ResultSet, expected: &ResultSet) -> Score {
    if actual.len() != expected.len() {
        return Score::incorrect(format!(
            "row count mismatch: expected {} rows but got {}",
            expected.len(),
            actual.len()
        ));
    }

    for (index, (actual_row, expected_row)) in actual.rows.iter().zip(&expected.rows).enumerate() {
        if actual_row != expected_row {
            return Score::incorrect(format!(
                "row {} mismatch: expected {} but got {}",
                index,
                serialize_row(expected_row),
                serialize_row(actual_row)
            ));
        }
    }

    Score::correct()
}

pub fn compare_descriptions(
    actual: &ResultSet,
    expected_description: &str,
    describer: &dyn ResultDescriber,
) -> Score {
    let described = describer.describe(actual);
    if normalize_whitespace(&described) == normalize_whitespace(expected_description) {
        Score::correct()
    } else {
        Score::incorrect(format!(
            "description mismatch: expected \"{}\" but got \"{}\"",
            expected_description.trim(),
            described.trim()
        ))
    }
}

/// `100 * correct / total`, or 0 for an empty question list.
pub fn accuracy_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * correct.min(total) as f64 / total as f64
    }
}

fn serialize_row(row: &ResultRow) -> String {
    serde_json::to_string(row).unwrap_or_else(|_| format!("{row:?}"))
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod scorer_tests {
    use serde_json::json;

    use super::*;

    fn rows(values: Vec<Value>) -> ResultSet {
        ResultSet::new(
            values
                .into_iter()
                .map(|value| serde_json::from_value::<ResultRow>(value).expect("row object"))
                .collect(),
        )
    }

    fn outcome(result_set: ResultSet) -> QueryExecutionOutcome {
        QueryExecutionOutcome {
            generated_query_text: "SELECT a FROM t".to_string(),
            result: ExecutionResult::Rows { result_set },
        }
    }

    #[test]
    fn reversed_rows_are_scored_incorrect() {
        let expected = rows(vec![json!({"a": 1}), json!({"a": 2})]);
        let actual = rows(vec![json!({"a": 2}), json!({"a": 1})]);

        let score = compare_result_sets(&actual, &expected);
        assert!(!score.is_correct);
        let reason = score.mismatch_reason.expect("reason recorded");
        assert!(reason.starts_with("row 0 mismatch"), "unexpected reason: {reason}");
        assert!(reason.contains("{\"a\":1}"));
        assert!(reason.contains("{\"a\":2}"));
    }

    #[test]
    fn identical_rows_match() {
        let expected = rows(vec![json!({"a": 1, "b": "x"}), json!({"a": 2, "b": "y"})]);
        let score = compare_result_sets(&expected.clone(), &expected);
        assert_eq!(score, Score::correct());
    }

    #[test]
    fn row_count_is_checked_before_rows() {
        let expected = rows(vec![json!({"a": 1})]);
        let actual = rows(vec![json!({"a": 1}), json!({"a": 1})]);
        let score = compare_result_sets(&actual, &expected);
        assert_eq!(
            score.mismatch_reason.as_deref(),
            Some("row count mismatch: expected 1 rows but got 2")
        );
    }

    #[test]
    fn execution_errors_are_incorrect_with_message() {
        let failed = QueryExecutionOutcome {
            generated_query_text: "SELECT nope FROM t".to_string(),
            result: ExecutionResult::Error {
                message: "execution error: no such column: nope".to_string(),
            },
        };
        let expected = rows(vec![json!({"a": 1})]);
        let score = score_outcome(&failed, Expectation::Result(&expected), &PlainResultDescriber);
        assert!(!score.is_correct);
        assert_eq!(
            score.mismatch_reason.as_deref(),
            Some("execution error: no such column: nope")
        );
    }

    #[test]
    fn description_mode_compares_generated_description() {
        let actual = rows(vec![json!({"avg_payment": 472.5})]);
        let score = score_outcome(
            &outcome(actual.clone()),
            Expectation::Description(" 472.5 "),
            &PlainResultDescriber,
        );
        assert!(score.is_correct);

        let miss = score_outcome(
            &outcome(actual),
            Expectation::Description("about 450"),
            &PlainResultDescriber,
        );
        assert!(!miss.is_correct);
        assert!(miss
            .mismatch_reason
            .expect("reason")
            .starts_with("description mismatch"));
    }

    #[test]
    fn plain_describer_renders_multi_row_results() {
        let result = rows(vec![json!({"a": 1, "b": "x"}), json!({"a": 2, "b": null})]);
        assert_eq!(
            PlainResultDescriber.describe(&result),
            "2 rows: a=1, b=x; a=2, b=null"
        );
        assert_eq!(PlainResultDescriber.describe(&ResultSet::default()), "no rows");
    }

    #[test]
    fn missing_expectation_is_incorrect() {
        let score = score_outcome(
            &outcome(rows(vec![json!({"a": 1})])),
            Expectation::Missing,
            &PlainResultDescriber,
        );
        assert_eq!(
            score.mismatch_reason.as_deref(),
            Some("no expected result available")
        );
    }

    #[test]
    fn accuracy_percent_guards_empty_totals() {
        assert_eq!(accuracy_percent(0, 0), 0.0);
        assert_eq!(accuracy_percent(1, 4), 25.0);
        assert_eq!(accuracy_percent(3, 3), 100.0);
    }
}
