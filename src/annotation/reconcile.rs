use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EvalError, EvalResult};
use crate::model::{
    AnswerMap, ColumnAnnotation, ColumnQuestions, QuestionType, TableAnnotation, TableAnswers,
    TableQuestionSet, UserAnswers, UserQuestion,
};

/// What to do when a table's questions are not all answered.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Reject with `IncompleteAnswers`.
    #[default]
    Strict,
    /// Treat missing answers as empty strings.
    Lenient,
}

pub fn default_business_context(table_name: &str) -> String {
    format!("part of {table_name} entity definition")
}

/// Reconciles with the strict policy.
pub fn reconcile_annotations(
    question_sets: &[TableQuestionSet],
    answers: &UserAnswers,
) -> EvalResult<Vec<TableAnnotation>> {
    reconcile_annotations_with_policy(question_sets, answers, ReconcilePolicy::Strict)
}

pub fn reconcile_annotations_with_policy(
    question_sets: &[TableQuestionSet],
    answers: &UserAnswers,
    policy: ReconcilePolicy,
) -> EvalResult<Vec<TableAnnotation>> {
    let known_tables = question_sets
        .iter()
        .map(|set| set.table_name.as_str())
        .collect::<BTreeSet<&str>>();
    for table in answers.tables.keys() {
        if known_tables.contains(table.as_str()) {
            continue;
        }
        match policy {
            ReconcilePolicy::Strict => return Err(EvalError::UnknownTable(table.clone())),
            ReconcilePolicy::Lenient => {
                warn!(table = %table, "ignoring answers for unknown table")
            }
        }
    }

    let empty = TableAnswers::default();
    let mut annotations = Vec::<TableAnnotation>::with_capacity(question_sets.len());
    for set in question_sets {
        let table_answers = answers.for_table(&set.table_name).unwrap_or(&empty);
        let total = set.total_question_count();
        let answered = answered_question_count(set, table_answers);

        if answered < total {
            match policy {
                ReconcilePolicy::Strict => {
                    return Err(EvalError::IncompleteAnswers {
                        table: set.table_name.clone(),
                        answered,
                        total,
                    });
                }
                ReconcilePolicy::Lenient => warn!(
                    table = %set.table_name,
                    answered,
                    total,
                    "reconciling with unanswered questions"
                ),
            }
        }

        annotations.push(reconcile_table(set, table_answers));
    }

    info!(tables = annotations.len(), policy = ?policy, "annotations reconciled");
    Ok(annotations)
}

/// Non-blank answers for the table-level and column questions of one table.
pub fn answered_question_count(set: &TableQuestionSet, answers: &TableAnswers) -> usize {
    let table_level = count_answered(&set.table_level_questions, Some(&answers.table));
    let columns = set
        .column_questions
        .iter()
        .map(|entry| {
            count_answered(
                &entry.questions,
                answers.columns.get(&entry.column.column_name),
            )
        })
        .sum::<usize>();
    table_level + columns
}

fn count_answered(questions: &[UserQuestion], answers: Option<&AnswerMap>) -> usize {
    let Some(answers) = answers else {
        return 0;
    };
    (0..questions.len())
        .filter(|index| {
            answers
                .get(index)
                .map(|answer| !answer.trim().is_empty())
                .unwrap_or(false)
        })
        .count()
}

fn reconcile_table(set: &TableQuestionSet, answers: &TableAnswers) -> TableAnnotation {
    let table_free_text = answers_of_type(
        &set.table_level_questions,
        Some(&answers.table),
        QuestionType::FreeText,
    );

    TableAnnotation {
        table_name: set.table_name.clone(),
        description: merge_description(&set.table_hypothesis, &table_free_text),
        columns: set
            .column_questions
            .iter()
            .map(|entry| reconcile_column(&set.table_name, entry, answers))
            .collect(),
    }
}

fn reconcile_column(
    table_name: &str,
    entry: &ColumnQuestions,
    answers: &TableAnswers,
) -> ColumnAnnotation {
    let column_answers = answers.columns.get(&entry.column.column_name);
    let free_text = answers_of_type(&entry.questions, column_answers, QuestionType::FreeText);
    let key_role = answers_of_type(&entry.questions, column_answers, QuestionType::MultipleChoice);

    let business_context = if key_role.is_empty() {
        default_business_context(table_name)
    } else {
        format!("key role: {key_role}")
    };

    ColumnAnnotation {
        name: entry.column.column_name.clone(),
        data_type: entry.column.data_type.clone(),
        description: merge_description(&entry.column.hypothesis_text, &free_text),
        business_context,
    }
}

/// Joins the non-blank answers to questions of `question_type`, in question order.
fn answers_of_type(
    questions: &[UserQuestion],
    answers: Option<&AnswerMap>,
    question_type: QuestionType,
) -> String {
    let Some(answers) = answers else {
        return String::new();
    };

    questions
        .iter()
        .enumerate()
        .filter(|(_, question)| question.question_type == question_type)
        .filter_map(|(index, _)| answers.get(&index))
        .map(|answer| answer.trim())
        .filter(|answer| !answer.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

fn merge_description(hypothesis: &str, addition: &str) -> String {
    if addition.trim().is_empty() {
        return hypothesis.to_string();
    }
    format!("{hypothesis} {addition}").trim().to_string()
}
