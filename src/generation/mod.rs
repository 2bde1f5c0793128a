//! Model-backed collaborators: annotation proposals and question-to-query translation.
//!
//! The pipeline only talks to the traits in this module. `chat` provides an
//! OpenAI-compatible implementation of both, `replay` serves recorded queries.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::model::{SampleSet, SchemaContext, SchemaSnapshot, TableAnnotation, TableQuestionSet};

mod chat;
mod replay;

pub use chat::{ChatModel, ChatModelConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL_ID};
pub use replay::{RecordedGeneration, ReplayQueryGenerator};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalMode {
    Standard,
    Interactive,
}

#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    pub mode: ProposalMode,
    pub sampling_strategy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationProposal {
    Tables(Vec<TableAnnotation>),
    Questions(Vec<TableQuestionSet>),
}

pub trait AnnotationModel: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate_annotation_hypothesis(
        &self,
        schema: &SchemaSnapshot,
        samples: &SampleSet,
        request: &AnnotationRequest,
    ) -> Result<AnnotationProposal, CollaboratorError>;
}

pub trait QueryGenerator: Send + Sync {
    fn generator_name(&self) -> &str;

    fn generate_query(
        &self,
        context: &SchemaContext,
        question_text: &str,
    ) -> Result<String, CollaboratorError>;
}

/// Renders a schema context as prompt text; empty descriptions are left out.
pub fn render_schema_context(context: &SchemaContext) -> String {
    let mut lines = Vec::<String>::new();
    for table in &context.tables {
        if table.description.trim().is_empty() {
            lines.push(format!("Table {}", table.table_name));
        } else {
            lines.push(format!("Table {}: {}", table.table_name, table.description.trim()));
        }

        for column in &table.columns {
            let mut line = format!("  - {} ({})", column.name, column.data_type);
            if !column.description.trim().is_empty() {
                line.push_str(": ");
                line.push_str(column.description.trim());
            }
            if !column.business_context.trim().is_empty() {
                line.push_str(&format!(" [{}]", column.business_context.trim()));
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Pulls a SQL statement out of a model reply, preferring fenced code blocks.
pub fn extract_query_text(reply: &str) -> Option<String> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:sqlite|sql)?\s*(.*?)```").ok());

    let candidate = fence
        .as_ref()
        .and_then(|fence| fence.captures(reply))
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str())
        .unwrap_or(reply);

    let trimmed = candidate.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Pulls the outermost JSON object out of a model reply.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&reply[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnAnnotation, Variant};

    #[test]
    fn extract_query_text_prefers_fenced_block() {
        let reply = "Here you go:\n```sql\nSELECT AVG(monthly_payment) FROM loans;\n```\nDone.";
        assert_eq!(
            extract_query_text(reply).as_deref(),
            Some("SELECT AVG(monthly_payment) FROM loans")
        );
    }

    #[test]
    fn extract_query_text_accepts_bare_reply_and_rejects_empty() {
        assert_eq!(
            extract_query_text("  SELECT 1 ; ").as_deref(),
            Some("SELECT 1")
        );
        assert!(extract_query_text("```sql\n```").is_none());
    }

    #[test]
    fn extract_json_object_spans_outer_braces() {
        let reply = "noise {\"tables\": [{\"a\": 1}]} trailing";
        assert_eq!(extract_json_object(reply), Some("{\"tables\": [{\"a\": 1}]}"));
        assert!(extract_json_object("no json").is_none());
    }

    #[test]
    fn render_schema_context_omits_empty_annotations() {
        let context = SchemaContext {
            variant: Variant::Raw,
            tables: vec![TableAnnotation {
                table_name: "cars".to_string(),
                description: String::new(),
                columns: vec![ColumnAnnotation {
                    name: "status".to_string(),
                    data_type: "TEXT".to_string(),
                    description: String::new(),
                    business_context: String::new(),
                }],
            }],
        };
        assert_eq!(render_schema_context(&context), "Table cars\n  - status (TEXT)");
    }
}
