use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::QueryGenerator;
use crate::error::CollaboratorError;
use crate::model::SchemaContext;
use crate::util::read_json;

/// One recorded generation: either the query text or the failure the generator reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedGeneration {
    Query(String),
    Failure { error: String },
}

/// Serves recorded queries keyed by question text, then by variant name.
#[derive(Debug, Clone, Default)]
pub struct ReplayQueryGenerator {
    recordings: BTreeMap<String, BTreeMap<String, RecordedGeneration>>,
}

impl ReplayQueryGenerator {
    pub fn load(path: &Path) -> Result<Self> {
        let parsed: BTreeMap<String, BTreeMap<String, RecordedGeneration>> = read_json(path)
            .with_context(|| format!("failed to load replay recordings: {}", path.display()))?;

        let recordings = parsed
            .into_iter()
            .map(|(question, by_variant)| (normalize_question(&question), by_variant))
            .collect();
        Ok(Self { recordings })
    }

    pub fn record(
        &mut self,
        question_text: &str,
        variant: &str,
        generation: RecordedGeneration,
    ) -> &mut Self {
        self.recordings
            .entry(normalize_question(question_text))
            .or_default()
            .insert(variant.to_string(), generation);
        self
    }

    pub fn question_count(&self) -> usize {
        self.recordings.len()
    }
}

impl QueryGenerator for ReplayQueryGenerator {
    fn generator_name(&self) -> &str {
        "replay"
    }

    fn generate_query(
        &self,
        context: &SchemaContext,
        question_text: &str,
    ) -> Result<String, CollaboratorError> {
        let recorded = self
            .recordings
            .get(&normalize_question(question_text))
            .and_then(|by_variant| by_variant.get(context.variant.as_str()));

        match recorded {
            Some(RecordedGeneration::Query(query)) => Ok(query.clone()),
            Some(RecordedGeneration::Failure { error }) => {
                Err(CollaboratorError::Generation(error.clone()))
            }
            None => Err(CollaboratorError::Generation(format!(
                "no recorded query for {} context",
                context.variant
            ))),
        }
    }
}

fn normalize_question(question_text: &str) -> String {
    question_text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;

    fn context(variant: Variant) -> SchemaContext {
        SchemaContext {
            variant,
            tables: Vec::new(),
        }
    }

    #[test]
    fn replay_file_deserializes_queries_and_failures() {
        let raw = r#"
        {
          "How many cars are available?": {
            "raw": {"error": "ambiguous join"},
            "annotated": "SELECT COUNT(*) FROM cars WHERE status = 'available'"
          }
        }
        "#;
        let path = std::env::temp_dir()
            .join(format!("annoteval-replay-{}.json", std::process::id()));
        std::fs::write(&path, raw).expect("write recordings");
        let generator = ReplayQueryGenerator::load(&path).expect("replay json should load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(generator.question_count(), 1);

        let error = generator
            .generate_query(&context(Variant::Raw), "How many cars are available?")
            .expect_err("raw should replay a failure");
        assert_eq!(error.to_string(), "generation failed: ambiguous join");

        let query = generator
            .generate_query(&context(Variant::Annotated), "How many  cars are available?")
            .expect("annotated should replay a query");
        assert!(query.contains("status = 'available'"));
    }

    #[test]
    fn unreadable_replay_file_names_the_path() {
        let path = Path::new("/nonexistent/annoteval-replay.json");
        let error = ReplayQueryGenerator::load(path).expect_err("missing file should fail");
        assert!(format!("{error:#}").contains("/nonexistent/annoteval-replay.json"));
    }

    #[test]
    fn missing_recording_is_a_generation_error() {
        let mut generator = ReplayQueryGenerator::default();
        generator.record("q", "raw", RecordedGeneration::Query("SELECT 1".to_string()));

        let error = generator
            .generate_query(&context(Variant::Hypothesis), "q")
            .expect_err("hypothesis has no recording");
        assert!(matches!(error, CollaboratorError::Generation(_)));
        assert_eq!(generator.question_count(), 1);
    }
}
