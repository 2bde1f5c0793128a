//! OpenAI-compatible chat-completions client.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    AnnotationModel, AnnotationProposal, AnnotationRequest, ProposalMode, QueryGenerator,
    extract_json_object, extract_query_text, render_schema_context,
};
use crate::error::CollaboratorError;
use crate::model::{SampleSet, SchemaContext, SchemaSnapshot, TableAnnotation, TableQuestionSet};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct ChatModelConfig {
    pub endpoint: String,
    pub model_id: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

impl fmt::Debug for ChatModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatModelConfig")
            .field("endpoint", &self.endpoint)
            .field("model_id", &self.model_id)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StandardProposal {
    tables: Vec<TableAnnotation>,
}

#[derive(Debug, Deserialize)]
struct InteractiveProposal {
    tables: Vec<TableQuestionSet>,
}

pub struct ChatModel {
    http: Client,
    config: ChatModelConfig,
}

impl fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatModel")
            .field("config", &self.config)
            .finish()
    }
}

impl ChatModel {
    pub fn new(config: ChatModelConfig) -> Result<Self, CollaboratorError> {
        if config.api_key.trim().is_empty() {
            return Err(CollaboratorError::Credential(
                "model API key is missing".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }
        let http = builder.build().map_err(|err| {
            CollaboratorError::ModelUnavailable(format!("failed to build HTTP client: {err}"))
        })?;

        Ok(Self { http, config })
    }

    /// Sends one system + user exchange and returns the reply text.
    ///
    /// 401/403 map to `Credential`; transport failures, 429 and 5xx map to
    /// `ModelUnavailable`.
    fn complete(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model_id,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    CollaboratorError::Timeout {
                        operation: "chat completion".to_string(),
                        timeout_ms: self.config.request_timeout_ms,
                    }
                } else {
                    CollaboratorError::ModelUnavailable(format!("HTTP request failed: {err}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().unwrap_or_default();
            return Err(CollaboratorError::Credential(format!(
                "model endpoint rejected credentials ({status}): {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CollaboratorError::ModelUnavailable(format!(
                "model endpoint returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().map_err(|err| {
            CollaboratorError::ModelUnavailable(format!("failed to parse model response: {err}"))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!(model = %self.config.model_id, reply_chars = content.len(), "chat completion received");
        Ok(content)
    }
}

impl AnnotationModel for ChatModel {
    fn model_name(&self) -> &str {
        &self.config.model_id
    }

    fn generate_annotation_hypothesis(
        &self,
        schema: &SchemaSnapshot,
        samples: &SampleSet,
        request: &AnnotationRequest,
    ) -> Result<AnnotationProposal, CollaboratorError> {
        let prompt = annotation_prompt(schema, samples, request)?;
        let reply = self
            .complete(ANNOTATION_SYSTEM_PROMPT, &prompt)
            .map_err(|err| match err {
                CollaboratorError::Credential(_) | CollaboratorError::Timeout { .. } => err,
                other => CollaboratorError::ModelUnavailable(other.to_string()),
            })?;

        let Some(json) = extract_json_object(&reply) else {
            return Err(CollaboratorError::ModelUnavailable(
                "model reply contained no JSON object".to_string(),
            ));
        };

        let unparseable = |err: serde_json::Error| {
            CollaboratorError::ModelUnavailable(format!("model reply was not valid: {err}"))
        };
        match request.mode {
            ProposalMode::Standard => {
                let proposal: StandardProposal = serde_json::from_str(json).map_err(unparseable)?;
                Ok(AnnotationProposal::Tables(proposal.tables))
            }
            ProposalMode::Interactive => {
                let proposal: InteractiveProposal =
                    serde_json::from_str(json).map_err(unparseable)?;
                Ok(AnnotationProposal::Questions(proposal.tables))
            }
        }
    }
}

impl QueryGenerator for ChatModel {
    fn generator_name(&self) -> &str {
        &self.config.model_id
    }

    fn generate_query(
        &self,
        context: &SchemaContext,
        question_text: &str,
    ) -> Result<String, CollaboratorError> {
        let prompt = format!(
            "Schema:\n{}\n\nQuestion: {}\n\nAnswer with a single SQLite SELECT statement.",
            render_schema_context(context),
            question_text.trim()
        );
        let reply = self
            .complete(QUERY_SYSTEM_PROMPT, &prompt)
            .map_err(|err| match err {
                CollaboratorError::Credential(_) | CollaboratorError::Timeout { .. } => err,
                other => CollaboratorError::Generation(other.to_string()),
            })?;

        extract_query_text(&reply).ok_or_else(|| {
            CollaboratorError::Generation("model reply contained no query".to_string())
        })
    }
}

const ANNOTATION_SYSTEM_PROMPT: &str = "You document relational schemas. Reply with JSON only.";

const QUERY_SYSTEM_PROMPT: &str =
    "You translate questions into SQLite queries using only the tables and columns provided.";

fn annotation_prompt(
    schema: &SchemaSnapshot,
    samples: &SampleSet,
    request: &AnnotationRequest,
) -> Result<String, CollaboratorError> {
    let schema_json = serde_json::to_string_pretty(schema).map_err(|err| {
        CollaboratorError::ModelUnavailable(format!("failed to serialize schema: {err}"))
    })?;
    let samples_json = serde_json::to_string_pretty(&samples.tables).map_err(|err| {
        CollaboratorError::ModelUnavailable(format!("failed to serialize samples: {err}"))
    })?;

    let shape = match request.mode {
        ProposalMode::Standard => {
            r#"{"tables": [{"table_name": "...", "description": "...", "columns": [{"name": "...", "type": "...", "description": "...", "business_context": ""}]}]}"#
        }
        ProposalMode::Interactive => {
            r#"{"tables": [{"table_name": "...", "table_hypothesis": "...", "table_level_questions": [{"question_text": "...", "question_type": "yes_no|multiple_choice|free_text", "options": ["..."]}], "column_questions": [{"column": {"column_name": "...", "data_type": "...", "sample_values": ["..."], "enum_values_found": ["..."], "hypothesis_text": "..."}, "questions": []}]}]}"#
        }
    };

    let mut prompt = format!(
        "Schema:\n{schema_json}\n\nSample rows (up to {} per table):\n{samples_json}\n\n",
        samples.row_limit
    );
    if let Some(strategy) = request
        .sampling_strategy
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        prompt.push_str(&format!("Sampling strategy: {strategy}\n\n"));
    }
    prompt.push_str(&format!(
        "Describe every table and column. Respond with JSON shaped like:\n{shape}"
    ));
    Ok(prompt)
}
