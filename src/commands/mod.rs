pub mod annotate;
pub mod evaluate;
pub mod reconcile;
pub mod snapshot;
pub mod status;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use annoteval::annotation::{HypothesisGenerator, clamp_row_limit};
use annoteval::datastore::{DataStore, DatasetConnector, SqliteConnector};
use annoteval::generation::{ChatModel, ChatModelConfig};
use annoteval::model::{RunStatus, SampleSet, SchemaSnapshot};
use annoteval::timeout::CallTimeout;
use annoteval::util::write_json_pretty;
use serde::Serialize;
use tracing::info;

use crate::cli::{AnnotatorKind, DatasetArgs, ModelArgs};

pub(crate) fn connector(args: &DatasetArgs) -> SqliteConnector {
    SqliteConnector::new(
        args.data_root.clone(),
        CallTimeout::from_millis(args.call_timeout_ms),
    )
}

/// Connects and reads the schema plus bounded samples.
pub(crate) fn load_dataset(args: &DatasetArgs) -> Result<(SchemaSnapshot, SampleSet)> {
    let store: Box<dyn DataStore> = connector(args)
        .connect(&args.dataset)
        .with_context(|| format!("failed to connect to dataset `{}`", args.dataset))?;
    let schema = store
        .fetch_schema()
        .with_context(|| format!("failed to read schema of `{}`", args.dataset))?;
    let row_limit = clamp_row_limit(args.sample_rows);
    let samples = store
        .fetch_samples(&schema.table_names(), row_limit)
        .with_context(|| format!("failed to sample `{}`", args.dataset))?;

    info!(
        dataset = %args.dataset,
        tables = schema.tables.len(),
        row_limit,
        "dataset loaded"
    );
    Ok((schema, samples))
}

pub(crate) fn chat_model(model: &ModelArgs, call_timeout_ms: u64) -> Result<ChatModel> {
    let api_key = model
        .api_key
        .clone()
        .context("a model API key is required; set OPENAI_API_KEY or pass --api-key")?;
    let chat = ChatModel::new(ChatModelConfig {
        endpoint: model.model_endpoint.clone(),
        model_id: model.model_id.clone(),
        api_key,
        request_timeout_ms: call_timeout_ms,
    })?;
    Ok(chat)
}

pub(crate) fn hypothesis_generator(
    annotator: AnnotatorKind,
    model: &ModelArgs,
    call_timeout_ms: u64,
    sampling_strategy: Option<String>,
) -> Result<HypothesisGenerator> {
    let generator = match annotator {
        AnnotatorKind::Heuristic => HypothesisGenerator::heuristic(),
        AnnotatorKind::Model => HypothesisGenerator::with_model(
            Arc::new(chat_model(model, call_timeout_ms)?),
            CallTimeout::from_millis(call_timeout_ms),
        ),
    };
    Ok(generator.sampling_strategy(sampling_strategy))
}

/// Writes `value` to `output_path`, or pretty-prints it to stdout.
pub(crate) fn emit_json<T: Serialize>(value: &T, output_path: Option<&Path>) -> Result<()> {
    if let Some(path) = output_path {
        write_json_pretty(path, value)?;
        info!(path = %path.display(), "wrote output");
        return Ok(());
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(crate) fn status_label(status: &RunStatus) -> String {
    match status {
        RunStatus::Completed => "completed".to_string(),
        RunStatus::Cancelled { phase } => format!("cancelled during {phase}"),
        RunStatus::ConnectionLost { phase, message } => {
            format!("connection lost during {phase}: {message}")
        }
    }
}
