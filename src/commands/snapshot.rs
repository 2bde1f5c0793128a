use anyhow::Result;
use annoteval::model::{SampleSet, SchemaSnapshot};
use serde::Serialize;

use crate::cli::SnapshotArgs;
use crate::commands::{emit_json, load_dataset};

#[derive(Debug, Serialize)]
struct SnapshotOutput {
    schema: SchemaSnapshot,
    samples: SampleSet,
}

pub fn run(args: SnapshotArgs) -> Result<()> {
    let (schema, samples) = load_dataset(&args.dataset)?;
    emit_json(&SnapshotOutput { schema, samples }, args.output_path.as_deref())
}
