use std::io::{self, Write};

use anyhow::Result;
use annoteval::model::Variant;
use annoteval::store::JsonRunStore;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::{emit_json, status_label};

pub fn run(args: StatusArgs) -> Result<()> {
    let store = JsonRunStore::new(&args.cache_root);
    info!(cache_root = %args.cache_root.display(), "status requested");

    if let Some(run_id) = args.run_id.as_deref() {
        let record = store.load(run_id)?;
        info!(
            run_id,
            dataset = %record.dataset_id,
            status = %status_label(&record.report.status),
            "run loaded"
        );
        return emit_json(&record, None);
    }

    let records = store.list()?;
    if records.is_empty() {
        warn!(path = %store.runs_dir().display(), "no evaluation runs recorded");
    }

    if args.json {
        return emit_json(&records, None);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for record in &records {
        let accuracy = |variant: Variant| {
            record
                .report
                .accuracy_for(variant)
                .map(|entry| format!("{:.2}%", entry.accuracy_percent))
                .unwrap_or_else(|| "n/a".to_string())
        };
        writeln!(
            output,
            "{} {} dataset={} questions={} raw={} hypothesis={} annotated={} status={}",
            record.run_id,
            record.generated_at,
            record.dataset_id,
            record.total_questions,
            accuracy(Variant::Raw),
            accuracy(Variant::Hypothesis),
            accuracy(Variant::Annotated),
            status_label(&record.report.status)
        )?;
    }
    output.flush()?;
    Ok(())
}
