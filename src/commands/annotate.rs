use anyhow::Result;
use tracing::info;

use crate::cli::AnnotateArgs;
use crate::commands::{emit_json, hypothesis_generator, load_dataset};

pub fn run(args: AnnotateArgs) -> Result<()> {
    let (schema, samples) = load_dataset(&args.dataset)?;
    let generator = hypothesis_generator(
        args.annotator,
        &args.model,
        args.dataset.call_timeout_ms,
        args.sampling_strategy.clone(),
    )?;

    if args.interactive {
        let question_sets = generator.generate_interactive(&schema, &samples)?;
        let question_count = question_sets
            .items
            .iter()
            .map(|set| set.total_question_count())
            .sum::<usize>();
        info!(
            tables = question_sets.items.len(),
            questions = question_count,
            source = ?question_sets.source,
            "question sets generated"
        );
        emit_json(&question_sets.items, args.output_path.as_deref())
    } else {
        let hypotheses = generator.generate_standard(&schema, &samples)?;
        info!(
            tables = hypotheses.items.len(),
            source = ?hypotheses.source,
            "hypothesis annotations generated"
        );
        emit_json(&hypotheses.items, args.output_path.as_deref())
    }
}
