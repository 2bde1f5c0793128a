use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use annoteval::evaluation::{AnnotationMode, EvaluationSettings, Evaluator, TracingProgress};
use annoteval::generation::{QueryGenerator, ReplayQueryGenerator};
use annoteval::model::{BenchmarkQuestion, RunRecord, TableAnnotation};
use annoteval::store::JsonRunStore;
use annoteval::timeout::CallTimeout;
use annoteval::util::read_json;
use tracing::info;

use crate::cli::{EvaluateArgs, GeneratorKind};
use crate::commands::reconcile::reconcile_from_files;
use crate::commands::{chat_model, connector, emit_json, hypothesis_generator, status_label};

pub fn run(args: EvaluateArgs) -> Result<()> {
    let questions: Vec<BenchmarkQuestion> = read_json(&args.benchmark_path)?;
    let total_questions = questions.len();
    let mode = annotation_mode(&args)?;
    let generator = query_generator(&args)?;
    let hypotheses = hypothesis_generator(
        args.annotator,
        &args.model,
        args.dataset.call_timeout_ms,
        args.sampling_strategy.clone(),
    )?;

    info!(
        dataset = %args.dataset.dataset,
        questions = total_questions,
        interactive = matches!(mode, AnnotationMode::Interactive { .. }),
        generator = generator.generator_name(),
        "evaluation requested"
    );

    let evaluator = Evaluator::new(Box::new(connector(&args.dataset)), generator)
        .with_hypothesis_generator(hypotheses)
        .with_settings(EvaluationSettings {
            sample_rows: args.dataset.sample_rows,
            call_timeout: CallTimeout::from_millis(args.dataset.call_timeout_ms),
        });
    let report = evaluator
        .run_evaluation(
            &args.dataset.dataset,
            mode,
            questions,
            &mut TracingProgress,
        )
        .with_context(|| format!("evaluation of `{}` failed", args.dataset.dataset))?;

    let store = JsonRunStore::new(&args.cache_root);
    let (record, _) = store.save(report, total_questions)?;

    if args.json {
        emit_json(&record, None)
    } else {
        write_text_summary(&record)
    }
}

fn annotation_mode(args: &EvaluateArgs) -> Result<AnnotationMode> {
    if let Some(path) = args.annotations_path.as_deref() {
        let annotated_tables: Vec<TableAnnotation> = read_json(path)?;
        return Ok(AnnotationMode::Interactive { annotated_tables });
    }

    match (
        args.question_sets_path.as_deref(),
        args.answers_path.as_deref(),
    ) {
        (Some(question_sets_path), Some(answers_path)) => {
            let annotated_tables =
                reconcile_from_files(question_sets_path, answers_path, args.allow_incomplete)?;
            Ok(AnnotationMode::Interactive { annotated_tables })
        }
        _ => Ok(AnnotationMode::Standard),
    }
}

fn query_generator(args: &EvaluateArgs) -> Result<Arc<dyn QueryGenerator>> {
    match args.generator {
        GeneratorKind::Replay => {
            let path = args
                .replay_path
                .as_deref()
                .context("--replay-path is required with --generator replay")?;
            let replay = ReplayQueryGenerator::load(path)?;
            info!(
                path = %path.display(),
                questions = replay.question_count(),
                "loaded replay recordings"
            );
            Ok(Arc::new(replay))
        }
        GeneratorKind::Chat => Ok(Arc::new(chat_model(
            &args.model,
            args.dataset.call_timeout_ms,
        )?)),
    }
}

fn write_text_summary(record: &RunRecord) -> Result<()> {
    let report = &record.report;
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Run: {} dataset={} questions={} status={}",
        record.run_id,
        record.dataset_id,
        record.total_questions,
        status_label(&report.status)
    )?;
    for accuracy in &report.per_variant {
        writeln!(
            output,
            "  {:<10} {:>3}/{:<3} {:>6.2}%",
            accuracy.variant.as_str(),
            accuracy.correct_count,
            accuracy.total_questions,
            accuracy.accuracy_percent
        )?;
    }

    let signed = |value: Option<f64>| {
        value
            .map(|delta| format!("{delta:+.2}"))
            .unwrap_or_else(|| "n/a".to_string())
    };
    writeln!(
        output,
        "Deltas: hypothesis_over_raw={} annotated_over_raw={}",
        signed(report.improvement_deltas.hypothesis_over_raw),
        signed(report.improvement_deltas.annotated_over_raw)
    )?;
    writeln!(
        output,
        "Sign test p: hypothesis_vs_raw={} annotated_vs_raw={}",
        report
            .significance
            .hypothesis_vs_raw_p_value
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "n/a".to_string()),
        report
            .significance
            .annotated_vs_raw_p_value
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "n/a".to_string())
    )?;

    for outcome in &report.per_question {
        let best = outcome
            .best_variant
            .map(|variant| variant.as_str())
            .unwrap_or("none");
        writeln!(output, "  {} best={}", outcome.question_id, best)?;
        for verdict in outcome.verdicts.iter().filter(|verdict| !verdict.is_correct) {
            writeln!(
                output,
                "    {}: {}",
                verdict.variant,
                verdict.mismatch_reason.as_deref().unwrap_or("incorrect")
            )?;
        }
    }

    output.flush()?;
    Ok(())
}
