use std::path::Path;

use anyhow::{Context, Result};
use annoteval::annotation::{ReconcilePolicy, reconcile_annotations_with_policy};
use annoteval::model::{TableAnnotation, TableQuestionSet, UserAnswers};
use annoteval::util::read_json;

use crate::cli::ReconcileArgs;
use crate::commands::emit_json;

pub fn run(args: ReconcileArgs) -> Result<()> {
    let annotations = reconcile_from_files(
        &args.question_sets_path,
        &args.answers_path,
        args.allow_incomplete,
    )?;
    emit_json(&annotations, args.output_path.as_deref())
}

pub(crate) fn reconcile_from_files(
    question_sets_path: &Path,
    answers_path: &Path,
    allow_incomplete: bool,
) -> Result<Vec<TableAnnotation>> {
    let question_sets: Vec<TableQuestionSet> = read_json(question_sets_path)?;
    let answers: UserAnswers = read_json(answers_path)?;
    let policy = if allow_incomplete {
        ReconcilePolicy::Lenient
    } else {
        ReconcilePolicy::Strict
    };

    reconcile_annotations_with_policy(&question_sets, &answers, policy).with_context(|| {
        format!(
            "failed to reconcile {} with {}",
            question_sets_path.display(),
            answers_path.display()
        )
    })
}
