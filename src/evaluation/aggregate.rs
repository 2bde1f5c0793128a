use super::*;

/// Verdicts from one variant phase, in benchmark order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRun {
    pub variant: Variant,
    pub verdicts: Vec<Verdict>,
}

/// Run-level facts carried into the report unchanged.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub dataset_id: String,
    pub status: RunStatus,
    pub hypothesis_source: HypothesisSource,
    pub annotated_source: AnnotatedSource,
    pub context_fingerprints: Vec<ContextFingerprint>,
}

pub fn aggregate_report(
    header: ReportHeader,
    questions: &[BenchmarkQuestion],
    runs: &[VariantRun],
) -> EvaluationReport {
    let per_variant = runs
        .iter()
        .map(|run| variant_accuracy(run.variant, &run.verdicts))
        .collect::<Vec<VariantAccuracy>>();

    EvaluationReport {
        dataset_id: header.dataset_id,
        status: header.status,
        hypothesis_source: header.hypothesis_source,
        annotated_source: header.annotated_source,
        context_fingerprints: header.context_fingerprints,
        improvement_deltas: improvement_deltas(&per_variant),
        per_question: question_outcomes(questions, runs),
        per_difficulty: difficulty_breakdown(questions, runs),
        significance: PairedSignificance {
            hypothesis_vs_raw_p_value: paired_p_value(runs, Variant::Hypothesis),
            annotated_vs_raw_p_value: paired_p_value(runs, Variant::Annotated),
        },
        per_variant,
    }
}

pub fn variant_accuracy(variant: Variant, verdicts: &[Verdict]) -> VariantAccuracy {
    let correct_count = verdicts.iter().filter(|verdict| verdict.is_correct).count();
    VariantAccuracy {
        variant,
        total_questions: verdicts.len(),
        correct_count,
        accuracy_percent: accuracy_percent(correct_count, verdicts.len()),
    }
}

/// First correct variant in raw, hypothesis, annotated order.
pub fn best_variant(verdicts: &[Verdict]) -> Option<Variant> {
    Variant::ALL.into_iter().find(|variant| {
        verdicts
            .iter()
            .any(|verdict| verdict.variant == *variant && verdict.is_correct)
    })
}

/// Signed percentage-point differences; negative values mean annotation hurt.
pub fn improvement_deltas(per_variant: &[VariantAccuracy]) -> ImprovementDeltas {
    let accuracy = |variant: Variant| {
        per_variant
            .iter()
            .find(|entry| entry.variant == variant)
            .map(|entry| entry.accuracy_percent)
    };
    let raw = accuracy(Variant::Raw);
    let delta = |variant: Variant| match (accuracy(variant), raw) {
        (Some(value), Some(raw)) => Some(value - raw),
        _ => None,
    };

    ImprovementDeltas {
        hypothesis_over_raw: delta(Variant::Hypothesis),
        annotated_over_raw: delta(Variant::Annotated),
    }
}

fn question_outcomes(questions: &[BenchmarkQuestion], runs: &[VariantRun]) -> Vec<QuestionOutcome> {
    questions
        .iter()
        .map(|question| {
            let verdicts = runs
                .iter()
                .filter_map(|run| verdict_for(run, &question.id))
                .cloned()
                .collect::<Vec<Verdict>>();
            QuestionOutcome {
                question_id: question.id.clone(),
                best_variant: best_variant(&verdicts),
                verdicts,
            }
        })
        .collect()
}

fn difficulty_breakdown(
    questions: &[BenchmarkQuestion],
    runs: &[VariantRun],
) -> Vec<DifficultyAccuracy> {
    let mut levels = BTreeMap::<&str, HashSet<&str>>::new();
    for question in questions {
        levels
            .entry(question.difficulty_level.as_str())
            .or_default()
            .insert(question.id.as_str());
    }

    levels
        .into_iter()
        .map(|(level, ids)| DifficultyAccuracy {
            difficulty_level: level.to_string(),
            per_variant: runs
                .iter()
                .map(|run| {
                    let verdicts = run
                        .verdicts
                        .iter()
                        .filter(|verdict| ids.contains(verdict.question_id.as_str()))
                        .cloned()
                        .collect::<Vec<Verdict>>();
                    variant_accuracy(run.variant, &verdicts)
                })
                .collect(),
        })
        .collect()
}

/// Two-sided sign test over per-question correctness against the raw variant.
fn paired_p_value(runs: &[VariantRun], variant: Variant) -> Option<f64> {
    let raw = runs.iter().find(|run| run.variant == Variant::Raw)?;
    let other = runs.iter().find(|run| run.variant == variant)?;

    let (wins, losses) = other
        .verdicts
        .iter()
        .filter_map(|verdict| {
            let baseline = verdict_for(raw, &verdict.question_id)?;
            Some((verdict.is_correct, baseline.is_correct))
        })
        .fold((0usize, 0usize), |(wins, losses), pair| match pair {
            (true, false) => (wins + 1, losses),
            (false, true) => (wins, losses + 1),
            _ => (wins, losses),
        });
    sign_test_two_sided_p_value(wins, losses)
}

fn verdict_for<'a>(run: &'a VariantRun, question_id: &str) -> Option<&'a Verdict> {
    run.verdicts
        .iter()
        .find(|verdict| verdict.question_id == question_id)
}

/// Ties are dropped before the call; `None` when no question changed outcome.
pub fn sign_test_two_sided_p_value(wins: usize, losses: usize) -> Option<f64> {
    let flips = wins + losses;
    if flips == 0 {
        return None;
    }

    let tail = (0..=wins.min(losses))
        .map(|successes| fair_coin_mass(flips, successes))
        .sum::<f64>();
    Some((2.0 * tail).min(1.0))
}

/// Probability of exactly `successes` heads in `flips` fair coin flips.
fn fair_coin_mass(flips: usize, successes: usize) -> f64 {
    let successes = successes.min(flips.saturating_sub(successes));
    let coefficient = (0..successes)
        .fold(1.0_f64, |acc, i| acc * (flips - i) as f64 / (i + 1) as f64);
    coefficient * 0.5_f64.powi(flips as i32)
}

#[cfg(test)]
mod aggregate_tests {
    use super::*;

    fn verdict(question_id: &str, variant: Variant, is_correct: bool) -> Verdict {
        Verdict {
            question_id: question_id.to_string(),
            variant,
            is_correct,
            mismatch_reason: (!is_correct).then(|| "row count mismatch".to_string()),
            generated_query: None,
        }
    }

    fn question(id: &str, difficulty: &str) -> BenchmarkQuestion {
        BenchmarkQuestion {
            id: id.to_string(),
            natural_language_text: format!("question {id}"),
            expected_result: None,
            expected_description: None,
            reference_query: None,
            difficulty_level: difficulty.to_string(),
        }
    }

    fn header() -> ReportHeader {
        ReportHeader {
            dataset_id: "car_1".to_string(),
            status: RunStatus::Completed,
            hypothesis_source: HypothesisSource::Heuristic,
            annotated_source: AnnotatedSource::Reconciled,
            context_fingerprints: Vec::new(),
        }
    }

    #[test]
    fn best_variant_prefers_cheapest_correct_variant() {
        let all_correct = Variant::ALL
            .into_iter()
            .map(|variant| verdict("q1", variant, true))
            .collect::<Vec<Verdict>>();
        assert_eq!(best_variant(&all_correct), Some(Variant::Raw));

        let later = vec![
            verdict("q1", Variant::Raw, false),
            verdict("q1", Variant::Hypothesis, true),
            verdict("q1", Variant::Annotated, true),
        ];
        assert_eq!(best_variant(&later), Some(Variant::Hypothesis));

        let none = vec![
            verdict("q1", Variant::Raw, false),
            verdict("q1", Variant::Annotated, false),
        ];
        assert_eq!(best_variant(&none), None);
    }

    #[test]
    fn deltas_are_signed() {
        let per_variant = vec![
            variant_accuracy(
                Variant::Raw,
                &[verdict("q1", Variant::Raw, true), verdict("q2", Variant::Raw, true)],
            ),
            variant_accuracy(
                Variant::Hypothesis,
                &[
                    verdict("q1", Variant::Hypothesis, true),
                    verdict("q2", Variant::Hypothesis, false),
                ],
            ),
        ];
        let deltas = improvement_deltas(&per_variant);
        assert_eq!(deltas.hypothesis_over_raw, Some(-50.0));
        assert_eq!(deltas.annotated_over_raw, None);
    }

    #[test]
    fn empty_verdicts_yield_zero_accuracy() {
        let accuracy = variant_accuracy(Variant::Annotated, &[]);
        assert_eq!(accuracy.total_questions, 0);
        assert_eq!(accuracy.correct_count, 0);
        assert_eq!(accuracy.accuracy_percent, 0.0);
    }

    #[test]
    fn report_breaks_accuracy_down_by_difficulty() {
        let questions = vec![question("q1", "easy"), question("q2", "hard"), question("q3", "hard")];
        let runs = vec![
            VariantRun {
                variant: Variant::Raw,
                verdicts: vec![
                    verdict("q1", Variant::Raw, true),
                    verdict("q2", Variant::Raw, false),
                    verdict("q3", Variant::Raw, false),
                ],
            },
            VariantRun {
                variant: Variant::Annotated,
                verdicts: vec![
                    verdict("q1", Variant::Annotated, true),
                    verdict("q2", Variant::Annotated, true),
                    verdict("q3", Variant::Annotated, false),
                ],
            },
        ];

        let report = aggregate_report(header(), &questions, &runs);
        assert_eq!(report.per_difficulty.len(), 2);
        let hard = &report.per_difficulty[1];
        assert_eq!(hard.difficulty_level, "hard");
        assert_eq!(hard.per_variant[0].correct_count, 0);
        assert_eq!(hard.per_variant[1].correct_count, 1);
        assert_eq!(hard.per_variant[1].accuracy_percent, 50.0);

        assert_eq!(report.per_question[1].best_variant, Some(Variant::Annotated));
        assert_eq!(report.per_question[2].best_variant, None);
        assert_eq!(report.per_question[0].verdicts.len(), 2);
    }

    #[test]
    fn sign_test_handles_ties_and_one_sided_wins() {
        assert_eq!(sign_test_two_sided_p_value(0, 0), None);
        assert_eq!(sign_test_two_sided_p_value(1, 0), Some(1.0));

        let p = sign_test_two_sided_p_value(5, 0).expect("p value");
        assert!((p - 0.0625).abs() < 1e-12);

        let balanced = sign_test_two_sided_p_value(2, 2).expect("p value");
        assert_eq!(balanced, 1.0);
    }

    #[test]
    fn significance_requires_a_raw_baseline() {
        let runs = vec![VariantRun {
            variant: Variant::Hypothesis,
            verdicts: vec![verdict("q1", Variant::Hypothesis, true)],
        }];
        let report = aggregate_report(header(), &[question("q1", "easy")], &runs);
        assert_eq!(report.significance.hypothesis_vs_raw_p_value, None);
        assert_eq!(report.improvement_deltas.hypothesis_over_raw, None);
    }
}
