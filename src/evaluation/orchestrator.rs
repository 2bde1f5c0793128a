use std::time::Instant;

use super::*;
use crate::annotation::DEFAULT_SAMPLE_ROWS;

/// How the annotated context is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationMode {
    /// Annotated context falls back to the hypothesis context.
    Standard,
    /// Annotated context uses tables already reconciled from user answers.
    Interactive { annotated_tables: Vec<TableAnnotation> },
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluationSettings {
    pub sample_rows: usize,
    pub call_timeout: CallTimeout,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            call_timeout: CallTimeout::default(),
        }
    }
}

/// Drives one dataset through the six evaluation phases.
pub struct Evaluator {
    connector: Box<dyn DatasetConnector>,
    generator: Arc<dyn QueryGenerator>,
    hypotheses: HypothesisGenerator,
    describer: Box<dyn ResultDescriber>,
    settings: EvaluationSettings,
    cancellation: CancellationToken,
}

impl Evaluator {
    pub fn new(connector: Box<dyn DatasetConnector>, generator: Arc<dyn QueryGenerator>) -> Self {
        Self {
            connector,
            generator,
            hypotheses: HypothesisGenerator::heuristic(),
            describer: Box::new(PlainResultDescriber),
            settings: EvaluationSettings::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_hypothesis_generator(mut self, hypotheses: HypothesisGenerator) -> Self {
        self.hypotheses = hypotheses;
        self
    }

    pub fn with_describer(mut self, describer: Box<dyn ResultDescriber>) -> Self {
        self.describer = describer;
        self
    }

    pub fn with_settings(mut self, settings: EvaluationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Runs the full pipeline for `dataset_id`.
    ///
    /// Cancellation and a lost connection during a variant phase both yield a
    /// partial report whose `status` names the interrupted phase. Failures to
    /// connect, to read the schema, or to authenticate abort with
    /// [`EvalError::Phase`].
    pub fn run_evaluation(
        &self,
        dataset_id: &str,
        mode: AnnotationMode,
        benchmark_questions: Vec<BenchmarkQuestion>,
        progress: &mut dyn ProgressSink,
    ) -> EvalResult<EvaluationReport> {
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(progress);
        let mut state = RunState::new(dataset_id, &mode);
        info!(
            dataset_id,
            questions = benchmark_questions.len(),
            generator = self.generator.generator_name(),
            "evaluation started"
        );

        if self.cancellation.is_cancelled() {
            return Ok(state.finish(cancelled(Phase::Connect), &mut tracker));
        }
        tracker.phase_started(Phase::Connect, format!("connecting to {dataset_id}"));
        let store = self
            .connector
            .connect(dataset_id)
            .map_err(|err| EvalError::phase(Phase::Connect, err))?;
        info!(dataset = store.dataset_id(), "dataset connected");
        let contexts = self.prepare_contexts(store.as_ref(), mode, &mut state)?;
        tracker.phase_finished(
            Phase::Connect,
            format!("{} tables described", contexts.raw.tables.len()),
        );

        if self.cancellation.is_cancelled() {
            return Ok(state.finish(cancelled(Phase::LoadBenchmark), &mut tracker));
        }
        state.questions = self.load_benchmark(store.as_ref(), benchmark_questions, &mut tracker)?;

        for variant in Variant::ALL {
            let phase = Phase::for_variant(variant);
            if self.cancellation.is_cancelled() {
                return Ok(state.finish(cancelled(phase), &mut tracker));
            }

            let context = Arc::new(contexts.get(variant).clone());
            let outcome =
                self.evaluate_variant(store.as_ref(), variant, context, &state.questions, &mut tracker)?;
            state.runs.push(VariantRun {
                variant,
                verdicts: outcome.verdicts,
            });

            if let Some(message) = outcome.connection_lost {
                warn!(phase = %phase, error = %message, "connection lost; reporting partial results");
                let status = RunStatus::ConnectionLost {
                    phase: phase.to_string(),
                    message,
                };
                return Ok(state.finish(status, &mut tracker));
            }
        }

        let status = if self.cancellation.is_cancelled() {
            cancelled(Phase::Aggregate)
        } else {
            RunStatus::Completed
        };
        let report = state.finish(status, &mut tracker);
        info!(
            dataset_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "evaluation finished"
        );
        Ok(report)
    }

    fn prepare_contexts(
        &self,
        store: &dyn DataStore,
        mode: AnnotationMode,
        state: &mut RunState,
    ) -> EvalResult<VariantContexts> {
        let connect_failed = |err| EvalError::phase(Phase::Connect, err);
        let schema = store.fetch_schema().map_err(connect_failed)?;
        let row_limit = clamp_row_limit(self.settings.sample_rows);
        let samples = store
            .fetch_samples(&schema.table_names(), row_limit)
            .map_err(connect_failed)?;

        let hypotheses = self
            .hypotheses
            .generate_standard(&schema, &samples)
            .map_err(connect_failed)?;
        let reconciled = match mode {
            AnnotationMode::Standard => None,
            AnnotationMode::Interactive { annotated_tables } => {
                warn_on_table_drift(&schema.table_names(), &annotated_tables);
                Some(annotated_tables)
            }
        };
        let contexts = build_contexts(&schema, hypotheses.items, reconciled);

        state.hypothesis_source = hypotheses.source;
        state.annotated_source = contexts.annotated_source;
        state.fingerprints = Variant::ALL
            .into_iter()
            .filter_map(|variant| match context_fingerprint(contexts.get(variant)) {
                Ok(sha256) => Some(ContextFingerprint { variant, sha256 }),
                Err(err) => {
                    warn!(variant = %variant, error = %err, "failed to fingerprint context");
                    None
                }
            })
            .collect();

        info!(
            tables = schema.tables.len(),
            row_limit,
            hypothesis_source = ?state.hypothesis_source,
            annotated_source = ?state.annotated_source,
            "schema contexts built"
        );
        Ok(contexts)
    }

    fn load_benchmark(
        &self,
        store: &dyn DataStore,
        questions: Vec<BenchmarkQuestion>,
        tracker: &mut ProgressTracker<'_>,
    ) -> EvalResult<Vec<BenchmarkQuestion>> {
        let phase = Phase::LoadBenchmark;
        tracker.phase_started(phase, format!("loading {} questions", questions.len()));
        validate_benchmark(&questions)?;

        let total = questions.len();
        let mut loaded = Vec::<BenchmarkQuestion>::with_capacity(total);
        for (index, mut question) in questions.into_iter().enumerate() {
            if question.expected_result.is_none()
                && let Some(reference_query) = question.reference_query.as_deref()
            {
                match store.execute_query(reference_query) {
                    Ok(result) => question.expected_result = Some(result),
                    Err(err) if err.is_fatal() => return Err(EvalError::phase(phase, err)),
                    Err(err) => warn!(
                        question_id = %question.id,
                        error = %err,
                        "reference query failed; question has no expected result"
                    ),
                }
            }
            loaded.push(question);
            tracker.phase_step(phase, index + 1, total, format!("{}/{} questions loaded", index + 1, total));
        }

        tracker.phase_finished(phase, format!("{total} questions loaded"));
        Ok(loaded)
    }

    fn evaluate_variant(
        &self,
        store: &dyn DataStore,
        variant: Variant,
        context: Arc<SchemaContext>,
        questions: &[BenchmarkQuestion],
        tracker: &mut ProgressTracker<'_>,
    ) -> EvalResult<VariantOutcome> {
        let phase = Phase::for_variant(variant);
        let total = questions.len();
        tracker.phase_started(phase, format!("evaluating {total} questions with the {variant} context"));

        let mut verdicts = Vec::<Verdict>::with_capacity(total);
        let mut connection_lost = None::<String>;
        for (index, question) in questions.iter().enumerate() {
            if let Some(message) = connection_lost.as_deref() {
                verdicts.push(failed_verdict(
                    question,
                    variant,
                    format!("connection lost: {message}"),
                    None,
                ));
                continue;
            }

            let verdict = match self.generate_query(Arc::clone(&context), question) {
                Err(err @ CollaboratorError::Credential(_)) => {
                    return Err(EvalError::phase(phase, err));
                }
                Err(err) => failed_verdict(question, variant, err.mismatch_reason(), None),
                Ok(query) => match store.execute_query(&query) {
                    Err(CollaboratorError::Connection(message)) => {
                        let reason = format!("connection lost: {message}");
                        connection_lost = Some(message);
                        failed_verdict(question, variant, reason, Some(query))
                    }
                    Err(err @ CollaboratorError::Credential(_)) => {
                        return Err(EvalError::phase(phase, err));
                    }
                    executed => self.score(question, variant, query, executed),
                },
            };

            if let Some(reason) = verdict.mismatch_reason.as_deref() {
                info!(
                    question_id = %question.id,
                    variant = %variant,
                    reason,
                    "question scored incorrect"
                );
            }
            verdicts.push(verdict);
            tracker.phase_step(phase, index + 1, total, format!("{}/{} questions scored", index + 1, total));
        }

        let correct = verdicts.iter().filter(|verdict| verdict.is_correct).count();
        tracker.phase_finished(phase, format!("{correct}/{total} correct"));
        Ok(VariantOutcome {
            verdicts,
            connection_lost,
        })
    }

    fn generate_query(
        &self,
        context: Arc<SchemaContext>,
        question: &BenchmarkQuestion,
    ) -> Result<String, CollaboratorError> {
        let generator = Arc::clone(&self.generator);
        let question_text = question.natural_language_text.clone();
        let query = self
            .settings
            .call_timeout
            .run("query generation", move || {
                generator.generate_query(&context, &question_text)
            })?;

        if query.trim().is_empty() {
            return Err(CollaboratorError::Generation(
                "generator returned an empty query".to_string(),
            ));
        }
        Ok(query)
    }

    fn score(
        &self,
        question: &BenchmarkQuestion,
        variant: Variant,
        query: String,
        executed: Result<ResultSet, CollaboratorError>,
    ) -> Verdict {
        let outcome = QueryExecutionOutcome {
            generated_query_text: query,
            result: match executed {
                Ok(result_set) => ExecutionResult::Rows { result_set },
                Err(err) => ExecutionResult::Error {
                    message: err.to_string(),
                },
            },
        };
        let score = score_outcome(
            &outcome,
            Expectation::for_question(question),
            self.describer.as_ref(),
        );

        Verdict {
            question_id: question.id.clone(),
            variant,
            is_correct: score.is_correct,
            mismatch_reason: score.mismatch_reason,
            generated_query: Some(outcome.generated_query_text),
        }
    }
}

struct VariantOutcome {
    verdicts: Vec<Verdict>,
    connection_lost: Option<String>,
}

/// Everything gathered so far; enough to build a report at any phase boundary.
struct RunState {
    dataset_id: String,
    hypothesis_source: HypothesisSource,
    annotated_source: AnnotatedSource,
    fingerprints: Vec<ContextFingerprint>,
    questions: Vec<BenchmarkQuestion>,
    runs: Vec<VariantRun>,
}

impl RunState {
    fn new(dataset_id: &str, mode: &AnnotationMode) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            hypothesis_source: HypothesisSource::Heuristic,
            annotated_source: match mode {
                AnnotationMode::Standard => AnnotatedSource::HypothesisFallback,
                AnnotationMode::Interactive { .. } => AnnotatedSource::Reconciled,
            },
            fingerprints: Vec::new(),
            questions: Vec::new(),
            runs: Vec::new(),
        }
    }

    fn finish(self, status: RunStatus, tracker: &mut ProgressTracker<'_>) -> EvaluationReport {
        tracker.phase_started(Phase::Aggregate, "aggregating verdicts");
        if let RunStatus::Cancelled { phase } = &status {
            warn!(phase = %phase, "evaluation cancelled; reporting completed phases");
        }

        let header = ReportHeader {
            dataset_id: self.dataset_id,
            status,
            hypothesis_source: self.hypothesis_source,
            annotated_source: self.annotated_source,
            context_fingerprints: self.fingerprints,
        };
        let report = aggregate_report(header, &self.questions, &self.runs);
        for accuracy in &report.per_variant {
            info!(
                variant = %accuracy.variant,
                correct = accuracy.correct_count,
                total = accuracy.total_questions,
                accuracy_percent = accuracy.accuracy_percent,
                "variant accuracy"
            );
        }
        tracker.phase_finished(Phase::Aggregate, "report ready");
        report
    }
}

fn cancelled(phase: Phase) -> RunStatus {
    RunStatus::Cancelled {
        phase: phase.to_string(),
    }
}

fn failed_verdict(
    question: &BenchmarkQuestion,
    variant: Variant,
    reason: String,
    generated_query: Option<String>,
) -> Verdict {
    Verdict {
        question_id: question.id.clone(),
        variant,
        is_correct: false,
        mismatch_reason: Some(reason),
        generated_query,
    }
}

/// Ids must be non-empty and unique; question text must be non-empty.
pub fn validate_benchmark(questions: &[BenchmarkQuestion]) -> EvalResult<()> {
    let mut seen = HashSet::<&str>::new();
    for (index, question) in questions.iter().enumerate() {
        let id = question.id.trim();
        if id.is_empty() {
            return Err(EvalError::InvalidBenchmark(format!(
                "question at position {index} has an empty id"
            )));
        }
        if !seen.insert(id) {
            return Err(EvalError::InvalidBenchmark(format!(
                "duplicate question id `{id}`"
            )));
        }
        if question.natural_language_text.trim().is_empty() {
            return Err(EvalError::InvalidBenchmark(format!(
                "question `{id}` has empty text"
            )));
        }
    }
    Ok(())
}

fn warn_on_table_drift(schema_tables: &[String], annotated: &[TableAnnotation]) {
    let annotated_names = annotated
        .iter()
        .map(|table| table.table_name.as_str())
        .collect::<HashSet<&str>>();
    let missing = schema_tables
        .iter()
        .filter(|name| !annotated_names.contains(name.as_str()))
        .map(String::as_str)
        .collect::<Vec<&str>>();
    if !missing.is_empty() {
        warn!(
            tables = %missing.join(", "),
            "reconciled annotations do not cover every schema table"
        );
    }
}
