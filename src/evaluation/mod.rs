//! Benchmark evaluation across the raw, hypothesis and annotated schema contexts.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::annotation::{
    HypothesisGenerator, VariantContexts, build_contexts, clamp_row_limit, context_fingerprint,
};
use crate::datastore::{DataStore, DatasetConnector};
use crate::error::{CollaboratorError, EvalError, EvalResult};
use crate::generation::QueryGenerator;
use crate::model::{
    AnnotatedSource, BenchmarkQuestion, ContextFingerprint, DifficultyAccuracy, EvaluationReport,
    ExecutionResult, HypothesisSource, ImprovementDeltas, PairedSignificance,
    QueryExecutionOutcome, QuestionOutcome, ResultRow, ResultSet, RunStatus, SchemaContext,
    TableAnnotation, Variant, VariantAccuracy, Verdict,
};
use crate::timeout::CallTimeout;

mod aggregate;
mod orchestrator;
mod progress;
mod scorer;

pub use self::aggregate::*;
pub use self::orchestrator::*;
pub use self::progress::*;
pub use self::scorer::*;

/// The six ordered phases of one evaluation run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Connect,
    LoadBenchmark,
    EvaluateRaw,
    EvaluateHypothesis,
    EvaluateAnnotated,
    Aggregate,
}

impl Phase {
    pub const ORDER: [Phase; 6] = [
        Phase::Connect,
        Phase::LoadBenchmark,
        Phase::EvaluateRaw,
        Phase::EvaluateHypothesis,
        Phase::EvaluateAnnotated,
        Phase::Aggregate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::LoadBenchmark => "load-benchmark",
            Self::EvaluateRaw => "evaluate-raw",
            Self::EvaluateHypothesis => "evaluate-hypothesis",
            Self::EvaluateAnnotated => "evaluate-annotated",
            Self::Aggregate => "aggregate",
        }
    }

    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Raw => Self::EvaluateRaw,
            Variant::Hypothesis => Self::EvaluateHypothesis,
            Variant::Annotated => Self::EvaluateAnnotated,
        }
    }

    /// Completion percent range covered by this phase.
    pub fn percent_span(self) -> (u8, u8) {
        match self {
            Self::Connect => (0, 10),
            Self::LoadBenchmark => (10, 20),
            Self::EvaluateRaw => (20, 45),
            Self::EvaluateHypothesis => (45, 70),
            Self::EvaluateAnnotated => (70, 95),
            Self::Aggregate => (95, 100),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
