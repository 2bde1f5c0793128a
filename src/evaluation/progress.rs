use std::sync::atomic::{AtomicBool, Ordering};

use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub status: String,
    pub percent: u8,
}

/// Receives advisory progress for display; carries no correctness obligation.
pub trait ProgressSink {
    fn report(&mut self, update: &ProgressUpdate);
}

/// Logs each update through `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&mut self, update: &ProgressUpdate) {
        info!(
            phase = %update.phase,
            percent = update.percent,
            status = %update.status,
            "evaluation progress"
        );
    }
}

/// Collects updates in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub updates: Vec<ProgressUpdate>,
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, update: &ProgressUpdate) {
        self.updates.push(update.clone());
    }
}

/// Keeps reported percentages monotonic across phases.
pub struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    last_percent: u8,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            last_percent: 0,
        }
    }

    pub fn phase_started(&mut self, phase: Phase, status: impl Into<String>) {
        let (start, _) = phase.percent_span();
        self.emit(phase, status.into(), start);
    }

    pub fn phase_step(&mut self, phase: Phase, done: usize, total: usize, status: impl Into<String>) {
        let (start, end) = phase.percent_span();
        let span = f64::from(end - start);
        let fraction = if total == 0 {
            1.0
        } else {
            done.min(total) as f64 / total as f64
        };
        let percent = start + (span * fraction).floor() as u8;
        self.emit(phase, status.into(), percent);
    }

    pub fn phase_finished(&mut self, phase: Phase, status: impl Into<String>) {
        let (_, end) = phase.percent_span();
        self.emit(phase, status.into(), end);
    }

    fn emit(&mut self, phase: Phase, status: String, percent: u8) {
        let percent = percent.clamp(self.last_percent, 100);
        self.last_percent = percent;
        self.sink.report(&ProgressUpdate {
            phase,
            status,
            percent,
        });
    }
}

/// Cooperative cancellation flag, checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
