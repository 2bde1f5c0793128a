use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use rusqlite::InterruptHandle;

use crate::error::CollaboratorError;

/// Per-call wall-clock budget applied to every external collaborator call.
#[derive(Clone, Copy, Debug)]
pub struct CallTimeout {
    timeout_ms: u64,
}

impl CallTimeout {
    /// A zero budget disables the timeout.
    pub fn from_millis(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    pub fn disabled() -> Self {
        Self { timeout_ms: 0 }
    }

    pub fn timeout_ms(self) -> u64 {
        self.timeout_ms
    }

    pub fn duration(self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }

    pub fn timed_out(self, operation: &str) -> CollaboratorError {
        CollaboratorError::Timeout {
            operation: operation.to_string(),
            timeout_ms: self.timeout_ms,
        }
    }

    /// Runs `call` on a helper thread and abandons it once the budget is spent.
    ///
    /// The helper thread is detached on timeout; its eventual result is dropped.
    pub fn run<T, F>(self, operation: &str, call: F) -> Result<T, CollaboratorError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
    {
        let Some(budget) = self.duration() else {
            return call();
        };

        let (sender, receiver) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("call-{operation}"))
            .spawn(move || {
                let _ = sender.send(call());
            });
        if let Err(err) = spawned {
            return Err(CollaboratorError::Generation(format!(
                "failed to spawn {operation} worker: {err}"
            )));
        }

        match receiver.recv_timeout(budget) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out(operation)),
            Err(RecvTimeoutError::Disconnected) => Err(CollaboratorError::Generation(format!(
                "{operation} worker exited without a result"
            ))),
        }
    }

    /// Arms a watchdog that interrupts the SQLite connection once the budget is spent.
    pub fn arm_interrupt(self, handle: InterruptHandle) -> InterruptGuard {
        let Some(budget) = self.duration() else {
            return InterruptGuard {
                cancel: None,
                started: Instant::now(),
            };
        };

        let (cancel, receiver) = mpsc::channel::<()>();
        thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = receiver.recv_timeout(budget) {
                handle.interrupt();
            }
        });

        InterruptGuard {
            cancel: Some(cancel),
            started: Instant::now(),
        }
    }
}

impl Default for CallTimeout {
    fn default() -> Self {
        Self::from_millis(30_000)
    }
}

/// Disarms the interrupt watchdog when dropped.
pub struct InterruptGuard {
    cancel: Option<mpsc::Sender<()>>,
    started: Instant,
}

impl InterruptGuard {
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_result_within_budget() {
        let timeout = CallTimeout::from_millis(2_000);
        let value = timeout
            .run("quick", || Ok(7_u32))
            .expect("quick call should finish");
        assert_eq!(value, 7);
    }

    #[test]
    fn run_reports_timeout_for_stuck_call() {
        let timeout = CallTimeout::from_millis(20);
        let error = timeout
            .run("stuck", || {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .expect_err("stuck call should time out");
        assert_eq!(
            error,
            CollaboratorError::Timeout {
                operation: "stuck".to_string(),
                timeout_ms: 20
            }
        );
    }

    #[test]
    fn disabled_timeout_runs_inline() {
        let timeout = CallTimeout::disabled();
        assert!(timeout.duration().is_none());
        let error = timeout
            .run::<(), _>("inline", || Err(CollaboratorError::Generation("boom".into())))
            .expect_err("error should propagate");
        assert_eq!(error.to_string(), "generation failed: boom");
    }
}
