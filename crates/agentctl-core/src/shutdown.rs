//! Cooperative shutdown and per-step timeout (spec.md §4.8).
//!
//! Grounded in the teacher's signal-handling approach in `skilllite/src/main.rs`
//! (a `ctrlc`-style flag flipped by the first SIGINT, a hard exit on the
//! second) and generalized into a reusable `ShutdownController` value per
//! design note §9 ("encapsulate in a ShutdownController owned by the
//! runner; install handlers at construction, remove on disposal").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Owns the shutdown flag. Cloning shares the same underlying flag — install
/// once at the runner's construction and hand out clones to whatever needs
/// to poll it.
#[derive(Clone, Default)]
pub struct ShutdownController {
    requested: Arc<AtomicBool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a Ctrl-C handler on the current Tokio runtime. First signal
    /// sets the flag and prints a warning; a second aborts the process with
    /// exit 130 (spec.md §4.8). Must be called from within a Tokio runtime.
    pub fn install(&self) {
        let flag = self.requested.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                if flag.swap(true, Ordering::SeqCst) {
                    eprintln!("\nShutdown already requested — forcing exit.");
                    std::process::exit(130);
                }
                eprintln!("\nShutdown requested — finishing the current step, then stopping.");
            }
        });
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

/// Per-step deadline governing only the LLM call (spec.md §4.8). Platforms
/// lacking per-thread alarms use a cooperative cancellation: race the future
/// against `tokio::time::sleep`.
pub struct StepTimer {
    pub deadline: Duration,
}

impl StepTimer {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Race `fut` against the deadline. `Err(())` means the deadline won;
    /// the in-flight future is dropped (cancelled) at that point.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, TimedOut>
    where
        F: std::future::Future<Output = T>,
    {
        if self.deadline.is_zero() {
            return Ok(fut.await);
        }
        tokio::time::timeout(self.deadline, fut).await.map_err(|_| TimedOut)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimedOut;

impl std::fmt::Display for TimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step deadline exceeded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn step_timer_passes_through_fast_future() {
        let timer = StepTimer::new(Duration::from_millis(50));
        let result = timer.run(async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn step_timer_times_out_slow_future() {
        let timer = StepTimer::new(Duration::from_millis(10));
        let result = timer.run(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn zero_deadline_disables_timeout() {
        let timer = StepTimer::new(Duration::ZERO);
        let result = timer.run(async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn shutdown_flag_round_trips() {
        let ctl = ShutdownController::new();
        assert!(!ctl.is_requested());
        ctl.request();
        assert!(ctl.is_requested());
        let clone = ctl.clone();
        assert!(clone.is_requested());
    }
}
