//! Deferred release of staged media.
//!
//! Every staging side effect (extracted frames, uploaded objects, a remote
//! video index) registers one [`CleanupObligation`]. A conversation owns
//! them in a [`CleanupChain`] and drains the chain exactly once in `end()`.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::domain::foundation::CleanupError;

/// Boxed future returned by a cleanup action.
pub type CleanupFuture = BoxFuture<'static, Result<(), CleanupError>>;

/// A no-argument asynchronous action that undoes exactly one staging step.
///
/// Consumed by [`CleanupObligation::run`], so it can only ever run once.
pub struct CleanupObligation {
    label: String,
    action: Box<dyn FnOnce() -> CleanupFuture + Send>,
}

impl CleanupObligation {
    /// Creates an obligation from an async closure.
    pub fn new<F, Fut>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), CleanupError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(move || action().boxed()),
        }
    }

    /// Combines obligations into one that runs them all in order.
    ///
    /// Every member runs even if an earlier one fails; the first failure is
    /// reported.
    pub fn composite(label: impl Into<String>, obligations: Vec<CleanupObligation>) -> Self {
        let label = label.into();
        let outer = label.clone();
        Self::new(label, move || async move {
            let mut chain = CleanupChain::from(obligations);
            let report = chain.run_all().await;
            match report.failures.into_iter().next() {
                Some(first) => Err(CleanupError::new(outer, first)),
                None => Ok(()),
            }
        })
    }

    /// Name used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the action.
    pub async fn run(self) -> Result<(), CleanupError> {
        (self.action)().await
    }
}

impl fmt::Debug for CleanupObligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupObligation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Outcome of draining a [`CleanupChain`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Labels of obligations that completed, in run order.
    pub completed: Vec<String>,
    /// Failures, in run order.
    pub failures: Vec<CleanupError>,
}

impl CleanupReport {
    /// Returns true if no obligation failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of obligations that ran.
    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failures.len()
    }
}

/// Ordered list of pending cleanup obligations.
#[derive(Debug, Default)]
pub struct CleanupChain {
    pending: Vec<CleanupObligation>,
}

impl CleanupChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an obligation after all previously registered ones.
    pub fn push(&mut self, obligation: CleanupObligation) {
        self.pending.push(obligation);
    }

    /// Registers an optional obligation.
    pub fn push_opt(&mut self, obligation: Option<CleanupObligation>) {
        if let Some(obligation) = obligation {
            self.push(obligation);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Labels of the pending obligations, in registration order.
    pub fn labels(&self) -> Vec<&str> {
        self.pending.iter().map(|o| o.label()).collect()
    }

    /// Runs every pending obligation in registration order and empties the chain.
    ///
    /// Failures are logged and collected; they never stop later obligations.
    pub async fn run_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for obligation in std::mem::take(&mut self.pending) {
            let label = obligation.label().to_string();
            match obligation.run().await {
                Ok(()) => {
                    tracing::debug!(cleanup = %label, "Cleanup completed");
                    report.completed.push(label);
                }
                Err(e) => {
                    tracing::warn!(cleanup = %label, error = %e, "Cleanup failed");
                    report.failures.push(e);
                }
            }
        }
        report
    }

    /// Collapses the chain into a single composite obligation.
    ///
    /// Returns `None` when nothing is pending.
    pub fn into_obligation(self, label: impl Into<String>) -> Option<CleanupObligation> {
        if self.pending.is_empty() {
            None
        } else {
            Some(CleanupObligation::composite(label, self.pending))
        }
    }
}

impl From<Vec<CleanupObligation>> for CleanupChain {
    fn from(pending: Vec<CleanupObligation>) -> Self {
        Self { pending }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(label: &str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> CleanupObligation {
        let log = Arc::clone(log);
        let name = label.to_string();
        CleanupObligation::new(label, move || async move {
            log.lock().unwrap().push(name.clone());
            if fail {
                Err(CleanupError::new(name, "boom"))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn run_all_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CleanupChain::new();
        chain.push(recording("uploads", &log, false));
        chain.push(recording("frames", &log, false));

        let report = chain.run_all().await;

        assert!(report.is_clean());
        assert_eq!(*log.lock().unwrap(), vec!["uploads", "frames"]);
        assert_eq!(report.completed, vec!["uploads", "frames"]);
    }

    #[tokio::test]
    async fn failure_does_not_block_later_obligations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CleanupChain::new();
        chain.push(recording("a", &log, false));
        chain.push(recording("b", &log, true));
        chain.push(recording("c", &log, false));

        let report = chain.run_all().await;

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label, "b");
    }

    #[tokio::test]
    async fn run_all_drains_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = CleanupChain::new();
        chain.push(recording("once", &log, false));

        chain.run_all().await;
        let second = chain.run_all().await;

        assert!(chain.is_empty());
        assert_eq!(second.attempted(), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn composite_runs_all_members_and_reports_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composite = CleanupObligation::composite(
            "video",
            vec![
                recording("uploads", &log, true),
                recording("frames", &log, false),
            ],
        );

        let result = composite.run().await;

        assert_eq!(*log.lock().unwrap(), vec!["uploads", "frames"]);
        let err = result.unwrap_err();
        assert_eq!(err.label, "video");
        assert!(err.message.contains("uploads"));
    }

    #[test]
    fn into_obligation_is_none_for_empty_chain() {
        assert!(CleanupChain::new().into_obligation("nothing").is_none());
    }

    #[test]
    fn push_opt_skips_none() {
        let mut chain = CleanupChain::new();
        chain.push_opt(None);
        assert!(chain.is_empty());
    }
}
