//! Backoff retry with independent, nested retry scopes.
//!
//! A [`RetryExecutor`] stacks scopes from outermost to innermost. Each scope
//! has its own backoff schedule and retryability predicate. A failure is
//! caught by the innermost scope that matches it and still has budget left;
//! retrying at a scope re-enters every scope inside it with a fresh budget,
//! exactly like nesting one retry loop inside another.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Predicate deciding whether a scope retries an error.
pub type RetryPredicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

struct RetryScope<E> {
    label: String,
    schedule: Vec<u64>,
    retryable: RetryPredicate<E>,
}

/// Executes an async action under stacked retry scopes.
pub struct RetryExecutor<E> {
    scopes: Vec<RetryScope<E>>,
}

impl<E> Default for RetryExecutor<E> {
    fn default() -> Self {
        Self { scopes: Vec::new() }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for scope in &self.scopes {
            list.entry(&(&scope.label, &scope.schedule));
        }
        list.finish()
    }
}

impl<E: fmt::Display> RetryExecutor<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scope nested inside all previously added scopes.
    ///
    /// `schedule` holds the delay in milliseconds before each retry; its
    /// length is the number of retries this scope allows.
    pub fn with_scope<P>(mut self, label: impl Into<String>, schedule: Vec<u64>, retryable: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.scopes.push(RetryScope {
            label: label.into(),
            schedule,
            retryable: Box::new(retryable),
        });
        self
    }

    /// Number of scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Runs `action` until it succeeds or no scope retries its error.
    ///
    /// The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut action: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut used = vec![0usize; self.scopes.len()];
        let mut attempt = 1usize;
        loop {
            let error = match action().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let catching = self
                .scopes
                .iter()
                .enumerate()
                .rev()
                .find_map(|(index, scope)| {
                    if !(scope.retryable)(&error) {
                        return None;
                    }
                    scope
                        .schedule
                        .get(used[index])
                        .map(|delay| (index, scope, *delay))
                });

            let Some((index, scope, delay_ms)) = catching else {
                return Err(error);
            };

            used[index] += 1;
            for inner in used.iter_mut().skip(index + 1) {
                *inner = 0;
            }

            tracing::warn!(
                scope = %scope.label,
                attempt = attempt,
                retry = used[index],
                of = scope.schedule.len(),
                delay_ms = delay_ms,
                error = %error,
                "Retrying after failure"
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            attempt += 1;
        }
    }
}

/// Runs `action` under a single retry scope.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    action: F,
    schedule: &[u64],
    retryable: P,
) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    RetryExecutor::new()
        .with_scope("retry", schedule.to_vec(), retryable)
        .run(action)
        .await
}
