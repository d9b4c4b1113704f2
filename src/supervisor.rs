// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Owns task lifecycles end to end: runs a set of setup steps serially
//! under an aggregate deadline, then launches the long-running tasks
//! concurrently and cancels the whole group as soon as any one of them
//! returns (spec.md §4.6).
//!
//! Generic over `Vec<BoxFuture<Result<()>>>` rather than over a concrete
//! `Ingester<D, R, A>` type: `vega-ingest` builds one `Ingester` per event
//! kind with a *different* `(D, R, A)` triple (Sec vs. Flow), so there is
//! no single monomorphic `Ingester` type to hold in a homogeneous
//! collection. Each binary (`vega-agent`, `vega-ingest`) boxes its own
//! concrete `consume`/`ingest`/source-stream futures and hands them to this
//! supervisor, the Rust equivalent of the original's `errgroup.Group`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{Error, Result};

/// Aggregate deadline for all `setup` calls combined (spec.md §4.6/§5).
pub const SETUP_DEADLINE: Duration = Duration::from_secs(10);

/// A boxed, `'static` setup or long-running task future.
pub type BoxTask = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Builds one ingester per event kind, runs `setup` serially, then runs
/// the long-lived tasks concurrently, cancelling the whole group as soon
/// as any of them returns.
pub struct Supervisor {
    cancel: CancellationToken,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Builds a supervisor with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// The token every task should select against for cooperative
    /// shutdown. A single token cancels all tasks (spec.md §5).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cooperative shutdown of every task under this supervisor.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs `setups` one at a time under a single [`SETUP_DEADLINE`]
    /// aggregate timeout. Any failure — including the deadline itself — is
    /// fatal; there is no partial startup (spec.md §4.6).
    pub async fn setup_all(&self, setups: Vec<BoxTask>) -> Result<()> {
        tokio::time::timeout(SETUP_DEADLINE, async {
            for setup in setups {
                setup.await?;
            }
            Ok::<(), Error>(())
        })
        .await
        .map_err(|_| Error::Config("setup exceeded the 10s aggregate deadline".to_string()))?
    }

    /// Launches every task concurrently and blocks until the first one
    /// returns, at which point the whole group is cancelled and the first
    /// non-cancellation error (if any) across every task is returned.
    /// Context cancellation itself (every task returning `Ok(())` after
    /// `cancel()` was called) is the expected shutdown path and yields
    /// `Ok(())`.
    pub async fn run(&self, tasks: Vec<BoxTask>) -> Result<()> {
        let mut set = JoinSet::new();
        for task in tasks {
            set.spawn(task);
        }

        let mut results = Vec::new();
        if let Some(res) = set.join_next().await {
            info!("a supervised task returned; cancelling the group");
            results.push(res);
        }
        self.cancel();

        while let Some(res) = set.join_next().await {
            results.push(res);
        }

        let mut first_err = None;
        for res in results {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(error = %err, "supervised task failed");
                    first_err.get_or_insert(err);
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    warn!(error = %join_err, "supervised task panicked or was aborted");
                    first_err.get_or_insert(Error::Config(join_err.to_string()));
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn setup_all_runs_serially_and_succeeds() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = Arc::clone(&order);
        let o2 = Arc::clone(&order);
        let supervisor = Supervisor::new();
        let setups: Vec<BoxTask> = vec![
            Box::pin(async move {
                o1.lock().unwrap().push(1);
                Ok(())
            }),
            Box::pin(async move {
                o2.lock().unwrap().push(2);
                Ok(())
            }),
        ];
        supervisor.setup_all(setups).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn setup_all_propagates_first_failure() {
        let supervisor = Supervisor::new();
        let setups: Vec<BoxTask> = vec![Box::pin(async { Err(Error::Config("boom".to_string())) })];
        let err = supervisor.setup_all(setups).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn run_cancels_group_on_first_return_and_surfaces_error() {
        let supervisor = Supervisor::new();
        let cancel = supervisor.cancellation_token();

        let failing: BoxTask = Box::pin(async { Err(Error::Config("ingest died".to_string())) });
        let long_running: BoxTask = Box::pin(async move {
            cancel.cancelled().await;
            Ok(())
        });

        let err = supervisor.run(vec![failing, long_running]).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(supervisor.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn run_returns_ok_when_every_task_ends_via_cancellation() {
        let supervisor = Supervisor::new();
        supervisor.cancel();
        let cancel1 = supervisor.cancellation_token();
        let cancel2 = supervisor.cancellation_token();

        let t1: BoxTask = Box::pin(async move {
            cancel1.cancelled().await;
            Ok(())
        });
        let t2: BoxTask = Box::pin(async move {
            cancel2.cancelled().await;
            Ok(())
        });

        supervisor.run(vec![t1, t2]).await.unwrap();
    }

    #[tokio::test]
    async fn run_counts_only_the_first_error_when_several_tasks_fail() {
        let supervisor = Supervisor::new();
        let t1: BoxTask = Box::pin(async { Err(Error::Config("first".to_string())) });
        let t2: BoxTask = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(Error::Config("second".to_string()))
        });
        let err = supervisor.run(vec![t1, t2]).await.unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg == "first"));
    }
}
