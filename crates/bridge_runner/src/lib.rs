//! Runs a set of long-lived processes until one fails or the service is asked
//! to stop, then runs cleanup closers under a timeout.
//!
//! ```no_run
//! use bridge_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("heartbeat", |ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxedResult = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A long-running process. It must return once its token is cancelled.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResult + Send>;

/// Cleanup run after every process has stopped.
pub type Closer = Box<dyn FnOnce() -> BoxedResult + Send>;

/// Why the runner stopped.
#[derive(Debug)]
pub enum RunOutcome {
    /// Shutdown was requested, or every process finished on its own.
    Stopped,
    /// A process failed or panicked; the rest were cancelled.
    Failed { process: String, error: anyhow::Error },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Stopped => 0,
            RunOutcome::Failed { .. } => 1,
        }
    }
}

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// A runner with no processes, a 10 second closer timeout and OS signal handling.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(move |token| Box::pin(process(token)))));
        self
    }

    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = format!("process_{}", self.processes.len());
        self.with_named_process(name, process)
    }

    /// Closers run concurrently; one failing does not stop the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(move || Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Share cancellation with the caller, e.g. to stop the runner from a test.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Skip installing SIGINT/SIGTERM handlers.
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Run until stopped, then exit the process with 0 on clean shutdown or 1 on failure.
    pub async fn run(self) {
        let outcome = self.run_until_stopped().await;
        match &outcome {
            RunOutcome::Stopped => info!("application exiting normally"),
            RunOutcome::Failed { process, error } => {
                error!(process = %process, "application exiting with error: {:#}", error)
            }
        }
        std::process::exit(outcome.exit_code());
    }

    /// Run every process, wait for the first failure or a shutdown request,
    /// cancel the rest, then run the closers.
    pub async fn run_until_stopped(self) -> RunOutcome {
        let token = self.token;

        if self.handle_signals {
            spawn_signal_handlers(token.clone());
        }

        let mut join_set = JoinSet::new();
        for (name, process) in self.processes {
            let process_token = token.clone();
            info!(process = %name, "starting process");
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        let mut outcome = RunOutcome::Stopped;
        loop {
            let joined = tokio::select! {
                joined = join_set.join_next() => joined,
                _ = token.cancelled() => break,
            };

            match joined {
                None => break,
                Some(Ok((name, Ok(())))) => debug!(process = %name, "process completed"),
                Some(Ok((name, Err(e)))) => {
                    error!(process = %name, "process failed: {:#}", e);
                    outcome = RunOutcome::Failed {
                        process: name,
                        error: e,
                    };
                    token.cancel();
                    break;
                }
                Some(Err(e)) => {
                    error!("process panicked: {}", e);
                    outcome = RunOutcome::Failed {
                        process: "unknown".to_string(),
                        error: anyhow::anyhow!("process panicked: {}", e),
                    };
                    token.cancel();
                    break;
                }
            }
        }

        drain(join_set, self.closer_timeout).await;
        run_closers(self.closers, self.closer_timeout).await;

        outcome
    }
}

/// Give cancelled processes the closer timeout to wind down before aborting them.
async fn drain(mut join_set: JoinSet<(String, anyhow::Result<()>)>, grace: Duration) {
    let wait_all = async {
        while let Some(joined) = join_set.join_next().await {
            if let Ok((name, Err(e))) = joined {
                warn!(process = %name, "process failed during shutdown: {:#}", e);
            }
        }
    };

    if tokio::time::timeout(grace, wait_all).await.is_err() {
        warn!(grace_ms = grace.as_millis(), "processes did not stop in time, aborting");
        join_set.shutdown().await;
    }
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }
    info!(timeout_ms = timeout.as_millis(), "running closers");

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let wait_all = async {
        while let Some(joined) = closer_set.join_next().await {
            match joined {
                Ok(Ok(())) => debug!("closer completed"),
                Ok(Err(e)) => error!("closer failed: {:#}", e),
                Err(e) => error!("closer panicked: {}", e),
            }
        }
    };

    match tokio::time::timeout(timeout, wait_all).await {
        Ok(()) => info!("all closers completed"),
        Err(_) => error!(timeout_ms = timeout.as_millis(), "closers timed out"),
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received interrupt signal");
                ctrl_c_token.cancel();
            }
            Err(e) => error!("failed to listen for interrupt signal: {}", e),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(e) => error!("failed to listen for SIGTERM: {}", e),
        }
    });
}
