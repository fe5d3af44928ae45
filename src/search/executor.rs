/// Bounded execution of the external search process
///
/// A process-wide counting semaphore caps how many search children may be
/// alive at once; callers over the cap wait for a slot instead of failing.
/// Every invocation carries a timeout, and an expired child is killed before
/// the failure is surfaced so no process can leak.
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::error::{KnowledgeError, Result};

/// Output of a completed search invocation
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// Runs search invocations under the global concurrency bound
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
}

impl SearchExecutor {
    pub fn new(max_concurrent_searches: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_searches)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of child search processes currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `argv` with the given timeout. Exit codes 0 and 1 are success
    /// (1 is the grep convention for "no matches"); anything else surfaces
    /// the captured stderr. `query` is carried into timeout errors only.
    pub async fn execute(
        &self,
        argv: &[String],
        timeout: Duration,
        query: &str,
    ) -> Result<ExecOutput> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| KnowledgeError::other("search executor shut down"))?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.spawn_and_wait(argv, timeout, query).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }

    async fn spawn_and_wait(
        &self,
        argv: &[String],
        timeout: Duration,
        query: &str,
    ) -> Result<ExecOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| KnowledgeError::other("empty search argv"))?;

        tracing::debug!(argv = ?argv, "spawning search process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KnowledgeError::SearchEngineError {
                stderr: format!("failed to spawn '{}': {}", program, e),
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| KnowledgeError::other("failed to capture search stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| KnowledgeError::other("failed to capture search stderr"))?;

        let result = {
            let collect = async {
                let mut out = Vec::new();
                stdout.read_to_end(&mut out).await?;
                let mut err = Vec::new();
                stderr.read_to_end(&mut err).await?;
                let status = child.wait().await?;
                std::io::Result::Ok((out, err, status))
            };
            tokio::time::timeout(timeout, collect).await
        };

        match result {
            Ok(Ok((out, err, status))) => {
                let exit_code = status.code().unwrap_or(-1);
                // 0 = matches found, 1 = clean run without matches
                if exit_code == 0 || exit_code == 1 {
                    Ok(ExecOutput {
                        stdout: String::from_utf8_lossy(&out).into_owned(),
                        exit_code,
                    })
                } else {
                    Err(KnowledgeError::SearchEngineError {
                        stderr: String::from_utf8_lossy(&err).trim().to_string(),
                    })
                }
            }
            Ok(Err(e)) => Err(KnowledgeError::SearchEngineError {
                stderr: e.to_string(),
            }),
            Err(_) => {
                let _ = child.kill().await;
                tracing::warn!(query = %query, timeout_secs = timeout.as_secs(), "search timed out, child killed");
                Err(KnowledgeError::SearchTimeout {
                    query: query.to_string(),
                    timeout_seconds: timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let executor = SearchExecutor::new(2);
        let out = executor
            .execute(&argv(&["echo", "hello"]), Duration::from_secs(5), "q")
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_exit_code_one_is_no_match_success() {
        let executor = SearchExecutor::new(2);
        let out = executor
            .execute(&argv(&["sh", "-c", "exit 1"]), Duration::from_secs(5), "q")
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_exit_code_two_is_engine_error() {
        let executor = SearchExecutor::new(2);
        let err = executor
            .execute(
                &argv(&["sh", "-c", "echo bad pattern >&2; exit 2"]),
                Duration::from_secs(5),
                "q",
            )
            .await
            .unwrap_err();
        match err {
            KnowledgeError::SearchEngineError { stderr } => {
                assert!(stderr.contains("bad pattern"));
            }
            other => panic!("expected SearchEngineError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_error() {
        let executor = SearchExecutor::new(2);
        let err = executor
            .execute(
                &argv(&["definitely-not-installed-xyz"]),
                Duration::from_secs(5),
                "q",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::SearchEngineError { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let executor = SearchExecutor::new(2);
        let start = Instant::now();
        let err = executor
            .execute(&argv(&["sleep", "30"]), Duration::from_millis(100), "slow")
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(5));
        match err {
            KnowledgeError::SearchTimeout { query, .. } => assert_eq!(query, "slow"),
            other => panic!("expected SearchTimeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_bound() {
        let executor = SearchExecutor::new(2);

        let mut handles = Vec::new();
        for _ in 0..7 {
            let ex = executor.clone();
            handles.push(tokio::spawn(async move {
                ex.execute(&argv(&["sleep", "0.2"]), Duration::from_secs(10), "q")
                    .await
            }));
        }

        // Sample the gauge while the batch drains.
        let mut max_observed = 0;
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            max_observed = max_observed.max(executor.in_flight());
            if handles.iter().all(|h| h.is_finished()) || Instant::now() > deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(max_observed >= 1);
        assert!(max_observed <= 2, "observed {} concurrent searches", max_observed);
    }

    #[tokio::test]
    async fn test_blocked_callers_wait_instead_of_failing() {
        let executor = SearchExecutor::new(1);
        let start = Instant::now();

        let a = {
            let ex = executor.clone();
            tokio::spawn(async move {
                ex.execute(&argv(&["sleep", "0.2"]), Duration::from_secs(10), "q")
                    .await
            })
        };
        let b = {
            let ex = executor.clone();
            tokio::spawn(async move {
                ex.execute(&argv(&["sleep", "0.2"]), Duration::from_secs(10), "q")
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Serialized by the single permit: two 200ms sleeps take at least ~400ms.
        assert!(start.elapsed() >= Duration::from_millis(350));
    }
}
