/// Security policy for external filter commands
///
/// Filter commands come from configuration, which makes them untrusted-ish:
/// a format entry could name any executable. Every command is checked against
/// the active policy mode before it is handed to the search invocation or run
/// standalone, and standalone runs are always argv-based (no shell) with an
/// enforced timeout.
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::config::{FilterMode, SecurityConfig};
use crate::error::{KnowledgeError, Result};

/// Result of checking a command against the active policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SecurityVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Validates filter commands and runs them standalone under resource bounds
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    mode: FilterMode,
    allowed: Vec<String>,
    blocked: Vec<String>,
    filter_timeout: Duration,
}

impl SecurityPolicy {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            mode: config.filter_mode,
            allowed: config.allowed_filter_commands.clone(),
            blocked: config.blocked_filter_commands.clone(),
            filter_timeout: Duration::from_secs(config.filter_timeout_seconds),
        }
    }

    /// Check a filter command string against the policy.
    ///
    /// Whitelist mode matches either the leading token (the executable name)
    /// or the full command string; blacklist mode denies on the same match.
    pub fn check(&self, command: &str) -> SecurityVerdict {
        let command = command.trim();
        if command.is_empty() {
            return SecurityVerdict::deny("empty filter command");
        }
        let executable = command.split_whitespace().next().unwrap_or(command);

        match self.mode {
            FilterMode::Disabled => SecurityVerdict::deny("filter execution is disabled"),
            FilterMode::Whitelist => {
                let listed = self
                    .allowed
                    .iter()
                    .any(|entry| entry == executable || entry == command);
                if listed {
                    SecurityVerdict::allow()
                } else {
                    SecurityVerdict::deny(format!("'{}' is not in the allow-list", executable))
                }
            }
            FilterMode::Blacklist => {
                let listed = self
                    .blocked
                    .iter()
                    .any(|entry| entry == executable || entry == command);
                if listed {
                    SecurityVerdict::deny(format!("'{}' is in the deny-list", executable))
                } else {
                    SecurityVerdict::allow()
                }
            }
        }
    }

    /// Run a filter command standalone, feeding `input` on stdin and returning
    /// its stdout. The process is killed if it does not finish within the
    /// configured filter timeout; no partial output is returned in that case.
    pub async fn run_bounded(&self, command: &str, input: &[u8]) -> Result<Vec<u8>> {
        self.run_bounded_with_timeout(command, input, self.filter_timeout)
            .await
    }

    pub async fn run_bounded_with_timeout(
        &self,
        command: &str,
        input: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let verdict = self.check(command);
        if !verdict.allowed {
            return Err(KnowledgeError::SecurityViolation {
                reason: verdict.reason.unwrap_or_else(|| command.to_string()),
            });
        }

        let argv = split_command(command);
        // ugrep uses '%' as a filename placeholder; standalone runs always
        // feed the file on stdin, so '%' becomes '-'.
        let argv: Vec<String> = argv
            .into_iter()
            .map(|a| if a == "%" { "-".to_string() } else { a })
            .collect();

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KnowledgeError::FilterExecutionError {
                command: command.to_string(),
                reason: format!("failed to spawn: {}", e),
            })?;

        // Write stdin from a task so a filter that interleaves reading and
        // writing cannot deadlock on full pipe buffers.
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = input.to_vec();
            tokio::spawn(async move {
                let _ = stdin.write_all(&bytes).await;
                let _ = stdin.shutdown().await;
            });
        }

        let mut stdout = child.stdout.take().ok_or_else(|| {
            KnowledgeError::FilterExecutionError {
                command: command.to_string(),
                reason: "failed to capture stdout".to_string(),
            }
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            KnowledgeError::FilterExecutionError {
                command: command.to_string(),
                reason: "failed to capture stderr".to_string(),
            }
        })?;

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
            Ok(Ok((out, _, status))) if status.success() => Ok(out),
            Ok(Ok((_, err, status))) => Err(KnowledgeError::FilterExecutionError {
                command: command.to_string(),
                reason: format!(
                    "exit code {}: {}",
                    status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&err).trim()
                ),
            }),
            Ok(Err(e)) => Err(KnowledgeError::FilterExecutionError {
                command: command.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                // Timer fired: kill synchronously before surfacing the failure
                // so the child cannot outlive the call.
                let _ = child.kill().await;
                Err(KnowledgeError::FilterTimeout {
                    command: command.to_string(),
                    timeout_seconds: timeout.as_secs(),
                })
            }
        }
    }

    /// Startup self-test: does the filter pass policy and can its executable
    /// be spawned at all? Exit status is irrelevant here.
    pub async fn probe(&self, command: &str) -> bool {
        if !self.check(command).allowed {
            return false;
        }

        let argv = split_command(command);
        match Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(mut child) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                true
            }
            Err(_) => false,
        }
    }
}

/// Split a configured filter command into an argv vector. Filter commands are
/// plain whitespace-separated templates ("pdftotext - -"); no quoting or shell
/// syntax is honored, which keeps injection off the table.
fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
