//! Runs the usage command and captures its output.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::UsageConfig;
use crate::error::{Error, Result};

/// Something that produces raw `/usage` text
pub trait UsageSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Runs `claude /usage` as a child process
///
/// The child gets `NO_COLOR=1`, a null stdin and stderr, and is killed when
/// the time limit passes.
#[derive(Debug, Clone)]
pub struct ProcessUsageSource {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessUsageSource {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &UsageConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }
}

impl UsageSource for ProcessUsageSource {
    async fn fetch(&self) -> Result<String> {
        let child = Command::new(&self.command)
            .args(&self.args)
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Process(format!("failed to spawn {}: {}", self.command, e)))?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("Usage command timed out after {:?}", self.timeout);
                return Err(Error::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            debug!("Usage command exited with {}", output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
