//! OS command execution
//!
//! Route and address changes are expressed as [`NetCommand`] values and run
//! through a [`CommandRunner`]. Failures are logged by the runner; callers
//! decide whether to care.

use std::fmt;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A single external command (program + arguments)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl NetCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the argument list contains `needle` as a contiguous run
    pub fn has_args(&self, needle: &[&str]) -> bool {
        needle.is_empty()
            || self
                .args
                .windows(needle.len())
                .any(|w| w.iter().zip(needle).all(|(a, b)| a == b))
    }
}

impl fmt::Display for NetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Executes OS commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command; non-zero exit and spawn failures are logged and returned
    async fn exec(&self, cmd: &NetCommand) -> Result<()>;
}

/// Runs commands on the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn exec(&self, cmd: &NetCommand) -> Result<()> {
        debug!("exec: {}", cmd);
        let output = match Command::new(&cmd.program).args(&cmd.args).output().await {
            Ok(output) => output,
            Err(e) => {
                warn!("failed to spawn `{}`: {}", cmd, e);
                return Err(Error::Command(format!("{}: {}", cmd, e)));
            }
        };

        if output.status.success() {
            return Ok(());
        }

        // netsh and route.exe report errors on stdout
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        warn!("`{}` failed ({}): {}", cmd, output.status, message);
        Err(Error::Command(format!("{}: {}", cmd, message)))
    }
}

/// Capture the stdout of a command, `None` on any failure
pub async fn capture_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_args() {
        let cmd = NetCommand::new("/sbin/ip", ["link", "set", "dev", "tun0", "up"]);
        assert_eq!(cmd.to_string(), "/sbin/ip link set dev tun0 up");
    }

    #[test]
    fn test_has_args() {
        let cmd = NetCommand::new("route", ["add", "default", "10.0.0.1"]);
        assert!(cmd.has_args(&["default", "10.0.0.1"]));
        assert!(!cmd.has_args(&["change", "default"]));
        assert!(cmd.has_args(&[]));
    }
}
