//! Graceful process termination.
//!
//! Ask first (SIGTERM via `kill` on Unix, `taskkill` without `/F` on
//! Windows), force-kill once the grace period is over.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

/// Stop `child` and reap it.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    if let Some(pid) = child.id() {
        request_exit(pid).await;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            crate::debug!("browser"; "grace period of {}ms elapsed, killing", grace.as_millis());
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
async fn request_exit(pid: u32) {
    let result = Command::new("kill")
        .args(["-s", "TERM", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        crate::debug!("browser"; "kill -s TERM {} failed: {}", pid, e);
    }
}

#[cfg(windows)]
async fn request_exit(pid: u32) {
    let result = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        crate::debug!("browser"; "taskkill {} failed: {}", pid, e);
    }
}

#[cfg(not(any(unix, windows)))]
async fn request_exit(_pid: u32) {}
