//! Handing URLs to the platform.

use crate::error::{InstallError, InstallResult};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Opens a URL with whatever handles its scheme on this host.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &str) -> InstallResult<()>;
}

/// Opens URLs through the desktop's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(url: &str) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        }
        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

#[async_trait]
impl UrlOpener for SystemOpener {
    async fn open(&self, url: &str) -> InstallResult<()> {
        debug!(url, "opening URL");
        let status = Self::command(url)
            .status()
            .await
            .map_err(|e| InstallError::Open(format!("could not launch URL handler: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(InstallError::Open(format!("URL handler exited with {status}")))
        }
    }
}
