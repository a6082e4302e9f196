//! Tile files on the reviewer's machine.

use std::io;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use domains::LocalTiles;
use tokio::process::Command;
use tracing::debug;

/// Opens files with the desktop's default handler and deletes them in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopTiles;

impl DesktopTiles {
    pub fn new() -> Self {
        Self
    }
}

/// `open` on macOS, `start` on Windows, `xdg-open` elsewhere.
fn viewer_command(path: &str) -> Command {
    #[cfg(target_os = "macos")]
    {
        let mut command = Command::new("open");
        command.arg(path);
        command
    }
    #[cfg(target_os = "windows")]
    {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", path]);
        command
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    }
}

#[async_trait]
impl LocalTiles for DesktopTiles {
    fn exists(&self, path: &str) -> bool {
        !path.is_empty() && Path::new(path).exists()
    }

    async fn open_in_viewer(&self, path: &str) -> io::Result<()> {
        let mut command = viewer_command(path);
        debug!(?command, "opening tile in viewer");
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("viewer exited with {status}")))
        }
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}
