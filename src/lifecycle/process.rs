//! Process-level control used by the hard relaunch.
//!
//! # Design Decisions
//! - Both operations are best-effort; callers log and swallow failures
//! - The OS or a surrounding service manager is the final backstop

use std::process::{Command, Stdio};

/// Relaunch and exit the current process.
pub trait ProcessControl: Send + Sync {
    /// Start a fresh copy of this process.
    fn relaunch(&self) -> std::io::Result<()>;

    /// Terminate this process.
    fn exit(&self, code: i32);
}

/// The real process: spawns the current executable, then exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcess;

impl ProcessControl for OsProcess {
    fn relaunch(&self) -> std::io::Result<()> {
        let exe = std::env::current_exe()?;
        let child = Command::new(&exe)
            .args(std::env::args_os().skip(1))
            .stdin(Stdio::null())
            .spawn()?;

        tracing::info!(exe = ?exe, pid = child.id(), "Relaunched process");
        Ok(())
    }

    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}
