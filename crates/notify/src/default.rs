//! Always-available fallback channel.
//!
//! Writes an alert banner to stderr and, when enabled, leaves a flag file and
//! a process environment marker behind for the surrounding automation (e.g. a
//! CI job deciding whether to fail). All side effects go through
//! [`AlertSink`] so they can be observed in tests.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ponghub_core::DefaultConfig;

use crate::traits::{Notifier, NotifyError};

/// Flag file written when the default channel fires.
pub const DEFAULT_FLAG_PATH: &str = "data/default_enabled.txt";

/// Environment variable set to `"true"` when the default channel fires.
pub const ALERT_MARKER_VAR: &str = "PONGHUB_HAS_ALERTS";

/// Side effects of the default channel.
pub trait AlertSink: Send + Sync {
    /// Emit the formatted alert block (stderr in production).
    fn emit(&self, block: &str) -> std::io::Result<()>;

    /// Persist the "alerts were raised" flag.
    fn write_flag(&self) -> std::io::Result<()>;

    /// Set the process-visible alert marker.
    fn raise_marker(&self);
}

/// Real process side effects: stderr, a flag file and an environment variable.
#[derive(Debug, Clone)]
pub struct ProcessAlertSink {
    flag_path: PathBuf,
    marker_var: String,
    /// Serializes flag-file writes and env mutation across concurrent sends.
    lock: Arc<std::sync::Mutex<()>>,
}

impl ProcessAlertSink {
    pub fn new(flag_path: impl Into<PathBuf>, marker_var: impl Into<String>) -> Self {
        Self {
            flag_path: flag_path.into(),
            marker_var: marker_var.into(),
            lock: Arc::new(std::sync::Mutex::new(())),
        }
    }
}

impl Default for ProcessAlertSink {
    fn default() -> Self {
        Self::new(DEFAULT_FLAG_PATH, ALERT_MARKER_VAR)
    }
}

impl AlertSink for ProcessAlertSink {
    fn emit(&self, block: &str) -> std::io::Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(block.as_bytes())?;
        stderr.flush()
    }

    fn write_flag(&self) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.flag_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_world_readable(&self.flag_path, b"true")
    }

    fn raise_marker(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::env::set_var(&self.marker_var, "true");
    }
}

#[cfg(unix)]
fn write_world_readable(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt as _;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_world_readable(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

/// Format the stderr alert block.
pub fn format_alert_block(title: &str, message: &str) -> String {
    format!("\n=== PongHub Alert ===\n{title}\n\n{message}\n=====================\n\n")
}

/// Writes alerts to stderr and raises the flag file / marker.
pub struct DefaultNotifier {
    config: Option<DefaultConfig>,
    sink: Arc<dyn AlertSink>,
}

impl DefaultNotifier {
    pub fn new(config: Option<DefaultConfig>, sink: Arc<dyn AlertSink>) -> Self {
        Self { config, sink }
    }
}

impl std::fmt::Debug for DefaultNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultNotifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Notifier for DefaultNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| NotifyError::Config("default notifier config is missing".to_string()))?;

        tracing::warn!(channel = "default", %title, "default notification triggered");
        self.sink.emit(&format_alert_block(title, message))?;

        if config.enabled {
            // The banner already went out; a failed flag write only gets logged.
            match self.sink.write_flag() {
                Ok(()) => tracing::info!("default notification flag created"),
                Err(e) => tracing::error!(error = %e, "failed to create default notification flag"),
            }
            self.sink.raise_marker();
        }

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "default"
    }
}
