//! Logging for the chat client.
use anyhow::Context;
use mbtichat_core::get_data_dir;
use std::io::LineWriter;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::OffsetTime;

/// Initializes file-based logging.
///
/// Logs land at `<data_dir>/mbtichat.log`; when the file exceeds 100KB the
/// previous log is rotated to `mbtichat.log.old`. The terminal stays clean
/// for the chat transcript itself.
pub fn setup_logging() -> anyhow::Result<()> {
    let data_dir = get_data_dir().context("Failed to get data directory")?;
    let log_path = data_dir.join("mbtichat.log");

    if log_path.exists() {
        let metadata = std::fs::metadata(&log_path)?;
        if metadata.len() > 100 * 1024 {
            // 100KB
            let backup_path = data_dir.join("mbtichat.log.old");
            if backup_path.exists() {
                std::fs::remove_file(&backup_path)?;
            }
            std::fs::rename(&log_path, backup_path)?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    // Ensure the logs are flushed after every line
    let writer = Mutex::new(LineWriter::new(log_file));

    tracing_subscriber::fmt()
        .with_env_filter("mbtichat=debug,rustyline=info")
        .with_writer(writer)
        .with_ansi(false) // Disable ANSI escape codes for file logging
        .with_timer(OffsetTime::local_rfc_3339()?) // Use local time
        .init();
    Ok(())
}
