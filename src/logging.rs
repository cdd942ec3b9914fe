// src/logging.rs
//
// Timestamped stderr logging with an optional mirror file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Start mirroring log output into `dir`.
///
/// Creates `<YYYYmmdd-HHMMSS>-<stem>.log` and points a `<stem>.log` symlink at it
/// (Unix only). Returns the path of the new log file.
pub fn init_file_logging(dir: &Path, stem: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let filename = format!("{}-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"), stem);
    let log_path = dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    #[cfg(unix)]
    {
        let symlink_path = dir.join(format!("{}.log", stem));
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{} [logging] Failed to create {}.log symlink: {}",
                timestamp(),
                stem,
                e
            );
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // eprintln directly: this line announces the file rather than belonging in it
    eprintln!("{} [logging] File logging started: {}", timestamp(), log_path.display());

    Ok(log_path)
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.take().is_some() {
            eprintln!("{} [logging] File logging stopped", timestamp());
        }
    }
}

/// Whether a log file is currently attached.
pub fn file_logging_active() -> bool {
    LOG_FILE.lock().map(|guard| guard.is_some()).unwrap_or(false)
}

pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Also writes to the log file when file logging is enabled.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", $crate::logging::timestamp(), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_writes_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_file_logging(dir.path(), "panel-test").unwrap();
        assert!(file_logging_active());

        tlog!("[logging-test] hello {}", 42);
        stop_file_logging();
        assert!(!file_logging_active());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[logging-test] hello 42"));

        #[cfg(unix)]
        {
            let link = dir.path().join("panel-test.log");
            assert!(std::fs::symlink_metadata(&link).is_ok());
        }
    }
}
