use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use log::{Level, LevelFilter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("log directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a logger is already installed: {0}")]
    AlreadySet(#[from] log::SetLoggerError),
}

/// Unknown names fall back to `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Installs the global logger: stdout with colored levels and
/// `<log_dir>/<app_name>_<timestamp>.log`.
///
/// Older log files of the same app are removed first. Returns the new file's path.
pub fn setup_logging(app_name: &str, log_dir: &Path, log_level: &str) -> Result<PathBuf, LoggerError> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    cleanup_old_logs(log_dir, app_name, 0)?;

    let log_file_name = format!(
        "{}_{}.log",
        app_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(log_file_name);
    let level = parse_level(log_level);

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                paint(record.level()),
                message
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S%.3f]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(&log_path)?);

    fern::Dispatch::new()
        .level(level)
        // Connection internals are noisy at debug.
        .level_for("tungstenite", LevelFilter::Warn)
        .level_for("tokio_tungstenite", LevelFilter::Warn)
        .level_for("reqwest_retry", LevelFilter::Warn)
        .chain(console)
        .chain(file)
        .apply()?;

    Ok(log_path)
}

fn paint(level: Level) -> colored::ColoredString {
    let name = level.as_str();
    match level {
        Level::Error => name.red().bold(),
        Level::Warn => name.yellow(),
        Level::Info => name.green(),
        Level::Debug => name.cyan(),
        Level::Trace => name.dimmed(),
    }
}

/// Deletes `<app_name>_*.log` files in `log_dir`, keeping the `keep` newest.
pub(crate) fn cleanup_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> std::io::Result<usize> {
    let prefix = format!("{}_", app_name);
    let mut entries: Vec<(std::time::SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| {
            let path = e.path();
            // The timestamp keeps "pm" from matching "pm_notify_...".
            path.extension().is_some_and(|ext| ext == "log")
                && e.file_name()
                    .to_string_lossy()
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .collect();

    // Newest first; the name carries the timestamp, so it breaks ties.
    entries.sort_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for (_, path) in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("fatal"), LevelFilter::Info);
    }

    #[test]
    fn cleanup_only_touches_this_apps_logs() {
        let dir = tempdir().unwrap();
        for name in [
            "pm_2026-01-01_00-00-00.log",
            "pm_2026-01-02_00-00-00.log",
            "pm_notify_2026-01-01_00-00-00.log",
            "pm_notes.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let removed = cleanup_old_logs(dir.path(), "pm", 1).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join("pm_notify_2026-01-01_00-00-00.log").exists());

        let removed = cleanup_old_logs(dir.path(), "pm_notify", 0).unwrap();
        assert_eq!(removed, 1);
        let left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left.len(), 2);
        assert!(left.iter().any(|n| n == "pm_notes.txt"));
    }
}
