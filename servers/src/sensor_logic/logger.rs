use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

const LOG_PREFIX: &str = "sensor_server";

/// Routes `log` records to stdout and to a fresh file under `log_dir`.
///
/// Every earlier `.log` file in `log_dir` except the newest is removed first,
/// so a restart keeps one previous run for inspection.
pub fn setup_logging(log_dir: &Path, log_level: &str) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    prune_logs(log_dir, 1)?;

    let log_path = log_file_path(log_dir, Local::now());
    let log_file = fern::log_file(&log_path)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level_filter(log_level))
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()?;

    log::info!("Logging to {} at level {}", log_path.display(), level_filter(log_level));
    Ok(())
}

fn log_file_path(log_dir: &Path, started: DateTime<Local>) -> PathBuf {
    log_dir.join(format!("{}_{}.log", LOG_PREFIX, started.format("%Y-%m-%d_%H-%M-%S")))
}

// Unknown names fall back to `info`.
fn level_filter(log_level: &str) -> log::LevelFilter {
    log::LevelFilter::from_str(log_level.trim()).unwrap_or(log::LevelFilter::Info)
}

/// Deletes all but the `keep` most recently modified `.log` files.
fn prune_logs(log_dir: &Path, keep: usize) -> Result<()> {
    let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();
    logs.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, stale) in logs.into_iter().skip(keep) {
        if let Err(e) = fs::remove_file(&stale) {
            eprintln!("Failed to delete old log file {}: {}", stale.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn keeps_only_the_newest_log() {
        let dir = tempdir().unwrap();
        for name in ["a.log", "b.log", "c.log"] {
            fs::write(dir.path().join(name), name).unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        prune_logs(dir.path(), 1).unwrap();

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["c.log".to_string(), "notes.txt".to_string()]);
    }

    #[test]
    fn file_name_carries_the_start_time() {
        let started = Local.with_ymd_and_hms(2024, 5, 1, 8, 30, 5).unwrap();
        let path = log_file_path(Path::new("/var/log/sensor"), started);
        assert_eq!(path, PathBuf::from("/var/log/sensor/sensor_server_2024-05-01_08-30-05.log"));
    }

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(level_filter("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(level_filter(" trace "), log::LevelFilter::Trace);
        assert_eq!(level_filter("off"), log::LevelFilter::Off);
        assert_eq!(level_filter("nonsense"), log::LevelFilter::Info);
    }
}
