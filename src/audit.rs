use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ipc::PageId;

/// Default location of the delivery log
pub fn delivery_log_path() -> PathBuf {
    crate::config::config_dir().join("delivery.log")
}

/// Append a timestamped entry to the log at `path`
pub fn append(path: &Path, entry: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        entry
    )?;
    Ok(())
}

/// Record a result that never reached its page
pub fn log_undeliverable(path: &Path, page: PageId, tag: &str, reason: &str) -> Result<()> {
    append(path, &format!("UNDELIVERED page={} message={} reason={}", page, tag, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeliverable_entry_appended() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("logs/delivery.log");

        log_undeliverable(&path, 4, "furigana:apply-result", "no receiver").unwrap();
        log_undeliverable(&path, 5, "furigana:apply-result", "closed").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("UNDELIVERED page=4 message=furigana:apply-result reason=no receiver"));
        assert!(lines[1].contains("page=5"));
    }
}
