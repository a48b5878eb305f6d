use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only record of source files whose chunks are durably in the index.
/// One filename per line.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    processed: HashSet<String>,
}

impl Ledger {
    /// Reads the ledger at `path`. A missing or unreadable file is an empty ledger.
    pub fn load(path: &Path) -> Self {
        let processed = match fs::read_to_string(path) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                tracing::warn!("Could not read ledger {}: {}; starting empty", path.display(), e);
                HashSet::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            processed,
        }
    }

    /// A ledger that ignores what is on disk but still appends to `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            processed: HashSet::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Appends `name` and flushes it to disk before recording it in memory.
    pub fn append(&mut self, name: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", name)?;
        file.sync_all()?;

        self.processed.insert(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("processed_files_remote.txt"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_append_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_files_remote.txt");

        let mut ledger = Ledger::load(&path);
        ledger.append("unidad1.pdf").unwrap();
        ledger.append("unidad2.pdf").unwrap();
        assert!(ledger.contains("unidad1.pdf"));

        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("unidad2.pdf"));
    }

    #[test]
    fn test_append_does_not_rewrite_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        fs::write(&path, "old.pdf\n\n").unwrap();

        let mut ledger = Ledger::load(&path);
        ledger.append("new.pdf").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old.pdf\n\nnew.pdf\n");
    }

    #[test]
    fn test_empty_ignores_disk_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        fs::write(&path, "a.pdf\n").unwrap();

        let ledger = Ledger::empty(&path);
        assert!(!ledger.contains("a.pdf"));
    }
}
