//! Appending CSV result log.
//!
//! Columns: type,variant,workers,threads,schedule,size,duration_us,correct

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use forge_shard::BenchmarkResult;

pub const CSV_HEADER: &str = "type,variant,workers,threads,schedule,size,duration_us,correct";

/// Result log opened for append. Earlier runs' rows are kept; the header is
/// written only into an empty file.
pub struct CsvLog {
    path: PathBuf,
    file: File,
}

impl CsvLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    format!("Failed to create directory {}: {}", parent.display(), e)
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;

        let len = file
            .metadata()
            .map_err(|e| format!("Failed to stat {}: {}", path.display(), e))?
            .len();
        if len == 0 {
            writeln!(file, "{}", CSV_HEADER).map_err(|e| format!("Write error: {}", e))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it.
    pub fn append(&mut self, result: &BenchmarkResult) -> io::Result<()> {
        writeln!(self.file, "{}", format_row(result))?;
        self.file.flush()
    }
}

pub fn format_row(r: &BenchmarkResult) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        r.workload, r.variant, r.workers, r.threads, r.schedule, r.size, r.duration_us, r.correct
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_shard::WorkloadKind;

    fn sample(duration_us: u64) -> BenchmarkResult {
        BenchmarkResult {
            workload: WorkloadKind::Matmul,
            variant: "thread-pool".to_string(),
            workers: 1,
            threads: 4,
            schedule: "dynamic:16".to_string(),
            size: 4,
            duration_us,
            correct: true,
        }
    }

    #[test]
    fn test_format_row() {
        assert_eq!(
            format_row(&sample(12)),
            "matmul,thread-pool,1,4,dynamic:16,4,12,true"
        );
    }

    #[test]
    fn test_creates_parent_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/results.csv");
        let mut log = CsvLog::open(&path).unwrap();
        log.append(&sample(5)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![CSV_HEADER, "matmul,thread-pool,1,4,dynamic:16,4,5,true"]);
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        CsvLog::open(&path).unwrap().append(&sample(1)).unwrap();
        CsvLog::open(&path).unwrap().append(&sample(2)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.matches(CSV_HEADER).count(), 1);
        assert!(text.ends_with(",2,true\n"));
    }
}
