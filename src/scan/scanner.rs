use crate::scan::task::{BlockFilter, FileReport, ScanTask};
use blockfinder_common::{BlockRegistry, ScanConfig, SearchMatch};
use blockfinder_logger::log;
use blockfinder_logger::LogSeverity::{Info, Warning};
use blockfinder_world::SectionExtractor;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// A region file that produced no report at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate of a whole scan. `matches` has no meaningful order across
/// files.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub matches: Vec<SearchMatch>,
    pub files_scanned: usize,
    pub file_failures: Vec<FileFailure>,
    pub chunk_failures: usize,
    /// Failed chunks per error kind.
    pub chunk_failure_kinds: BTreeMap<&'static str, usize>,
    pub cancelled_files: usize,
}

impl ScanReport {
    fn absorb(&mut self, report: FileReport) {
        self.files_scanned += 1;
        self.chunk_failures += report.slot_failures.len();
        for failure in &report.slot_failures {
            *self.chunk_failure_kinds.entry(failure.error.kind()).or_insert(0) += 1;
        }
        if report.cancelled {
            self.cancelled_files += 1;
        }
        self.matches.extend(report.matches);
    }
}

/// Runs one [`ScanTask`] per region file on a bounded pool of blocking
/// workers.
pub struct ParallelScanner {
    region_dir: PathBuf,
    pool_size: usize,
    filter: Arc<BlockFilter>,
    extractor: SectionExtractor,
    max_tag_depth: usize,
    cancel: CancellationToken,
}

impl ParallelScanner {
    pub fn new(config: &ScanConfig) -> Self {
        ParallelScanner {
            region_dir: config.region_dir(),
            pool_size: config.effective_pool_size(),
            filter: Arc::new(BlockFilter::new(config.block_ids.iter().copied())),
            extractor: SectionExtractor::default(),
            max_tag_depth: config.max_tag_depth,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_registry(mut self, registry: Option<Arc<BlockRegistry>>) -> Self {
        self.extractor = SectionExtractor::new(registry);
        self
    }

    /// Cancelling this token stops every task at its next slot boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Regular files in a region directory, sorted by name.
    pub fn region_files(region_dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(region_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Scans the configured world's `region` directory. Failing to list that
    /// directory is the only error; everything after that is folded into the
    /// report.
    pub async fn scan_world(&self) -> io::Result<ScanReport> {
        let files = Self::region_files(&self.region_dir)?;
        log(
            format!(
                "Scanning {} region files in {} with {} workers",
                files.len(),
                self.region_dir.display(),
                self.pool_size
            ),
            Info,
        );
        Ok(self.scan_files(files).await)
    }

    pub async fn scan_files(&self, files: Vec<PathBuf>) -> ScanReport {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));

        let handles: Vec<_> = files
            .iter()
            .map(|path| {
                let semaphore = semaphore.clone();
                let task = self.task_for(path.clone());
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| e.to_string())?;
                    tokio::task::spawn_blocking(move || task.run())
                        .await
                        .map_err(describe_join_error)
                })
            })
            .collect();

        let mut report = ScanReport::default();
        for (path, outcome) in files.into_iter().zip(join_all(handles).await) {
            let reason = match outcome {
                Ok(Ok(Ok(file_report))) => {
                    report.absorb(file_report);
                    continue;
                }
                Ok(Ok(Err(scan_error))) => scan_error.to_string(),
                Ok(Err(worker_error)) => worker_error,
                Err(join_error) => describe_join_error(join_error),
            };
            log(
                format!("Failed to scan {}: {}", path.display(), reason),
                Warning,
            );
            report.file_failures.push(FileFailure { path, reason });
        }
        report
    }

    fn task_for(&self, path: PathBuf) -> ScanTask {
        ScanTask::new(path, self.filter.clone())
            .with_extractor(self.extractor.clone())
            .with_max_tag_depth(self.max_tag_depth)
            .with_cancellation(self.cancel.clone())
    }
}

fn describe_join_error(error: JoinError) -> String {
    if error.is_panic() {
        let panic = error.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        format!("worker panicked: {}", message)
    } else {
        format!("worker cancelled: {}", error)
    }
}
