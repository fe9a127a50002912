use blockfinder_common::{BlockId, ErrorScope, Result, ScanError, SearchMatch};
use blockfinder_logger::LogSeverity::{Debug, Info, Warning};
use blockfinder_logger::{enabled, log};
use blockfinder_nbt::TagDecoder;
use blockfinder_world::region::parse_region_name;
use blockfinder_world::{to_world, RegionFile, SectionExtractor, SlotCoords};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Number of distinct 12-bit block ids.
const BLOCK_ID_SPACE: usize = 4096;

/// Membership table over the whole 12-bit id space.
#[derive(Debug, Clone)]
pub struct BlockFilter {
    wanted: Vec<bool>,
    count: usize,
}

impl BlockFilter {
    pub fn new(ids: impl IntoIterator<Item = BlockId>) -> Self {
        let mut wanted = vec![false; BLOCK_ID_SPACE];
        let mut count = 0;
        for id in ids {
            if let Some(slot) = wanted.get_mut(id as usize) {
                if !*slot {
                    *slot = true;
                    count += 1;
                }
            }
        }
        BlockFilter { wanted, count }
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.wanted.get(id as usize).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// What happened to one chunk slot.
#[derive(Debug)]
pub enum SlotOutcome {
    Absent,
    Scanned { matches: Vec<SearchMatch> },
    Failed { error: ScanError },
}

#[derive(Debug)]
pub struct SlotFailure {
    pub slot: SlotCoords,
    pub error: ScanError,
}

/// Everything one region file produced.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub region: Option<(i32, i32)>,
    /// In ascending slot order.
    pub matches: Vec<SearchMatch>,
    pub slots_present: usize,
    pub slot_failures: Vec<SlotFailure>,
    pub cancelled: bool,
}

/// Scans a single region file for a set of block ids.
///
/// Failures inside a slot are recorded and the loop moves on to the next
/// slot; only failing to open or read the file itself is returned as an
/// error.
#[derive(Debug, Clone)]
pub struct ScanTask {
    path: PathBuf,
    filter: Arc<BlockFilter>,
    extractor: SectionExtractor,
    max_tag_depth: usize,
    cancel: CancellationToken,
}

impl ScanTask {
    pub fn new(path: impl Into<PathBuf>, filter: Arc<BlockFilter>) -> Self {
        ScanTask {
            path: path.into(),
            filter,
            extractor: SectionExtractor::default(),
            max_tag_depth: blockfinder_nbt::DEFAULT_MAX_DEPTH,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: SectionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_max_tag_depth(mut self, max_tag_depth: usize) -> Self {
        self.max_tag_depth = max_tag_depth;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Blocking. Meant to run on a worker thread.
    pub fn run(&self) -> Result<FileReport> {
        let region = RegionFile::open(&self.path)?;
        log(
            format!(
                "Start processing {} ({} chunks)",
                self.path.display(),
                region.present_count()
            ),
            Info,
        );
        let report = self.scan_region(&region);
        log(
            format!(
                "Completed processing {} ({} matches, {} failed chunks)",
                self.path.display(),
                report.matches.len(),
                report.slot_failures.len()
            ),
            Info,
        );
        Ok(report)
    }

    pub fn scan_region(&self, region: &RegionFile) -> FileReport {
        let mut report = FileReport {
            path: self.path.clone(),
            region: self
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_region_name),
            matches: Vec::new(),
            slots_present: 0,
            slot_failures: Vec::new(),
            cancelled: false,
        };

        for slot in SlotCoords::all() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.scan_slot(region, slot) {
                SlotOutcome::Absent => {}
                SlotOutcome::Scanned { matches } => {
                    report.slots_present += 1;
                    report.matches.extend(matches);
                }
                SlotOutcome::Failed { error } => {
                    report.slots_present += 1;
                    let severity = match error.scope() {
                        ErrorScope::Chunk => Debug,
                        ErrorScope::File => Warning,
                    };
                    log(
                        format!(
                            "Skipping chunk {} in {}: {}",
                            slot,
                            self.path.display(),
                            error
                        ),
                        severity,
                    );
                    report.slot_failures.push(SlotFailure { slot, error });
                }
            }
        }
        report
    }

    /// Runs the whole per-chunk pipeline for one slot and folds any error
    /// into the outcome.
    pub fn scan_slot(&self, region: &RegionFile, slot: SlotCoords) -> SlotOutcome {
        let payload = match region.read_slot(slot) {
            Ok(Some(payload)) => payload,
            Ok(None) => return SlotOutcome::Absent,
            Err(error) => return SlotOutcome::Failed { error },
        };

        match payload
            .decompress()
            .and_then(|document| self.scan_document(&document))
        {
            Ok(matches) => SlotOutcome::Scanned { matches },
            Err(error) => SlotOutcome::Failed { error },
        }
    }

    /// Decodes one chunk document and collects its matching voxels. Either
    /// every section is readable and all matches are returned, or nothing is.
    pub fn scan_document(&self, document: &[u8]) -> Result<Vec<SearchMatch>> {
        let (_, root) = TagDecoder::new(document)
            .with_max_depth(self.max_tag_depth)
            .decode()?;

        let mut matches = Vec::new();
        for entry in self.extractor.sections(&root)? {
            let (section, chunk_x, chunk_z) = entry?;
            for (index, block_id) in section.block_ids() {
                if !self.filter.contains(block_id) {
                    continue;
                }
                let (x, y, z) = to_world(chunk_x, chunk_z, section.y, index);
                if enabled(Debug) {
                    self.log_match(block_id, index, (x, y, z));
                }
                matches.push(SearchMatch::new(block_id, x, y, z));
            }
        }
        Ok(matches)
    }

    fn log_match(&self, block_id: BlockId, index: usize, (x, y, z): (i32, i32, i32)) {
        let name = match self.extractor.block_name(block_id) {
            Some(name) => format!(" ({})", name),
            None => String::new(),
        };
        log(
            format!(
                "Block {}{} found on index {} on coordinates {}, {}, {}",
                block_id, name, index, x, y, z
            ),
            Debug,
        );
    }
}
