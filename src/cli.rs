use crate::output::write_results;
use crate::scan::{ParallelScanner, ScanReport};
use blockfinder_common::config::{DEFAULT_MAX_TAG_DEPTH, DEFAULT_POOL_SIZE, DEFAULT_RESULT_FILE};
use blockfinder_common::{BlockId, BlockRegistry, ScanConfig};
use blockfinder_logger::LogSeverity::{Debug, Info, Warning};
use blockfinder_logger::{log, set_min_severity};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Highest id the packed 8+4 bit block layout can hold.
const MAX_BLOCK_ID: BlockId = 0x0FFF;

/// Search coordinates of blocks in the entire map
#[derive(Parser, Debug)]
#[command(name = "blockfinder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the world folder
    #[arg(long = "map", value_name = "PATH")]
    pub map: PathBuf,

    /// IDs of blocks to search for (names work when --registry is given)
    #[arg(short = 'b', value_name = "BLOCK", num_args = 1.., required = true)]
    pub blocks: Vec<String>,

    /// How many workers to use for parallel searching
    #[arg(short = 'p', value_name = "N", default_value_t = DEFAULT_POOL_SIZE)]
    pub processes: usize,

    /// Path of the result file
    #[arg(long = "result-file", value_name = "PATH", default_value = DEFAULT_RESULT_FILE)]
    pub result_file: PathBuf,

    /// JSON file mapping block ids to names
    #[arg(long, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Maximum nesting depth accepted in chunk documents
    #[arg(long = "max-depth", value_name = "N", default_value_t = DEFAULT_MAX_TAG_DEPTH)]
    pub max_depth: usize,

    /// Log every match and every skipped chunk
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn load_registry(&self) -> io::Result<Option<BlockRegistry>> {
        self.registry
            .as_ref()
            .map(BlockRegistry::from_json_file)
            .transpose()
    }

    pub fn to_config(&self, registry: Option<&BlockRegistry>) -> Result<ScanConfig, String> {
        let block_ids = self
            .blocks
            .iter()
            .map(|block| parse_block(block, registry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = ScanConfig::new(&self.map, block_ids)
            .with_pool_size(self.processes)
            .with_max_tag_depth(self.max_depth);
        config.result_file = self.result_file.clone();
        Ok(config)
    }
}

/// Accepts a numeric id, or a name the registry knows.
pub fn parse_block(input: &str, registry: Option<&BlockRegistry>) -> Result<BlockId, String> {
    if let Ok(id) = input.trim().parse::<u32>() {
        return BlockId::try_from(id)
            .ok()
            .filter(|id| *id <= MAX_BLOCK_ID)
            .ok_or_else(|| format!("Block id {} is outside 0..={}", id, MAX_BLOCK_ID));
    }
    match registry {
        Some(registry) => registry
            .id_of(input.trim())
            .ok_or_else(|| format!("Unknown block name: {}", input)),
        None => Err(format!(
            "Invalid block id {:?} (names need --registry)",
            input
        )),
    }
}

/// Runs a full scan from parsed arguments and writes the result file.
///
/// Ctrl-C stops the workers at their next chunk boundary; whatever was
/// found by then is still written.
pub async fn run(cli: Cli) -> io::Result<ScanReport> {
    if cli.verbose {
        set_min_severity(Debug);
    }

    let registry = cli.load_registry()?;
    if let Some(registry) = &registry {
        log(format!("Loaded {} block names", registry.len()), Info);
    }
    let config = cli
        .to_config(registry.as_ref())
        .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;

    let scanner = ParallelScanner::new(&config).with_registry(registry.map(Arc::new));
    let token = scanner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log("Interrupted, stopping at the next chunk".to_owned(), Warning);
            token.cancel();
        }
    });

    let report = scanner.scan_world().await?;
    write_results(&config.result_file, &report.matches)?;

    log(
        format!(
            "Found {} blocks in {} region files ({} files failed, {} chunks skipped)",
            report.matches.len(),
            report.files_scanned,
            report.file_failures.len(),
            report.chunk_failures
        ),
        Info,
    );
    for (kind, count) in &report.chunk_failure_kinds {
        log(format!("  {} chunks skipped: {}", count, kind), Debug);
    }
    if report.cancelled_files > 0 {
        log(
            format!("Scan interrupted, {} files incomplete", report.cancelled_files),
            Warning,
        );
    }
    log(
        format!("Completed! See {}", config.result_file.display()),
        Info,
    );
    Ok(report)
}
