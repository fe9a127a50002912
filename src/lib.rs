pub mod cli;
pub mod output;
pub mod scan;

// Re-export commonly used items
pub use blockfinder_common::{BlockRegistry, ScanConfig, ScanError, SearchMatch};
pub use scan::{ParallelScanner, ScanReport, ScanTask};
