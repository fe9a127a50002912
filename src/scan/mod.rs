pub mod scanner;
pub mod task;

pub use scanner::{FileFailure, ParallelScanner, ScanReport};
pub use task::{BlockFilter, FileReport, ScanTask, SlotFailure, SlotOutcome};
