pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::ScanConfig;
pub use error::{ErrorScope, ScanError};
pub use registry::BlockRegistry;
pub use types::{BlockId, Result, SearchMatch};
