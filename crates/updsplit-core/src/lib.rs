//! # updsplit-core
//!
//! A library for splitting `UPDATE.APP` style firmware containers into their
//! partition images.
//!
//! A container is a flat concatenation of records. Each record starts with a
//! 4 byte signature and a self-describing header, followed by the partition
//! payload and zero padding up to the next 4 byte boundary.
//!
//! ## Architecture
//!
//! - [`scanner`]: signature search and header decoding
//! - [`extract`]: streaming payloads out to image files
//! - [`session`]: the record list a front end loads, selects from and extracts
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use updsplit_core::{Extractor, RecordSet};
//! use std::path::Path;
//!
//! let mut set = RecordSet::new();
//! for load in set.load(&["UPDATE.APP"]) {
//!     if let Err(e) = load.result {
//!         eprintln!("{}: {}", load.path.display(), e);
//!     }
//! }
//!
//! set.select_types(&["BOOT", "SYSTEM"]);
//! let summary = set.extract(&Extractor::new(), Path::new("out"));
//! println!("{} extracted, {} failed", summary.success_count(), summary.failure_count());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod cancel;
pub mod error;
pub mod extract;
pub mod record;
pub mod scanner;
pub mod session;

#[cfg(test)]
mod testutil;

// Re-export primary types for convenience
pub use cancel::CancelFlag;
pub use error::{DecodeError, Error, Result};
pub use extract::{ExtractSummary, ExtractedPayload, Extractor, ExtractorConfig, RecordOutcome};
pub use record::{PartitionRecord, UNKNOWN_TYPE};
pub use scanner::{scan_file, scan_files, FileScan, Scanner, ScannerConfig, SIGNATURE};
pub use session::{FileLoad, RecordSet};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
