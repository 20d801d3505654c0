//! Container scanning for partition records.
//!
//! ## Algorithm Overview
//!
//! 1. Search the input for the 4 byte record signature, one byte at a time
//! 2. Decode the header at the match (see [`decode_header`])
//! 3. On success, emit the record and continue after its payload and padding
//! 4. On failure, treat the match as noise and continue 4 bytes further
//!
//! Signature values that happen to occur inside a payload are never looked at,
//! since a successful decode moves the cursor past the whole payload.

mod header;

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::record::PartitionRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

pub use header::{
    alignment_padding, decode_header, DecodedHeader, ALIGNMENT, FIXED_HEADER_LEN, SIGNATURE,
    SIGNATURE_BYTES,
};

/// Configuration for the scanner
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Maximum number of records to return per file (0 = unlimited)
    pub max_records: usize,
    /// Checked once per signature candidate
    pub cancel: Option<CancelFlag>,
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of records to return per file
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    /// Attaches a cancellation flag
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Scan result for one input file of a batch
#[derive(Debug)]
pub struct FileScan {
    /// The input path as given
    pub path: PathBuf,
    /// Records found, or the reason the file could not be scanned
    pub result: Result<Vec<PartitionRecord>>,
}

impl FileScan {
    /// Number of records found (0 on failure)
    pub fn record_count(&self) -> usize {
        self.result.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Primary scanner for partition records
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    /// Creates a new scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Iterates over every signature candidate in `data`.
    ///
    /// Valid records come out as `Ok`, rejected candidates as
    /// [`Error::MalformedRecord`]. Iteration goes on after a rejection. It
    /// only ends early with [`Error::Cancelled`].
    pub fn records<'a>(&'a self, data: &'a [u8], source: &'a Path) -> Records<'a> {
        Records {
            data,
            source,
            position: 0,
            cancel: self.config.cancel.as_ref(),
            finished: false,
        }
    }

    /// Scans an in-memory container image.
    ///
    /// `source` is recorded in every record so the payload can be read back
    /// later. Malformed candidates are skipped. The only error is
    /// [`Error::Cancelled`].
    pub fn scan(&self, data: &[u8], source: &Path) -> Result<Vec<PartitionRecord>> {
        let mut records = Vec::new();

        debug!("Starting scan of {} ({} bytes)", source.display(), data.len());

        for candidate in self.records(data, source) {
            match candidate {
                Ok(record) => {
                    debug!(
                        "Found {} at {}..{} ({} bytes payload at {:#x})",
                        record.partition_type,
                        record.start_hex(),
                        record.end_hex(),
                        record.size,
                        record.data_offset
                    );
                    records.push(record);

                    if self.config.max_records > 0 && records.len() >= self.config.max_records {
                        break;
                    }
                }
                Err(Error::MalformedRecord { offset, reason }) => {
                    trace!("Rejected candidate at {:#x}: {}", offset, reason);
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Scan complete: found {} records", records.len());
        Ok(records)
    }

    /// Reads and scans a file
    pub fn scan_path(&self, path: &Path) -> Result<Vec<PartitionRecord>> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        trace!("Reading {}", path.display());
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        self.scan(&data, path)
    }

    /// Scans several files, one [`FileScan`] per input.
    ///
    /// A recoverable failure only affects its own file. Once an error is not
    /// recoverable (cancellation), the remaining files are reported with that
    /// outcome without being read.
    pub fn scan_files<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileScan> {
        let mut scans = Vec::with_capacity(paths.len());
        let mut halted = false;

        for path in paths {
            let path = path.as_ref();
            let result = if halted {
                Err(Error::Cancelled)
            } else {
                self.scan_path(path)
            };

            if let Err(ref e) = result {
                warn!("Error scanning {}: {}", path.display(), e);
                halted |= !e.is_recoverable();
            }
            scans.push(FileScan {
                path: path.to_path_buf(),
                result,
            });
        }

        scans
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancel
            .as_ref()
            .is_some_and(CancelFlag::is_cancelled)
    }
}

/// Iterator over signature candidates, see [`Scanner::records`]
#[derive(Debug)]
pub struct Records<'a> {
    data: &'a [u8],
    source: &'a Path,
    position: usize,
    cancel: Option<&'a CancelFlag>,
    finished: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<PartitionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.cancel.is_some_and(CancelFlag::is_cancelled) {
            self.finished = true;
            return Some(Err(Error::Cancelled));
        }

        let Some(relative) = find_signature(&self.data[self.position..]) else {
            self.position = self.data.len();
            self.finished = true;
            return None;
        };
        let start = self.position + relative;

        match decode_header(self.data, start) {
            Ok(header) => {
                // `end` is bounds-checked against the input by the decoder
                self.position = header.end as usize;
                Some(Ok(PartitionRecord {
                    partition_type: header.partition_type,
                    size: header.size,
                    date: header.date,
                    time: header.time,
                    data_offset: header.data_offset,
                    source: self.source.to_path_buf(),
                    selected: true,
                    start: start as u64,
                    end: header.end,
                    header_size: header.header_size,
                    hardware_id: header.hardware_id,
                    sequence: header.sequence,
                }))
            }
            Err(reason) => {
                self.position = start + SIGNATURE_BYTES.len();
                Some(Err(Error::malformed_record(start as u64, reason)))
            }
        }
    }
}

/// Finds the next signature, trying every byte offset
fn find_signature(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(SIGNATURE_BYTES.len())
        .position(|window| window == SIGNATURE_BYTES)
}

/// Scan a file for partition records
///
/// This is a convenience function that reads the file and scans it.
pub fn scan_file(path: impl AsRef<Path>) -> Result<Vec<PartitionRecord>> {
    Scanner::new().scan_path(path.as_ref())
}

/// Scan a file with custom configuration
pub fn scan_file_with_config(
    path: impl AsRef<Path>,
    config: ScannerConfig,
) -> Result<Vec<PartitionRecord>> {
    Scanner::with_config(config).scan_path(path.as_ref())
}

/// Scan several files with the default configuration
pub fn scan_files<P: AsRef<Path>>(paths: &[P]) -> Vec<FileScan> {
    Scanner::new().scan_files(paths)
}
