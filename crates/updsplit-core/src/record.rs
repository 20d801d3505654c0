//! Decoded partition records.

use std::fmt;
use std::path::{Path, PathBuf};

/// Type name used when a record's type slot is empty or whitespace only
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// One partition record found inside a container file
///
/// Records are only created by the scanner. Apart from
/// [`selected`](Self::selected) they are never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    /// Partition type, e.g. `SYSTEM` or `BOOT`
    pub partition_type: String,
    /// Payload length in bytes
    pub size: u64,
    /// Build date string as stored in the header
    pub date: String,
    /// Build time string as stored in the header
    pub time: String,
    /// Absolute offset of the payload within the source file
    pub data_offset: u64,
    /// File the payload has to be read from
    pub source: PathBuf,
    /// Whether the record takes part in extraction
    pub selected: bool,
    /// Offset of the record signature
    pub start: u64,
    /// Offset right after the payload and its alignment padding
    pub end: u64,
    /// Header length declared by the record, signature included
    pub header_size: u32,
    /// Hardware/model identifier
    pub hardware_id: u64,
    /// Sequence number
    pub sequence: u32,
}

impl PartitionRecord {
    /// Offset one past the last payload byte
    pub fn payload_end(&self) -> u64 {
        self.data_offset + self.size
    }

    /// Source file name without its directory, as used for output folders
    pub fn source_name(&self) -> String {
        source_basename(&self.source)
    }

    /// Record start as shown in listings (`0x` + uppercase hex)
    pub fn start_hex(&self) -> String {
        format!("0x{:X}", self.start)
    }

    /// Record end as shown in listings (`0x` + uppercase hex)
    pub fn end_hex(&self) -> String {
        format!("0x{:X}", self.end)
    }
}

impl fmt::Display for PartitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}..{}] {} bytes ({} {})",
            self.partition_type,
            self.start_hex(),
            self.end_hex(),
            self.size,
            self.date,
            self.time
        )
    }
}

pub(crate) fn source_basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
