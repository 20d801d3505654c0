//! Output path derivation for extracted partitions.

use crate::record::{PartitionRecord, UNKNOWN_TYPE};
use std::path::{Path, PathBuf};

/// Characters rejected in file names on at least one supported platform
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that cannot appear in a file name with `_`.
///
/// Control characters are replaced too, and names made only of dots are
/// turned into underscores so they cannot refer to a directory.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control() || ILLEGAL_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    if cleaned.is_empty() {
        UNKNOWN_TYPE.to_string()
    } else if cleaned.chars().all(|c| c == '.') {
        "_".repeat(cleaned.len())
    } else {
        cleaned
    }
}

/// `<output_root>/<source file name>/<sanitized type>.<extension>`
pub(crate) fn destination(record: &PartitionRecord, output_root: &Path, extension: &str) -> PathBuf {
    let file_name = format!("{}.{}", sanitize_file_name(&record.partition_type), extension);
    output_root
        .join(sanitize_file_name(&record.source_name()))
        .join(file_name)
}
