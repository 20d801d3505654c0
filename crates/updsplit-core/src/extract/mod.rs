//! Partition payload extraction.
//!
//! Every selected record is copied from its source file into
//! `<output root>/<source file name>/<type>.img`. Payloads are streamed
//! through a bounded buffer, so memory use does not depend on partition size.
//! A failing record is reported in the [`ExtractSummary`] and the batch moves
//! on to the next one.

mod naming;

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::record::PartitionRecord;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

pub use naming::sanitize_file_name;

/// Default copy buffer size (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Extension given to extracted partition images
pub const OUTPUT_EXTENSION: &str = "img";

/// Configuration for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Size of the copy buffer in bytes
    pub buffer_size: usize,
    /// Extension of the output files, without the dot
    pub extension: String,
    /// Compute a BLAKE3 digest of every payload while copying
    pub digest: bool,
    /// Checked before every buffered copy step
    pub cancel: Option<CancelFlag>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            extension: OUTPUT_EXTENSION.to_string(),
            digest: false,
            cancel: None,
        }
    }
}

impl ExtractorConfig {
    /// Creates a new extractor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the copy buffer size (clamped to at least one byte)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Sets the output file extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Enables or disables payload digests
    pub fn digest(mut self, enabled: bool) -> Self {
        self.digest = enabled;
        self
    }

    /// Attaches a cancellation flag
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// A payload that was written out completely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    /// Bytes written
    pub bytes: u64,
    /// Hex BLAKE3 digest of the payload, when enabled
    pub digest: Option<String>,
}

/// Result of extracting one selected record
#[derive(Debug)]
pub struct RecordOutcome {
    /// Partition type of the record
    pub partition_type: String,
    /// Source file of the record
    pub source: PathBuf,
    /// Output file the payload was (or would have been) written to
    pub destination: PathBuf,
    /// What happened
    pub result: Result<ExtractedPayload>,
}

/// Aggregate result of an extraction batch
#[derive(Debug, Default)]
pub struct ExtractSummary {
    /// One entry per selected record, in input order
    pub outcomes: Vec<RecordOutcome>,
}

impl ExtractSummary {
    /// Number of records written completely
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of records that failed
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Outcomes of the failed records
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Copies partition payloads out of their container files
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    /// Creates a new extractor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Path a record's payload is written to under `output_root`
    pub fn destination(&self, record: &PartitionRecord, output_root: &Path) -> PathBuf {
        naming::destination(record, output_root, &self.config.extension)
    }

    /// Extracts every selected record.
    ///
    /// Unselected records are skipped without touching the filesystem.
    /// Existing output files are overwritten. After cancellation the
    /// remaining selected records are reported as cancelled.
    pub fn extract(&self, records: &[PartitionRecord], output_root: &Path) -> ExtractSummary {
        let mut summary = ExtractSummary::default();
        let mut written = HashSet::new();
        let mut halted = false;

        for record in records.iter().filter(|r| r.selected) {
            let destination = self.destination(record, output_root);

            if !written.insert(destination.clone()) {
                warn!(
                    "{} overwrites an earlier partition in this batch",
                    destination.display()
                );
            }

            let result = if halted {
                Err(Error::Cancelled)
            } else {
                self.extract_record(record, &destination)
            };

            match &result {
                Ok(payload) => debug!(
                    "Extracted {} ({} bytes) to {}",
                    record.partition_type,
                    payload.bytes,
                    destination.display()
                ),
                Err(e) => {
                    warn!(
                        "Failed to extract {} from {}: {}",
                        record.partition_type,
                        record.source.display(),
                        e
                    );
                    halted |= !e.is_recoverable();
                }
            }

            summary.outcomes.push(RecordOutcome {
                partition_type: record.partition_type.clone(),
                source: record.source.clone(),
                destination,
                result,
            });
        }

        debug!(
            "Extraction complete: {} succeeded, {} failed",
            summary.success_count(),
            summary.failure_count()
        );
        summary
    }

    /// Copies one record's payload to `destination`, creating its directory.
    ///
    /// The source length is checked against the record before `destination`
    /// is created: a source that is already too short fails with
    /// [`Error::TruncatedPayload`] and writes nothing. If the source shrinks
    /// during the copy, the bytes written so far are left in place.
    pub fn extract_record(
        &self,
        record: &PartitionRecord,
        destination: &Path,
    ) -> Result<ExtractedPayload> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
        }

        let mut source = File::open(&record.source).map_err(|e| Error::file_read(&record.source, e))?;
        let source_len = source
            .metadata()
            .map_err(|e| Error::file_read(&record.source, e))?
            .len();

        // The file may have changed since it was scanned
        if record.payload_end() > source_len {
            return Err(Error::truncated_payload(
                &record.source,
                record.data_offset,
                record.size,
                source_len.saturating_sub(record.data_offset),
            ));
        }

        source
            .seek(SeekFrom::Start(record.data_offset))
            .map_err(|e| Error::file_read(&record.source, e))?;

        let mut output = File::create(destination).map_err(|e| Error::file_write(destination, e))?;

        trace!(
            "Copying {} bytes from {}@{:#x} to {}",
            record.size,
            record.source.display(),
            record.data_offset,
            destination.display()
        );
        self.copy_payload(record, &mut source, &mut output, destination)
    }

    fn copy_payload(
        &self,
        record: &PartitionRecord,
        source: &mut impl Read,
        output: &mut impl Write,
        destination: &Path,
    ) -> Result<ExtractedPayload> {
        let buffer_len = usize::try_from(record.size)
            .unwrap_or(usize::MAX)
            .clamp(1, self.config.buffer_size.max(1));
        let mut buffer = vec![0u8; buffer_len];
        let mut hasher = self.config.digest.then(blake3::Hasher::new);
        let mut copied: u64 = 0;

        while copied < record.size {
            if self.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let want = usize::try_from(record.size - copied)
                .unwrap_or(usize::MAX)
                .min(buffer.len());
            let read = match source.read(&mut buffer[..want]) {
                Ok(0) => {
                    return Err(Error::truncated_payload(
                        &record.source,
                        record.data_offset,
                        record.size,
                        copied,
                    ))
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::file_read(&record.source, e)),
            };

            output
                .write_all(&buffer[..read])
                .map_err(|e| Error::file_write(destination, e))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&buffer[..read]);
            }
            copied += read as u64;
        }

        output.flush().map_err(|e| Error::file_write(destination, e))?;

        Ok(ExtractedPayload {
            bytes: copied,
            digest: hasher.map(|h| h.finalize().to_hex().to_string()),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancel
            .as_ref()
            .is_some_and(CancelFlag::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;
    use crate::testutil::{ContainerBuilder, RecordSpec};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    /// Writes a container to `dir/name` and scans it back
    fn write_and_scan(dir: &Path, name: &str, builder: ContainerBuilder) -> Vec<PartitionRecord> {
        let path = dir.join(name);
        fs::write(&path, builder.build()).unwrap();
        Scanner::new().scan_path(&path).unwrap()
    }

    #[test]
    fn test_extractor_config_builder() {
        let config = ExtractorConfig::new()
            .buffer_size(0)
            .extension("bin")
            .digest(true);
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.extension, "bin");
        assert!(config.digest);
    }

    #[test]
    fn test_round_trip_payloads() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let boot = payload(1000, 1);
        let system = payload(4099, 7);
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new()
                .raw(&[0xEE; 92])
                .record(&RecordSpec::new("BOOT", boot.clone()).extra_header(vec![0; 22]))
                .record(&RecordSpec::new("SYSTEM", system.clone())),
        );

        // small buffer to force several copy iterations
        let extractor = Extractor::with_config(ExtractorConfig::new().buffer_size(64));
        let summary = extractor.extract(&records, output.path());

        assert_eq!(summary.success_count(), 2);
        assert_eq!(summary.failure_count(), 0);
        let dir = output.path().join("UPDATE.APP");
        assert_eq!(fs::read(dir.join("BOOT.img")).unwrap(), boot);
        assert_eq!(fs::read(dir.join("SYSTEM.img")).unwrap(), system);
    }

    #[test]
    fn test_outputs_grouped_by_source_name() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let mut records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new().record(&RecordSpec::new("BOOT", vec![1; 8])),
        );
        records.extend(write_and_scan(
            input.path(),
            "update_full_base.zip.APP",
            ContainerBuilder::new().record(&RecordSpec::new("BOOT", vec![2; 8])),
        ));

        let summary = Extractor::new().extract(&records, output.path());

        assert_eq!(summary.success_count(), 2);
        assert_eq!(
            fs::read(output.path().join("UPDATE.APP/BOOT.img")).unwrap(),
            vec![1; 8]
        );
        assert_eq!(
            fs::read(output.path().join("update_full_base.zip.APP/BOOT.img")).unwrap(),
            vec![2; 8]
        );
    }

    #[test]
    fn test_unselected_records_are_skipped() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let root = output.path().join("out");
        let mut records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new()
                .record(&RecordSpec::new("BOOT", vec![1; 8]))
                .record(&RecordSpec::new("SYSTEM", vec![2; 8])),
        );
        for record in &mut records {
            record.selected = false;
        }

        let summary = Extractor::new().extract(&records, &root);

        assert_eq!(summary.success_count(), 0);
        assert_eq!(summary.failure_count(), 0);
        assert!(summary.outcomes.is_empty());
        assert!(!root.exists());
    }

    #[test]
    fn test_truncated_source_is_reported() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new()
                .record(&RecordSpec::new("BOOT", vec![1; 8]))
                .record(&RecordSpec::new("SYSTEM", vec![2; 400])),
        );

        // shrink the file after scanning so SYSTEM runs past the end
        let path = input.path().join("UPDATE.APP");
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(records[1].data_offset + 100).unwrap();
        drop(file);

        let summary = Extractor::new().extract(&records, output.path());

        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.failure_count(), 1);
        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.partition_type, "SYSTEM");
        match &failure.result {
            Err(Error::TruncatedPayload {
                expected, copied, ..
            }) => {
                assert_eq!(*expected, 400);
                assert_eq!(*copied, 100);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!output.path().join("UPDATE.APP/SYSTEM.img").exists());
        assert!(output.path().join("UPDATE.APP/BOOT.img").exists());
    }

    #[test]
    fn test_short_read_mid_copy_is_truncation() {
        let record = PartitionRecord {
            partition_type: "BOOT".into(),
            size: 10,
            date: String::new(),
            time: String::new(),
            data_offset: 0,
            source: PathBuf::from("UPDATE.APP"),
            selected: true,
            start: 0,
            end: 0,
            header_size: 76,
            hardware_id: 0,
            sequence: 0,
        };
        let mut source: &[u8] = &[5u8; 6];
        let mut output = Vec::new();

        let extractor = Extractor::with_config(ExtractorConfig::new().buffer_size(4));
        let err = extractor
            .copy_payload(&record, &mut source, &mut output, Path::new("BOOT.img"))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::TruncatedPayload {
                expected: 10,
                copied: 6,
                ..
            }
        ));
        // no rollback of what was already written
        assert_eq!(output, vec![5u8; 6]);
    }

    #[test]
    fn test_missing_source_is_reported() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new().record(&RecordSpec::new("BOOT", vec![1; 8])),
        );
        fs::remove_file(input.path().join("UPDATE.APP")).unwrap();

        let summary = Extractor::new().extract(&records, output.path());

        assert_eq!(summary.failure_count(), 1);
        assert!(matches!(
            summary.outcomes[0].result,
            Err(Error::FileRead { .. })
        ));
    }

    #[test]
    fn test_duplicate_type_later_record_wins() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new()
                .record(&RecordSpec::new("BOOT", vec![1; 12]))
                .record(&RecordSpec::new("BOOT", vec![2; 5])),
        );
        assert_eq!(records.len(), 2);

        let summary = Extractor::new().extract(&records, output.path());

        assert_eq!(summary.success_count(), 2);
        assert_eq!(summary.outcomes[0].destination, summary.outcomes[1].destination);
        assert_eq!(
            fs::read(output.path().join("UPDATE.APP/BOOT.img")).unwrap(),
            vec![2; 5]
        );
    }

    #[test]
    fn test_existing_output_is_overwritten() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new().record(&RecordSpec::new("BOOT", vec![3; 8])),
        );
        let dest = output.path().join("UPDATE.APP/BOOT.img");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, vec![0xFF; 64]).unwrap();

        let summary = Extractor::new().extract(&records, output.path());

        assert_eq!(summary.success_count(), 1);
        assert_eq!(fs::read(&dest).unwrap(), vec![3; 8]);
    }

    #[test]
    fn test_empty_payload() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new().record(&RecordSpec::new("EMPTY", Vec::new())),
        );

        let summary = Extractor::new().extract(&records, output.path());

        assert_eq!(summary.success_count(), 1);
        assert!(fs::read(output.path().join("UPDATE.APP/EMPTY.img"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_digest() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let data = payload(300, 3);
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new().record(&RecordSpec::new("BOOT", data.clone())),
        );

        let extractor = Extractor::with_config(ExtractorConfig::new().buffer_size(7).digest(true));
        let summary = extractor.extract(&records, output.path());

        let written = summary.outcomes[0].result.as_ref().unwrap();
        assert_eq!(written.bytes, 300);
        assert_eq!(
            written.digest.as_deref(),
            Some(blake3::hash(&data).to_hex().as_str())
        );
    }

    #[test]
    fn test_cancelled_extraction() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let records = write_and_scan(
            input.path(),
            "UPDATE.APP",
            ContainerBuilder::new()
                .record(&RecordSpec::new("BOOT", vec![1; 8]))
                .record(&RecordSpec::new("SYSTEM", vec![2; 8])),
        );
        let flag = CancelFlag::new();
        flag.cancel();

        let extractor = Extractor::with_config(ExtractorConfig::new().cancel_flag(flag));
        let summary = extractor.extract(&records, output.path());

        assert_eq!(summary.failure_count(), 2);
        assert!(summary
            .outcomes
            .iter()
            .all(|o| matches!(o.result, Err(Error::Cancelled))));
        assert!(!output.path().join("UPDATE.APP").exists());
    }

    #[test]
    fn test_custom_extension() {
        let extractor = Extractor::with_config(ExtractorConfig::new().extension("bin"));
        let record = PartitionRecord {
            partition_type: "CUST".into(),
            size: 0,
            date: String::new(),
            time: String::new(),
            data_offset: 0,
            source: PathBuf::from("a/UPDATE.APP"),
            selected: true,
            start: 0,
            end: 0,
            header_size: 76,
            hardware_id: 0,
            sequence: 0,
        };
        assert_eq!(
            extractor.destination(&record, Path::new("out")),
            PathBuf::from("out/UPDATE.APP/CUST.bin")
        );
    }
}
