//! The in-memory record list a front end works on.

use crate::error::Result;
use crate::extract::{ExtractSummary, Extractor};
use crate::record::PartitionRecord;
use crate::scanner::Scanner;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of loading one input file into a [`RecordSet`]
#[derive(Debug)]
pub struct FileLoad {
    /// The input path as given
    pub path: PathBuf,
    /// Number of records found, or why the file could not be scanned
    pub result: Result<usize>,
}

/// Records of the most recent load, in input and file order
///
/// Every [`load`](Self::load) replaces the list. Selection is the only state
/// that changes between loads.
#[derive(Debug, Default)]
pub struct RecordSet {
    scanner: Scanner,
    records: Vec<PartitionRecord>,
}

impl RecordSet {
    /// Creates an empty set using the default scanner
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set using a configured scanner
    pub fn with_scanner(scanner: Scanner) -> Self {
        Self {
            scanner,
            records: Vec::new(),
        }
    }

    /// Clears the set and scans `paths` into it.
    ///
    /// Files that fail to scan contribute no records but do not stop the load.
    pub fn load<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<FileLoad> {
        self.records.clear();

        let loads = self
            .scanner
            .scan_files(paths)
            .into_iter()
            .map(|scan| FileLoad {
                path: scan.path,
                result: scan.result.map(|records| {
                    let count = records.len();
                    self.records.extend(records);
                    count
                }),
            })
            .collect();

        info!("Loaded {} records", self.records.len());
        loads
    }

    /// All records
    pub fn records(&self) -> &[PartitionRecord] {
        &self.records
    }

    /// All records, for changing their selection
    pub fn records_mut(&mut self) -> &mut [PartitionRecord] {
        &mut self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are loaded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Selected records
    pub fn selected(&self) -> impl Iterator<Item = &PartitionRecord> {
        self.records.iter().filter(|r| r.selected)
    }

    /// Selects every record
    pub fn select_all(&mut self) {
        self.set_all(true);
    }

    /// Deselects every record
    pub fn deselect_all(&mut self) {
        self.set_all(false);
    }

    /// Selects exactly the records whose type is in `types`.
    ///
    /// Matching is exact and case-sensitive. An empty list selects everything.
    pub fn select_types<S: AsRef<str>>(&mut self, types: &[S]) {
        if types.is_empty() {
            self.select_all();
            return;
        }
        for record in &mut self.records {
            record.selected = types.iter().any(|t| t.as_ref() == record.partition_type);
        }
    }

    /// Extracts the selected records below `output_root`
    pub fn extract(&self, extractor: &Extractor, output_root: &Path) -> ExtractSummary {
        extractor.extract(&self.records, output_root)
    }

    fn set_all(&mut self, selected: bool) {
        for record in &mut self.records {
            record.selected = selected;
        }
    }
}
