//! Synthetic container builder shared by the unit tests.

use crate::scanner::{alignment_padding, FIXED_HEADER_LEN, SIGNATURE_BYTES};

/// Field values of one synthetic record
#[derive(Debug, Clone)]
pub(crate) struct RecordSpec {
    partition_type: String,
    payload: Vec<u8>,
    date: String,
    time: String,
    hardware_id: u64,
    sequence: u32,
    extra_header: Vec<u8>,
    header_size: Option<u32>,
    declared_size: Option<u32>,
}

impl RecordSpec {
    pub(crate) fn new(partition_type: &str, payload: Vec<u8>) -> Self {
        Self {
            partition_type: partition_type.to_string(),
            payload,
            date: "2016.01.01".to_string(),
            time: "00.00.00".to_string(),
            hardware_id: 0,
            sequence: 0,
            extra_header: Vec::new(),
            header_size: None,
            declared_size: None,
        }
    }

    pub(crate) fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub(crate) fn time(mut self, time: &str) -> Self {
        self.time = time.to_string();
        self
    }

    pub(crate) fn hardware_id(mut self, id: u64) -> Self {
        self.hardware_id = id;
        self
    }

    pub(crate) fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Vendor bytes between the fixed header and the payload
    pub(crate) fn extra_header(mut self, bytes: Vec<u8>) -> Self {
        self.extra_header = bytes;
        self
    }

    /// Overrides the header size field instead of deriving it
    pub(crate) fn header_size(mut self, size: u32) -> Self {
        self.header_size = Some(size);
        self
    }

    /// Overrides the payload size field instead of using the payload length
    pub(crate) fn declared_size(mut self, size: u32) -> Self {
        self.declared_size = Some(size);
        self
    }
}

fn slot(value: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    let bytes = value.as_bytes();
    let len = bytes.len().min(16);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Appends records and raw bytes into one container image
#[derive(Debug, Default)]
pub(crate) struct ContainerBuilder {
    bytes: Vec<u8>,
}

impl ContainerBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Appends a record followed by zero padding up to the next boundary
    pub(crate) fn record(mut self, spec: &RecordSpec) -> Self {
        let header_size = spec
            .header_size
            .unwrap_or(FIXED_HEADER_LEN as u32 + spec.extra_header.len() as u32);
        let size = spec.declared_size.unwrap_or(spec.payload.len() as u32);

        self.bytes.extend_from_slice(&SIGNATURE_BYTES);
        self.bytes.extend_from_slice(&header_size.to_le_bytes());
        self.bytes.extend_from_slice(&[0u8; 4]);
        self.bytes.extend_from_slice(&spec.hardware_id.to_le_bytes());
        self.bytes.extend_from_slice(&spec.sequence.to_le_bytes());
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.extend_from_slice(&slot(&spec.date));
        self.bytes.extend_from_slice(&slot(&spec.time));
        self.bytes.extend_from_slice(&slot(&spec.partition_type));
        self.bytes.extend_from_slice(&spec.extra_header);
        self.bytes.extend_from_slice(&spec.payload);

        let padding = alignment_padding(self.bytes.len() as u64) as usize;
        self.bytes.extend(std::iter::repeat(0u8).take(padding));
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.bytes
    }
}
