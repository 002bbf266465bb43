// packages/recorder/src/recording/record.rs
//! Opaque fixed-size records
//!
//! The recorder never looks inside a record. It only needs the payload bytes
//! and the (compile-time) size, which the reader uses to split a recording
//! back into records.

/// A fixed-size binary payload that can be recorded
pub trait Record: Send + 'static {
    /// Payload size in bytes, identical for every record of this type
    const SIZE: usize;

    /// Raw payload
    fn as_bytes(&self) -> &[u8];
}

/// Size of a WIB superchunk (12 frames of 464 bytes)
pub const SUPERCHUNK_SIZE: usize = 5568;

/// Readout superchunk record
pub type SuperChunk = FixedRecord<SUPERCHUNK_SIZE>;

/// Byte array record of length `N`
#[derive(Clone, PartialEq, Eq)]
pub struct FixedRecord<const N: usize> {
    bytes: Box<[u8; N]>,
}

impl<const N: usize> FixedRecord<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        Self {
            bytes: Box::new(bytes),
        }
    }

    /// Record with every byte set to `value`
    pub fn filled(value: u8) -> Self {
        Self::new([value; N])
    }

    /// Copy a slice into a record; `None` if the length is not `N`
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; N] = slice.try_into().ok()?;
        Some(Self::new(bytes))
    }
}

impl<const N: usize> Record for FixedRecord<N> {
    const SIZE: usize = N;

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl<const N: usize> std::fmt::Debug for FixedRecord<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = &self.bytes[..N.min(8)];
        f.debug_struct("FixedRecord")
            .field("size", &N)
            .field("head", &head)
            .finish()
    }
}
