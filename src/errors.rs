use std::{fmt, io};

use shared_memory::ShmemError;

/// Everything a store operation can fail with. Reads that merely miss
/// return `Option` instead; none of these are retried internally.
#[derive(Debug)]
pub enum StoreError {
    SegmentUnavailable(ShmemError),
    UndersizedSegment { expected: usize, actual: usize },
    Io(io::Error),
    CapacityExceeded,
    DuplicateEmail,
    NotFound,
    SenderNotFound,
    ReceiverNotFound,
    InvalidArgument(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::SegmentUnavailable(e) => write!(f, "shared memory segment unavailable: {}", e),
            StoreError::UndersizedSegment { expected, actual } => write!(
                f,
                "shared memory segment is {} bytes, need {}",
                actual, expected
            ),
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
            StoreError::CapacityExceeded => write!(f, "record capacity exceeded"),
            StoreError::DuplicateEmail => write!(f, "email already registered to an active account"),
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::SenderNotFound => write!(f, "sender does not resolve to an active account"),
            StoreError::ReceiverNotFound => write!(f, "receiver does not resolve to an active account"),
            StoreError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::SegmentUnavailable(e) => Some(e),
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShmemError> for StoreError {
    fn from(err: ShmemError) -> Self {
        StoreError::SegmentUnavailable(err)
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}
