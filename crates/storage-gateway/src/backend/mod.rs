//! Storage abstraction layer.
//!
//! Provides the capability traits the gateway writes through, with
//! implementations for:
//! - In-process memory storage (development and tests)
//! - Azure Storage over its REST API (production)

pub mod azure;
mod error;
pub mod memory;
mod traits;

pub use azure::AzureAccount;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryAccount;
pub use traits::{ResourceBackend, StorageAccount};

/// Whether a path segment is `.` or `..`.
pub(crate) fn is_relative_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

/// Reject object names that would step out of their container or share.
pub(crate) fn check_object_name(name: &str) -> StorageResult<()> {
    if name.split('/').any(is_relative_segment) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
