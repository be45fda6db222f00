//! TESSERA Core - Identity, Version and Error Types
//!
//! Pure data structures with no I/O. All other crates depend on this.
//! This crate contains ONLY data types - no SQL synthesis, no driver code.

pub mod audit;
pub mod clock;
pub mod error;
pub mod identity;
pub mod version;

pub use audit::{AuditStamp, RecordAudit};
pub use clock::{Clock, SystemClock};
pub use error::{MappingError, RepositoryError, TesseraError, TesseraResult};
pub use identity::{new_record_id, RecordId, TenantCode, Timestamp};
pub use version::{RegistryVersion, VersionSequence};
