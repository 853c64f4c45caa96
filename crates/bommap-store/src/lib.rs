#![deny(unsafe_code)]

//! Storage collaborators for the mapping engine.
//!
//! All durable state lives behind two narrow traits: [`BlobStore`] for file
//! bytes and [`RecordStore`] for session/template/job records. Both are
//! injected explicitly into every component that needs them; there is no
//! process-wide client. Time is injected the same way through [`Clock`] so
//! expiry logic never depends on the wall clock in tests.

mod blob;
mod clock;
mod error;
mod record;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, RetrievalLocator};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Result, StoreError};
pub use record::{MemoryRecordStore, RecordStore, StoredRecord};
