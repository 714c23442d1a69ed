//! Read and write pipelines.
//!
//! Both borrow the same immutable [`crate::Schema`]:
//! - [`Reader`] - table rows to [`crate::Row`]s and records
//! - [`Writer`] - records to table rows

pub mod read;
pub mod write;

pub use read::{ReadBatch, Reader, RecordSink};
pub use write::Writer;
