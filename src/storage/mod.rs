//! Report persistence: monthly partitions, batched writes
//!
//! ## Design
//!
//! - **Trait-based**: `PartitionBackend` is the seam to the relational
//!   client; the partition lifecycle above it is backend-agnostic
//! - **Async**: all operations are async for compatibility with Tokio
//! - **Batch-oriented**: rows arrive through the shared `BatchCache` and
//!   land as multi-row inserts
//!
//! ## Layers
//!
//! - **BatchCache**: shared write buffer with size and time flush triggers
//! - **RollingReportStore**: month naming, lazy partition creation,
//!   retention pruning, statement chunking
//! - **MySqlBackend** (production) / **MemoryBackend** (tests): the
//!   `PartitionBackend` implementations

pub mod backend;
pub mod batch;
pub mod error;
pub mod memory;
pub mod mysql;
pub mod rolling;
pub mod schema;

pub use backend::PartitionBackend;
pub use batch::BatchCache;
pub use error::{StorageError, StorageResult};
pub use rolling::RollingReportStore;
pub use schema::ReportRow;
