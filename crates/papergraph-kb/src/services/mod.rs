//! Loading services: validation, planning, retries and batch-file handling

pub mod batch_reader;
pub mod loader;
pub mod pipeline;
pub mod retry;

pub use batch_reader::{discover_batch_files, parse_batch, read_batch_file};
pub use loader::{BatchReport, GraphLoader, LoaderOptions, UpsertReport};
pub use pipeline::{LoadPipeline, RunSummary, SkippedFile};
pub use retry::RetryPolicy;
