//! Output module: where terminal crawl results go
//!
//! This module handles:
//! - The `Sink` trait that receives one record per completed URL
//! - Reference sinks (in-memory, log, SQLite)
//! - Crawl statistics and their display

mod log_sink;
mod memory;
mod sqlite_sink;
pub mod stats;
mod traits;

pub use log_sink::LogSink;
pub use memory::MemorySink;
pub use sqlite_sink::{initialize_schema, load_statistics, SqliteSink};
pub use stats::{print_statistics, CrawlStatistics, RejectionCounts};
pub use traits::{CrawlRecord, FinalOutcome, Sink, SinkError, SinkResult};
