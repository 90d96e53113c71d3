//! Partitioned short-read alignment driver.
//!
//! Read files are discovered and paired, split into partitions, and each
//! partition is aligned by an external BWA process on a local worker pool.

pub mod align;
pub mod config;
pub mod dist;
pub mod error;
pub mod io;
pub mod pipeline;

pub use config::{AlignerOptions, RunContext};
pub use dist::scheduler::Session;
pub use error::{AlignError, Result};
pub use pipeline::driver::Driver;
pub use pipeline::report::RunReport;
