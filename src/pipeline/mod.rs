//! Pipeline module - run orchestration and reporting

pub mod driver;
pub mod report;
