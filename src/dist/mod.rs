pub mod partition;
pub mod scheduler;
