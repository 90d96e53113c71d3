pub mod executor;
pub mod params;
pub mod worker;
