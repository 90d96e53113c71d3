pub mod discovery;
pub mod fastq;
