use clap::{Parser, Subcommand};
use shardalign::AlignerOptions;

#[derive(Parser, Debug)]
#[command(name = "shardalign", version, about = "Partitioned short-read alignment with BWA", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align FASTQ files under a directory with BWA
    Bwa(AlignerOptions),
}
