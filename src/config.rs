//! Run configuration.
//!
//! [`AlignerOptions`] is the raw command-line surface; [`RunContext`] is the
//! validated, immutable view every other component reads from.

use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::align::params::{split_extra_args, Algorithm};
use crate::error::{AlignError, Result};
use crate::io::discovery::DEFAULT_MATE_SUFFIX_LEN;

/// Name used for output artifacts when none is given
pub const DEFAULT_APP_NAME: &str = "shardalign";

/// Prefix of the per-run output directory created next to each input file
pub const OUTPUT_DIR_PREFIX: &str = "shardalign-out";

#[derive(Args, Debug, Clone)]
pub struct AlignerOptions {
    /// Directory tree containing the input FASTQ files
    #[arg(short = 'I', long)]
    pub input: PathBuf,

    /// Prefix of the index built by `bwa index`
    #[arg(short = 'R', long = "index", visible_alias = "reference")]
    pub index: PathBuf,

    /// Alignment algorithm (mem, aln, bwasw)
    #[arg(long, default_value = "mem")]
    pub algorithm: String,

    /// Arguments passed directly to BWA, space separated
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub bwa_args: String,

    /// Number of partitions to divide input reads into (0 keeps the input splits)
    #[arg(long, default_value_t = 0)]
    pub partitions: usize,

    /// Sort reads by their position in the input before aligning
    #[arg(long)]
    pub sort: bool,

    /// Directory for the JSON run report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// BWA executable
    #[arg(long, default_value = "bwa")]
    pub bwa_path: PathBuf,

    /// Local directory for per-partition scratch files
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Number of partitions aligned concurrently
    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Characters stripped from the extension-less file name to pair mates
    #[arg(long, default_value_t = DEFAULT_MATE_SUFFIX_LEN)]
    pub mate_suffix_len: usize,

    /// Application name used in output file names
    #[arg(long, default_value = DEFAULT_APP_NAME)]
    pub app_name: String,
}

/// Immutable per-run state shared read-only by the driver and every worker
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub app_name: String,
    pub run_id: String,
    pub algorithm: Algorithm,
    pub extra_args: Vec<String>,
    pub index_path: PathBuf,
    pub partitions: usize,
    pub sort: bool,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub binary: PathBuf,
    pub scratch_dir: PathBuf,
    pub mate_suffix_len: usize,
}

impl RunContext {
    /// Validate `options` and bind them to the session's run identifier.
    ///
    /// An unknown algorithm name is not an error: it falls back to `mem`.
    pub fn new(options: &AlignerOptions, run_id: &str) -> Result<Self> {
        if options.index.as_os_str().is_empty() {
            return Err(AlignError::Config("index path must not be empty".into()));
        }
        if options.mate_suffix_len == 0 {
            return Err(AlignError::Config("mate suffix length must be at least 1".into()));
        }
        if options.app_name.is_empty() || options.app_name.contains(std::path::MAIN_SEPARATOR) {
            return Err(AlignError::Config(format!(
                "invalid application name: {:?}",
                options.app_name
            )));
        }

        let scratch_dir = options.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        if !scratch_dir.is_dir() {
            return Err(AlignError::Config(format!(
                "scratch directory {} does not exist",
                scratch_dir.display()
            )));
        }

        Ok(Self {
            app_name: options.app_name.clone(),
            run_id: run_id.to_string(),
            algorithm: Algorithm::resolve(&options.algorithm),
            extra_args: split_extra_args(&options.bwa_args),
            index_path: options.index.clone(),
            partitions: options.partitions,
            sort: options.sort,
            input: options.input.clone(),
            output: options.output.clone(),
            binary: options.bwa_path.clone(),
            scratch_dir,
            mate_suffix_len: options.mate_suffix_len,
        })
    }

    /// Name of the per-run output directory (`shardalign-out-<run id>`)
    pub fn output_dir_name(&self) -> String {
        format!("{}-{}", OUTPUT_DIR_PREFIX, self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AlignerOptions {
        AlignerOptions {
            input: PathBuf::from("reads"),
            index: PathBuf::from("ref/genome.fa"),
            algorithm: "aln".into(),
            bwa_args: "-t 2".into(),
            partitions: 4,
            sort: true,
            output: None,
            bwa_path: PathBuf::from("bwa"),
            scratch_dir: None,
            threads: 2,
            mate_suffix_len: 3,
            app_name: DEFAULT_APP_NAME.into(),
        }
    }

    #[test]
    fn test_context_from_options() {
        let ctx = RunContext::new(&options(), "local-1").unwrap();
        assert_eq!(ctx.algorithm, Algorithm::Aln);
        assert_eq!(ctx.extra_args, vec!["-t", "2"]);
        assert_eq!(ctx.scratch_dir, std::env::temp_dir());
        assert_eq!(ctx.output_dir_name(), "shardalign-out-local-1");
    }

    #[test]
    fn test_unknown_algorithm_is_permissive() {
        let mut opts = options();
        opts.algorithm = "nonsense".into();
        let ctx = RunContext::new(&opts, "r").unwrap();
        assert_eq!(ctx.algorithm, Algorithm::Mem);
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let mut opts = options();
        opts.mate_suffix_len = 0;
        assert!(matches!(RunContext::new(&opts, "r"), Err(AlignError::Config(_))));

        let mut opts = options();
        opts.scratch_dir = Some(PathBuf::from("/definitely/not/a/dir"));
        assert!(matches!(RunContext::new(&opts, "r"), Err(AlignError::Config(_))));
    }
}
