//! Argument vectors for each step of a BWA run
//!
//! Single-pass algorithms (`mem`, `bwasw`) need one invocation whose
//! standard output is the alignment. The two-pass `aln` algorithm first
//! writes a `.sai` file per read file and then combines them with `samse`
//! (single-end) or `sampe` (paired-end).

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::RunContext;

/// Marker telling the executor to send the child's stdout to the next argument
pub const REDIRECT_SENTINEL: &str = ">";

/// Extension of the intermediate artifacts written by `aln`
pub const SAI_EXTENSION: &str = "sai";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Mem,
    Bwasw,
    Aln,
}

impl Algorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mem" => Some(Algorithm::Mem),
            "bwasw" => Some(Algorithm::Bwasw),
            "aln" => Some(Algorithm::Aln),
            _ => None,
        }
    }

    /// Resolve a user-supplied name, falling back to `mem` with a warning
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(
                "The algorithm {} could not be found, setting to default {} algorithm",
                name,
                Algorithm::default()
            );
            Algorithm::default()
        })
    }

    pub fn is_two_pass(self) -> bool {
        matches!(self, Algorithm::Aln)
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Mem => "mem",
            Algorithm::Bwasw => "bwasw",
            Algorithm::Aln => "aln",
        }
    }

    /// Number of binary invocations needed for one partition
    pub fn step_count(self, paired: bool) -> usize {
        match (self.is_two_pass(), paired) {
            (false, _) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which files a partition works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInputs {
    pub read1: PathBuf,
    pub read2: Option<PathBuf>,
    /// Final alignment file
    pub output: PathBuf,
}

impl StepInputs {
    pub fn is_paired(&self) -> bool {
        self.read2.is_some()
    }
}

/// One invocation of the alignment binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentStep {
    pub index: usize,
    /// Files the step reads, in argument order
    pub inputs: Vec<PathBuf>,
    /// File the step produces: a `.sai` artifact or the final alignment
    pub produces: PathBuf,
    pub args: Vec<String>,
}

impl AlignmentStep {
    pub fn is_intermediate(&self) -> bool {
        self.produces
            .extension()
            .map_or(false, |ext| ext == SAI_EXTENSION)
    }
}

/// Static part of the argument vector shared by every step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBuilder {
    pub algorithm: Algorithm,
    pub extra_args: Vec<String>,
    pub index_path: PathBuf,
}

/// `read.fq` -> `read.fq.sai`
pub fn sai_path(read: &Path) -> PathBuf {
    let mut name = read.as_os_str().to_os_string();
    name.push(".");
    name.push(SAI_EXTENSION);
    PathBuf::from(name)
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ParameterBuilder {
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            algorithm: ctx.algorithm,
            extra_args: ctx.extra_args.clone(),
            index_path: ctx.index_path.clone(),
        }
    }

    pub fn new(algorithm: Algorithm, extra_args: &str, index_path: impl Into<PathBuf>) -> Self {
        Self {
            algorithm,
            extra_args: split_extra_args(extra_args),
            index_path: index_path.into(),
        }
    }

    /// Build every step for one partition, in execution order
    pub fn steps(&self, inputs: &StepInputs) -> Vec<AlignmentStep> {
        (0..self.algorithm.step_count(inputs.is_paired()))
            .filter_map(|step| self.step(step, inputs))
            .collect()
    }

    /// Argument vector for `step`, or `None` if the algorithm has no such step.
    ///
    /// Layout: program, extra args, optional `-f target`, index, inputs,
    /// and for single-pass algorithms a trailing `> output` pair.
    pub fn step(&self, step: usize, inputs: &StepInputs) -> Option<AlignmentStep> {
        let paired = inputs.is_paired();
        if step >= self.algorithm.step_count(paired) {
            return None;
        }

        let (program, target, positional): (&str, Option<PathBuf>, Vec<PathBuf>) =
            match (self.algorithm, paired, step) {
                (Algorithm::Mem | Algorithm::Bwasw, _, _) => {
                    let mut reads = vec![inputs.read1.clone()];
                    reads.extend(inputs.read2.clone());
                    (self.algorithm.name(), None, reads)
                }
                (Algorithm::Aln, _, 0) => (
                    "aln",
                    Some(sai_path(&inputs.read1)),
                    vec![inputs.read1.clone()],
                ),
                (Algorithm::Aln, false, _) => (
                    "samse",
                    Some(inputs.output.clone()),
                    vec![sai_path(&inputs.read1), inputs.read1.clone()],
                ),
                (Algorithm::Aln, true, 1) => {
                    let read2 = inputs.read2.clone()?;
                    ("aln", Some(sai_path(&read2)), vec![read2])
                }
                (Algorithm::Aln, true, _) => {
                    let read2 = inputs.read2.clone()?;
                    (
                        "sampe",
                        Some(inputs.output.clone()),
                        vec![
                            sai_path(&inputs.read1),
                            sai_path(&read2),
                            inputs.read1.clone(),
                            read2,
                        ],
                    )
                }
            };

        let mut args = vec![program.to_string()];
        args.extend(self.extra_args.iter().cloned());
        if let Some(target) = &target {
            args.push("-f".to_string());
            args.push(arg(target));
        }
        args.push(arg(&self.index_path));
        args.extend(positional.iter().map(|p| arg(p)));

        let produces = match target {
            Some(target) => target,
            None => {
                args.push(REDIRECT_SENTINEL.to_string());
                args.push(arg(&inputs.output));
                inputs.output.clone()
            }
        };

        Some(AlignmentStep {
            index: step,
            inputs: positional,
            produces,
            args,
        })
    }
}

/// Split the passthrough argument string on whitespace
pub fn split_extra_args(extra: &str) -> Vec<String> {
    extra.split_whitespace().map(str::to_string).collect()
}
