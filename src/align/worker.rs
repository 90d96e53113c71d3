//! Per-partition alignment.
//!
//! A worker writes its batch to scratch FASTQ files, runs every alignment
//! step, and copies the resulting SAM file into the run's output directory
//! next to the original input. Every scratch file is removed when the
//! partition finishes, whether or not the alignment succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::align::executor::execute;
use crate::align::params::{ParameterBuilder, StepInputs};
use crate::config::RunContext;
use crate::dist::partition::PartitionBatch;
use crate::error::{AlignError, Result};
use crate::io::discovery::strip_read_extension;
use crate::io::fastq::FastqWriter;

/// Extension of the final alignment artifact
pub const ALIGNMENT_EXTENSION: &str = "sam";

/// Files removed when dropped
#[derive(Default)]
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn track(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => debug!("Deleted scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => error!("Could not delete scratch file {}: {}", path.display(), e),
            }
        }
    }
}

/// Aligns the partitions of one mate group
pub struct PartitionWorker<'a> {
    ctx: &'a RunContext,
    params: ParameterBuilder,
    origin: PathBuf,
}

impl<'a> PartitionWorker<'a> {
    /// `origin` is the primary read file the partitions were loaded from
    pub fn new(ctx: &'a RunContext, origin: &Path) -> Self {
        Self {
            ctx,
            params: ParameterBuilder::from_context(ctx),
            origin: origin.to_path_buf(),
        }
    }

    fn origin_stem(&self) -> String {
        let name = self
            .origin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        strip_read_extension(&name).to_string()
    }

    /// `<scratch>/<origin stem>-<run id>-part<index>_<slot>.fq`
    pub fn scratch_read_path(&self, index: usize, slot: u8) -> PathBuf {
        self.ctx.scratch_dir.join(format!(
            "{}-{}-part{}_{}.fq",
            self.origin_stem(),
            self.ctx.run_id,
            index,
            slot
        ))
    }

    /// `<app>-<run id>-<origin stem>-<index>.sam`
    pub fn alignment_file_name(&self, index: usize) -> String {
        format!(
            "{}-{}-{}-{}.{}",
            self.ctx.app_name,
            self.ctx.run_id,
            self.origin_stem(),
            index,
            ALIGNMENT_EXTENSION
        )
    }

    /// `<origin parent>/shardalign-out-<run id>`
    pub fn output_dir(&self) -> PathBuf {
        self.origin
            .parent()
            .unwrap_or(Path::new("."))
            .join(self.ctx.output_dir_name())
    }

    /// Align one partition and return the location of its SAM file.
    ///
    /// An empty result means the partition failed; the reason is logged.
    pub fn run(&self, index: usize, batch: PartitionBatch) -> Vec<PathBuf> {
        match self.align(index, batch) {
            Ok(Some(path)) => vec![path],
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Partition {} of {} failed: {}", index, self.origin.display(), e);
                Vec::new()
            }
        }
    }

    fn align(&self, index: usize, batch: PartitionBatch) -> Result<Option<PathBuf>> {
        let mut scratch = ScratchFiles::default();
        let read1 = self.scratch_read_path(index, 1);
        let read2 = batch.is_paired().then(|| self.scratch_read_path(index, 2));
        scratch.track(&read1);
        if let Some(read2) = &read2 {
            scratch.track(read2);
        }

        if batch.is_empty() {
            warn!("Partition {} of {} has no reads", index, self.origin.display());
        }
        info!("Partition {}: writing {} reads to {}", index, batch.len(), read1.display());
        write_batch(&batch, &read1, read2.as_deref())?;

        let file_name = self.alignment_file_name(index);
        let inputs = StepInputs {
            read1,
            read2,
            output: self.ctx.scratch_dir.join(&file_name),
        };
        scratch.track(&inputs.output);

        for step in self.params.steps(&inputs) {
            if step.is_intermediate() {
                scratch.track(&step.produces);
            }
            let execution = execute(&self.ctx.binary, &step.args);
            if execution.is_launch_failure() {
                error!(
                    "Partition {}: could not launch {} for step {} (code {}), aborting",
                    index,
                    self.ctx.binary.display(),
                    step.index,
                    execution.code
                );
                return Ok(None);
            }
            if !execution.success() {
                error!(
                    "Partition {}: step {} ({}) failed with code {}, aborting",
                    index, step.index, step.args[0], execution.code
                );
                return Ok(None);
            }
        }

        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir).map_err(|e| AlignError::io(&output_dir, e))?;
        let final_path = output_dir.join(&file_name);

        info!("Partition {}: copying {} to {}", index, inputs.output.display(), final_path.display());
        fs::copy(&inputs.output, &final_path).map_err(|e| AlignError::io(&final_path, e))?;

        Ok(Some(final_path))
    }
}

fn write_batch(batch: &PartitionBatch, read1: &Path, read2: Option<&Path>) -> Result<()> {
    match (batch, read2) {
        (PartitionBatch::Single(reads), _) => {
            let mut w1 = FastqWriter::create(read1)?;
            for read in reads {
                w1.write_record(read).map_err(|e| AlignError::io(read1, e))?;
            }
            w1.finish().map_err(|e| AlignError::io(read1, e))
        }
        (PartitionBatch::Paired(pairs), Some(read2)) => {
            let mut w1 = FastqWriter::create(read1)?;
            let mut w2 = FastqWriter::create(read2)?;
            for (first, second) in pairs {
                w1.write_record(first).map_err(|e| AlignError::io(read1, e))?;
                w2.write_record(second).map_err(|e| AlignError::io(read2, e))?;
            }
            w1.finish().map_err(|e| AlignError::io(read1, e))?;
            w2.finish().map_err(|e| AlignError::io(read2, e))
        }
        (PartitionBatch::Paired(_), None) => Err(AlignError::Config(
            "paired batch without a second scratch file".into(),
        )),
    }
}
