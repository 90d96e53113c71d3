//! Top-level orchestration: discover read files, pair mates, and align every
//! partition of every mate group on the session's worker pool.

use std::time::Instant;
use tracing::{error, info, warn};

use crate::align::worker::PartitionWorker;
use crate::config::RunContext;
use crate::dist::partition::{PartitionBatch, PartitionStrategy};
use crate::dist::scheduler::Session;
use crate::error::Result;
use crate::io::discovery::{discover, pair, MateGroup};
use crate::io::fastq::assemble_dataset;
use crate::pipeline::report::{GroupReport, RunReport};

pub struct Driver<'a> {
    session: &'a Session,
    ctx: &'a RunContext,
    strategy: PartitionStrategy,
}

impl<'a> Driver<'a> {
    pub fn new(session: &'a Session, ctx: &'a RunContext) -> Self {
        Self {
            session,
            ctx,
            strategy: PartitionStrategy::new(ctx.partitions, ctx.sort),
        }
    }

    /// Align every discovered mate group, one group at a time.
    ///
    /// Only discovery failures are returned as `Err`. A group that cannot be
    /// loaded and a partition that fails to align are both recorded in the
    /// report and the run carries on.
    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        let files = discover(&self.ctx.input)?;
        let mut groups = pair(&files, self.ctx.mate_suffix_len);
        groups.sort_by(|a, b| a.primary.cmp(&b.primary));
        info!("Found {} read files in {} mate groups", files.len(), groups.len());

        let mut report = RunReport::new(&self.ctx.run_id, &self.ctx.app_name, self.ctx.algorithm);
        for group in &groups {
            let group_report = self.align_group(group).unwrap_or_else(|e| {
                error!("Skipping {}: {}", group.primary.display(), e);
                GroupReport {
                    primary: group.primary.clone(),
                    mate: group.mate.clone(),
                    expected_partitions: 0,
                    outputs: Vec::new(),
                    dropped_records: 0,
                    error: Some(e.to_string()),
                }
            });
            report.groups.push(group_report);
        }

        let missing = report.missing_partitions();
        if missing > 0 || report.failed_groups() > 0 {
            warn!(
                "Run {} finished with {} of {} partitions aligned ({} groups failed to load)",
                report.run_id,
                report.outputs().len(),
                report.expected_partitions(),
                report.failed_groups()
            );
        } else {
            info!(
                "Run {} aligned {} partitions in {:.2}s",
                report.run_id,
                report.outputs().len(),
                start.elapsed().as_secs_f32()
            );
        }
        Ok(report)
    }

    fn align_group(&self, group: &MateGroup) -> Result<GroupReport> {
        info!("Aligning {}", group.primary.display());
        let worker = PartitionWorker::new(self.ctx, &group.primary);
        let reads1 = assemble_dataset(self.session.text_file(&group.primary)?)?;

        let (expected_partitions, outputs, dropped_records) = match &group.mate {
            Some(mate) => {
                info!("Mate file {}", mate.display());
                let reads2 = assemble_dataset(self.session.text_file(mate)?)?;
                let (pairs, dropped) = self.strategy.paired(reads1, reads2);
                let expected = pairs.num_partitions();
                let outputs = self.session.map_partitions_with_index(pairs, |index, items| {
                    worker.run(index, PartitionBatch::Paired(items))
                });
                (expected, outputs, dropped)
            }
            None => {
                let reads = self.strategy.single(reads1);
                let expected = reads.num_partitions();
                let outputs = self.session.map_partitions_with_index(reads, |index, items| {
                    worker.run(index, PartitionBatch::Single(items))
                });
                (expected, outputs, 0)
            }
        };

        if outputs.len() < expected_partitions {
            warn!(
                "{}: {} of {} partitions failed",
                group.primary.display(),
                expected_partitions - outputs.len(),
                expected_partitions
            );
        }

        Ok(GroupReport {
            primary: group.primary.clone(),
            mate: group.mate.clone(),
            expected_partitions,
            outputs,
            dropped_records,
            error: None,
        })
    }
}
