use tracing::{info, warn};

use crate::dist::scheduler::Dataset;
use crate::io::fastq::ReadRecord;

/// How reads of one mate group are grouped and ordered before alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStrategy {
    /// Target partition count; 0 keeps the partitioning of the input
    pub partitions: usize,
    pub sort: bool,
}

/// Reads handed to one partition worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionBatch {
    Single(Vec<ReadRecord>),
    Paired(Vec<(ReadRecord, ReadRecord)>),
}

impl PartitionBatch {
    pub fn len(&self) -> usize {
        match self {
            PartitionBatch::Single(reads) => reads.len(),
            PartitionBatch::Paired(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, PartitionBatch::Paired(_))
    }
}

impl PartitionStrategy {
    pub fn new(partitions: usize, sort: bool) -> Self {
        Self { partitions, sort }
    }

    /// Arrange keyed items according to the strategy.
    ///
    /// * sort, no count: global order by record index, input partition count
    /// * sort, count N: round-robin into N, each partition sorted by index
    /// * no sort, no count: untouched
    /// * no sort, count N: round-robin into N
    pub fn arrange<V: Send>(&self, items: Dataset<(u64, V)>) -> Dataset<V> {
        let source_partitions = items.num_partitions();
        let arranged = match (self.sort, self.partitions) {
            (true, 0) => {
                info!("Sorting reads without repartitioning");
                items.sort_by_key()
            }
            (true, n) => {
                info!("Repartitioning {} -> {} with sort", source_partitions, n);
                items.repartition(n).sort_within_partitions()
            }
            (false, 0) => {
                info!("No sort and no repartitioning");
                items
            }
            (false, n) => {
                if source_partitions <= n {
                    info!("Repartitioning {} -> {} with no sort", source_partitions, n);
                } else {
                    info!("Coalescing {} -> {} with no sort", source_partitions, n);
                }
                items.repartition(n)
            }
        };
        arranged.values()
    }

    /// Batches for a single-end read file
    pub fn single(&self, reads: Dataset<(u64, ReadRecord)>) -> Dataset<ReadRecord> {
        self.arrange(reads)
    }

    /// Batches for a mate pair: reads are joined on record index first and
    /// records without a partner are dropped.
    ///
    /// Returns the arranged pairs and the number of dropped records.
    pub fn paired(
        &self,
        reads1: Dataset<(u64, ReadRecord)>,
        reads2: Dataset<(u64, ReadRecord)>,
    ) -> (Dataset<(ReadRecord, ReadRecord)>, usize) {
        let (joined, dropped) = reads1.join(reads2);
        if dropped > 0 {
            warn!("Dropped {} reads without a mate in the paired file", dropped);
        }
        (self.arrange(joined), dropped)
    }
}
