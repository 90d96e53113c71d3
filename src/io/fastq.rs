// src/io/fastq.rs
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dist::scheduler::Dataset;
use crate::error::{AlignError, Result};

/// Number of text lines that make up one FASTQ record
pub const LINES_PER_RECORD: u64 = 4;

/// One read reconstructed from four consecutive lines of a FASTQ file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub header: String,
    pub sequence: String,
    pub plus: String,
    pub quality: String,
}

impl fmt::Display for ReadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}\n{}\n{}", self.header, self.sequence, self.plus, self.quality)
    }
}

/// Lines collected for one record index while assembling
#[derive(Default)]
struct PendingRecord {
    slots: [Option<String>; 4],
}

impl PendingRecord {
    fn insert(&mut self, line_index: u64, text: String) -> Result<()> {
        let slot = &mut self.slots[(line_index % LINES_PER_RECORD) as usize];
        if slot.is_some() {
            return Err(AlignError::DuplicateLine(line_index));
        }
        *slot = Some(text);
        Ok(())
    }

    fn finish(self, record_index: u64) -> Result<ReadRecord> {
        let lines_present = self.slots.iter().filter(|s| s.is_some()).count();
        match self.slots {
            [Some(header), Some(sequence), Some(plus), Some(quality)] => Ok(ReadRecord {
                header,
                sequence,
                plus,
                quality,
            }),
            _ => Err(AlignError::IncompleteRecord {
                record_index,
                lines_present,
            }),
        }
    }
}

/// Group `(line index, text)` pairs into records keyed by `line index / 4`.
///
/// Arrival order is irrelevant: each line is placed by `line index % 4`.
/// Any group with fewer than four lines is an error. Output is ordered by
/// record index.
pub fn assemble_records<I>(lines: I) -> Result<Vec<(u64, ReadRecord)>>
where
    I: IntoIterator<Item = (u64, String)>,
{
    let mut pending: HashMap<u64, PendingRecord> = HashMap::new();
    for (line_index, text) in lines {
        pending
            .entry(line_index / LINES_PER_RECORD)
            .or_default()
            .insert(line_index, text)?;
    }

    let mut records = pending
        .into_iter()
        .map(|(record_index, p)| p.finish(record_index).map(|r| (record_index, r)))
        .collect::<Result<Vec<_>>>()?;
    records.sort_unstable_by_key(|(record_index, _)| *record_index);
    Ok(records)
}

/// Assemble records from a partitioned line stream.
///
/// Lines are first shuffled so that all four lines of a record meet in the
/// same partition (`record index % partitions`), then each partition is
/// assembled in parallel. The partition count of the input is kept.
pub fn assemble_dataset(lines: Dataset<(u64, String)>) -> Result<Dataset<(u64, ReadRecord)>> {
    let n = lines.num_partitions();
    if lines.is_empty() {
        return Ok(Dataset::from_partitions(Vec::new()));
    }
    let by_record = lines
        .map(|(line_index, text)| (line_index / LINES_PER_RECORD, (line_index, text)))
        .partition_by_key(n);

    let partitions = by_record
        .into_partitions()
        .into_par_iter()
        .map(|items| assemble_records(items.into_iter().map(|(_, line)| line)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Dataset::from_partitions(partitions))
}

/// Buffered writer for the scratch copy of a partition's reads
pub struct FastqWriter {
    writer: BufWriter<File>,
}

impl FastqWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| AlignError::io(path, e))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_record(&mut self, record: &ReadRecord) -> std::io::Result<()> {
        writeln!(self.writer, "{}", record)
    }

    pub fn finish(mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
