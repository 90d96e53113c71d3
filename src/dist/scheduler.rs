//! Local stand-in for the distributed runtime.
//!
//! Provides the two primitives the driver consumes: loading a text file as
//! an indexed line stream split into partitions, and running a
//! partition-indexed map over a dataset with result collection. Partitions
//! are executed on a dedicated rayon pool owned by the [`Session`].

use rand::Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::error::{AlignError, Result};

/// A collection of items split into independently processed partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    partitions: Vec<Vec<T>>,
}

impl<T: Send> Dataset<T> {
    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        Self { partitions }
    }

    /// Split `items` into at most `splits` contiguous, non-empty partitions
    pub fn from_vec(items: Vec<T>, splits: usize) -> Self {
        let splits = splits.max(1);
        let chunk = items.len().div_ceil(splits).max(1);
        let mut partitions = Vec::with_capacity(splits);
        let mut iter = items.into_iter().peekable();
        while iter.peek().is_some() {
            partitions.push(iter.by_ref().take(chunk).collect());
        }
        Self { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn into_partitions(self) -> Vec<Vec<T>> {
        self.partitions
    }

    pub fn collect(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }

    /// Redistribute items round-robin over exactly `n` partitions.
    ///
    /// Each source partition starts at a different target so that small
    /// source partitions do not all pile into partition 0.
    pub fn repartition(self, n: usize) -> Self {
        let n = n.max(1);
        let mut partitions: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
        for (source, items) in self.partitions.into_iter().enumerate() {
            for (offset, item) in items.into_iter().enumerate() {
                partitions[(source + offset) % n].push(item);
            }
        }
        Self { partitions }
    }

    pub fn map<U, F>(self, f: F) -> Dataset<U>
    where
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|items| items.into_iter().map(&f).collect())
            .collect();
        Dataset { partitions }
    }
}

impl<V: Send> Dataset<(u64, V)> {
    /// Shuffle items so that every key lands in partition `key % n`
    pub fn partition_by_key(self, n: usize) -> Self {
        let n = n.max(1);
        let mut partitions: Vec<Vec<(u64, V)>> = (0..n).map(|_| Vec::new()).collect();
        for (key, value) in self.partitions.into_iter().flatten() {
            partitions[(key % n as u64) as usize].push((key, value));
        }
        Self { partitions }
    }

    /// Sort globally by key and range-partition the result over the same
    /// number of partitions, so concatenating partitions yields key order.
    pub fn sort_by_key(self) -> Self {
        let n = self.num_partitions();
        let mut items: Vec<(u64, V)> = self.partitions.into_iter().flatten().collect();
        items.par_sort_by_key(|(key, _)| *key);
        Self::from_vec(items, n)
    }

    /// Sort each partition by key without moving items between partitions
    pub fn sort_within_partitions(mut self) -> Self {
        self.partitions
            .par_iter_mut()
            .for_each(|items| items.sort_by_key(|(key, _)| *key));
        self
    }

    /// Inner join on key.
    ///
    /// Returns the joined dataset, partitioned like `self`, and the number
    /// of keys present in only one of the two inputs.
    pub fn join<W: Send>(self, other: Dataset<(u64, W)>) -> (Dataset<(u64, (V, W))>, usize) {
        let mut right: std::collections::HashMap<u64, W> = other.collect().into_iter().collect();
        let mut left_only = 0usize;
        let partitions: Vec<Vec<(u64, (V, W))>> = self
            .partitions
            .into_iter()
            .map(|items| {
                items
                    .into_iter()
                    .filter_map(|(key, left)| match right.remove(&key) {
                        Some(r) => Some((key, (left, r))),
                        None => {
                            left_only += 1;
                            None
                        }
                    })
                    .collect()
            })
            .collect();
        let dropped = left_only + right.len();
        (Dataset { partitions }, dropped)
    }

    pub fn values(self) -> Dataset<V> {
        Dataset {
            partitions: self
                .partitions
                .into_iter()
                .map(|items| items.into_iter().map(|(_, v)| v).collect())
                .collect(),
        }
    }
}

/// Process-wide runtime handle, created once per run.
pub struct Session {
    run_id: String,
    parallelism: usize,
    pool: ThreadPool,
}

impl Session {
    pub fn new(app_name: &str, parallelism: usize) -> Result<Self> {
        let parallelism = parallelism.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("partition-worker-{}", i))
            .build()?;
        let run_id = new_run_id();
        info!("Session {} started for {} with {} workers", run_id, app_name, parallelism);

        Ok(Self {
            run_id,
            parallelism,
            pool,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Load a text file as `(line index, line)` pairs split into at most
    /// `parallelism` partitions.
    pub fn text_file(&self, path: &Path) -> Result<Dataset<(u64, String)>> {
        let file = File::open(path).map_err(|e| AlignError::io(path, e))?;
        let lines = BufReader::new(file)
            .lines()
            .enumerate()
            .map(|(i, line)| line.map(|l| (i as u64, l)))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| AlignError::io(path, e))?;

        let dataset = Dataset::from_vec(lines, self.parallelism);
        debug!(
            "Loaded {} lines from {} into {} splits",
            dataset.len(),
            path.display(),
            dataset.num_partitions()
        );
        Ok(dataset)
    }

    /// Run `f(partition_index, items)` for every partition on the session's
    /// pool and concatenate the results in partition order.
    ///
    /// Blocks until every partition has finished.
    pub fn map_partitions_with_index<T, R, F>(&self, dataset: Dataset<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(usize, Vec<T>) -> Vec<R> + Sync + Send,
    {
        self.pool.install(|| {
            dataset
                .into_partitions()
                .into_par_iter()
                .enumerate()
                .map(|(index, items)| f(index, items))
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        })
    }
}

fn new_run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let salt: u32 = rand::thread_rng().gen();
    format!("local-{}-{:08x}", millis, salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(n: u64) -> Vec<(u64, u64)> {
        (0..n).map(|i| (i, i * 10)).collect()
    }

    #[test]
    fn test_from_vec_never_creates_empty_splits() {
        let ds = Dataset::from_vec(vec![1, 2, 3], 8);
        assert_eq!(ds.num_partitions(), 3);
        assert!(ds.partitions().iter().all(|p| !p.is_empty()));

        let empty: Dataset<u8> = Dataset::from_vec(Vec::new(), 4);
        assert_eq!(empty.num_partitions(), 0);
    }

    #[test]
    fn test_repartition_keeps_every_item() {
        let ds = Dataset::from_vec(keyed(10), 2).repartition(4);
        assert_eq!(ds.num_partitions(), 4);
        assert_eq!(ds.len(), 10);
        let mut keys: Vec<u64> = ds.collect().into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_sort_by_key_is_globally_ordered() {
        let mut items = keyed(20);
        items.reverse();
        let ds = Dataset::from_vec(items, 3).sort_by_key();
        assert_eq!(ds.num_partitions(), 3);
        let keys: Vec<u64> = ds.collect().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_sort_within_partitions_only_orders_locally() {
        let ds = Dataset::from_partitions(vec![vec![(5, 'a'), (1, 'b')], vec![(3, 'c'), (0, 'd')]])
            .sort_within_partitions();
        assert_eq!(
            ds.into_partitions(),
            vec![vec![(1, 'b'), (5, 'a')], vec![(0, 'd'), (3, 'c')]]
        );
    }

    #[test]
    fn test_join_counts_unmatched_keys() {
        let left = Dataset::from_vec(vec![(0, "a0"), (1, "a1"), (2, "a2")], 2);
        let right = Dataset::from_vec(vec![(1, "b1"), (2, "b2"), (7, "b7")], 1);
        let (joined, dropped) = left.join(right);
        assert_eq!(dropped, 2);
        let mut pairs = joined.collect();
        pairs.sort_by_key(|(k, _)| *k);
        assert_eq!(pairs, vec![(1, ("a1", "b1")), (2, ("a2", "b2"))]);
    }

    #[test]
    fn test_map_partitions_with_index_collects_in_partition_order() {
        let session = Session::new("test", 2).unwrap();
        let ds = Dataset::from_vec((0..9).collect::<Vec<u32>>(), 3);
        let out = session.map_partitions_with_index(ds, |idx, items| vec![(idx, items.len())]);
        assert_eq!(out, vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_run_ids_are_distinct() {
        let a = Session::new("test", 1).unwrap();
        let b = Session::new("test", 1).unwrap();
        assert_ne!(a.run_id(), b.run_id());
        assert!(a.run_id().starts_with("local-"));
    }
}
