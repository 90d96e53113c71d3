use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::align::params::Algorithm;
use crate::error::{AlignError, Result};

/// Outcome of aligning one mate group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub primary: PathBuf,
    pub mate: Option<PathBuf>,
    pub expected_partitions: usize,
    pub outputs: Vec<PathBuf>,
    /// Records without a partner in the other mate file
    pub dropped_records: usize,
    /// Set when the group could not be loaded at all
    pub error: Option<String>,
}

impl GroupReport {
    pub fn missing_partitions(&self) -> usize {
        self.expected_partitions.saturating_sub(self.outputs.len())
    }
}

/// Aggregated result of one driver run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub app_name: String,
    pub algorithm: Algorithm,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    pub fn new(run_id: &str, app_name: &str, algorithm: Algorithm) -> Self {
        Self {
            run_id: run_id.to_string(),
            app_name: app_name.to_string(),
            algorithm,
            groups: Vec::new(),
        }
    }

    /// Every produced alignment file, in group then partition order
    pub fn outputs(&self) -> Vec<&Path> {
        self.groups
            .iter()
            .flat_map(|g| g.outputs.iter().map(PathBuf::as_path))
            .collect()
    }

    pub fn expected_partitions(&self) -> usize {
        self.groups.iter().map(|g| g.expected_partitions).sum()
    }

    pub fn missing_partitions(&self) -> usize {
        self.groups.iter().map(GroupReport::missing_partitions).sum()
    }

    pub fn failed_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.error.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_partitions() == 0 && self.failed_groups() == 0
    }

    /// Write the report as pretty JSON to `<dir>/<app>-<run id>.json`
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| AlignError::io(dir, e))?;
        let path = dir.join(format!("{}-{}.json", self.app_name, self.run_id));
        let file = File::create(&path).map_err(|e| AlignError::io(&path, e))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn group(expected: usize, produced: usize) -> GroupReport {
        GroupReport {
            primary: PathBuf::from("a_1.fq"),
            mate: None,
            expected_partitions: expected,
            outputs: (0..produced).map(|i| PathBuf::from(format!("out-{}.sam", i))).collect(),
            dropped_records: 0,
            error: None,
        }
    }

    #[test]
    fn test_missing_partitions() {
        let mut report = RunReport::new("local-1", "app", Algorithm::Mem);
        report.groups.push(group(5, 4));
        report.groups.push(group(2, 2));
        assert_eq!(report.expected_partitions(), 7);
        assert_eq!(report.outputs().len(), 6);
        assert_eq!(report.missing_partitions(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_write_json() {
        let tmp = TempDir::new().unwrap();
        let mut report = RunReport::new("local-1", "app", Algorithm::Aln);
        report.groups.push(group(1, 1));

        let path = report.write_json(&tmp.path().join("reports")).unwrap();
        assert_eq!(path.file_name().unwrap(), "app-local-1.json");

        let value: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["algorithm"], "aln");
        assert_eq!(value["groups"][0]["expected_partitions"], 1);
    }
}
