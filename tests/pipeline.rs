#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use shardalign::{AlignError, AlignerOptions, Driver, RunContext, Session};
use tempfile::TempDir;

/// Stand-in for bwa. `mem` prints a header and the first read file on
/// stdout; the two-pass programs write to the file after `-f`. Any
/// invocation touching partition 3 fails.
const FAKE_BWA: &str = r#"#!/bin/sh
case "$*" in
  *-part3_*) echo "simulated failure on partition 3" >&2; exit 1 ;;
esac
if [ "$1" = "mem" ]; then
  echo "@HD	VN:1.6"
  cat "$3"
  exit 0
fi
prog="$1"
while [ "$1" != "-f" ]; do shift; done
echo "$prog" > "$2"
"#;

struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("reads")).unwrap();
        fs::create_dir_all(tmp.path().join("scratch")).unwrap();
        let bin = tmp.path().join("fake-bwa");
        fs::write(&bin, FAKE_BWA).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        Self { tmp }
    }

    fn reads(&self) -> PathBuf {
        self.tmp.path().join("reads")
    }

    fn scratch(&self) -> PathBuf {
        self.tmp.path().join("scratch")
    }

    fn write_fastq(&self, name: &str, records: std::ops::Range<usize>) -> PathBuf {
        let path = self.reads().join(name);
        let text: String = records
            .map(|i| format!("@r{}\nACGTACGT\n+\nIIIIIIII\n", i))
            .collect();
        fs::write(&path, text).unwrap();
        path
    }

    fn options(&self, algorithm: &str, partitions: usize, sort: bool) -> AlignerOptions {
        AlignerOptions {
            input: self.reads(),
            index: PathBuf::from("ref/genome.fa"),
            algorithm: algorithm.into(),
            bwa_args: String::new(),
            partitions,
            sort,
            output: None,
            bwa_path: self.tmp.path().join("fake-bwa"),
            scratch_dir: Some(self.scratch()),
            threads: 3,
            mate_suffix_len: 3,
            app_name: "test".into(),
        }
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.scratch()).unwrap().next().is_none()
    }
}

fn run(options: &AlignerOptions) -> shardalign::Result<shardalign::RunReport> {
    let session = Session::new(&options.app_name, options.threads)?;
    let ctx = RunContext::new(options, session.run_id())?;
    Driver::new(&session, &ctx).run()
}

fn read_headers(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("@r"))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_single_end_sorted_run_keeps_record_order() {
    let fx = Fixture::new();
    fx.write_fastq("s_1.fq", 0..12);

    let report = run(&fx.options("mem", 0, true)).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.expected_partitions(), 3);

    let headers: Vec<String> = report.outputs().iter().flat_map(|p| read_headers(p)).collect();
    let expected: Vec<String> = (0..12).map(|i| format!("@r{}", i)).collect();
    assert_eq!(headers, expected);

    let out_dir = fx.reads().join(format!("shardalign-out-{}", report.run_id));
    for (i, output) in report.outputs().iter().enumerate() {
        assert_eq!(output.parent().unwrap(), out_dir);
        assert_eq!(
            output.file_name().unwrap().to_string_lossy(),
            format!("test-{}-s_1-{}.sam", report.run_id, i)
        );
    }
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_paired_and_single_groups_in_one_run() {
    let fx = Fixture::new();
    fx.write_fastq("a_1.fastq", 0..10);
    fx.write_fastq("a_2.fastq", 0..8);
    fx.write_fastq("b_1.fq", 0..4);

    let report = run(&fx.options("mem", 2, false)).unwrap();
    assert_eq!(report.groups.len(), 2);

    let a = &report.groups[0];
    assert!(a.primary.ends_with("a_1.fastq"));
    assert!(a.mate.as_ref().unwrap().ends_with("a_2.fastq"));
    assert_eq!(a.dropped_records, 2);
    assert_eq!(a.outputs.len(), 2);

    let b = &report.groups[1];
    assert!(b.primary.ends_with("b_1.fq"));
    assert!(b.mate.is_none());
    assert_eq!(b.outputs.len(), 2);

    let aligned: usize = a.outputs.iter().map(|p| read_headers(p).len()).sum();
    assert_eq!(aligned, 8);
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_two_pass_paired_run_removes_intermediates() {
    let fx = Fixture::new();
    fx.write_fastq("x_1.fq", 0..6);
    fx.write_fastq("x_2.fq", 0..6);

    let report = run(&fx.options("aln", 2, true)).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.outputs().len(), 2);
    for output in report.outputs() {
        assert_eq!(fs::read_to_string(output).unwrap().trim(), "sampe");
    }
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_repeated_runs_never_overwrite() {
    let fx = Fixture::new();
    fx.write_fastq("s_1.fq", 0..8);
    let options = fx.options("mem", 0, false);

    let first = run(&options).unwrap();
    let second = run(&options).unwrap();

    assert_ne!(first.run_id, second.run_id);
    // the second run must not pick up the first run's output directory
    assert_eq!(second.groups.len(), 1);
    for output in first.outputs().into_iter().chain(second.outputs()) {
        assert!(output.exists());
    }
    assert!(first.outputs().iter().all(|p| !second.outputs().contains(p)));
}

#[test]
fn test_partial_failure_reports_four_of_five() {
    let fx = Fixture::new();
    fx.write_fastq("s_1.fq", 0..20);

    let report = run(&fx.options("mem", 5, false)).unwrap();
    assert_eq!(report.expected_partitions(), 5);
    assert_eq!(report.outputs().len(), 4);
    assert_eq!(report.missing_partitions(), 1);
    assert!(report
        .outputs()
        .iter()
        .all(|p| !p.to_string_lossy().ends_with("-3.sam")));
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_malformed_group_does_not_stop_the_run() {
    let fx = Fixture::new();
    fx.write_fastq("good_1.fq", 0..4);
    fs::write(fx.reads().join("bad_1.fq"), "@r0\nACGT\n+\nIIII\n@r1\nACGT\n").unwrap();

    let report = run(&fx.options("mem", 0, false)).unwrap();
    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.failed_groups(), 1);
    assert!(report.groups[0].error.as_ref().unwrap().contains("incomplete record 1"));
    assert!(report.groups[1].error.is_none());
    assert!(!report.groups[1].outputs.is_empty());
}

#[test]
fn test_empty_input_is_not_found() {
    let fx = Fixture::new();
    let err = run(&fx.options("mem", 0, false)).unwrap_err();
    assert!(matches!(err, AlignError::NotFound(_)));
}
