//! Launching the external aligner.
//!
//! A trailing `> path` pair in the argument vector is not handed to the
//! binary; the child's stdout is written to `path` instead. Launch failures
//! are retried, non-zero exits are not.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error, warn};

use crate::align::params::REDIRECT_SENTINEL;

/// Spawn attempts before giving up on a launch failure
pub const MAX_SPAWN_ATTEMPTS: usize = 5;

/// Returned when every attempt failed with an I/O error
pub const SPAWN_IO_FAILURE: i32 = -2;

/// Returned when every attempt was interrupted
pub const SPAWN_INTERRUPTED: i32 = -3;

/// Exit code reported for a child terminated by a signal
pub const KILLED_BY_SIGNAL: i32 = -1;

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub code: i32,
    /// Standard error of a failed run, one entry per line. Empty on success.
    pub stderr: Vec<String>,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// The binary could not be started at all
    pub fn is_launch_failure(&self) -> bool {
        self.code == SPAWN_IO_FAILURE || self.code == SPAWN_INTERRUPTED
    }
}

/// Split off a trailing `> path` pair, returning the remaining arguments
pub fn split_redirect(args: &[String]) -> (&[String], Option<&str>) {
    match args {
        [rest @ .., sentinel, target] if sentinel == REDIRECT_SENTINEL => {
            (rest, Some(target.as_str()))
        }
        _ => (args, None),
    }
}

/// Run `binary` with `args` and wait for it to exit
pub fn execute(binary: &Path, args: &[String]) -> Execution {
    let (args, redirect) = split_redirect(args);
    let program = binary.display().to_string();
    debug!("Running {} {}", program, args.join(" "));

    let execution = with_launch_retries(&program, || run_once(binary, args, redirect));
    if !execution.success() && !execution.is_launch_failure() {
        error!("{} exited with error code: {}", program, execution.code);
        for line in &execution.stderr {
            error!("{}: {}", program, line);
        }
    }
    execution
}

/// Call `launch` until it starts the process, at most
/// [`MAX_SPAWN_ATTEMPTS`] times.
///
/// The standard library already retries `EINTR` while spawning and waiting,
/// so [`SPAWN_INTERRUPTED`] is only reported when the OS still surfaces an
/// interruption.
fn with_launch_retries<F>(program: &str, mut launch: F) -> Execution
where
    F: FnMut() -> std::io::Result<Execution>,
{
    let mut last_failure = SPAWN_IO_FAILURE;
    for attempt in 1..=MAX_SPAWN_ATTEMPTS {
        match launch() {
            Ok(execution) => return execution,
            Err(e) => {
                last_failure = if e.kind() == ErrorKind::Interrupted {
                    SPAWN_INTERRUPTED
                } else {
                    SPAWN_IO_FAILURE
                };
                warn!(
                    "Could not launch {} (attempt {}/{}): {}",
                    program, attempt, MAX_SPAWN_ATTEMPTS, e
                );
            }
        }
    }

    error!("Giving up on {} after {} attempts", program, MAX_SPAWN_ATTEMPTS);
    Execution {
        code: last_failure,
        stderr: Vec::new(),
    }
}

fn run_once(binary: &Path, args: &[String], redirect: Option<&str>) -> std::io::Result<Execution> {
    let stdout = match redirect {
        Some(target) => Stdio::from(File::create(target)?),
        None => Stdio::null(),
    };

    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .spawn()?
        .wait_with_output()?;

    let code = output.status.code().unwrap_or(KILLED_BY_SIGNAL);
    let stderr = if code == 0 {
        Vec::new()
    } else {
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::to_string)
            .collect()
    };

    Ok(Execution { code, stderr })
}
