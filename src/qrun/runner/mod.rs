// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

pub mod drmaa;
pub mod inprocess;
pub mod lsf;
pub mod shell;

use std::fmt;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use tempfile::Builder;

use crate::error::Error;
use crate::function::{Kind, QFunction, Status};

pub use self::drmaa::DrmaaJobRunner;
pub use self::inprocess::InProcessRunner;
pub use self::lsf::LsfJobRunner;
pub use self::shell::ShellJobRunner;

/// The contract a batch backend must satisfy. The scheduler only ever
/// calls these four methods, always from the loop thread.
pub trait JobRunner: fmt::Debug + Send {
    /// Begins execution. For in-process work this runs to completion
    /// synchronously; for remote backends this only fires the submission.
    fn start(&mut self) -> Result<(), Error>;

    /// Polls for the current status. Must never move backwards.
    fn status(&mut self) -> Status;

    /// Best-effort cancellation, used on shutdown. Must be idempotent.
    fn try_stop(&mut self) -> Result<(), Error>;

    /// Cleans up idempotent side effects (scratch files, response files).
    fn remove_temporary_files(&mut self);

    /// The backend and job id this runner's job is tracked under, for
    /// backends that can cancel many jobs in a single invocation.
    /// `None` for runners with no such facility (local shell, in-process),
    /// which are cancelled individually through `try_stop` instead.
    fn batch_cancel_id(&self) -> Option<(Backend, String)> {
        None
    }
}

/// Which backend a `CommandLineFunction` should be dispatched to.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Backend {
    Shell,
    Lsf,
    Drmaa,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(Backend::Shell),
            "lsf" | "bsub" => Ok(Backend::Lsf),
            "drmaa" => Ok(Backend::Drmaa),
            other => Err(format!("unknown job runner backend `{}`", other)),
        }
    }
}

/// Options threaded through to every runner constructed for this run.
#[derive(Clone, Debug, Default)]
pub struct RunnerConfig {
    pub backend: Option<Backend>,
    pub job_queue: Option<String>,
    pub temp_dir: Option<PathBuf>,
}

/// Picks a unique, persistent path under `temp_dir` (or the system
/// temp directory, if unset) for a job's stdout/stderr when the
/// function itself doesn't name one. The file is created and then
/// handed off via `keep()` so it outlives the `NamedTempFile` guard,
/// since these logs need to survive for post-mortem inspection rather
/// than being cleaned up on drop.
fn scratch_log_path(temp_dir: &Option<PathBuf>, suffix: &str) -> Option<PathBuf> {
    let mut builder = Builder::new();
    builder.prefix("qrun-").suffix(suffix);

    let named = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .ok()?;

    let (_, path) = named.keep().ok()?;
    Some(path)
}

/// Builds the right `JobRunner` for a function, following the selection
/// rules in the scheduling loop: command-line functions go to the
/// configured batch backend (or a local shell if none is configured);
/// in-process functions always run locally.
pub fn new_runner(function: &QFunction, config: &RunnerConfig) -> Box<dyn JobRunner> {
    match &function.kind {
        Kind::InProcess(job) => Box::new(InProcessRunner::new(job.clone())),
        Kind::CommandLine(cmd) => {
            let job_output_file = function
                .job_output_file
                .clone()
                .or_else(|| scratch_log_path(&config.temp_dir, ".out"));
            let job_error_file = function
                .job_error_file
                .clone()
                .or_else(|| scratch_log_path(&config.temp_dir, ".err"));

            match config.backend {
                Some(Backend::Lsf) => Box::new(LsfJobRunner::new(
                    cmd.clone(),
                    config.job_queue.clone(),
                    job_output_file,
                    job_error_file,
                )),
                Some(Backend::Drmaa) => Box::new(DrmaaJobRunner::new(
                    cmd.clone(),
                    config.job_queue.clone(),
                    job_output_file,
                    job_error_file,
                )),
                Some(Backend::Shell) | None => {
                    Box::new(ShellJobRunner::new(cmd.clone(), job_output_file, job_error_file))
                }
            }
        }
        Kind::ScatterGatherable(_) => {
            // Never dispatched directly: the rewriter replaces it before
            // the scheduling loop sees it.
            Box::new(InProcessRunner::new(std::sync::Arc::new(AlreadyDone)))
        }
    }
}

/// Cancels many batch jobs in as few external invocations as possible,
/// grouping at most 10 ids per `bkill`/`qdel` call. A shutdown with
/// hundreds of in-flight jobs would otherwise hand the batch scheduler
/// one cancellation process per job.
const BATCH_CANCEL_CHUNK: usize = 10;

pub fn cancel_batch(backend: Backend, ids: &[String]) {
    let program = match backend {
        Backend::Lsf => "bkill",
        Backend::Drmaa => "qdel",
        Backend::Shell => return,
    };

    for group in ids.chunks(BATCH_CANCEL_CHUNK) {
        let _ = ProcessCommand::new(program).args(group).output();
    }
}

#[derive(Debug)]
struct AlreadyDone;

impl crate::function::InProcessJob for AlreadyDone {
    fn run(&self) -> Result<(), Error> {
        Ok(())
    }
}
