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

//! Drives jobs through Grid Engine's command-line tools (`qsub`, `qstat`,
//! `qdel`). As with `LsfJobRunner`, the real DRMAA C-library binding is
//! treated as an external collaborator behind the same `JobRunner`
//! contract; a production deployment may swap this out without touching
//! the scheduler.

use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use log::{debug, warn};

use crate::error::Error;
use crate::function::{Command, Status};

use super::{Backend, JobRunner};

#[derive(Debug)]
pub struct DrmaaJobRunner {
    command: Command,
    queue: Option<String>,
    job_output_file: Option<PathBuf>,
    job_error_file: Option<PathBuf>,
    job_id: Option<String>,
    status: Status,
}

impl DrmaaJobRunner {
    pub fn new(
        command: Command,
        queue: Option<String>,
        job_output_file: Option<PathBuf>,
        job_error_file: Option<PathBuf>,
    ) -> Self {
        DrmaaJobRunner {
            command,
            queue,
            job_output_file,
            job_error_file,
            job_id: None,
            status: Status::Pending,
        }
    }
}

impl JobRunner for DrmaaJobRunner {
    fn start(&mut self) -> Result<(), Error> {
        let mut qsub = ProcessCommand::new("qsub");
        qsub.arg("-terse");

        if let Some(ref queue) = self.queue {
            qsub.args(&["-q", queue]);
        }

        if let Some(ref path) = self.job_output_file {
            qsub.arg("-o").arg(path);
        }

        if let Some(ref path) = self.job_error_file {
            qsub.arg("-e").arg(path);
        }

        qsub.arg(&self.command.program).args(&self.command.args);

        debug!("drmaa: qsub {}", self.command);

        match qsub.output() {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                self.job_id = Some(stdout.trim().to_string());
                self.status = Status::Running;
            }
            _ => {
                warn!("drmaa: qsub submission failed for `{}`", self.command);
                self.status = Status::Failed;
            }
        }

        Ok(())
    }

    fn status(&mut self) -> Status {
        if self.status != Status::Running {
            return self.status;
        }

        let job_id = match &self.job_id {
            Some(id) => id,
            None => return self.status,
        };

        let output = ProcessCommand::new("qstat").arg("-j").arg(job_id).output();

        // qstat exits nonzero once the job has left the queue; at that
        // point we treat the job as done. A real deployment would
        // instead consult the accounting log for the exit code.
        if let Ok(output) = output {
            if !output.status.success() {
                self.status = Status::Done;
            }
        }

        self.status
    }

    fn try_stop(&mut self) -> Result<(), Error> {
        if let Some(ref job_id) = self.job_id {
            let _ = ProcessCommand::new("qdel").arg(job_id).output();
        }
        Ok(())
    }

    fn remove_temporary_files(&mut self) {}

    fn batch_cancel_id(&self) -> Option<(Backend, String)> {
        self.job_id.clone().map(|id| (Backend::Drmaa, id))
    }
}
