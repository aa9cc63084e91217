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

//! Drives jobs through the real LSF command-line tools (`bsub`, `bjobs`,
//! `bkill`) rather than binding to the LSF C library directly. The wire
//! protocol itself is treated as an external collaborator; this runner
//! only needs to satisfy the `JobRunner` contract.

use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use log::{debug, warn};

use crate::error::Error;
use crate::function::{Command, Status};

use super::{Backend, JobRunner};

#[derive(Debug)]
pub struct LsfJobRunner {
    command: Command,
    queue: Option<String>,
    job_output_file: Option<PathBuf>,
    job_error_file: Option<PathBuf>,
    job_id: Option<String>,
    status: Status,
}

impl LsfJobRunner {
    pub fn new(
        command: Command,
        queue: Option<String>,
        job_output_file: Option<PathBuf>,
        job_error_file: Option<PathBuf>,
    ) -> Self {
        LsfJobRunner {
            command,
            queue,
            job_output_file,
            job_error_file,
            job_id: None,
            status: Status::Pending,
        }
    }
}

impl JobRunner for LsfJobRunner {
    fn start(&mut self) -> Result<(), Error> {
        let mut bsub = ProcessCommand::new("bsub");

        if let Some(ref queue) = self.queue {
            bsub.args(&["-q", queue]);
        }

        if let Some(ref path) = self.job_output_file {
            bsub.arg("-o").arg(path);
        }

        if let Some(ref path) = self.job_error_file {
            bsub.arg("-e").arg(path);
        }

        bsub.arg(&self.command.program).args(&self.command.args);

        debug!("lsf: bsub {}", self.command);

        let output = bsub.output();

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                self.job_id = parse_bsub_job_id(&stdout);
                self.status = Status::Running;
            }
            _ => {
                warn!("lsf: bsub submission failed for `{}`", self.command);
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

        let output = ProcessCommand::new("bjobs")
            .arg("-noheader")
            .arg("-o")
            .arg("stat")
            .arg(job_id)
            .output();

        if let Ok(output) = output {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match stdout.trim() {
                "DONE" => self.status = Status::Done,
                "EXIT" => self.status = Status::Failed,
                "" => {
                    // bjobs stops reporting a job shortly after it
                    // leaves the queue; an empty result with no error is
                    // treated as completed successfully.
                    self.status = Status::Done;
                }
                _ => {}
            }
        }

        self.status
    }

    fn try_stop(&mut self) -> Result<(), Error> {
        if let Some(ref job_id) = self.job_id {
            let _ = ProcessCommand::new("bkill").arg(job_id).output();
        }
        Ok(())
    }

    fn remove_temporary_files(&mut self) {}

    fn batch_cancel_id(&self) -> Option<(Backend, String)> {
        self.job_id.clone().map(|id| (Backend::Lsf, id))
    }
}

/// Parses the job id out of bsub's `Job <12345> is submitted...` message.
fn parse_bsub_job_id(stdout: &str) -> Option<String> {
    let start = stdout.find('<')?;
    let end = stdout[start..].find('>')? + start;
    Some(stdout[start + 1..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_id_from_bsub_output() {
        let id = parse_bsub_job_id("Job <98765> is submitted to queue <normal>.\n");
        assert_eq!(id.as_deref(), Some("98765"));
    }

    #[test]
    fn missing_job_id_returns_none() {
        assert_eq!(parse_bsub_job_id("not a bsub message"), None);
    }
}
