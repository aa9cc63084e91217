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

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command as ProcessCommand, Stdio};

use log::debug;

use crate::error::{Error, ErrorKind, ResultExt};
use crate::function::{Command, Status};

use super::JobRunner;

/// Spawns a single process locally and polls it for completion, the same
/// way command-line tasks are spawned elsewhere in this codebase.
/// stdout/stderr are redirected to the function's job-output/job-error
/// files when set.
#[derive(Debug)]
pub struct ShellJobRunner {
    command: Command,
    job_output_file: Option<PathBuf>,
    job_error_file: Option<PathBuf>,
    child: Option<Child>,
    status: Status,
}

impl ShellJobRunner {
    pub fn new(
        command: Command,
        job_output_file: Option<PathBuf>,
        job_error_file: Option<PathBuf>,
    ) -> Self {
        ShellJobRunner {
            command,
            job_output_file,
            job_error_file,
            child: None,
            status: Status::Pending,
        }
    }
}

impl JobRunner for ShellJobRunner {
    fn start(&mut self) -> Result<(), Error> {
        debug!("shell: spawning `{}`", self.command);

        let mut cmd = ProcessCommand::new(&self.command.program);
        cmd.args(&self.command.args);
        cmd.stdin(Stdio::null());

        if let Some(ref cwd) = self.command.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(ref env) = self.command.env {
            cmd.envs(env);
        }

        if let Some(ref path) = self.job_output_file {
            cmd.stdout(fs::File::create(path).context(ErrorKind::Io)?);
        } else {
            cmd.stdout(Stdio::null());
        }

        if let Some(ref path) = self.job_error_file {
            cmd.stderr(fs::File::create(path).context(ErrorKind::Io)?);
        } else {
            cmd.stderr(Stdio::null());
        }

        let child = cmd.spawn().context(ErrorKind::Job)?;

        self.child = Some(child);
        self.status = Status::Running;

        Ok(())
    }

    fn status(&mut self) -> Status {
        if self.status != Status::Running {
            return self.status;
        }

        let child = match &mut self.child {
            Some(child) => child,
            None => return self.status,
        };

        match child.try_wait() {
            Ok(Some(exit)) => {
                self.status = if exit.success() {
                    Status::Done
                } else {
                    Status::Failed
                };
            }
            Ok(None) => {
                // Still running.
            }
            Err(_) => {
                self.status = Status::Failed;
            }
        }

        self.status
    }

    fn try_stop(&mut self) -> Result<(), Error> {
        if let Some(child) = &mut self.child {
            let _ = child.kill();
        }
        Ok(())
    }

    fn remove_temporary_files(&mut self) {}
}
