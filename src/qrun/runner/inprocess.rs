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

use std::sync::Arc;

use log::error;

use crate::error::Error;
use crate::function::{InProcessJob, Status};

use super::JobRunner;

/// Runs an in-process job to completion synchronously inside `start()`.
/// The scheduling loop never sees this runner in a RUNNING state.
#[derive(Debug)]
pub struct InProcessRunner {
    job: Arc<dyn InProcessJob>,
    status: Status,
}

impl InProcessRunner {
    pub fn new(job: Arc<dyn InProcessJob>) -> Self {
        InProcessRunner {
            job,
            status: Status::Pending,
        }
    }
}

impl JobRunner for InProcessRunner {
    fn start(&mut self) -> Result<(), Error> {
        self.status = match self.job.run() {
            Ok(()) => Status::Done,
            Err(err) => {
                error!("in-process job failed: {}", err);
                Status::Failed
            }
        };

        Ok(())
    }

    fn status(&mut self) -> Status {
        self.status
    }

    fn try_stop(&mut self) -> Result<(), Error> {
        // Already ran to completion by the time `start()` returns.
        Ok(())
    }

    fn remove_temporary_files(&mut self) {}
}
