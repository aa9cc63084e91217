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

//! The status-email layer is out of scope for this crate; this module
//! specifies the contract a real mailer would implement and ships a
//! logging-backed default.

use std::fmt;
use std::path::PathBuf;

use log::{error, info};

use crate::function::{QFunction, Status};
use crate::qgraph::QGraph;

#[derive(Clone, Debug)]
pub struct FailureReport {
    pub analysis_name: String,
    pub description: String,
    pub reason: String,
    pub job_output_file: Option<PathBuf>,
    pub job_error_file: Option<PathBuf>,
}

impl FailureReport {
    pub fn new(function: &QFunction, reason: String) -> Self {
        FailureReport {
            analysis_name: function.analysis_name.clone(),
            description: function.to_string(),
            reason,
            job_output_file: function.job_output_file.clone(),
            job_error_file: function.job_error_file.clone(),
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.analysis_name, self.description, self.reason)?;

        if let Some(ref path) = self.job_output_file {
            write!(f, " [stdout: {}]", path.display())?;
        }

        if let Some(ref path) = self.job_error_file {
            write!(f, " [stderr: {}]", path.display())?;
        }

        Ok(())
    }
}

/// A one-line-per-group count, the same shape the status aggregator
/// renders to the console.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_graph(graph: &QGraph) -> Self {
        let mut summary = Summary::default();

        for edge in graph.function_edges() {
            summary.total += 1;
            match graph.status_of(edge) {
                Some(Status::Done) => summary.done += 1,
                Some(Status::Failed) => summary.failed += 1,
                Some(Status::Skipped) => summary.skipped += 1,
                _ => {}
            }
        }

        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} done, {} failed, {} skipped",
            self.total, self.done, self.failed, self.skipped
        )
    }
}

/// Contract for the out-of-scope status-email layer.
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, failures: &[FailureReport]);
    fn notify_summary(&self, summary: &Summary);
}

/// Default `Notifier` that writes through the `log` facade instead of
/// sending mail. A production deployment plugs in a real SMTP client
/// behind the same trait.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, failures: &[FailureReport]) {
        for failure in failures {
            error!("job failed: {}", failure);
        }
    }

    fn notify_summary(&self, summary: &Summary) {
        info!("run summary: {}", summary);
    }
}
