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

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::warn;
use structopt::StructOpt;

use qrun::runner::{Backend, RunnerConfig};
use qrun::{status, Error, Rules, Scheduler, SchedulerOptions};

use crate::opts::GlobalOpts;

#[derive(StructOpt, Debug)]
pub struct Run {
    /// Path to the JSON pipeline description.
    #[structopt(long = "rules", short = "r", parse(from_os_str))]
    rules: PathBuf,

    /// Forces every function to PENDING, ignoring output files that
    /// already exist.
    #[structopt(long = "start-from-scratch")]
    start_from_scratch: bool,

    /// Which batch backend to dispatch command-line functions to.
    #[structopt(
        long = "job-runner",
        possible_values = &["shell", "lsf", "drmaa"],
        default_value = "shell"
    )]
    job_runner: Backend,

    /// Shorthand for `--job-runner lsf`.
    #[structopt(long = "bsub")]
    bsub: bool,

    /// Batch queue name, passed through to the LSF/DRMAA runner.
    #[structopt(long = "job-queue")]
    job_queue: Option<String>,

    /// Scratch directory for runner-managed temporary files.
    #[structopt(long = "temp-dir", parse(from_os_str))]
    temp_dir: Option<PathBuf>,

    /// Working directory to run from. Defaults to the current directory.
    #[structopt(long = "run-dir", parse(from_os_str))]
    run_dir: Option<PathBuf>,

    /// Recipients for the end-of-run status notification.
    #[structopt(long = "status-email-to")]
    status_email_to: Vec<String>,

    /// Sender address for the end-of-run status notification.
    #[structopt(long = "status-email-from")]
    status_email_from: Option<String>,

    /// Rewrites scatter-gatherable functions into their parallel subgraph
    /// before scheduling.
    #[structopt(long = "scatter-gather")]
    scatter_gather: bool,

    /// Overrides the default 30-second polling interval. Mainly a
    /// test/tuning hook.
    #[structopt(long = "poll-interval-secs")]
    poll_interval_secs: Option<u64>,
}

impl Run {
    pub fn main(self, _global: &GlobalOpts) -> Result<(), Error> {
        if let Some(ref run_dir) = self.run_dir {
            env::set_current_dir(run_dir)?;
        }

        if !self.status_email_to.is_empty() || self.status_email_from.is_some() {
            warn!(
                "status-email delivery is not implemented in this build; \
                 the summary will be logged instead"
            );
        }

        let rules = Rules::from_path(&self.rules)?;

        let mut graph = qrun::QGraph::new();
        for function in rules.into_functions()? {
            graph.add(function)?;
        }
        graph.fill_in();
        graph.prune();

        let job_runner = if self.bsub { Backend::Lsf } else { self.job_runner };

        let options = SchedulerOptions {
            start_clean: self.start_from_scratch,
            scatter_gather: self.scatter_gather,
            runner_config: RunnerConfig {
                backend: Some(job_runner),
                job_queue: self.job_queue,
                temp_dir: self.temp_dir,
            },
            poll_interval: self
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(30)),
        };

        let scheduler = Scheduler::new(options);
        scheduler.install_shutdown_hook();

        let notifier = qrun::notify::LogNotifier::default();

        let start = Instant::now();
        let result = scheduler.run(&mut graph, &notifier);

        status::print_finished(&status::aggregate(&graph), start.elapsed());

        result
    }
}
