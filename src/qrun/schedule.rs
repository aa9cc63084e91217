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

//! The single-threaded cooperative scheduling loop. Concurrency comes
//! from the external batch backends, not from worker threads walking the
//! graph; this loop only ever blocks in the polling sleep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{Error, ErrorKind};
use crate::function::Status;
use crate::graph::EdgeIndex;
use crate::notify::{FailureReport, Notifier, Summary};
use crate::qgraph::QGraph;
use crate::runner::{cancel_batch, new_runner, Backend, JobRunner, RunnerConfig};

#[derive(Clone, Debug)]
pub struct SchedulerOptions {
    pub start_clean: bool,
    pub scatter_gather: bool,
    pub runner_config: RunnerConfig,
    pub poll_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            start_clean: false,
            scatter_gather: false,
            runner_config: RunnerConfig::default(),
            poll_interval: Duration::from_secs(30),
        }
    }
}

type RunningJobs = Arc<Mutex<HashMap<EdgeIndex, Box<dyn JobRunner>>>>;

/// Drives a `QGraph` to completion. Owns the shutdown-hook registry so
/// that a Ctrl-C handler installed on a separate thread can reach every
/// in-flight job and cancel it.
pub struct Scheduler {
    options: SchedulerOptions,
    shutting_down: Arc<AtomicBool>,
    running: RunningJobs,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Scheduler {
            options,
            shutting_down: Arc::new(AtomicBool::new(false)),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Installs the Ctrl-C shutdown hook. All errors along this path are
    /// logged and swallowed; the hook must never propagate or panic.
    pub fn install_shutdown_hook(&self) {
        let shutting_down = self.shutting_down.clone();
        let running = self.running.clone();

        let result = ctrlc::set_handler(move || {
            info!(
                "shutdown requested; finishing current tick and cancelling in-flight jobs"
            );
            shutting_down.store(true, Ordering::SeqCst);

            if let Ok(mut running) = running.lock() {
                let mut batched: HashMap<Backend, Vec<String>> = HashMap::new();

                for runner in running.values_mut() {
                    match runner.batch_cancel_id() {
                        Some((backend, id)) => {
                            batched.entry(backend).or_insert_with(Vec::new).push(id);
                        }
                        None => {
                            if let Err(err) = runner.try_stop() {
                                error!("shutdown: failed to cancel job: {}", err);
                            }
                        }
                    }
                    runner.remove_temporary_files();
                }

                for (backend, ids) in batched {
                    debug!(
                        "shutdown: cancelling {} job(s) on {:?} in batches of 10",
                        ids.len(),
                        backend
                    );
                    cancel_batch(backend, &ids);
                }
            }
        });

        if let Err(err) = result {
            warn!("failed to install shutdown hook: {}", err);
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Runs `graph` to completion: validate, optionally rewrite for
    /// scatter/gather, classify restart state, then repeatedly dispatch
    /// ready work until nothing is ready and nothing is running.
    pub fn run(&self, graph: &mut QGraph, notifier: &dyn Notifier) -> Result<(), Error> {
        info!("validate: checking graph for missing fields and cycles");
        let missing = graph.validate()?;
        if missing > 0 {
            warn!("{} missing required field(s); dry run only", missing);
            return Ok(());
        }

        if self.options.scatter_gather {
            info!("rewrite: scatter/gather pass");
            graph.rewrite_scatter_gather()?;
        }

        info!("schedule: classifying restart state");
        graph.classify_restart(self.options.start_clean);

        let result = self.drive(graph, notifier);

        match &result {
            Ok(()) => {
                let summary = Summary::from_graph(graph);
                notifier.notify_summary(&summary);
            }
            Err(err) => {
                error!("scheduler error: {}", err);
                let summary = Summary::from_graph(graph);
                notifier.notify_summary(&summary);
            }
        }

        result
    }

    fn drive(&self, graph: &mut QGraph, notifier: &dyn Notifier) -> Result<(), Error> {
        loop {
            if self.is_shutting_down() {
                info!("shutdown: exiting scheduling loop after current tick");
                return Ok(());
            }

            let ready = graph.ready();
            let running_count = self.running.lock().unwrap().len();

            if ready.is_empty() && running_count == 0 {
                break;
            }

            let mut just_failed = self.reap_exited(graph);

            self.dispatch_ready(graph, ready, &mut just_failed);

            if !just_failed.is_empty() {
                notifier.notify_failure(&just_failed);
            }

            let idle = graph.ready().is_empty();
            let running_count = self.running.lock().unwrap().len();

            if idle && running_count > 0 {
                debug!(
                    "schedule: idle, sleeping {:?} with {} job(s) running",
                    self.options.poll_interval, running_count
                );
                thread::sleep(self.options.poll_interval);
            }
        }

        let failed = graph
            .function_edges()
            .filter(|&e| graph.status_of(e) == Some(Status::Failed))
            .count();

        if failed > 0 {
            Err(ErrorKind::Job.into())
        } else {
            Ok(())
        }
    }

    /// Partitions the running set by current status, folding DONE/FAILED
    /// verdicts back onto the graph and dropping them from `running`.
    /// Reaped failures are returned as `FailureReport`s so the caller can
    /// feed them to `notifier.notify_failure` the same way a failure
    /// caught at dispatch time is: an async backend only ever reveals
    /// FAILED here, via polling, never from `start()`.
    fn reap_exited(&self, graph: &mut QGraph) -> Vec<FailureReport> {
        let mut exited = Vec::new();

        {
            let mut running = self.running.lock().unwrap();
            for (&edge, runner) in running.iter_mut() {
                match runner.status() {
                    Status::Done => exited.push((edge, Status::Done)),
                    Status::Failed => exited.push((edge, Status::Failed)),
                    _ => {}
                }
            }

            for (edge, _) in &exited {
                running.remove(edge);
            }
        }

        let mut just_failed = Vec::new();

        for (edge, status) in exited {
            debug!("reaped edge with final status {}", status);

            if status == Status::Failed {
                if let Some(function) = graph.function_of(edge) {
                    just_failed.push(FailureReport::new(function, "job failed".to_string()));
                }
            }

            graph.set_status(edge, status);
        }

        just_failed
    }

    fn dispatch_ready(
        &self,
        graph: &mut QGraph,
        ready: Vec<EdgeIndex>,
        just_failed: &mut Vec<FailureReport>,
    ) {
        for edge in ready {
            let function = match graph.function_of(edge) {
                Some(f) => f.clone(),
                None => continue,
            };

            let mut runner = new_runner(&function, &self.options.runner_config);

            debug!("dispatch: {} ({})", function, function.analysis_name);

            if let Err(err) = runner.start() {
                error!("job failed to start: {}", err);
                graph.set_status(edge, Status::Failed);
                just_failed.push(FailureReport::new(&function, err.to_string()));
                continue;
            }

            match runner.status() {
                Status::Done => graph.set_status(edge, Status::Done),
                Status::Failed => {
                    graph.set_status(edge, Status::Failed);
                    just_failed.push(FailureReport::new(&function, "job failed".to_string()));
                }
                _ => {
                    graph.set_status(edge, Status::Running);
                    self.running.lock().unwrap().insert(edge, runner);
                }
            }
        }
    }
}
