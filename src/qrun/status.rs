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

//! Groups function edges by `analysis_name` for console/email status
//! display, the way the rest of this codebase renders colored task
//! summaries to a terminal.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use termcolor::{Color, ColorSpec, WriteColor};

use crate::function::{GeneratedRole, Status};
use crate::qgraph::QGraph;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Counts {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Counts {
    fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Done => self.done += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
            Status::Pending | Status::Running => {}
        }
    }

    fn add(&self, other: &Counts) -> Counts {
        Counts {
            total: self.total + other.total,
            done: self.done + other.done,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OverallStatus {
    Failed,
    Done,
    Skipped,
    Running,
    Pending,
}

impl OverallStatus {
    pub fn label(self) -> &'static str {
        match self {
            OverallStatus::Failed => "FAILED",
            OverallStatus::Done => "DONE",
            OverallStatus::Skipped => "SKIPPED",
            OverallStatus::Running => "RUNNING",
            OverallStatus::Pending => "PENDING",
        }
    }

    pub fn color(self) -> Color {
        match self {
            OverallStatus::Failed => Color::Red,
            OverallStatus::Done => Color::Green,
            OverallStatus::Skipped => Color::Blue,
            OverallStatus::Running => Color::Yellow,
            OverallStatus::Pending => Color::White,
        }
    }
}

/// Per-`analysis_name` status summary: ordinary edges, scatter clones,
/// and the gather step tracked separately so the fan-out can be reported
/// without polluting the plain counts.
#[derive(Clone, Debug)]
pub struct Group {
    pub analysis_name: String,
    pub plain: Counts,
    pub scatter: Counts,
    pub gather: Counts,
}

impl Group {
    fn new(analysis_name: String) -> Self {
        Group {
            analysis_name,
            plain: Counts::default(),
            scatter: Counts::default(),
            gather: Counts::default(),
        }
    }

    fn combined(&self) -> Counts {
        self.plain.add(&self.scatter).add(&self.gather)
    }

    pub fn overall_status(&self) -> OverallStatus {
        let c = self.combined();

        if c.failed > 0 {
            OverallStatus::Failed
        } else if c.total > 0 && c.done == c.total {
            OverallStatus::Done
        } else if c.total > 0 && c.done + c.skipped == c.total {
            OverallStatus::Skipped
        } else if c.done > 0 {
            OverallStatus::Running
        } else {
            OverallStatus::Pending
        }
    }
}

/// Groups every function edge in `graph` by `analysis_name`, preserving
/// first-seen order.
pub fn aggregate(graph: &QGraph) -> Vec<Group> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();

    for edge in graph.function_edges() {
        let function = match graph.function_of(edge) {
            Some(f) => f,
            None => continue,
        };
        let status = match graph.status_of(edge) {
            Some(s) => s,
            None => continue,
        };

        let group = groups
            .entry(function.analysis_name.clone())
            .or_insert_with(|| {
                order.push(function.analysis_name.clone());
                Group::new(function.analysis_name.clone())
            });

        match function.generated_role {
            Some(GeneratedRole::Clone) => group.scatter.record(status),
            Some(GeneratedRole::Gather) => group.gather.record(status),
            None => group.plain.record(status),
        }
    }

    order
        .into_iter()
        .map(|name| groups.remove(&name).unwrap())
        .collect()
}

fn fan_out_suffix(prefix: &str, counts: &Counts) -> Option<String> {
    if counts.total > 1 {
        Some(format!(
            "{}:{}t/{}d/{}f",
            prefix, counts.total, counts.done, counts.failed
        ))
    } else {
        None
    }
}

/// Renders one plain-text line per group: the name padded to the widest
/// name in the set, a centered 7-character status, and optional
/// scatter/gather fan-out suffixes.
pub fn render_lines(groups: &[Group]) -> Vec<String> {
    let width = groups
        .iter()
        .map(|g| g.analysis_name.len())
        .max()
        .unwrap_or(0);

    groups
        .iter()
        .map(|group| {
            let status = group.overall_status();
            let mut line = format!(
                "{:<width$}  {:^7}",
                group.analysis_name,
                status.label(),
                width = width
            );

            if let Some(suffix) = fan_out_suffix("s", &group.scatter) {
                line.push_str("  ");
                line.push_str(&suffix);
            }

            if let Some(suffix) = fan_out_suffix("g", &group.gather) {
                line.push_str("  ");
                line.push_str(&suffix);
            }

            line
        })
        .collect()
}

/// Writes the same lines `render_lines` produces, colored by overall
/// status, to a `termcolor` stream.
pub fn write_console(groups: &[Group], out: &mut dyn WriteColor) -> io::Result<()> {
    let width = groups
        .iter()
        .map(|g| g.analysis_name.len())
        .max()
        .unwrap_or(0);

    for group in groups {
        let status = group.overall_status();

        write!(out, "{:<width$}  ", group.analysis_name, width = width)?;

        out.set_color(ColorSpec::new().set_fg(Some(status.color())).set_bold(true))?;
        write!(out, "{:^7}", status.label())?;
        out.reset()?;

        if let Some(suffix) = fan_out_suffix("s", &group.scatter) {
            write!(out, "  {}", suffix)?;
        }

        if let Some(suffix) = fan_out_suffix("g", &group.gather) {
            write!(out, "  {}", suffix)?;
        }

        writeln!(out)?;
    }

    Ok(())
}

/// Renders one finished spinner per group, the way `button`'s console
/// logger finishes each task's progress bar in place once the build
/// stops, then logs the total elapsed time with `humantime`.
///
/// This scheduler is single-threaded and cooperative, so there is no
/// multi-worker `MultiProgress` dashboard to drive during the run
/// itself; the bars are rendered once, already finished, as the
/// closing status report.
pub fn print_finished(groups: &[Group], elapsed: Duration) {
    let width = groups
        .iter()
        .map(|g| g.analysis_name.len())
        .max()
        .unwrap_or(0);

    let style = ProgressStyle::default_spinner().template("{prefix} {msg}");

    for group in groups {
        let pb = ProgressBar::new_spinner();
        pb.set_style(style.clone());
        pb.set_prefix(&format!("{:<width$}", group.analysis_name, width = width));
        pb.finish_with_message(group.overall_status().label());
    }

    eprintln!("finished in {}", humantime::format_duration(elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{AddOrder, Command, Kind, QFunction};
    use crate::node::QNode;
    use crate::qgraph::QGraph;

    #[test]
    fn overall_status_any_failed_wins() {
        let mut g = Counts::default();
        g.total = 3;
        g.done = 1;
        g.failed = 1;

        let group = Group {
            analysis_name: "x".into(),
            plain: g,
            scatter: Counts::default(),
            gather: Counts::default(),
        };

        assert_eq!(group.overall_status(), OverallStatus::Failed);
    }

    #[test]
    fn aggregate_groups_by_analysis_name() {
        let mut graph = QGraph::new();
        let f1 = QFunction::new(
            QNode::empty(),
            QNode::single("a"),
            "convert",
            AddOrder::new(0),
            false,
            Kind::CommandLine(Command::new("true", vec![])),
        );
        let f2 = QFunction::new(
            QNode::single("a"),
            QNode::single("b"),
            "convert",
            AddOrder::new(1),
            false,
            Kind::CommandLine(Command::new("true", vec![])),
        );
        graph.add(f1).unwrap();
        graph.add(f2).unwrap();

        let groups = aggregate(&graph);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].plain.total, 2);
    }
}
