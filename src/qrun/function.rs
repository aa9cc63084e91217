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

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Error;
use crate::node::QNode;
use crate::util::Fingerprint;

/// Declaration-order tuple used to deterministically break ties between
/// functions that become ready at the same time.
///
/// Comparison is lexicographic; a shorter prefix sorts before a longer one
/// that extends it, which is exactly what's needed when scatter/gather
/// generates children that extend their parent's order.
#[derive(Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Default)]
pub struct AddOrder(Vec<u64>);

impl AddOrder {
    pub fn new(n: u64) -> Self {
        AddOrder(vec![n])
    }

    /// Extends this order with a child index, for functions generated by
    /// the scatter/gather rewriter.
    pub fn child(&self, n: u64) -> Self {
        let mut v = self.0.clone();
        v.push(n);
        AddOrder(v)
    }
}

impl fmt::Display for AddOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Runtime status of a function edge. Transitions are monotone within a
/// single run: `Pending -> (Running | Skipped) -> (Done | Failed)`.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Status {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Done => "DONE",
            Status::Failed => "FAILED",
            Status::Skipped => "SKIPPED",
        };
        write!(f, "{}", s)
    }
}

/// Tags applied by the scatter/gather rewriter to the functions it
/// generates, so the status aggregator can count shards and gathers
/// separately from ordinary work.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum GeneratedRole {
    Clone,
    Gather,
}

/// An in-process computation driven directly by this binary instead of an
/// external batch backend.
pub trait InProcessJob: fmt::Debug + Send + Sync {
    fn run(&self) -> Result<(), Error>;
}

/// A function that can rewrite itself into a scatter/gather subgraph: N
/// parallel shards (clones of the original, narrowed to one piece of
/// input each) plus a final function that gathers their outputs.
pub trait ScatterGather: fmt::Debug + Send + Sync {
    fn scatter_gatherable(&self) -> bool;

    /// Produces the replacement functions. The base function passed in is
    /// frozen and has already been validated; the returned functions
    /// inherit its `analysis_name` and extend its `add_order`.
    fn generate_functions(&self, base: &QFunction) -> Vec<QFunction>;
}

/// A single external process to spawn, modeled the same way command-line
/// tasks are modeled elsewhere in this codebase: a program, its
/// arguments, an optional working directory, and optional environment
/// overrides.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Command {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Option<BTreeMap<String, String>>,
}

impl Command {
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        Command {
            program: program.into(),
            args,
            cwd: None,
            env: None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The underlying kind of work a function performs.
#[derive(Clone)]
pub enum Kind {
    CommandLine(Command),
    InProcess(Arc<dyn InProcessJob>),
    ScatterGatherable(Arc<dyn ScatterGather>),
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::CommandLine(c) => write!(f, "CommandLine({})", c),
            Kind::InProcess(j) => write!(f, "InProcess({:?})", j),
            Kind::ScatterGatherable(s) => write!(f, "ScatterGatherable({:?})", s),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::CommandLine(c) => write!(f, "{}", c),
            Kind::InProcess(j) => write!(f, "{:?}", j),
            Kind::ScatterGatherable(s) => write!(f, "{:?}", s),
        }
    }
}

/// A frozen, validated description of a unit of work.
///
/// `QFunction`s are built up by the rules loader (or, in production, the
/// out-of-scope pipelining DSL) and handed to the graph builder via
/// `QGraph::add`. Once frozen, a function's inputs and outputs — and
/// therefore its position in the graph — never change.
#[derive(Clone)]
pub struct QFunction {
    pub inputs: QNode,
    pub outputs: QNode,
    pub description: Option<String>,
    pub analysis_name: String,
    pub add_order: AddOrder,
    pub is_intermediate: bool,
    pub kind: Kind,
    pub generated_role: Option<GeneratedRole>,
    pub job_output_file: Option<PathBuf>,
    pub job_error_file: Option<PathBuf>,
    frozen: bool,
}

impl QFunction {
    pub fn new(
        inputs: QNode,
        outputs: QNode,
        analysis_name: impl Into<String>,
        add_order: AddOrder,
        is_intermediate: bool,
        kind: Kind,
    ) -> Self {
        QFunction {
            inputs,
            outputs,
            description: None,
            analysis_name: analysis_name.into(),
            add_order,
            is_intermediate,
            kind,
            generated_role: None,
            job_output_file: None,
            job_error_file: None,
            frozen: false,
        }
    }

    /// Required arguments still unbound. A nonzero count means this
    /// function cannot be dispatched; the caller treats this as
    /// dry-run-only.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();

        if self.analysis_name.trim().is_empty() {
            missing.push("analysis_name");
        }

        if let Kind::CommandLine(ref cmd) = self.kind {
            if cmd.program.as_os_str().is_empty() {
                missing.push("command.program");
            }
        }

        if self.outputs.is_empty() {
            missing.push("outputs");
        }

        missing
    }

    /// Irreversibly resolves dynamic fields. Once frozen, the function's
    /// graph position (its input/output node identity) is stable.
    pub fn freeze(&mut self) -> Result<(), Error> {
        self.frozen = true;
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn scatter_gatherable(&self) -> bool {
        match &self.kind {
            Kind::ScatterGatherable(s) => s.scatter_gatherable(),
            _ => false,
        }
    }

    pub fn generate_functions(&self) -> Vec<QFunction> {
        match &self.kind {
            Kind::ScatterGatherable(s) => s.generate_functions(self),
            _ => Vec::new(),
        }
    }

    /// The function's own judgment of whether its outputs already exist.
    /// Used by the restart-analysis pass (`qgraph::classify_restart`) as
    /// ground truth; the graph itself never second-guesses this.
    ///
    /// Without a persisted database there's nothing to compare a content
    /// fingerprint against, but computing one still catches a truncated
    /// or unreadable output that `is_file()` alone would call DONE.
    pub fn is_done(&self) -> bool {
        if self.outputs.is_empty() {
            return false;
        }

        self.outputs
            .files()
            .iter()
            .all(|p| Fingerprint::from_path(p).is_ok())
    }
}

impl fmt::Debug for QFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QFunction")
            .field("analysis_name", &self.analysis_name)
            .field("add_order", &self.add_order.to_string())
            .field("inputs", &self.inputs.to_string())
            .field("outputs", &self.outputs.to_string())
            .field("is_intermediate", &self.is_intermediate)
            .finish()
    }
}

impl fmt::Display for QFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref d) = self.description {
            write!(f, "{}", d)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd_function(name: &str, inputs: &[&str], outputs: &[&str]) -> QFunction {
        QFunction::new(
            QNode::new(inputs.to_vec()),
            QNode::new(outputs.to_vec()),
            name,
            AddOrder::new(0),
            false,
            Kind::CommandLine(Command::new("cp", vec![])),
        )
    }

    #[test]
    fn missing_fields_flags_empty_program() {
        let f = QFunction::new(
            QNode::empty(),
            QNode::new(vec!["out.txt"]),
            "x",
            AddOrder::new(0),
            false,
            Kind::CommandLine(Command::new("", vec![])),
        );
        assert!(f.missing_fields().contains(&"command.program"));
    }

    #[test]
    fn missing_fields_flags_empty_outputs() {
        let f = cmd_function("x", &["a.txt"], &[]);
        assert!(f.missing_fields().contains(&"outputs"));
    }

    #[test]
    fn add_order_child_extends_and_sorts_after_parent() {
        let parent = AddOrder::new(3);
        let child = parent.child(0);
        assert!(parent < child);
    }

    #[test]
    fn add_order_shorter_prefix_sorts_first() {
        let a = AddOrder::new(1);
        let b = a.child(0);
        assert!(a < b);
    }
}
