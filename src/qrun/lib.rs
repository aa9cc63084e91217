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

//! `qrun` composes declared functions (command lines or in-process jobs,
//! each with explicit inputs and outputs) into a dependency graph, and
//! drives the graph to completion against a pluggable batch backend.

pub mod dot;
pub mod error;
pub mod function;
pub mod graph;
pub mod node;
pub mod notify;
pub mod qgraph;
pub mod rules;
pub mod runner;
pub mod schedule;
pub mod status;
pub mod util;

pub use crate::error::{Error, ErrorKind, ResultExt};
pub use crate::function::{
    AddOrder, Command, GeneratedRole, InProcessJob, Kind, QFunction, ScatterGather, Status,
};
pub use crate::node::QNode;
pub use crate::qgraph::QGraph;
pub use crate::rules::Rules;
pub use crate::schedule::{Scheduler, SchedulerOptions};
