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

//! Builds a `QGraph` from rules for the `graph` subcommand and writes it
//! out as GraphViz DOT, either as declared (`--dot`) or after the
//! scatter/gather rewrite (`--expanded-dot`).

use std::io;

use crate::error::Error;
use crate::qgraph::QGraph;
use crate::rules::Rules;

/// Builds the graph from `rules`, running the same fill-in/prune/validate
/// pass the scheduler does before a real run. When `expanded` is set, the
/// scatter/gather rewrite also runs, showing the subgraph that will
/// actually be scheduled rather than the declared one.
pub fn build_graph(rules: Rules, expanded: bool) -> Result<QGraph, Error> {
    let mut graph = QGraph::new();

    for function in rules.into_functions()? {
        graph.add(function)?;
    }

    graph.fill_in();
    graph.prune();
    graph.validate()?;

    if expanded {
        graph.rewrite_scatter_gather()?;
    }

    Ok(graph)
}

/// Writes `graph` as a GraphViz DOT document.
pub fn write(graph: &QGraph, out: &mut dyn io::Write) -> io::Result<()> {
    graph.graphviz(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_renders_a_simple_graph() {
        let data = r#"[{
            "inputs": [],
            "outputs": ["a.txt"],
            "analysis_name": "touch",
            "command": { "program": "touch", "args": ["a.txt"] }
        }]"#;

        let rules = Rules::from_str(data).unwrap();
        let graph = build_graph(rules, false).unwrap();

        let mut buf = Vec::new();
        write(&graph, &mut buf).unwrap();

        let dot = String::from_utf8(buf).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("touch"));
    }
}
