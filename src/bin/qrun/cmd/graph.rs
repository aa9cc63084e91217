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
use std::io::{self, Write};
use std::path::PathBuf;

use structopt::StructOpt;

use qrun::{dot, Error, Rules};

use crate::opts::GlobalOpts;

#[derive(StructOpt, Debug)]
pub struct Graph {
    /// Path to the JSON pipeline description.
    #[structopt(long = "rules", short = "r", parse(from_os_str))]
    rules: PathBuf,

    /// Path to the output file. If not specified, writes to standard
    /// output.
    #[structopt(long = "output", short = "o", parse(from_os_str))]
    output: Option<PathBuf>,

    /// Shows the post-rewrite graph: scatter-gatherable functions
    /// replaced by their generated shards and gather step.
    #[structopt(long = "expanded-dot")]
    expanded: bool,
}

impl Graph {
    pub fn main(self, _global: &GlobalOpts) -> Result<(), Error> {
        let rules = Rules::from_path(&self.rules)?;
        let graph = dot::build_graph(rules, self.expanded)?;

        if let Some(ref output) = self.output {
            let mut stream = io::BufWriter::new(fs::File::create(output)?);
            dot::write(&graph, &mut stream)?;
            stream.flush()?;
        } else {
            let mut stdout = io::stdout();
            let mut lock = stdout.lock();
            dot::write(&graph, &mut lock)?;
            lock.flush()?;
        }

        Ok(())
    }
}
