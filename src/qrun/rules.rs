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

//! A literal, restricted JSON stand-in for the out-of-scope pipelining
//! DSL: a flat list of function declarations, loaded in file order and
//! handed straight to the graph builder. No templating, no conditionals,
//! no scatter expressions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, ResultExt};
use crate::function::{AddOrder, Command, GeneratedRole, Kind, QFunction, ScatterGather};
use crate::node::QNode;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CommandDecl {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl From<CommandDecl> for Command {
    fn from(decl: CommandDecl) -> Command {
        Command::new(decl.program, decl.args)
    }
}

/// Declares a function that rewrites itself into `shards` parallel
/// clones plus a gather step, for exercising the scatter/gather rewriter
/// without a full pipelining DSL.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScatterGatherDecl {
    pub shards: usize,
    pub shard_command: CommandDecl,
    pub gather_command: CommandDecl,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleDecl {
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
    pub analysis_name: String,
    #[serde(default)]
    pub is_intermediate: bool,
    #[serde(default)]
    pub command: Option<CommandDecl>,
    #[serde(default)]
    pub scatter_gather: Option<ScatterGatherDecl>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Rules {
    pub rules: Vec<RuleDecl>,
}

impl Rules {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Rules, Error> {
        let f = fs::File::open(path).context(ErrorKind::Rules)?;
        Self::from_reader(io::BufReader::new(f))
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Rules, Error> {
        let rules: Vec<RuleDecl> =
            serde_json::from_reader(reader).context(ErrorKind::Rules)?;
        Ok(Rules { rules })
    }

    pub fn from_str(s: &str) -> Result<Rules, Error> {
        let rules: Vec<RuleDecl> = serde_json::from_str(s).context(ErrorKind::Rules)?;
        Ok(Rules { rules })
    }

    /// Builds one `QFunction` per declaration, in file order, assigning
    /// `add_order` as the declaration index. `missing_fields` is left to
    /// each `QFunction` itself; this only rejects a declaration with
    /// neither a `command` nor a `scatter_gather` task.
    pub fn into_functions(self) -> Result<Vec<QFunction>, Error> {
        self.rules
            .into_iter()
            .enumerate()
            .map(|(i, decl)| decl_to_function(decl, i as u64))
            .collect()
    }
}

fn decl_to_function(decl: RuleDecl, order: u64) -> Result<QFunction, Error> {
    let kind = match (decl.command, decl.scatter_gather) {
        (Some(command), None) => Kind::CommandLine(command.into()),
        (None, Some(sg)) => Kind::ScatterGatherable(std::sync::Arc::new(
            FixedShardScatterGather {
                shards: sg.shards,
                shard_command: sg.shard_command.into(),
                gather_command: sg.gather_command.into(),
            },
        )),
        _ => return Err(ErrorKind::Rules.into()),
    };

    Ok(QFunction::new(
        QNode::new(decl.inputs),
        QNode::new(decl.outputs),
        decl.analysis_name,
        AddOrder::new(order),
        decl.is_intermediate,
        kind,
    ))
}

/// Splits a function's inputs round-robin across a fixed number of
/// shards, each shard writing to a `.shard<N>` sibling of the base
/// function's (first) output, and gathers them back into the base
/// function's real outputs.
#[derive(Debug)]
struct FixedShardScatterGather {
    shards: usize,
    shard_command: Command,
    gather_command: Command,
}

fn shard_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".shard{}", index));
    path.with_file_name(name)
}

impl ScatterGather for FixedShardScatterGather {
    fn scatter_gatherable(&self) -> bool {
        self.shards > 1
    }

    fn generate_functions(&self, base: &QFunction) -> Vec<QFunction> {
        let shards = self.shards.max(1);
        let mut shard_inputs: Vec<Vec<PathBuf>> = vec![Vec::new(); shards];

        for (i, path) in base.inputs.files().iter().enumerate() {
            shard_inputs[i % shards].push(path.clone());
        }

        let base_output = base
            .outputs
            .files()
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("output"));

        let mut generated = Vec::with_capacity(shards + 1);
        let mut shard_outputs = Vec::with_capacity(shards);

        for (i, files) in shard_inputs.into_iter().enumerate() {
            let output = shard_path(&base_output, i);
            shard_outputs.push(output.clone());

            let mut shard = QFunction::new(
                QNode::new(files),
                QNode::single(output),
                base.analysis_name.clone(),
                base.add_order.child(i as u64),
                false,
                Kind::CommandLine(self.shard_command.clone()),
            );
            shard.generated_role = Some(GeneratedRole::Clone);
            generated.push(shard);
        }

        let mut gather = QFunction::new(
            QNode::new(shard_outputs),
            base.outputs.clone(),
            base.analysis_name.clone(),
            base.add_order.child(shards as u64),
            false,
            Kind::CommandLine(self.gather_command.clone()),
        );
        gather.generated_role = Some(GeneratedRole::Gather);
        generated.push(gather);

        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_single_command_rule() {
        let data = r#"[{
            "inputs": ["a.txt"],
            "outputs": ["b.txt"],
            "analysis_name": "convert",
            "command": { "program": "cp", "args": ["a.txt", "b.txt"] }
        }]"#;

        let rules = Rules::from_str(data).unwrap();
        let functions = rules.into_functions().unwrap();

        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].analysis_name, "convert");
        assert_eq!(functions[0].inputs, QNode::single("a.txt"));
        assert_eq!(functions[0].outputs, QNode::single("b.txt"));
    }

    #[test]
    fn add_order_follows_declaration_order() {
        let data = r#"[
            {"outputs": ["a"], "analysis_name": "one",
             "command": {"program": "true"}},
            {"outputs": ["b"], "analysis_name": "two",
             "command": {"program": "true"}}
        ]"#;

        let functions = Rules::from_str(data).unwrap().into_functions().unwrap();
        assert!(functions[0].add_order < functions[1].add_order);
    }

    #[test]
    fn missing_task_kind_is_a_rules_error() {
        let data = r#"[{"outputs": ["a"], "analysis_name": "bare"}]"#;
        let functions = Rules::from_str(data).unwrap().into_functions();
        assert!(functions.is_err());
    }

    #[test]
    fn scatter_gather_splits_inputs_round_robin() {
        let data = r#"[{
            "inputs": ["a", "b", "c"],
            "outputs": ["merged.txt"],
            "analysis_name": "scatter-demo",
            "scatter_gather": {
                "shards": 2,
                "shard_command": {"program": "process"},
                "gather_command": {"program": "merge"}
            }
        }]"#;

        let functions = Rules::from_str(data).unwrap().into_functions().unwrap();
        assert_eq!(functions.len(), 1);
        assert!(functions[0].scatter_gatherable());

        let generated = functions[0].generate_functions();
        assert_eq!(generated.len(), 3);
        assert_eq!(generated[0].generated_role, Some(GeneratedRole::Clone));
        assert_eq!(generated[2].generated_role, Some(GeneratedRole::Gather));
        assert_eq!(generated[2].outputs, QNode::single("merged.txt"));
    }
}
