//! `compile_commands.json` for editors and clang tooling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::ninja::synth::{RULE_CC, RULE_CXX};
use crate::builder::ninja::BuildGraph;
use crate::util::fs::write_if_changed;

pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

/// One entry of a JSON compilation database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    /// Working directory the command runs in (the build directory)
    pub directory: String,
    pub file: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Entries for every compile edge in `graph`, in graph order.
///
/// Paths in the graph are relative to `build_dir`, which becomes each
/// entry's `directory`.
pub fn compile_commands(graph: &BuildGraph, build_dir: &Path) -> Vec<CompileCommand> {
    let directory = build_dir.display().to_string();
    graph
        .edges()
        .iter()
        .filter(|edge| edge.rule == RULE_CC || edge.rule == RULE_CXX)
        .filter_map(|edge| {
            let rule = graph.rule(&edge.rule)?;
            let file = edge.inputs.first()?;
            Some(CompileCommand {
                directory: directory.clone(),
                file: file.display().to_string(),
                command: edge.expand_command(rule),
                output: edge.primary_output().map(|o| o.display().to_string()),
            })
        })
        .collect()
}

/// Write `compile_commands.json` into `build_dir`, leaving an identical
/// file untouched.
pub fn write_compile_commands(graph: &BuildGraph, build_dir: &Path) -> Result<PathBuf> {
    let path = build_dir.join(COMPILE_COMMANDS_FILE);
    let entries = compile_commands(graph, build_dir);
    let mut json =
        serde_json::to_string_pretty(&entries).context("failed to serialize compile commands")?;
    json.push('\n');
    write_if_changed(&path, &json)?;
    tracing::debug!("{} compile command(s) in {}", entries.len(), path.display());
    Ok(path)
}
