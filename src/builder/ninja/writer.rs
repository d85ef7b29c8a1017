//! Serializing a [`BuildGraph`] to `build.ninja` text, and the escaping
//! rules that go with it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::builder::ninja::graph::{BuildEdge, BuildGraph, Rule};

pub const HEADER: &str = "# This file is generated by kiln. Do not edit.";
pub const REQUIRED_VERSION: &str = "1.10";

/// Escape a path for a `build` line.
pub fn escape_path(path: &Path) -> String {
    let text = path.display().to_string();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '$' => out.push_str("$$"),
            ' ' => out.push_str("$ "),
            ':' => out.push_str("$:"),
            '\n' => out.push_str("$\n"),
            c => out.push(c),
        }
    }
    out
}

/// Escape `$` in a variable value or command.
pub fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

/// Double-quote a shell argument that contains whitespace.
pub fn quote_arg(arg: &str) -> String {
    let already_quoted = arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"');
    if arg.chars().any(char::is_whitespace) && !already_quoted {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// Quote and join arguments with single spaces.
pub fn join_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| quote_arg(a.as_ref()))
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| escape_path(p))
        .collect::<Vec<_>>()
        .join(" ")
}

impl BuildGraph {
    /// Render the graph. Output depends only on insertion order, so equal
    /// graphs always produce byte-identical text.
    pub fn to_ninja(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", HEADER);
        let _ = writeln!(out, "ninja_required_version = {}", REQUIRED_VERSION);
        out.push('\n');

        for rule in self.rules() {
            write_rule(&mut out, rule);
        }
        for edge in self.edges() {
            write_edge(&mut out, edge);
        }
        if !self.defaults().is_empty() {
            let _ = writeln!(out, "default {}", join_paths(self.defaults()));
        }
        out
    }
}

fn write_rule(out: &mut String, rule: &Rule) {
    let _ = writeln!(out, "rule {}", rule.name);
    let _ = writeln!(out, "  command = {}", rule.command);
    let _ = writeln!(out, "  description = {}", rule.description);
    if let Some(depfile) = &rule.depfile {
        let _ = writeln!(out, "  depfile = {}", depfile);
    }
    if let Some(deps) = rule.deps {
        let _ = writeln!(out, "  deps = {}", deps.as_str());
    }
    out.push('\n');
}

fn write_edge(out: &mut String, edge: &BuildEdge) {
    let _ = write!(out, "build {}", join_paths(&edge.outputs));
    if !edge.implicit_outputs.is_empty() {
        let _ = write!(out, " | {}", join_paths(&edge.implicit_outputs));
    }
    let _ = write!(out, ": {}", edge.rule);
    if !edge.inputs.is_empty() {
        let _ = write!(out, " {}", join_paths(&edge.inputs));
    }
    if !edge.implicit_inputs.is_empty() {
        let _ = write!(out, " | {}", join_paths(&edge.implicit_inputs));
    }
    if !edge.order_only_inputs.is_empty() {
        let _ = write!(out, " || {}", join_paths(&edge.order_only_inputs));
    }
    out.push('\n');

    for (name, value) in &edge.bindings {
        let _ = writeln!(out, "  {} = {}", name, escape_value(value));
    }
    // Ninja reads the rule's `depfile` without shell parsing, so the path
    // is bound unquoted.
    if let Some(depfile) = &edge.depfile {
        let _ = writeln!(
            out,
            "  DEPFILE = {}",
            escape_value(&depfile.display().to_string())
        );
    }
    out.push('\n');
}

impl BuildEdge {
    /// The command Ninja would run for this edge under `rule`.
    ///
    /// Used for `compile_commands.json`; unknown variables expand to
    /// nothing, as in Ninja.
    pub fn expand_command(&self, rule: &Rule) -> String {
        let mut out = String::new();
        let mut chars = rule.command.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some(escaped @ ('$' | ' ' | ':')) => {
                    out.push(escaped);
                    chars.next();
                }
                Some(c) if is_var_char(c) => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if !is_var_char(c) {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    out.push_str(&self.variable(&name));
                }
                _ => out.push('$'),
            }
        }
        out
    }

    fn variable(&self, name: &str) -> String {
        let paths = |paths: &[PathBuf]| {
            join_args(paths.iter().map(|p| p.display().to_string()))
        };
        match name {
            "in" => paths(&self.inputs),
            "out" => paths(&self.outputs),
            "DEPFILE" => self
                .depfile
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            _ => self.binding(name).unwrap_or_default().to_string(),
        }
    }
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
