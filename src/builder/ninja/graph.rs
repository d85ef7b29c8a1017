//! In-memory build graph: rules and edges, before serialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::builder::toolchain::DependencyStyle;
use crate::core::errors::ResolveError;
use crate::util::ordered::UniqueVec;

/// Errors raised while adding to or synthesizing a build graph.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum SynthesisError {
    #[error("output `{}` is produced by two different build edges", .output.display())]
    #[diagnostic(
        code(kiln::ninja::duplicate_output),
        help("two targets or two sources map to the same file; rename one of them")
    )]
    DuplicateOutput { output: PathBuf },

    #[error("rule `{rule}` is defined twice with different contents")]
    #[diagnostic(code(kiln::ninja::conflicting_rule))]
    ConflictingRule { rule: String },

    #[error("build edge for `{}` refers to undefined rule `{rule}`", .output.display())]
    #[diagnostic(code(kiln::ninja::unknown_rule))]
    UnknownRule { rule: String, output: PathBuf },

    #[error("target `{target}` was skipped because its dependency `{dependency}` failed")]
    #[diagnostic(code(kiln::ninja::dependency_failed))]
    DependencyFailed { target: String, dependency: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),
}

/// A named command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    /// Command line in Ninja syntax (`$in`, `$out` and edge variables).
    pub command: String,
    pub description: String,
    pub depfile: Option<String>,
    pub deps: Option<DependencyStyle>,
}

impl Rule {
    pub fn new(name: impl Into<String>, command: impl Into<String>, description: impl Into<String>) -> Self {
        Rule {
            name: name.into(),
            command: command.into(),
            description: description.into(),
            depfile: None,
            deps: None,
        }
    }

    pub fn with_deps(mut self, deps: DependencyStyle) -> Self {
        self.deps = Some(deps);
        self
    }

    pub fn with_depfile(mut self, depfile: impl Into<String>) -> Self {
        self.depfile = Some(depfile.into());
        self
    }
}

/// One `build` statement.
///
/// Binding values are stored unescaped; arguments inside them are already
/// quoted for the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEdge {
    pub outputs: Vec<PathBuf>,
    pub implicit_outputs: Vec<PathBuf>,
    pub rule: String,
    pub inputs: Vec<PathBuf>,
    pub implicit_inputs: Vec<PathBuf>,
    pub order_only_inputs: Vec<PathBuf>,
    pub bindings: Vec<(String, String)>,
    /// Compiler-written header dependency file, bound as `DEPFILE`.
    pub depfile: Option<PathBuf>,
}

impl BuildEdge {
    pub fn new(rule: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        BuildEdge {
            outputs: vec![output.into()],
            implicit_outputs: Vec::new(),
            rule: rule.into(),
            inputs: Vec::new(),
            implicit_inputs: Vec::new(),
            order_only_inputs: Vec::new(),
            bindings: Vec::new(),
            depfile: None,
        }
    }

    pub fn input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn implicit_inputs(mut self, inputs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.implicit_inputs.extend(inputs);
        self
    }

    pub fn order_only_inputs(mut self, inputs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.order_only_inputs.extend(inputs);
        self
    }

    pub fn implicit_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.implicit_outputs.push(output.into());
        self
    }

    /// Bind `name`; empty values are dropped.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.bindings.push((name.into(), value));
        }
        self
    }

    pub fn with_depfile(mut self, depfile: impl Into<PathBuf>) -> Self {
        self.depfile = Some(depfile.into());
        self
    }

    pub fn binding(&self, name: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn primary_output(&self) -> Option<&Path> {
        self.outputs.first().map(PathBuf::as_path)
    }

    /// Every file this edge writes.
    pub fn all_outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.outputs.iter().chain(self.implicit_outputs.iter())
    }
}

/// Rules, edges and default targets of one generated build file.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    rules: Vec<Rule>,
    edges: Vec<BuildEdge>,
    defaults: UniqueVec<PathBuf>,
    producers: HashMap<PathBuf, usize>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn edges(&self) -> &[BuildEdge] {
        &self.edges
    }

    pub fn defaults(&self) -> &[PathBuf] {
        self.defaults.as_slice()
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// The edge that writes `output`, if any.
    pub fn producer(&self, output: &Path) -> Option<&BuildEdge> {
        self.producers.get(output).map(|&i| &self.edges[i])
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Add a rule. Re-adding an identical rule is a no-op.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), SynthesisError> {
        if self.check_rule(&rule)? {
            self.rules.push(rule);
        }
        Ok(())
    }

    /// Add an edge. Re-adding an identical edge is a no-op; an edge writing
    /// a file another edge already writes is an error.
    pub fn add_edge(&mut self, edge: BuildEdge) -> Result<(), SynthesisError> {
        if self.check_edge(&edge, &[])? {
            self.insert_edge(edge);
        }
        Ok(())
    }

    pub fn add_default(&mut self, output: impl Into<PathBuf>) {
        self.defaults.push(output.into());
    }

    /// Append `fragment`. Nothing is added unless every rule and edge of
    /// the fragment is compatible with this graph.
    pub fn merge(&mut self, fragment: BuildGraph) -> Result<(), SynthesisError> {
        let mut new_rules = Vec::new();
        for rule in &fragment.rules {
            if self.check_rule(rule)? {
                new_rules.push(rule.clone());
            }
        }
        let mut new_edges = Vec::new();
        for edge in &fragment.edges {
            if self.check_edge(edge, &new_rules)? {
                new_edges.push(edge.clone());
            }
        }

        self.rules.extend(new_rules);
        for edge in new_edges {
            self.insert_edge(edge);
        }
        self.defaults.extend_from(fragment.defaults);
        Ok(())
    }

    /// `Ok(true)` when `rule` is new.
    fn check_rule(&self, rule: &Rule) -> Result<bool, SynthesisError> {
        match self.rule(&rule.name) {
            None => Ok(true),
            Some(existing) if existing == rule => Ok(false),
            Some(_) => Err(SynthesisError::ConflictingRule {
                rule: rule.name.clone(),
            }),
        }
    }

    /// `Ok(true)` when `edge` is new. `pending` are rules about to be added.
    fn check_edge(&self, edge: &BuildEdge, pending: &[Rule]) -> Result<bool, SynthesisError> {
        let first_output = || edge.primary_output().map(Path::to_path_buf).unwrap_or_default();
        if self.rule(&edge.rule).is_none() && !pending.iter().any(|r| r.name == edge.rule) {
            return Err(SynthesisError::UnknownRule {
                rule: edge.rule.clone(),
                output: first_output(),
            });
        }

        let mut seen = false;
        for output in edge.all_outputs() {
            if let Some(&i) = self.producers.get(output) {
                if self.edges[i] == *edge {
                    seen = true;
                } else {
                    return Err(SynthesisError::DuplicateOutput {
                        output: output.clone(),
                    });
                }
            }
        }
        Ok(!seen)
    }

    fn insert_edge(&mut self, edge: BuildEdge) {
        let index = self.edges.len();
        for output in edge.all_outputs() {
            self.producers.insert(output.clone(), index);
        }
        self.edges.push(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_rule() -> BuildGraph {
        let mut graph = BuildGraph::new();
        graph
            .add_rule(Rule::new("cc", "cc -c $in -o $out", "CC $out"))
            .unwrap();
        graph
    }

    #[test]
    fn test_identical_rule_is_idempotent() {
        let mut graph = graph_with_rule();
        graph
            .add_rule(Rule::new("cc", "cc -c $in -o $out", "CC $out"))
            .unwrap();
        assert_eq!(graph.rules().len(), 1);
    }

    #[test]
    fn test_conflicting_rule_is_rejected() {
        let mut graph = graph_with_rule();
        let err = graph
            .add_rule(Rule::new("cc", "gcc -c $in -o $out", "CC $out"))
            .unwrap_err();
        assert_eq!(err, SynthesisError::ConflictingRule { rule: "cc".into() });
    }

    #[test]
    fn test_duplicate_output_is_rejected() {
        let mut graph = graph_with_rule();
        graph
            .add_edge(BuildEdge::new("cc", "a.o").input("a.c"))
            .unwrap();
        // Same edge again: fine.
        graph
            .add_edge(BuildEdge::new("cc", "a.o").input("a.c"))
            .unwrap();
        assert_eq!(graph.edges().len(), 1);

        let err = graph
            .add_edge(BuildEdge::new("cc", "a.o").input("b.c"))
            .unwrap_err();
        assert_eq!(
            err,
            SynthesisError::DuplicateOutput {
                output: PathBuf::from("a.o")
            }
        );
    }

    #[test]
    fn test_implicit_outputs_are_keyed_too() {
        let mut graph = graph_with_rule();
        graph
            .add_edge(
                BuildEdge::new("cc", "core.dll")
                    .input("core.o")
                    .implicit_output("core.lib"),
            )
            .unwrap();
        assert!(graph.producer(Path::new("core.lib")).is_some());
        assert!(matches!(
            graph.add_edge(BuildEdge::new("cc", "core.lib").input("x.o")),
            Err(SynthesisError::DuplicateOutput { .. })
        ));
    }

    #[test]
    fn test_edge_needs_known_rule() {
        let mut graph = BuildGraph::new();
        assert!(matches!(
            graph.add_edge(BuildEdge::new("link", "app")),
            Err(SynthesisError::UnknownRule { .. })
        ));
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let mut graph = graph_with_rule();
        graph.add_edge(BuildEdge::new("cc", "a.o").input("a.c")).unwrap();

        let mut fragment = graph_with_rule();
        fragment.add_edge(BuildEdge::new("cc", "b.o").input("b.c")).unwrap();
        fragment.add_edge(BuildEdge::new("cc", "a.o").input("other.c")).unwrap();

        assert!(graph.merge(fragment).is_err());
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.producer(Path::new("b.o")).is_none());
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut graph = graph_with_rule();
        let mut fragment = graph_with_rule();
        fragment.add_edge(BuildEdge::new("cc", "b.o").input("b.c")).unwrap();
        fragment.add_edge(BuildEdge::new("cc", "c.o").input("c.c")).unwrap();
        fragment.add_default("c.o");

        graph.merge(fragment).unwrap();
        let outputs: Vec<_> = graph
            .edges()
            .iter()
            .filter_map(|e| e.primary_output())
            .collect();
        assert_eq!(outputs, [Path::new("b.o"), Path::new("c.o")]);
        assert_eq!(graph.defaults(), &[PathBuf::from("c.o")]);
        assert_eq!(graph.rules().len(), 1);
    }

    #[test]
    fn test_empty_bindings_are_dropped() {
        let edge = BuildEdge::new("cc", "a.o").bind("FLAGS", "").bind("DEFINES", "-DX");
        assert_eq!(edge.bindings.len(), 1);
        assert_eq!(edge.binding("DEFINES"), Some("-DX"));
        assert_eq!(edge.binding("FLAGS"), None);
    }
}
