//! Step graph construction and validation.
//!
//! [`StepGraph::build`] turns the flat, ordered step list of a
//! [`WorkflowDefinition`] into a validated DAG. Steps keep their declaration
//! index so every consumer can iterate in declaration order; edges are kept
//! in both directions because the scheduler asks "what does X wait on" and
//! "what is downstream of X".

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;

use super::placeholder;
use super::schema::{CapabilityKind, WorkflowDefinition};

/// Reasons a workflow definition is rejected before any step runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate step name '{step}'")]
    DuplicateStepName { step: String },

    #[error("invalid step name '{step}': names must be non-empty and may not contain '.' or '}}'")]
    InvalidStepName { step: String },

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("step '{step}' has unknown capability kind '{kind}'")]
    UnknownCapabilityKind { step: String, kind: String },

    #[error("step '{step}' references the output of '{reference}' without depending on it")]
    UndeclaredReference { step: String, reference: String },
}

impl ValidationError {
    /// Stable machine-readable tag for the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::DuplicateStepName { .. } => "duplicate_step_name",
            ValidationError::InvalidStepName { .. } => "invalid_step_name",
            ValidationError::UnknownDependency { .. } => "unknown_dependency",
            ValidationError::CyclicDependency { .. } => "cyclic_dependency",
            ValidationError::UnknownCapabilityKind { .. } => "unknown_capability_kind",
            ValidationError::UndeclaredReference { .. } => "undeclared_reference",
        }
    }
}

/// A validated step, ready to be scheduled.
#[derive(Debug, Clone)]
pub struct StepNode {
    pub name: String,
    pub kind: CapabilityKind,
    pub input: Value,
    pub depends_on: Vec<String>,
    /// Effective timeout override (step, then workflow level). `None` means
    /// the dispatcher default applies.
    pub timeout_secs: Option<u64>,
}

/// Validated dependency graph over the steps of one workflow.
#[derive(Debug, Clone)]
pub struct StepGraph {
    nodes: Vec<StepNode>,
    index: HashMap<String, usize>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
}

impl StepGraph {
    /// Validate `definition` and build its graph.
    ///
    /// `supported` is the set of capability kinds that have a registered
    /// implementation; any other kind is rejected here rather than at
    /// dispatch time.
    pub fn build(
        definition: &WorkflowDefinition,
        supported: &[CapabilityKind],
    ) -> Result<Self, ValidationError> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(definition.steps.len());
        let mut nodes = Vec::with_capacity(definition.steps.len());

        for step in &definition.steps {
            // placeholders address steps as `${steps.<name>.output}`
            if !placeholder::is_addressable_name(&step.name) {
                return Err(ValidationError::InvalidStepName {
                    step: step.name.clone(),
                });
            }
            if index.contains_key(&step.name) {
                return Err(ValidationError::DuplicateStepName {
                    step: step.name.clone(),
                });
            }

            let kind = step
                .kind
                .parse::<CapabilityKind>()
                .ok()
                .filter(|k| supported.contains(k))
                .ok_or_else(|| ValidationError::UnknownCapabilityKind {
                    step: step.name.clone(),
                    kind: step.kind.clone(),
                })?;

            let mut depends_on: Vec<String> = Vec::with_capacity(step.depends_on.len());
            for dep in &step.depends_on {
                if !depends_on.contains(dep) {
                    depends_on.push(dep.clone());
                }
            }

            index.insert(step.name.clone(), nodes.len());
            nodes.push(StepNode {
                name: step.name.clone(),
                kind,
                input: step.input.clone(),
                depends_on,
                timeout_secs: step.timeout_secs.or(definition.step_timeout_secs),
            });
        }

        let mut predecessors = vec![Vec::new(); nodes.len()];
        let mut successors = vec![Vec::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            for dep in &node.depends_on {
                let Some(&d) = index.get(dep) else {
                    return Err(ValidationError::UnknownDependency {
                        step: node.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                predecessors[i].push(d);
                successors[d].push(i);
            }

            for reference in placeholder::referenced_steps(&node.input) {
                if !node.depends_on.contains(&reference) {
                    return Err(ValidationError::UndeclaredReference {
                        step: node.name.clone(),
                        reference,
                    });
                }
            }
        }

        let graph = Self {
            nodes,
            index,
            predecessors,
            successors,
        };

        if let Some(cycle) = graph.find_cycle() {
            return Err(ValidationError::CyclicDependency { cycle });
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Steps in declaration order.
    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &StepNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Direct dependencies of the step at `idx`.
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.predecessors[idx]
    }

    /// Direct dependents of the step at `idx`.
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    pub fn predecessors_of(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.index_of(name)?;
        Some(self.names(&self.predecessors[idx]))
    }

    pub fn successors_of(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.index_of(name)?;
        Some(self.names(&self.successors[idx]))
    }

    fn names(&self, indices: &[usize]) -> Vec<&str> {
        indices.iter().map(|&i| self.nodes[i].name.as_str()).collect()
    }

    /// Every step downstream of `name`, directly or indirectly.
    pub fn transitive_dependents(&self, name: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let Some(start) = self.index_of(name) else {
            return result;
        };
        let mut to_visit = vec![start];

        while let Some(current) = to_visit.pop() {
            for &dep in &self.successors[current] {
                if result.insert(self.nodes[dep].name.clone()) {
                    to_visit.push(dep);
                }
            }
        }

        result
    }

    /// Step indices in dependency order. Among steps that are
    /// simultaneously available, the earlier-declared one comes first.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut available: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = available.pop_first() {
            order.push(next);
            for &succ in &self.successors[next] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    available.insert(succ);
                }
            }
        }

        order
    }

    /// Find a cycle by depth-first search along dependency edges, returning
    /// the path in execution direction with the first step repeated at the
    /// end (e.g. `A -> B -> C -> A`).
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        let mut state = vec![State::Unvisited; self.nodes.len()];
        // (node, index of the next successor to look at)
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.nodes.len() {
            if state[start] != State::Unvisited {
                continue;
            }
            state[start] = State::Visiting;
            stack.push((start, 0));
            path.push(start);

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                let Some(&next) = self.successors[node].get(cursor) else {
                    stack.pop();
                    path.pop();
                    state[node] = State::Visited;
                    continue;
                };
                frame.1 += 1;

                match state[next] {
                    State::Visiting => {
                        let begin = path.iter().position(|&p| p == next).unwrap_or(0);
                        let mut cycle: Vec<String> = path[begin..]
                            .iter()
                            .map(|&i| self.nodes[i].name.clone())
                            .collect();
                        cycle.push(self.nodes[next].name.clone());
                        return Some(cycle);
                    }
                    State::Unvisited => {
                        state[next] = State::Visiting;
                        stack.push((next, 0));
                        path.push(next);
                    }
                    State::Visited => {}
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::schema::StepDeclaration;
    use serde_json::json;

    fn step(name: &str, deps: &[&str]) -> StepDeclaration {
        StepDeclaration {
            name: name.to_string(),
            kind: "discovery".to_string(),
            input: json!({}),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            timeout_secs: None,
        }
    }

    fn workflow(steps: Vec<StepDeclaration>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: None,
            description: None,
            steps,
            allow_parallel: false,
            persist: false,
            step_timeout_secs: None,
        }
    }

    fn build(steps: Vec<StepDeclaration>) -> Result<StepGraph, ValidationError> {
        StepGraph::build(&workflow(steps), &CapabilityKind::ALL)
    }

    #[test]
    fn builds_empty_graph() {
        let graph = build(vec![]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn tracks_both_edge_directions() {
        let graph = build(vec![step("a", &[]), step("b", &["a"]), step("c", &["a"])]).unwrap();

        assert_eq!(graph.successors_of("a").unwrap(), vec!["b", "c"]);
        assert_eq!(graph.predecessors_of("b").unwrap(), vec!["a"]);
        assert!(graph.predecessors_of("a").unwrap().is_empty());
        assert!(graph.successors_of("missing").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = build(vec![step("a", &[]), step("a", &[])]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateStepName { step: "a".into() });
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = build(vec![step("A", &[]), step("B", &["Z"])]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownDependency {
                step: "B".into(),
                dependency: "Z".into()
            }
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let mut s = step("render", &[]);
        s.kind = "camoufox".into();
        let err = build(vec![s]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownCapabilityKind {
                step: "render".into(),
                kind: "camoufox".into()
            }
        );
    }

    #[test]
    fn rejects_kind_without_registered_capability() {
        let mut s = step("look", &[]);
        s.kind = "image-analysis".into();
        let err = StepGraph::build(&workflow(vec![s]), &[CapabilityKind::Discovery]).unwrap_err();
        assert_eq!(err.kind(), "unknown_capability_kind");
    }

    #[test]
    fn reports_full_cycle_path() {
        let err = build(vec![step("A", &["C"]), step("B", &["A"]), step("C", &["B"])]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CyclicDependency {
                cycle: vec!["A".into(), "B".into(), "C".into(), "A".into()]
            }
        );
        assert_eq!(err.to_string(), "cyclic dependency: A -> B -> C -> A");
    }

    #[test]
    fn detects_self_cycle() {
        let err = build(vec![step("a", &["a"])]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CyclicDependency {
                cycle: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn cycle_path_contains_only_cycle_members() {
        let err = build(vec![
            step("root", &[]),
            step("x", &["root", "z"]),
            step("y", &["x"]),
            step("z", &["y"]),
        ])
        .unwrap_err();
        let ValidationError::CyclicDependency { cycle } = err else {
            panic!("expected cycle");
        };
        assert_eq!(cycle.first(), cycle.last());
        for name in ["x", "y", "z"] {
            assert!(cycle.contains(&name.to_string()));
        }
        assert!(!cycle.contains(&"root".to_string()));
    }

    #[test]
    fn rejects_placeholder_without_dependency() {
        let mut s = step("details", &[]);
        s.input = json!({ "url": "${steps.search.output.0.url}" });
        let err = build(vec![step("search", &[]), s]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UndeclaredReference {
                step: "details".into(),
                reference: "search".into()
            }
        );
    }

    #[test]
    fn rejects_names_placeholders_cannot_address() {
        for name in ["v1.search", "a}b", "", "  "] {
            let err = build(vec![step(name, &[])]).unwrap_err();
            assert_eq!(err, ValidationError::InvalidStepName { step: name.into() });
            assert_eq!(err.kind(), "invalid_step_name");
        }
    }

    #[test]
    fn dotted_name_cannot_hide_an_undeclared_reference() {
        let mut details = step("details", &[]);
        details.input = json!({ "url": "${steps.v1.search.output.0.url}" });
        let err = build(vec![step("v1.search", &[]), details]).unwrap_err();
        assert_eq!(err, ValidationError::InvalidStepName { step: "v1.search".into() });
    }

    #[test]
    fn names_with_other_punctuation_are_addressable() {
        let mut details = step("page-details", &["search_v1"]);
        details.input = json!({ "url": "${steps.search_v1.output.0.url}" });
        assert!(build(vec![step("search_v1", &[]), details]).is_ok());
    }

    #[test]
    fn deep_chain_builds_without_recursion() {
        let n = 100_000;
        let steps: Vec<StepDeclaration> = (0..n)
            .map(|i| {
                let dep = format!("s{}", i.max(1) - 1);
                let deps: Vec<&str> = if i == 0 { vec![] } else { vec![dep.as_str()] };
                step(&format!("s{}", i), &deps)
            })
            .collect();
        let graph = build(steps).expect("long acyclic chain is valid");
        assert_eq!(graph.len(), n);
        assert_eq!(graph.topological_order().first(), Some(&0));
        assert_eq!(graph.successors_of("s0").unwrap(), vec!["s1"]);
    }

    #[test]
    fn deep_chain_closing_into_a_cycle_is_reported() {
        let n = 50_000;
        let steps: Vec<StepDeclaration> = (0..n)
            .map(|i| {
                // s0 depends on the last step, closing the loop
                let dep = format!("s{}", (i + n - 1) % n);
                step(&format!("s{}", i), &[dep.as_str()])
            })
            .collect();
        let ValidationError::CyclicDependency { cycle } = build(steps).unwrap_err() else {
            panic!("expected cycle");
        };
        assert_eq!(cycle.len(), n + 1);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn accepts_placeholder_with_dependency() {
        let mut s = step("details", &["search"]);
        s.input = json!({ "url": "${steps.search.output.0.url}" });
        assert!(build(vec![step("search", &[]), s]).is_ok());
    }

    #[test]
    fn duplicate_dependency_entries_collapse() {
        let graph = build(vec![step("a", &[]), step("b", &["a", "a"])]).unwrap();
        assert_eq!(graph.predecessors_of("b").unwrap(), vec!["a"]);
        assert_eq!(graph.successors_of("a").unwrap(), vec!["b"]);
    }

    #[test]
    fn topological_order_prefers_declaration_order() {
        // declared out of dependency order on purpose
        let graph = build(vec![
            step("late", &["early"]),
            step("other", &[]),
            step("early", &[]),
        ])
        .unwrap();
        let names: Vec<&str> = graph
            .topological_order()
            .into_iter()
            .map(|i| graph.node(i).name.as_str())
            .collect();
        assert_eq!(names, vec!["other", "early", "late"]);
    }

    #[test]
    fn transitive_dependents_follow_chains() {
        let graph = build(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("d", &[]),
        ])
        .unwrap();
        let deps = graph.transitive_dependents("a");
        assert!(deps.contains("b"));
        assert!(deps.contains("c"));
        assert!(!deps.contains("d"));
        assert!(graph.transitive_dependents("d").is_empty());
    }

    #[test]
    fn workflow_timeout_applies_when_step_has_none() {
        let mut with_override = step("b", &[]);
        with_override.timeout_secs = Some(5);
        let mut def = workflow(vec![step("a", &[]), with_override]);
        def.step_timeout_secs = Some(42);
        let graph = StepGraph::build(&def, &CapabilityKind::ALL).unwrap();
        assert_eq!(graph.node(0).timeout_secs, Some(42));
        assert_eq!(graph.node(1).timeout_secs, Some(5));
    }
}
