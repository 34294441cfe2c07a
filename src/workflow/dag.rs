//! Step dependency graph.
//!
//! The graph runs from a step to the steps it `dependsOn`. Ordering is a
//! depth-first postorder walk seeded in declaration order, so identical
//! definitions always produce identical orders.
//!
//! Steps listed in a condition branch or loop body are *owned* by that
//! control step. The executor only walks top-level steps; owned steps run
//! inside their owner, so their dependencies are lifted onto the owner.

use std::collections::{HashMap, HashSet};

use super::types::{StepKind, WorkflowDefinition, WorkflowStep};

/// Adjacency list keyed by step id, plus the ids in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph<'a> {
    ids: Vec<&'a str>,
    edges: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> DependencyGraph<'a> {
    /// Graph of every step and its declared dependencies.
    pub fn from_steps(steps: &'a [WorkflowStep]) -> Self {
        Self::from_edges(steps.iter().map(|s| {
            (
                s.id.as_str(),
                s.depends_on.iter().map(String::as_str).collect(),
            )
        }))
    }

    /// Graph from `(id, dependencies)` pairs in declaration order.
    pub fn from_edges<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Vec<&'a str>)>,
    {
        let mut graph = Self::default();
        for (id, deps) in entries {
            if !graph.edges.contains_key(id) {
                graph.ids.push(id);
            }
            graph.edges.insert(id, deps);
        }
        graph
    }

    /// Graph of top-level steps with owned-step dependencies lifted onto
    /// their top-level owner.
    pub fn collapsed(definition: &'a WorkflowDefinition) -> Self {
        let owners = definition.owners();
        let by_id: HashMap<&str, &WorkflowStep> = definition
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();

        let mut ids = Vec::new();
        let mut edges = HashMap::new();

        for step in &definition.steps {
            if owners.contains_key(step.id.as_str()) {
                continue;
            }
            let root = step.id.as_str();
            let mut lifted: Vec<&str> = Vec::new();

            let members = std::iter::once(root).chain(definition.descendants(root));
            for member in members {
                let Some(member_step) = by_id.get(member) else {
                    continue;
                };
                for dep in &member_step.depends_on {
                    let top = top_level(dep, &owners, definition.steps.len());
                    if top != root && !lifted.contains(&top) {
                        lifted.push(top);
                    }
                }
            }

            ids.push(root);
            edges.insert(root, lifted);
        }

        Self { ids, edges }
    }

    /// Dependencies of a step.
    pub fn dependencies(&self, id: &str) -> &[&'a str] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topological order: every id after all of its dependencies.
    ///
    /// Dependencies that are not nodes of this graph are ignored. On a
    /// cyclic graph the back edge is skipped, so callers must reject cycles
    /// with [`find_cycle`](Self::find_cycle) first.
    pub fn topological_order(&self) -> Vec<&'a str> {
        let mut order = Vec::with_capacity(self.ids.len());
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for id in &self.ids {
            self.visit(*id, &mut visited, &mut visiting, &mut order);
        }

        order
    }

    fn visit(
        &self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        order: &mut Vec<&'a str>,
    ) {
        if visited.contains(id) || visiting.contains(id) || !self.edges.contains_key(id) {
            return;
        }

        visiting.insert(id);
        for dep in self.dependencies(id) {
            self.visit(*dep, visited, visiting, order);
        }
        visiting.remove(id);

        visited.insert(id);
        order.push(id);
    }

    /// Find a dependency cycle with three-color DFS.
    ///
    /// Returns the back-edge path starting and ending at the same id, e.g.
    /// `["a", "b", "a"]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut colors: HashMap<&str, Color> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();

        for id in &self.ids {
            if colors.get(id).copied().unwrap_or(Color::White) == Color::White {
                if let Some(path) = self.dfs_cycle(*id, &mut colors, &mut stack) {
                    return Some(path);
                }
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        id: &'a str,
        colors: &mut HashMap<&'a str, Color>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        colors.insert(id, Color::Gray);
        stack.push(id);

        for dep in self.dependencies(id) {
            if !self.edges.contains_key(dep) {
                continue;
            }
            match colors.get(dep).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    let start = stack.iter().position(|s| s == dep).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|s| s.to_string()).collect();
                    path.push(dep.to_string());
                    return Some(path);
                }
                Color::White => {
                    if let Some(path) = self.dfs_cycle(*dep, colors, stack) {
                        return Some(path);
                    }
                }
                Color::Black => {}
            }
        }

        stack.pop();
        colors.insert(id, Color::Black);
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Walk owners up to the step that the top-level executor runs.
fn top_level<'a>(id: &'a str, owners: &HashMap<&'a str, &'a str>, limit: usize) -> &'a str {
    let mut current = id;
    for _ in 0..=limit {
        match owners.get(current) {
            Some(owner) => current = owner,
            None => break,
        }
    }
    current
}

/// Execution order over every declared step.
pub fn execution_order(steps: &[WorkflowStep]) -> Vec<String> {
    DependencyGraph::from_steps(steps)
        .topological_order()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Find a dependency cycle among the declared steps.
pub fn find_cycle(steps: &[WorkflowStep]) -> Option<Vec<String>> {
    DependencyGraph::from_steps(steps).find_cycle()
}

/// The order the executor walks a validated definition in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Top-level step ids; owned steps run inside their owner
    pub order: Vec<String>,
}

impl ExecutionPlan {
    pub fn build(definition: &WorkflowDefinition) -> Self {
        let order = DependencyGraph::collapsed(definition)
            .topological_order()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self { order }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Generate an indented text representation of the plan.
pub fn render_plan(definition: &WorkflowDefinition) -> String {
    let plan = ExecutionPlan::build(definition);
    let mut lines = Vec::new();
    let mut shown = HashSet::new();

    for (position, id) in plan.order.iter().enumerate() {
        lines.push(format!("{}. {}", position + 1, describe(definition, id)));
        shown.insert(id.as_str());
        render_children(definition, id, 1, &mut shown, &mut lines);
    }

    lines.join("\n")
}

fn render_children<'a>(
    definition: &'a WorkflowDefinition,
    id: &str,
    depth: usize,
    shown: &mut HashSet<&'a str>,
    lines: &mut Vec<String>,
) {
    let Some(step) = definition.get_step(id) else {
        return;
    };
    let indent = "   ".repeat(depth);
    let labelled: Vec<(&str, &[String])> = match &step.kind {
        StepKind::Condition(c) => vec![("then", c.then.as_slice()), ("else", c.otherwise.as_slice())],
        StepKind::Loop(l) => vec![("each", l.steps.as_slice())],
        _ => return,
    };

    for (label, body) in labelled {
        if body.is_empty() {
            continue;
        }
        lines.push(format!("{}{}:", indent, label));
        for child in body {
            if !shown.insert(child.as_str()) {
                lines.push(format!("{}└─ {}  (already shown)", indent, child));
                continue;
            }
            lines.push(format!("{}└─ {}", indent, describe(definition, child)));
            render_children(definition, child, depth + 1, shown, lines);
        }
    }
}

fn describe(definition: &WorkflowDefinition, id: &str) -> String {
    match definition.get_step(id) {
        Some(step) => format!("{} [{}]", id, step.kind.name()),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::parse_workflow;

    fn step(id: &str, deps: &[&str]) -> WorkflowStep {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "type": "transform",
            "expression": "1",
            "dependsOn": deps,
        }))
        .unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let steps = vec![step("c", &["a", "b"]), step("a", &[]), step("b", &["a"])];
        let order = execution_order(&steps);

        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn test_declaration_order_tie_break() {
        let steps = vec![step("x", &[]), step("y", &[]), step("z", &[])];
        assert_eq!(execution_order(&steps), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let steps = vec![
            step("d", &["b", "c"]),
            step("c", &["a"]),
            step("b", &["a"]),
            step("a", &[]),
        ];
        let first = execution_order(&steps);
        for _ in 0..10 {
            assert_eq!(execution_order(&steps), first);
        }
        assert_eq!(first, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_find_cycle_reports_path() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        assert_eq!(find_cycle(&steps), Some(vec!["a".into(), "b".into(), "a".into()]));
    }

    #[test]
    fn test_find_cycle_excludes_lead_in() {
        let steps = vec![
            step("start", &["x"]),
            step("x", &["y"]),
            step("y", &["z"]),
            step("z", &["x"]),
        ];
        let cycle = find_cycle(&steps).unwrap();
        assert_eq!(cycle, vec!["x", "y", "z", "x"]);
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let steps = vec![step("solo", &["solo"])];
        assert_eq!(find_cycle(&steps), Some(vec!["solo".into(), "solo".into()]));
    }

    #[test]
    fn test_no_cycle() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a", "b"])];
        assert!(find_cycle(&steps).is_none());
    }

    const BRANCHING: &str = r#"
name: branching
creator:
  address: "0xabc"
pricing:
  basePrice: 0
steps:
  - id: prep
    type: transform
    expression: "1"
  - id: gate
    type: condition
    expression: "input.ok"
    then: [accept]
    else: [reject]
  - id: accept
    type: transform
    expression: "'yes'"
  - id: reject
    type: transform
    expression: "'no'"
    dependsOn: [late]
  - id: late
    type: transform
    expression: "2"
"#;

    #[test]
    fn test_plan_excludes_owned_steps() {
        let workflow = parse_workflow(BRANCHING).unwrap();
        let plan = ExecutionPlan::build(&workflow);

        assert!(!plan.order.contains(&"accept".to_string()));
        assert!(!plan.order.contains(&"reject".to_string()));

        // `reject` depends on `late`, so its owner `gate` must run after `late`.
        let pos = |id: &str| plan.order.iter().position(|x| x == id).unwrap();
        assert!(pos("late") < pos("gate"));
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_render_plan() {
        let workflow = parse_workflow(BRANCHING).unwrap();
        let text = render_plan(&workflow);
        assert!(text.contains("gate [condition]"));
        assert!(text.contains("then:"));
        assert!(text.contains("└─ accept [transform]"));
        assert!(text.contains("else:"));
    }
}
