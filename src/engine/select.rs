//! Node selection and expansion
//!
//! Resolves user-supplied selection criteria (explicit keys, glob-style name
//! patterns, or "all") to a concrete set of graph nodes, then expands it:
//! optionally upward to everything that depends on the selection, and always
//! downward to the dependencies required for the selected work to be correct.
//!
//! Disabled actions are excluded from direct selection and from "all", but a
//! disabled action that a selected action transitively depends on is
//! reinstated here: its work still has to happen for downstream correctness.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::debug;

use crate::action::ActionRef;
use crate::engine::graph::{Graph, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("No matching actions for '{0}'")]
    NoMatchingNodes(String),

    #[error("Invalid selection pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// What the caller asked to run
#[derive(Debug, Clone)]
pub enum SelectCriteria {
    /// Every enabled node in the graph
    All,
    /// Explicit action keys; each must match an enabled node
    Keys(Vec<ActionRef>),
    /// Glob-style patterns (`*`, `?`) matched against action names; an empty
    /// match is valid
    Patterns(Vec<String>),
}

/// Flags that shape expansion of the initial selection
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Expand upward to every transitive dependant of the selection
    pub include_dependants: bool,

    /// Restrict required-dependency inclusion to direct dependencies only.
    /// The caller asserts pre-existing results cover anything deeper.
    pub skip_dependencies: bool,

    /// When non-empty, restrict initial resolution to actions owned by these
    /// modules
    pub modules: Vec<String>,
}

/// Frozen set of nodes chosen for one execution
#[derive(Debug, Clone)]
pub struct SelectionSet {
    ids: BTreeSet<NodeId>,
}

impl SelectionSet {
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids.iter().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sorted action keys of the selection
    pub fn keys(&self, graph: &Graph) -> Vec<String> {
        let mut keys: Vec<String> = self.ids.iter().map(|&id| graph.node(id).key()).collect();
        keys.sort();
        keys
    }
}

/// Resolve and expand a selection against `graph`
pub fn select(
    graph: &Graph,
    criteria: &SelectCriteria,
    options: &SelectOptions,
) -> Result<SelectionSet, SelectError> {
    let in_module_scope = |id: NodeId| {
        options.modules.is_empty() || options.modules.contains(&graph.node(id).config().module)
    };
    let selectable = |id: NodeId| !graph.node(id).is_disabled() && in_module_scope(id);

    let mut selected: BTreeSet<NodeId> = match criteria {
        SelectCriteria::All => graph.ids().filter(|&id| selectable(id)).collect(),
        SelectCriteria::Keys(keys) => {
            let mut ids = BTreeSet::new();
            for key in keys {
                let id = graph
                    .node_id(key)
                    .filter(|&id| selectable(id))
                    .ok_or_else(|| SelectError::NoMatchingNodes(key.key()))?;
                ids.insert(id);
            }
            ids
        }
        SelectCriteria::Patterns(patterns) => {
            let regexes = patterns
                .iter()
                .map(|p| compile_glob(p))
                .collect::<Result<Vec<_>, _>>()?;
            graph
                .ids()
                .filter(|&id| selectable(id))
                .filter(|&id| {
                    let name = &graph.node(id).config().name;
                    regexes.iter().any(|re| re.is_match(name))
                })
                .collect()
        }
    };

    // Upward expansion to a fixed point, so transitive dependants are reached.
    // Disabled dependants stay out and block further upward traversal.
    if options.include_dependants {
        let mut frontier: Vec<NodeId> = selected.iter().copied().collect();
        while let Some(id) = frontier.pop() {
            for &dependant in graph.node(id).dependents() {
                if !graph.node(dependant).is_disabled() && selected.insert(dependant) {
                    frontier.push(dependant);
                }
            }
        }
    }

    // Required work can never be omitted: pull in dependencies, reinstating
    // disabled ones. skip_dependencies narrows this to direct dependencies.
    if options.skip_dependencies {
        let direct: Vec<NodeId> = selected
            .iter()
            .flat_map(|&id| graph.node(id).dependencies().iter().copied())
            .collect();
        selected.extend(direct);
    } else {
        let required = graph.dependency_closure(selected.iter().copied());
        selected.extend(required);
    }

    debug!(
        selected = selected.len(),
        total = graph.len(),
        "Resolved selection"
    );
    Ok(SelectionSet { ids: selected })
}

/// Compile a glob-style pattern (`*` any run, `?` any character) into an
/// anchored regex over action names
fn compile_glob(pattern: &str) -> Result<Regex, SelectError> {
    let mut expr = String::with_capacity(pattern.len() + 4);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|source| SelectError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionConfig, ActionKind};

    fn graph() -> Graph {
        // api-web -> api -> base; worker -> base; standalone
        Graph::build(vec![
            ActionConfig::new(ActionKind::Build, "base", "base"),
            ActionConfig::new(ActionKind::Build, "api", "api")
                .with_dependency(ActionKind::Build, "base"),
            ActionConfig::new(ActionKind::Build, "api-web", "web")
                .with_dependency(ActionKind::Build, "api"),
            ActionConfig::new(ActionKind::Build, "worker", "worker")
                .with_dependency(ActionKind::Build, "base"),
            ActionConfig::new(ActionKind::Build, "standalone", "standalone"),
        ])
        .unwrap()
    }

    fn keys_of(graph: &Graph, selection: &SelectionSet) -> Vec<String> {
        selection.keys(graph)
    }

    #[test]
    fn test_select_all() {
        let g = graph();
        let selection = select(&g, &SelectCriteria::All, &SelectOptions::default()).unwrap();
        assert_eq!(selection.len(), 5);
    }

    #[test]
    fn test_explicit_key_pulls_dependencies() {
        let g = graph();
        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "api-web")]);
        let selection = select(&g, &criteria, &SelectOptions::default()).unwrap();
        assert_eq!(
            keys_of(&g, &selection),
            vec!["build.api", "build.api-web", "build.base"]
        );
    }

    #[test]
    fn test_explicit_key_not_found() {
        let g = graph();
        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "ghost")]);
        let result = select(&g, &criteria, &SelectOptions::default());
        assert!(matches!(result, Err(SelectError::NoMatchingNodes(key)) if key == "build.ghost"));
    }

    #[test]
    fn test_glob_patterns() {
        let g = graph();
        let criteria = SelectCriteria::Patterns(vec!["api*".to_string()]);
        let selection = select(&g, &criteria, &SelectOptions::default()).unwrap();
        assert_eq!(
            keys_of(&g, &selection),
            vec!["build.api", "build.api-web", "build.base"]
        );
    }

    #[test]
    fn test_glob_no_match_is_empty_not_error() {
        let g = graph();
        let criteria = SelectCriteria::Patterns(vec!["nothing-*".to_string()]);
        let selection = select(&g, &criteria, &SelectOptions::default()).unwrap();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_question_mark_glob() {
        let g = graph();
        let criteria = SelectCriteria::Patterns(vec!["ap?".to_string()]);
        let selection = select(&g, &criteria, &SelectOptions::default()).unwrap();
        // Matches api; base follows as its dependency
        assert_eq!(keys_of(&g, &selection), vec!["build.api", "build.base"]);
    }

    #[test]
    fn test_include_dependants_reaches_transitive() {
        let g = graph();
        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "base")]);
        let options = SelectOptions {
            include_dependants: true,
            ..Default::default()
        };
        let selection = select(&g, &criteria, &options).unwrap();
        // base's dependants: api, api-web (transitive), worker; standalone untouched
        assert_eq!(
            keys_of(&g, &selection),
            vec!["build.api", "build.api-web", "build.base", "build.worker"]
        );
    }

    #[test]
    fn test_skip_dependencies_direct_only() {
        let g = graph();
        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "api-web")]);
        let options = SelectOptions {
            skip_dependencies: true,
            ..Default::default()
        };
        let selection = select(&g, &criteria, &options).unwrap();
        // Direct dependency api is in, transitive base is not
        assert_eq!(keys_of(&g, &selection), vec!["build.api", "build.api-web"]);
    }

    #[test]
    fn test_module_filter() {
        let g = graph();
        let options = SelectOptions {
            modules: vec!["worker".to_string()],
            ..Default::default()
        };
        let selection = select(&g, &SelectCriteria::All, &options).unwrap();
        // Module scope applies to initial resolution; dependencies still follow
        assert_eq!(keys_of(&g, &selection), vec!["build.base", "build.worker"]);
    }

    fn disabled_graph() -> Graph {
        // b (enabled) depends on c (disabled); a (enabled) depends on b
        Graph::build(vec![
            ActionConfig::new(ActionKind::Build, "c", "c").with_disabled(true),
            ActionConfig::new(ActionKind::Build, "b", "b")
                .with_dependency(ActionKind::Build, "c"),
            ActionConfig::new(ActionKind::Build, "a", "a")
                .with_dependency(ActionKind::Build, "b"),
            ActionConfig::new(ActionKind::Build, "loner", "loner"),
        ])
        .unwrap()
    }

    #[test]
    fn test_disabled_excluded_from_all_but_reinstated_as_dependency() {
        let g = disabled_graph();
        let selection = select(&g, &SelectCriteria::All, &SelectOptions::default()).unwrap();
        // c is not directly selectable, but b needs it
        assert_eq!(
            keys_of(&g, &selection),
            vec!["build.a", "build.b", "build.c", "build.loner"]
        );
    }

    #[test]
    fn test_disabled_not_directly_selectable() {
        let g = disabled_graph();
        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "c")]);
        let result = select(&g, &criteria, &SelectOptions::default());
        assert!(matches!(result, Err(SelectError::NoMatchingNodes(_))));
    }

    #[test]
    fn test_selecting_b_reinstates_disabled_dependency() {
        let g = disabled_graph();
        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "b")]);
        let selection = select(&g, &criteria, &SelectOptions::default()).unwrap();
        assert_eq!(keys_of(&g, &selection), vec!["build.b", "build.c"]);
    }

    #[test]
    fn test_dependants_expansion_skips_disabled() {
        // base <- mid (disabled) <- top (enabled)
        let g = Graph::build(vec![
            ActionConfig::new(ActionKind::Build, "base", "base"),
            ActionConfig::new(ActionKind::Build, "mid", "mid")
                .with_dependency(ActionKind::Build, "base")
                .with_disabled(true),
            ActionConfig::new(ActionKind::Build, "top", "top")
                .with_dependency(ActionKind::Build, "mid"),
        ])
        .unwrap();

        let criteria = SelectCriteria::Keys(vec![ActionRef::new(ActionKind::Build, "base")]);
        let options = SelectOptions {
            include_dependants: true,
            ..Default::default()
        };
        let selection = select(&g, &criteria, &options).unwrap();
        // mid is disabled, so expansion stops there and top stays out
        assert_eq!(keys_of(&g, &selection), vec!["build.base"]);
    }
}
