//! Module dependency resolution and build ordering
//!
//! Given a requested interpreter version, a target platform and an
//! optional explicit module selection, computes the closed set of required
//! modules and a topologically valid build order. Pure function of its
//! inputs and the registry: no side effects, deterministic output.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use semver::Version;
use tracing::debug;

use portapy_platform::Platform;

use crate::error::CoreError;
use crate::registry::{ModuleSpec, Registry};

/// How the module set was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Platform default set, closed over transitive dependencies.
    Auto,
    /// User-named modules (still closed over dependencies).
    Explicit(Vec<String>),
}

/// An immutable, ordered build plan. No module appears before a
/// dependency it lists; the interpreter is always last.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub family: String,
    pub version: Version,
    pub platform: Platform,
    pub modules: Vec<ModuleSpec>,
    pub selection: Selection,
}

impl BuildPlan {
    /// Names of the selected modules, in build order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name == name)
    }

    pub fn interpreter(&self) -> &ModuleSpec {
        // The resolver guarantees the interpreter is present and last.
        &self.modules[self.modules.len() - 1]
    }
}

/// Resolve a build plan.
///
/// Explicit selections are validated eagerly: unknown names and modules
/// whose platform predicate rejects the target fail here, before any
/// filesystem or network side effect. Cycles in the registry metadata are
/// a fatal configuration error, never silently broken.
pub fn resolve(
    registry: &Registry,
    version: &Version,
    platform: Platform,
    selection: Selection,
) -> Result<BuildPlan, CoreError> {
    let mut selected: Vec<&ModuleSpec> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    let roots: Vec<&ModuleSpec> = match &selection {
        Selection::Explicit(names) => {
            let mut roots = Vec::new();
            for name in names {
                let module = registry.require(name)?;
                if !module.supports(platform) {
                    return Err(CoreError::UnsupportedModule {
                        module: module.name.clone(),
                        platform: platform.to_string(),
                    });
                }
                roots.push(module);
            }
            roots
        }
        Selection::Auto => registry
            .iter()
            .filter(|m| m.default && !m.interpreter && m.supports(platform))
            .collect(),
    };

    // Close over transitive dependencies, breadth-first.
    let mut queue: Vec<&ModuleSpec> = roots;
    while let Some(module) = queue.pop() {
        if !seen.insert(module.name.as_str()) {
            continue;
        }
        selected.push(module);
        for dep in &module.dependencies {
            let dep_module = registry.require(dep)?;
            if !dep_module.supports(platform) {
                // A required dependency that cannot build here makes the
                // whole selection unsupportable.
                return Err(CoreError::UnsupportedModule {
                    module: dep_module.name.clone(),
                    platform: platform.to_string(),
                });
            }
            queue.push(dep_module);
        }
    }

    // The interpreter is mandatory and always built last.
    let interpreter = registry.interpreter();
    if seen.insert(interpreter.name.as_str()) {
        selected.push(interpreter);
    }

    let ordered = topo_order(registry, &selected)?;
    debug!(order = ?ordered.iter().map(|m| &m.name).collect::<Vec<_>>(), "resolved build order");

    Ok(BuildPlan {
        family: interpreter.name.clone(),
        version: version.clone(),
        platform,
        modules: ordered,
        selection,
    })
}

/// Topological sort with a deterministic tie-break: among modules with no
/// ordering constraint between them, registry declaration order wins.
fn topo_order(registry: &Registry, selected: &[&ModuleSpec]) -> Result<Vec<ModuleSpec>, CoreError> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for module in selected {
        let idx = graph.add_node(module.name.clone());
        nodes.insert(module.name.as_str(), idx);
    }

    for module in selected {
        let dependent = nodes[module.name.as_str()];
        for dep in &module.dependencies {
            if let Some(&dep_idx) = nodes.get(dep.as_str()) {
                // Edge from dependency to dependent
                graph.add_edge(dep_idx, dependent, ());
            }
        }
        // Implicit edge: everything must be staged before the interpreter.
        if !module.interpreter {
            let interp = nodes[registry.interpreter().name.as_str()];
            graph.add_edge(dependent, interp, ());
        }
    }

    // Kahn's algorithm, draining ready nodes in declaration order so the
    // result is stable across runs.
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
        .collect();

    let mut remaining: Vec<NodeIndex> = graph.node_indices().collect();
    remaining.sort_by_key(|&idx| registry.position(&graph[idx]).unwrap_or(usize::MAX));

    let mut order: Vec<ModuleSpec> = Vec::with_capacity(selected.len());
    while !remaining.is_empty() {
        let ready_pos = remaining.iter().position(|idx| in_degree[idx] == 0);
        let Some(pos) = ready_pos else {
            // Every remaining node still has an unmet dependency: a cycle
            // in the static metadata. Fatal, never silently broken.
            let name = graph[remaining[0]].clone();
            return Err(CoreError::DependencyCycle(name));
        };

        let idx = remaining.remove(pos);
        for neighbor in graph.neighbors_directed(idx, Direction::Outgoing) {
            if let Some(deg) = in_degree.get_mut(&neighbor) {
                *deg = deg.saturating_sub(1);
            }
        }

        let name = &graph[idx];
        if let Some(module) = selected.iter().find(|m| &m.name == name) {
            order.push((*module).clone());
        }
    }

    Ok(order)
}
