use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    catalog::{ComponentDeclaration, DependencySpec, WrapperKind},
    diagnostics::{Diagnostics, WarningKind},
    errors::{CycleError, ResolutionError, ResolutionFailure},
    resolver::{ComponentResolver, Resolution},
    types::{ComponentId, DependencyInfo, DependencyPosition},
};

/// How a consumer relates to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Direct required dependency
    Direct,
    /// Explicit ordering without injection
    DependsOn,
    /// Provider style handle, resolved after construction
    Deferred,
    /// Optional or missing-tolerant dependency
    Optional,
}

impl EdgeKind {
    /// Hard edges constrain construction order and take part in cycle detection
    pub fn is_hard(self) -> bool {
        matches!(self, EdgeKind::Direct | EdgeKind::DependsOn)
    }

    fn of(dependency: &DependencySpec) -> EdgeKind {
        match dependency.wrapper {
            WrapperKind::Direct if dependency.allow_missing => EdgeKind::Optional,
            WrapperKind::Direct => EdgeKind::Direct,
            WrapperKind::Deferred => EdgeKind::Deferred,
            WrapperKind::Optional => EdgeKind::Optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: ComponentId,
    pub to: ComponentId,
    pub kind: EdgeKind,
}

/// What an injected dependency was bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    /// Index of the providing node
    Provider(usize),
    /// No provider - either tolerated or already reported as error
    Missing,
    /// Opaque literal token
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub position: DependencyPosition,
    pub wrapper: WrapperKind,
    pub allow_missing: bool,
    pub target: DependencyTarget,
}

struct GraphNode<'c> {
    component: &'c ComponentDeclaration,
    dependencies: Vec<ResolvedDependency>,
    /// Hard dependency targets, deduplicated, in declaration order
    hard: Vec<usize>,
    level: Option<usize>,
}

/// Graph of the enabled components
///
/// Used to check for circular dependencies and to order construction.
pub struct DependencyGraph<'c> {
    nodes: Vec<GraphNode<'c>>,
    index: BTreeMap<&'c str, usize>,
    edges: Vec<GraphEdge>,
}

impl<'c> DependencyGraph<'c> {
    /// Resolve every dependency of the enabled components.
    ///
    /// Resolution errors and warnings are collected into `diagnostics` for all components.
    /// In strict mode an ambiguous interface resolution is an error instead of a warning.
    pub fn new(
        enabled: &[&'c ComponentDeclaration],
        resolver: &ComponentResolver<'c>,
        diagnostics: &mut Diagnostics,
        strict: bool,
    ) -> Self {
        let mut graph = DependencyGraph {
            nodes: Vec::with_capacity(enabled.len()),
            index: BTreeMap::new(),
            edges: Vec::new(),
        };

        for (position, component) in enabled.iter().copied().enumerate() {
            graph.index.insert(component.display_name.as_str(), position);
            graph.nodes.push(GraphNode {
                component,
                dependencies: Vec::new(),
                hard: Vec::new(),
                level: None,
            });
        }

        for node in 0..graph.nodes.len() {
            graph.resolve_node(node, resolver, diagnostics, strict);
        }

        graph.compute_levels();

        tracing::debug!(
            "Dependency graph has {} nodes and {} edges ({} hard)",
            graph.nodes.len(),
            graph.edges.len(),
            graph.edges.iter().filter(|edge| edge.kind.is_hard()).count()
        );

        graph
    }

    fn resolve_node(
        &mut self,
        node: usize,
        resolver: &ComponentResolver<'c>,
        diagnostics: &mut Diagnostics,
        strict: bool,
    ) {
        let component = self.nodes[node].component;

        for (position, dependency) in component.dependencies() {
            let target = match &dependency.literal {
                Some(token) => DependencyTarget::Literal(token.clone()),
                None => self.resolve_dependency(
                    component,
                    &position,
                    dependency,
                    resolver,
                    diagnostics,
                    strict,
                ),
            };

            if let DependencyTarget::Provider(provider) = target {
                self.add_edge(node, provider, EdgeKind::of(dependency));
            }

            self.nodes[node].dependencies.push(ResolvedDependency {
                position,
                wrapper: dependency.wrapper,
                allow_missing: dependency.allow_missing,
                target,
            });
        }

        for name in &component.depends_on {
            match resolver
                .by_display_name(name)
                .and_then(|provider| self.index.get(provider.display_name.as_str()).copied())
            {
                Some(provider) => self.add_edge(node, provider, EdgeKind::DependsOn),
                None => diagnostics.error(ResolutionError {
                    component: component.id(),
                    dependency: DependencyInfo {
                        requested_type: name.clone(),
                        qualifier: None,
                    },
                    position: DependencyPosition::DependsOn,
                    reason: ResolutionFailure::UnknownDependsOn,
                }),
            }
        }
    }

    fn resolve_dependency(
        &self,
        component: &ComponentDeclaration,
        position: &DependencyPosition,
        dependency: &DependencySpec,
        resolver: &ComponentResolver<'c>,
        diagnostics: &mut Diagnostics,
        strict: bool,
    ) -> DependencyTarget {
        let info = DependencyInfo {
            requested_type: dependency.requested_type.clone(),
            qualifier: dependency.qualifier.clone(),
        };
        let resolution = resolver.resolve(&dependency.requested_type, dependency.qualifier.as_deref());

        match &resolution {
            Resolution::Found(provider) => {
                if dependency.qualifier.is_some() && !provider.provides(&dependency.requested_type) {
                    diagnostics.warn(
                        component.id(),
                        WarningKind::QualifierTypeMismatch,
                        format!(
                            "{position} is qualified '{}' but that component does not declare '{}'",
                            provider.display_name, dependency.requested_type
                        ),
                    );
                }
            }
            Resolution::Ambiguous { chosen, candidates } if strict => {
                tracing::trace!("Ambiguous '{info}' for '{}' in strict mode", component.display_name);
                diagnostics.error(ResolutionError {
                    component: component.id(),
                    dependency: info,
                    position: position.clone(),
                    reason: ResolutionFailure::Ambiguous {
                        candidates: candidates.iter().map(|candidate| candidate.id()).collect(),
                    },
                });
                // Keep the fallback binding so later checks still see the edge
                return self.target_of(chosen);
            }
            Resolution::Ambiguous { chosen, candidates } => {
                let names: Vec<_> = candidates
                    .iter()
                    .map(|candidate| candidate.display_name.as_str())
                    .collect();
                diagnostics.warn(
                    component.id(),
                    WarningKind::Ambiguity,
                    format!(
                        "{position} resolved '{info}' to last declared '{}' among [{}] - mark one primary or add a qualifier",
                        chosen.display_name,
                        names.join(", ")
                    ),
                );
            }
            Resolution::NotFound if dependency.permits_absence() => {
                tracing::trace!("'{info}' for '{}' is absent", component.display_name);
            }
            Resolution::NotFound => {
                let reason = match dependency.qualifier {
                    Some(_) => ResolutionFailure::QualifierNotFound,
                    None => ResolutionFailure::NotFound,
                };
                diagnostics.error(ResolutionError {
                    component: component.id(),
                    dependency: info,
                    position: position.clone(),
                    reason,
                });
            }
        }

        match resolution.component() {
            Some(provider) => self.target_of(provider),
            None => DependencyTarget::Missing,
        }
    }

    fn target_of(&self, provider: &ComponentDeclaration) -> DependencyTarget {
        match self.index.get(provider.display_name.as_str()) {
            Some(index) => DependencyTarget::Provider(*index),
            None => DependencyTarget::Missing,
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, kind: EdgeKind) {
        let edge = GraphEdge {
            from: self.nodes[from].component.id(),
            to: self.nodes[to].component.id(),
            kind,
        };
        tracing::trace!("Edge {} -> {} ({:?})", edge.from, edge.to, edge.kind);
        self.edges.push(edge);

        let hard = &mut self.nodes[from].hard;
        if kind.is_hard() && !hard.contains(&to) {
            hard.push(to);
        }
    }

    /// Assigns levels to every node not on or behind a cycle.
    ///
    /// Walks with an explicit stack so arbitrarily deep chains cannot overflow.
    fn compute_levels(&mut self) {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        struct Frame {
            node: usize,
            next: usize,
            level: Option<usize>,
        }

        fn deeper(level: Option<usize>, dependency_level: Option<usize>) -> Option<usize> {
            match (level, dependency_level) {
                (Some(level), Some(dependency_level)) => Some(level.max(dependency_level + 1)),
                // On or behind a cycle - levels are undefined
                _ => None,
            }
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack: Vec<Frame> = Vec::new();

        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::Visiting;
            stack.push(Frame {
                node: root,
                next: 0,
                level: Some(0),
            });

            while let Some(frame) = stack.last_mut() {
                let node = frame.node;
                let dependency = self.nodes[node].hard.get(frame.next).copied();
                match dependency {
                    Some(dependency) => {
                        frame.next += 1;
                        match marks[dependency] {
                            Mark::Unvisited => {
                                marks[dependency] = Mark::Visiting;
                                stack.push(Frame {
                                    node: dependency,
                                    next: 0,
                                    level: Some(0),
                                });
                            }
                            Mark::Visiting => frame.level = None,
                            Mark::Done => {
                                frame.level = deeper(frame.level, self.nodes[dependency].level)
                            }
                        }
                    }
                    None => {
                        let level = frame.level;
                        stack.pop();
                        marks[node] = Mark::Done;
                        self.nodes[node].level = level;
                        if let Some(parent) = stack.last_mut() {
                            parent.level = deeper(parent.level, level);
                        }
                    }
                }
            }
        }
    }

    /// Depth first search over hard edges in declaration order.
    ///
    /// Returns the first cycle found, every component on it exactly once.
    pub fn detect_cycle(&self) -> Option<CycleError> {
        let mut visited = vec![false; self.nodes.len()];
        let mut on_chain = vec![false; self.nodes.len()];
        // (node, index of its next hard dependency to check)
        let mut dependency_chain: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.nodes.len() {
            if visited[root] {
                continue;
            }
            on_chain[root] = true;
            dependency_chain.push((root, 0));

            while let Some((node, next)) = dependency_chain.last_mut() {
                let node = *node;
                let Some(dependency) = self.nodes[node].hard.get(*next).copied() else {
                    dependency_chain.pop();
                    on_chain[node] = false;
                    visited[node] = true;
                    continue;
                };
                *next += 1;

                // Circular dependency check
                if on_chain[dependency] {
                    let start = dependency_chain
                        .iter()
                        .position(|(entry, _)| *entry == dependency)
                        .unwrap_or_default();
                    let path: Vec<_> = dependency_chain[start..]
                        .iter()
                        .map(|(entry, _)| self.nodes[*entry].component.id())
                        .collect();
                    tracing::debug!("Found a cycle through {} components", path.len());
                    return Some(CycleError { path });
                }

                // Skip if already fully checked
                if !visited[dependency] {
                    on_chain[dependency] = true;
                    dependency_chain.push((dependency, 0));
                }
            }
        }

        None
    }

    /// Node indices with hard providers first, equal levels by declaration index
    pub fn topological_order(&self) -> Result<Vec<usize>, CycleError> {
        if let Some(cycle) = self.detect_cycle() {
            return Err(cycle);
        }

        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by_key(|node| {
            let node = &self.nodes[*node];
            (node.level.unwrap_or_default(), node.component.declaration_index)
        });
        Ok(order)
    }

    /// 0 without hard dependencies, else one more than the deepest hard dependency.
    ///
    /// `None` for components on or depending on a cycle.
    pub fn level(&self, node: usize) -> Option<usize> {
        self.nodes.get(node).and_then(|node| node.level)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, display_name: &str) -> Option<usize> {
        self.index.get(display_name).copied()
    }

    pub fn component(&self, node: usize) -> &'c ComponentDeclaration {
        self.nodes[node].component
    }

    /// Injected dependencies of a node in injection order
    pub fn dependencies(&self, node: usize) -> &[ResolvedDependency] {
        &self.nodes[node].dependencies
    }

    pub fn hard_dependencies(&self, node: usize) -> &[usize] {
        &self.nodes[node].hard
    }

    /// All hard and soft edges, grouped by consumer in declaration order
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{Catalog, DependencySpec};

    struct Built<'c> {
        graph: DependencyGraph<'c>,
        diagnostics: Diagnostics,
    }

    fn build(catalog: &Catalog, strict: bool) -> Built<'_> {
        let enabled: Vec<_> = catalog.components().iter().collect();
        let resolver = ComponentResolver::new(&enabled);
        let mut diagnostics = Diagnostics::default();
        let graph = DependencyGraph::new(&enabled, &resolver, &mut diagnostics, strict);
        Built { graph, diagnostics }
    }

    fn component(name: &str) -> ComponentDeclaration {
        ComponentDeclaration::new(format!("app.{name}"), name)
    }

    fn needs(name: &str, dependencies: &[&str]) -> ComponentDeclaration {
        component(name).constructor(
            dependencies
                .iter()
                .map(|dependency| DependencySpec::direct(format!("app.{dependency}")))
                .collect(),
        )
    }

    fn ordered_names(built: &Built<'_>) -> Vec<String> {
        built
            .graph
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|node| built.graph.component(node).display_name.clone())
            .collect()
    }

    #[test]
    fn providers_come_before_consumers() {
        let catalog = Catalog::builder()
            .add(needs("web", &["service", "config"]))
            .add(needs("service", &["repo"]))
            .add(needs("repo", &["config"]))
            .add(component("config"))
            .build();
        let built = build(&catalog, false);

        assert_eq!(ordered_names(&built), vec!["config", "repo", "service", "web"]);
        let levels: Vec<_> = (0..built.graph.len())
            .map(|node| built.graph.level(node))
            .collect();
        assert_eq!(levels, vec![Some(3), Some(2), Some(1), Some(0)]);
    }

    #[test]
    fn equal_levels_follow_declaration_order() {
        let catalog = Catalog::builder()
            .add(component("b"))
            .add(needs("consumer", &["b", "a"]))
            .add(component("a"))
            .build();
        let built = build(&catalog, false);

        assert_eq!(ordered_names(&built), vec!["b", "a", "consumer"]);
    }

    #[test]
    fn detects_three_node_cycle() {
        let catalog = Catalog::builder()
            .add(needs("a", &["b"]))
            .add(needs("b", &["c"]))
            .add(needs("c", &["a"]))
            .add(needs("d", &["a"]))
            .build();
        let built = build(&catalog, false);

        let cycle = built.graph.detect_cycle().unwrap();
        let path: Vec<_> = cycle.path.iter().map(ComponentId::as_str).collect();
        assert_eq!(path, vec!["a", "b", "c"]);
        assert!(built.graph.topological_order().is_err());
        assert_eq!(built.graph.level(3), None);
    }

    /// `c0 -> c1 -> ... -> c{depth - 1}`, optionally closed back to `c0`
    fn chain(depth: usize, closed: bool) -> Catalog {
        (0..depth)
            .fold(Catalog::builder(), |builder, position| {
                let name = format!("c{position}");
                let next = format!("c{}", position + 1);
                builder.add(match (position + 1 < depth, closed) {
                    (true, _) => needs(&name, &[next.as_str()]),
                    (false, true) => needs(&name, &["c0"]),
                    (false, false) => component(&name),
                })
            })
            .build()
    }

    #[test]
    fn deep_chain_gets_levels() {
        let catalog = chain(50_000, false);
        let built = build(&catalog, false);

        assert!(built.graph.detect_cycle().is_none());
        assert_eq!(built.graph.level(0), Some(49_999));
        assert_eq!(built.graph.level(49_999), Some(0));
        let order = built.graph.topological_order().unwrap();
        assert_eq!(order.first(), Some(&49_999));
        assert_eq!(order.last(), Some(&0));
    }

    #[test]
    fn deep_cycle_is_reported_whole() {
        let catalog = chain(50_000, true);
        let built = build(&catalog, false);

        let cycle = built.graph.detect_cycle().unwrap();
        assert_eq!(cycle.path.len(), 50_000);
        assert_eq!(cycle.path[0], ComponentId::new("c0"));
        assert_eq!(cycle.path[49_999], ComponentId::new("c49999"));
        assert_eq!(built.graph.level(0), None);
    }

    #[test]
    fn cycle_behind_finished_branch_is_found() {
        let catalog = Catalog::builder()
            .add(needs("root", &["leaf", "x"]))
            .add(component("leaf"))
            .add(needs("x", &["leaf", "y"]))
            .add(needs("y", &["x"]))
            .build();
        let built = build(&catalog, false);

        let cycle = built.graph.detect_cycle().unwrap();
        let path: Vec<_> = cycle.path.iter().map(ComponentId::as_str).collect();
        assert_eq!(path, vec!["x", "y"]);
        assert_eq!(built.graph.level(1), Some(0));
        assert_eq!(built.graph.level(0), None);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let catalog = Catalog::builder().add(needs("loop", &["loop"])).build();
        let built = build(&catalog, false);

        assert_eq!(
            built.graph.detect_cycle().unwrap().path,
            vec![ComponentId::new("loop")]
        );
    }

    #[test]
    fn soft_edges_do_not_form_cycles() {
        let catalog = Catalog::builder()
            .add(needs("a", &["b"]))
            .add(component("b").constructor(vec![DependencySpec::deferred("app.a")]))
            .add(component("c").constructor(vec![DependencySpec::optional("app.a")]))
            .add(needs("d", &["c"]).inject(crate::catalog::InjectionPoint::field(
                "back",
                DependencySpec::direct("app.d").allowing_missing(),
            )))
            .build();
        let built = build(&catalog, false);

        assert!(built.graph.detect_cycle().is_none());
        let kinds: Vec<_> = built.graph.edges().iter().map(|edge| edge.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EdgeKind::Direct,
                EdgeKind::Deferred,
                EdgeKind::Optional,
                EdgeKind::Direct,
                EdgeKind::Optional,
            ]
        );
    }

    #[test]
    fn missing_providers_are_all_reported() {
        let catalog = Catalog::builder()
            .add(needs("a", &["nope"]))
            .add(
                component("b")
                    .constructor(vec![DependencySpec::direct("app.Cache").qualified("fast")])
                    .constructor(vec![]),
            )
            .add(component("c").depends_on("ghost"))
            .add(
                component("d")
                    .constructor(vec![DependencySpec::deferred("app.Unknown")])
                    .inject(crate::catalog::InjectionPoint::field(
                        "metrics",
                        DependencySpec::optional("app.Metrics"),
                    )),
            )
            .build();
        let built = build(&catalog, false);

        let reasons: Vec<_> = built
            .diagnostics
            .errors
            .iter()
            .map(|error| (error.component().map(ToString::to_string), error.to_string()))
            .collect();
        assert_eq!(reasons.len(), 4);
        assert_eq!(
            reasons[0].1,
            "'a' needs 'app.nope' at constructor argument #0 but no enabled component provides it"
        );
        assert!(reasons[1].1.contains("qualifier 'fast'"));
        assert_eq!(
            reasons[2].1,
            "'c' needs 'ghost' at depends-on but no enabled component has that name"
        );
        assert_eq!(reasons[3].0.as_deref(), Some("d"));

        let metrics = &built.graph.dependencies(3)[1];
        assert_eq!(metrics.target, DependencyTarget::Missing);
    }

    #[test]
    fn ambiguity_warns_or_fails_in_strict_mode() {
        let catalog = Catalog::builder()
            .add(component("one").implements("app.Store"))
            .add(component("two").implements("app.Store"))
            .add(component("consumer").constructor(vec![DependencySpec::direct("app.Store")]))
            .build();

        let lenient = build(&catalog, false);
        assert!(!lenient.diagnostics.has_errors());
        assert_eq!(lenient.diagnostics.warnings_of(WarningKind::Ambiguity).count(), 1);
        assert_eq!(
            lenient.graph.dependencies(2)[0].target,
            DependencyTarget::Provider(1)
        );

        let strict = build(&catalog, true);
        assert!(strict.diagnostics.warnings.is_empty());
        assert!(strict.diagnostics.errors[0]
            .to_string()
            .ends_with("it is ambiguous between [one, two]"));
    }

    #[test]
    fn depends_on_adds_hard_edge_without_argument() {
        let catalog = Catalog::builder()
            .add(component("migrations"))
            .add(component("server").depends_on("migrations"))
            .build();
        let built = build(&catalog, false);

        assert_eq!(built.graph.hard_dependencies(1), &[0]);
        assert!(built.graph.dependencies(1).is_empty());
        assert_eq!(built.graph.edges()[0].kind, EdgeKind::DependsOn);
        assert_eq!(built.graph.level(1), Some(1));
    }

    #[test]
    fn literals_and_qualifier_mismatch() {
        let catalog = Catalog::builder()
            .add(component("clock"))
            .add(component("pool").constructor(vec![
                DependencySpec::literal("u32", "${pool.size}"),
                DependencySpec::direct("app.Timer").qualified("clock"),
            ]))
            .build();
        let built = build(&catalog, false);

        assert_eq!(
            built.graph.dependencies(1)[0].target,
            DependencyTarget::Literal("${pool.size}".into())
        );
        assert_eq!(
            built
                .diagnostics
                .warnings_of(WarningKind::QualifierTypeMismatch)
                .count(),
            1
        );
        assert_eq!(built.graph.hard_dependencies(1), &[0]);
    }
}
