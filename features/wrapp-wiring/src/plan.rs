use serde::Serialize;

use crate::{
    catalog::{LifecycleHooks, Scope},
    dependency_graph::GraphEdge,
    diagnostics::{Diagnostics, Warning},
    types::{ComponentId, DependencyPosition},
};

/// Where a constructor argument, field or method argument comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgumentSource {
    /// The provider's instance, constructed before the consumer
    Reference(ComponentId),
    /// A deferred handle, bound once the provider exists
    DeferredReference(ComponentId),
    /// Decided at plan time - `None` means the dependency is absent
    OptionalReference(Option<ComponentId>),
    /// Opaque token for code emission
    LiteralPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundArgument {
    pub position: DependencyPosition,
    pub source: ArgumentSource,
}

/// Construction recipe of a single component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WiringStep {
    pub component: ComponentId,
    pub qualified_name: String,
    pub scope: Scope,
    pub lazy: bool,
    pub primary: bool,
    /// Hard dependency depth; equal levels may be constructed in parallel
    pub level: usize,
    pub argument_sources: Vec<BoundArgument>,
    /// Components to construct first without injecting them
    pub depends_on: Vec<ComponentId>,
    pub lifecycle_hooks: LifecycleHooks,
    pub inclusion_reason: String,
    /// Warnings about this component, e.g. an ambiguous fallback binding.
    /// The same warnings are listed in the plan's diagnostics.
    pub warnings: Vec<Warning>,
}

impl WiringStep {
    /// Constructed unconditionally at startup, in plan order
    pub fn is_eager(&self) -> bool {
        self.scope == Scope::Singleton && !self.lazy
    }

    /// Components this step references in any way
    pub fn referenced_components(&self) -> impl Iterator<Item = &ComponentId> {
        self.argument_sources
            .iter()
            .filter_map(|argument| match &argument.source {
                ArgumentSource::Reference(id) | ArgumentSource::DeferredReference(id) => Some(id),
                ArgumentSource::OptionalReference(id) => id.as_ref(),
                ArgumentSource::LiteralPlaceholder(_) => None,
            })
            .chain(&self.depends_on)
    }
}

/// The resolved construction plan handed to code emission.
///
/// Singletons come first in topological order, followed by prototype templates in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WiringPlan {
    steps: Vec<WiringStep>,
    edges: Vec<GraphEdge>,
    diagnostics: Diagnostics,
}

impl WiringPlan {
    pub(crate) fn new(steps: Vec<WiringStep>, edges: Vec<GraphEdge>, diagnostics: Diagnostics) -> Self {
        WiringPlan {
            steps,
            edges,
            diagnostics,
        }
    }

    pub fn steps(&self) -> &[WiringStep] {
        &self.steps
    }

    pub fn step(&self, component: &str) -> Option<&WiringStep> {
        self.steps
            .iter()
            .find(|step| step.component.as_str() == component)
    }

    /// The mandatory startup construction sequence
    pub fn eager_steps(&self) -> impl Iterator<Item = &WiringStep> {
        self.steps.iter().filter(|step| step.is_eager())
    }

    pub fn lazy_steps(&self) -> impl Iterator<Item = &WiringStep> {
        self.steps
            .iter()
            .filter(|step| step.scope == Scope::Singleton && step.lazy)
    }

    pub fn prototype_templates(&self) -> impl Iterator<Item = &WiringStep> {
        self.steps
            .iter()
            .filter(|step| step.scope == Scope::Prototype)
    }

    /// Eager steps grouped by level, lowest first
    pub fn eager_levels(&self) -> Vec<Vec<&WiringStep>> {
        let mut levels: Vec<Vec<&WiringStep>> = Vec::new();
        for step in self.eager_steps() {
            if levels.len() <= step.level {
                levels.resize_with(step.level + 1, Vec::new);
            }
            levels[step.level].push(step);
        }
        levels.retain(|level| !level.is_empty());
        levels
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Warnings and exclusions of the run; never contains errors
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Graphviz rendering of the enabled components and every edge
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph wiring {\n");

        for step in &self.steps {
            let shape = match step.scope {
                Scope::Singleton => "box",
                Scope::Prototype => "oval",
            };
            let mut attributes = vec![format!("shape={shape}")];
            if step.primary {
                attributes.push("style=filled".to_string());
            }
            if step.lazy {
                attributes.push(format!("label=\"{} (lazy)\"", step.component));
            }
            dot.push_str(&format!(
                "    \"{}\" [{}];\n",
                step.component,
                attributes.join(", ")
            ));
        }

        for edge in &self.edges {
            let style = if edge.kind.is_hard() { "" } else { " [style=dashed]" };
            dot.push_str(&format!("    \"{}\" -> \"{}\"{style};\n", edge.from, edge.to));
        }

        dot.push('}');
        dot.push('\n');
        dot
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::dependency_graph::EdgeKind;

    fn step(name: &str, scope: Scope, lazy: bool, level: usize) -> WiringStep {
        WiringStep {
            component: name.into(),
            qualified_name: format!("app.{name}"),
            scope,
            lazy,
            primary: false,
            level,
            argument_sources: Vec::new(),
            depends_on: Vec::new(),
            lifecycle_hooks: LifecycleHooks::default(),
            inclusion_reason: "unconditional".into(),
            warnings: Vec::new(),
        }
    }

    fn sample() -> WiringPlan {
        let mut config = step("config", Scope::Singleton, false, 0);
        config.primary = true;
        let mut service = step("service", Scope::Singleton, false, 1);
        service.argument_sources.push(BoundArgument {
            position: DependencyPosition::ConstructorArgument { index: 0 },
            source: ArgumentSource::Reference("config".into()),
        });
        let mut request = step("request", Scope::Prototype, false, 2);
        request.argument_sources.push(BoundArgument {
            position: DependencyPosition::Field {
                name: "audit".into(),
            },
            source: ArgumentSource::DeferredReference("audit".into()),
        });

        WiringPlan::new(
            vec![
                config,
                step("clock", Scope::Singleton, false, 0),
                step("audit", Scope::Singleton, true, 0),
                service,
                request,
            ],
            vec![
                GraphEdge {
                    from: "service".into(),
                    to: "config".into(),
                    kind: EdgeKind::Direct,
                },
                GraphEdge {
                    from: "request".into(),
                    to: "audit".into(),
                    kind: EdgeKind::Deferred,
                },
            ],
            Diagnostics::default(),
        )
    }

    fn names<'a>(steps: impl IntoIterator<Item = &'a WiringStep>) -> Vec<&'a str> {
        steps.into_iter().map(|step| step.component.as_str()).collect()
    }

    #[test]
    fn subsequences_split_by_scope_and_laziness() {
        let plan = sample();
        assert_eq!(names(plan.eager_steps()), vec!["config", "clock", "service"]);
        assert_eq!(names(plan.lazy_steps()), vec!["audit"]);
        assert_eq!(names(plan.prototype_templates()), vec!["request"]);
        assert_eq!(plan.step("audit").map(|step| step.lazy), Some(true));
    }

    #[test]
    fn eager_levels_batch_parallel_construction() {
        let plan = sample();
        let levels: Vec<_> = plan.eager_levels().into_iter().map(names).collect();
        assert_eq!(levels, vec![vec!["config", "clock"], vec!["service"]]);
    }

    #[test]
    fn dot_export_marks_scope_primary_and_soft_edges() {
        let dot = sample().to_dot();
        assert!(dot.starts_with("digraph wiring {\n"));
        assert!(dot.contains("\"config\" [shape=box, style=filled];"));
        assert!(dot.contains("\"request\" [shape=oval];"));
        assert!(dot.contains("\"audit\" [shape=box, label=\"audit (lazy)\"];"));
        assert!(dot.contains("\"service\" -> \"config\";"));
        assert!(dot.contains("\"request\" -> \"audit\" [style=dashed];"));
    }

    #[test]
    fn json_tags_argument_sources() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let source = &value["steps"][3]["argument_sources"][0];
        assert_eq!(source["position"]["kind"], "constructor_argument");
        assert_eq!(source["source"]["kind"], "reference");
        assert_eq!(source["source"]["value"], "config");
        assert_eq!(value["edges"][1]["kind"], "deferred");
    }

    #[test]
    fn referenced_components_include_depends_on() {
        let mut step = step("server", Scope::Singleton, false, 1);
        step.argument_sources.push(BoundArgument {
            position: DependencyPosition::ConstructorArgument { index: 0 },
            source: ArgumentSource::OptionalReference(None),
        });
        step.argument_sources.push(BoundArgument {
            position: DependencyPosition::ConstructorArgument { index: 1 },
            source: ArgumentSource::LiteralPlaceholder("8080".into()),
        });
        step.depends_on.push("migrations".into());

        let referenced: Vec<_> = step.referenced_components().map(ComponentId::as_str).collect();
        assert_eq!(referenced, vec!["migrations"]);
    }
}
