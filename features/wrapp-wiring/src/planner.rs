use std::collections::BTreeMap;

use wrapp_config::PlannerOptions;

use crate::{
    catalog::{Catalog, ComponentDeclaration, Environment, Scope, WrapperKind},
    condition::ConditionEvaluator,
    dependency_graph::{DependencyGraph, DependencyTarget},
    diagnostics::{Diagnostics, Warning, WarningKind},
    errors::{ConfigurationError, PlanError},
    plan::{ArgumentSource, BoundArgument, WiringPlan, WiringStep},
    resolver::ComponentResolver,
};

/// Turns a catalog and an environment into a [`WiringPlan`]
///
/// Every run recomputes everything from its inputs; nothing is kept between runs.
#[derive(Debug, Clone, Default)]
pub struct WiringPlanner {
    options: PlannerOptions,
}

impl WiringPlanner {
    pub fn new(options: PlannerOptions) -> Self {
        WiringPlanner { options }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Plan the wiring of every enabled component.
    ///
    /// Configuration errors stop the run immediately. Resolution and cycle errors are
    /// collected first so a failed run reports all of them together.
    pub fn plan(&self, catalog: &Catalog, environment: &Environment) -> Result<WiringPlan, PlanError> {
        let span = tracing::debug_span!(
            "plan",
            components = catalog.len(),
            strict = self.options.strict
        );
        let _enter = span.enter();

        let mut diagnostics = Diagnostics::default();

        if let Err(errors) = catalog.validate() {
            return Err(fail(diagnostics, errors));
        }

        let environment = environment.with_defaults(&self.options);
        let outcome = match ConditionEvaluator::new(&environment).evaluate(catalog) {
            Ok(outcome) => outcome,
            Err(errors) => return Err(fail(diagnostics, errors)),
        };
        diagnostics.excluded = outcome.excluded;

        let resolver = ComponentResolver::new(&outcome.enabled);
        let graph = DependencyGraph::new(
            &outcome.enabled,
            &resolver,
            &mut diagnostics,
            self.options.strict,
        );

        let order = match graph.topological_order() {
            Ok(order) => order,
            Err(cycle) => {
                diagnostics.error(cycle);
                Vec::new()
            }
        };

        check_hard_edges(&graph, &mut diagnostics);

        if self.options.strict {
            diagnostics.promote_warnings();
        }

        if diagnostics.has_errors() {
            tracing::debug!("Planning failed with {} errors", diagnostics.errors.len());
            return Err(PlanError { diagnostics });
        }

        let singletons = order
            .iter()
            .copied()
            .filter(|node| graph.component(*node).scope == Scope::Singleton);
        // Prototypes are templates only, kept in declaration order
        let prototypes = (0..graph.len()).filter(|node| graph.component(*node).scope == Scope::Prototype);

        let steps: Vec<_> = {
            let mut warnings: BTreeMap<&str, Vec<Warning>> = BTreeMap::new();
            for warning in &diagnostics.warnings {
                warnings
                    .entry(warning.component.as_str())
                    .or_default()
                    .push(warning.clone());
            }

            singletons
                .chain(prototypes)
                .map(|node| {
                    let component = graph.component(node).display_name.as_str();
                    let step_warnings = warnings.remove(component).unwrap_or_default();
                    build_step(&graph, node, step_warnings)
                })
                .collect()
        };

        tracing::debug!(
            "Planned {} steps, {} warnings, {} excluded",
            steps.len(),
            diagnostics.warnings.len(),
            diagnostics.excluded.len()
        );

        Ok(WiringPlan::new(steps, graph.edges().to_vec(), diagnostics))
    }
}

/// Plan with the default options
pub fn plan(catalog: &Catalog, environment: &Environment) -> Result<WiringPlan, PlanError> {
    WiringPlanner::default().plan(catalog, environment)
}

fn fail(mut diagnostics: Diagnostics, errors: Vec<ConfigurationError>) -> PlanError {
    tracing::debug!("Catalog configuration is invalid: {} errors", errors.len());
    for error in errors {
        diagnostics.error(error);
    }
    PlanError { diagnostics }
}

/// Warnings about hard edges that are valid now but fragile
fn check_hard_edges(graph: &DependencyGraph<'_>, diagnostics: &mut Diagnostics) {
    for node in 0..graph.len() {
        let consumer = graph.component(node);
        for provider in graph.hard_dependencies(node).iter().map(|p| graph.component(*p)) {
            if !consumer.is_conditional() && provider.is_conditional() {
                let conditions: Vec<_> = provider.conditions.iter().map(ToString::to_string).collect();
                diagnostics.warn(
                    consumer.id(),
                    WarningKind::ConditionalDependency,
                    format!(
                        "unconditional component depends on '{}' which is only enabled by [{}]",
                        provider.display_name,
                        conditions.join(", ")
                    ),
                );
            }

            if is_eager(consumer) && is_lazy_singleton(provider) {
                diagnostics.warn(
                    consumer.id(),
                    WarningKind::LazyForced,
                    format!(
                        "eager singleton forces lazy '{}' to be constructed at startup",
                        provider.display_name
                    ),
                );
            }
        }
    }
}

fn is_eager(component: &ComponentDeclaration) -> bool {
    component.scope == Scope::Singleton && !component.lazy
}

fn is_lazy_singleton(component: &ComponentDeclaration) -> bool {
    component.scope == Scope::Singleton && component.lazy
}

fn build_step(graph: &DependencyGraph<'_>, node: usize, warnings: Vec<Warning>) -> WiringStep {
    let component = graph.component(node);

    let argument_sources = graph
        .dependencies(node)
        .iter()
        .map(|dependency| {
            let provider = match &dependency.target {
                DependencyTarget::Provider(provider) => Some(graph.component(*provider).id()),
                DependencyTarget::Missing => None,
                DependencyTarget::Literal(token) => {
                    return BoundArgument {
                        position: dependency.position.clone(),
                        source: ArgumentSource::LiteralPlaceholder(token.clone()),
                    };
                }
            };

            let source = match (dependency.wrapper, provider) {
                (WrapperKind::Direct, Some(provider)) if !dependency.allow_missing => {
                    ArgumentSource::Reference(provider)
                }
                (WrapperKind::Deferred, Some(provider)) => ArgumentSource::DeferredReference(provider),
                (_, provider) => ArgumentSource::OptionalReference(provider),
            };

            BoundArgument {
                position: dependency.position.clone(),
                source,
            }
        })
        .collect();

    let depends_on = component
        .depends_on
        .iter()
        .filter_map(|name| graph.index_of(name))
        .map(|provider| graph.component(provider).id())
        .collect();

    WiringStep {
        component: component.id(),
        qualified_name: component.qualified_name.clone(),
        scope: component.scope,
        lazy: component.lazy,
        primary: component.primary,
        level: graph.level(node).unwrap_or_default(),
        argument_sources,
        depends_on,
        lifecycle_hooks: component.lifecycle_hooks.clone(),
        inclusion_reason: inclusion_reason(component),
        warnings,
    }
}

fn inclusion_reason(component: &ComponentDeclaration) -> String {
    if !component.is_conditional() {
        return "unconditional".to_string();
    }

    let conditions: Vec<_> = component.conditions.iter().map(ToString::to_string).collect();
    format!("conditions matched: {}", conditions.join(", "))
}
