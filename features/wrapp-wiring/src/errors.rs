use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::{
    diagnostics::{Diagnostics, Warning},
    types::{ComponentId, DependencyInfo, DependencyPosition},
};

/// The catalog itself is inconsistent - planning stops immediately
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigurationError {
    #[error("Qualified name '{name}' is declared by more than one component")]
    DuplicateQualifiedName { name: String },
    #[error("Display name '{name}' is declared by more than one component")]
    DuplicateDisplayName { name: String },
    #[error("Declaration index {index} is used by both '{first}' and '{second}'")]
    DuplicateDeclarationIndex {
        index: u32,
        first: ComponentId,
        second: ComponentId,
    },
    #[error("'{component}' has {count} constructor injection points, at most one is allowed")]
    MultipleConstructors { component: ComponentId, count: usize },
    #[error("'{first}' and '{second}' are each only enabled if the other one is missing")]
    MutualMissingCondition {
        first: ComponentId,
        second: ComponentId,
    },
    #[error("'{component}' requires '{target}' to be both present and missing")]
    ConflictingPresenceConditions {
        component: ComponentId,
        target: String,
    },
}

/// Why a dependency could not be bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionFailure {
    /// No enabled component declares the requested type or interface
    NotFound,
    /// No enabled component carries the qualifier as display name
    QualifierNotFound,
    /// Several implementations and no primary one - only reported in strict mode
    Ambiguous { candidates: Vec<ComponentId> },
    /// A depends-on entry names no enabled component
    UnknownDependsOn,
}
impl std::fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionFailure::NotFound => f.write_str("no enabled component provides it"),
            ResolutionFailure::QualifierNotFound => {
                f.write_str("no enabled component has the qualifier as its name")
            }
            ResolutionFailure::Ambiguous { candidates } => {
                let names: Vec<_> = candidates.iter().map(ComponentId::as_str).collect();
                write!(f, "it is ambiguous between [{}]", names.join(", "))
            }
            ResolutionFailure::UnknownDependsOn => f.write_str("no enabled component has that name"),
        }
    }
}

/// A required dependency has no enabled provider
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("'{component}' needs '{dependency}' at {position} but {reason}")]
pub struct ResolutionError {
    pub component: ComponentId,
    pub dependency: DependencyInfo,
    pub position: DependencyPosition,
    pub reason: ResolutionFailure,
}

/// Hard dependencies form a cycle
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("A circular dependency exists through {} - Consider using a deferred dependency", render_cycle(.path))]
pub struct CycleError {
    /// Every component on the cycle exactly once, in dependency order
    pub path: Vec<ComponentId>,
}

fn render_cycle(path: &[ComponentId]) -> String {
    let mut names: Vec<_> = path.iter().map(ComponentId::as_str).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}

/// Any issue preventing a plan
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", content = "error", rename_all = "snake_case")]
pub enum PlanningError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    /// A warning upgraded by strict mode
    #[error("{0} (strict mode)")]
    Strict(Warning),
}

impl PlanningError {
    /// The component the error is attached to, if it concerns a single one
    pub fn component(&self) -> Option<&ComponentId> {
        match self {
            PlanningError::Configuration(error) => match error {
                ConfigurationError::DuplicateDeclarationIndex { second, .. } => Some(second),
                ConfigurationError::MultipleConstructors { component, .. }
                | ConfigurationError::ConflictingPresenceConditions { component, .. } => {
                    Some(component)
                }
                ConfigurationError::MutualMissingCondition { first, .. } => Some(first),
                ConfigurationError::DuplicateQualifiedName { .. }
                | ConfigurationError::DuplicateDisplayName { .. } => None,
            },
            PlanningError::Resolution(error) => Some(&error.component),
            PlanningError::Cycle(error) => error.path.first(),
            PlanningError::Strict(warning) => Some(&warning.component),
        }
    }
}

/// Planning failed - the diagnostics hold every error found in the run
#[derive(Error, Debug, Clone)]
pub struct PlanError {
    pub diagnostics: Diagnostics,
}
impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The wiring plan had one or more errors:".to_string());
        for error in &self.diagnostics.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

/// Errors when reading a catalog document
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    #[error("Failed to read catalog '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_renders_closed_path() {
        let error = CycleError {
            path: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(
            error.to_string(),
            "A circular dependency exists through a -> b -> c -> a - Consider using a deferred dependency"
        );
    }

    #[test]
    fn resolution_error_names_consumer_dependency_and_position() {
        let error = ResolutionError {
            component: "orderService".into(),
            dependency: DependencyInfo {
                requested_type: "app.Payments".into(),
                qualifier: None,
            },
            position: DependencyPosition::ConstructorArgument { index: 2 },
            reason: ResolutionFailure::NotFound,
        };
        assert_eq!(
            error.to_string(),
            "'orderService' needs 'app.Payments' at constructor argument #2 but no enabled component provides it"
        );
    }

    #[test]
    fn plan_error_lists_every_error() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.error(ConfigurationError::DuplicateDisplayName { name: "a".into() });
        diagnostics.error(CycleError {
            path: vec!["x".into()],
        });

        let rendered = PlanError { diagnostics }.to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "The wiring plan had one or more errors:");
        assert!(lines[1].starts_with("- Display name 'a'"));
        assert!(lines[2].starts_with("- A circular dependency exists through x -> x"));
    }
}
