use serde::Serialize;

use crate::{errors::PlanningError, types::ComponentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An interface had several implementations and none was primary
    Ambiguity,
    /// A qualifier selected a component not declaring the requested type
    QualifierTypeMismatch,
    /// An unconditional component hard-depends on a conditional one
    ConditionalDependency,
    /// An eager singleton hard-depends on a lazy one, forcing it at startup
    LazyForced,
}

/// Non-fatal finding attached to a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub component: ComponentId,
    pub kind: WarningKind,
    pub message: String,
}
impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.component, self.message)
    }
}

/// Why a component was left out of the enabled set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    PropertyMissing {
        name: String,
    },
    PropertyMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    FlagsMissing {
        names: Vec<String>,
    },
    ProfileMismatch {
        profiles: Vec<String>,
        negated: bool,
    },
    /// Another component satisfies a missing-component target
    TargetPresent {
        target: String,
        provider: ComponentId,
    },
    /// No other component satisfies a present-component target
    TargetMissing {
        target: String,
    },
}
impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::PropertyMissing { name } => {
                write!(f, "property '{name}' is not set")
            }
            ExclusionReason::PropertyMismatch {
                name,
                expected,
                actual,
            } => write!(f, "property '{name}' is '{actual}' but '{expected}' is expected"),
            ExclusionReason::FlagsMissing { names } => {
                write!(f, "presence flags [{}] are not set", names.join(", "))
            }
            ExclusionReason::ProfileMismatch { profiles, negated } => {
                let bang = if *negated { "!" } else { "" };
                write!(f, "no active profile matches {bang}[{}]", profiles.join(", "))
            }
            ExclusionReason::TargetPresent { target, provider } => {
                write!(f, "'{target}' must be missing but '{provider}' provides it")
            }
            ExclusionReason::TargetMissing { target } => {
                write!(f, "'{target}' must be present but no other component provides it")
            }
        }
    }
}

/// A component left out of the plan with every failed condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub component: ComponentId,
    pub reasons: Vec<ExclusionReason>,
}
impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reasons: Vec<_> = self.reasons.iter().map(ToString::to_string).collect();
        write!(f, "'{}' excluded: {}", self.component, reasons.join("; "))
    }
}

/// Everything noteworthy found in a planning run, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub errors: Vec<PlanningError>,
    pub warnings: Vec<Warning>,
    pub excluded: Vec<Exclusion>,
}

impl Diagnostics {
    pub fn error(&mut self, error: impl Into<PlanningError>) {
        self.errors.push(error.into());
    }

    pub fn warn(&mut self, component: ComponentId, kind: WarningKind, message: impl Into<String>) {
        let warning = Warning {
            component,
            kind,
            message: message.into(),
        };
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |warning| warning.kind == kind)
    }

    /// Move every warning into the errors
    pub(crate) fn promote_warnings(&mut self) {
        for warning in self.warnings.drain(..) {
            self.errors.push(PlanningError::Strict(warning));
        }
    }

    /// Human readable report, one finding per line
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(self.errors.iter().map(|error| format!("error: {error}")));
        lines.extend(self.warnings.iter().map(|warning| format!("warning: {warning}")));
        lines.extend(self.excluded.iter().map(|exclusion| format!("note: {exclusion}")));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CycleError;

    #[test]
    fn strict_promotion_moves_warnings_into_errors() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warn("a".into(), WarningKind::Ambiguity, "picked 'b'");
        diagnostics.promote_warnings();

        assert!(diagnostics.warnings.is_empty());
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(diagnostics.errors[0].to_string(), "'a': picked 'b' (strict mode)");
    }

    #[test]
    fn report_orders_errors_warnings_then_notes() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.excluded.push(Exclusion {
            component: "devTools".into(),
            reasons: vec![ExclusionReason::PropertyMissing {
                name: "tools.enabled".into(),
            }],
        });
        diagnostics.warn("a".into(), WarningKind::LazyForced, "forces 'b'");
        diagnostics.error(CycleError {
            path: vec!["a".into(), "b".into()],
        });

        let report = diagnostics.report();
        let prefixes: Vec<_> = report
            .lines()
            .map(|line| line.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(prefixes, vec!["error", "warning", "note"]);
        assert!(report.ends_with("'devTools' excluded: property 'tools.enabled' is not set"));
    }
}
