//! Reduces a catalog to the components enabled in an [`Environment`].
//!
//! Evaluation runs in two passes. The first decides property, presence-flag and profile
//! conditions for every component on its own and yields a tentative enabled set. The second
//! decides missing/present-component conditions against that tentative set, once, without
//! iterating to a fixed point.

use crate::{
    catalog::{Catalog, ComponentDeclaration, ConditionExpr, Environment},
    diagnostics::{Exclusion, ExclusionReason},
    errors::ConfigurationError,
};

/// Enabled components in declaration order, plus the excluded ones with their reasons
#[derive(Debug)]
pub struct ConditionOutcome<'c> {
    pub enabled: Vec<&'c ComponentDeclaration>,
    pub excluded: Vec<Exclusion>,
}

pub struct ConditionEvaluator<'e> {
    environment: &'e Environment,
}

impl<'e> ConditionEvaluator<'e> {
    pub fn new(environment: &'e Environment) -> Self {
        ConditionEvaluator { environment }
    }

    /// Split the catalog into enabled and excluded components.
    ///
    /// Fails if two tentatively enabled components are each conditioned on the other being
    /// missing, as a single pass can not decide between them.
    pub fn evaluate<'c>(
        &self,
        catalog: &'c Catalog,
    ) -> Result<ConditionOutcome<'c>, Vec<ConfigurationError>> {
        let components = catalog.components();

        // Pass 1 - conditions decidable from the environment alone
        let mut reasons: Vec<Vec<ExclusionReason>> = components
            .iter()
            .map(|component| {
                component
                    .conditions
                    .iter()
                    .filter(|condition| !condition.depends_on_components())
                    .filter_map(|condition| self.check_environment(condition))
                    .collect()
            })
            .collect();

        let tentative: Vec<&ComponentDeclaration> = components
            .iter()
            .zip(&reasons)
            .filter(|(_, reasons)| reasons.is_empty())
            .map(|(component, _)| component)
            .collect();

        tracing::debug!(
            "{} of {} components pass environment conditions",
            tentative.len(),
            components.len()
        );

        let conflicts = mutual_missing_conditions(&tentative);
        if !conflicts.is_empty() {
            return Err(conflicts);
        }

        // Pass 2 - component conditions against the tentative set
        for (position, component) in components.iter().enumerate() {
            if !reasons[position].is_empty() {
                continue;
            }
            reasons[position] = component
                .conditions
                .iter()
                .flat_map(|condition| check_components(component, condition, &tentative))
                .collect();
        }

        let mut enabled = Vec::new();
        let mut excluded = Vec::new();
        for (component, reasons) in components.iter().zip(reasons) {
            if reasons.is_empty() {
                enabled.push(component);
            } else {
                tracing::trace!("Excluding '{}': {reasons:?}", component.display_name);
                excluded.push(Exclusion {
                    component: component.id(),
                    reasons,
                });
            }
        }

        tracing::debug!("{} components enabled, {} excluded", enabled.len(), excluded.len());
        Ok(ConditionOutcome { enabled, excluded })
    }

    /// Returns the reason if `condition` fails in the environment
    fn check_environment(&self, condition: &ConditionExpr) -> Option<ExclusionReason> {
        let environment = self.environment;
        match condition {
            ConditionExpr::Property {
                name,
                expected_value,
                match_if_missing,
            } => match (environment.properties.get(name), expected_value) {
                (None, _) if *match_if_missing => None,
                (None, _) => Some(ExclusionReason::PropertyMissing { name: name.clone() }),
                (Some(_), None) => None,
                (Some(actual), Some(expected)) if actual == expected => None,
                (Some(actual), Some(expected)) => Some(ExclusionReason::PropertyMismatch {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                }),
            },
            ConditionExpr::ClassPresence { names } => {
                let missing: Vec<String> = names
                    .iter()
                    .filter(|name| !environment.present_flags.contains(*name))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then_some(ExclusionReason::FlagsMissing { names: missing })
            }
            ConditionExpr::Profile { profiles, negated } => {
                (!profile_matches(environment, profiles, *negated)).then(|| {
                    ExclusionReason::ProfileMismatch {
                        profiles: profiles.clone(),
                        negated: *negated,
                    }
                })
            }
            ConditionExpr::MissingComponent { .. } | ConditionExpr::PresentComponent { .. } => None,
        }
    }
}

/// Union over the entries, each entry flipped if negated.
///
/// An empty profile list matches.
fn profile_matches(environment: &Environment, profiles: &[String], negated: bool) -> bool {
    if profiles.is_empty() {
        return true;
    }

    profiles.iter().any(|entry| {
        let (name, entry_negated) = match entry.trim().strip_prefix('!') {
            Some(name) => (name.trim(), true),
            None => (entry.trim(), false),
        };
        environment.active_profiles.contains(name) != (entry_negated ^ negated)
    })
}

/// The first other component satisfying a type or display-name target
fn provider_of<'c>(
    component: &ComponentDeclaration,
    target_type: Option<&str>,
    target_name: Option<&str>,
    tentative: &[&'c ComponentDeclaration],
) -> Option<&'c ComponentDeclaration> {
    tentative
        .iter()
        .copied()
        .filter(|other| other.display_name != component.display_name)
        .find(|other| {
            target_type.is_some_and(|ty| other.provides(ty))
                || target_name.is_some_and(|name| other.display_name == name)
        })
}

fn check_components(
    component: &ComponentDeclaration,
    condition: &ConditionExpr,
    tentative: &[&ComponentDeclaration],
) -> Vec<ExclusionReason> {
    match condition {
        ConditionExpr::MissingComponent {
            target_types,
            target_names,
        } => {
            let by_type = target_types.iter().map(|ty| (ty, Some(ty.as_str()), None));
            let by_name = target_names.iter().map(|name| (name, None, Some(name.as_str())));
            by_type
                .chain(by_name)
                .filter_map(|(target, ty, name)| {
                    provider_of(component, ty, name, tentative).map(|provider| {
                        ExclusionReason::TargetPresent {
                            target: target.clone(),
                            provider: provider.id(),
                        }
                    })
                })
                .collect()
        }
        ConditionExpr::PresentComponent {
            target_types,
            target_names,
        } => {
            let by_type = target_types.iter().map(|ty| (ty, Some(ty.as_str()), None));
            let by_name = target_names.iter().map(|name| (name, None, Some(name.as_str())));
            by_type
                .chain(by_name)
                .filter(|(_, ty, name)| provider_of(component, *ty, *name, tentative).is_none())
                .map(|(target, _, _)| ExclusionReason::TargetMissing {
                    target: target.clone(),
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Whether one of `component`'s missing-component conditions targets `other`
fn excludes_if_present(component: &ComponentDeclaration, other: &ComponentDeclaration) -> bool {
    component.conditions.iter().any(|condition| match condition {
        ConditionExpr::MissingComponent {
            target_types,
            target_names,
        } => {
            target_types.iter().any(|ty| other.provides(ty))
                || target_names.iter().any(|name| *name == other.display_name)
        }
        _ => false,
    })
}

fn mutual_missing_conditions(tentative: &[&ComponentDeclaration]) -> Vec<ConfigurationError> {
    let guarded: Vec<_> = tentative
        .iter()
        .copied()
        .filter(|component| {
            component
                .conditions
                .iter()
                .any(|condition| matches!(condition, ConditionExpr::MissingComponent { .. }))
        })
        .collect();

    let mut errors = Vec::new();
    for (position, first) in guarded.iter().enumerate() {
        for second in &guarded[position + 1..] {
            if excludes_if_present(first, second) && excludes_if_present(second, first) {
                errors.push(ConfigurationError::MutualMissingCondition {
                    first: first.id(),
                    second: second.id(),
                });
            }
        }
    }
    errors
}
