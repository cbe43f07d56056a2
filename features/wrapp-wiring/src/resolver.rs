use std::collections::BTreeMap;

use crate::catalog::ComponentDeclaration;

/// Outcome of looking up a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'c> {
    Found(&'c ComponentDeclaration),
    /// Several implementations of an interface and no single primary one.
    ///
    /// `chosen` is the candidate declared last, `candidates` are in declaration order.
    Ambiguous {
        chosen: &'c ComponentDeclaration,
        candidates: Vec<&'c ComponentDeclaration>,
    },
    NotFound,
}

impl<'c> Resolution<'c> {
    /// The component a dependency is bound to, ambiguity notwithstanding
    pub fn component(&self) -> Option<&'c ComponentDeclaration> {
        match self {
            Resolution::Found(component) | Resolution::Ambiguous { chosen: component, .. } => {
                Some(*component)
            }
            Resolution::NotFound => None,
        }
    }
}

/// Lookup indices over the enabled components
///
/// Only exact identity is matched: a component provides its own qualified name and the
/// interfaces it declares, nothing else.
#[derive(Debug, Default)]
pub struct ComponentResolver<'c> {
    by_type: BTreeMap<&'c str, &'c ComponentDeclaration>,
    /// Implementations sorted by declaration index
    by_interface: BTreeMap<&'c str, Vec<&'c ComponentDeclaration>>,
    by_name: BTreeMap<&'c str, &'c ComponentDeclaration>,
}

impl<'c> ComponentResolver<'c> {
    pub fn new(enabled: &[&'c ComponentDeclaration]) -> Self {
        let mut resolver = ComponentResolver::default();

        for component in enabled.iter().copied() {
            resolver
                .by_type
                .insert(component.qualified_name.as_str(), component);
            resolver
                .by_name
                .insert(component.display_name.as_str(), component);

            for interface in &component.implemented_interfaces {
                resolver
                    .by_interface
                    .entry(interface.as_str())
                    .or_default()
                    .push(component);
            }
        }

        for implementations in resolver.by_interface.values_mut() {
            implementations.sort_by_key(|component| component.declaration_index);
        }

        tracing::debug!(
            "Indexed {} types, {} interfaces and {} names",
            resolver.by_type.len(),
            resolver.by_interface.len(),
            resolver.by_name.len()
        );

        resolver
    }

    /// Find the provider of `requested_type`.
    ///
    /// A qualifier is looked up as display name only and never falls back to the type.
    pub fn resolve(&self, requested_type: &str, qualifier: Option<&str>) -> Resolution<'c> {
        if let Some(qualifier) = qualifier {
            return match self.by_name.get(qualifier).copied() {
                Some(component) => Resolution::Found(component),
                None => Resolution::NotFound,
            };
        }

        if let Some(component) = self.by_type.get(requested_type).copied() {
            return Resolution::Found(component);
        }

        let candidates = self.implementations(requested_type);
        match candidates {
            [] => Resolution::NotFound,
            [single] => Resolution::Found(*single),
            _ => {
                let mut primaries = candidates.iter().filter(|component| component.primary);
                if let (Some(primary), None) = (primaries.next(), primaries.next()) {
                    return Resolution::Found(*primary);
                }

                match candidates.last() {
                    Some(chosen) => Resolution::Ambiguous {
                        chosen: *chosen,
                        candidates: candidates.to_vec(),
                    },
                    None => Resolution::NotFound,
                }
            }
        }
    }

    pub fn by_display_name(&self, display_name: &str) -> Option<&'c ComponentDeclaration> {
        self.by_name.get(display_name).copied()
    }

    /// Enabled implementations of an interface in declaration order
    pub fn implementations(&self, interface: &str) -> &[&'c ComponentDeclaration] {
        self.by_interface
            .get(interface)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
