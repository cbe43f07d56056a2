//! Immutable input model: declared components and the environment they are planned against.
//!
//! A [`Catalog`] is a snapshot handed over by whatever extracted the component metadata. It is
//! never mutated once built; every later stage derives its own data from it.

use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};
use wrapp_config::{EnvironmentConfig, PlannerOptions};

use crate::{
    errors::{CatalogLoadError, ConfigurationError},
    types::{ComponentId, DependencyPosition},
};

/// Lifetime of a component instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One shared instance
    #[default]
    Singleton,
    /// A fresh instance per request
    Prototype,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionKind {
    Constructor,
    Field,
    Method,
}

/// How a dependency is handed to its consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperKind {
    /// The provider itself, constructed before the consumer
    #[default]
    Direct,
    /// A handle resolved after construction (Provider style)
    Deferred,
    /// The provider if one is enabled, absent otherwise
    Optional,
}

/// A single requested dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub requested_type: String,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default)]
    pub wrapper: WrapperKind,
    #[serde(default)]
    pub allow_missing: bool,
    /// Opaque literal/config expression, passed through untouched
    #[serde(default)]
    pub literal: Option<String>,
}

impl DependencySpec {
    fn new(requested_type: impl Into<String>, wrapper: WrapperKind) -> Self {
        DependencySpec {
            requested_type: requested_type.into(),
            qualifier: None,
            wrapper,
            allow_missing: false,
            literal: None,
        }
    }

    pub fn direct(requested_type: impl Into<String>) -> Self {
        Self::new(requested_type, WrapperKind::Direct)
    }

    pub fn deferred(requested_type: impl Into<String>) -> Self {
        Self::new(requested_type, WrapperKind::Deferred)
    }

    pub fn optional(requested_type: impl Into<String>) -> Self {
        Self::new(requested_type, WrapperKind::Optional)
    }

    /// A literal value; `token` is handed to code emission as is
    pub fn literal(requested_type: impl Into<String>, token: impl Into<String>) -> Self {
        DependencySpec {
            literal: Some(token.into()),
            ..Self::direct(requested_type)
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn allowing_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    /// Whether the provider must be fully constructed before the consumer
    pub fn is_hard(&self) -> bool {
        self.literal.is_none() && self.wrapper == WrapperKind::Direct && !self.allow_missing
    }

    /// Whether a missing provider is tolerated
    pub fn permits_absence(&self) -> bool {
        self.allow_missing || self.wrapper == WrapperKind::Optional
    }
}

/// A constructor, field or method consuming dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPoint {
    pub kind: InjectionKind,
    /// Field or method identifier; unused for constructors
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

impl InjectionPoint {
    pub fn constructor(dependencies: Vec<DependencySpec>) -> Self {
        InjectionPoint {
            kind: InjectionKind::Constructor,
            name: String::new(),
            dependencies,
        }
    }

    pub fn field(name: impl Into<String>, dependency: DependencySpec) -> Self {
        InjectionPoint {
            kind: InjectionKind::Field,
            name: name.into(),
            dependencies: vec![dependency],
        }
    }

    pub fn method(name: impl Into<String>, dependencies: Vec<DependencySpec>) -> Self {
        InjectionPoint {
            kind: InjectionKind::Method,
            name: name.into(),
            dependencies,
        }
    }

    fn position(&self, index: usize) -> DependencyPosition {
        match self.kind {
            InjectionKind::Constructor => DependencyPosition::ConstructorArgument { index },
            InjectionKind::Field => DependencyPosition::Field {
                name: self.name.clone(),
            },
            InjectionKind::Method => DependencyPosition::MethodArgument {
                method: self.name.clone(),
                index,
            },
        }
    }
}

/// Gate deciding whether a component is part of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionExpr {
    Property {
        name: String,
        #[serde(default)]
        expected_value: Option<String>,
        #[serde(default)]
        match_if_missing: bool,
    },
    /// Every name must be among the environment's presence flags
    ClassPresence { names: Vec<String> },
    /// Enabled only if no other component provides any target
    MissingComponent {
        #[serde(default)]
        target_types: Vec<String>,
        #[serde(default)]
        target_names: Vec<String>,
    },
    /// Enabled only if other components provide every target
    PresentComponent {
        #[serde(default)]
        target_types: Vec<String>,
        #[serde(default)]
        target_names: Vec<String>,
    },
    /// Entries prefixed with `!` are negated individually, `negated` negates all of them
    Profile {
        profiles: Vec<String>,
        #[serde(default)]
        negated: bool,
    },
}

impl ConditionExpr {
    /// Conditions that can only be decided once the tentative enabled set is known
    pub fn depends_on_components(&self) -> bool {
        matches!(
            self,
            ConditionExpr::MissingComponent { .. } | ConditionExpr::PresentComponent { .. }
        )
    }
}

impl std::fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionExpr::Property {
                name,
                expected_value,
                match_if_missing,
            } => {
                write!(f, "property({name}")?;
                if let Some(expected) = expected_value {
                    write!(f, " = \"{expected}\"")?;
                }
                if *match_if_missing {
                    f.write_str(", match if missing")?;
                }
                f.write_str(")")
            }
            ConditionExpr::ClassPresence { names } => write!(f, "present({})", names.join(", ")),
            ConditionExpr::MissingComponent {
                target_types,
                target_names,
            } => write!(f, "missing({})", targets(target_types, target_names)),
            ConditionExpr::PresentComponent {
                target_types,
                target_names,
            } => write!(f, "present-component({})", targets(target_types, target_names)),
            ConditionExpr::Profile { profiles, negated } => {
                let bang = if *negated { "!" } else { "" };
                write!(f, "profile({bang}{})", profiles.join(", "))
            }
        }
    }
}

fn targets(types: &[String], names: &[String]) -> String {
    types
        .iter()
        .cloned()
        .chain(names.iter().map(|name| format!("\"{name}\"")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Opaque lifecycle tokens forwarded to code emission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHooks {
    #[serde(default)]
    pub init: Vec<String>,
    #[serde(default)]
    pub destroy: Vec<String>,
}

/// A declared component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDeclaration {
    /// The component's own declared type
    pub qualified_name: String,
    pub display_name: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub lazy: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub implemented_interfaces: BTreeSet<String>,
    #[serde(default)]
    pub injection_points: Vec<InjectionPoint>,
    #[serde(default)]
    pub lifecycle_hooks: LifecycleHooks,
    #[serde(default)]
    pub conditions: Vec<ConditionExpr>,
    /// Display names that must be constructed first without being injected
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Stable catalog order, used for every tie-break
    #[serde(default)]
    pub declaration_index: u32,
}

impl ComponentDeclaration {
    pub fn new(qualified_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        ComponentDeclaration {
            qualified_name: qualified_name.into(),
            display_name: display_name.into(),
            scope: Scope::Singleton,
            lazy: false,
            primary: false,
            implemented_interfaces: BTreeSet::new(),
            injection_points: Vec::new(),
            lifecycle_hooks: LifecycleHooks::default(),
            conditions: Vec::new(),
            depends_on: Vec::new(),
            declaration_index: 0,
        }
    }

    pub fn prototype(mut self) -> Self {
        self.scope = Scope::Prototype;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implemented_interfaces.insert(interface.into());
        self
    }

    pub fn inject(mut self, injection_point: InjectionPoint) -> Self {
        self.injection_points.push(injection_point);
        self
    }

    pub fn constructor(self, dependencies: Vec<DependencySpec>) -> Self {
        self.inject(InjectionPoint::constructor(dependencies))
    }

    pub fn condition(mut self, condition: ConditionExpr) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn depends_on(mut self, display_name: impl Into<String>) -> Self {
        self.depends_on.push(display_name.into());
        self
    }

    pub fn on_init(mut self, token: impl Into<String>) -> Self {
        self.lifecycle_hooks.init.push(token.into());
        self
    }

    pub fn on_destroy(mut self, token: impl Into<String>) -> Self {
        self.lifecycle_hooks.destroy.push(token.into());
        self
    }

    pub fn with_index(mut self, declaration_index: u32) -> Self {
        self.declaration_index = declaration_index;
        self
    }

    pub fn id(&self) -> ComponentId {
        ComponentId::new(self.display_name.as_str())
    }

    /// Whether this component is the declared type or declares it as an interface
    pub fn provides(&self, requested_type: &str) -> bool {
        self.qualified_name == requested_type || self.implemented_interfaces.contains(requested_type)
    }

    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// All dependencies in declaration order, labelled with where they are injected
    pub fn dependencies(&self) -> impl Iterator<Item = (DependencyPosition, &DependencySpec)> {
        self.injection_points.iter().flat_map(|point| {
            point
                .dependencies
                .iter()
                .enumerate()
                .map(move |(index, dependency)| (point.position(index), dependency))
        })
    }
}

/// Snapshot of all declared components, sorted by declaration index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    components: Vec<ComponentDeclaration>,
}

#[derive(Deserialize)]
struct CatalogDocument {
    components: Vec<DocumentComponent>,
}

/// A declaration as written in a catalog document, where the index may be left out
#[derive(Deserialize)]
struct DocumentComponent {
    #[serde(default)]
    declaration_index: Option<u32>,
    #[serde(flatten)]
    declaration: ComponentDeclaration,
}

impl Catalog {
    /// Takes declarations with their declaration indices as given
    pub fn new(mut components: Vec<ComponentDeclaration>) -> Self {
        components.sort_by_key(|component| component.declaration_index);
        Catalog { components }
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Parses `{"components": [...]}`.
    ///
    /// A component without `declaration_index` takes its position in the array.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogLoadError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        let components = document
            .components
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                let index = entry.declaration_index.unwrap_or(position as u32);
                entry.declaration.with_index(index)
            })
            .collect();
        Ok(Catalog::new(components))
    }

    pub fn components(&self) -> &[ComponentDeclaration] {
        &self.components
    }

    pub fn get(&self, display_name: &str) -> Option<&ComponentDeclaration> {
        self.components
            .iter()
            .find(|component| component.display_name == display_name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Check the catalog wide invariants.
    ///
    /// Returns every violation found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<ConfigurationError>> {
        let mut errors = Vec::new();
        let mut qualified_names = BTreeSet::new();
        let mut display_names = BTreeSet::new();
        let mut indices: BTreeMap<u32, &ComponentDeclaration> = BTreeMap::new();

        for component in &self.components {
            if !qualified_names.insert(component.qualified_name.as_str()) {
                errors.push(ConfigurationError::DuplicateQualifiedName {
                    name: component.qualified_name.clone(),
                });
            }
            if !display_names.insert(component.display_name.as_str()) {
                errors.push(ConfigurationError::DuplicateDisplayName {
                    name: component.display_name.clone(),
                });
            }
            match indices.entry(component.declaration_index) {
                Entry::Vacant(vacant) => {
                    vacant.insert(component);
                }
                Entry::Occupied(first) => {
                    errors.push(ConfigurationError::DuplicateDeclarationIndex {
                        index: component.declaration_index,
                        first: first.get().id(),
                        second: component.id(),
                    });
                }
            }

            let constructors = component
                .injection_points
                .iter()
                .filter(|point| point.kind == InjectionKind::Constructor)
                .count();
            if constructors > 1 {
                errors.push(ConfigurationError::MultipleConstructors {
                    component: component.id(),
                    count: constructors,
                });
            }

            errors.extend(conflicting_presence(component));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Targets a component requires to be both present and missing
fn conflicting_presence(component: &ComponentDeclaration) -> Vec<ConfigurationError> {
    let mut missing = BTreeSet::new();
    let mut present = BTreeSet::new();
    for condition in &component.conditions {
        let (set, types, names) = match condition {
            ConditionExpr::MissingComponent {
                target_types,
                target_names,
            } => (&mut missing, target_types, target_names),
            ConditionExpr::PresentComponent {
                target_types,
                target_names,
            } => (&mut present, target_types, target_names),
            _ => continue,
        };
        set.extend(types.iter().map(String::as_str));
        set.extend(names.iter().map(String::as_str));
    }

    missing
        .intersection(&present)
        .map(|target| ConfigurationError::ConflictingPresenceConditions {
            component: component.id(),
            target: target.to_string(),
        })
        .collect()
}

/// Builds a [`Catalog`], assigning declaration indices in registration order
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    components: Vec<ComponentDeclaration>,
}

impl CatalogBuilder {
    pub fn add(mut self, component: ComponentDeclaration) -> Self {
        let index = self.components.len() as u32;
        self.components.push(component.with_index(index));
        self
    }

    pub fn build(self) -> Catalog {
        Catalog::new(self.components)
    }
}

/// Read and parse a JSON catalog from disk without further validation
pub fn load_catalog_from_path(path: &Path) -> Result<Catalog, CatalogLoadError> {
    let data = fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Catalog::from_json_str(&data)
}

/// External facts (profiles, properties, presence flags) gating component inclusion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub active_profiles: BTreeSet<String>,
    pub properties: BTreeMap<String, String>,
    pub present_flags: BTreeSet<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.active_profiles.insert(profile.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.present_flags.insert(flag.into());
        self
    }

    /// The environment with `options.default_profiles` active if it names no profile itself
    pub fn with_defaults(&self, options: &PlannerOptions) -> Environment {
        let mut environment = self.clone();
        if environment.active_profiles.is_empty() {
            environment
                .active_profiles
                .extend(options.default_profiles.iter().cloned());
        }
        environment
    }
}

impl From<&EnvironmentConfig> for Environment {
    fn from(config: &EnvironmentConfig) -> Self {
        Environment {
            active_profiles: config.profiles.iter().cloned().collect(),
            properties: config.properties.clone(),
            present_flags: config.flags.iter().cloned().collect(),
        }
    }
}
