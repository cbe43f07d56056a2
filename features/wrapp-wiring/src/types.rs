use serde::Serialize;

/// Identifies a component inside a plan by its display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(display_name: impl Into<String>) -> Self {
        ComponentId(display_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        ComponentId::new(value)
    }
}

/// Requested type and qualifier of a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    pub requested_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}
impl std::fmt::Display for DependencyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} (qualifier '{qualifier}')", self.requested_type),
            None => f.write_str(&self.requested_type),
        }
    }
}

/// Where a consumer receives a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyPosition {
    ConstructorArgument { index: usize },
    Field { name: String },
    MethodArgument { method: String, index: usize },
    /// Explicit ordering dependency, never passed as an argument
    DependsOn,
}
impl std::fmt::Display for DependencyPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyPosition::ConstructorArgument { index } => {
                write!(f, "constructor argument #{index}")
            }
            DependencyPosition::Field { name } => write!(f, "field '{name}'"),
            DependencyPosition::MethodArgument { method, index } => {
                write!(f, "argument #{index} of method '{method}'")
            }
            DependencyPosition::DependsOn => f.write_str("depends-on"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_render_for_diagnostics() {
        let method = DependencyPosition::MethodArgument {
            method: "setRepository".into(),
            index: 1,
        };
        assert_eq!(method.to_string(), "argument #1 of method 'setRepository'");
        assert_eq!(
            DependencyPosition::ConstructorArgument { index: 0 }.to_string(),
            "constructor argument #0"
        );
    }

    #[test]
    fn dependency_info_mentions_qualifier() {
        let info = DependencyInfo {
            requested_type: "app.Cache".into(),
            qualifier: Some("redis".into()),
        };
        assert_eq!(info.to_string(), "app.Cache (qualifier 'redis')");
    }
}
