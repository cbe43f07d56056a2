use std::collections::BTreeMap;

use serde::{
    de::{Error as _, Unexpected},
    Deserialize, Deserializer, Serialize,
};

/// Options steering how the planner treats a catalog
///
/// ```toml
/// [planner]
/// strict = true
/// default_profiles = ["dev"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerOptions {
    /// Upgrade every warning to an error.
    ///
    /// An ambiguous interface resolution then fails the plan instead of falling back to
    /// the last declared implementation.
    #[serde(deserialize_with = "switch")]
    pub strict: bool,
    /// Profiles assumed active when the environment names none
    #[serde(deserialize_with = "string_list")]
    pub default_profiles: Vec<String>,
}

/// External facts gating component inclusion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(deserialize_with = "string_list")]
    pub profiles: Vec<String>,
    pub properties: BTreeMap<String, String>,
    /// Stand-ins for compile time presence checks
    #[serde(deserialize_with = "string_list")]
    pub flags: Vec<String>,
}

/// Everything a planning run reads besides the catalog itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WiringConfig {
    pub planner: PlannerOptions,
    pub environment: EnvironmentConfig,
}

/// A list, or a single string of comma or whitespace separated entries
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match StringList::deserialize(deserializer)? {
        StringList::List(list) => list,
        StringList::Joined(joined) => joined
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

/// `true`/`false`, `1`/`0`, `yes`/`no` or `on`/`off`
fn switch<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Switch {
        Bool(bool),
        Number(i64),
        Text(String),
    }

    match Switch::deserialize(deserializer)? {
        Switch::Bool(value) => Ok(value),
        Switch::Number(0) => Ok(false),
        Switch::Number(1) => Ok(true),
        Switch::Number(other) => Err(D::Error::invalid_value(
            Unexpected::Signed(other),
            &"a switch",
        )),
        Switch::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(D::Error::invalid_value(Unexpected::Str(&text), &"a switch")),
        },
    }
}
