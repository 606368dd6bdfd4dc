//! Parameter templates: loading, the bundled catalog, and structural validation.

use crate::distribution::{self, SpecError};
use crate::registration::AgentSubtype;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template field '{field}': {source}")]
    InvalidEntry {
        field: String,
        #[source]
        source: SpecError,
    },

    #[error("template must be a mapping of field names to values, not {0}")]
    NotAMapping(String),

    #[error("template '{name}' not found; choose from: {available}")]
    UnknownTemplate { name: String, available: String },

    #[error("failed to read template '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse template json: {0}")]
    Parse(#[from] serde_json::Error),
}

impl TemplateError {
    /// The per-value fault behind an invalid entry, if that is what this is.
    pub fn spec_error(&self) -> Option<&SpecError> {
        match self {
            Self::InvalidEntry { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Which schema a bundled template is written for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    State,
    Trait,
}

impl TemplateKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Trait => "trait",
        }
    }
}

/// Ordered mapping from config field name to a template value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template {
    entries: Map<String, Value>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, TemplateError> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(TemplateError::NotAMapping(distribution::describe(&other))),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, TemplateError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Read a template from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let template = Self::from_json_str(&text)?;
        debug!(path = %path.display(), fields = template.len(), "loaded template");
        Ok(template)
    }

    /// Append or replace one entry, keeping the original position on replace.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Structural pre-check of every entry; stops at the first invalid one.
    ///
    /// Field names are not checked against either schema here.
    pub fn validate(&self) -> Result<(), TemplateError> {
        for (field, value) in self.iter() {
            distribution::validate_value(value).map_err(|source| TemplateError::InvalidEntry {
                field: field.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for Template {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, Value)> for Template {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

pub fn validate(template: &Template) -> Result<(), TemplateError> {
    template.validate()
}

/// A template shipped with the crate.
#[derive(Clone, Copy, Debug)]
pub struct BundledTemplate {
    pub name: &'static str,
    pub subtype: AgentSubtype,
    pub kind: TemplateKind,
    source: &'static str,
}

impl BundledTemplate {
    pub fn load(&self) -> Result<Template, TemplateError> {
        Template::from_json_str(self.source)
    }
}

macro_rules! bundled {
    ($name:literal, $subtype:ident, $kind:ident) => {
        BundledTemplate {
            name: $name,
            subtype: AgentSubtype::$subtype,
            kind: TemplateKind::$kind,
            source: include_str!(concat!("../templates/", $name, ".json")),
        }
    };
}

const CATALOG: [BundledTemplate; 6] = [
    bundled!("pao_state", Pao, State),
    bundled!("gao_state", Gao, State),
    bundled!("oho_state", Oho, State),
    bundled!("pao_trait", Pao, Trait),
    bundled!("gao_trait", Gao, Trait),
    bundled!("oho_trait", Oho, Trait),
];

pub fn catalog() -> &'static [BundledTemplate] {
    &CATALOG
}

/// Load a bundled template by name, e.g. `pao_trait`.
///
/// Bundled templates only list the parameters a subtype reads; their values are
/// placeholders, not recommended settings.
pub fn get_template(name: &str) -> Result<Template, TemplateError> {
    match CATALOG.iter().find(|entry| entry.name == name) {
        Some(entry) => entry.load(),
        None => {
            let mut names: Vec<_> = CATALOG.iter().map(|entry| entry.name).collect();
            names.sort_unstable();
            Err(TemplateError::UnknownTemplate {
                name: name.to_string(),
                available: names.join(", "),
            })
        }
    }
}

pub fn bundled_template(subtype: AgentSubtype, kind: TemplateKind) -> Result<Template, TemplateError> {
    get_template(&format!("{}_{}", subtype.name(), kind.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn every_bundled_template_parses_and_validates() {
        for entry in catalog() {
            let template = entry.load().unwrap_or_else(|e| panic!("{}: {e}", entry.name));
            assert!(!template.is_empty(), "{} is empty", entry.name);
            template
                .validate()
                .unwrap_or_else(|e| panic!("{}: {e}", entry.name));
        }
    }

    #[test]
    fn catalog_covers_every_subtype_and_kind() {
        for subtype in AgentSubtype::ALL {
            for kind in [TemplateKind::State, TemplateKind::Trait] {
                assert!(bundled_template(subtype, kind).is_ok());
            }
        }
    }

    #[test]
    fn unknown_template_lists_available_names() {
        let err = get_template("pao").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gao_state, gao_trait, oho_state"));
    }

    #[test]
    fn validate_names_the_field_and_missing_parameter() {
        let template = Template::new()
            .with("biomass", 100)
            .with("glycogen", json!({"kind": "normal", "mean": 10}));
        let err = template.validate().unwrap_err();
        assert!(matches!(
            &err,
            TemplateError::InvalidEntry { field, source: SpecError::MissingParameter { param: "stddev", .. } }
                if field == "glycogen"
        ));
        assert!(err.to_string().contains("glycogen"));
    }

    #[test]
    fn validate_stops_at_first_invalid_entry() {
        let template = Template::new()
            .with("pha", json!(true))
            .with("polyp", json!({"kind": "gamma"}));
        let err = template.validate().unwrap_err();
        assert!(matches!(err.spec_error(), Some(SpecError::InvalidValueType(_))));
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        let err = Template::from_json_str("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, TemplateError::NotAMapping(ref what) if what == "list"));
    }

    #[test]
    fn loads_template_file_preserving_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"polyp": 1, "biomass": "2", "pha": 3}}"#).unwrap();
        let template = Template::from_path(file.path()).unwrap();
        let fields: Vec<_> = template.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, vec!["polyp", "biomass", "pha"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = Template::from_path(&path).unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }
}
