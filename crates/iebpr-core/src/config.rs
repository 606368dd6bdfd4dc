//! Setup file describing which subtypes to register and where their templates come from.

use crate::randomizer::Randomizer;
use crate::registration::{AgentSubtype, AgentSubtypeRegistration, RegistrationError};
use crate::template::{bundled_template, get_template, Template, TemplateError, TemplateKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Where a subtype's state or trait template is read from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Catalog name such as `pao_state`.
    Bundled(String),
    /// JSON file; relative paths are taken from the setup file's directory.
    Path(PathBuf),
    Inline(Template),
}

impl TemplateSource {
    pub fn load(&self) -> Result<Template, TemplateError> {
        match self {
            Self::Bundled(name) => get_template(name),
            Self::Path(path) => Template::from_path(path),
            Self::Inline(template) => Ok(template.clone()),
        }
    }

    fn rebase(&mut self, base: &Path) {
        if let Self::Path(path) = self {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtypeConfig {
    pub subtype: AgentSubtype,
    pub n_agent: usize,
    /// Falls back to the bundled state template when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TemplateSource>,
    /// Falls back to the bundled trait template when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<TemplateSource>,
}

impl SubtypeConfig {
    pub fn bundled(subtype: AgentSubtype, n_agent: usize) -> Self {
        Self {
            subtype,
            n_agent,
            state: None,
            traits: None,
        }
    }

    fn template(&self, kind: TemplateKind) -> Result<Template, TemplateError> {
        let source = match kind {
            TemplateKind::State => &self.state,
            TemplateKind::Trait => &self.traits,
        };
        match source {
            Some(source) => source.load(),
            None => bundled_template(self.subtype, kind),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Base seed; each subtype draws from its own derived stream.
    pub seed: u64,
    /// Validate every template entry before schema resolution.
    pub sanitize: bool,
    /// Registration order, which is also the subtype index used for seeding.
    pub subtypes: Vec<SubtypeConfig>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sanitize: true,
            subtypes: AgentSubtype::ALL
                .iter()
                .map(|&subtype| SubtypeConfig::bundled(subtype, 100))
                .collect(),
        }
    }
}

macro_rules! define_setup_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum SetupConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for SetupConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_setup_config_error! {
    NoSubtypes => "at least one subtype must be configured";
    DuplicateSubtype { subtype: AgentSubtype } => "subtype {} is configured more than once", subtype;
    ZeroAgents { subtype: AgentSubtype } => "n_agent for {} must be greater than 0", subtype;
    AgentCountOverflow => "total agent count overflow";
    TooManyAgents { max: usize, actual: usize } => "too many agents: {} > max {}", actual, max;
}

impl std::error::Error for SetupConfigError {}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to read setup file '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse setup json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setup: {0}")]
    Invalid(#[from] SetupConfigError),

    #[error("{subtype} {kind} template: {source}")]
    Template {
        subtype: AgentSubtype,
        kind: &'static str,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl SetupConfig {
    pub const MAX_TOTAL_AGENTS: usize = 1_000_000;

    pub fn from_json_str(text: &str) -> Result<Self, SetupError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and validate a setup file, anchoring relative template paths at its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SetupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&text)?;
        if let Some(base) = path.parent() {
            for subtype in &mut config.subtypes {
                for source in [&mut subtype.state, &mut subtype.traits].into_iter().flatten() {
                    source.rebase(base);
                }
            }
        }
        config.validate()?;
        debug!(path = %path.display(), subtypes = config.subtypes.len(), "loaded setup");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SetupConfigError> {
        if self.subtypes.is_empty() {
            return Err(SetupConfigError::NoSubtypes);
        }
        let mut total_agents = 0usize;
        for (i, entry) in self.subtypes.iter().enumerate() {
            if self.subtypes[..i]
                .iter()
                .any(|other| other.subtype == entry.subtype)
            {
                return Err(SetupConfigError::DuplicateSubtype {
                    subtype: entry.subtype,
                });
            }
            if entry.n_agent == 0 {
                return Err(SetupConfigError::ZeroAgents {
                    subtype: entry.subtype,
                });
            }
            total_agents = total_agents
                .checked_add(entry.n_agent)
                .ok_or(SetupConfigError::AgentCountOverflow)?;
        }
        if total_agents > Self::MAX_TOTAL_AGENTS {
            return Err(SetupConfigError::TooManyAgents {
                max: Self::MAX_TOTAL_AGENTS,
                actual: total_agents,
            });
        }
        Ok(())
    }

    /// Resolve every subtype's templates into checked registrations, in configured order.
    pub fn build_registrations(&self) -> Result<Vec<AgentSubtypeRegistration>, SetupError> {
        self.validate()?;
        self.subtypes
            .iter()
            .map(|entry| {
                let load = |kind: TemplateKind| -> Result<Template, TemplateError> {
                    let template = entry.template(kind)?;
                    if self.sanitize {
                        template.validate()?;
                    }
                    Ok(template)
                };
                let with_context = |kind: TemplateKind| {
                    load(kind).map_err(|source| SetupError::Template {
                        subtype: entry.subtype,
                        kind: kind.name(),
                        source,
                    })
                };
                let state = with_context(TemplateKind::State)?;
                let traits = with_context(TemplateKind::Trait)?;
                let registration = AgentSubtypeRegistration::from_templates(
                    entry.subtype,
                    entry.n_agent,
                    &state,
                    &traits,
                )?;
                registration.validate()?;
                debug!(
                    subtype = %entry.subtype,
                    n_agent = entry.n_agent,
                    state_slots = registration.state.len(),
                    trait_slots = registration.traits.len(),
                    "registered subtype"
                );
                Ok(registration)
            })
            .collect()
    }

    /// Sampler for the subtype registered at `subtype_index`.
    pub fn randomizer(&self, subtype_index: usize) -> Randomizer {
        Randomizer::for_subtype(self.seed, subtype_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DistributionSpec;
    use serde_json::json;

    #[test]
    fn validate_accepts_default() {
        let config = SetupConfig::default();
        assert!(config.validate().is_ok());
        let registrations = config.build_registrations().unwrap();
        assert_eq!(registrations.len(), AgentSubtype::ALL.len());
    }

    #[test]
    fn minimal_json_deserializes_with_defaults() {
        let config = SetupConfig::from_json_str(
            r#"{"subtypes": [{"subtype": "gao", "n_agent": 25}]}"#,
        )
        .unwrap();
        assert_eq!(config.seed, 42);
        assert!(config.sanitize);
        assert_eq!(config.subtypes, vec![SubtypeConfig::bundled(AgentSubtype::Gao, 25)]);
    }

    #[test]
    fn validate_rejects_bad_subtype_lists() {
        let config = SetupConfig {
            subtypes: vec![],
            ..SetupConfig::default()
        };
        assert_eq!(config.validate(), Err(SetupConfigError::NoSubtypes));

        let config = SetupConfig {
            subtypes: vec![
                SubtypeConfig::bundled(AgentSubtype::Pao, 1),
                SubtypeConfig::bundled(AgentSubtype::Pao, 2),
            ],
            ..SetupConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(SetupConfigError::DuplicateSubtype {
                subtype: AgentSubtype::Pao
            })
        );

        let config = SetupConfig {
            subtypes: vec![SubtypeConfig::bundled(AgentSubtype::Oho, 0)],
            ..SetupConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "n_agent for oho must be greater than 0"
        );
    }

    #[test]
    fn validate_rejects_too_many_agents() {
        let config = SetupConfig {
            subtypes: vec![SubtypeConfig::bundled(
                AgentSubtype::Pao,
                SetupConfig::MAX_TOTAL_AGENTS + 1,
            )],
            ..SetupConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SetupConfigError::TooManyAgents { .. })
        ));

        let config = SetupConfig {
            subtypes: vec![
                SubtypeConfig::bundled(AgentSubtype::Pao, usize::MAX),
                SubtypeConfig::bundled(AgentSubtype::Gao, 1),
            ],
            ..SetupConfig::default()
        };
        assert_eq!(config.validate(), Err(SetupConfigError::AgentCountOverflow));
    }

    #[test]
    fn inline_templates_flow_into_registration() {
        let config = SetupConfig::from_json_str(
            &json!({
                "seed": 7,
                "subtypes": [{
                    "subtype": "oho",
                    "n_agent": 3,
                    "state": {"inline": {"biomass": "50", "rela_count": 1}},
                    "traits": {"bundled": "oho_trait"}
                }]
            })
            .to_string(),
        )
        .unwrap();
        let registrations = config.build_registrations().unwrap();
        assert_eq!(registrations[0].state.biomass, Some(DistributionSpec::constant(50.0)));
        assert_eq!(registrations[0].state.len(), 2);
    }

    #[test]
    fn template_fault_names_subtype_and_kind() {
        let config = SetupConfig {
            subtypes: vec![SubtypeConfig {
                state: Some(TemplateSource::Inline(
                    Template::new().with("biomass", json!({"kind": "normal", "mean": 1})),
                )),
                ..SubtypeConfig::bundled(AgentSubtype::Pao, 1)
            }],
            ..SetupConfig::default()
        };
        let err = config.build_registrations().unwrap_err();
        assert!(matches!(
            err,
            SetupError::Template { subtype: AgentSubtype::Pao, kind: "state", .. }
        ));
    }

    #[test]
    fn load_resolves_template_paths_next_to_setup_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pao_traits.json"), r#"{"mu": 2.5, "enable_tca": {"kind": "bernoulli", "mean": 1}}"#)
            .unwrap();
        let setup = dir.path().join("setup.json");
        fs::write(
            &setup,
            r#"{"seed": 3, "subtypes": [{"subtype": "pao", "n_agent": 10, "traits": {"path": "pao_traits.json"}}]}"#,
        )
        .unwrap();

        let config = SetupConfig::load(&setup).unwrap();
        assert_eq!(
            config.subtypes[0].traits,
            Some(TemplateSource::Path(dir.path().join("pao_traits.json")))
        );
        let registrations = config.build_registrations().unwrap();
        assert_eq!(registrations[0].traits.mu, Some(DistributionSpec::constant(2.5)));
        assert_eq!(registrations[0].traits.len(), 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SetupConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SetupError::Io { .. }));
    }

    #[test]
    fn randomizer_streams_differ_per_subtype() {
        let config = SetupConfig::default();
        let spec = DistributionSpec::uniform(0.0, 1.0);
        let first = config.randomizer(0).sample_n(&spec, 8);
        let second = config.randomizer(1).sample_n(&spec, 8);
        assert_ne!(first, second);
        assert_eq!(first, config.randomizer(0).sample_n(&spec, 8));
    }
}
