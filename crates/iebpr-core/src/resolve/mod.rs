//! Map a template onto the state or trait schema without being told which one it targets.
//!
//! The state schema is tried first. If any template field is missing from it the attempt is
//! abandoned and the trait schema is tried. Only when both abandon does resolution fail, and
//! the error carries the offending field for each schema.

use crate::distribution;
use crate::schema::{RandConfigSchema, StateRandConfig, TraitRandConfig};
use crate::template::{Template, TemplateError, TemplateKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// A template field with no slot in the attempted schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key '{field}' is incompatible with {schema}")]
pub struct IncompatibleField {
    pub field: String,
    pub schema: &'static str,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("found mixed or invalid keys with both StateRandConfig and TraitRandConfig:\n{state}\n{traits}")]
    AmbiguousOrInvalidTemplate {
        state: IncompatibleField,
        traits: IncompatibleField,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedConfig {
    State(StateRandConfig),
    Trait(TraitRandConfig),
}

impl ResolvedConfig {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::State(_) => TemplateKind::State,
            Self::Trait(_) => TemplateKind::Trait,
        }
    }

    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::State(_) => StateRandConfig::SCHEMA_NAME,
            Self::Trait(_) => TraitRandConfig::SCHEMA_NAME,
        }
    }

    pub fn as_state(&self) -> Option<&StateRandConfig> {
        match self {
            Self::State(config) => Some(config),
            Self::Trait(_) => None,
        }
    }

    pub fn as_trait(&self) -> Option<&TraitRandConfig> {
        match self {
            Self::Trait(config) => Some(config),
            Self::State(_) => None,
        }
    }

    pub fn into_state(self) -> Option<StateRandConfig> {
        match self {
            Self::State(config) => Some(config),
            Self::Trait(_) => None,
        }
    }

    pub fn into_trait(self) -> Option<TraitRandConfig> {
        match self {
            Self::Trait(config) => Some(config),
            Self::State(_) => None,
        }
    }
}

enum AttemptFailure {
    Incompatible(IncompatibleField),
    Invalid(TemplateError),
}

/// Populate `S` from every template entry, or report the first field `S` does not declare.
fn attempt<S: RandConfigSchema>(template: &Template) -> Result<S, AttemptFailure> {
    let mut config = S::default();
    for (name, value) in template.iter() {
        let Some(field) = S::field(name) else {
            debug!(field = name, schema = S::SCHEMA_NAME, "template field not in schema");
            return Err(AttemptFailure::Incompatible(IncompatibleField {
                field: name.to_string(),
                schema: S::SCHEMA_NAME,
            }));
        };
        let spec = distribution::build(value).map_err(|source| {
            AttemptFailure::Invalid(TemplateError::InvalidEntry {
                field: name.to_string(),
                source,
            })
        })?;
        config.set(field, spec);
    }
    Ok(config)
}

pub fn resolve(template: &Template) -> Result<ResolvedConfig, ResolveError> {
    if template.is_empty() {
        warn!("empty template fits both StateRandConfig and TraitRandConfig; using StateRandConfig");
    }
    let state = match attempt::<StateRandConfig>(template) {
        Ok(config) => return Ok(ResolvedConfig::State(config)),
        Err(AttemptFailure::Incompatible(field)) => field,
        Err(AttemptFailure::Invalid(err)) => return Err(err.into()),
    };
    let traits = match attempt::<TraitRandConfig>(template) {
        Ok(config) => return Ok(ResolvedConfig::Trait(config)),
        Err(AttemptFailure::Incompatible(field)) => field,
        Err(AttemptFailure::Invalid(err)) => return Err(err.into()),
    };
    Err(ResolveError::AmbiguousOrInvalidTemplate { state, traits })
}

/// Load a template file and resolve it, optionally validating its structure first.
pub fn resolve_json_file(path: impl AsRef<Path>, sanitize: bool) -> Result<ResolvedConfig, ResolveError> {
    let template = Template::from_path(path)?;
    if sanitize {
        template.validate()?;
    }
    resolve(&template)
}
