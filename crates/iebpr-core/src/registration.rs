//! The unit handed to the engine when adding an agent subtype.

use crate::distribution::{DistributionKind, ParameterError};
use crate::resolve::{resolve, ResolveError, ResolvedConfig};
use crate::schema::{RandConfigSchema, StateRandConfig, TraitField, TraitRandConfig};
use crate::template::{bundled_template, Template, TemplateError, TemplateKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Functional microbial guilds the engine knows how to simulate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentSubtype {
    /// Phosphate-accumulating organisms.
    Pao,
    /// Glycogen-accumulating organisms.
    Gao,
    /// Ordinary heterotrophic organisms.
    Oho,
}

impl AgentSubtype {
    pub const ALL: [Self; 3] = [Self::Pao, Self::Gao, Self::Oho];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pao => "pao",
            Self::Gao => "gao",
            Self::Oho => "oho",
        }
    }
}

impl fmt::Display for AgentSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{subtype} {expected} template resolved to {found}")]
    WrongSchema {
        subtype: AgentSubtype,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{subtype} {schema}.{field}: {source}")]
    InvalidParameter {
        subtype: AgentSubtype,
        schema: &'static str,
        field: &'static str,
        #[source]
        source: ParameterError,
    },

    #[error("{subtype} boolean trait '{field}' must use a bernoulli distribution, not {kind}")]
    BoolTraitKind {
        subtype: AgentSubtype,
        field: TraitField,
        kind: DistributionKind,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSubtypeRegistration {
    pub subtype: AgentSubtype,
    pub n_agent: usize,
    pub state: StateRandConfig,
    pub traits: TraitRandConfig,
}

impl AgentSubtypeRegistration {
    pub fn new(
        subtype: AgentSubtype,
        n_agent: usize,
        state: StateRandConfig,
        traits: TraitRandConfig,
    ) -> Self {
        Self {
            subtype,
            n_agent,
            state,
            traits,
        }
    }

    /// Resolve both templates and require each to land in its intended schema.
    pub fn from_templates(
        subtype: AgentSubtype,
        n_agent: usize,
        state_template: &Template,
        trait_template: &Template,
    ) -> Result<Self, RegistrationError> {
        let state = match resolve(state_template)? {
            ResolvedConfig::State(config) => config,
            other => return Err(wrong_schema(subtype, TemplateKind::State, &other)),
        };
        let traits = match resolve(trait_template)? {
            ResolvedConfig::Trait(config) => config,
            other => return Err(wrong_schema(subtype, TemplateKind::Trait, &other)),
        };
        Ok(Self::new(subtype, n_agent, state, traits))
    }

    /// Registration built from the subtype's bundled templates.
    pub fn bundled(subtype: AgentSubtype, n_agent: usize) -> Result<Self, RegistrationError> {
        let state_template = bundled_template(subtype, TemplateKind::State)?;
        let trait_template = bundled_template(subtype, TemplateKind::Trait)?;
        Self::from_templates(subtype, n_agent, &state_template, &trait_template)
    }

    /// Run the engine's pre-initialization checks over every configured slot.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        for (field, spec) in self.state.iter() {
            spec.check_parameters()
                .map_err(|source| RegistrationError::InvalidParameter {
                    subtype: self.subtype,
                    schema: StateRandConfig::SCHEMA_NAME,
                    field: field.name(),
                    source,
                })?;
        }
        for (field, spec) in self.traits.iter() {
            if field.is_bool() && spec.kind() != DistributionKind::Bernoulli {
                return Err(RegistrationError::BoolTraitKind {
                    subtype: self.subtype,
                    field,
                    kind: spec.kind(),
                });
            }
            spec.check_parameters()
                .map_err(|source| RegistrationError::InvalidParameter {
                    subtype: self.subtype,
                    schema: TraitRandConfig::SCHEMA_NAME,
                    field: field.name(),
                    source,
                })?;
        }
        Ok(())
    }
}

fn wrong_schema(
    subtype: AgentSubtype,
    expected: TemplateKind,
    found: &ResolvedConfig,
) -> RegistrationError {
    let expected = match expected {
        TemplateKind::State => StateRandConfig::SCHEMA_NAME,
        TemplateKind::Trait => TraitRandConfig::SCHEMA_NAME,
    };
    RegistrationError::WrongSchema {
        subtype,
        expected,
        found: found.schema_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DistributionSpec;
    use crate::template::get_template;
    use serde_json::json;

    #[test]
    fn bundled_registrations_pass_validation() {
        for subtype in AgentSubtype::ALL {
            let registration = AgentSubtypeRegistration::bundled(subtype, 100)
                .unwrap_or_else(|e| panic!("{subtype}: {e}"));
            assert_eq!(registration.n_agent, 100);
            assert!(registration.state.biomass.is_some());
            registration
                .validate()
                .unwrap_or_else(|e| panic!("{subtype}: {e}"));
        }
    }

    #[test]
    fn swapped_templates_are_wrong_schema() {
        let state = get_template("gao_state").unwrap();
        let traits = get_template("gao_trait").unwrap();
        let err = AgentSubtypeRegistration::from_templates(AgentSubtype::Gao, 10, &traits, &state)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::WrongSchema {
                expected: "StateRandConfig",
                found: "TraitRandConfig",
                ..
            }
        ));
    }

    #[test]
    fn bool_trait_requires_bernoulli() {
        let mut registration = AgentSubtypeRegistration::bundled(AgentSubtype::Pao, 5).unwrap();
        registration
            .traits
            .set(TraitField::EnableTca, DistributionSpec::constant(1.0));
        let err = registration.validate().unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::BoolTraitKind {
                field: TraitField::EnableTca,
                kind: DistributionKind::Constant,
                ..
            }
        ));
    }

    #[test]
    fn invalid_parameter_names_schema_and_field() {
        let state = Template::new().with("biomass", json!({"kind": "uniform", "low": 5, "high": 1}));
        let traits = Template::new().with("mu", 1);
        let registration =
            AgentSubtypeRegistration::from_templates(AgentSubtype::Oho, 1, &state, &traits).unwrap();
        let err = registration.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "oho StateRandConfig.biomass: uniform distribution has low (5) greater than high (1)"
        );
    }
}
