pub mod config;
pub mod distribution;
pub mod estimate;
pub mod randomizer;
pub mod registration;
pub mod resolve;
pub mod rng;
pub mod schema;
pub mod snapshot;
pub mod template;

pub use config::{SetupConfig, SetupConfigError, SetupError, SubtypeConfig, TemplateSource};
pub use distribution::{
    Distribution, DistributionKind, DistributionSpec, ParameterError, SpecError,
};
pub use estimate::{estimate, DistributionCurve, DistributionEstimator, EstimateError};
pub use randomizer::Randomizer;
pub use registration::{AgentSubtype, AgentSubtypeRegistration, RegistrationError};
pub use resolve::{resolve, IncompatibleField, ResolveError, ResolvedConfig};
pub use schema::{RandConfigSchema, StateField, StateRandConfig, TraitField, TraitRandConfig};
pub use snapshot::{AgentStateRecord, SnapshotArray, SnapshotError, AGENT_STATE_RECORD_FIELDS};
pub use template::{get_template, Template, TemplateError, TemplateKind};
