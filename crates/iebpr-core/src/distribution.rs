//! Randomization rules for agent initialization.
//!
//! A template entry is either a bare real (or real-like string), which is shorthand for a
//! `constant` rule, or a description object tagged with `kind` plus the parameters that kind
//! requires. [`build`] turns either form into a [`DistributionSpec`]; [`validate_value`] runs
//! the same structural rules without constructing anything.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const KIND_KEY: &str = "kind";
/// Tag key used by older template files.
pub const LEGACY_KIND_KEY: &str = "type";
pub const NON_NEG_KEY: &str = "non_neg";
pub const VALUE_LIST_KEY: &str = "value_list";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    Constant,
    Normal,
    Uniform,
    /// Draws 1 with probability `mean`, otherwise 0.
    Bernoulli,
    /// Resamples from an empirical pool of observed values.
    Obsvalues,
}

impl DistributionKind {
    pub const ALL: [Self; 5] = [
        Self::Constant,
        Self::Normal,
        Self::Uniform,
        Self::Bernoulli,
        Self::Obsvalues,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Normal => "normal",
            Self::Uniform => "uniform",
            Self::Bernoulli => "bernoulli",
            Self::Obsvalues => "obsvalues",
        }
    }

    /// Parameter keys a description of this kind must carry.
    pub const fn required_params(self) -> &'static [&'static str] {
        match self {
            Self::Constant | Self::Bernoulli => &["mean"],
            Self::Normal => &["mean", "stddev"],
            Self::Uniform => &["low", "high"],
            Self::Obsvalues => &["mean", VALUE_LIST_KEY],
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistributionKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SpecError::UnknownDistributionKind(s.to_string()))
    }
}

/// Structural faults in a single template value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("key 'kind' is missing")]
    MissingKind,

    #[error("distribution kind '{kind}' requires parameter '{param}'")]
    MissingParameter {
        kind: DistributionKind,
        param: &'static str,
    },

    #[error(
        "distribution kind '{0}' is invalid; expected one of: constant, normal, uniform, bernoulli, obsvalues"
    )]
    UnknownDistributionKind(String),

    #[error("value must be a real number, a real-like string, or a description object, not {0}")]
    InvalidValueType(String),

    #[error("parameter '{param}' of distribution kind '{kind}' must be {expected}, not {found}")]
    InvalidParameter {
        kind: DistributionKind,
        param: &'static str,
        expected: &'static str,
        found: String,
    },
}

/// Parameter values the simulation engine refuses at pre-initialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("normal distribution (mean {mean}, stddev {stddev}) is unlikely to draw a non-negative value")]
    NormalNonNegLowProbability { mean: f64, stddev: f64 },

    #[error("uniform distribution has low ({low}) greater than high ({high})")]
    UniformBoundsSwapped { low: f64, high: f64 },

    #[error("uniform distribution [{low}, {high}] is unlikely to draw a non-negative value")]
    UniformNonNegLowProbability { low: f64, high: f64 },

    #[error("bernoulli mean must be within [0,1], got {0}")]
    BernoulliMeanOutOfRange(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    Constant { mean: f64 },
    Normal { mean: f64, stddev: f64 },
    Uniform { low: f64, high: f64 },
    Bernoulli { mean: f64 },
    /// `value_list` is kept in ascending order.
    Obsvalues { mean: f64, value_list: Vec<f64> },
}

impl Distribution {
    pub fn kind(&self) -> DistributionKind {
        match self {
            Self::Constant { .. } => DistributionKind::Constant,
            Self::Normal { .. } => DistributionKind::Normal,
            Self::Uniform { .. } => DistributionKind::Uniform,
            Self::Bernoulli { .. } => DistributionKind::Bernoulli,
            Self::Obsvalues { .. } => DistributionKind::Obsvalues,
        }
    }
}

/// A validated randomization rule for one config slot.
///
/// (De)serializes as the template description form, and deserialization goes through
/// [`build`], so a bare number is accepted wherever a spec is expected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct DistributionSpec {
    pub distribution: Distribution,
    /// Resample negative draws; only meaningful for `normal` and `uniform`.
    pub non_neg: bool,
    /// Description keys not consumed by the kind, copied verbatim.
    pub extra: Map<String, Value>,
}

impl DistributionSpec {
    pub fn new(distribution: Distribution) -> Self {
        Self {
            distribution,
            non_neg: true,
            extra: Map::new(),
        }
    }

    pub fn constant(mean: f64) -> Self {
        Self::new(Distribution::Constant { mean })
    }

    pub fn normal(mean: f64, stddev: f64) -> Self {
        Self::new(Distribution::Normal { mean, stddev })
    }

    pub fn uniform(low: f64, high: f64) -> Self {
        Self::new(Distribution::Uniform { low, high })
    }

    pub fn bernoulli(mean: f64) -> Self {
        Self::new(Distribution::Bernoulli { mean })
    }

    pub fn obsvalues(mean: f64, mut value_list: Vec<f64>) -> Self {
        value_list.sort_by(f64::total_cmp);
        Self::new(Distribution::Obsvalues { mean, value_list })
    }

    pub fn kind(&self) -> DistributionKind {
        self.distribution.kind()
    }

    /// Apply the engine's pre-initialization rules to the parameter values.
    pub fn check_parameters(&self) -> Result<(), ParameterError> {
        match self.distribution {
            Distribution::Normal { mean, stddev } if self.non_neg && mean + stddev * 2.0 < 0.0 => {
                Err(ParameterError::NormalNonNegLowProbability { mean, stddev })
            }
            Distribution::Uniform { low, high } => {
                if low > high {
                    return Err(ParameterError::UniformBoundsSwapped { low, high });
                }
                // rejects ranges with under 5% of their width above zero
                if self.non_neg && ((low == high && high < 0.0) || high / (high - low) < 0.05) {
                    return Err(ParameterError::UniformNonNegLowProbability { low, high });
                }
                Ok(())
            }
            Distribution::Bernoulli { mean } if !(0.0..=1.0).contains(&mean) => {
                Err(ParameterError::BernoulliMeanOutOfRange(mean))
            }
            _ => Ok(()),
        }
    }
}

impl From<DistributionSpec> for Value {
    fn from(spec: DistributionSpec) -> Self {
        let mut description = Map::new();
        description.insert(KIND_KEY.to_string(), spec.kind().name().into());
        match spec.distribution {
            Distribution::Constant { mean } | Distribution::Bernoulli { mean } => {
                description.insert("mean".to_string(), mean.into());
            }
            Distribution::Normal { mean, stddev } => {
                description.insert("mean".to_string(), mean.into());
                description.insert("stddev".to_string(), stddev.into());
            }
            Distribution::Uniform { low, high } => {
                description.insert("low".to_string(), low.into());
                description.insert("high".to_string(), high.into());
            }
            Distribution::Obsvalues { mean, value_list } => {
                description.insert("mean".to_string(), mean.into());
                description.insert(VALUE_LIST_KEY.to_string(), value_list.into());
            }
        }
        if !spec.non_neg {
            description.insert(NON_NEG_KEY.to_string(), false.into());
        }
        description.extend(spec.extra);
        Value::Object(description)
    }
}

impl TryFrom<Value> for DistributionSpec {
    type Error = SpecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        build(&value)
    }
}

/// Build a spec from a template value.
pub fn build(value: &Value) -> Result<DistributionSpec, SpecError> {
    match value {
        Value::Object(description) => from_description(description),
        other => scalar_mean(other).map(DistributionSpec::constant),
    }
}

/// Check a template value against the same rules as [`build`] without constructing a spec.
pub fn validate_value(value: &Value) -> Result<(), SpecError> {
    let Value::Object(description) = value else {
        return scalar_mean(value).map(|_| ());
    };
    let kind = description_kind(description)?;
    require_all(description, kind)?;
    for &param in kind.required_params() {
        if param == VALUE_LIST_KEY {
            value_list_items(description, kind)?;
        } else {
            real_param(description, kind, param)?;
        }
    }
    non_neg_param(description, kind)?;
    Ok(())
}

fn from_description(description: &Map<String, Value>) -> Result<DistributionSpec, SpecError> {
    let kind = description_kind(description)?;
    require_all(description, kind)?;
    let real = |param| real_param(description, kind, param);
    let distribution = match kind {
        DistributionKind::Constant => Distribution::Constant { mean: real("mean")? },
        DistributionKind::Normal => Distribution::Normal {
            mean: real("mean")?,
            stddev: real("stddev")?,
        },
        DistributionKind::Uniform => Distribution::Uniform {
            low: real("low")?,
            high: real("high")?,
        },
        DistributionKind::Bernoulli => Distribution::Bernoulli { mean: real("mean")? },
        DistributionKind::Obsvalues => {
            let mut value_list = value_list_items(description, kind)?
                .iter()
                .filter_map(as_real)
                .collect::<Vec<_>>();
            value_list.sort_by(f64::total_cmp);
            Distribution::Obsvalues {
                mean: real("mean")?,
                value_list,
            }
        }
    };
    let non_neg = non_neg_param(description, kind)?;
    let extra = description
        .iter()
        .filter(|(key, _)| !is_consumed(kind, key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(DistributionSpec {
        distribution,
        non_neg,
        extra,
    })
}

fn is_consumed(kind: DistributionKind, key: &str) -> bool {
    key == KIND_KEY
        || key == LEGACY_KIND_KEY
        || key == NON_NEG_KEY
        || kind.required_params().contains(&key)
}

fn description_kind(description: &Map<String, Value>) -> Result<DistributionKind, SpecError> {
    let tag = description
        .get(KIND_KEY)
        .or_else(|| description.get(LEGACY_KIND_KEY))
        .ok_or(SpecError::MissingKind)?;
    match tag {
        Value::String(name) => name.parse(),
        other => Err(SpecError::UnknownDistributionKind(other.to_string())),
    }
}

fn require_all(description: &Map<String, Value>, kind: DistributionKind) -> Result<(), SpecError> {
    match kind
        .required_params()
        .iter()
        .find(|param| !description.contains_key(**param))
    {
        Some(&param) => Err(SpecError::MissingParameter { kind, param }),
        None => Ok(()),
    }
}

fn real_param(
    description: &Map<String, Value>,
    kind: DistributionKind,
    param: &'static str,
) -> Result<f64, SpecError> {
    let value = description
        .get(param)
        .ok_or(SpecError::MissingParameter { kind, param })?;
    as_real(value).ok_or_else(|| SpecError::InvalidParameter {
        kind,
        param,
        expected: "a real number",
        found: describe(value),
    })
}

fn value_list_items(
    description: &Map<String, Value>,
    kind: DistributionKind,
) -> Result<&Vec<Value>, SpecError> {
    let value = description
        .get(VALUE_LIST_KEY)
        .ok_or(SpecError::MissingParameter {
            kind,
            param: VALUE_LIST_KEY,
        })?;
    match value {
        Value::Array(items) if items.iter().all(|item| as_real(item).is_some()) => Ok(items),
        other => Err(SpecError::InvalidParameter {
            kind,
            param: VALUE_LIST_KEY,
            expected: "a list of real numbers",
            found: describe(other),
        }),
    }
}

fn non_neg_param(description: &Map<String, Value>, kind: DistributionKind) -> Result<bool, SpecError> {
    match description.get(NON_NEG_KEY) {
        None => Ok(true),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(SpecError::InvalidParameter {
            kind,
            param: NON_NEG_KEY,
            expected: "a boolean",
            found: describe(other),
        }),
    }
}

fn scalar_mean(value: &Value) -> Result<f64, SpecError> {
    as_real(value).ok_or_else(|| SpecError::InvalidValueType(describe(value)))
}

/// Finite reals only; `"inf"` and `"nan"` parse as floats but cannot be written back as JSON.
fn as_real(value: &Value) -> Option<f64> {
    let real = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    real.filter(|real| real.is_finite())
}

pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string '{text}'"),
        Value::Array(_) => "list".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
