use iebpr_core::config::SetupConfig;
use iebpr_core::estimate::estimate;
use iebpr_core::resolve::resolve;
use iebpr_core::snapshot::{SnapshotArray, AGENT_STATE_RECORD_FIELDS};
use iebpr_core::template::{get_template as bundled_template, Template};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;
use std::fmt::Display;

fn value_error(e: impl Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Minimal PyO3 module exposing iebpr-core to Python.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Bundled template as JSON text, e.g. `get_template("pao_trait")`.
#[pyfunction]
fn get_template(name: &str) -> PyResult<String> {
    let template = bundled_template(name).map_err(value_error)?;
    serde_json::to_string_pretty(&template).map_err(value_error)
}

#[pyfunction]
fn sanitize_template(template_json: &str) -> PyResult<bool> {
    let template = Template::from_json_str(template_json).map_err(value_error)?;
    template.validate().map(|_| true).map_err(value_error)
}

/// Returns `(schema_name, resolved_json)`.
#[pyfunction]
#[pyo3(signature = (template_json, sanitize = true))]
fn randconfig_from_template_json(template_json: &str, sanitize: bool) -> PyResult<(String, String)> {
    let template = Template::from_json_str(template_json).map_err(value_error)?;
    if sanitize {
        template.validate().map_err(value_error)?;
    }
    let resolved = resolve(&template).map_err(value_error)?;
    let json = serde_json::to_string(&resolved).map_err(value_error)?;
    Ok((resolved.schema_name().to_string(), json))
}

#[pyfunction]
fn default_setup_json() -> PyResult<String> {
    serde_json::to_string(&SetupConfig::default())
        .map_err(|e| PyValueError::new_err(format!("failed to serialize default setup: {e}")))
}

/// Build every registration in the setup and return them as JSON.
#[pyfunction]
fn validate_setup_json(setup_json: &str) -> PyResult<String> {
    let config = SetupConfig::from_json_str(setup_json).map_err(value_error)?;
    let registrations = config.build_registrations().map_err(value_error)?;
    serde_json::to_string(&registrations).map_err(value_error)
}

/// Returns `(population_cumulative_fraction, normalized_content)`.
#[pyfunction]
#[pyo3(signature = (columns, field, use_rela_count = true))]
fn estimate_subtype_distrib(
    columns: HashMap<String, Vec<f64>>,
    field: &str,
    use_rela_count: bool,
) -> PyResult<(Vec<f64>, Vec<f64>)> {
    let snapshot = snapshot_from_columns(&columns).map_err(PyValueError::new_err)?;
    let curve = estimate(&snapshot, field, use_rela_count).map_err(value_error)?;
    Ok((curve.population_cumulative_fraction, curve.normalized_content))
}

/// Orders named columns into the recorded agent-state layout.
fn snapshot_from_columns(columns: &HashMap<String, Vec<f64>>) -> Result<SnapshotArray, String> {
    let ordered = AGENT_STATE_RECORD_FIELDS
        .iter()
        .map(|&name| {
            columns
                .get(name)
                .map(|values| (name, values.as_slice()))
                .ok_or_else(|| format!("missing snapshot column '{name}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(extra) = columns
        .keys()
        .find(|key| !AGENT_STATE_RECORD_FIELDS.contains(&key.as_str()))
    {
        return Err(format!("unexpected snapshot column '{extra}'"));
    }
    SnapshotArray::from_columns(&ordered).map_err(|e| e.to_string())
}

#[pymodule]
fn _iebpr(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(get_template, m)?)?;
    m.add_function(wrap_pyfunction!(sanitize_template, m)?)?;
    m.add_function(wrap_pyfunction!(randconfig_from_template_json, m)?)?;
    m.add_function(wrap_pyfunction!(default_setup_json, m)?)?;
    m.add_function(wrap_pyfunction!(validate_setup_json, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_subtype_distrib, m)?)?;
    Ok(())
}
