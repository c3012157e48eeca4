use std::sync::Arc;

use chrono::NaiveDateTime;
use exportkit_letterhead::conf::C_FMT_NOW;
use exportkit_letterhead::context::build_context;
use exportkit_letterhead::letterhead::generate_letterhead_rows as rs_generate_letterhead_rows;
use exportkit_letterhead::restyle::restyle_xlsx as rs_restyle_xlsx;
use exportkit_letterhead::session::{HostSession, StaticHostSession};
use exportkit_letterhead::settings::derive_letterhead_settings;
use exportkit_letterhead::spec::{EnumFontSizeValue, SpecContextSeed, SpecSettingsRecord};
use exportkit_letterhead::util::normalize_font as rs_normalize_font;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes, PyDict};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "exportkit.letterhead.v1";
const C_BRIDGE_TRANSPORT: &str = "python_objects";

#[pyfunction]
#[pyo3(signature = (font_name = None, font_size = None))]
fn normalize_font(
    font_name: Option<String>,
    font_size: Option<&Bound<'_, PyAny>>,
) -> PyResult<(String, i64)> {
    let font_size = parse_font_size(font_size)?;
    Ok(rs_normalize_font(font_name.as_deref(), font_size.as_ref()))
}

#[pyfunction]
#[pyo3(signature = (
    settings,
    doctype = None,
    report_name = None,
    user = "Guest".to_string(),
    user_fullname = None,
    company = None,
    now = None
))]
#[allow(clippy::too_many_arguments)]
fn generate_letterhead_rows(
    settings: &Bound<'_, PyAny>,
    doctype: Option<String>,
    report_name: Option<String>,
    user: String,
    user_fullname: Option<String>,
    company: Option<String>,
    now: Option<String>,
) -> PyResult<Vec<Vec<String>>> {
    let cfg_settings = derive_letterhead_settings(&parse_settings_record(settings)?);

    let mut session = StaticHostSession::new(&user);
    if let Some(val) = &user_fullname {
        session = session.with_user_fullname(val);
    }
    if let Some(val) = &company {
        session = session.with_default("company", val);
    }
    if let Some(val) = &now {
        let dt_now = NaiveDateTime::parse_from_str(val, C_FMT_NOW).map_err(|err| {
            PyValueError::new_err(format!("`now` must be formatted as {C_FMT_NOW}: {err}"))
        })?;
        session = session.with_now(dt_now);
    }
    let host: Arc<dyn HostSession> = Arc::new(session);

    let context = build_context(
        &host,
        &SpecContextSeed {
            doctype,
            report_name,
        },
    );
    let l_rows = rs_generate_letterhead_rows(&cfg_settings, &context);

    Ok(l_rows
        .iter()
        .map(|row| row.iter().map(|value| value.to_text()).collect())
        .collect())
}

#[pyfunction]
#[pyo3(signature = (data, font_name = None, font_size = None))]
fn restyle_xlsx<'py>(
    py: Python<'py>,
    data: &[u8],
    font_name: Option<String>,
    font_size: Option<&Bound<'py, PyAny>>,
) -> PyResult<Bound<'py, PyBytes>> {
    let font_size = parse_font_size(font_size)?;
    let (c_font_name, n_font_size) = rs_normalize_font(font_name.as_deref(), font_size.as_ref());

    let v_data = data.to_vec();
    let buffer = py.allow_threads(move || {
        rs_restyle_xlsx(std::io::Cursor::new(v_data), &c_font_name, n_font_size)
    });
    Ok(PyBytes::new(py, buffer.get_ref()))
}

fn parse_settings_record(obj: &Bound<'_, PyAny>) -> PyResult<SpecSettingsRecord> {
    let mut record = SpecSettingsRecord::default();
    if obj.is_none() {
        return Ok(record);
    }

    if let Some(v) = extract_optional_flag(obj, "enabled")? {
        record.enabled = v;
    }
    if let Some(v) = extract_optional_field::<String>(obj, "letterhead_template")? {
        record.letterhead_template = v;
    }
    if let Some(v) = extract_optional_field::<String>(obj, "font_name")? {
        record.font_name = Some(v);
    }
    if let Some(val) = extract_optional_field_bound(obj, "font_size")? {
        record.font_size = parse_font_size(Some(&val))?;
    }
    if let Some(v) = extract_optional_flag(obj, "add_printed_by")? {
        record.add_printed_by = v;
    }

    Ok(record)
}

fn parse_font_size(value: Option<&Bound<'_, PyAny>>) -> PyResult<Option<EnumFontSizeValue>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_none() {
        return Ok(None);
    }

    if let Ok(n_value) = value.extract::<i64>() {
        return Ok(Some(EnumFontSizeValue::Integer(n_value)));
    }
    if let Ok(n_value) = value.extract::<f64>() {
        return Ok(Some(EnumFontSizeValue::Float(n_value)));
    }
    if let Ok(c_value) = value.extract::<String>() {
        return Ok(Some(EnumFontSizeValue::Text(c_value)));
    }

    Err(PyValueError::new_err(
        "font_size must be int, float, str, or None.",
    ))
}

fn extract_optional_field<T>(obj: &Bound<'_, PyAny>, key: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    match extract_optional_field_bound(obj, key)? {
        Some(val) => Ok(Some(val.extract::<T>()?)),
        None => Ok(None),
    }
}

/// Python truthiness of field `key`; check fields arrive as `0`/`1`.
fn extract_optional_flag(obj: &Bound<'_, PyAny>, key: &str) -> PyResult<Option<bool>> {
    extract_optional_field_bound(obj, key)?
        .map(|val| val.is_truthy())
        .transpose()
}

/// Mapping item or attribute `key`, `None` when missing or Python `None`.
fn extract_optional_field_bound<'py>(
    obj: &Bound<'py, PyAny>,
    key: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    let val = if let Ok(dict) = obj.downcast::<PyDict>() {
        dict.get_item(key)?
    } else if obj.hasattr(key)? {
        Some(obj.getattr(key)?)
    } else {
        None
    };
    Ok(val.filter(|val| !val.is_none()))
}

#[pymodule]
fn _exportkit_letterhead_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(normalize_font, module)?)?;
    module.add_function(wrap_pyfunction!(generate_letterhead_rows, module)?)?;
    module.add_function(wrap_pyfunction!(restyle_xlsx, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
