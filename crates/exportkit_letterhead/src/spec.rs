//! Shared letterhead/export specification models.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::conf::{C_FONT_NAME_DEFAULT, N_FONT_SIZE_DEFAULT};

////////////////////////////////////////////////////////////////////////////////
// #region CellSpecification

/// Cell format specification used by the reference writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

/// One exported cell value.
///
/// Letterhead rows only ever hold [`EnumCellValue::String`] cells, so once
/// prepended they are indistinguishable from ordinary data rows.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// Render the value the way a CSV writer emits it.
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(val) => val.clone(),
            Self::Number(val) => val.to_string(),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One tabular row as handed to a host export entry point.
pub type TypeRow = Vec<EnumCellValue>;

/// Build a text-only row from string slices.
pub fn create_text_row<S: AsRef<str>>(cells: &[S]) -> TypeRow {
    cells
        .iter()
        .map(|c_cell| EnumCellValue::String(c_cell.as_ref().to_string()))
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SettingsSpecification

/// Raw font size as stored by the settings record.
///
/// Stores may hand back integers, floats or free text; [`crate::util::normalize_font`]
/// coerces all of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnumFontSizeValue {
    /// Integer size.
    Integer(i64),
    /// Fractional size (truncated toward zero).
    Float(f64),
    /// Textual size such as `"12"`.
    Text(String),
}

impl Default for EnumFontSizeValue {
    fn default() -> Self {
        Self::Integer(N_FONT_SIZE_DEFAULT)
    }
}

impl From<i64> for EnumFontSizeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for EnumFontSizeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Persisted settings record, exactly as the settings store returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpecSettingsRecord {
    /// Master switch.
    pub enabled: bool,
    /// Letterhead template text.
    pub letterhead_template: String,
    /// Raw font family name.
    pub font_name: Option<String>,
    /// Raw font size.
    pub font_size: Option<EnumFontSizeValue>,
    /// Append the "Printed by" row.
    pub add_printed_by: bool,
}

impl Default for SpecSettingsRecord {
    fn default() -> Self {
        Self {
            enabled: false,
            letterhead_template: String::new(),
            font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
            font_size: Some(EnumFontSizeValue::default()),
            add_printed_by: true,
        }
    }
}

/// Normalized settings consumed by the letterhead engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLetterheadSettings {
    /// Master switch.
    pub enabled: bool,
    /// Letterhead template text.
    pub letterhead_template: String,
    /// Sanitized font family name.
    pub font_name: String,
    /// Font size within `[1, 409]`.
    pub font_size: i64,
    /// Append the "Printed by" row.
    pub add_printed_by: bool,
}

impl Default for SpecLetterheadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            letterhead_template: String::new(),
            font_name: C_FONT_NAME_DEFAULT.to_string(),
            font_size: N_FONT_SIZE_DEFAULT,
            add_printed_by: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportParameters

/// Explicit identifiers a wrapper knows about the current export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecContextSeed {
    /// Exported entity identifier.
    pub doctype: Option<String>,
    /// Human report label.
    pub report_name: Option<String>,
}

impl SpecContextSeed {
    /// Seed both identifiers with the same label.
    pub fn from_label(label: &str) -> Self {
        Self {
            doctype: Some(label.to_string()),
            report_name: Some(label.to_string()),
        }
    }
}

/// Request form parameters (`form_dict`-like string map).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFormParams {
    /// Raw key/value pairs.
    pub values: BTreeMap<String, String>,
}

impl SpecFormParams {
    /// Build from `(key, value)` pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// CSV quoting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCsvQuoting {
    /// Quote only fields that need it.
    #[default]
    Minimal,
    /// Quote every field.
    All,
    /// Quote every non-numeric field.
    NonNumeric,
    /// Never quote.
    Never,
}

/// CSV writer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCsvParams {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Quote character byte.
    pub quote_char: u8,
    /// Quoting policy.
    pub quoting: EnumCsvQuoting,
    /// Optional doctype hint carried by report exports.
    pub doctype: Option<String>,
}

impl Default for SpecCsvParams {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote_char: b'"',
            quoting: EnumCsvQuoting::Minimal,
            doctype: None,
        }
    }
}

/// Export file type produced by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumExportFileType {
    /// Office Open XML workbook.
    Xlsx,
    /// Comma separated values.
    Csv,
}

impl EnumExportFileType {
    /// File extension without dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

/// Response handed back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportResponse {
    /// Download file name including extension.
    pub filename: String,
    /// Payload type.
    pub file_type: EnumExportFileType,
    /// Payload bytes.
    pub body: Vec<u8>,
}

/// Result of an `export_query` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumExportQueryResult {
    /// A populated response (`populate_response = true`).
    Response(SpecExportResponse),
    /// Raw content for the caller to deliver itself.
    Content {
        /// Payload type.
        file_type: EnumExportFileType,
        /// Payload bytes.
        content: Vec<u8>,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EntryPoints

/// The fixed set of intercepted host export entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumExportEntryPoint {
    /// Workbook generation.
    MakeXlsx,
    /// Workbook download response.
    BuildXlsxResponse,
    /// CSV download response.
    BuildCsvResponse,
    /// CSV bytes generation.
    GetCsvBytes,
    /// Query report export routine.
    QueryReportExport,
    /// List/report view export routine.
    ReportViewExport,
}

impl EnumExportEntryPoint {
    /// Every entry point, in installation order.
    pub const ALL: [EnumExportEntryPoint; 6] = [
        Self::MakeXlsx,
        Self::BuildXlsxResponse,
        Self::BuildCsvResponse,
        Self::GetCsvBytes,
        Self::QueryReportExport,
        Self::ReportViewExport,
    ];

    /// Registry key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MakeXlsx => "make_xlsx",
            Self::BuildXlsxResponse => "build_xlsx_response",
            Self::BuildCsvResponse => "build_csv_response",
            Self::GetCsvBytes => "get_csv_bytes",
            Self::QueryReportExport => "_export_query",
            Self::ReportViewExport => "_export_query_reportview",
        }
    }
}

impl fmt::Display for EnumExportEntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
