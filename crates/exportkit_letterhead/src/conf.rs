//! Letterhead constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Font family used when the configured name is blank or fully stripped.
pub const C_FONT_NAME_DEFAULT: &str = "Arial";
/// Font size used when the configured size is missing or not an integer.
pub const N_FONT_SIZE_DEFAULT: i64 = 11;
/// Smallest font size Excel accepts.
pub const N_FONT_SIZE_MIN: i64 = 1;
/// Largest font size Excel accepts.
pub const N_FONT_SIZE_MAX: i64 = 409;

/// Tracing target shared by every diagnostic emitted by this crate.
pub const C_LOG_TARGET: &str = "letterhead";

/// Label staged for a query report export when no report name can be found.
pub const C_LABEL_QUERY_REPORT_DEFAULT: &str = "Query Report";
/// Identifier used by the CSV-bytes path when no doctype is supplied.
pub const C_LABEL_EXPORT_DEFAULT: &str = "Export";

/// Ambient form keys checked (in order) for the exported doctype.
pub const TUP_FORM_KEYS_DOCTYPE: [&str; 3] = ["doctype", "ref_doctype", "data_doctype"];
/// Ambient form keys checked (in order) for the report label.
pub const TUP_FORM_KEYS_REPORT_NAME: [&str; 3] = ["report_name", "report", "title"];
/// Parameter keys checked (in order) for the report name of a query report export.
pub const TUP_PARAM_KEYS_QUERY_REPORT: [&str; 2] = ["report_name", "report"];
/// Parameter keys checked (in order) for the label of a report view export.
pub const TUP_PARAM_KEYS_REPORT_VIEW_LABEL: [&str; 3] = ["report_name", "title", "report"];
/// Parameter key holding the exported doctype of a report view export.
pub const C_PARAM_KEY_DOCTYPE: &str = "doctype";
/// Parameter key selecting the output format of a report export.
pub const C_PARAM_KEY_FILE_FORMAT: &str = "file_format_type";

/// Date format used for the `date` template variable.
pub const C_FMT_DATE: &str = "%Y-%m-%d";
/// Time format used for the `time` template variable.
pub const C_FMT_TIME: &str = "%H:%M:%S";
/// Timestamp format used for the `now` template variable.
pub const C_FMT_NOW: &str = "%Y-%m-%d %H:%M:%S";

/// Excel "Text" number format of the body preset.
pub const C_NUM_FORMAT_TEXT: &str = "@";

/// Canonical format preset keys of the reference writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFmtKey {
    /// Body cell format.
    Text,
    /// First-row (column header) format.
    Header,
}

impl EnumFmtKey {
    /// Key used in [`derive_default_xlsx_formats`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Header => "header",
        }
    }
}

/// Build default named format presets used by [`crate::writer::make_xlsx`].
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Calibri".to_string()),
        font_size: Some(N_FONT_SIZE_DEFAULT),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(
        EnumFmtKey::Text.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_TEXT.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Header.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
    );

    dict_fmt
}
