//! Reference CSV serialization behind `get_csv_bytes` / `build_csv_response`.

use csv::{QuoteStyle, WriterBuilder};

use crate::error::HostExportError;
use crate::spec::{EnumCsvQuoting, EnumExportFileType, SpecCsvParams, SpecExportResponse, TypeRow};

/// Serialize `rows` with the delimiter, quote char and quoting of `csv_params`.
///
/// Rows may differ in width; letterhead rows are usually narrower than data.
pub fn get_csv_bytes(rows: &[TypeRow], csv_params: &SpecCsvParams) -> Result<Vec<u8>, HostExportError> {
    let mut writer = WriterBuilder::new()
        .delimiter(csv_params.delimiter)
        .quote(csv_params.quote_char)
        .quote_style(derive_quote_style(csv_params.quoting))
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row.iter().map(|value| value.to_text()))?;
    }
    writer
        .into_inner()
        .map_err(|err| HostExportError::Io(err.into_error()))
}

/// Build a CSV download response with default parameters.
pub fn build_csv_response(rows: &[TypeRow], filename: &str) -> Result<SpecExportResponse, HostExportError> {
    Ok(SpecExportResponse {
        filename: derive_export_filename(filename, EnumExportFileType::Csv),
        file_type: EnumExportFileType::Csv,
        body: get_csv_bytes(rows, &SpecCsvParams::default())?,
    })
}

/// Append the extension of `file_type` unless `filename` already ends with it.
pub fn derive_export_filename(filename: &str, file_type: EnumExportFileType) -> String {
    let c_suffix = format!(".{}", file_type.extension());
    if filename.to_ascii_lowercase().ends_with(&c_suffix) {
        filename.to_string()
    } else {
        format!("{filename}{c_suffix}")
    }
}

fn derive_quote_style(quoting: EnumCsvQuoting) -> QuoteStyle {
    match quoting {
        EnumCsvQuoting::Minimal => QuoteStyle::Necessary,
        EnumCsvQuoting::All => QuoteStyle::Always,
        EnumCsvQuoting::NonNumeric => QuoteStyle::NonNumeric,
        EnumCsvQuoting::Never => QuoteStyle::Never,
    }
}
