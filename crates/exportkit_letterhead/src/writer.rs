//! Reference workbook writer behind the `make_xlsx` entry point.

use std::collections::BTreeMap;
use std::io::Cursor;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::conf::{EnumFmtKey, N_NCOLS_EXCEL_MAX, derive_default_xlsx_formats};
use crate::error::HostExportError;
use crate::spec::{EnumCellValue, SpecCellFormat, TypeRow};
use crate::util::sanitize_sheet_name;

/// Serialize `rows` into a single-sheet workbook buffer positioned at 0.
///
/// The first row uses the bold header preset, the rest the text preset.
/// Empty strings become blank cells carrying the row's preset; neither
/// preset is Excel's default format, so the blank cell is kept in the sheet.
/// When `workbook` is given the sheet is added to it and made active.
pub fn make_xlsx(
    rows: &[TypeRow],
    sheet_name: &str,
    workbook: Option<Workbook>,
    column_widths: Option<&[f64]>,
) -> Result<Cursor<Vec<u8>>, HostExportError> {
    let mut workbook = workbook.unwrap_or_else(Workbook::new);
    let dict_fmt = derive_default_xlsx_formats();
    let fmt_header = derive_preset_format(&dict_fmt, EnumFmtKey::Header);
    let fmt_text = derive_preset_format(&dict_fmt, EnumFmtKey::Text);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sanitize_sheet_name(sheet_name, "_"))?;
    worksheet.set_active(true);

    if let Some(l_widths) = column_widths {
        for (col_idx, n_width) in l_widths.iter().enumerate() {
            worksheet.set_column_width(cast_col_num(col_idx)?, *n_width)?;
        }
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let format = if row_idx == 0 { &fmt_header } else { &fmt_text };
        for (col_idx, value) in row.iter().enumerate() {
            write_cell_with_format(worksheet, row_idx, col_idx, value, format)?;
        }
    }

    let v_bytes = workbook.save_to_buffer()?;
    Ok(Cursor::new(v_bytes))
}

fn derive_preset_format(dict_fmt: &BTreeMap<String, SpecCellFormat>, key: EnumFmtKey) -> Format {
    dict_fmt
        .get(key.as_str())
        .map(derive_rust_xlsx_format)
        .unwrap_or_else(Format::new)
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), HostExportError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) if val.is_empty() => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }

    format
}

fn cast_row_num(value: usize) -> Result<u32, XlsxError> {
    u32::try_from(value).map_err(|_| XlsxError::RowColumnLimitError)
}

fn cast_col_num(value: usize) -> Result<u16, XlsxError> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(XlsxError::RowColumnLimitError);
    }
    u16::try_from(value).map_err(|_| XlsxError::RowColumnLimitError)
}
