//! Whole-sheet font restyling of generated workbooks.

use std::io::{Cursor, Seek, SeekFrom};

use umya_spreadsheet::{Font, Worksheet};

use crate::conf::C_LOG_TARGET;
use crate::error::RestyleError;

/// Apply font `(font_name, font_size)` to every populated cell and every row
/// default of the active sheet.
///
/// Never fails: an unreadable or unwritable workbook is logged and the input
/// buffer is handed back, rewound to position 0.
pub fn restyle_xlsx(mut buffer: Cursor<Vec<u8>>, font_name: &str, font_size: i64) -> Cursor<Vec<u8>> {
    match try_restyle_xlsx(buffer.get_ref(), font_name, font_size) {
        Ok(restyled) => restyled,
        Err(err) => {
            tracing::error!(target: C_LOG_TARGET, "failed to apply letterhead font: {err}");
            buffer.set_position(0);
            buffer
        }
    }
}

/// Fallible core of [`restyle_xlsx`].
pub fn try_restyle_xlsx(
    bytes: &[u8],
    font_name: &str,
    font_size: i64,
) -> Result<Cursor<Vec<u8>>, RestyleError> {
    let mut book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
        .map_err(|err| RestyleError::Read(err.to_string()))?;

    let font = create_font(font_name, font_size);
    apply_font_to_sheet(book.get_active_sheet_mut(), &font);

    let mut out = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
        .map_err(|err| RestyleError::Write(err.to_string()))?;
    out.seek(SeekFrom::Start(0))
        .map_err(|err| RestyleError::Write(err.to_string()))?;
    Ok(out)
}

fn create_font(font_name: &str, font_size: i64) -> Font {
    let mut font = Font::default();
    font.set_name(font_name);
    font.set_size(font_size as f64);
    font
}

fn apply_font_to_sheet(sheet: &mut Worksheet, font: &Font) {
    let n_row_max = sheet.get_highest_row();
    for n_row in 1..=n_row_max {
        apply_font_to_row(sheet, n_row, font);
    }
}

/// Row default font plus the font of every cell present in the row.
fn apply_font_to_row(sheet: &mut Worksheet, n_row: u32, font: &Font) {
    sheet
        .get_row_dimension_mut(&n_row)
        .get_style_mut()
        .set_font(font.clone());

    let l_cols: Vec<u32> = sheet
        .get_collection_by_row(&n_row)
        .iter()
        .map(|cell| *cell.get_coordinate().get_col_num())
        .collect();
    for n_col in l_cols {
        sheet
            .get_cell_mut((n_col, n_row))
            .get_style_mut()
            .set_font(font.clone());
    }
}
