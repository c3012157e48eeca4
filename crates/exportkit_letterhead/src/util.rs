//! Stateless helper utilities used by the letterhead kernel.

use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_FONT_NAME_DEFAULT, N_FONT_SIZE_DEFAULT, N_FONT_SIZE_MAX, N_FONT_SIZE_MIN,
    N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumFontSizeValue, SpecFormParams};

static RE_FONT_NAME_ILLEGAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-]").expect("font name pattern is valid"));

////////////////////////////////////////////////////////////////////////////////
// #region FontNormalization

/// Validate a configured font into a `(name, size)` pair Excel accepts.
///
/// - blank name -> `"Arial"`; characters other than word, whitespace and
///   hyphen are stripped; a name emptied by stripping is re-defaulted.
/// - size is coerced to an integer (`11` on missing, zero, or unparsable
///   input), sizes below 1 fall back to `11` and sizes above 409 clamp to 409.
pub fn normalize_font(
    raw_name: Option<&str>,
    raw_size: Option<&EnumFontSizeValue>,
) -> (String, i64) {
    (sanitize_font_name(raw_name), coerce_font_size(raw_size))
}

/// Name half of [`normalize_font`].
pub fn sanitize_font_name(raw_name: Option<&str>) -> String {
    let c_name = raw_name.map(str::trim).unwrap_or_default();
    if c_name.is_empty() {
        return C_FONT_NAME_DEFAULT.to_string();
    }

    let c_name = RE_FONT_NAME_ILLEGAL.replace_all(c_name, "");
    let c_name = c_name.trim();
    if c_name.is_empty() {
        return C_FONT_NAME_DEFAULT.to_string();
    }
    c_name.to_string()
}

/// Size half of [`normalize_font`].
pub fn coerce_font_size(raw_size: Option<&EnumFontSizeValue>) -> i64 {
    let n_size = match raw_size {
        None => None,
        Some(EnumFontSizeValue::Integer(val)) => Some(*val),
        Some(EnumFontSizeValue::Float(val)) => {
            if val.is_finite() {
                Some(val.trunc() as i64)
            } else {
                None
            }
        }
        Some(EnumFontSizeValue::Text(val)) => val.trim().parse::<i64>().ok(),
    };

    match n_size {
        None | Some(0) => N_FONT_SIZE_DEFAULT,
        Some(val) if val < N_FONT_SIZE_MIN => N_FONT_SIZE_DEFAULT,
        Some(val) => val.min(N_FONT_SIZE_MAX),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LetterheadTextSplitting

/// Split one rendered template line into cells.
///
/// Tab takes precedence over pipe. Pipe cells are trimmed; tab cells and a
/// delimiter-free line are kept verbatim.
pub fn split_letterhead_line(line: &str) -> Vec<String> {
    if line.contains('\t') {
        return line.split('\t').map(ToString::to_string).collect();
    }
    if line.contains('|') {
        return line.split('|').map(|c| c.trim().to_string()).collect();
    }
    vec![line.to_string()]
}

/// Split rendered template text into rows, dropping blank lines.
pub fn split_letterhead_text(rendered: &str) -> Vec<Vec<String>> {
    rendered
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(split_letterhead_line)
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ParameterLookup

/// Return the first non-empty (trimmed) value found under `keys`.
pub fn select_param_value(source: Option<&SpecFormParams>, keys: &[&str]) -> Option<String> {
    let source = source?;
    keys.iter().find_map(|key| {
        let c_value = source.get(key)?.trim();
        if c_value.is_empty() {
            None
        } else {
            Some(c_value.to_string())
        }
    })
}

/// `Some(value)` when `value` is non-blank after trimming.
pub fn filter_non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let c_val = val.trim();
        if c_val.is_empty() {
            None
        } else {
            Some(c_val.to_string())
        }
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_font_strips_and_clamps() {
        assert_eq!(
            normalize_font(Some(" Calibri! "), Some(&EnumFontSizeValue::Integer(500))),
            ("Calibri".to_string(), 409)
        );
        assert_eq!(
            normalize_font(Some(""), Some(&EnumFontSizeValue::Integer(0))),
            ("Arial".to_string(), 11)
        );
        assert_eq!(
            normalize_font(Some("Times New Roman"), Some(&EnumFontSizeValue::from("12"))),
            ("Times New Roman".to_string(), 12)
        );
    }

    #[test]
    fn test_normalize_font_fallbacks() {
        assert_eq!(normalize_font(None, None), ("Arial".to_string(), 11));
        assert_eq!(sanitize_font_name(Some("!!@@")), "Arial");
        assert_eq!(sanitize_font_name(Some("Noto Sans-CJK_SC")), "Noto Sans-CJK_SC");
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::from("12.5"))), 11);
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::from(" 14 "))), 14);
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::Float(13.9))), 13);
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::Float(f64::NAN))), 11);
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::Integer(-3))), 11);
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::Integer(1))), 1);
        assert_eq!(coerce_font_size(Some(&EnumFontSizeValue::Integer(409))), 409);
    }

    #[test]
    fn test_split_letterhead_text_tab_then_pipe_then_single() {
        assert_eq!(
            split_letterhead_text("A\tB\nC|D\nE"),
            vec![
                vec!["A".to_string(), "B".to_string()],
                vec!["C".to_string(), "D".to_string()],
                vec!["E".to_string()],
            ]
        );
    }

    #[test]
    fn test_split_letterhead_line_edge_cases() {
        assert_eq!(
            split_letterhead_line("x | y\tz"),
            vec!["x | y".to_string(), "z".to_string()]
        );
        assert_eq!(
            split_letterhead_line(" Acme  |  2025-01-15 "),
            vec!["Acme".to_string(), "2025-01-15".to_string()]
        );
        assert_eq!(split_letterhead_line("  Title  "), vec!["  Title  ".to_string()]);
        assert!(split_letterhead_text("\n  \n\t\n").is_empty());
    }

    #[test]
    fn test_select_param_value_skips_blank_candidates() {
        let form = SpecFormParams::from_pairs([("report_name", "  "), ("report", " Sales ")]);
        assert_eq!(
            select_param_value(Some(&form), &["report_name", "report"]),
            Some("Sales".to_string())
        );
        assert_eq!(select_param_value(Some(&form), &["title"]), None);
        assert_eq!(select_param_value(None, &["report"]), None);
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }
}
