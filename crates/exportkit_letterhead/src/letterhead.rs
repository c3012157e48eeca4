//! Letterhead row generation.

use std::sync::Arc;

use crate::conf::{C_LOG_TARGET, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::context::{SpecRenderContext, build_context, render_template};
use crate::error::LetterheadError;
use crate::session::HostSession;
use crate::settings::{SettingsSource, fetch_settings};
use crate::spec::{EnumCellValue, SpecContextSeed, SpecLetterheadSettings, TypeRow};
use crate::util::split_letterhead_text;

/// Settings source and host session bound together for the wrappers.
#[derive(Clone)]
pub struct LetterheadEngine {
    settings_source: Arc<dyn SettingsSource>,
    host: Arc<dyn HostSession>,
}

impl LetterheadEngine {
    /// Engine reading settings from `settings_source` and ambient state from `host`.
    pub fn new(settings_source: Arc<dyn SettingsSource>, host: Arc<dyn HostSession>) -> Self {
        Self {
            settings_source,
            host,
        }
    }

    /// Host session handle.
    pub fn host(&self) -> &Arc<dyn HostSession> {
        &self.host
    }

    /// Current settings when they exist and are enabled.
    ///
    /// A missing record or a failed fetch both mean "disabled".
    pub fn enabled_settings(&self) -> Option<SpecLetterheadSettings> {
        match fetch_settings(self.settings_source.as_ref()) {
            Ok(Some(settings)) if settings.enabled => Some(settings),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(target: C_LOG_TARGET, "failed to get export letterhead settings: {err}");
                None
            }
        }
    }

    /// See [`build_context`].
    pub fn build_context(&self, seed: &SpecContextSeed) -> SpecRenderContext {
        build_context(&self.host, seed)
    }
}

/// Generate the letterhead rows for one export.
///
/// Returns no rows when disabled or when the template is blank. Otherwise the
/// rendered template rows, an optional "Printed by" row and a trailing `[""]`
/// separator row.
pub fn generate_letterhead_rows(
    settings: &SpecLetterheadSettings,
    context: &SpecRenderContext,
) -> Vec<TypeRow> {
    if !settings.enabled || settings.letterhead_template.trim().is_empty() {
        return vec![];
    }

    let mut context = context.clone();
    if context.report_name.is_none() {
        context.report_name = context.doctype.clone();
    }
    context.refresh_ambient();

    let c_rendered = render_template(&settings.letterhead_template, &context);
    let mut l_rows = split_letterhead_text(&c_rendered);

    if settings.add_printed_by {
        l_rows.push(vec![
            format!("Printed by: {}", context.user_fullname),
            format!("Date: {}", context.date_text()),
            format!("Time: {}", context.time_text()),
        ]);
    }
    if !l_rows.is_empty() {
        l_rows.push(vec![String::new()]);
    }

    l_rows
        .into_iter()
        .map(|row| row.into_iter().map(EnumCellValue::String).collect())
        .collect()
}

/// Check that letterhead rows fit on one Excel worksheet.
///
/// Leaves at least one row free for the exported data.
pub fn check_letterhead_fits_sheet(rows: &[TypeRow]) -> Result<(), LetterheadError> {
    if rows.len() >= N_NROWS_EXCEL_MAX {
        return Err(LetterheadError::TooManyRows {
            height: rows.len(),
            limit: N_NROWS_EXCEL_MAX,
        });
    }
    if let Some((row_idx, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() > N_NCOLS_EXCEL_MAX)
    {
        return Err(LetterheadError::TooManyColumns {
            row_idx,
            width: row.len(),
            limit: N_NCOLS_EXCEL_MAX,
        });
    }
    Ok(())
}
