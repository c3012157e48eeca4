//! Letterhead wrappers around the host export entry points.
//!
//! The four data wrappers prepend letterhead rows before delegating; the two
//! report export wrappers only stage a render context for the data wrappers
//! they end up calling.

use std::borrow::Cow;
use std::io::Cursor;
use std::sync::Arc;

use rust_xlsxwriter::Workbook;

use crate::conf::{
    C_LABEL_EXPORT_DEFAULT, C_LABEL_QUERY_REPORT_DEFAULT, C_LOG_TARGET, C_PARAM_KEY_DOCTYPE,
    TUP_PARAM_KEYS_QUERY_REPORT, TUP_PARAM_KEYS_REPORT_VIEW_LABEL,
};
use crate::context::{
    ContextOverrideScope, LetterheadAppliedScope, is_letterhead_applied, mark_letterhead_applied,
    stage_context_override, take_context_override,
};
use crate::dispatch::{
    EnumExportHandler, TypeFnBuildResponse, TypeFnExportQuery, TypeFnGetCsvBytes, TypeFnMakeXlsx,
};
use crate::error::HostExportError;
use crate::letterhead::{LetterheadEngine, check_letterhead_fits_sheet, generate_letterhead_rows};
use crate::restyle::restyle_xlsx;
use crate::spec::{
    EnumExportEntryPoint, EnumExportFileType, EnumExportQueryResult, SpecContextSeed,
    SpecCsvParams, SpecExportResponse, SpecFormParams, SpecLetterheadSettings, TypeRow,
};
use crate::util::{filter_non_blank, select_param_value};

/// Build the wrapper for `entry` around `original`.
///
/// A handler whose kind does not fit `entry` is returned unwrapped.
pub fn wrap_handler(
    entry: EnumExportEntryPoint,
    original: EnumExportHandler,
    engine: LetterheadEngine,
) -> EnumExportHandler {
    match (entry, original) {
        (EnumExportEntryPoint::MakeXlsx, EnumExportHandler::MakeXlsx(func)) => {
            EnumExportHandler::MakeXlsx(wrap_make_xlsx(func, engine))
        }
        (EnumExportEntryPoint::BuildXlsxResponse, EnumExportHandler::BuildResponse(func)) => {
            EnumExportHandler::BuildResponse(wrap_build_response(
                func,
                engine,
                EnumExportFileType::Xlsx,
            ))
        }
        (EnumExportEntryPoint::BuildCsvResponse, EnumExportHandler::BuildResponse(func)) => {
            EnumExportHandler::BuildResponse(wrap_build_response(
                func,
                engine,
                EnumExportFileType::Csv,
            ))
        }
        (EnumExportEntryPoint::GetCsvBytes, EnumExportHandler::GetCsvBytes(func)) => {
            EnumExportHandler::GetCsvBytes(wrap_get_csv_bytes(func, engine))
        }
        (EnumExportEntryPoint::QueryReportExport, EnumExportHandler::ExportQuery(func)) => {
            EnumExportHandler::ExportQuery(wrap_query_report_export(func, engine))
        }
        (EnumExportEntryPoint::ReportViewExport, EnumExportHandler::ExportQuery(func)) => {
            EnumExportHandler::ExportQuery(wrap_report_view_export(func, engine))
        }
        (entry, handler) => {
            tracing::debug!(target: C_LOG_TARGET, "handler kind does not fit `{entry}`, not wrapping");
            handler
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region DataWrappers

/// `make_xlsx`: prepend, delegate, then restyle the produced workbook.
pub fn wrap_make_xlsx(original: TypeFnMakeXlsx, engine: LetterheadEngine) -> TypeFnMakeXlsx {
    Arc::new(
        move |rows: &[TypeRow],
              sheet_name: &str,
              workbook: Option<Workbook>,
              column_widths: Option<&[f64]>|
              -> Result<Cursor<Vec<u8>>, HostExportError> {
            let Some(settings) = engine.enabled_settings() else {
                return original(rows, sheet_name, workbook, column_widths);
            };

            let (l_rows, _applied) = prepend_letterhead(
                &engine,
                &settings,
                &SpecContextSeed::from_label(sheet_name),
                rows,
                EnumExportFileType::Xlsx,
            );
            let buffer = original(&l_rows, sheet_name, workbook, column_widths)?;
            Ok(restyle_xlsx(buffer, &settings.font_name, settings.font_size))
        },
    )
}

/// `build_xlsx_response` / `build_csv_response`: prepend, then delegate.
///
/// `file_type` is the payload the wrapped builder produces.
pub fn wrap_build_response(
    original: TypeFnBuildResponse,
    engine: LetterheadEngine,
    file_type: EnumExportFileType,
) -> TypeFnBuildResponse {
    Arc::new(
        move |rows: &[TypeRow], filename: &str| -> Result<SpecExportResponse, HostExportError> {
            let Some(settings) = engine.enabled_settings() else {
                return original(rows, filename);
            };

            let (l_rows, _applied) = prepend_letterhead(
                &engine,
                &settings,
                &SpecContextSeed::from_label(filename),
                rows,
                file_type,
            );
            original(&l_rows, filename)
        },
    )
}

/// `get_csv_bytes`: prepend, then delegate. Seeded from the `doctype` hint.
pub fn wrap_get_csv_bytes(original: TypeFnGetCsvBytes, engine: LetterheadEngine) -> TypeFnGetCsvBytes {
    Arc::new(
        move |rows: &[TypeRow], csv_params: &SpecCsvParams| -> Result<Vec<u8>, HostExportError> {
            let Some(settings) = engine.enabled_settings() else {
                return original(rows, csv_params);
            };

            let c_label = filter_non_blank(csv_params.doctype.clone())
                .unwrap_or_else(|| C_LABEL_EXPORT_DEFAULT.to_string());
            let (l_rows, _applied) = prepend_letterhead(
                &engine,
                &settings,
                &SpecContextSeed::from_label(&c_label),
                rows,
                EnumExportFileType::Csv,
            );
            original(&l_rows, csv_params)
        },
    )
}

/// Letterhead rows followed by `rows`, plus the call-chain marker guard.
///
/// Borrows `rows` unchanged when an outer wrapper already prepended, when the
/// letterhead is empty, or when a spreadsheet letterhead does not fit a sheet.
fn prepend_letterhead<'a>(
    engine: &LetterheadEngine,
    settings: &SpecLetterheadSettings,
    seed: &SpecContextSeed,
    rows: &'a [TypeRow],
    file_type: EnumExportFileType,
) -> (Cow<'a, [TypeRow]>, Option<LetterheadAppliedScope>) {
    if is_letterhead_applied() {
        return (Cow::Borrowed(rows), None);
    }

    let context = take_context_override().unwrap_or_else(|| engine.build_context(seed));
    let l_letterhead = generate_letterhead_rows(settings, &context);
    if l_letterhead.is_empty() {
        return (Cow::Borrowed(rows), None);
    }
    if file_type == EnumExportFileType::Xlsx {
        if let Err(err) = check_letterhead_fits_sheet(&l_letterhead) {
            tracing::warn!(target: C_LOG_TARGET, "letterhead does not fit the worksheet, exporting without it: {err}");
            return (Cow::Borrowed(rows), None);
        }
    }

    let mut l_rows = Vec::with_capacity(l_letterhead.len() + rows.len());
    l_rows.extend(l_letterhead);
    l_rows.extend_from_slice(rows);
    (Cow::Owned(l_rows), mark_letterhead_applied())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StagingWrappers

/// Query report `export_query`: stage the report's context, then delegate.
pub fn wrap_query_report_export(
    original: TypeFnExportQuery,
    engine: LetterheadEngine,
) -> TypeFnExportQuery {
    Arc::new(
        move |form_params: &SpecFormParams,
              csv_params: &SpecCsvParams,
              populate_response: bool|
              -> Result<EnumExportQueryResult, HostExportError> {
            let _scope = stage_query_report_context(&engine, form_params);
            original(form_params, csv_params, populate_response)
        },
    )
}

/// Report view `export_query`: stage the doctype's context, then delegate.
pub fn wrap_report_view_export(
    original: TypeFnExportQuery,
    engine: LetterheadEngine,
) -> TypeFnExportQuery {
    Arc::new(
        move |form_params: &SpecFormParams,
              csv_params: &SpecCsvParams,
              populate_response: bool|
              -> Result<EnumExportQueryResult, HostExportError> {
            let _scope = stage_report_view_context(&engine, form_params);
            original(form_params, csv_params, populate_response)
        },
    )
}

fn stage_query_report_context(
    engine: &LetterheadEngine,
    form_params: &SpecFormParams,
) -> ContextOverrideScope {
    let host = engine.host();
    let form_ambient = host.form_params();

    let c_report_name = select_param_value(Some(form_params), &TUP_PARAM_KEYS_QUERY_REPORT)
        .or_else(|| select_param_value(form_ambient.as_ref(), &TUP_PARAM_KEYS_QUERY_REPORT))
        .unwrap_or_else(|| C_LABEL_QUERY_REPORT_DEFAULT.to_string());

    let c_doctype = match host.report_ref_doctype(&c_report_name) {
        Ok(ref_doctype) => filter_non_blank(ref_doctype).unwrap_or_else(|| c_report_name.clone()),
        Err(err) => {
            tracing::debug!(target: C_LOG_TARGET, "report lookup for `{c_report_name}` failed: {err}");
            c_report_name.clone()
        }
    };

    let context = engine.build_context(&SpecContextSeed {
        doctype: Some(c_doctype),
        report_name: Some(c_report_name),
    });
    stage_context_override(context)
}

fn stage_report_view_context(
    engine: &LetterheadEngine,
    form_params: &SpecFormParams,
) -> Option<ContextOverrideScope> {
    let form_ambient = engine.host().form_params();

    let c_doctype = select_param_value(Some(form_params), &[C_PARAM_KEY_DOCTYPE])
        .or_else(|| select_param_value(form_ambient.as_ref(), &[C_PARAM_KEY_DOCTYPE]))?;
    let c_label = select_param_value(Some(form_params), &TUP_PARAM_KEYS_REPORT_VIEW_LABEL)
        .or_else(|| select_param_value(form_ambient.as_ref(), &TUP_PARAM_KEYS_REPORT_VIEW_LABEL))
        .unwrap_or_else(|| c_doctype.clone());

    let context = engine.build_context(&SpecContextSeed {
        doctype: Some(c_doctype),
        report_name: Some(c_label),
    });
    Some(stage_context_override(context))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use parking_lot::Mutex;

    use super::*;
    use crate::context::has_context_override;
    use crate::delimited::get_csv_bytes;
    use crate::error::SettingsError;
    use crate::session::{HostSession, StaticHostSession};
    use crate::settings::{SettingsSource, StaticSettingsSource};
    use crate::spec::{SpecSettingsRecord, create_text_row};
    use crate::writer::make_xlsx;

    struct FailingSettingsSource;

    impl SettingsSource for FailingSettingsSource {
        fn fetch(&self) -> Result<Option<SpecSettingsRecord>, SettingsError> {
            Err(SettingsError::Io {
                path: "letterhead.toml".into(),
                source: std::io::Error::other("store offline"),
            })
        }
    }

    fn create_host() -> Arc<StaticHostSession> {
        Arc::new(
            StaticHostSession::new("jdoe")
                .with_user_fullname("John Doe")
                .with_default("company", "Acme")
                .with_report("Sales Register", "Sales Invoice"),
        )
    }

    fn create_engine(record: Option<SpecSettingsRecord>) -> LetterheadEngine {
        let settings: Arc<dyn SettingsSource> = Arc::new(StaticSettingsSource::new(record));
        let host: Arc<dyn HostSession> = create_host();
        LetterheadEngine::new(settings, host)
    }

    fn create_enabled_record(template: &str) -> SpecSettingsRecord {
        SpecSettingsRecord {
            enabled: true,
            letterhead_template: template.to_string(),
            add_printed_by: false,
            ..Default::default()
        }
    }

    fn create_data_rows() -> Vec<TypeRow> {
        vec![create_text_row(&["H1", "H2"]), create_text_row(&["v1", "v2"])]
    }

    fn create_recording_csv(seen: Arc<Mutex<Vec<TypeRow>>>) -> TypeFnGetCsvBytes {
        Arc::new(move |rows: &[TypeRow], csv_params: &SpecCsvParams| {
            *seen.lock() = rows.to_vec();
            get_csv_bytes(rows, csv_params)
        })
    }

    fn create_recording_xlsx(
        seen: Arc<Mutex<Vec<TypeRow>>>,
        v_fixed: Option<Vec<u8>>,
    ) -> TypeFnMakeXlsx {
        Arc::new(
            move |rows: &[TypeRow],
                  sheet_name: &str,
                  workbook: Option<Workbook>,
                  column_widths: Option<&[f64]>|
                  -> Result<Cursor<Vec<u8>>, HostExportError> {
                *seen.lock() = rows.to_vec();
                match &v_fixed {
                    Some(v_bytes) => Ok(Cursor::new(v_bytes.clone())),
                    None => make_xlsx(rows, sheet_name, workbook, column_widths),
                }
            },
        )
    }

    fn create_recording_query(
        seen: Arc<Mutex<Option<SpecContextSeed>>>,
        if_fail: bool,
    ) -> TypeFnExportQuery {
        Arc::new(
            move |_form: &SpecFormParams, _params: &SpecCsvParams, _populate: bool| {
                let staged = take_context_override().map(|context| SpecContextSeed {
                    doctype: context.doctype,
                    report_name: context.report_name,
                });
                *seen.lock() = staged;
                if if_fail {
                    return Err(HostExportError::Host("report query failed".to_string()));
                }
                Ok(EnumExportQueryResult::Content {
                    file_type: EnumExportFileType::Csv,
                    content: Vec::new(),
                })
            },
        )
    }

    #[test]
    fn disabled_settings_leave_rows_untouched() {
        let l_data = create_data_rows();
        for engine in [
            create_engine(None),
            create_engine(Some(SpecSettingsRecord {
                enabled: false,
                letterhead_template: "{{ company }}".to_string(),
                ..Default::default()
            })),
            LetterheadEngine::new(Arc::new(FailingSettingsSource), create_host()),
        ] {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let wrapped = wrap_get_csv_bytes(create_recording_csv(seen.clone()), engine);
            let v_bytes = wrapped(&l_data, &SpecCsvParams::default()).expect("csv bytes");

            assert_eq!(*seen.lock(), l_data);
            assert_eq!(
                v_bytes,
                get_csv_bytes(&l_data, &SpecCsvParams::default()).expect("direct csv bytes")
            );
        }
    }

    #[test]
    fn make_xlsx_prepends_letterhead_and_restyles_every_cell() {
        let mut record = create_enabled_record("{{ company }}");
        record.font_name = Some("Calibri".to_string());
        record.font_size = Some(14.into());
        let wrapped = wrap_make_xlsx(Arc::new(make_xlsx), create_engine(Some(record)));

        let buffer = wrapped(&create_data_rows(), "Items", None, None).expect("make xlsx");
        assert_eq!(buffer.position(), 0);

        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(buffer.get_ref()), true)
            .expect("read workbook");
        let sheet = book.get_active_sheet();
        assert_eq!(sheet.get_highest_row(), 4);
        assert_eq!(sheet.get_value((1, 1)), "Acme");
        assert_eq!(sheet.get_value((1, 2)), "");
        assert_eq!(sheet.get_value((1, 3)), "H1");
        assert_eq!(sheet.get_value((2, 3)), "H2");
        assert_eq!(sheet.get_value((1, 4)), "v1");
        assert_eq!(sheet.get_value((2, 4)), "v2");

        for (n_col, n_row) in [(1, 1), (1, 2), (1, 3), (2, 3), (1, 4), (2, 4)] {
            let font = sheet
                .get_cell((n_col, n_row))
                .and_then(|cell| cell.get_style().get_font())
                .expect("cell font");
            assert_eq!(font.get_name().to_string(), "Calibri");
            assert_eq!(font.get_size().to_owned(), 14.0);
        }
    }

    #[test]
    fn get_csv_bytes_seeds_context_from_doctype_hint() {
        let engine = create_engine(Some(create_enabled_record("{{ doctype }} | {{ report_name }}")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let wrapped = wrap_get_csv_bytes(create_recording_csv(seen.clone()), engine);

        wrapped(&create_data_rows(), &SpecCsvParams::default()).expect("csv bytes");
        assert_eq!(seen.lock()[0], create_text_row(&["Export", "Export"]));

        let csv_params = SpecCsvParams {
            doctype: Some("Customer".to_string()),
            ..Default::default()
        };
        wrapped(&create_data_rows(), &csv_params).expect("csv bytes");
        let l_seen = seen.lock().clone();
        assert_eq!(l_seen.len(), 4);
        assert_eq!(l_seen[0], create_text_row(&["Customer", "Customer"]));
        assert_eq!(l_seen[1], create_text_row(&[""]));
        assert_eq!(l_seen[2..], create_data_rows()[..]);
    }

    #[test]
    fn wide_letterhead_is_kept_for_csv_and_dropped_for_xlsx() {
        let c_template = vec!["x"; crate::conf::N_NCOLS_EXCEL_MAX + 1].join("|");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let wrapped = wrap_get_csv_bytes(
            create_recording_csv(seen.clone()),
            create_engine(Some(create_enabled_record(&c_template))),
        );
        wrapped(&create_data_rows(), &SpecCsvParams::default()).expect("csv bytes");
        let l_seen = seen.lock().clone();
        assert_eq!(l_seen.len(), 4);
        assert_eq!(l_seen[0].len(), crate::conf::N_NCOLS_EXCEL_MAX + 1);

        let seen_xlsx = Arc::new(Mutex::new(Vec::new()));
        let wrapped = wrap_make_xlsx(
            create_recording_xlsx(seen_xlsx.clone(), None),
            create_engine(Some(create_enabled_record(&c_template))),
        );
        wrapped(&create_data_rows(), "Items", None, None).expect("make xlsx");
        assert_eq!(*seen_xlsx.lock(), create_data_rows());
    }

    #[test]
    fn disabled_settings_return_make_xlsx_output_unchanged() {
        let v_original = make_xlsx(&create_data_rows(), "Items", None, None)
            .expect("make xlsx")
            .into_inner();

        for engine in [
            create_engine(None),
            create_engine(Some(SpecSettingsRecord {
                enabled: false,
                letterhead_template: "{{ company }}".to_string(),
                font_name: Some("Courier New".to_string()),
                ..Default::default()
            })),
            LetterheadEngine::new(Arc::new(FailingSettingsSource), create_host()),
        ] {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let wrapped =
                wrap_make_xlsx(create_recording_xlsx(seen.clone(), Some(v_original.clone())), engine);

            let buffer = wrapped(&create_data_rows(), "Items", None, None).expect("make xlsx");
            assert_eq!(*seen.lock(), create_data_rows());
            assert_eq!(buffer.get_ref(), &v_original);
        }
    }

    #[test]
    fn make_xlsx_restyles_sheet_added_to_existing_workbook() {
        let mut record = create_enabled_record("{{ company }}");
        record.font_name = Some("Verdana".to_string());
        record.font_size = Some(12.into());
        let wrapped = wrap_make_xlsx(Arc::new(make_xlsx), create_engine(Some(record)));

        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .set_name("Summary")
            .expect("sheet name")
            .write_string(0, 0, "Totals")
            .expect("write summary");

        let buffer = wrapped(&create_data_rows(), "Items", Some(workbook), None).expect("make xlsx");
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(buffer.get_ref()), true)
            .expect("read workbook");
        let sheet = book.get_active_sheet();
        assert_eq!(sheet.get_name(), "Items");
        assert_eq!(sheet.get_value((1, 1)), "Acme");
        let font = sheet
            .get_cell((1, 3))
            .and_then(|cell| cell.get_style().get_font())
            .expect("cell font");
        assert_eq!(font.get_name(), "Verdana");
        assert_eq!(font.get_size().to_owned(), 12.0);
    }

    #[test]
    fn staged_override_is_consumed_by_data_wrapper() {
        let engine = create_engine(Some(create_enabled_record("{{ report_name }}")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let wrapped = wrap_get_csv_bytes(create_recording_csv(seen.clone()), engine.clone());

        let _scope = stage_context_override(
            engine.build_context(&SpecContextSeed::from_label("Sales Register")),
        );
        wrapped(&create_data_rows(), &SpecCsvParams::default()).expect("csv bytes");
        assert_eq!(seen.lock()[0], create_text_row(&["Sales Register"]));
        assert!(!has_context_override());
    }

    #[test]
    fn query_report_stages_ref_doctype_and_clears_after_success() {
        let engine = create_engine(Some(create_enabled_record("{{ company }}")));
        let seen = Arc::new(Mutex::new(None));
        let wrapped = wrap_query_report_export(create_recording_query(seen.clone(), false), engine);

        let form = SpecFormParams::from_pairs([("report_name", "Sales Register")]);
        wrapped(&form, &SpecCsvParams::default(), true).expect("export");
        assert_eq!(
            *seen.lock(),
            Some(SpecContextSeed {
                doctype: Some("Sales Invoice".to_string()),
                report_name: Some("Sales Register".to_string()),
            })
        );
        assert!(!has_context_override());

        wrapped(&SpecFormParams::default(), &SpecCsvParams::default(), true).expect("export");
        assert_eq!(
            *seen.lock(),
            Some(SpecContextSeed::from_label(C_LABEL_QUERY_REPORT_DEFAULT))
        );
    }

    #[test]
    fn query_report_clears_override_after_failure_and_panic() {
        let engine = create_engine(Some(create_enabled_record("{{ company }}")));
        let form = SpecFormParams::from_pairs([("report", "Sales Register")]);

        let original_fail: TypeFnExportQuery = Arc::new(
            |_form: &SpecFormParams,
             _params: &SpecCsvParams,
             _populate: bool|
             -> Result<EnumExportQueryResult, HostExportError> {
                assert!(has_context_override());
                Err(HostExportError::Host("report query failed".to_string()))
            },
        );
        let wrapped = wrap_query_report_export(original_fail, engine.clone());
        let err = wrapped(&form, &SpecCsvParams::default(), true).expect_err("delegate error");
        assert!(matches!(err, HostExportError::Host(ref message) if message == "report query failed"));
        assert!(!has_context_override());

        let original_panic: TypeFnExportQuery = Arc::new(
            |_form: &SpecFormParams,
             _params: &SpecCsvParams,
             _populate: bool|
             -> Result<EnumExportQueryResult, HostExportError> {
                panic!("report crashed");
            },
        );
        let wrapped = wrap_query_report_export(original_panic, engine);
        let result = catch_unwind(AssertUnwindSafe(|| {
            wrapped(&form, &SpecCsvParams::default(), true)
        }));
        assert!(result.is_err());
        assert!(!has_context_override());
    }

    #[test]
    fn report_view_stages_only_with_a_doctype() {
        let engine = create_engine(Some(create_enabled_record("{{ company }}")));
        let seen = Arc::new(Mutex::new(None));
        let wrapped = wrap_report_view_export(create_recording_query(seen.clone(), false), engine);

        let form = SpecFormParams::from_pairs([("doctype", "Customer"), ("title", "Customers")]);
        wrapped(&form, &SpecCsvParams::default(), false).expect("export");
        assert_eq!(
            *seen.lock(),
            Some(SpecContextSeed {
                doctype: Some("Customer".to_string()),
                report_name: Some("Customers".to_string()),
            })
        );

        let form = SpecFormParams::from_pairs([("doctype", "Customer")]);
        wrapped(&form, &SpecCsvParams::default(), false).expect("export");
        assert_eq!(*seen.lock(), Some(SpecContextSeed::from_label("Customer")));

        wrapped(&SpecFormParams::default(), &SpecCsvParams::default(), false).expect("export");
        assert_eq!(*seen.lock(), None);
        assert!(!has_context_override());
    }
}
