//! Reference export host: the six entry points backed by the bundled XLSX and
//! CSV writers, registered into an [`ExportDispatcher`].
//!
//! The report export routines call back into the dispatcher, so once the
//! letterhead wrappers are installed they see the staged report context.

use std::sync::{Arc, Weak};

use crate::conf::{
    C_LABEL_EXPORT_DEFAULT, C_LABEL_QUERY_REPORT_DEFAULT, C_PARAM_KEY_DOCTYPE,
    C_PARAM_KEY_FILE_FORMAT, TUP_PARAM_KEYS_QUERY_REPORT,
};
use crate::delimited::{build_csv_response, derive_export_filename, get_csv_bytes};
use crate::dispatch::{
    EnumExportHandler, ExportDispatcher, TypeFnBuildResponse, TypeFnExportQuery,
    TypeFnGetCsvBytes, TypeFnMakeXlsx,
};
use crate::error::{DispatchError, HostExportError};
use crate::spec::{
    EnumExportEntryPoint, EnumExportFileType, EnumExportQueryResult, SpecCsvParams,
    SpecExportResponse, SpecFormParams, TypeRow,
};
use crate::util::select_param_value;
use crate::writer::make_xlsx;

/// Supplies the data rows (header row first) of a report export.
pub trait ReportSource: Send + Sync {
    /// Rows for the report described by `form_params`.
    fn fetch_rows(&self, form_params: &SpecFormParams) -> Result<Vec<TypeRow>, HostExportError>;
}

/// Register the reference implementations of all six entry points.
pub fn register_reference_host(
    dispatcher: &Arc<ExportDispatcher>,
    report_source: Arc<dyn ReportSource>,
) -> Result<(), DispatchError> {
    let weak = Arc::downgrade(dispatcher);

    let fn_make_xlsx: TypeFnMakeXlsx = Arc::new(make_xlsx);
    let fn_build_csv_response: TypeFnBuildResponse = Arc::new(build_csv_response);
    let fn_get_csv_bytes: TypeFnGetCsvBytes = Arc::new(get_csv_bytes);

    dispatcher.register(
        EnumExportEntryPoint::MakeXlsx,
        EnumExportHandler::MakeXlsx(fn_make_xlsx),
    )?;
    dispatcher.register(
        EnumExportEntryPoint::BuildXlsxResponse,
        EnumExportHandler::BuildResponse(create_build_xlsx_response(weak.clone())),
    )?;
    dispatcher.register(
        EnumExportEntryPoint::BuildCsvResponse,
        EnumExportHandler::BuildResponse(fn_build_csv_response),
    )?;
    dispatcher.register(
        EnumExportEntryPoint::GetCsvBytes,
        EnumExportHandler::GetCsvBytes(fn_get_csv_bytes),
    )?;
    dispatcher.register(
        EnumExportEntryPoint::QueryReportExport,
        EnumExportHandler::ExportQuery(create_query_report_export(
            weak.clone(),
            Arc::clone(&report_source),
        )),
    )?;
    dispatcher.register(
        EnumExportEntryPoint::ReportViewExport,
        EnumExportHandler::ExportQuery(create_report_view_export(weak, report_source)),
    )?;
    Ok(())
}

fn upgrade_dispatcher(weak: &Weak<ExportDispatcher>) -> Result<Arc<ExportDispatcher>, HostExportError> {
    weak.upgrade()
        .ok_or_else(|| HostExportError::Host("export dispatcher was dropped".to_string()))
}

fn derive_file_type(form_params: &SpecFormParams) -> EnumExportFileType {
    match select_param_value(Some(form_params), &[C_PARAM_KEY_FILE_FORMAT]) {
        Some(c_format) if c_format.eq_ignore_ascii_case("csv") => EnumExportFileType::Csv,
        _ => EnumExportFileType::Xlsx,
    }
}

fn create_build_xlsx_response(weak: Weak<ExportDispatcher>) -> TypeFnBuildResponse {
    Arc::new(
        move |rows: &[TypeRow], filename: &str| -> Result<SpecExportResponse, HostExportError> {
            let dispatcher = upgrade_dispatcher(&weak)?;
            let buffer = dispatcher.make_xlsx(rows, filename, None, None)?;
            Ok(SpecExportResponse {
                filename: derive_export_filename(filename, EnumExportFileType::Xlsx),
                file_type: EnumExportFileType::Xlsx,
                body: buffer.into_inner(),
            })
        },
    )
}

/// Query report export: fetch rows, then `make_xlsx` or `get_csv_bytes`.
fn create_query_report_export(
    weak: Weak<ExportDispatcher>,
    report_source: Arc<dyn ReportSource>,
) -> TypeFnExportQuery {
    Arc::new(
        move |form_params: &SpecFormParams,
              csv_params: &SpecCsvParams,
              populate_response: bool|
              -> Result<EnumExportQueryResult, HostExportError> {
            let dispatcher = upgrade_dispatcher(&weak)?;
            let c_report_name = select_param_value(Some(form_params), &TUP_PARAM_KEYS_QUERY_REPORT)
                .unwrap_or_else(|| C_LABEL_QUERY_REPORT_DEFAULT.to_string());
            let l_rows = report_source.fetch_rows(form_params)?;

            let file_type = derive_file_type(form_params);
            let v_content = match file_type {
                EnumExportFileType::Xlsx => dispatcher
                    .make_xlsx(&l_rows, C_LABEL_QUERY_REPORT_DEFAULT, None, None)?
                    .into_inner(),
                EnumExportFileType::Csv => dispatcher.get_csv_bytes(&l_rows, csv_params)?,
            };

            if populate_response {
                Ok(EnumExportQueryResult::Response(SpecExportResponse {
                    filename: derive_export_filename(&c_report_name, file_type),
                    file_type,
                    body: v_content,
                }))
            } else {
                Ok(EnumExportQueryResult::Content {
                    file_type,
                    content: v_content,
                })
            }
        },
    )
}

/// Report view export: fetch rows, then build a response or raw content.
fn create_report_view_export(
    weak: Weak<ExportDispatcher>,
    report_source: Arc<dyn ReportSource>,
) -> TypeFnExportQuery {
    Arc::new(
        move |form_params: &SpecFormParams,
              csv_params: &SpecCsvParams,
              populate_response: bool|
              -> Result<EnumExportQueryResult, HostExportError> {
            let dispatcher = upgrade_dispatcher(&weak)?;
            let c_title = select_param_value(Some(form_params), &[C_PARAM_KEY_DOCTYPE])
                .unwrap_or_else(|| C_LABEL_EXPORT_DEFAULT.to_string());
            let l_rows = report_source.fetch_rows(form_params)?;

            let file_type = derive_file_type(form_params);
            match (file_type, populate_response) {
                (EnumExportFileType::Xlsx, true) => Ok(EnumExportQueryResult::Response(
                    dispatcher.build_xlsx_response(&l_rows, &c_title)?,
                )),
                (EnumExportFileType::Csv, true) => Ok(EnumExportQueryResult::Response(
                    dispatcher.build_csv_response(&l_rows, &c_title)?,
                )),
                (EnumExportFileType::Xlsx, false) => Ok(EnumExportQueryResult::Content {
                    file_type,
                    content: dispatcher.make_xlsx(&l_rows, &c_title, None, None)?.into_inner(),
                }),
                (EnumExportFileType::Csv, false) => Ok(EnumExportQueryResult::Content {
                    file_type,
                    content: dispatcher.get_csv_bytes(&l_rows, csv_params)?,
                }),
            }
        },
    )
}
