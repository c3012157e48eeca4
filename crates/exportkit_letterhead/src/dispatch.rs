//! Export dispatch table: entry point -> active handler, with the pristine
//! handler kept in the same registration record once wrapped.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rust_xlsxwriter::Workbook;

use crate::conf::C_LOG_TARGET;
use crate::error::{DispatchError, HostExportError};
use crate::intercept::wrap_handler;
use crate::letterhead::LetterheadEngine;
use crate::spec::{
    EnumExportEntryPoint, EnumExportQueryResult, SpecCsvParams, SpecExportResponse,
    SpecFormParams, TypeRow,
};

////////////////////////////////////////////////////////////////////////////////
// #region HandlerTypes

/// `make_xlsx(rows, sheet_name, workbook?, column_widths?)`.
pub type TypeFnMakeXlsx = Arc<
    dyn Fn(
            &[TypeRow],
            &str,
            Option<Workbook>,
            Option<&[f64]>,
        ) -> Result<Cursor<Vec<u8>>, HostExportError>
        + Send
        + Sync,
>;

/// `build_xlsx_response(rows, filename)` / `build_csv_response(rows, filename)`.
pub type TypeFnBuildResponse =
    Arc<dyn Fn(&[TypeRow], &str) -> Result<SpecExportResponse, HostExportError> + Send + Sync>;

/// `get_csv_bytes(rows, csv_params)`.
pub type TypeFnGetCsvBytes =
    Arc<dyn Fn(&[TypeRow], &SpecCsvParams) -> Result<Vec<u8>, HostExportError> + Send + Sync>;

/// `export_query(form_params, csv_params, populate_response)`.
pub type TypeFnExportQuery = Arc<
    dyn Fn(&SpecFormParams, &SpecCsvParams, bool) -> Result<EnumExportQueryResult, HostExportError>
        + Send
        + Sync,
>;

/// A host export implementation, tagged by call signature.
#[derive(Clone)]
pub enum EnumExportHandler {
    /// Workbook generation.
    MakeXlsx(TypeFnMakeXlsx),
    /// Download response builder (XLSX or CSV).
    BuildResponse(TypeFnBuildResponse),
    /// CSV bytes generation.
    GetCsvBytes(TypeFnGetCsvBytes),
    /// Report export routine.
    ExportQuery(TypeFnExportQuery),
}

impl EnumExportHandler {
    /// Whether this handler's signature fits `entry`.
    pub fn fits(&self, entry: EnumExportEntryPoint) -> bool {
        matches!(
            (self, entry),
            (Self::MakeXlsx(_), EnumExportEntryPoint::MakeXlsx)
                | (Self::BuildResponse(_), EnumExportEntryPoint::BuildXlsxResponse)
                | (Self::BuildResponse(_), EnumExportEntryPoint::BuildCsvResponse)
                | (Self::GetCsvBytes(_), EnumExportEntryPoint::GetCsvBytes)
                | (Self::ExportQuery(_), EnumExportEntryPoint::QueryReportExport)
                | (Self::ExportQuery(_), EnumExportEntryPoint::ReportViewExport)
        )
    }

    /// Identity comparison of the underlying implementations.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::MakeXlsx(a), Self::MakeXlsx(b)) => Arc::ptr_eq(a, b),
            (Self::BuildResponse(a), Self::BuildResponse(b)) => Arc::ptr_eq(a, b),
            (Self::GetCsvBytes(a), Self::GetCsvBytes(b)) => Arc::ptr_eq(a, b),
            (Self::ExportQuery(a), Self::ExportQuery(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::MakeXlsx(_) => "MakeXlsx",
            Self::BuildResponse(_) => "BuildResponse",
            Self::GetCsvBytes(_) => "GetCsvBytes",
            Self::ExportQuery(_) => "ExportQuery",
        }
    }
}

impl fmt::Debug for EnumExportHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumExportHandler::{}(..)", self.kind_name())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Dispatcher

struct SpecHandlerSlot {
    active: EnumExportHandler,
    original: Option<EnumExportHandler>,
}

/// Dispatch table for the six intercepted export entry points.
///
/// Handlers are cloned out of the table before being called, so a handler may
/// re-enter the dispatcher (e.g. `build_xlsx_response` calling `make_xlsx`).
pub struct ExportDispatcher {
    engine: LetterheadEngine,
    dict_slots: RwLock<BTreeMap<EnumExportEntryPoint, SpecHandlerSlot>>,
    if_installed: AtomicBool,
}

impl ExportDispatcher {
    /// Empty dispatcher whose wrappers will use `engine`.
    pub fn new(engine: LetterheadEngine) -> Self {
        Self {
            engine,
            dict_slots: RwLock::new(BTreeMap::new()),
            if_installed: AtomicBool::new(false),
        }
    }

    /// Letterhead engine shared by all wrappers.
    pub fn engine(&self) -> &LetterheadEngine {
        &self.engine
    }

    /// Register the host implementation of `entry`.
    ///
    /// Re-registering replaces the handler until the entry point is wrapped;
    /// after that the stored original is frozen.
    pub fn register(
        &self,
        entry: EnumExportEntryPoint,
        handler: EnumExportHandler,
    ) -> Result<(), DispatchError> {
        if !handler.fits(entry) {
            return Err(DispatchError::KindMismatch(entry));
        }
        let mut dict_slots = self.dict_slots.write();
        if dict_slots
            .get(&entry)
            .is_some_and(|slot| slot.original.is_some())
        {
            return Err(DispatchError::AlreadyWrapped(entry));
        }
        dict_slots.insert(
            entry,
            SpecHandlerSlot {
                active: handler,
                original: None,
            },
        );
        Ok(())
    }

    /// Wrap every registered entry point. Runs at most once per dispatcher.
    ///
    /// Never fails; unregistered entry points are skipped and stay inactive.
    pub fn install(&self) {
        if self.if_installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut dict_slots = self.dict_slots.write();
        for entry in EnumExportEntryPoint::ALL {
            let Some(slot) = dict_slots.get_mut(&entry) else {
                tracing::debug!(target: C_LOG_TARGET, "no host handler for `{entry}`, not wrapping");
                continue;
            };
            if slot.original.is_some() {
                continue;
            }
            let original = slot.active.clone();
            slot.active = wrap_handler(entry, original.clone(), self.engine.clone());
            slot.original = Some(original);
        }
        tracing::debug!(target: C_LOG_TARGET, "export letterhead installed");
    }

    /// Whether [`Self::install`] has run.
    pub fn is_installed(&self) -> bool {
        self.if_installed.load(Ordering::SeqCst)
    }

    /// Whether `entry` currently dispatches to a wrapper.
    pub fn is_wrapped(&self, entry: EnumExportEntryPoint) -> bool {
        self.dict_slots
            .read()
            .get(&entry)
            .is_some_and(|slot| slot.original.is_some())
    }

    /// Active handler of `entry`.
    pub fn handler(&self, entry: EnumExportEntryPoint) -> Result<EnumExportHandler, DispatchError> {
        self.dict_slots
            .read()
            .get(&entry)
            .map(|slot| slot.active.clone())
            .ok_or(DispatchError::NotRegistered(entry))
    }

    /// Pristine handler stored when `entry` was wrapped.
    pub fn original(&self, entry: EnumExportEntryPoint) -> Option<EnumExportHandler> {
        self.dict_slots
            .read()
            .get(&entry)
            .and_then(|slot| slot.original.clone())
    }

    /// Put every pristine handler back as the active one.
    ///
    /// The install guard stays set, so a later [`Self::install`] is a no-op.
    pub fn restore_originals(&self) {
        let mut dict_slots = self.dict_slots.write();
        for slot in dict_slots.values_mut() {
            if let Some(original) = slot.original.take() {
                slot.active = original;
            }
        }
    }

    /// Call the active `make_xlsx`.
    pub fn make_xlsx(
        &self,
        rows: &[TypeRow],
        sheet_name: &str,
        workbook: Option<Workbook>,
        column_widths: Option<&[f64]>,
    ) -> Result<Cursor<Vec<u8>>, HostExportError> {
        let entry = EnumExportEntryPoint::MakeXlsx;
        match self.handler(entry)? {
            EnumExportHandler::MakeXlsx(func) => func(rows, sheet_name, workbook, column_widths),
            _ => Err(DispatchError::KindMismatch(entry).into()),
        }
    }

    /// Call the active `build_xlsx_response`.
    pub fn build_xlsx_response(
        &self,
        rows: &[TypeRow],
        filename: &str,
    ) -> Result<SpecExportResponse, HostExportError> {
        self.call_build_response(EnumExportEntryPoint::BuildXlsxResponse, rows, filename)
    }

    /// Call the active `build_csv_response`.
    pub fn build_csv_response(
        &self,
        rows: &[TypeRow],
        filename: &str,
    ) -> Result<SpecExportResponse, HostExportError> {
        self.call_build_response(EnumExportEntryPoint::BuildCsvResponse, rows, filename)
    }

    /// Call the active `get_csv_bytes`.
    pub fn get_csv_bytes(
        &self,
        rows: &[TypeRow],
        csv_params: &SpecCsvParams,
    ) -> Result<Vec<u8>, HostExportError> {
        let entry = EnumExportEntryPoint::GetCsvBytes;
        match self.handler(entry)? {
            EnumExportHandler::GetCsvBytes(func) => func(rows, csv_params),
            _ => Err(DispatchError::KindMismatch(entry).into()),
        }
    }

    /// Call the active query report export routine.
    pub fn query_report_export(
        &self,
        form_params: &SpecFormParams,
        csv_params: &SpecCsvParams,
        populate_response: bool,
    ) -> Result<EnumExportQueryResult, HostExportError> {
        self.call_export_query(
            EnumExportEntryPoint::QueryReportExport,
            form_params,
            csv_params,
            populate_response,
        )
    }

    /// Call the active report view export routine.
    pub fn report_view_export(
        &self,
        form_params: &SpecFormParams,
        csv_params: &SpecCsvParams,
        populate_response: bool,
    ) -> Result<EnumExportQueryResult, HostExportError> {
        self.call_export_query(
            EnumExportEntryPoint::ReportViewExport,
            form_params,
            csv_params,
            populate_response,
        )
    }

    fn call_build_response(
        &self,
        entry: EnumExportEntryPoint,
        rows: &[TypeRow],
        filename: &str,
    ) -> Result<SpecExportResponse, HostExportError> {
        match self.handler(entry)? {
            EnumExportHandler::BuildResponse(func) => func(rows, filename),
            _ => Err(DispatchError::KindMismatch(entry).into()),
        }
    }

    fn call_export_query(
        &self,
        entry: EnumExportEntryPoint,
        form_params: &SpecFormParams,
        csv_params: &SpecCsvParams,
        populate_response: bool,
    ) -> Result<EnumExportQueryResult, HostExportError> {
        match self.handler(entry)? {
            EnumExportHandler::ExportQuery(func) => func(form_params, csv_params, populate_response),
            _ => Err(DispatchError::KindMismatch(entry).into()),
        }
    }
}

impl fmt::Debug for ExportDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dict_slots = self.dict_slots.read();
        let l_registered: Vec<&str> = dict_slots.keys().map(|entry| entry.as_str()).collect();
        f.debug_struct("ExportDispatcher")
            .field("registered", &l_registered)
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProcessWide

static GLOBAL_DISPATCHER: OnceLock<Arc<ExportDispatcher>> = OnceLock::new();

/// Set the process-wide dispatcher. The first call wins; later calls return
/// the already-set instance.
pub fn init_global(dispatcher: Arc<ExportDispatcher>) -> Arc<ExportDispatcher> {
    Arc::clone(GLOBAL_DISPATCHER.get_or_init(|| dispatcher))
}

/// Process-wide dispatcher, if initialized.
pub fn global() -> Option<Arc<ExportDispatcher>> {
    GLOBAL_DISPATCHER.get().cloned()
}

/// Install the letterhead wrappers into the process-wide dispatcher.
///
/// Safe to call any number of times, before or after [`init_global`].
pub fn install() {
    match global() {
        Some(dispatcher) => dispatcher.install(),
        None => {
            tracing::debug!(target: C_LOG_TARGET, "no export dispatcher initialized, skipping install");
        }
    }
}

/// Session-boot hook: installs, then hands `bootinfo` back untouched.
pub fn boot_session<T>(bootinfo: T) -> T {
    install();
    bootinfo
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{HostSession, StaticHostSession};
    use crate::settings::{SettingsSource, StaticSettingsSource};
    use crate::spec::{EnumExportFileType, SpecSettingsRecord};

    fn create_dispatcher() -> ExportDispatcher {
        let settings: Arc<dyn SettingsSource> = Arc::new(StaticSettingsSource::new(Some(
            SpecSettingsRecord {
                enabled: true,
                letterhead_template: "{{ company }}".to_string(),
                ..Default::default()
            },
        )));
        let host: Arc<dyn HostSession> =
            Arc::new(StaticHostSession::new("jdoe").with_default("company", "Acme"));
        ExportDispatcher::new(LetterheadEngine::new(settings, host))
    }

    fn create_handlers() -> Vec<(EnumExportEntryPoint, EnumExportHandler)> {
        let fn_make_xlsx: TypeFnMakeXlsx = Arc::new(
            |_rows: &[TypeRow],
             _sheet: &str,
             _wb: Option<Workbook>,
             _widths: Option<&[f64]>|
             -> Result<Cursor<Vec<u8>>, HostExportError> { Ok(Cursor::new(Vec::new())) },
        );
        let fn_response: TypeFnBuildResponse = Arc::new(
            |_rows: &[TypeRow], filename: &str| -> Result<SpecExportResponse, HostExportError> {
                Ok(SpecExportResponse {
                    filename: filename.to_string(),
                    file_type: EnumExportFileType::Csv,
                    body: Vec::new(),
                })
            },
        );
        let fn_csv: TypeFnGetCsvBytes =
            Arc::new(|_rows: &[TypeRow], _params: &SpecCsvParams| -> Result<Vec<u8>, HostExportError> {
                Ok(Vec::new())
            });
        let fn_query: TypeFnExportQuery = Arc::new(
            |_form: &SpecFormParams,
             _params: &SpecCsvParams,
             _populate: bool|
             -> Result<EnumExportQueryResult, HostExportError> {
                Ok(EnumExportQueryResult::Content {
                    file_type: EnumExportFileType::Csv,
                    content: Vec::new(),
                })
            },
        );
        vec![
            (EnumExportEntryPoint::MakeXlsx, EnumExportHandler::MakeXlsx(fn_make_xlsx)),
            (
                EnumExportEntryPoint::BuildXlsxResponse,
                EnumExportHandler::BuildResponse(fn_response.clone()),
            ),
            (
                EnumExportEntryPoint::BuildCsvResponse,
                EnumExportHandler::BuildResponse(fn_response),
            ),
            (EnumExportEntryPoint::GetCsvBytes, EnumExportHandler::GetCsvBytes(fn_csv)),
            (
                EnumExportEntryPoint::QueryReportExport,
                EnumExportHandler::ExportQuery(fn_query.clone()),
            ),
            (
                EnumExportEntryPoint::ReportViewExport,
                EnumExportHandler::ExportQuery(fn_query),
            ),
        ]
    }

    #[test]
    fn install_twice_keeps_one_original_per_entry_point() {
        let dispatcher = create_dispatcher();
        let l_handlers = create_handlers();
        for (entry, handler) in &l_handlers {
            dispatcher.register(*entry, handler.clone()).expect("register");
        }

        dispatcher.install();
        let l_active_first: Vec<EnumExportHandler> = EnumExportEntryPoint::ALL
            .iter()
            .map(|entry| dispatcher.handler(*entry).expect("active handler"))
            .collect();
        dispatcher.install();
        dispatcher.install();

        for ((entry, handler), active_first) in l_handlers.iter().zip(&l_active_first) {
            assert!(dispatcher.is_wrapped(*entry));
            let original = dispatcher.original(*entry).expect("original stored");
            assert!(original.ptr_eq(handler), "original of `{entry}` changed");
            let active = dispatcher.handler(*entry).expect("active handler");
            assert!(active.ptr_eq(active_first), "`{entry}` was wrapped twice");
            assert!(!active.ptr_eq(handler));
        }
    }

    #[test]
    fn install_skips_unregistered_entry_points() {
        let dispatcher = create_dispatcher();
        let l_handlers = create_handlers();
        let (entry, handler) = l_handlers[3].clone();
        dispatcher.register(entry, handler).expect("register");

        dispatcher.install();
        assert!(dispatcher.is_installed());
        assert!(dispatcher.is_wrapped(EnumExportEntryPoint::GetCsvBytes));
        assert!(!dispatcher.is_wrapped(EnumExportEntryPoint::MakeXlsx));
        assert!(matches!(
            dispatcher.make_xlsx(&[], "Sheet1", None, None),
            Err(HostExportError::Dispatch(DispatchError::NotRegistered(
                EnumExportEntryPoint::MakeXlsx
            )))
        ));
    }

    #[test]
    fn register_rejects_mismatched_or_frozen_handlers() {
        let dispatcher = create_dispatcher();
        let l_handlers = create_handlers();
        let (_, handler_csv) = l_handlers[3].clone();
        assert!(matches!(
            dispatcher.register(EnumExportEntryPoint::MakeXlsx, handler_csv.clone()),
            Err(DispatchError::KindMismatch(EnumExportEntryPoint::MakeXlsx))
        ));

        dispatcher
            .register(EnumExportEntryPoint::GetCsvBytes, handler_csv.clone())
            .expect("register");
        dispatcher.install();
        assert!(matches!(
            dispatcher.register(EnumExportEntryPoint::GetCsvBytes, handler_csv),
            Err(DispatchError::AlreadyWrapped(EnumExportEntryPoint::GetCsvBytes))
        ));
    }

    #[test]
    fn restore_originals_reinstates_host_handlers() {
        let dispatcher = create_dispatcher();
        let l_handlers = create_handlers();
        for (entry, handler) in &l_handlers {
            dispatcher.register(*entry, handler.clone()).expect("register");
        }
        dispatcher.install();
        dispatcher.restore_originals();

        for (entry, handler) in &l_handlers {
            assert!(!dispatcher.is_wrapped(*entry));
            assert!(dispatcher.handler(*entry).expect("handler").ptr_eq(handler));
        }
        dispatcher.install();
        assert!(!dispatcher.is_wrapped(EnumExportEntryPoint::MakeXlsx));
    }

    #[test]
    fn global_install_and_boot_session_wrap_each_entry_point_once() {
        let dispatcher = Arc::new(create_dispatcher());
        let l_handlers = create_handlers();
        for (entry, handler) in &l_handlers {
            dispatcher.register(*entry, handler.clone()).expect("register");
        }

        let dispatcher_global = init_global(Arc::clone(&dispatcher));
        assert!(Arc::ptr_eq(&dispatcher_global, &dispatcher));
        let dispatcher_late = init_global(Arc::new(create_dispatcher()));
        assert!(Arc::ptr_eq(&dispatcher_late, &dispatcher));
        assert!(global().is_some_and(|val| Arc::ptr_eq(&val, &dispatcher)));

        install();
        let l_active_first: Vec<EnumExportHandler> = EnumExportEntryPoint::ALL
            .iter()
            .map(|entry| dispatcher.handler(*entry).expect("active handler"))
            .collect();

        let bootinfo = vec![("sysdefaults", "x")];
        for _ in 0..3 {
            assert_eq!(boot_session(bootinfo.clone()), bootinfo);
        }
        install();

        for ((entry, handler), active_first) in l_handlers.iter().zip(&l_active_first) {
            assert!(dispatcher.is_wrapped(*entry));
            let original = dispatcher.original(*entry).expect("original stored");
            assert!(original.ptr_eq(handler), "original of `{entry}` changed");
            let active = dispatcher.handler(*entry).expect("active handler");
            assert!(active.ptr_eq(active_first), "`{entry}` was wrapped twice");
        }
    }
}
