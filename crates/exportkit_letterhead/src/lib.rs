//! `exportkit_letterhead` v1:
//! Letterhead injection for tabular XLSX/CSV exports.
//!
//! Module layout:
//! - `conf`       : constants and default presets
//! - `spec`       : specs/models/params
//! - `error`      : typed errors
//! - `util`       : pure helper functions
//! - `settings`   : settings sources
//! - `session`    : host session accessors
//! - `context`    : render context, template rendering, request-scoped override
//! - `letterhead` : letterhead row generation
//! - `restyle`    : workbook font restyling
//! - `writer`     : reference `make_xlsx` writer
//! - `delimited`  : reference CSV writer
//! - `dispatch`   : dispatch table, installer, boot hook
//! - `intercept`  : entry point wrappers
//! - `host`       : reference export host
pub mod conf;
pub mod context;
pub mod delimited;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod intercept;
pub mod letterhead;
pub mod restyle;
pub mod session;
pub mod settings;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{C_LOG_TARGET, N_FONT_SIZE_MAX, N_FONT_SIZE_MIN, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
pub use context::{
    ContextOverrideScope, SpecRenderContext, build_context, render_template,
    stage_context_override, take_context_override,
};
pub use dispatch::{EnumExportHandler, ExportDispatcher, boot_session, global, init_global, install};
pub use error::{
    DispatchError, HostExportError, LetterheadError, RenderError, RestyleError, SessionError,
    SettingsError,
};
pub use host::{ReportSource, register_reference_host};
pub use letterhead::{LetterheadEngine, check_letterhead_fits_sheet, generate_letterhead_rows};
pub use restyle::restyle_xlsx;
pub use session::{HostSession, StaticHostSession};
pub use settings::{SettingsSource, StaticSettingsSource, TomlFileSettingsSource, fetch_settings};
pub use spec::{
    EnumCellValue, EnumCsvQuoting, EnumExportEntryPoint, EnumExportFileType,
    EnumExportQueryResult, EnumFontSizeValue, SpecContextSeed, SpecCsvParams, SpecExportResponse,
    SpecFormParams, SpecLetterheadSettings, SpecSettingsRecord, TypeRow,
};
pub use util::normalize_font;
