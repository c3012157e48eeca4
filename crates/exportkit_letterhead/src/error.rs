//! Error types for every fallible step of the letterhead pipeline.

use std::path::PathBuf;

use crate::spec::EnumExportEntryPoint;

/// Settings store read failures.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("failed to read settings {path}: {source}")]
    Io {
        /// Settings file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Settings file is not a valid record.
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        /// Settings file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Host session/user/default lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No user is attached to the current request.
    #[error("no active session user")]
    NoUser,
    /// A host lookup failed.
    #[error("host lookup `{key}` failed: {message}")]
    Lookup {
        /// Looked-up key.
        key: String,
        /// Host error text.
        message: String,
    },
    /// The host offers no such facility.
    #[error("host facility not available: {0}")]
    Unsupported(&'static str),
}

/// Template rendering failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Built-in template engine failed.
    #[error("template engine error: {0}")]
    Engine(#[from] minijinja::Error),
    /// Host renderer failed.
    #[error("host renderer error: {0}")]
    Host(#[from] SessionError),
}

/// Letterhead row generation failures.
#[derive(Debug, thiserror::Error)]
pub enum LetterheadError {
    /// A letterhead row is wider than an Excel sheet.
    #[error("letterhead row {row_idx} has {width} cells; Excel allows at most {limit}")]
    TooManyColumns {
        /// Zero-based row index.
        row_idx: usize,
        /// Cell count of the row.
        width: usize,
        /// Excel column limit.
        limit: usize,
    },
    /// The letterhead alone exceeds the Excel row limit.
    #[error("letterhead has {height} rows; Excel allows at most {limit}")]
    TooManyRows {
        /// Row count.
        height: usize,
        /// Excel row limit.
        limit: usize,
    },
}

/// Workbook restyle failures.
#[derive(Debug, thiserror::Error)]
pub enum RestyleError {
    /// Input bytes are not a readable workbook.
    #[error("failed to read workbook: {0}")]
    Read(String),
    /// Restyled workbook could not be serialized.
    #[error("failed to write workbook: {0}")]
    Write(String),
}

/// Dispatch table misuse.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Nothing was registered for the entry point.
    #[error("no handler registered for `{0}`")]
    NotRegistered(EnumExportEntryPoint),
    /// The registered handler has the wrong signature for the entry point.
    #[error("handler kind does not match entry point `{0}`")]
    KindMismatch(EnumExportEntryPoint),
    /// The entry point has already been wrapped; its original is frozen.
    #[error("entry point `{0}` is already wrapped")]
    AlreadyWrapped(EnumExportEntryPoint),
}

/// Errors raised by the host export functions themselves.
///
/// Wrappers propagate these unmodified.
#[derive(Debug, thiserror::Error)]
pub enum HostExportError {
    /// Workbook writer error.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// CSV writer error.
    #[error("csv write error: {0}")]
    Csv(#[from] csv::Error),
    /// IO error while assembling the payload.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Dispatch table error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Report source or other host failure.
    #[error("{0}")]
    Host(String),
}
