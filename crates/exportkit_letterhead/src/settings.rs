//! Settings sources. Settings are fetched fresh on every export call.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::SettingsError;
use crate::spec::{SpecLetterheadSettings, SpecSettingsRecord};
use crate::util::normalize_font;

/// Where the singleton settings record comes from.
pub trait SettingsSource: Send + Sync {
    /// Fetch the current record. `Ok(None)` means no record exists.
    fn fetch(&self) -> Result<Option<SpecSettingsRecord>, SettingsError>;
}

/// Fetch and normalize settings from `source`.
///
/// `Ok(None)` and `Err(_)` are both "disabled" for callers; the distinction
/// only matters for diagnostics.
pub fn fetch_settings(
    source: &dyn SettingsSource,
) -> Result<Option<SpecLetterheadSettings>, SettingsError> {
    Ok(source.fetch()?.map(|record| derive_letterhead_settings(&record)))
}

/// Normalize a raw record (font sanitized, size coerced).
pub fn derive_letterhead_settings(record: &SpecSettingsRecord) -> SpecLetterheadSettings {
    let (font_name, font_size) =
        normalize_font(record.font_name.as_deref(), record.font_size.as_ref());
    SpecLetterheadSettings {
        enabled: record.enabled,
        letterhead_template: record.letterhead_template.clone(),
        font_name,
        font_size,
        add_printed_by: record.add_printed_by,
    }
}

/// In-memory settings record, replaceable at runtime.
#[derive(Debug, Default)]
pub struct StaticSettingsSource {
    record: RwLock<Option<SpecSettingsRecord>>,
}

impl StaticSettingsSource {
    /// Source holding `record`.
    pub fn new(record: Option<SpecSettingsRecord>) -> Self {
        Self {
            record: RwLock::new(record),
        }
    }

    /// Replace the stored record.
    pub fn set(&self, record: Option<SpecSettingsRecord>) {
        *self.record.write() = record;
    }
}

impl SettingsSource for StaticSettingsSource {
    fn fetch(&self) -> Result<Option<SpecSettingsRecord>, SettingsError> {
        Ok(self.record.read().clone())
    }
}

/// Settings record persisted as a TOML file, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct TomlFileSettingsSource {
    path_file: PathBuf,
}

impl TomlFileSettingsSource {
    /// Source reading `path_file`.
    pub fn new<P: AsRef<Path>>(path_file: P) -> Self {
        Self {
            path_file: path_file.as_ref().to_path_buf(),
        }
    }
}

impl SettingsSource for TomlFileSettingsSource {
    fn fetch(&self) -> Result<Option<SpecSettingsRecord>, SettingsError> {
        let c_text = match fs::read_to_string(&self.path_file) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SettingsError::Io {
                    path: self.path_file.clone(),
                    source: err,
                });
            }
        };
        let record = toml::from_str::<SpecSettingsRecord>(&c_text).map_err(|err| {
            SettingsError::Parse {
                path: self.path_file.clone(),
                source: err,
            }
        })?;
        Ok(Some(record))
    }
}
