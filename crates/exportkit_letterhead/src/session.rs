//! Host session accessors: current user, defaults, request form, clock.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;

use crate::error::SessionError;
use crate::spec::SpecFormParams;

/// Synchronous lookups the host offers the letterhead kernel.
///
/// Every lookup may fail; callers degrade each one independently.
pub trait HostSession: Send + Sync {
    /// Login id of the current user.
    fn user(&self) -> Result<String, SessionError>;

    /// Display name of the current user, if any.
    fn user_fullname(&self) -> Result<Option<String>, SessionError>;

    /// Per-user default value (e.g. `"company"`).
    fn user_default(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Ambient form data of the current request.
    fn form_params(&self) -> Option<SpecFormParams>;

    /// Reference doctype of a report definition.
    fn report_ref_doctype(&self, report_name: &str) -> Result<Option<String>, SessionError>;

    /// Current timestamp.
    fn now(&self) -> Result<NaiveDateTime, SessionError> {
        Ok(Local::now().naive_local())
    }

    /// Host-side template renderer used when the built-in engine fails.
    fn render_template(
        &self,
        _template_text: &str,
        _vars: &BTreeMap<String, String>,
    ) -> Result<String, SessionError> {
        Err(SessionError::Unsupported("render_template"))
    }
}

/// Fixed-value session, suitable for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct StaticHostSession {
    user: Option<String>,
    user_fullname: Option<String>,
    defaults: BTreeMap<String, String>,
    reports: BTreeMap<String, String>,
    now: Option<NaiveDateTime>,
    form: RwLock<Option<SpecFormParams>>,
}

impl StaticHostSession {
    /// Session for login id `user`.
    pub fn new(user: &str) -> Self {
        Self {
            user: Some(user.to_string()),
            ..Default::default()
        }
    }

    /// Set the display name.
    pub fn with_user_fullname(mut self, fullname: &str) -> Self {
        self.user_fullname = Some(fullname.to_string());
        self
    }

    /// Add a user default.
    pub fn with_default(mut self, key: &str, value: &str) -> Self {
        self.defaults.insert(key.to_string(), value.to_string());
        self
    }

    /// Register a report definition with its reference doctype.
    pub fn with_report(mut self, report_name: &str, ref_doctype: &str) -> Self {
        self.reports
            .insert(report_name.to_string(), ref_doctype.to_string());
        self
    }

    /// Freeze the clock.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Replace the ambient request form.
    pub fn set_form_params(&self, form: Option<SpecFormParams>) {
        *self.form.write() = form;
    }
}

impl HostSession for StaticHostSession {
    fn user(&self) -> Result<String, SessionError> {
        self.user.clone().ok_or(SessionError::NoUser)
    }

    fn user_fullname(&self) -> Result<Option<String>, SessionError> {
        Ok(self.user_fullname.clone())
    }

    fn user_default(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.defaults.get(key).cloned())
    }

    fn form_params(&self) -> Option<SpecFormParams> {
        self.form.read().clone()
    }

    fn report_ref_doctype(&self, report_name: &str) -> Result<Option<String>, SessionError> {
        self.reports
            .get(report_name)
            .cloned()
            .map(Some)
            .ok_or_else(|| SessionError::Lookup {
                key: report_name.to_string(),
                message: "report not found".to_string(),
            })
    }

    fn now(&self) -> Result<NaiveDateTime, SessionError> {
        Ok(self.now.unwrap_or_else(|| Local::now().naive_local()))
    }
}
