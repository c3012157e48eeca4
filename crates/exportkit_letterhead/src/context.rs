//! Render context building, template rendering and the request-scoped
//! context override shared between nested export wrappers.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use minijinja::value::Kwargs;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};

use crate::conf::{
    C_FMT_DATE, C_FMT_NOW, C_FMT_TIME, C_LOG_TARGET, TUP_FORM_KEYS_DOCTYPE,
    TUP_FORM_KEYS_REPORT_NAME,
};
use crate::error::RenderError;
use crate::session::HostSession;
use crate::spec::SpecContextSeed;
use crate::util::{filter_non_blank, select_param_value};

////////////////////////////////////////////////////////////////////////////////
// #region RenderContext

/// Variables available to a letterhead template.
#[derive(Clone)]
pub struct SpecRenderContext {
    /// Exported entity identifier.
    pub doctype: Option<String>,
    /// Human report label.
    pub report_name: Option<String>,
    /// Default company of the current user (empty when unknown).
    pub company: String,
    /// Display name of the current user.
    pub user_fullname: String,
    /// Timestamp of the export.
    pub now: NaiveDateTime,
    /// Host utilities, exposed to templates as functions.
    pub host: Arc<dyn HostSession>,
}

impl fmt::Debug for SpecRenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecRenderContext")
            .field("doctype", &self.doctype)
            .field("report_name", &self.report_name)
            .field("company", &self.company)
            .field("user_fullname", &self.user_fullname)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl SpecRenderContext {
    /// `date` variable text.
    pub fn date_text(&self) -> String {
        self.now.format(C_FMT_DATE).to_string()
    }

    /// `time` variable text.
    pub fn time_text(&self) -> String {
        self.now.format(C_FMT_TIME).to_string()
    }

    /// `now` variable text.
    pub fn now_text(&self) -> String {
        self.now.format(C_FMT_NOW).to_string()
    }

    /// Flat string view of all template variables.
    pub fn to_vars(&self) -> BTreeMap<String, String> {
        let mut dict_vars = BTreeMap::new();
        dict_vars.insert(
            "doctype".to_string(),
            self.doctype.clone().unwrap_or_default(),
        );
        dict_vars.insert(
            "report_name".to_string(),
            self.report_name.clone().unwrap_or_default(),
        );
        dict_vars.insert("company".to_string(), self.company.clone());
        dict_vars.insert("user_fullname".to_string(), self.user_fullname.clone());
        dict_vars.insert("date".to_string(), self.date_text());
        dict_vars.insert("time".to_string(), self.time_text());
        dict_vars.insert("now".to_string(), self.now_text());
        dict_vars
    }

    /// Re-read user name, clock and company from the host.
    pub fn refresh_ambient(&mut self) {
        self.user_fullname = resolve_user_fullname(self.host.as_ref());
        self.now = resolve_now(self.host.as_ref());
        self.company = resolve_company(self.host.as_ref());
    }
}

/// Build a render context from explicit identifiers plus ambient request state.
///
/// Priority: explicit `seed` fields, then ambient form values (first
/// non-empty candidate key), then cross-fill of whichever identifier is
/// still missing from the other.
pub fn build_context(host: &Arc<dyn HostSession>, seed: &SpecContextSeed) -> SpecRenderContext {
    let form = host.form_params();

    let mut doctype = filter_non_blank(seed.doctype.clone())
        .or_else(|| select_param_value(form.as_ref(), &TUP_FORM_KEYS_DOCTYPE));
    let mut report_name = filter_non_blank(seed.report_name.clone())
        .or_else(|| select_param_value(form.as_ref(), &TUP_FORM_KEYS_REPORT_NAME));

    match (&doctype, &report_name) {
        (None, Some(val)) => doctype = Some(val.clone()),
        (Some(val), None) => report_name = Some(val.clone()),
        _ => {}
    }

    SpecRenderContext {
        doctype,
        report_name,
        company: resolve_company(host.as_ref()),
        user_fullname: resolve_user_fullname(host.as_ref()),
        now: resolve_now(host.as_ref()),
        host: Arc::clone(host),
    }
}

fn resolve_user_fullname(host: &dyn HostSession) -> String {
    match host.user_fullname() {
        Ok(Some(fullname)) if !fullname.trim().is_empty() => return fullname,
        Ok(_) => {}
        Err(err) => tracing::debug!(target: C_LOG_TARGET, "user fullname lookup failed: {err}"),
    }
    match host.user() {
        Ok(user) => user,
        Err(err) => {
            tracing::debug!(target: C_LOG_TARGET, "session user lookup failed: {err}");
            String::new()
        }
    }
}

fn resolve_company(host: &dyn HostSession) -> String {
    match host.user_default("company") {
        Ok(company) => company.unwrap_or_default(),
        Err(err) => {
            tracing::debug!(target: C_LOG_TARGET, "default company lookup failed: {err}");
            String::new()
        }
    }
}

fn resolve_now(host: &dyn HostSession) -> NaiveDateTime {
    host.now().unwrap_or_else(|err| {
        tracing::debug!(target: C_LOG_TARGET, "host clock failed, using local time: {err}");
        Local::now().naive_local()
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TemplateRendering

/// Render `template_text` against `context`; never fails.
///
/// Falls back to the host renderer, then to the unrendered text.
pub fn render_template(template_text: &str, context: &SpecRenderContext) -> String {
    let err_engine = match try_render_template(template_text, context) {
        Ok(rendered) => return rendered,
        Err(err) => err,
    };
    tracing::warn!(
        target: C_LOG_TARGET,
        "letterhead template failed to render, trying host renderer: {err_engine}"
    );

    match context
        .host
        .render_template(template_text, &context.to_vars())
        .map_err(RenderError::from)
    {
        Ok(rendered) => rendered,
        Err(err_host) => {
            tracing::debug!(
                target: C_LOG_TARGET,
                "host renderer failed, using template text verbatim: {err_host}"
            );
            template_text.to_string()
        }
    }
}

/// Render with the built-in engine only.
///
/// Jinja semantics: `a or b` yields the first truthy operand and undefined
/// names render as empty text.
pub fn try_render_template(
    template_text: &str,
    context: &SpecRenderContext,
) -> Result<String, RenderError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);

    let host = Arc::clone(&context.host);
    env.add_function(
        "user_default",
        move |kwargs: Kwargs| -> Result<String, minijinja::Error> {
            let c_key: String = kwargs.get("key")?;
            kwargs.assert_all_used()?;
            let value = host.user_default(&c_key).map_err(|err| {
                minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string())
            })?;
            Ok(value.unwrap_or_default())
        },
    );

    Ok(env.render_str(template_text, context.to_vars())?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RequestScopedOverride

thread_local! {
    static SLOT_CONTEXT_OVERRIDE: RefCell<Option<SpecRenderContext>> = const { RefCell::new(None) };
    static FLAG_LETTERHEAD_APPLIED: Cell<bool> = const { Cell::new(false) };
}

/// Clears the staged context override when dropped, including on unwind.
#[must_use = "the override is cleared as soon as the scope is dropped"]
#[derive(Debug)]
pub struct ContextOverrideScope {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextOverrideScope {
    fn drop(&mut self) {
        clear_context_override();
    }
}

/// Stage `context` for the next wrapper on this call chain.
pub fn stage_context_override(context: SpecRenderContext) -> ContextOverrideScope {
    SLOT_CONTEXT_OVERRIDE.with(|slot| *slot.borrow_mut() = Some(context));
    ContextOverrideScope {
        _not_send: PhantomData,
    }
}

/// Consume the staged override, leaving the slot empty.
pub fn take_context_override() -> Option<SpecRenderContext> {
    SLOT_CONTEXT_OVERRIDE.with(|slot| slot.borrow_mut().take())
}

/// Whether an override is currently staged on this thread.
pub fn has_context_override() -> bool {
    SLOT_CONTEXT_OVERRIDE.with(|slot| slot.borrow().is_some())
}

/// Drop any staged override.
pub fn clear_context_override() {
    SLOT_CONTEXT_OVERRIDE.with(|slot| slot.borrow_mut().take());
}

/// Marks the current call chain as already carrying a letterhead.
#[derive(Debug)]
pub struct LetterheadAppliedScope {
    _not_send: PhantomData<*const ()>,
}

impl Drop for LetterheadAppliedScope {
    fn drop(&mut self) {
        FLAG_LETTERHEAD_APPLIED.with(|flag| flag.set(false));
    }
}

/// Set the marker; `None` when an outer wrapper already holds it.
pub fn mark_letterhead_applied() -> Option<LetterheadAppliedScope> {
    FLAG_LETTERHEAD_APPLIED.with(|flag| {
        if flag.get() {
            None
        } else {
            flag.set(true);
            Some(LetterheadAppliedScope {
                _not_send: PhantomData,
            })
        }
    })
}

/// Whether an outer wrapper already prepended a letterhead.
pub fn is_letterhead_applied() -> bool {
    FLAG_LETTERHEAD_APPLIED.with(Cell::get)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
