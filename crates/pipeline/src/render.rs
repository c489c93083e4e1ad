//! Message renderer: expands the issue template into an [`IssueRequest`].
//!
//! The template renders the JSON issue document itself, e.g.
//!
//! ```text
//! {
//!   "title": {{ ("Build " ~ build.id ~ " " ~ build.status) | tojson }},
//!   "body": {{ ("Logs: " ~ build.logUrl) | tojson }}
//! }
//! ```
//!
//! The render context exposes `build` (the event, camelCase fields) and
//! `params` (resolved bindings). Undefined attribute access is an error; use
//! `is defined` to probe optional values.

use std::collections::BTreeMap;

use minijinja::{context, Environment, UndefinedBehavior, Value};

use crate::{BuildEvent, IssueRequest, NotifyError, SetupError};

const TEMPLATE_NAME: &str = "issue";

/// A compiled issue template.
#[derive(Debug)]
pub struct MessageRenderer {
    env: Environment<'static>,
}

impl MessageRenderer {
    /// Parses `source`. Syntax errors are reported here, not at render time.
    pub fn compile(source: impl Into<String>) -> Result<Self, SetupError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template_owned(TEMPLATE_NAME, source.into())
            .map_err(SetupError::Template)?;
        Ok(Self { env })
    }

    /// Expands the template to text.
    pub fn render(
        &self,
        event: &BuildEvent,
        params: &BTreeMap<String, String>,
    ) -> Result<String, NotifyError> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(NotifyError::Render)?;
        template
            .render(context! {
                build => Value::from_serialize(event),
                params => Value::from_serialize(params),
            })
            .map_err(NotifyError::Render)
    }

    /// Expands the template and decodes the output as an issue document.
    ///
    /// The decoded document is what gets sent, so the wire body is always
    /// well-formed JSON regardless of template whitespace.
    pub fn render_issue(
        &self,
        event: &BuildEvent,
        params: &BTreeMap<String, String>,
    ) -> Result<IssueRequest, NotifyError> {
        let rendered = self.render(event, params)?;
        serde_json::from_str(rendered.trim()).map_err(NotifyError::Payload)
    }
}
